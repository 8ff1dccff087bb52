pub mod logging;

/// Initializes env_logger once for hosts that do not configure logging
/// themselves. Reads `RUST_LOG`, defaults to info.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
