pub mod gateway;
pub mod prompts;

pub use gateway::{
    AnalysisError, AnalysisGateway, DistractionVerdict, FocusAnalyzer, FocusStatus,
    SummaryContext,
};
