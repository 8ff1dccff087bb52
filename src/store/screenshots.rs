//! Content-addressed screenshot files.
//!
//! Frames arrive from the presentation layer as base64 data URLs. Files are
//! named by the SHA-256 of their decoded bytes, so re-saving the same frame
//! is idempotent and the at-least-once delivery of captures never produces
//! duplicates on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Captures smaller than this are treated as blank or failed grabs.
const MIN_PAYLOAD_BYTES: usize = 1_000;

#[derive(Debug, Clone)]
pub struct SavedScreenshot {
    pub file: PathBuf,
    pub bytes: usize,
    pub sha: String,
    pub mime: String,
    pub captured_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create screenshot dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn save(&self, data_url: &str, captured_at: DateTime<Utc>) -> Result<SavedScreenshot> {
        let (mime, payload) = split_data_url(data_url)?;
        let bytes = general_purpose::STANDARD
            .decode(payload)
            .context("screenshot payload is not valid base64")?;

        if bytes.len() < MIN_PAYLOAD_BYTES {
            bail!(
                "screenshot too small ({} bytes), likely blank capture",
                bytes.len()
            );
        }

        let sha = hex_digest(&bytes);
        let filename = format!("{}.{}", &sha[..16], extension_for(&mime));
        let file = self.dir.join(filename);

        // Same content, same name: nothing to do on a re-save.
        if !file.exists() {
            fs::write(&file, &bytes)
                .with_context(|| format!("failed to write screenshot {}", file.display()))?;
        }

        Ok(SavedScreenshot {
            file,
            bytes: bytes.len(),
            sha,
            mime,
            captured_at,
        })
    }

    /// Most recently written files first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<PathBuf>> {
        let mut entries: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list screenshot dir {}", self.dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let modified = entry
                .metadata()?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((modified, entry.path()));
        }
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries
            .into_iter()
            .take(limit)
            .map(|(_, path)| path)
            .collect())
    }

    /// Re-encodes a stored file as a data URL for the analysis gateway.
    pub fn read_data_url(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read screenshot {}", path.display()))?;
        let mime = mime_for(path);
        let encoded = general_purpose::STANDARD.encode(bytes);
        Ok(format!("data:{mime};base64,{encoded}"))
    }
}

fn split_data_url(data_url: &str) -> Result<(String, &str)> {
    let rest = data_url
        .strip_prefix("data:")
        .context("capture payload is not a data URL")?;
    let (header, payload) = rest
        .split_once(',')
        .context("data URL is missing its payload")?;
    let mime = header
        .strip_suffix(";base64")
        .context("data URL is not base64-encoded")?;
    Ok((mime.to_string(), payload))
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}
