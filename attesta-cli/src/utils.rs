//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use attesta_core::HttpClientConfig;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::ServerArgs;

/// Read a whole input file.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read file");
    Ok(bytes)
}

/// Client settings for the capture server.
pub fn http_config(server: &ServerArgs) -> HttpClientConfig {
    let config = HttpClientConfig::new(&server.server);
    match &server.token {
        Some(token) => config.with_token(token),
        None => config,
    }
}

/// Format a ledger timestamp for display.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Leading characters of a hex digest, for compact tables.
pub fn short_hash(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}
