//! Error types for ferry.

use std::io;

/// Errors produced by the ferry navigation engine and its hosts.
///
/// Every variant is a contract violation reported synchronously by the
/// call that introduced it. Content load failures are not represented
/// here; they travel through the frame's `NavigationFailed` report.
#[derive(Debug, thiserror::Error)]
pub enum FerryError {
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("frame not found: {0}")]
    FrameNotFound(String),

    #[error("source frame required to navigate to {0}")]
    SourceRequired(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("external navigation error: {0}")]
    External(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, FerryError>;
