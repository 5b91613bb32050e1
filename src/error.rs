use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PurgeError>;

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("failed to parse config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Scan(String),

    #[error("invalid css at byte {offset}: {message}")]
    Css { offset: usize, message: String },

    #[error("invalid safelist pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("{0}")]
    Usage(String),
}

impl PurgeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn css(offset: usize, message: impl Into<String>) -> Self {
        Self::Css {
            offset,
            message: message.into(),
        }
    }
}
