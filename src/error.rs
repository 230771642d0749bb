use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause carried by the error variants that wrap system failures.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum GuideError {
    /// The staging directory could not be established.
    #[error("staging setup failed at {path:?}: {reason}")]
    Setup { path: PathBuf, reason: String },

    #[error("embedded resource not found: {0}")]
    ResourceNotFound(String),

    /// A write failed and there was no earlier copy of the file to fall back on.
    #[error("failed to copy {resource} to {path:?}")]
    Copy {
        resource: String,
        path: PathBuf,
        #[source]
        source: Cause,
    },

    /// The dynamic loader rejected the staged file.
    #[error("failed to load native library {path:?}")]
    Load {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuideError {
    pub(crate) fn setup(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GuideError::Setup {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GuideError>;
