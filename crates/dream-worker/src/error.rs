//! Worker error types.

use thiserror::Error;

use dream_models::{InputError, ModelError};
use dream_veo_client::{VeoError, AUTH_FAILURE_MARKER};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Generation failed: {0}")]
    Generation(VeoError),

    #[error("Download failed: {0}")]
    Download(VeoError),

    #[error("Media error: {0}")]
    Media(#[from] ModelError),

    #[error("Scene state error: {0}")]
    State(ModelError),

    #[error("{0}")]
    Input(#[from] InputError),

    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    #[error("Batch {0} was discarded")]
    BatchDiscarded(String),

    #[error("Credential selection failed: {0}")]
    Credential(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Scene task aborted: {0}")]
    TaskAborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Pipeline stage the error came from, used as a metrics label.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Generation(_) => "generation",
            Self::Download(_) => "download",
            Self::Media(_) => "media",
            Self::TaskAborted(_) => "aborted",
            _ => "other",
        }
    }

    /// True when the message indicates the selected credential is invalid,
    /// which calls for a credential reselection.
    pub fn is_auth_failure(&self) -> bool {
        self.to_string().contains(AUTH_FAILURE_MARKER)
    }
}
