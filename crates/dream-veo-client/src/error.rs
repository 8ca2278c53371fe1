//! Veo client error types.

use thiserror::Error;

use crate::types::ApiErrorBody;

pub type VeoResult<T> = Result<T, VeoError>;

/// Message the API returns when the selected key or project is no longer valid.
pub const AUTH_FAILURE_MARKER: &str = "Requested entity was not found";

#[derive(Debug, Error)]
pub enum VeoError {
    #[error("No API key selected")]
    MissingApiKey,

    #[error("Remote API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("{message}")]
    Operation { code: i32, message: String },

    #[error("No video URI returned from API")]
    NoMedia,

    #[error("Operation still running after {0} polls")]
    Timeout(u32),

    #[error("Media request returned {status}: {reason}")]
    MediaStatus { status: u16, reason: String },

    #[error("Empty video file")]
    EmptyMedia,

    #[error("Invalid media locator: {0}")]
    InvalidLocator(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VeoError {
    /// Build an error from a non-success response, preferring the message in
    /// the API's JSON error envelope over the raw body.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .map(|envelope| envelope.error.message)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| body.trim().to_string());

        VeoError::Api { status, message }
    }

    /// True when the failure indicates an invalid or revoked credential.
    ///
    /// The API does not expose a dedicated code for this, so detection goes by
    /// message content.
    pub fn is_auth_failure(&self) -> bool {
        self.to_string().contains(AUTH_FAILURE_MARKER)
    }

    /// HTTP status carried by the error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            VeoError::Api { status, .. } | VeoError::MediaStatus { status, .. } => Some(*status),
            VeoError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
