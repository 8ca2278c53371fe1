//! Model error types.

use thiserror::Error;

use crate::scene::SceneStatus;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid scene transition: {from} -> {to}")]
    InvalidTransition { from: SceneStatus, to: SceneStatus },

    #[error("Empty media payload")]
    EmptyMedia,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in the user's dream description, reported before any scene exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Please describe your dream first.")]
    Empty,

    #[error("Please format as: Theme ; Scene 1 ; Scene 2 (use semi-colons to separate each part).")]
    MissingScenes,
}
