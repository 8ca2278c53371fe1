//! Scene definitions and the scene status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::media::LocalMedia;
use crate::prompt::build_prompt;

/// Unique identifier for a scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub String);

impl SceneId {
    /// Generate a new random scene ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a batch of scenes submitted together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub String);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scene processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SceneStatus {
    /// Waiting to be admitted by the scheduler
    #[default]
    Pending,
    /// Generation or download in progress
    Generating,
    /// Media downloaded and playable
    Completed,
    /// Generation or download failed
    Failed,
}

impl SceneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneStatus::Pending => "pending",
            SceneStatus::Generating => "generating",
            SceneStatus::Completed => "completed",
            SceneStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SceneStatus::Completed | SceneStatus::Failed)
    }
}

impl fmt::Display for SceneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One requested video: a theme and detail pair with its own lifecycle.
///
/// Fields are private so the prompt stays fixed after construction and the
/// result fields can only be set through the status transitions:
/// `remote_locator` and `local_media` exist only when completed, `error` only
/// when failed.
#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    id: SceneId,
    index: usize,
    theme: String,
    detail: String,
    prompt: String,
    status: SceneStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_locator: Option<String>,
    #[serde(skip)]
    local_media: Option<LocalMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Scene {
    /// Create a pending scene, rendering its prompt from `template`.
    pub fn new(
        index: usize,
        theme: impl Into<String>,
        detail: impl Into<String>,
        template: &str,
    ) -> Self {
        let theme = theme.into();
        let detail = detail.into();
        let prompt = build_prompt(&theme, &detail, template);
        let now = Utc::now();

        Self {
            id: SceneId::new(),
            index,
            theme,
            detail,
            prompt,
            status: SceneStatus::Pending,
            remote_locator: None,
            local_media: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &SceneId {
        &self.id
    }

    /// Position of the scene within its batch.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn status(&self) -> SceneStatus {
        self.status
    }

    pub fn remote_locator(&self) -> Option<&str> {
        self.remote_locator.as_deref()
    }

    pub fn local_media(&self) -> Option<&LocalMedia> {
        self.local_media.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Completed and still holding an unrevoked media file.
    pub fn is_playable(&self) -> bool {
        self.status == SceneStatus::Completed
            && self
                .local_media
                .as_ref()
                .is_some_and(|media| !media.is_revoked())
    }

    /// `pending -> generating`
    pub fn start_generating(&mut self) -> ModelResult<()> {
        self.transition(SceneStatus::Pending, SceneStatus::Generating)
    }

    /// `generating -> completed`, attaching the remote locator and local media.
    pub fn complete(&mut self, remote_locator: impl Into<String>, media: LocalMedia) -> ModelResult<()> {
        self.transition(SceneStatus::Generating, SceneStatus::Completed)?;
        self.remote_locator = Some(remote_locator.into());
        self.local_media = Some(media);
        Ok(())
    }

    /// `generating -> failed`, recording a human-readable message.
    pub fn fail(&mut self, error: impl Into<String>) -> ModelResult<()> {
        self.transition(SceneStatus::Generating, SceneStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Revoke the local media file, if any.
    pub fn release_media(&self) -> ModelResult<()> {
        match &self.local_media {
            Some(media) => media.revoke(),
            None => Ok(()),
        }
    }

    fn transition(&mut self, from: SceneStatus, to: SceneStatus) -> ModelResult<()> {
        if self.status != from {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
