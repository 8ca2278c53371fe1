//! Scene progress events and batch progress summaries.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use dream_models::{BatchId, Scene, SceneId, SceneStatus};
use dream_veo_client::capabilities_for;

use crate::session::Batch;

/// Seconds one round of fast-model generations typically takes.
const FAST_ROUND_SECS: u64 = 40;
/// Seconds one round of standard-model generations typically takes.
const STANDARD_ROUND_SECS: u64 = 90;

/// Published every time a scene changes status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneEvent {
    pub batch_id: BatchId,
    pub scene_id: SceneId,
    pub index: usize,
    pub status: SceneStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SceneEvent {
    pub fn for_scene(batch_id: &BatchId, scene: &Scene) -> Self {
        Self {
            batch_id: batch_id.clone(),
            scene_id: scene.id().clone(),
            index: scene.index(),
            status: scene.status(),
            error: scene.error().map(str::to_string),
            timestamp: scene.updated_at(),
        }
    }
}

/// In-process fan-out of scene events.
///
/// Publishing never fails; events sent while nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    sender: broadcast::Sender<SceneEvent>,
}

impl ProgressChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SceneEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: SceneEvent) {
        trace!(scene_id = %event.scene_id, status = %event.status, "Publishing scene event");
        self.sender.send(event).ok();
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Snapshot of how far a batch has come.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    /// Scenes not yet terminal, generating ones included
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    /// Share of terminal scenes, 0 to 100
    pub percent: u8,
    /// Rough time until every scene is terminal
    pub estimated_remaining: Duration,
}

impl ProgressSummary {
    /// Summarize the current state of `batch`.
    pub async fn of(batch: &Batch, model: &str, concurrency: usize) -> Self {
        Self::from_scenes(&batch.snapshot().await, model, concurrency)
    }

    /// Summarize `scenes`, estimating one round of `concurrency` generations
    /// at a time on `model`.
    pub fn from_scenes(scenes: &[Scene], model: &str, concurrency: usize) -> Self {
        let total = scenes.len();
        let count = |status: SceneStatus| scenes.iter().filter(|s| s.status() == status).count();
        let completed = count(SceneStatus::Completed);
        let failed = count(SceneStatus::Failed);
        let pending = total - completed - failed;

        let percent = if total == 0 {
            0
        } else {
            (((total - pending) as f64 / total as f64) * 100.0).round() as u8
        };

        let round_secs = if capabilities_for(model).fast {
            FAST_ROUND_SECS
        } else {
            STANDARD_ROUND_SECS
        };
        let rounds = pending.div_ceil(concurrency.max(1)) as u64;

        Self {
            total,
            pending,
            completed,
            failed,
            percent,
            estimated_remaining: Duration::from_secs(rounds * round_secs),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.pending == 0
    }
}
