//! Batches of scenes and the session that owns the active one.

use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use dream_models::{parse_input, BatchId, DreamInput, LocalMedia, ModelError, Scene, SceneId, SceneStatus};

use crate::error::{WorkerError, WorkerResult};
use crate::progress::{ProgressChannel, SceneEvent};

/// Scenes submitted together from one dream description.
///
/// Scene order is fixed at creation. Status changes go through
/// [`Batch::start_scene`], [`Batch::complete_scene`] and [`Batch::fail_scene`],
/// which publish a [`SceneEvent`] and refuse to touch a discarded batch.
pub struct Batch {
    id: BatchId,
    theme: String,
    scenes: RwLock<Vec<Scene>>,
    discarded: watch::Sender<bool>,
    progress: ProgressChannel,
}

impl Batch {
    /// Build a batch of pending scenes, one per detail of `input`.
    pub fn new(input: &DreamInput, template: &str, progress: ProgressChannel) -> Self {
        let scenes = input
            .details
            .iter()
            .enumerate()
            .map(|(index, detail)| Scene::new(index, &input.theme, detail, template))
            .collect();
        let (discarded, _) = watch::channel(false);

        Self {
            id: BatchId::new(),
            theme: input.theme.clone(),
            scenes: RwLock::new(scenes),
            discarded,
            progress,
        }
    }

    /// Get the batch ID.
    pub fn id(&self) -> &BatchId {
        &self.id
    }

    /// Theme shared by every scene of the batch.
    pub fn theme(&self) -> &str {
        &self.theme
    }

    /// Number of scenes.
    pub async fn len(&self) -> usize {
        self.scenes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.scenes.read().await.is_empty()
    }

    /// Clone of every scene, in batch order.
    pub async fn snapshot(&self) -> Vec<Scene> {
        self.scenes.read().await.clone()
    }

    /// Clone of one scene, if it belongs to this batch.
    pub async fn scene(&self, id: &SceneId) -> Option<Scene> {
        self.scenes.read().await.iter().find(|s| s.id() == id).cloned()
    }

    /// Ids of scenes still waiting to be admitted, in batch order.
    pub async fn pending_ids(&self) -> Vec<SceneId> {
        self.scenes
            .read()
            .await
            .iter()
            .filter(|s| s.status() == SceneStatus::Pending)
            .map(|s| s.id().clone())
            .collect()
    }

    /// Completed scenes whose media is still available, in batch order.
    pub async fn playable(&self) -> Vec<Scene> {
        self.scenes
            .read()
            .await
            .iter()
            .filter(|s| s.is_playable())
            .cloned()
            .collect()
    }

    /// Whether the batch was discarded.
    pub fn is_discarded(&self) -> bool {
        *self.discarded.borrow()
    }

    /// Receiver that flips to `true` once the batch is discarded.
    pub fn discarded_signal(&self) -> watch::Receiver<bool> {
        self.discarded.subscribe()
    }

    /// `pending -> generating`. Returns the scene as admitted.
    pub(crate) async fn start_scene(&self, id: &SceneId) -> WorkerResult<Scene> {
        self.update_scene(id, |scene| scene.start_generating()).await
    }

    /// `generating -> completed`. When the batch was discarded meanwhile the
    /// media is revoked instead of attached.
    pub(crate) async fn complete_scene(
        &self,
        id: &SceneId,
        remote_locator: String,
        media: LocalMedia,
    ) -> WorkerResult<Scene> {
        let orphan = media.clone();
        let result = self
            .update_scene(id, move |scene| scene.complete(remote_locator, media))
            .await;

        if result.is_err() {
            if let Err(e) = orphan.revoke() {
                warn!(scene_id = %id, "Failed to release unattached media: {}", e);
            }
        }
        result
    }

    /// `generating -> failed` with a human-readable message.
    pub(crate) async fn fail_scene(&self, id: &SceneId, error: impl Into<String>) -> WorkerResult<Scene> {
        let error = error.into();
        self.update_scene(id, move |scene| scene.fail(error)).await
    }

    /// Fail the scene only if it is still generating. Used to settle scenes
    /// whose task ended without recording an outcome.
    pub(crate) async fn fail_if_generating(&self, id: &SceneId, error: &str) -> Option<Scene> {
        let generating = self
            .scene(id)
            .await
            .is_some_and(|s| s.status() == SceneStatus::Generating);
        if !generating {
            return None;
        }
        self.fail_scene(id, error).await.ok()
    }

    async fn update_scene<F>(&self, id: &SceneId, apply: F) -> WorkerResult<Scene>
    where
        F: FnOnce(&mut Scene) -> Result<(), ModelError>,
    {
        let mut scenes = self.scenes.write().await;
        if self.is_discarded() {
            return Err(WorkerError::BatchDiscarded(self.id.to_string()));
        }

        let scene = scenes
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or_else(|| WorkerError::SceneNotFound(id.to_string()))?;
        apply(scene).map_err(WorkerError::State)?;

        let updated = scene.clone();
        drop(scenes);

        debug!(batch_id = %self.id, scene_id = %id, status = %updated.status(), "Scene updated");
        self.progress.publish(SceneEvent::for_scene(&self.id, &updated));
        Ok(updated)
    }

    /// Stop all further work on this batch and release its media files.
    ///
    /// Idempotent. Once discarded no scene changes status again.
    pub async fn discard(&self) {
        let was_discarded = self.discarded.send_replace(true);

        let scenes = self.scenes.read().await;
        for scene in scenes.iter() {
            if let Err(e) = scene.release_media() {
                warn!(batch_id = %self.id, scene_id = %scene.id(), "Failed to release media: {}", e);
            }
        }

        if !was_discarded {
            info!(batch_id = %self.id, scenes = scenes.len(), "Batch discarded");
        }
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        for scene in self.scenes.get_mut().iter() {
            scene.release_media().ok();
        }
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("id", &self.id)
            .field("theme", &self.theme)
            .field("discarded", &self.is_discarded())
            .finish_non_exhaustive()
    }
}

/// Owns the active batch. Submitting replaces it, resetting clears it, and
/// either way the previous batch is discarded.
#[derive(Debug, Default)]
pub struct Session {
    current: RwLock<Option<Arc<Batch>>>,
    progress: ProgressChannel,
}

impl Session {
    /// Create an empty session publishing to `progress`.
    pub fn new(progress: ProgressChannel) -> Self {
        Self {
            current: RwLock::new(None),
            progress,
        }
    }

    /// Channel every batch of this session publishes scene events to.
    pub fn progress(&self) -> &ProgressChannel {
        &self.progress
    }

    /// Parse `text` into a new batch and make it the active one.
    ///
    /// Invalid input leaves the current batch untouched.
    pub async fn submit(&self, text: &str, template: &str) -> WorkerResult<Arc<Batch>> {
        let input = parse_input(text)?;
        let batch = Arc::new(Batch::new(&input, template, self.progress.clone()));

        info!(
            batch_id = %batch.id(),
            theme = %batch.theme(),
            scenes = input.details.len(),
            "Batch submitted"
        );

        let previous = self.current.write().await.replace(Arc::clone(&batch));
        if let Some(previous) = previous {
            previous.discard().await;
        }

        Ok(batch)
    }

    /// The active batch, if any.
    pub async fn current(&self) -> Option<Arc<Batch>> {
        self.current.read().await.clone()
    }

    /// Discard the active batch and return to the empty state.
    pub async fn reset(&self) {
        let previous = self.current.write().await.take();
        if let Some(previous) = previous {
            previous.discard().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dream_models::{InputError, DEFAULT_PROMPT_TEMPLATE};

    fn media(dir: &tempfile::TempDir) -> LocalMedia {
        LocalMedia::materialize(dir.path(), b"mp4").unwrap()
    }

    #[tokio::test]
    async fn test_submit_builds_scenes_in_order() {
        let session = Session::default();
        let batch = session
            .submit("Ocean ; whales ; kelp ; reef", DEFAULT_PROMPT_TEMPLATE)
            .await
            .unwrap();

        let scenes = batch.snapshot().await;
        assert_eq!(batch.theme(), "Ocean");
        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[2].detail(), "reef");
        assert!(scenes.iter().all(|s| s.status() == SceneStatus::Pending));
        assert!(scenes[0].prompt().contains("Ocean"));
    }

    #[tokio::test]
    async fn test_invalid_input_keeps_current_batch() {
        let session = Session::default();
        let batch = session.submit("A ; b", DEFAULT_PROMPT_TEMPLATE).await.unwrap();

        let err = session.submit("   ", DEFAULT_PROMPT_TEMPLATE).await.unwrap_err();
        assert!(matches!(err, WorkerError::Input(InputError::Empty)));

        let current = session.current().await.unwrap();
        assert_eq!(current.id(), batch.id());
        assert!(!batch.is_discarded());
    }

    #[tokio::test]
    async fn test_submit_discards_previous_batch() {
        let session = Session::default();
        let first = session.submit("A ; b", DEFAULT_PROMPT_TEMPLATE).await.unwrap();
        let second = session.submit("C ; d", DEFAULT_PROMPT_TEMPLATE).await.unwrap();

        assert!(first.is_discarded());
        assert!(!second.is_discarded());
        assert_eq!(session.current().await.unwrap().id(), second.id());
    }

    #[tokio::test]
    async fn test_transitions_publish_events() {
        let session = Session::default();
        let mut events = session.progress().subscribe();
        let batch = session.submit("A ; b", DEFAULT_PROMPT_TEMPLATE).await.unwrap();
        let id = batch.pending_ids().await.remove(0);

        tokio_test::assert_ok!(batch.start_scene(&id).await);
        tokio_test::assert_ok!(batch.fail_scene(&id, "Generation failed: nope").await);

        let first = events.recv().await.unwrap();
        let second = events.recv().await.unwrap();
        assert_eq!(first.status, SceneStatus::Generating);
        assert_eq!(second.status, SceneStatus::Failed);
        assert_eq!(second.error.as_deref(), Some("Generation failed: nope"));
    }

    #[tokio::test]
    async fn test_invalid_transition_is_rejected() {
        let batch = Batch::new(
            &parse_input("A ; b").unwrap(),
            DEFAULT_PROMPT_TEMPLATE,
            ProgressChannel::default(),
        );
        let id = batch.pending_ids().await.remove(0);

        let err = batch.fail_scene(&id, "x").await.unwrap_err();
        assert!(matches!(err, WorkerError::State(_)));
        assert!(batch.pending_ids().await.contains(&id));
    }

    #[tokio::test]
    async fn test_discard_revokes_media_and_freezes_batch() {
        let dir = tempfile::tempdir().unwrap();
        let batch = Batch::new(
            &parse_input("A ; b ; c").unwrap(),
            DEFAULT_PROMPT_TEMPLATE,
            ProgressChannel::default(),
        );
        let ids = batch.pending_ids().await;

        batch.start_scene(&ids[0]).await.unwrap();
        let done = media(&dir);
        let path = done.path().unwrap();
        batch.complete_scene(&ids[0], "remote".into(), done).await.unwrap();
        assert_eq!(batch.playable().await.len(), 1);

        batch.discard().await;
        batch.discard().await;

        assert!(!path.exists());
        assert!(batch.playable().await.is_empty());
        assert!(matches!(
            batch.start_scene(&ids[1]).await,
            Err(WorkerError::BatchDiscarded(_))
        ));
    }

    #[tokio::test]
    async fn test_completion_after_discard_releases_media() {
        let dir = tempfile::tempdir().unwrap();
        let batch = Batch::new(
            &parse_input("A ; b").unwrap(),
            DEFAULT_PROMPT_TEMPLATE,
            ProgressChannel::default(),
        );
        let id = batch.pending_ids().await.remove(0);
        batch.start_scene(&id).await.unwrap();
        batch.discard().await;

        let late = media(&dir);
        let path = late.path().unwrap();
        assert!(batch.complete_scene(&id, "remote".into(), late).await.is_err());

        assert!(!path.exists());
        assert_eq!(batch.scene(&id).await.unwrap().status(), SceneStatus::Generating);
    }

    #[tokio::test]
    async fn test_reset_clears_session_and_releases_media() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::default();
        let batch = session.submit("A ; b", DEFAULT_PROMPT_TEMPLATE).await.unwrap();
        let id = batch.pending_ids().await.remove(0);
        batch.start_scene(&id).await.unwrap();
        let done = media(&dir);
        let path = done.path().unwrap();
        batch.complete_scene(&id, "remote".into(), done).await.unwrap();

        session.reset().await;

        assert!(session.current().await.is_none());
        assert!(batch.is_discarded());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_dropping_batch_releases_media() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let batch = Batch::new(
                &parse_input("A ; b").unwrap(),
                DEFAULT_PROMPT_TEMPLATE,
                ProgressChannel::default(),
            );
            let id = batch.pending_ids().await.remove(0);
            batch.start_scene(&id).await.unwrap();
            let done = media(&dir);
            let path = done.path().unwrap();
            batch.complete_scene(&id, "remote".into(), done).await.unwrap();
            path
        };

        assert!(!path.exists());
    }
}
