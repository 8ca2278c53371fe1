//! Bounded-concurrency scene queue.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error, info, warn, Instrument};

use dream_models::{GenerationConfig, LocalMedia, Scene, SceneId};
use dream_veo_client::{MediaFetcher, VeoError, VideoGenerator};

use crate::config::WorkerConfig;
use crate::credentials::CredentialSelector;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::SceneLogger;
use crate::metrics;
use crate::session::Batch;

/// Message recorded for a scene whose task ended without an outcome.
pub const TASK_ABORTED_MESSAGE: &str = "Scene task aborted";

/// Drives the pending scenes of a batch through generation, download and
/// local storage, at most `max_concurrent_scenes` at a time.
///
/// The limit is shared by every `run` call on the same scheduler.
pub struct QueueScheduler {
    config: WorkerConfig,
    ctx: Arc<SceneContext>,
    slots: Arc<Semaphore>,
}

/// Everything a scene task needs, shared by all tasks of a run.
struct SceneContext {
    generator: Arc<dyn VideoGenerator>,
    fetcher: Arc<dyn MediaFetcher>,
    credentials: Arc<dyn CredentialSelector>,
    media_dir: PathBuf,
}

/// A spawned scene task. The permit is held here rather than in the task so
/// it is only released once the scene has left `generating`.
struct Admitted {
    scene_id: SceneId,
    _permit: OwnedSemaphorePermit,
}

/// Keeps the in-flight gauge accurate even when a task is aborted.
struct InFlight;

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::record_scene_settled();
    }
}

impl QueueScheduler {
    pub fn new(
        config: WorkerConfig,
        generator: Arc<dyn VideoGenerator>,
        fetcher: Arc<dyn MediaFetcher>,
        credentials: Arc<dyn CredentialSelector>,
    ) -> Self {
        let ctx = Arc::new(SceneContext {
            generator,
            fetcher,
            credentials,
            media_dir: config.media_dir.clone(),
        });
        let slots = Arc::new(Semaphore::new(config.max_concurrent_scenes.max(1)));
        Self { config, ctx, slots }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Process every scene of `batch` that is pending right now.
    ///
    /// Scenes are admitted in batch order and marked generating on admission.
    /// Each admitted scene ends completed or failed; failures are recorded on
    /// the scene, never returned. Returns once all admitted scenes settled, or
    /// as soon as the batch is discarded, in which case in-flight work is
    /// abandoned without touching the batch again.
    pub async fn run(&self, batch: &Arc<Batch>, model: &str) {
        let pending = batch.pending_ids().await;
        if pending.is_empty() || batch.is_discarded() {
            debug!(batch_id = %batch.id(), "No pending scenes");
            return;
        }

        info!(
            batch_id = %batch.id(),
            pending = pending.len(),
            limit = self.config.max_concurrent_scenes.max(1),
            model = %model,
            "Processing scene queue"
        );

        if let Err(e) = tokio::fs::create_dir_all(&self.ctx.media_dir).await {
            warn!(dir = %self.ctx.media_dir.display(), "Failed to create media directory: {}", e);
        }

        let mut queue: VecDeque<SceneId> = pending.into();
        let mut discarded = batch.discarded_signal();
        let mut tasks = JoinSet::new();
        let mut running: HashMap<task::Id, Admitted> = HashMap::new();
        let mut admitted = 0usize;
        let mut abandoned = false;

        while !queue.is_empty() || !tasks.is_empty() {
            tokio::select! {
                biased;
                _ = wait_discarded(&mut discarded), if !abandoned => {
                    warn!(batch_id = %batch.id(), in_flight = tasks.len(), "Batch discarded, abandoning in-flight scenes");
                    tasks.abort_all();
                    queue.clear();
                    abandoned = true;
                }
                joined = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    let (id, failure) = match joined {
                        Some(Ok((id, ()))) => (id, None),
                        Some(Err(e)) => (e.id(), Some(e)),
                        None => continue,
                    };
                    if let Some(slot) = running.remove(&id) {
                        settle(batch, model, slot, failure).await;
                    }
                }
                permit = Arc::clone(&self.slots).acquire_owned(), if !queue.is_empty() => {
                    let Ok(permit) = permit else {
                        queue.clear();
                        continue;
                    };
                    let Some(scene_id) = queue.pop_front() else {
                        continue;
                    };

                    let scene = match batch.start_scene(&scene_id).await {
                        Ok(scene) => scene,
                        Err(WorkerError::BatchDiscarded(_)) => {
                            queue.clear();
                            continue;
                        }
                        Err(e) => {
                            debug!(scene_id = %scene_id, "Skipping scene: {}", e);
                            continue;
                        }
                    };

                    metrics::record_scene_admitted(model);
                    admitted += 1;

                    let ctx = Arc::clone(&self.ctx);
                    let task_batch = Arc::clone(batch);
                    let task_model = model.to_string();
                    let handle = tasks.spawn(async move {
                        let _in_flight = InFlight;
                        ctx.process_scene(&task_batch, scene, &task_model).await;
                    });
                    running.insert(handle.id(), Admitted { scene_id, _permit: permit });
                }
            }
        }

        info!(batch_id = %batch.id(), admitted, "Scene queue drained");
    }
}

/// Record the end of a scene task, then release its slot.
///
/// A task that ended without settling its scene (a panic) leaves the scene
/// failed before the permit goes back to the pool. Cancelled tasks belong to
/// a discarded batch and are not touched.
async fn settle(batch: &Batch, model: &str, slot: Admitted, failure: Option<JoinError>) {
    if let Some(e) = &failure {
        if e.is_cancelled() {
            return;
        }
        error!(batch_id = %batch.id(), scene_id = %slot.scene_id, "Scene task panicked: {}", e);
    }

    if batch.fail_if_generating(&slot.scene_id, TASK_ABORTED_MESSAGE).await.is_some() {
        metrics::record_scene_failed(model, "aborted");
        warn!(batch_id = %batch.id(), scene_id = %slot.scene_id, "Scene task ended without an outcome");
    }
}

async fn wait_discarded(signal: &mut watch::Receiver<bool>) {
    let _ = signal.wait_for(|discarded| *discarded).await;
}

impl SceneContext {
    async fn process_scene(&self, batch: &Batch, scene: Scene, model: &str) {
        let logger = SceneLogger::new(batch.id(), scene.id(), scene.index(), "generate_scene");
        let started = Instant::now();
        logger.log_start(scene.detail());

        let outcome = self
            .generate_and_store(scene.prompt(), model, &logger)
            .instrument(logger.create_span())
            .await;

        match outcome {
            Ok((remote_locator, media)) => {
                match batch.complete_scene(scene.id(), remote_locator, media).await {
                    Ok(_) => {
                        let elapsed = started.elapsed().as_secs_f64();
                        metrics::record_scene_completed(model, elapsed);
                        logger.log_completion(&format!("ready after {:.1}s", elapsed));
                    }
                    Err(e) => logger.log_warning(&format!("Result dropped: {}", e)),
                }
            }
            Err(err) => {
                if err.is_auth_failure() {
                    metrics::record_auth_failure();
                    logger.log_warning("API key rejected, opening key selection");
                    if let Err(e) = self.credentials.open_selector().await {
                        logger.log_warning(&format!("Key selection failed: {}", e));
                    }
                }

                let message = err.to_string();
                logger.log_error(&message);
                metrics::record_scene_failed(model, err.stage());
                if let Err(e) = batch.fail_scene(scene.id(), message).await {
                    logger.log_warning(&format!("Failure not recorded: {}", e));
                }
            }
        }
    }

    async fn generate_and_store(
        &self,
        prompt: &str,
        model: &str,
        logger: &SceneLogger,
    ) -> WorkerResult<(String, LocalMedia)> {
        let remote_locator = self
            .generator
            .generate(prompt, &GenerationConfig::SCENE_DEFAULT, model)
            .await
            .map_err(WorkerError::Generation)?;
        logger.log_progress("generation finished, downloading media");

        let bytes = self
            .fetcher
            .fetch(&remote_locator)
            .await
            .map_err(WorkerError::Download)?;
        if bytes.is_empty() {
            return Err(WorkerError::Download(VeoError::EmptyMedia));
        }

        let dir = self.media_dir.clone();
        let media = tokio::task::spawn_blocking(move || LocalMedia::materialize(&dir, &bytes))
            .await
            .map_err(|e| WorkerError::TaskAborted(e.to_string()))??;

        logger.log_progress(&format!("stored {} bytes", media.size_bytes()));
        Ok((remote_locator, media))
    }
}
