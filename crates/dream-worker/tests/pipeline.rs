//! End-to-end scheduler, session and playback tests with in-memory fakes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use dream_models::{DreamInput, GenerationConfig, SceneStatus};
use dream_veo_client::{MediaFetcher, VeoError, VeoResult, VideoGenerator};
use dream_worker::{
    Batch, CredentialSelector, PlaybackFeed, ProgressChannel, QueueScheduler, Session, WorkerConfig,
    WorkerResult, TASK_ABORTED_MESSAGE,
};

/// Prompts are the bare scene detail.
const DETAIL_ONLY: &str = "{ANSWER}";

enum Outcome {
    Api(u16, &'static str),
    Panic,
}

#[derive(Default)]
struct FakeGenerator {
    delay: Duration,
    outcomes: HashMap<&'static str, Outcome>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<String>>,
    configs: Mutex<Vec<GenerationConfig>>,
}

impl FakeGenerator {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn failing(mut self, detail: &'static str, outcome: Outcome) -> Self {
        self.outcomes.insert(detail, outcome);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str, config: &GenerationConfig, _model: &str) -> VeoResult<String> {
        self.calls.lock().unwrap().push(prompt.to_string());
        self.configs.lock().unwrap().push(*config);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.outcomes.get(prompt) {
            Some(Outcome::Api(status, message)) => Err(VeoError::Api {
                status: *status,
                message: message.to_string(),
            }),
            Some(Outcome::Panic) => panic!("generator blew up"),
            None => Ok(format!("mem://{}", prompt)),
        }
    }
}

#[derive(Default)]
struct FakeFetcher {
    forbidden: Vec<&'static str>,
    empty: Vec<&'static str>,
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, remote_locator: &str) -> VeoResult<Vec<u8>> {
        let detail = remote_locator.trim_start_matches("mem://");
        if self.forbidden.iter().any(|d| *d == detail) {
            return Err(VeoError::MediaStatus {
                status: 403,
                reason: "Forbidden".into(),
            });
        }
        if self.empty.iter().any(|d| *d == detail) {
            return Ok(Vec::new());
        }
        Ok(format!("video of {}", detail).into_bytes())
    }
}

#[derive(Default)]
struct RecordingSelector {
    opened: AtomicUsize,
    has_key: AtomicBool,
}

#[async_trait]
impl CredentialSelector for RecordingSelector {
    fn has_credential(&self) -> bool {
        self.has_key.load(Ordering::SeqCst)
    }

    async fn open_selector(&self) -> WorkerResult<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.has_key.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    _media: tempfile::TempDir,
    generator: Arc<FakeGenerator>,
    selector: Arc<RecordingSelector>,
    scheduler: QueueScheduler,
}

fn harness(generator: FakeGenerator, fetcher: FakeFetcher) -> Harness {
    let media = tempfile::tempdir().unwrap();
    let config = WorkerConfig {
        media_dir: media.path().to_path_buf(),
        ..WorkerConfig::default()
    };
    let generator = Arc::new(generator);
    let selector = Arc::new(RecordingSelector::default());
    let scheduler = QueueScheduler::new(
        config,
        generator.clone(),
        Arc::new(fetcher),
        selector.clone(),
    );

    Harness {
        _media: media,
        generator,
        selector,
        scheduler,
    }
}

async fn statuses(batch: &Batch) -> Vec<SceneStatus> {
    batch.snapshot().await.iter().map(|s| s.status()).collect()
}

#[tokio::test]
async fn test_at_most_two_scenes_generate_at_once() {
    let h = harness(FakeGenerator::with_delay(Duration::from_millis(40)), FakeFetcher::default());
    let session = Session::default();
    let mut events = session.progress().subscribe();
    let batch = session
        .submit("Night ; one ; two ; three ; four ; five", DETAIL_ONLY)
        .await
        .unwrap();

    h.scheduler.run(&batch, "veo-3.1-generate-preview").await;

    assert_eq!(h.generator.peak.load(Ordering::SeqCst), 2);
    assert!(statuses(&batch).await.iter().all(|s| *s == SceneStatus::Completed));

    // Replay the event stream and check the generating set never exceeds two
    let mut generating = 0i32;
    let mut max_generating = 0i32;
    while let Ok(event) = events.try_recv() {
        match event.status {
            SceneStatus::Generating => generating += 1,
            SceneStatus::Completed | SceneStatus::Failed => generating -= 1,
            SceneStatus::Pending => {}
        }
        max_generating = max_generating.max(generating);
    }
    assert_eq!(max_generating, 2);
    assert_eq!(generating, 0);
}

#[tokio::test]
async fn test_admission_follows_batch_order() {
    let h = harness(FakeGenerator::with_delay(Duration::from_millis(5)), FakeFetcher::default());
    let session = Session::default();
    let batch = session.submit("Night ; one ; two ; three", DETAIL_ONLY).await.unwrap();

    h.scheduler.run(&batch, "veo-3.1-generate-preview").await;

    let calls = h.generator.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2], "three");

    let configs = h.generator.configs.lock().unwrap().clone();
    assert!(configs.iter().all(|c| *c == GenerationConfig::SCENE_DEFAULT));
}

#[tokio::test]
async fn test_empty_batch_returns_immediately() {
    let h = harness(FakeGenerator::default(), FakeFetcher::default());
    let batch = Arc::new(Batch::new(
        &DreamInput {
            theme: "Nothing".into(),
            details: Vec::new(),
        },
        DETAIL_ONLY,
        ProgressChannel::default(),
    ));

    tokio::time::timeout(Duration::from_secs(1), h.scheduler.run(&batch, "veo-3.1-generate-preview"))
        .await
        .unwrap();

    assert!(h.generator.calls().is_empty());
}

#[tokio::test]
async fn test_rerun_skips_settled_scenes() {
    let h = harness(
        FakeGenerator::default().failing("two", Outcome::Api(500, "quota exhausted")),
        FakeFetcher::default(),
    );
    let session = Session::default();
    let batch = session.submit("Night ; one ; two ; three", DETAIL_ONLY).await.unwrap();

    h.scheduler.run(&batch, "veo-3.1-generate-preview").await;
    assert_eq!(
        statuses(&batch).await,
        vec![SceneStatus::Completed, SceneStatus::Failed, SceneStatus::Completed]
    );

    h.scheduler.run(&batch, "veo-3.1-generate-preview").await;
    assert_eq!(h.generator.calls().len(), 3);
    assert_eq!(
        statuses(&batch).await,
        vec![SceneStatus::Completed, SceneStatus::Failed, SceneStatus::Completed]
    );
}

#[tokio::test]
async fn test_failures_name_the_stage_that_failed() {
    let h = harness(
        FakeGenerator::default().failing("two", Outcome::Api(500, "quota exhausted")),
        FakeFetcher {
            forbidden: vec!["three"],
            empty: vec!["four"],
        },
    );
    let session = Session::default();
    let batch = session
        .submit("Night ; one ; two ; three ; four", DETAIL_ONLY)
        .await
        .unwrap();

    h.scheduler.run(&batch, "veo-3.1-generate-preview").await;

    let scenes = batch.snapshot().await;
    assert_eq!(scenes[0].status(), SceneStatus::Completed);
    assert_eq!(scenes[0].remote_locator(), Some("mem://one"));
    assert!(scenes[0].error().is_none());

    assert_eq!(
        scenes[1].error(),
        Some("Generation failed: Remote API returned 500: quota exhausted")
    );
    assert_eq!(
        scenes[2].error(),
        Some("Download failed: Media request returned 403: Forbidden")
    );
    assert_eq!(scenes[3].error(), Some("Download failed: Empty video file"));
    assert!(scenes[1..].iter().all(|s| s.local_media().is_none()));

    assert_eq!(h.selector.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_key_opens_selector_without_resubmitting() {
    let h = harness(
        FakeGenerator::default().failing("one", Outcome::Api(404, "Requested entity was not found.")),
        FakeFetcher::default(),
    );
    let session = Session::default();
    let batch = session.submit("Night ; one ; two", DETAIL_ONLY).await.unwrap();

    h.scheduler.run(&batch, "veo-3.1-generate-preview").await;

    assert_eq!(h.selector.opened.load(Ordering::SeqCst), 1);
    assert!(h.selector.has_credential());

    let scenes = batch.snapshot().await;
    assert_eq!(scenes[0].status(), SceneStatus::Failed);
    assert!(scenes[0]
        .error()
        .unwrap()
        .contains("Requested entity was not found"));
    assert_eq!(scenes[1].status(), SceneStatus::Completed);

    let one_calls = h.generator.calls().iter().filter(|c| *c == "one").count();
    assert_eq!(one_calls, 1);
}

#[tokio::test]
async fn test_panicking_task_leaves_scene_failed() {
    let h = harness(
        FakeGenerator::default().failing("two", Outcome::Panic),
        FakeFetcher::default(),
    );
    let session = Session::default();
    let batch = session.submit("Night ; one ; two ; three", DETAIL_ONLY).await.unwrap();

    h.scheduler.run(&batch, "veo-3.1-generate-preview").await;

    let scenes = batch.snapshot().await;
    assert!(scenes.iter().all(|s| s.is_terminal()));
    assert_eq!(scenes[1].error(), Some(TASK_ABORTED_MESSAGE));
    assert_eq!(scenes[2].status(), SceneStatus::Completed);
}

#[tokio::test]
async fn test_panicking_task_keeps_its_slot_until_failed() {
    let h = harness(
        FakeGenerator::with_delay(Duration::from_millis(30)).failing("two", Outcome::Panic),
        FakeFetcher::default(),
    );
    let session = Session::default();
    let batch = session
        .submit("Night ; one ; two ; three ; four", DETAIL_ONLY)
        .await
        .unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let sampler = {
        let batch = Arc::clone(&batch);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut max_generating = 0;
            while !done.load(Ordering::SeqCst) {
                let generating = statuses(&batch)
                    .await
                    .into_iter()
                    .filter(|s| *s == SceneStatus::Generating)
                    .count();
                max_generating = max_generating.max(generating);
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            max_generating
        })
    };

    h.scheduler.run(&batch, "veo-3.1-generate-preview").await;
    done.store(true, Ordering::SeqCst);

    assert!(sampler.await.unwrap() <= 2);
    assert!(h.generator.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(
        statuses(&batch).await,
        vec![
            SceneStatus::Completed,
            SceneStatus::Failed,
            SceneStatus::Completed,
            SceneStatus::Completed
        ]
    );
}

#[tokio::test]
async fn test_overlapping_runs_share_the_limit() {
    let h = Arc::new(harness(
        FakeGenerator::with_delay(Duration::from_millis(30)),
        FakeFetcher::default(),
    ));
    let session = Session::default();
    let batch = session
        .submit("Night ; one ; two ; three ; four ; five", DETAIL_ONLY)
        .await
        .unwrap();

    let other = {
        let h = Arc::clone(&h);
        let batch = Arc::clone(&batch);
        tokio::spawn(async move { h.scheduler.run(&batch, "veo-3.1-generate-preview").await })
    };
    h.scheduler.run(&batch, "veo-3.1-generate-preview").await;
    other.await.unwrap();

    assert_eq!(h.generator.peak.load(Ordering::SeqCst), 2);
    assert_eq!(h.generator.calls().len(), 5);
    assert!(statuses(&batch).await.iter().all(|s| *s == SceneStatus::Completed));
}

#[tokio::test]
async fn test_sunflower_dream_plays_in_a_loop() {
    let h = harness(FakeGenerator::default(), FakeFetcher::default());
    let session = Session::default();
    let batch = session
        .submit("What is joy? ; A field of sunflowers ; A child laughing", DETAIL_ONLY)
        .await
        .unwrap();

    h.scheduler.run(&batch, "veo-3.1-fast-generate-preview").await;

    let mut feed = PlaybackFeed::new(Arc::clone(&batch));
    assert_eq!(feed.len().await, 2);

    let first = feed.current().await.unwrap();
    assert_eq!(first.detail, "A field of sunflowers");
    assert_eq!(std::fs::read(&first.path).unwrap(), b"video of A field of sunflowers");

    assert_eq!(feed.on_item_ended().await.unwrap().detail, "A child laughing");
    assert_eq!(feed.on_item_ended().await.unwrap().detail, "A field of sunflowers");
}

#[tokio::test]
async fn test_reset_releases_media_files() {
    let h = harness(FakeGenerator::default(), FakeFetcher::default());
    let session = Session::default();
    let batch = session.submit("Night ; one ; two", DETAIL_ONLY).await.unwrap();

    h.scheduler.run(&batch, "veo-3.1-generate-preview").await;

    let paths: Vec<_> = PlaybackFeed::new(Arc::clone(&batch))
        .items()
        .await
        .into_iter()
        .map(|item| item.path)
        .collect();
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|p| p.exists()));

    session.reset().await;

    assert!(session.current().await.is_none());
    assert!(paths.iter().all(|p| !p.exists()));
}

#[tokio::test]
async fn test_new_submission_abandons_previous_batch() {
    let h = harness(FakeGenerator::with_delay(Duration::from_secs(30)), FakeFetcher::default());
    let session = Session::default();
    let first = session.submit("Night ; one ; two ; three", DETAIL_ONLY).await.unwrap();

    let running = {
        let first = Arc::clone(&first);
        let scheduler = h.scheduler;
        tokio::spawn(async move { scheduler.run(&first, "veo-3.1-generate-preview").await })
    };

    // Let the first two scenes get admitted
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.generator.calls().len(), 2);

    let second = session.submit("Day ; four", DETAIL_ONLY).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("run returns once the batch is discarded")
        .unwrap();

    assert!(first.is_discarded());
    assert_eq!(
        statuses(&first).await,
        vec![SceneStatus::Generating, SceneStatus::Generating, SceneStatus::Pending]
    );
    assert_eq!(h.generator.calls().len(), 2);
    assert_eq!(statuses(&second).await, vec![SceneStatus::Pending]);
}
