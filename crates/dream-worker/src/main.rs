//! Dream scene generator binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use dream_models::{SceneStatus, DEFAULT_PROMPT_TEMPLATE, SAMPLE_INPUT};
use dream_veo_client::{lookup_model, ApiKeyStore, VeoClient, DEFAULT_MODEL, MODEL_CATALOG};
use dream_worker::{
    init_tracing, Batch, CredentialSelector, InteractiveKeySelector, PlaybackFeed, ProgressChannel,
    ProgressSummary, QueueScheduler, SceneEvent, Session, WorkerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "dreamweaver")]
#[command(about = "Turn a dream description into a looping sequence of generated video scenes", long_about = None)]
struct Args {
    /// Dream description: "theme ; scene ; scene ..."
    #[arg(short, long, conflicts_with_all = ["file", "sample"])]
    input: Option<String>,

    /// Read the dream description from a file
    #[arg(short, long, conflicts_with = "sample")]
    file: Option<PathBuf>,

    /// Use the built-in sample dream
    #[arg(long)]
    sample: bool,

    /// Veo model id (defaults to DREAM_MODEL or the catalog default)
    #[arg(short, long)]
    model: Option<String>,

    /// Prompt template with {QUESTION} and {ANSWER} placeholders
    #[arg(long)]
    template_file: Option<PathBuf>,

    /// List known models and exit
    #[arg(long)]
    list_models: bool,

    /// Player command; the scene file path is appended as the last argument
    #[arg(long)]
    player: Option<String>,

    /// Passes through the finished scenes (0 plays until interrupted)
    #[arg(long, default_value_t = 1)]
    loops: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("dream=info");

    let args = Args::parse();

    if args.list_models {
        for model in MODEL_CATALOG {
            let marker = if model.id == DEFAULT_MODEL { " (default)" } else { "" };
            println!("{:<32} {}{}", model.id, model.label, marker);
        }
        return Ok(());
    }

    let text = read_input(&args).await?;
    let template = match &args.template_file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read template {}", path.display()))?,
        None => DEFAULT_PROMPT_TEMPLATE.to_string(),
    };

    let config = WorkerConfig::from_env();
    let model = args.model.clone().unwrap_or_else(|| config.model.clone());
    if lookup_model(&model).is_none() {
        warn!(model = %model, "Model is not in the catalog, guessing its capabilities");
    }
    info!("Worker config: {:?}", config);

    let keys = ApiKeyStore::from_env();
    let selector = Arc::new(InteractiveKeySelector::new(keys.clone()));
    if !selector.has_credential() {
        selector
            .open_selector()
            .await
            .context("Failed to read an API key")?;
        if !selector.has_credential() {
            bail!("No API key available, set GEMINI_API_KEY");
        }
    }

    let client = Arc::new(VeoClient::from_env(keys).context("Failed to create Veo client")?);
    let scheduler = QueueScheduler::new(config.clone(), client.clone(), client, selector);

    let session = Session::new(ProgressChannel::new(config.progress_capacity));
    let batch = session.submit(&text, &template).await?;

    let reporter = tokio::spawn(report_progress(
        Arc::clone(&batch),
        session.progress().subscribe(),
        model.clone(),
        config.max_concurrent_scenes,
    ));

    tokio::select! {
        _ = scheduler.run(&batch, &model) => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, discarding batch");
            reporter.abort();
            session.reset().await;
            return Ok(());
        }
    }
    reporter.abort();

    let summary = ProgressSummary::of(&batch, &model, config.max_concurrent_scenes).await;
    println!(
        "{}: {} of {} scenes ready, {} failed",
        batch.theme(),
        summary.completed,
        summary.total,
        summary.failed
    );
    for scene in batch
        .snapshot()
        .await
        .iter()
        .filter(|s| s.status() == SceneStatus::Failed)
    {
        println!(
            "  scene {} ({}): {}",
            scene.index() + 1,
            scene.detail(),
            scene.error().unwrap_or("unknown error")
        );
    }

    let mut feed = PlaybackFeed::new(Arc::clone(&batch));
    if feed.is_empty().await {
        warn!("No scenes to play");
    } else {
        tokio::select! {
            result = play(&mut feed, args.player.as_deref(), args.loops) => result?,
            _ = tokio::signal::ctrl_c() => info!("Playback interrupted"),
        }
    }

    session.reset().await;
    Ok(())
}

async fn read_input(args: &Args) -> anyhow::Result<String> {
    if args.sample {
        return Ok(SAMPLE_INPUT.to_string());
    }
    if let Some(text) = &args.input {
        return Ok(text.clone());
    }
    if let Some(path) = &args.file {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    bail!("Describe your dream with --input, --file or --sample")
}

async fn report_progress(
    batch: Arc<Batch>,
    mut events: broadcast::Receiver<SceneEvent>,
    model: String,
    concurrency: usize,
) {
    loop {
        match events.recv().await {
            Ok(event) if &event.batch_id == batch.id() => {
                let summary = ProgressSummary::of(&batch, &model, concurrency).await;
                info!(
                    scene = event.index + 1,
                    status = %event.status,
                    percent = summary.percent,
                    remaining_secs = summary.estimated_remaining.as_secs(),
                    "{}/{} scenes finished",
                    summary.total - summary.pending,
                    summary.total
                );
                if let Some(error) = &event.error {
                    warn!(scene = event.index + 1, "{}", error);
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Progress reporter skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Play through the feed with `player`, or print the playlist without one.
async fn play(feed: &mut PlaybackFeed, player: Option<&str>, loops: u32) -> anyhow::Result<()> {
    let Some(player) = player else {
        for item in feed.items().await {
            println!("{:>3}. {} -> {}", item.position + 1, item.detail, item.path.display());
        }
        return Ok(());
    };

    let mut parts = player.split_whitespace();
    let program = parts.next().context("Empty player command")?;
    let extra: Vec<&str> = parts.collect();

    let mut passes = 0u32;
    while let Some(item) = feed.current().await {
        info!(scene = item.scene_index + 1, "Playing {}", item.detail);
        let status = tokio::process::Command::new(program)
            .args(&extra)
            .arg(&item.path)
            .status()
            .await
            .with_context(|| format!("Failed to run player {}", program))?;
        if !status.success() {
            warn!("Player exited with {}", status);
        }

        let wrapped = feed.on_item_ended().await.map_or(true, |next| next.position == 0);
        if wrapped {
            passes += 1;
            if loops != 0 && passes >= loops {
                break;
            }
        }
    }
    Ok(())
}
