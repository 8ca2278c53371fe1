//! Structured scene logging and tracing setup.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dream_models::{BatchId, SceneId};

/// Install the global tracing subscriber.
///
/// `LOG_FORMAT=json` switches to JSON lines; otherwise output is coloured
/// text. `RUST_LOG` directives are honoured on top of `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in [default_directive, "hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Logger carrying the batch, scene and operation of one unit of work.
#[derive(Debug, Clone)]
pub struct SceneLogger {
    batch_id: String,
    scene_id: String,
    index: usize,
    operation: String,
}

impl SceneLogger {
    /// Create a logger for one operation on one scene.
    pub fn new(batch_id: &BatchId, scene_id: &SceneId, index: usize, operation: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            scene_id: scene_id.to_string(),
            index,
            operation: operation.to_string(),
        }
    }

    /// Log the start of the operation.
    pub fn log_start(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            scene_id = %self.scene_id,
            scene_index = self.index,
            operation = %self.operation,
            "Scene started: {}", message
        );
    }

    /// Log an intermediate step.
    pub fn log_progress(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            scene_id = %self.scene_id,
            scene_index = self.index,
            operation = %self.operation,
            "Scene progress: {}", message
        );
    }

    /// Log a recoverable problem.
    pub fn log_warning(&self, message: &str) {
        warn!(
            batch_id = %self.batch_id,
            scene_id = %self.scene_id,
            scene_index = self.index,
            operation = %self.operation,
            "Scene warning: {}", message
        );
    }

    /// Log the failure that ended the operation.
    pub fn log_error(&self, message: &str) {
        error!(
            batch_id = %self.batch_id,
            scene_id = %self.scene_id,
            scene_index = self.index,
            operation = %self.operation,
            "Scene error: {}", message
        );
    }

    /// Log successful completion.
    pub fn log_completion(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            scene_id = %self.scene_id,
            scene_index = self.index,
            operation = %self.operation,
            "Scene completed: {}", message
        );
    }

    /// Get the scene ID.
    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    /// Get the operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span wrapping the whole lifetime of the scene task.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "scene",
            batch_id = %self.batch_id,
            scene_id = %self.scene_id,
            scene_index = self.index,
            operation = %self.operation
        )
    }
}
