//! Worker configuration.

use std::path::PathBuf;

use dream_veo_client::DEFAULT_MODEL;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum scenes generating at the same time
    pub max_concurrent_scenes: usize,
    /// Directory for downloaded media files
    pub media_dir: PathBuf,
    /// Generation model used when none is given on the command line
    pub model: String,
    /// Capacity of the progress event channel
    pub progress_capacity: usize,
}

fn default_media_dir() -> PathBuf {
    std::env::temp_dir().join("dreamweaver")
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scenes: 2,
            media_dir: default_media_dir(),
            model: DEFAULT_MODEL.to_string(),
            progress_capacity: 256,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_scenes: std::env::var("DREAM_MAX_CONCURRENT_SCENES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            media_dir: std::env::var("DREAM_MEDIA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_media_dir()),
            model: std::env::var("DREAM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            progress_capacity: std::env::var("DREAM_PROGRESS_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(256),
        }
    }
}
