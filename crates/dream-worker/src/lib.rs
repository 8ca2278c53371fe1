//! Dream scene worker.
//!
//! This crate provides:
//! - Session and batch lifecycle, with media released on discard
//! - Scene queue scheduler with bounded concurrency
//! - Progress events and summaries
//! - Looping playback feed over finished scenes
//! - API key selection when the current key is rejected

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod playback;
pub mod progress;
pub mod scheduler;
pub mod session;

pub use config::WorkerConfig;
pub use credentials::{CredentialSelector, InteractiveKeySelector};
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, SceneLogger};
pub use playback::{PlaybackFeed, PlaybackItem};
pub use progress::{ProgressChannel, ProgressSummary, SceneEvent};
pub use scheduler::{QueueScheduler, TASK_ABORTED_MESSAGE};
pub use session::{Batch, Session};
