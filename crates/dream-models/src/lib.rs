//! Shared data models for the DreamWeaver scene pipeline.
//!
//! This crate provides:
//! - Scenes, their ids and the status state machine
//! - Prompt templating
//! - Parsing of `theme ; scene ; scene` input
//! - Video generation settings (resolution, aspect ratio)
//! - Locally materialized media handles

pub mod error;
pub mod generation;
pub mod input;
pub mod media;
pub mod prompt;
pub mod scene;

// Re-export common types
pub use error::{InputError, ModelError, ModelResult};
pub use generation::{AspectRatio, GenerationConfig, Resolution};
pub use input::{parse_input, DreamInput, SAMPLE_INPUT};
pub use media::LocalMedia;
pub use prompt::{build_prompt, DEFAULT_PROMPT_TEMPLATE};
pub use scene::{BatchId, Scene, SceneId, SceneStatus};
