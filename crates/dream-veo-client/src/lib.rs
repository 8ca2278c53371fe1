//! Client for the Veo video generation API.
//!
//! Video generation is a long-running remote operation: a request is
//! submitted, then the returned operation is polled at a fixed interval until
//! it reports completion. The finished operation carries a remote locator for
//! the generated media, which is downloaded with the same API key.

pub mod capability;
pub mod client;
pub mod error;
pub mod generator;
pub mod keys;
pub mod types;

pub use capability::{capabilities_for, lookup_model, ModelCapabilities, ModelInfo, DEFAULT_MODEL, MODEL_CATALOG};
pub use client::{VeoClient, VeoClientConfig};
pub use error::{VeoError, VeoResult, AUTH_FAILURE_MARKER};
pub use generator::{MediaFetcher, VideoGenerator};
pub use keys::ApiKeyStore;
