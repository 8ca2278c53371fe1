//! Per-model capabilities.
//!
//! Request shaping differs between model families: only the 3.1 family
//! accepts an explicit `resolution` parameter, older families answer it with
//! `400 INVALID_ARGUMENT`. Known models are listed explicitly; unknown ids fall
//! back to a family-marker check.

use tracing::warn;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "veo-3.1-generate-preview";

const RESOLUTION_FAMILY_MARKER: &str = "veo-3.1";
const FAST_MARKER: &str = "fast";

/// What a model accepts and how it behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    /// Accepts the `resolution` request parameter
    pub supports_resolution: bool,
    /// Turbo variant (shorter generation time)
    pub fast: bool,
}

/// A catalogued model.
#[derive(Debug, Clone, Copy)]
pub struct ModelInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub capabilities: ModelCapabilities,
}

pub const MODEL_CATALOG: &[ModelInfo] = &[
    ModelInfo {
        id: "veo-3.1-generate-preview",
        label: "Veo 3.1 (High Quality - Slow)",
        capabilities: ModelCapabilities {
            supports_resolution: true,
            fast: false,
        },
    },
    ModelInfo {
        id: "veo-3.1-fast-generate-preview",
        label: "Veo 3.1 Fast (Turbo - Recommended)",
        capabilities: ModelCapabilities {
            supports_resolution: true,
            fast: true,
        },
    },
    ModelInfo {
        id: "veo-3.0-generate-001",
        label: "Veo 3.0 (Standard)",
        capabilities: ModelCapabilities {
            supports_resolution: false,
            fast: false,
        },
    },
    ModelInfo {
        id: "veo-3.0-fast-generate-001",
        label: "Veo 3.0 Fast (Turbo)",
        capabilities: ModelCapabilities {
            supports_resolution: false,
            fast: true,
        },
    },
    ModelInfo {
        id: "veo-2.0-generate-001",
        label: "Veo 2.0 (Legacy)",
        capabilities: ModelCapabilities {
            supports_resolution: false,
            fast: false,
        },
    },
];

/// Find a catalogued model by id.
pub fn lookup_model(model: &str) -> Option<&'static ModelInfo> {
    MODEL_CATALOG.iter().find(|info| info.id == model)
}

/// Capabilities for `model`, guessing from the id for uncatalogued models.
pub fn capabilities_for(model: &str) -> ModelCapabilities {
    if let Some(info) = lookup_model(model) {
        return info.capabilities;
    }

    let guessed = ModelCapabilities {
        supports_resolution: model.contains(RESOLUTION_FAMILY_MARKER),
        fast: model.contains(FAST_MARKER),
    };
    warn!(
        model = %model,
        supports_resolution = guessed.supports_resolution,
        "Model not in catalog, inferring capabilities from its id"
    );
    guessed
}
