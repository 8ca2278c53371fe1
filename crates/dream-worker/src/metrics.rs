//! Scene processing metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding application installs a recorder.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const SCENES_ADMITTED_TOTAL: &str = "dream_scenes_admitted_total";
    pub const SCENES_COMPLETED_TOTAL: &str = "dream_scenes_completed_total";
    pub const SCENES_FAILED_TOTAL: &str = "dream_scenes_failed_total";
    pub const SCENES_IN_FLIGHT: &str = "dream_scenes_in_flight";
    pub const SCENE_DURATION_SECONDS: &str = "dream_scene_duration_seconds";
    pub const AUTH_FAILURES_TOTAL: &str = "dream_auth_failures_total";
}

pub fn record_scene_admitted(model: &str) {
    let labels = [("model", model.to_string())];
    counter!(names::SCENES_ADMITTED_TOTAL, &labels).increment(1);
    gauge!(names::SCENES_IN_FLIGHT).increment(1.0);
}

pub fn record_scene_completed(model: &str, duration_secs: f64) {
    let labels = [("model", model.to_string())];
    counter!(names::SCENES_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::SCENE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// `stage` is `generation`, `download`, `media` or `aborted`.
pub fn record_scene_failed(model: &str, stage: &str) {
    let labels = [("model", model.to_string()), ("stage", stage.to_string())];
    counter!(names::SCENES_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_scene_settled() {
    gauge!(names::SCENES_IN_FLIGHT).decrement(1.0);
}

pub fn record_auth_failure() {
    counter!(names::AUTH_FAILURES_TOTAL).increment(1);
}
