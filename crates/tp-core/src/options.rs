//! Engine options

use crate::model::FeatureFlags;

/// Knobs for a panel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Feature switches restored by `ResetAll`.
    pub reset_features: FeatureFlags,
    /// Rescan every tally after each command and log any drift.
    pub verify_counts: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            reset_features: FeatureFlags::default(),
            verify_counts: cfg!(debug_assertions),
        }
    }
}
