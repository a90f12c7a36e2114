use crate::backend::{BackendResult, DetectorBackend};
use crate::fast::FastBackend;
use crate::learned::{LearnedBackend, ScoreModel};

/// Tagged backend selection. Construction is explicit at the call site
/// that assembles the extractor; there is no ambient registry.
pub enum BackendConfig {
    /// Grid-local FAST corner detector with rotated BRIEF descriptors.
    Fast {
        /// Orientation/descriptor patch diameter, odd and >= 7.
        patch_size: usize,
        /// Non-max suppression radius in pixels.
        nms_radius: f32,
    },
    /// Whole-image learned detector over an external score model.
    Learned {
        model: Box<dyn ScoreModel>,
        nms_radius: f32,
    },
}

impl BackendConfig {
    /// FAST backend with the conventional patch and suppression radius.
    pub fn default_fast() -> Self {
        BackendConfig::Fast {
            patch_size: featex_core::PATCH_SIZE,
            nms_radius: 3.0,
        }
    }
}

/// Build a detector backend from its configuration. Fails fast on invalid
/// parameters so extraction never runs against a half-initialized backend.
pub fn build_backend(config: BackendConfig) -> BackendResult<Box<dyn DetectorBackend>> {
    match config {
        BackendConfig::Fast { patch_size, nms_radius } => {
            Ok(Box::new(FastBackend::new(patch_size, nms_radius)?))
        }
        BackendConfig::Learned { model, nms_radius } => {
            Ok(Box::new(LearnedBackend::new(model, nms_radius)))
        }
    }
}
