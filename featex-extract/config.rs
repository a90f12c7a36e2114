use crate::error::{ExtractError, ExtractResult};

/// Extraction configuration shared by all backends. Threshold semantics
/// are backend-defined (pixel contrast for the FAST backend, confidence
/// for learned backends); the pipeline only forwards them.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractorConfig {
    /// Total feature budget across all pyramid levels.
    pub n_features: usize,
    /// Number of pyramid levels.
    pub n_levels: usize,
    /// Downsampling factor between consecutive levels, > 1.0.
    pub scale_factor: f32,
    /// Lenient per-cell detection threshold tried first.
    pub ini_threshold: f32,
    /// Fallback threshold for cells the first pass leaves empty.
    pub min_threshold: f32,
    /// Worker threads for the intra-level scans.
    pub n_threads: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            n_features: 1000,
            n_levels: 8,
            scale_factor: 1.2,
            ini_threshold: 20.0,
            min_threshold: 7.0,
            n_threads: num_threads_default(),
        }
    }
}

fn num_threads_default() -> usize {
    num_cpus::get().max(1)
}

impl ExtractorConfig {
    /// Preset tuned for frame-rate tracking: fewer features, coarser pyramid.
    pub fn tracking_preset() -> Self {
        Self {
            n_features: 500,
            n_levels: 4,
            scale_factor: 1.2,
            ini_threshold: 20.0,
            min_threshold: 7.0,
            n_threads: num_threads_default(),
        }
    }

    /// Preset for learned backends whose scores live in the unit range.
    pub fn learned_preset() -> Self {
        Self {
            n_features: 1000,
            n_levels: 8,
            scale_factor: 1.2,
            ini_threshold: 0.4,
            min_threshold: 0.2,
            n_threads: num_threads_default(),
        }
    }

    /// Validate configuration parameters. Budgeting bugs are surfaced
    /// here rather than clamped to defaults.
    pub fn validate(&self) -> ExtractResult<()> {
        if self.n_features == 0 {
            return Err(ExtractError::InvalidFeatureCount(self.n_features));
        }
        if self.n_levels == 0 {
            return Err(ExtractError::InvalidLevelCount(self.n_levels));
        }
        if !(self.scale_factor > 1.0) || !self.scale_factor.is_finite() {
            return Err(ExtractError::InvalidScaleFactor(self.scale_factor));
        }
        if !self.ini_threshold.is_finite()
            || !self.min_threshold.is_finite()
            || self.ini_threshold <= 0.0
            || self.min_threshold <= 0.0
        {
            return Err(ExtractError::InvalidThresholds {
                initial: self.ini_threshold,
                fallback: self.min_threshold,
            });
        }
        Ok(())
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "ExtractorConfig: {} features over {} levels (scale {:.2}), thresholds {:.1}/{:.1}, {} threads",
            self.n_features,
            self.n_levels,
            self.scale_factor,
            self.ini_threshold,
            self.min_threshold,
            self.n_threads
        )
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ExtractorConfig::default().validate().is_ok());
        assert!(ExtractorConfig::tracking_preset().validate().is_ok());
        assert!(ExtractorConfig::learned_preset().validate().is_ok());
    }

    #[test]
    fn test_zero_features_rejected() {
        let cfg = ExtractorConfig {
            n_features: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ExtractError::InvalidFeatureCount(0))));
    }

    #[test]
    fn test_zero_levels_rejected() {
        let cfg = ExtractorConfig {
            n_levels: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ExtractError::InvalidLevelCount(0))));
    }

    #[test]
    fn test_degenerate_scale_rejected() {
        for s in [1.0, 0.5, f32::NAN] {
            let cfg = ExtractorConfig {
                scale_factor: s,
                ..Default::default()
            };
            assert!(matches!(cfg.validate(), Err(ExtractError::InvalidScaleFactor(_))));
        }
    }

    #[test]
    fn test_bad_thresholds_rejected() {
        let cfg = ExtractorConfig {
            ini_threshold: 0.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ExtractError::InvalidThresholds { .. })));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_round_trip() {
        let cfg = ExtractorConfig::tracking_preset();
        let json = cfg.to_json().unwrap();
        let back = ExtractorConfig::from_json(&json).unwrap();
        assert_eq!(back.n_features, cfg.n_features);
        assert_eq!(back.n_levels, cfg.n_levels);
    }
}
