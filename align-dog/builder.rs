use crate::config::DetectorConfig;
use crate::detector::DogDetector;
use crate::error::DetectorResult;

/// Builder for creating a `DogDetector`
#[derive(Debug, Clone, Default)]
pub struct DetectorBuilder {
    config: DetectorConfig,
}

impl DetectorBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of layers per octave searched for extrema
    pub fn octave_layers(mut self, layers: usize) -> Self {
        self.config.octave_layers = layers;
        self
    }

    pub fn contrast_threshold(mut self, threshold: f32) -> Self {
        self.config.contrast_threshold = threshold;
        self
    }

    pub fn edge_threshold(mut self, threshold: f32) -> Self {
        self.config.edge_threshold = threshold;
        self
    }

    /// Set the blur of the first layer of every octave
    pub fn sigma(mut self, sigma: f32) -> Self {
        self.config.sigma = sigma;
        self
    }

    /// Enable or disable doubling the input before detection
    pub fn upsample(mut self, enable: bool) -> Self {
        self.config.upsample = enable;
        self
    }

    pub fn max_octaves(mut self, n: usize) -> Self {
        self.config.max_octaves = Some(n);
        self
    }

    /// Keep only the `n` strongest keypoints
    pub fn max_features(mut self, n: usize) -> Self {
        self.config.max_features = Some(n);
        self
    }

    pub fn preset_fast(mut self) -> Self {
        self.config = DetectorConfig::fast_preset();
        self
    }

    pub fn preset_balanced(mut self) -> Self {
        self.config = DetectorConfig::balanced_preset();
        self
    }

    pub fn preset_precise(mut self) -> Self {
        self.config = DetectorConfig::precise_preset();
        self
    }

    /// Build the `DogDetector`
    pub fn build(self) -> DetectorResult<DogDetector> {
        DogDetector::new(self.config)
    }

    /// Generate a summary of the builder's configuration
    pub fn summary(&self) -> String {
        self.config.summary()
    }

    /// Create a builder from an existing `DetectorConfig`
    pub fn from_config(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Convert the builder into a `DetectorConfig`
    pub fn to_config(self) -> DetectorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectorError;

    #[test]
    fn test_builder_sets_fields() {
        let cfg = DetectorBuilder::new()
            .octave_layers(4)
            .contrast_threshold(0.02)
            .edge_threshold(8.0)
            .upsample(false)
            .max_features(500)
            .to_config();
        assert_eq!(cfg.octave_layers, 4);
        assert_eq!(cfg.contrast_threshold, 0.02);
        assert_eq!(cfg.edge_threshold, 8.0);
        assert!(!cfg.upsample);
        assert_eq!(cfg.max_features, Some(500));
    }

    #[test]
    fn test_presets() {
        assert_eq!(DetectorBuilder::new().preset_fast().to_config(), DetectorConfig::fast_preset());
        assert_eq!(
            DetectorBuilder::new().preset_precise().to_config(),
            DetectorConfig::precise_preset()
        );
        assert_eq!(DetectorBuilder::new().preset_balanced().to_config(), DetectorConfig::default());
    }

    #[test]
    fn test_build_validates() {
        let result = DetectorBuilder::new().sigma(0.2).build();
        assert!(matches!(result, Err(DetectorError::InvalidSigma(_))));
        assert!(DetectorBuilder::new().build().is_ok());
    }

    #[test]
    fn test_config_round_trip() {
        let cfg = DetectorConfig::precise_preset();
        assert_eq!(DetectorBuilder::from_config(cfg.clone()).to_config(), cfg);
    }
}
