use crate::error::{DetectorError, DetectorResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scale-space detector settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectorConfig {
    /// Layers per octave in which extrema are searched
    pub octave_layers: usize,
    /// Minimum |DoG| response of a refined extremum, relative to [0, 1] intensities
    pub contrast_threshold: f32,
    /// Maximum principal curvature ratio before an extremum counts as an edge
    pub edge_threshold: f32,
    /// Blur of the first layer of every octave
    pub sigma: f32,
    /// Double the input before building the scale space
    pub upsample: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max_octaves: Option<usize>,
    /// Keep only the strongest keypoints
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max_features: Option<usize>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            octave_layers: 3,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            sigma: 1.6,
            upsample: true,
            max_octaves: None,
            max_features: None,
        }
    }
}

impl DetectorConfig {
    /// Fast preset: no upsampling, fewer but stronger features
    pub fn fast_preset() -> Self {
        Self {
            contrast_threshold: 0.06,
            upsample: false,
            max_features: Some(2000),
            ..Self::default()
        }
    }

    pub fn balanced_preset() -> Self {
        Self::default()
    }

    /// Precise preset: lower contrast threshold for weakly textured scenes
    pub fn precise_preset() -> Self {
        Self {
            contrast_threshold: 0.03,
            edge_threshold: 12.0,
            ..Self::default()
        }
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "DetectorConfig: layers={}, contrast={}, edge={}, sigma={}, upsample={}, max_octaves={:?}, max_features={:?}",
            self.octave_layers,
            self.contrast_threshold,
            self.edge_threshold,
            self.sigma,
            self.upsample,
            self.max_octaves,
            self.max_features
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> DetectorResult<()> {
        if self.octave_layers == 0 {
            return Err(DetectorError::InvalidOctaveLayers(self.octave_layers));
        }
        if !self.contrast_threshold.is_finite() || self.contrast_threshold < 0.0 {
            return Err(DetectorError::InvalidContrastThreshold(self.contrast_threshold));
        }
        if !self.edge_threshold.is_finite() || self.edge_threshold < 1.0 {
            return Err(DetectorError::InvalidEdgeThreshold(self.edge_threshold));
        }
        if !self.sigma.is_finite() || self.sigma <= crate::types::SIGMA_IN {
            return Err(DetectorError::InvalidSigma(self.sigma));
        }
        if let Some(n) = self.max_octaves {
            if n == 0 {
                return Err(DetectorError::InvalidMaxOctaves(n));
            }
        }
        if let Some(n) = self.max_features {
            if n == 0 {
                return Err(DetectorError::InvalidMaxFeatures(n));
            }
        }
        Ok(())
    }
}
