use align_dog::DetectorConfig;
use align_flann::{MatcherConfig, DEFAULT_RATIO};
use align_geometry::RansacParams;

use crate::error::{AlignError, AlignResult};
use crate::visualization::VisualizationConfig;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Settings of every stage of the pairwise alignment pipeline
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AlignConfig {
    /// Lowe ratio: keep a match only if best < ratio * second best
    pub ratio: f32,
    /// Worker threads for the global pool; `None` uses every core
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub threads: Option<usize>,
    pub detector: DetectorConfig,
    pub matcher: MatcherConfig,
    pub ransac: RansacParams,
    pub visualization: VisualizationConfig,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_RATIO,
            threads: None,
            detector: DetectorConfig::default(),
            matcher: MatcherConfig::default(),
            ransac: RansacParams::default(),
            visualization: VisualizationConfig::default(),
        }
    }
}

impl AlignConfig {
    /// No upsampling, fewer checks and RANSAC iterations
    pub fn fast_preset() -> Self {
        Self {
            detector: DetectorConfig::fast_preset(),
            matcher: MatcherConfig::fast_preset(),
            ransac: RansacParams::fast_preset(),
            ..Self::default()
        }
    }

    pub fn balanced_preset() -> Self {
        Self::default()
    }

    /// More trees and checks, stricter reprojection threshold
    pub fn precise_preset() -> Self {
        Self {
            detector: DetectorConfig::precise_preset(),
            matcher: MatcherConfig::precise_preset(),
            ransac: RansacParams::precise_preset(),
            ..Self::default()
        }
    }

    /// Look up a preset by name (`fast`, `balanced` or `precise`)
    pub fn from_preset(name: &str) -> AlignResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::fast_preset()),
            "balanced" | "default" => Ok(Self::balanced_preset()),
            "precise" => Ok(Self::precise_preset()),
            other => Err(AlignError::Config(format!(
                "Unknown preset '{}' (expected fast, balanced or precise)",
                other
            ))),
        }
    }

    pub fn with_ratio(mut self, ratio: f32) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_matcher(mut self, matcher: MatcherConfig) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_ransac(mut self, ransac: RansacParams) -> Self {
        self.ransac = ransac;
        self
    }

    pub fn with_visualization(mut self, visualization: VisualizationConfig) -> Self {
        self.visualization = visualization;
        self
    }

    /// Fix the seeds of both the KD forest and RANSAC sampling
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.matcher.seed = Some(seed);
        self.ransac.random_seed = Some(seed);
        self
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "AlignConfig: ratio={}, threads={:?}\n  {}\n  {}\n  {}\n  {}",
            self.ratio,
            self.threads,
            self.detector.summary(),
            self.matcher.summary(),
            self.ransac.summary(),
            self.visualization.summary()
        )
    }

    /// Validate every nested configuration
    pub fn validate(&self) -> AlignResult<()> {
        if !self.ratio.is_finite() || self.ratio <= 0.0 || self.ratio > 1.0 {
            return Err(AlignError::Config(format!(
                "Invalid ratio: {} (must be in (0, 1])",
                self.ratio
            )));
        }
        if self.threads == Some(0) {
            return Err(AlignError::Config("Invalid thread count: 0 (must be >= 1)".into()));
        }
        self.detector
            .validate()
            .map_err(|e| AlignError::Config(e.to_string()))?;
        self.matcher.validate()?;
        self.ransac.validate()?;
        self.visualization.validate()?;
        Ok(())
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> AlignResult<()> {
        write_file(path.as_ref(), &self.to_json()?)
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> AlignResult<Self> {
        Self::from_json(&read_file(path.as_ref())?)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> AlignResult<()> {
        write_file(path.as_ref(), &self.to_toml()?)
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> AlignResult<Self> {
        Self::from_toml(&read_file(path.as_ref())?)
    }

    /// Load from a `.json` or `.toml` file, chosen by extension
    #[cfg(feature = "serde")]
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> AlignResult<Self> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            Some("json") => Self::load_json(path),
            Some("toml") => Self::load_toml(path),
            _ => Err(AlignError::Config(format!(
                "Unsupported config file {} (expected .json or .toml)",
                path.display()
            ))),
        }
    }

    /// Save to a `.json` or `.toml` file, chosen by extension
    #[cfg(feature = "serde")]
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> AlignResult<()> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            Some("json") => self.save_json(path),
            Some("toml") => self.save_toml(path),
            _ => Err(AlignError::Config(format!(
                "Unsupported config file {} (expected .json or .toml)",
                path.display()
            ))),
        }
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> AlignResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| AlignError::Config(e.to_string()))
    }

    /// Deserialize from JSON string and validate
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> AlignResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| AlignError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> AlignResult<String> {
        toml::to_string_pretty(self).map_err(|e| AlignError::Config(e.to_string()))
    }

    /// Deserialize from TOML string and validate
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> AlignResult<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| AlignError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "serde")]
fn extension(path: &std::path::Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(feature = "serde")]
fn read_file(path: &std::path::Path) -> AlignResult<String> {
    std::fs::read_to_string(path).map_err(|source| AlignError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(feature = "serde")]
fn write_file(path: &std::path::Path, content: &str) -> AlignResult<()> {
    std::fs::write(path, content).map_err(|source| AlignError::Io {
        path: path.to_path_buf(),
        source,
    })
}
