//! Engine configuration.
//!
//! [`EngineConfig`] is the in-memory form handed to sessions. [`FileConfig`]
//! is its TOML representation; missing keys take their defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregatorConfig;
use crate::classify::DEFAULT_MAX_IN_FLIGHT;
use crate::error::{ConfigError, ConfigResult};
use crate::infer::{BackwardConfig, ForwardConfig, ScoreNormalization, VotingConfig};

/// Configuration for the diagnostic engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Forward-chaining pass cap (default: 64).
    pub max_iterations: usize,
    /// Backward-chaining recursion depth (default: 8).
    pub max_depth: usize,
    /// Weight of symbolic evidence in the final score (default: 0.7).
    pub alpha: f64,
    /// Vote damping for rules that relied on derived facts (default: 0.8).
    pub derived_damping: f64,
    /// Vote damping for rules that relied on default facts (default: 0.5).
    pub default_damping: f64,
    /// Category firings below this confidence do not vote (default: 0.0).
    pub min_vote_confidence: f64,
    pub normalization: ScoreNormalization,
    /// Bound on one classifier call (default: 2 s).
    pub classifier_timeout: Duration,
    /// Classifier categories kept after calibration (default: 5).
    pub classifier_top_k: usize,
    /// Classifier workers allowed to run at once, including ones left behind
    /// by a timeout (default: 4).
    pub classifier_max_in_flight: usize,
    /// Classifier probability worth mentioning in explanations (default: 0.15).
    pub material_signal: f64,
    /// Top score below which follow-up questions are attached (default: 0.5).
    pub confidence_threshold: f64,
    /// Follow-up questions attached to one diagnosis (default: 5).
    pub max_needed_facts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 64,
            max_depth: 8,
            alpha: 0.7,
            derived_damping: 0.8,
            default_damping: 0.5,
            min_vote_confidence: 0.0,
            normalization: ScoreNormalization::NoisyOr,
            classifier_timeout: Duration::from_secs(2),
            classifier_top_k: 5,
            classifier_max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            material_signal: 0.15,
            confidence_threshold: 0.5,
            max_needed_facts: 5,
        }
    }
}

impl EngineConfig {
    /// Reject weights outside [0, 1] and a zero pass cap.
    pub fn validate(&self) -> ConfigResult<()> {
        let unit = [
            ("alpha", self.alpha),
            ("derived_damping", self.derived_damping),
            ("default_damping", self.default_damping),
            ("min_vote_confidence", self.min_vote_confidence),
            ("material_signal", self.material_signal),
            ("confidence_threshold", self.confidence_threshold),
        ];
        for (name, value) in unit {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must lie in [0, 1], got {value}"),
                });
            }
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                message: "max_iterations must be at least 1".into(),
            });
        }
        if self.classifier_top_k == 0 {
            return Err(ConfigError::Invalid {
                message: "classifier_top_k must be at least 1".into(),
            });
        }
        if self.classifier_max_in_flight == 0 {
            return Err(ConfigError::Invalid {
                message: "classifier_max_in_flight must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn forward(&self) -> ForwardConfig {
        ForwardConfig {
            max_iterations: self.max_iterations,
        }
    }

    pub fn backward(&self) -> BackwardConfig {
        BackwardConfig {
            max_depth: self.max_depth,
        }
    }

    pub fn voting(&self) -> VotingConfig {
        VotingConfig {
            derived_damping: self.derived_damping,
            default_damping: self.default_damping,
            min_vote_confidence: self.min_vote_confidence,
            normalization: self.normalization,
        }
    }

    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig {
            alpha: self.alpha,
            material_signal: self.material_signal,
            normalization: self.normalization,
        }
    }
}

// ---------------------------------------------------------------------------
// TOML file form
// ---------------------------------------------------------------------------

/// Engine configuration as persisted in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_derived_damping")]
    pub derived_damping: f64,
    #[serde(default = "default_default_damping")]
    pub default_damping: f64,
    #[serde(default)]
    pub min_vote_confidence: f64,
    #[serde(default)]
    pub normalization: ScoreNormalization,
    #[serde(default = "default_classifier_timeout_ms")]
    pub classifier_timeout_ms: u64,
    #[serde(default = "default_classifier_top_k")]
    pub classifier_top_k: usize,
    #[serde(default = "default_classifier_max_in_flight")]
    pub classifier_max_in_flight: usize,
    #[serde(default = "default_material_signal")]
    pub material_signal: f64,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_max_needed_facts")]
    pub max_needed_facts: usize,
}

fn default_max_iterations() -> usize {
    64
}
fn default_max_depth() -> usize {
    8
}
fn default_alpha() -> f64 {
    0.7
}
fn default_derived_damping() -> f64 {
    0.8
}
fn default_default_damping() -> f64 {
    0.5
}
fn default_classifier_timeout_ms() -> u64 {
    2_000
}
fn default_classifier_top_k() -> usize {
    5
}
fn default_classifier_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}
fn default_material_signal() -> f64 {
    0.15
}
fn default_confidence_threshold() -> f64 {
    0.5
}
fn default_max_needed_facts() -> usize {
    5
}

impl Default for FileConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for FileConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            max_depth: config.max_depth,
            alpha: config.alpha,
            derived_damping: config.derived_damping,
            default_damping: config.default_damping,
            min_vote_confidence: config.min_vote_confidence,
            normalization: config.normalization,
            classifier_timeout_ms: u64::try_from(config.classifier_timeout.as_millis())
                .unwrap_or(u64::MAX),
            classifier_top_k: config.classifier_top_k,
            classifier_max_in_flight: config.classifier_max_in_flight,
            material_signal: config.material_signal,
            confidence_threshold: config.confidence_threshold,
            max_needed_facts: config.max_needed_facts,
        }
    }
}

impl FileConfig {
    /// Convert to a validated [`EngineConfig`].
    pub fn to_engine_config(&self) -> ConfigResult<EngineConfig> {
        let config = EngineConfig {
            max_iterations: self.max_iterations,
            max_depth: self.max_depth,
            alpha: self.alpha,
            derived_damping: self.derived_damping,
            default_damping: self.default_damping,
            min_vote_confidence: self.min_vote_confidence,
            normalization: self.normalization,
            classifier_timeout: Duration::from_millis(self.classifier_timeout_ms),
            classifier_top_k: self.classifier_top_k,
            classifier_max_in_flight: self.classifier_max_in_flight,
            material_signal: self.material_signal,
            confidence_threshold: self.confidence_threshold,
            max_needed_facts: self.max_needed_facts,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse from TOML text. `origin` names the source in errors.
    pub fn from_toml(content: &str, origin: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}
