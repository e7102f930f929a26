use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// GPA scale the record source reports on. There is deliberately no default:
/// callers must state which scale their data uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GpaScale {
    /// 0.0 – 4.0
    Four,
    /// 0.0 – 10.0
    Ten,
}

impl GpaScale {
    pub fn ceiling(&self) -> f64 {
        match self {
            GpaScale::Four => 4.0,
            GpaScale::Ten => 10.0,
        }
    }

    /// Converts a GPA expressed on the 0–4 scale into this scale.
    pub fn from_four_point(&self, value: f64) -> f64 {
        value * self.ceiling() / 4.0
    }

    pub fn label(&self) -> &'static str {
        match self {
            GpaScale::Four => "0-4",
            GpaScale::Ten => "0-10",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConfidencePolicy {
    Fixed { value: f64 },
    /// Lowers confidence for every measurement that fell back to the neutral default.
    DegradeWithMissing { base: f64, penalty_per_missing: f64 },
}

impl ConfidencePolicy {
    pub const DEFAULT_CONFIDENCE: f64 = 0.85;

    pub fn degrade_from_default() -> Self {
        ConfidencePolicy::DegradeWithMissing {
            base: Self::DEFAULT_CONFIDENCE,
            penalty_per_missing: 0.1,
        }
    }

    pub fn confidence(&self, missing: usize) -> f64 {
        match *self {
            ConfidencePolicy::Fixed { value } => value,
            ConfidencePolicy::DegradeWithMissing {
                base,
                penalty_per_missing,
            } => (base - penalty_per_missing * missing as f64).max(0.0),
        }
    }
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        ConfidencePolicy::Fixed {
            value: Self::DEFAULT_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub gpa_scale: GpaScale,
    #[serde(default)]
    pub confidence: ConfidencePolicy,
}

impl EngineConfig {
    pub fn new(gpa_scale: GpaScale) -> Self {
        Self {
            gpa_scale,
            confidence: ConfidencePolicy::default(),
        }
    }

    pub fn with_confidence(mut self, confidence: ConfidencePolicy) -> Result<Self> {
        self.confidence = confidence;
        self.validate()?;
        Ok(self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("failed to parse engine config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Confidence settings must be finite and within 0.0..=1.0.
    pub fn validate(&self) -> Result<()> {
        let in_unit = |value: f64| (0.0..=1.0).contains(&value);
        match self.confidence {
            ConfidencePolicy::Fixed { value } if !in_unit(value) => {
                bail!("confidence value {value} must lie within 0.0..=1.0")
            }
            ConfidencePolicy::DegradeWithMissing {
                base,
                penalty_per_missing,
            } if !in_unit(base) || !in_unit(penalty_per_missing) => {
                bail!("confidence base and penalty must lie within 0.0..=1.0")
            }
            _ => Ok(()),
        }
    }
}
