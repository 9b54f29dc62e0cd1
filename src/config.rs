//! Run configuration.
//!
//! Both config types deserialize from JSON with every field optional.

use crate::error::{SimError, SimResult};
use crate::rng::RngMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a trial ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndCondition {
    /// Run for the configured duration (plus or minus variation).
    #[default]
    FixedDuration,
    /// Also stop as soon as a tracked enemy dies.
    TargetDeath,
}

/// Configuration of one simulation.
///
/// # Examples
///
/// ```rust
/// use simkernel::{EndCondition, SimulationConfig};
///
/// let config = SimulationConfig::from_json(r#"{ "duration_secs": 120, "end_condition": "TargetDeath" }"#).unwrap();
/// assert_eq!(config.duration_secs, 120.0);
/// assert_eq!(config.end_condition, EndCondition::TargetDeath);
/// assert_eq!(config.duration_variation_secs, 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub duration_secs: f64,
    /// Each trial lasts `duration ± variation`, drawn uniformly.
    pub duration_variation_secs: f64,
    pub end_condition: EndCondition,
    pub rng_mode: RngMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration_secs: 180.0,
            duration_variation_secs: 0.0,
            end_condition: EndCondition::FixedDuration,
            rng_mode: RngMode::Shared,
        }
    }
}

impl SimulationConfig {
    pub fn from_json(json: &str) -> SimResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SimError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "duration_secs must be positive, got {}",
                self.duration_secs
            )));
        }
        if !self.duration_variation_secs.is_finite()
            || self.duration_variation_secs < 0.0
            || self.duration_variation_secs >= self.duration_secs
        {
            return Err(SimError::InvalidConfig(format!(
                "duration_variation_secs must be in [0, duration), got {}",
                self.duration_variation_secs
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs)
    }
}

/// Configuration of a batch of trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub iterations: u32,
    pub seed: u64,
    /// Worker threads; zero uses every available core.
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            seed: 0,
            workers: 0,
        }
    }
}

impl RunConfig {
    pub fn from_json(json: &str) -> SimResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SimError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.iterations == 0 {
            return Err(SimError::InvalidConfig("iterations must be at least 1".into()));
        }
        Ok(())
    }
}
