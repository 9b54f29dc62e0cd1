//! Per-trial counters and cross-trial aggregation.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Counters for one spell over one trial.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpellMetrics {
    pub casts: u32,
    pub hits: u32,
    pub crits: u32,
    pub misses: u32,
    pub dodges: u32,
    pub parries: u32,
    pub blocks: u32,
    pub glances: u32,
    pub ticks: u32,
    pub damage: f64,
    pub healing: f64,
    /// Resolutions that reached an unimplemented step.
    pub placeholder_casts: u32,
}

/// Counters for one unit over one trial.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitMetrics {
    pub damage_dealt: f64,
    pub healing_dealt: f64,
    pub damage_taken: f64,
    pub healing_taken: f64,
    pub casts: u32,
    pub deaths: u32,
}

/// One spell's line in a trial result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellReport {
    pub label: String,
    pub metrics: SpellMetrics,
}

/// One unit's line in a trial result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub name: String,
    pub damage: f64,
    pub healing: f64,
    pub dps: f64,
    pub hps: f64,
    pub damage_taken: f64,
    pub deaths: u32,
    pub spells: Vec<SpellReport>,
}

/// Everything one trial produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub seed: u64,
    /// Simulated length of the trial in seconds.
    pub duration: f64,
    pub units: Vec<UnitReport>,
    /// Labels of unimplemented content reached during the trial.
    pub placeholders: Vec<String>,
}

impl TrialResult {
    pub fn unit(&self, name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.name == name)
    }
}

/// Running mean, deviation and range of a sample (Welford's method).
///
/// # Examples
///
/// ```rust
/// use simkernel::Distribution;
///
/// let mut dps = Distribution::new();
/// for sample in [10.0, 12.0, 14.0] {
///     dps.push(sample);
/// }
/// assert_eq!(dps.mean(), 12.0);
/// assert_eq!(dps.min(), 10.0);
/// assert_eq!(dps.max(), 14.0);
/// assert!((dps.stdev() - 2.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Distribution {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation; zero with fewer than two samples.
    pub fn stdev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }

    pub fn min(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.min
        }
    }

    pub fn max(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.max
        }
    }
}

impl Default for Distribution {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Distribution", 5)?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field("mean", &self.mean())?;
        state.serialize_field("stdev", &self.stdev())?;
        state.serialize_field("min", &self.min())?;
        state.serialize_field("max", &self.max())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_distribution() {
        let dist = Distribution::new();
        assert_eq!(dist.count(), 0);
        assert_eq!(dist.mean(), 0.0);
        assert_eq!(dist.stdev(), 0.0);
        assert_eq!(dist.min(), 0.0);
        assert_eq!(dist.max(), 0.0);
    }

    #[test]
    fn test_single_sample_has_no_spread() {
        let mut dist = Distribution::new();
        dist.push(42.0);
        assert_eq!(dist.mean(), 42.0);
        assert_eq!(dist.stdev(), 0.0);
    }

    #[test]
    fn test_distribution_serializes_summary() {
        let mut dist = Distribution::new();
        dist.push(1.0);
        dist.push(3.0);
        let json = serde_json::to_value(dist).unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["mean"], 2.0);
        assert_eq!(json["min"], 1.0);
        assert_eq!(json["max"], 3.0);
    }

    #[test]
    fn test_trial_result_lookup() {
        let result = TrialResult {
            seed: 7,
            duration: 60.0,
            units: vec![UnitReport {
                name: "Rogue".to_string(),
                damage: 6000.0,
                healing: 0.0,
                dps: 100.0,
                hps: 0.0,
                damage_taken: 0.0,
                deaths: 0,
                spells: Vec::new(),
            }],
            placeholders: Vec::new(),
        };
        assert_eq!(result.unit("Rogue").map(|u| u.dps), Some(100.0));
        assert!(result.unit("Mage").is_none());
    }
}
