//! Error types for the simulation kernel.
//!
//! Registration and build problems are represented by the `SimError` enum.
//! Expected runtime branches (a cast that fails its resource check, a roll
//! that misses) are ordinary values and never show up here, and causality
//! violations inside a trial panic instead.

use crate::stat::Stat;
use thiserror::Error;

/// Format a cycle path as a readable string.
fn format_cycle_path(path: &[Stat]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|stat| stat.name())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors reported while configuring, building or running simulations.
///
/// # Examples
///
/// ```rust
/// use simkernel::SimError;
///
/// let err = SimError::InvalidConfig(String::from("iterations must be positive"));
/// assert_eq!(err.to_string(), "Invalid configuration: iterations must be positive");
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Registering a stat dependency would have created a cycle.
    ///
    /// Contains the path of stats involved in the cycle, closed on the
    /// first stat (e.g. `[Strength, AttackPower, Strength]`).
    #[error("Cycle detected in stat dependencies: {}", format_cycle_path(.path))]
    DependencyCycle { path: Vec<Stat> },

    /// The run configuration was rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A spell, aura, dot or proc trigger was registered with bad data.
    #[error("Invalid content '{label}': {reason}")]
    InvalidContent { label: String, reason: String },

    /// The encounter has no target to fight.
    #[error("Encounter has no targets")]
    NoTargets,

    /// An id did not refer to a registered unit.
    #[error("Unknown unit: {0}")]
    UnknownUnit(usize),

    /// Content was registered after the simulation was finalized.
    #[error("Registration is closed: {0}")]
    RegistrationClosed(String),

    /// A report could not be written out as JSON.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Serialization(err.to_string())
    }
}

impl SimError {
    /// Shorthand for [`SimError::InvalidContent`].
    pub fn invalid_content(label: impl Into<String>, reason: impl Into<String>) -> Self {
        SimError::InvalidContent {
            label: label.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message() {
        let err = SimError::DependencyCycle {
            path: vec![Stat::Strength, Stat::AttackPower, Stat::Strength],
        };
        assert_eq!(
            err.to_string(),
            "Cycle detected in stat dependencies: Strength -> AttackPower -> Strength"
        );
    }

    #[test]
    fn test_empty_cycle_message() {
        let err = SimError::DependencyCycle { path: vec![] };
        assert!(err.to_string().ends_with("(empty cycle)"));
    }

    #[test]
    fn test_invalid_content_helper() {
        let err = SimError::invalid_content("Fireball", "min damage above max damage");
        assert_eq!(
            err,
            SimError::InvalidContent {
                label: "Fireball".into(),
                reason: "min damage above max damage".into(),
            }
        );
    }

    #[test]
    fn test_json_error_converts() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err = SimError::from(json_err);
        assert!(matches!(err, SimError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization failed: "));
    }
}
