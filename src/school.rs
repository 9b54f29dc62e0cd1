//! Spell schools.
//!
//! A `SpellSchool` is a bitmask so multi-school spells (e.g. frostfire) can
//! be expressed; per-school modifiers live in a `SchoolValues` array indexed
//! by base school.

use crate::stat::Stat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of damage schools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SpellSchool(u8);

impl SpellSchool {
    pub const NONE: SpellSchool = SpellSchool(0);
    pub const PHYSICAL: SpellSchool = SpellSchool(1 << 0);
    pub const ARCANE: SpellSchool = SpellSchool(1 << 1);
    pub const FIRE: SpellSchool = SpellSchool(1 << 2);
    pub const FROST: SpellSchool = SpellSchool(1 << 3);
    pub const HOLY: SpellSchool = SpellSchool(1 << 4);
    pub const NATURE: SpellSchool = SpellSchool(1 << 5);
    pub const SHADOW: SpellSchool = SpellSchool(1 << 6);

    /// Every non-physical school.
    pub const MAGIC: SpellSchool = SpellSchool(0b0111_1110);

    /// Number of base schools.
    pub const COUNT: usize = 7;

    const BASE: [SpellSchool; SpellSchool::COUNT] = [
        SpellSchool::PHYSICAL,
        SpellSchool::ARCANE,
        SpellSchool::FIRE,
        SpellSchool::FROST,
        SpellSchool::HOLY,
        SpellSchool::NATURE,
        SpellSchool::SHADOW,
    ];

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if any base school in `other` is also in `self`.
    pub const fn matches(self, other: SpellSchool) -> bool {
        self.0 & other.0 != 0
    }

    /// A pure physical school (not mixed with any magic school).
    pub const fn is_physical(self) -> bool {
        self.0 == SpellSchool::PHYSICAL.0
    }

    /// Iterate the base schools contained in this mask, in fixed order.
    pub fn base_schools(self) -> impl Iterator<Item = (usize, SpellSchool)> {
        SpellSchool::BASE
            .into_iter()
            .enumerate()
            .filter(move |(_, school)| self.matches(*school))
    }

    /// Resistance stat of a magic school, `None` for physical or mixed masks.
    pub fn resistance_stat(self) -> Option<Stat> {
        match self {
            SpellSchool::ARCANE => Some(Stat::ArcaneResistance),
            SpellSchool::FIRE => Some(Stat::FireResistance),
            SpellSchool::FROST => Some(Stat::FrostResistance),
            SpellSchool::NATURE => Some(Stat::NatureResistance),
            SpellSchool::SHADOW => Some(Stat::ShadowResistance),
            _ => None,
        }
    }
}

impl BitOr for SpellSchool {
    type Output = SpellSchool;

    fn bitor(self, rhs: SpellSchool) -> SpellSchool {
        SpellSchool(self.0 | rhs.0)
    }
}

impl BitOrAssign for SpellSchool {
    fn bitor_assign(&mut self, rhs: SpellSchool) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for SpellSchool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; SpellSchool::COUNT] =
            ["Physical", "Arcane", "Fire", "Frost", "Holy", "Nature", "Shadow"];
        if self.is_empty() {
            return write!(f, "None");
        }
        let names: Vec<&str> = self.base_schools().map(|(i, _)| NAMES[i]).collect();
        write!(f, "{}", names.join("|"))
    }
}

/// One value per base school.
///
/// Multi-school lookups take the largest value of the contained schools.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchoolValues([f64; SpellSchool::COUNT]);

impl SchoolValues {
    /// Every school set to `value`.
    pub const fn splat(value: f64) -> Self {
        Self([value; SpellSchool::COUNT])
    }

    /// Value for a (possibly multi-school) mask.
    pub fn get(&self, school: SpellSchool) -> f64 {
        school
            .base_schools()
            .map(|(i, _)| self.0[i])
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
            .unwrap_or(1.0)
    }

    /// Multiply every base school in `school` by `factor`.
    pub fn multiply(&mut self, school: SpellSchool, factor: f64) {
        for (i, _) in school.base_schools() {
            self.0[i] *= factor;
        }
    }

    /// Add `amount` to every base school in `school`.
    pub fn add(&mut self, school: SpellSchool, amount: f64) {
        for (i, _) in school.base_schools() {
            self.0[i] += amount;
        }
    }
}

impl Default for SchoolValues {
    fn default() -> Self {
        Self::splat(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_and_physical() {
        let frostfire = SpellSchool::FROST | SpellSchool::FIRE;
        assert!(frostfire.matches(SpellSchool::FIRE));
        assert!(!frostfire.matches(SpellSchool::SHADOW));
        assert!(!frostfire.is_physical());
        assert!(SpellSchool::PHYSICAL.is_physical());
        assert!(SpellSchool::MAGIC.matches(SpellSchool::HOLY));
        assert!(!SpellSchool::MAGIC.matches(SpellSchool::PHYSICAL));
    }

    #[test]
    fn test_display() {
        assert_eq!((SpellSchool::FROST | SpellSchool::FIRE).to_string(), "Fire|Frost");
        assert_eq!(SpellSchool::NONE.to_string(), "None");
    }

    #[test]
    fn test_school_values_multi_school_takes_max() {
        let mut values = SchoolValues::default();
        values.multiply(SpellSchool::FIRE, 1.1);
        values.multiply(SpellSchool::FROST, 1.2);
        assert!((values.get(SpellSchool::FIRE) - 1.1).abs() < 1e-12);
        assert!((values.get(SpellSchool::FROST | SpellSchool::FIRE) - 1.2).abs() < 1e-12);
        assert_eq!(values.get(SpellSchool::SHADOW), 1.0);
    }

    #[test]
    fn test_resistance_stat() {
        assert_eq!(SpellSchool::FIRE.resistance_stat(), Some(Stat::FireResistance));
        assert_eq!(SpellSchool::PHYSICAL.resistance_stat(), None);
        assert_eq!(SpellSchool::HOLY.resistance_stat(), None);
    }
}
