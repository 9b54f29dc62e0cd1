//! Primary and pseudo stats.
//!
//! `Stats` is a fixed-cardinality vector with one slot per [`Stat`];
//! `PseudoStats` holds the derived multipliers (cast speed, damage dealt,
//! damage taken, ...) that auras modify multiplicatively.

use crate::school::{SchoolValues, SpellSchool};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Neg, Sub, SubAssign};

macro_rules! define_stats {
    ($($variant:ident),+ $(,)?) => {
        /// A recognized primary stat.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub enum Stat {
            $($variant),+
        }

        impl Stat {
            /// Every stat, in slot order.
            pub const ALL: &'static [Stat] = &[$(Stat::$variant),+];

            /// Stat name as used in serialized stat maps.
            pub fn name(self) -> &'static str {
                match self {
                    $(Stat::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

define_stats!(
    Strength,
    Agility,
    Stamina,
    Intellect,
    Spirit,
    SpellPower,
    HealingPower,
    AttackPower,
    RangedAttackPower,
    MeleeHit,
    SpellHit,
    MeleeCrit,
    SpellCrit,
    MeleeHaste,
    SpellHaste,
    Expertise,
    SpellPenetration,
    Mana,
    Health,
    Armor,
    BonusArmor,
    Defense,
    Dodge,
    Parry,
    Block,
    BlockValue,
    MP5,
    ArcaneResistance,
    FireResistance,
    FrostResistance,
    NatureResistance,
    ShadowResistance,
);

/// Number of stat slots.
pub const STAT_COUNT: usize = Stat::ALL.len();

impl Stat {
    /// Slot index of this stat.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stats that may legitimately drop below zero (resistances can be
    /// shredded past their floor by debuffs).
    pub fn allows_negative(self) -> bool {
        matches!(
            self,
            Stat::ArcaneResistance
                | Stat::FireResistance
                | Stat::FrostResistance
                | Stat::NatureResistance
                | Stat::ShadowResistance
                | Stat::Armor
        )
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A full stat vector.
///
/// # Examples
///
/// ```rust
/// use simkernel::{Stat, Stats};
///
/// let gear = Stats::from_pairs(&[(Stat::Strength, 100.0), (Stat::AttackPower, 200.0)]);
/// let buff = Stats::new().with(Stat::Strength, 20.0);
///
/// let total = gear + buff;
/// assert_eq!(total[Stat::Strength], 120.0);
/// assert_eq!((total - buff), gear);
/// ```
#[derive(Clone, Copy, PartialEq)]
pub struct Stats([f64; STAT_COUNT]);

impl Stats {
    /// All stats zero.
    pub const fn new() -> Self {
        Self([0.0; STAT_COUNT])
    }

    /// Build from `(stat, value)` pairs; repeated stats are summed.
    pub fn from_pairs(pairs: &[(Stat, f64)]) -> Self {
        let mut stats = Self::new();
        for &(stat, value) in pairs {
            stats[stat] += value;
        }
        stats
    }

    /// Return a copy with `stat` set to `value`.
    pub fn with(mut self, stat: Stat, value: f64) -> Self {
        self[stat] = value;
        self
    }

    pub fn get(&self, stat: Stat) -> f64 {
        self.0[stat.index()]
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    /// Component-wise comparison within `tolerance`.
    pub fn approx_eq(&self, other: &Stats, tolerance: f64) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    /// Iterate non-zero slots.
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (Stat, f64)> + '_ {
        Stat::ALL
            .iter()
            .map(move |&stat| (stat, self.0[stat.index()]))
            .filter(|(_, v)| *v != 0.0)
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter_nonzero()).finish()
    }
}

impl Index<Stat> for Stats {
    type Output = f64;

    fn index(&self, stat: Stat) -> &f64 {
        &self.0[stat.index()]
    }
}

impl IndexMut<Stat> for Stats {
    fn index_mut(&mut self, stat: Stat) -> &mut f64 {
        &mut self.0[stat.index()]
    }
}

impl Add for Stats {
    type Output = Stats;

    fn add(mut self, rhs: Stats) -> Stats {
        self += rhs;
        self
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, rhs: Stats) {
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a += b;
        }
    }
}

impl Sub for Stats {
    type Output = Stats;

    fn sub(mut self, rhs: Stats) -> Stats {
        self -= rhs;
        self
    }
}

impl SubAssign for Stats {
    fn sub_assign(&mut self, rhs: Stats) {
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a -= b;
        }
    }
}

impl Neg for Stats {
    type Output = Stats;

    fn neg(mut self) -> Stats {
        for v in self.0.iter_mut() {
            *v = -*v;
        }
        self
    }
}

impl Mul<f64> for Stats {
    type Output = Stats;

    fn mul(mut self, factor: f64) -> Stats {
        for v in self.0.iter_mut() {
            *v *= factor;
        }
        self
    }
}

// Serialized as a `{ "StatName": value }` map holding only non-zero slots.
impl Serialize for Stats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nonzero: Vec<(Stat, f64)> = self.iter_nonzero().collect();
        let mut map = serializer.serialize_map(Some(nonzero.len()))?;
        for (stat, value) in nonzero {
            map.serialize_entry(&stat, &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Stats {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = BTreeMap::<Stat, f64>::deserialize(deserializer)?;
        let mut stats = Stats::new();
        for (stat, value) in map {
            stats[stat] = value;
        }
        Ok(stats)
    }
}

/// A derived multiplier or chance modifier.
///
/// School-scoped variants accept multi-school masks and touch every base
/// school in the mask.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PseudoStat {
    CastSpeedMultiplier,
    MeleeSpeedMultiplier,
    RangedSpeedMultiplier,
    DamageDealtMultiplier,
    DamageTakenMultiplier,
    HealingDealtMultiplier,
    HealingTakenMultiplier,
    CritDamageMultiplier,
    CostMultiplier,
    ThreatMultiplier,
    /// Flat chance (0..1) subtracted from crits against this unit.
    ReducedCritTakenChance,
    /// Flat chance (0..1) added to the miss chance of attacks against this unit.
    IncreasedMissChance,
    SchoolDamageDealtMultiplier(SpellSchool),
    SchoolDamageTakenMultiplier(SpellSchool),
    /// Flat chance (0..1) added to crits of this school.
    SchoolCritChance(SpellSchool),
}

/// Derived stats that are not part of the primary vector.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PseudoStats {
    pub cast_speed_multiplier: f64,
    pub melee_speed_multiplier: f64,
    pub ranged_speed_multiplier: f64,
    pub damage_dealt_multiplier: f64,
    pub damage_taken_multiplier: f64,
    pub healing_dealt_multiplier: f64,
    pub healing_taken_multiplier: f64,
    pub crit_damage_multiplier: f64,
    pub cost_multiplier: f64,
    pub threat_multiplier: f64,
    pub reduced_crit_taken_chance: f64,
    pub increased_miss_chance: f64,
    pub school_damage_dealt: SchoolValues,
    pub school_damage_taken: SchoolValues,
    pub school_crit_chance: SchoolValues,
    /// Whether attacks against this unit come from the front (parry/block possible).
    pub in_front_of_target: bool,
    pub can_block: bool,
    pub can_parry: bool,
}

impl PseudoStats {
    pub fn new() -> Self {
        Self {
            cast_speed_multiplier: 1.0,
            melee_speed_multiplier: 1.0,
            ranged_speed_multiplier: 1.0,
            damage_dealt_multiplier: 1.0,
            damage_taken_multiplier: 1.0,
            healing_dealt_multiplier: 1.0,
            healing_taken_multiplier: 1.0,
            crit_damage_multiplier: 1.0,
            cost_multiplier: 1.0,
            threat_multiplier: 1.0,
            reduced_crit_taken_chance: 0.0,
            increased_miss_chance: 0.0,
            school_damage_dealt: SchoolValues::splat(1.0),
            school_damage_taken: SchoolValues::splat(1.0),
            school_crit_chance: SchoolValues::splat(0.0),
            in_front_of_target: false,
            can_block: false,
            can_parry: false,
        }
    }

    /// Current value. Multi-school masks report the largest contained value.
    pub fn get(&self, stat: PseudoStat) -> f64 {
        match stat {
            PseudoStat::CastSpeedMultiplier => self.cast_speed_multiplier,
            PseudoStat::MeleeSpeedMultiplier => self.melee_speed_multiplier,
            PseudoStat::RangedSpeedMultiplier => self.ranged_speed_multiplier,
            PseudoStat::DamageDealtMultiplier => self.damage_dealt_multiplier,
            PseudoStat::DamageTakenMultiplier => self.damage_taken_multiplier,
            PseudoStat::HealingDealtMultiplier => self.healing_dealt_multiplier,
            PseudoStat::HealingTakenMultiplier => self.healing_taken_multiplier,
            PseudoStat::CritDamageMultiplier => self.crit_damage_multiplier,
            PseudoStat::CostMultiplier => self.cost_multiplier,
            PseudoStat::ThreatMultiplier => self.threat_multiplier,
            PseudoStat::ReducedCritTakenChance => self.reduced_crit_taken_chance,
            PseudoStat::IncreasedMissChance => self.increased_miss_chance,
            PseudoStat::SchoolDamageDealtMultiplier(school) => self.school_damage_dealt.get(school),
            PseudoStat::SchoolDamageTakenMultiplier(school) => self.school_damage_taken.get(school),
            PseudoStat::SchoolCritChance(school) => self.school_crit_chance.get(school),
        }
    }

    /// Multiply a pseudo stat by `factor`.
    pub fn multiply(&mut self, stat: PseudoStat, factor: f64) {
        match stat {
            PseudoStat::SchoolDamageDealtMultiplier(school) => {
                self.school_damage_dealt.multiply(school, factor)
            }
            PseudoStat::SchoolDamageTakenMultiplier(school) => {
                self.school_damage_taken.multiply(school, factor)
            }
            PseudoStat::SchoolCritChance(school) => self.school_crit_chance.multiply(school, factor),
            scalar => *self.scalar_mut(scalar) *= factor,
        }
    }

    /// Add `amount` to a pseudo stat.
    pub fn add(&mut self, stat: PseudoStat, amount: f64) {
        match stat {
            PseudoStat::SchoolDamageDealtMultiplier(school) => {
                self.school_damage_dealt.add(school, amount)
            }
            PseudoStat::SchoolDamageTakenMultiplier(school) => {
                self.school_damage_taken.add(school, amount)
            }
            PseudoStat::SchoolCritChance(school) => self.school_crit_chance.add(school, amount),
            scalar => *self.scalar_mut(scalar) += amount,
        }
    }

    fn scalar_mut(&mut self, stat: PseudoStat) -> &mut f64 {
        match stat {
            PseudoStat::CastSpeedMultiplier => &mut self.cast_speed_multiplier,
            PseudoStat::MeleeSpeedMultiplier => &mut self.melee_speed_multiplier,
            PseudoStat::RangedSpeedMultiplier => &mut self.ranged_speed_multiplier,
            PseudoStat::DamageDealtMultiplier => &mut self.damage_dealt_multiplier,
            PseudoStat::DamageTakenMultiplier => &mut self.damage_taken_multiplier,
            PseudoStat::HealingDealtMultiplier => &mut self.healing_dealt_multiplier,
            PseudoStat::HealingTakenMultiplier => &mut self.healing_taken_multiplier,
            PseudoStat::CritDamageMultiplier => &mut self.crit_damage_multiplier,
            PseudoStat::CostMultiplier => &mut self.cost_multiplier,
            PseudoStat::ThreatMultiplier => &mut self.threat_multiplier,
            PseudoStat::ReducedCritTakenChance => &mut self.reduced_crit_taken_chance,
            PseudoStat::IncreasedMissChance => &mut self.increased_miss_chance,
            PseudoStat::SchoolDamageDealtMultiplier(_)
            | PseudoStat::SchoolDamageTakenMultiplier(_)
            | PseudoStat::SchoolCritChance(_) => {
                unreachable!("school pseudo stats are handled per school")
            }
        }
    }
}

impl Default for PseudoStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_names_and_indices() {
        assert_eq!(Stat::ALL[0], Stat::Strength);
        for (i, stat) in Stat::ALL.iter().enumerate() {
            assert_eq!(stat.index(), i);
        }
        assert_eq!(Stat::SpellPower.name(), "SpellPower");
    }

    #[test]
    fn test_stats_arithmetic() {
        let a = Stats::from_pairs(&[(Stat::Strength, 10.0), (Stat::Strength, 5.0)]);
        assert_eq!(a[Stat::Strength], 15.0);

        let b = Stats::new().with(Stat::Agility, 3.0);
        let sum = a + b;
        assert_eq!(sum[Stat::Agility], 3.0);
        assert_eq!(sum - b, a);
        assert_eq!((-a)[Stat::Strength], -15.0);
        assert_eq!((a * 2.0)[Stat::Strength], 30.0);
        assert!(Stats::new().is_zero());
    }

    #[test]
    fn test_stats_serde_round_trip_skips_zero() {
        let stats = Stats::from_pairs(&[(Stat::Intellect, 120.0), (Stat::SpellPower, 450.0)]);
        let json = serde_json::to_string(&stats).unwrap();
        assert_eq!(json, r#"{"Intellect":120.0,"SpellPower":450.0}"#);

        let parsed: Stats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stats);
    }

    #[test]
    fn test_pseudo_stats_multiply_and_revert() {
        let mut pseudo = PseudoStats::new();
        pseudo.multiply(PseudoStat::CastSpeedMultiplier, 1.3);
        pseudo.multiply(PseudoStat::SchoolDamageTakenMultiplier(SpellSchool::MAGIC), 1.1);
        assert!((pseudo.get(PseudoStat::CastSpeedMultiplier) - 1.3).abs() < 1e-12);
        assert!(
            (pseudo.get(PseudoStat::SchoolDamageTakenMultiplier(SpellSchool::FIRE)) - 1.1).abs()
                < 1e-12
        );
        assert_eq!(
            pseudo.get(PseudoStat::SchoolDamageTakenMultiplier(SpellSchool::PHYSICAL)),
            1.0
        );

        pseudo.multiply(PseudoStat::CastSpeedMultiplier, 1.0 / 1.3);
        pseudo.multiply(PseudoStat::SchoolDamageTakenMultiplier(SpellSchool::MAGIC), 1.0 / 1.1);
        assert!((pseudo.get(PseudoStat::CastSpeedMultiplier) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pseudo_stats_add() {
        let mut pseudo = PseudoStats::new();
        pseudo.add(PseudoStat::ReducedCritTakenChance, 0.03);
        pseudo.add(PseudoStat::SchoolCritChance(SpellSchool::FIRE), 0.05);
        assert_eq!(pseudo.get(PseudoStat::ReducedCritTakenChance), 0.03);
        assert_eq!(pseudo.get(PseudoStat::SchoolCritChance(SpellSchool::FIRE)), 0.05);
        assert_eq!(pseudo.get(PseudoStat::SchoolCritChance(SpellSchool::FROST)), 0.0);
    }
}
