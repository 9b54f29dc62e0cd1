//! Attack tables, outcome rolls and mitigation.
//!
//! The [`AttackTable`] for an (attacker, defender) pair is derived from both
//! units' current stats each time a roll is made. Rolls never fail: a miss
//! is just another [`HitOutcome`].

use crate::flags::{HitOutcome, SpellFlags};
use crate::school::SpellSchool;
use crate::simulation::Simulation;
use crate::spell::SpellId;
use crate::stat::Stat;
use crate::unit::{HasStats, UnitId};

pub(crate) const OUTCOME_ROLL: &str = "Outcome Roll";
pub(crate) const CRIT_ROLL: &str = "Crit Roll";
pub(crate) const RESIST_ROLL: &str = "Partial Resist";

/// Resist bands: no resist, 25%, 50% and 75%.
const RESIST_BANDS: [f64; 4] = [0.0, 0.25, 0.5, 0.75];
const PARTIAL_FLAGS: [HitOutcome; 4] = [
    HitOutcome::EMPTY,
    HitOutcome::PARTIAL_1_4,
    HitOutcome::PARTIAL_2_4,
    HitOutcome::PARTIAL_3_4,
];

/// How an attempt is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeModel {
    AlwaysHit,
    AlwaysMiss,
    /// Spell hit roll, never crits.
    MagicHit,
    MagicHitAndCrit,
    /// Cannot miss; only rolls for crit.
    MagicCritOnly,
    /// Single-roll white swing table.
    MeleeWhite,
    MeleeSpecialHit,
    /// Avoidance table, then a separate crit roll on a landed attack.
    MeleeSpecialHitAndCrit,
    MeleeSpecialCritOnly,
    RangedHitAndCrit,
    RangedCritOnly,
    Healing,
    HealingCrit,
}

impl OutcomeModel {
    /// True for models that use the physical crit multiplier.
    pub fn is_physical(self) -> bool {
        matches!(
            self,
            OutcomeModel::MeleeWhite
                | OutcomeModel::MeleeSpecialHit
                | OutcomeModel::MeleeSpecialHitAndCrit
                | OutcomeModel::MeleeSpecialCritOnly
                | OutcomeModel::RangedHitAndCrit
                | OutcomeModel::RangedCritOnly
        )
    }

    pub fn is_healing(self) -> bool {
        matches!(self, OutcomeModel::Healing | OutcomeModel::HealingCrit)
    }
}

/// The transient result of one damage or healing attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpellResult {
    pub spell: SpellId,
    pub caster: UnitId,
    pub target: UnitId,
    pub outcome: HitOutcome,
    /// Final amount after every multiplier.
    pub amount: f64,
    /// Fraction of the amount left after resists or armor.
    pub resist_multiplier: f64,
    pub is_heal: bool,
    pub periodic: bool,
    /// Produced while a proc handler was running.
    pub from_proc: bool,
}

impl SpellResult {
    pub fn landed(&self) -> bool {
        self.outcome.landed()
    }

    pub fn is_crit(&self) -> bool {
        self.outcome.is_crit()
    }
}

/// Avoidance and crit chances for one attacker against one defender.
///
/// Chances are fractions in `[0, 1]`. Level difference is
/// `defender.level - attacker.level`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackTable {
    pub level_difference: i32,
    pub attacker_level: u32,
    pub melee_miss: f64,
    pub spell_miss: f64,
    pub dodge: f64,
    pub parry: f64,
    pub glance: f64,
    pub block: f64,
    pub glance_min: f64,
    pub glance_max: f64,
    pub melee_crit: f64,
    pub spell_crit: f64,
    pub block_value: f64,
    pub armor: f64,
}

impl AttackTable {
    pub fn new(attacker: &impl HasStats, defender: &impl HasStats) -> Self {
        let d = defender.level() as i32 - attacker.level() as i32;
        let df = f64::from(d);
        let defender_pseudo = defender.pseudo_stats();
        let expertise = attacker.stat(Stat::Expertise) * 0.0025;

        let melee_miss = (0.05 + 0.01 * df - attacker.stat(Stat::MeleeHit) / 100.0).max(0.0)
            + defender_pseudo.increased_miss_chance;

        let base_spell_miss = if d <= 2 {
            0.04 + 0.01 * df
        } else {
            0.06 + 0.11 * f64::from(d - 2)
        };
        let spell_miss = (base_spell_miss - attacker.stat(Stat::SpellHit) / 100.0).max(0.01)
            + defender_pseudo.increased_miss_chance;

        let from_front = defender_pseudo.in_front_of_target;
        let dodge = (defender.stat(Stat::Dodge) / 100.0 - expertise).max(0.0);
        let parry = if from_front && defender_pseudo.can_parry {
            (defender.stat(Stat::Parry) / 100.0 - expertise).max(0.0)
        } else {
            0.0
        };
        let block = if from_front && defender_pseudo.can_block {
            (defender.stat(Stat::Block) / 100.0).max(0.0)
        } else {
            0.0
        };

        let glance = if d >= 0 { (0.1 * (1.0 + df)).min(1.0) } else { 0.0 };
        let glance_min = (0.7 - 0.05 * df.max(0.0)).clamp(0.01, 1.0);
        let glance_max = (0.95 - 0.05 * df.max(0.0)).clamp(glance_min, 1.0);

        let mut suppression = 0.01 * df.max(0.0);
        if d >= 3 {
            suppression += 0.008;
        }
        let reduced = defender_pseudo.reduced_crit_taken_chance;
        let melee_crit = attacker.stat(Stat::MeleeCrit) / 100.0 - suppression - reduced;
        let spell_crit = attacker.stat(Stat::SpellCrit) / 100.0 - reduced;

        Self {
            level_difference: d,
            attacker_level: attacker.level(),
            melee_miss,
            spell_miss,
            dodge,
            parry,
            glance,
            block,
            glance_min,
            glance_max,
            melee_crit,
            spell_crit,
            block_value: defender.stat(Stat::BlockValue).max(0.0),
            armor: (defender.stat(Stat::Armor) + defender.stat(Stat::BonusArmor)).max(0.0),
        }
    }

    /// Classify a white swing from one uniform roll.
    ///
    /// Table order is miss, dodge, parry, glance, block, crit, hit; each
    /// entry takes its slice of `[0, 1)` after the ones before it.
    pub fn white_outcome(&self, roll: f64, crit_chance: f64, bonus_hit: f64) -> HitOutcome {
        let slices = [
            ((self.melee_miss - bonus_hit).max(0.0), HitOutcome::MISS),
            (self.dodge, HitOutcome::DODGE),
            (self.parry, HitOutcome::PARRY),
            (self.glance, HitOutcome::GLANCE),
            (self.block, HitOutcome::BLOCK),
            (crit_chance.max(0.0), HitOutcome::CRIT),
        ];
        let mut threshold = 0.0;
        for (chance, outcome) in slices {
            threshold += chance;
            if roll < threshold {
                return outcome;
            }
        }
        HitOutcome::HIT
    }

    /// Avoidance for a special attack: miss, dodge, parry, block or hit.
    pub fn special_outcome(&self, roll: f64, bonus_hit: f64) -> HitOutcome {
        let slices = [
            ((self.melee_miss - bonus_hit).max(0.0), HitOutcome::MISS),
            (self.dodge, HitOutcome::DODGE),
            (self.parry, HitOutcome::PARRY),
            (self.block, HitOutcome::BLOCK),
        ];
        let mut threshold = 0.0;
        for (chance, outcome) in slices {
            threshold += chance;
            if roll < threshold {
                return outcome;
            }
        }
        HitOutcome::HIT
    }
}

/// Damage multiplier left after armor.
pub fn armor_multiplier(armor: f64, attacker_level: u32) -> f64 {
    let armor = armor.max(0.0);
    let reduction = armor / (armor + 400.0 + 85.0 * f64::from(attacker_level));
    1.0 - reduction.min(0.75)
}

/// Average fraction resisted for a given effective resistance.
pub fn average_resist(resistance: f64, attacker_level: u32) -> f64 {
    if resistance <= 0.0 {
        return 0.0;
    }
    let level = f64::from(attacker_level.max(1));
    (0.75 * resistance / (5.0 * level)).min(0.75)
}

/// Probabilities of the 0/25/50/75% resist bands, summing to one.
pub fn resist_band_chances(resistance: f64, attacker_level: u32) -> [f64; 4] {
    let average = average_resist(resistance, attacker_level);
    let mut chances = RESIST_BANDS.map(|band| (0.5 - 2.5 * (band - average).abs()).max(0.0));
    let total: f64 = chances.iter().sum();
    if total <= 0.0 {
        return [1.0, 0.0, 0.0, 0.0];
    }
    for chance in &mut chances {
        *chance /= total;
    }
    chances
}

/// Crit damage multiplier: a base of 2.0 for physical and 1.5 otherwise,
/// with the bonus part scaled by the attacker's crit damage multiplier.
pub fn crit_multiplier(base: f64, crit_damage_multiplier: f64) -> f64 {
    1.0 + (base - 1.0) * crit_damage_multiplier
}

impl Simulation {
    fn crit_or_hit(&mut self, chance: f64) -> HitOutcome {
        if self.rng.chance(CRIT_ROLL, chance) {
            HitOutcome::CRIT
        } else {
            HitOutcome::HIT
        }
    }

    fn with_crit_roll(&mut self, base: HitOutcome, chance: f64) -> HitOutcome {
        if !base.landed() || !self.rng.chance(CRIT_ROLL, chance) {
            return base;
        }
        if base == HitOutcome::HIT {
            HitOutcome::CRIT
        } else {
            base | HitOutcome::CRIT
        }
    }

    fn school_crit_bonus(&self, attacker: UnitId, school: SpellSchool) -> f64 {
        if school.is_empty() {
            0.0
        } else {
            self.units[attacker.0].pseudo.school_crit_chance.get(school)
        }
    }

    fn effective_resistance(&self, attacker: UnitId, target: UnitId, school: SpellSchool) -> f64 {
        let lowest = school
            .base_schools()
            .filter_map(|(_, base)| base.resistance_stat())
            .map(|stat| self.stat(target, stat))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));
        match lowest {
            Some(resistance) => (resistance - self.stat(attacker, Stat::SpellPenetration)).max(0.0),
            None => 0.0,
        }
    }

    /// Classify one attempt by `spell` from `attacker` against `target`,
    /// using the table built for that pair.
    pub(crate) fn roll_outcome(
        &mut self,
        spell: SpellId,
        attacker: UnitId,
        target: UnitId,
        table: &AttackTable,
        model: OutcomeModel,
    ) -> HitOutcome {
        let (school, flags, bonus_hit, bonus_crit) = {
            let s = &self.spells[spell.0];
            (
                s.config.school,
                s.config.flags,
                s.config.bonus_hit_chance,
                s.config.bonus_crit_chance + s.mods.bonus_crit_chance,
            )
        };
        let extra_crit = self.school_crit_bonus(attacker, school) + bonus_crit;
        let physical_crit = table.melee_crit + extra_crit;
        let spell_crit = table.spell_crit + extra_crit;

        let binary_resist = if flags.contains(SpellFlags::BINARY)
            && !flags.contains(SpellFlags::IGNORE_RESISTS)
        {
            average_resist(
                self.effective_resistance(attacker, target, school),
                table.attacker_level,
            )
        } else {
            0.0
        };
        let spell_miss = (table.spell_miss - bonus_hit).max(0.0) + binary_resist;

        match model {
            OutcomeModel::AlwaysHit => HitOutcome::HIT,
            OutcomeModel::AlwaysMiss => HitOutcome::MISS,
            OutcomeModel::MagicHit => {
                if self.rng.chance(OUTCOME_ROLL, spell_miss) {
                    HitOutcome::MISS
                } else {
                    HitOutcome::HIT
                }
            }
            OutcomeModel::MagicHitAndCrit => {
                if self.rng.chance(OUTCOME_ROLL, spell_miss) {
                    HitOutcome::MISS
                } else {
                    self.crit_or_hit(spell_crit)
                }
            }
            OutcomeModel::MagicCritOnly => self.crit_or_hit(spell_crit),
            OutcomeModel::MeleeWhite => {
                let roll = self.rng.next_f64(OUTCOME_ROLL);
                table.white_outcome(roll, physical_crit, bonus_hit)
            }
            OutcomeModel::MeleeSpecialHit => {
                let roll = self.rng.next_f64(OUTCOME_ROLL);
                table.special_outcome(roll, bonus_hit)
            }
            OutcomeModel::MeleeSpecialHitAndCrit => {
                let roll = self.rng.next_f64(OUTCOME_ROLL);
                let base = table.special_outcome(roll, bonus_hit);
                self.with_crit_roll(base, physical_crit)
            }
            OutcomeModel::MeleeSpecialCritOnly | OutcomeModel::RangedCritOnly => {
                self.crit_or_hit(physical_crit)
            }
            OutcomeModel::RangedHitAndCrit => {
                let miss = (table.melee_miss - bonus_hit).max(0.0);
                if self.rng.chance(OUTCOME_ROLL, miss) {
                    HitOutcome::MISS
                } else {
                    self.crit_or_hit(physical_crit)
                }
            }
            OutcomeModel::Healing => HitOutcome::HIT,
            OutcomeModel::HealingCrit => {
                let chance = self.stat(attacker, Stat::SpellCrit) / 100.0 + extra_crit;
                self.crit_or_hit(chance)
            }
        }
    }

    /// Resist or armor multiplier for a landed damaging attempt, plus the
    /// partial-resist flag to fold into the outcome.
    pub(crate) fn roll_mitigation(
        &mut self,
        spell: SpellId,
        attacker: UnitId,
        target: UnitId,
    ) -> (f64, HitOutcome) {
        let (school, flags) = {
            let s = &self.spells[spell.0];
            (s.config.school, s.config.flags)
        };
        if flags.contains(SpellFlags::IGNORE_RESISTS) || school.is_empty() {
            return (1.0, HitOutcome::EMPTY);
        }
        let attacker_level = self.units[attacker.0].level;
        if school.is_physical() {
            let armor = self.stat(target, Stat::Armor) + self.stat(target, Stat::BonusArmor);
            return (armor_multiplier(armor, attacker_level), HitOutcome::EMPTY);
        }
        if flags.contains(SpellFlags::BINARY) {
            return (1.0, HitOutcome::EMPTY);
        }

        let resistance = self.effective_resistance(attacker, target, school);
        if resistance <= 0.0 {
            return (1.0, HitOutcome::EMPTY);
        }
        let chances = resist_band_chances(resistance, attacker_level);
        let roll = self.rng.next_f64(RESIST_ROLL);
        let mut threshold = 0.0;
        for (band, chance) in chances.iter().enumerate() {
            threshold += chance;
            if roll < threshold {
                return (1.0 - RESIST_BANDS[band], PARTIAL_FLAGS[band]);
            }
        }
        (1.0, HitOutcome::EMPTY)
    }
}
