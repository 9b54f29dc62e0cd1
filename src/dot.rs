//! Periodic effects: damage and healing over time.
//!
//! Everything that scales a tick on the caster's side is snapshotted when
//! the effect is applied. Target-side multipliers are read at tick time.
//! Re-applying an active effect either rolls the undelivered value into the
//! new application or restarts it, per [`DotConfig::rollover`].

use crate::aura::{AuraConfig, AuraId};
use crate::error::{SimError, SimResult};
use crate::flags::{HitOutcome, SpellFlags};
use crate::outcome::{crit_multiplier, SpellResult, CRIT_ROLL};
use crate::scheduler::{Action, ActionHandle};
use crate::simulation::Simulation;
use crate::spell::SpellId;
use crate::stat::Stat;
use crate::unit::UnitId;
use std::time::Duration;
use tracing::trace;

/// Index of a periodic effect instance within its simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DotId(pub(crate) usize);

/// Shape of a periodic effect.
#[derive(Debug, Clone, PartialEq)]
pub struct DotConfig {
    pub label: String,
    pub num_ticks: u32,
    pub tick_length: Duration,
    pub base_per_tick: f64,
    /// Power coefficient per tick.
    pub coefficient: f64,
    pub is_heal: bool,
    pub can_crit: bool,
    /// Fold undelivered ticks into a re-application instead of dropping them.
    pub rollover: bool,
}

impl DotConfig {
    pub fn new(label: impl Into<String>, num_ticks: u32, tick_length: Duration, base_per_tick: f64) -> Self {
        Self {
            label: label.into(),
            num_ticks,
            tick_length,
            base_per_tick,
            coefficient: 0.0,
            is_heal: false,
            can_crit: false,
            rollover: true,
        }
    }

    pub fn with_coefficient(mut self, coefficient: f64) -> Self {
        self.coefficient = coefficient;
        self
    }

    pub fn healing(mut self) -> Self {
        self.is_heal = true;
        self
    }

    pub fn with_crits(mut self) -> Self {
        self.can_crit = true;
        self
    }

    /// Re-application forfeits the remaining ticks.
    pub fn restarting(mut self) -> Self {
        self.rollover = false;
        self
    }

    pub fn duration(&self) -> Duration {
        self.tick_length * self.num_ticks
    }

    pub(crate) fn validate(&self, spell_label: &str) -> SimResult<()> {
        if self.num_ticks == 0 {
            return Err(SimError::invalid_content(spell_label, "dot has zero ticks"));
        }
        if self.tick_length.is_zero() {
            return Err(SimError::invalid_content(spell_label, "dot has a zero tick length"));
        }
        if self.label.is_empty() {
            return Err(SimError::invalid_content(spell_label, "dot label is empty"));
        }
        Ok(())
    }
}

/// One periodic effect bound to a (spell, target) pair.
#[derive(Debug, Clone)]
pub struct Dot {
    pub(crate) id: DotId,
    pub(crate) spell: SpellId,
    pub(crate) target: UnitId,
    pub(crate) aura: AuraId,
    pub(crate) per_tick: f64,
    pub(crate) crit_chance: f64,
    pub(crate) remaining: u32,
    pub(crate) ticks_done: u32,
    pub(crate) handle: Option<ActionHandle>,
}

impl Dot {
    pub fn id(&self) -> DotId {
        self.id
    }

    pub fn spell(&self) -> SpellId {
        self.spell
    }

    pub fn target(&self) -> UnitId {
        self.target
    }

    /// The backing aura on the target.
    pub fn aura(&self) -> AuraId {
        self.aura
    }

    pub fn per_tick(&self) -> f64 {
        self.per_tick
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.remaining
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Value still to be delivered, before target-side multipliers.
    pub fn undelivered(&self) -> f64 {
        f64::from(self.remaining) * self.per_tick
    }
}

impl Simulation {
    /// The dot for (spell, target), registering it and its aura on first use.
    pub(crate) fn ensure_dot(&mut self, spell: SpellId, target: UnitId) -> SimResult<DotId> {
        if let Some(id) = self.spells[spell.0].dots.get(&target) {
            return Ok(*id);
        }
        let label = match &self.spells[spell.0].config.dot {
            Some(config) => config.label.clone(),
            None => {
                return Err(SimError::invalid_content(
                    &self.spells[spell.0].config.label,
                    "spell has no dot config",
                ))
            }
        };

        let id = DotId(self.dots.len());
        let aura = self.register_aura(
            target,
            AuraConfig::new(label).on_expire(move |sim, _| sim.stop_dot(id)),
        )?;
        self.dots.push(Dot {
            id,
            spell,
            target,
            aura,
            per_tick: 0.0,
            crit_chance: 0.0,
            remaining: 0,
            ticks_done: 0,
            handle: None,
        });
        self.spells[spell.0].dots.insert(target, id);
        Ok(id)
    }

    pub fn dot(&self, id: DotId) -> &Dot {
        &self.dots[id.0]
    }

    pub fn dot_for(&self, spell: SpellId, target: UnitId) -> Option<DotId> {
        self.spells[spell.0].dots.get(&target).copied()
    }

    /// Snapshot of one tick's value on the caster's side.
    fn dot_snapshot(&self, spell: SpellId, config: &DotConfig) -> (f64, f64) {
        let s = &self.spells[spell.0];
        let caster = s.unit;
        let power = self.stat(caster, s.power_stat(config.is_heal));
        let mut per_tick = config.base_per_tick + config.coefficient * power;

        if !s.config.flags.contains(SpellFlags::IGNORE_ATTACKER_MODIFIERS) {
            let pseudo = &self.units[caster.0].pseudo;
            per_tick *= s.mods.total_damage_multiplier() * s.config.damage_multiplier;
            if config.is_heal {
                per_tick *= pseudo.healing_dealt_multiplier;
            } else {
                per_tick *= pseudo.damage_dealt_multiplier;
                if !s.config.school.is_empty() {
                    per_tick *= pseudo.school_damage_dealt.get(s.config.school);
                }
            }
        }

        let crit_chance = if config.can_crit {
            let school_crit = if s.config.school.is_empty() {
                0.0
            } else {
                self.units[caster.0].pseudo.school_crit_chance.get(s.config.school)
            };
            let crit_stat = if s.config.school.is_physical() {
                Stat::MeleeCrit
            } else {
                Stat::SpellCrit
            };
            self.stat(caster, crit_stat) / 100.0
                + school_crit
                + s.config.bonus_crit_chance
                + s.mods.bonus_crit_chance
        } else {
            0.0
        };
        (per_tick, crit_chance)
    }

    /// Apply `spell`'s periodic effect to `target`.
    ///
    /// # Panics
    ///
    /// Panics if the spell has no dot config, or if `target` is on a side the
    /// effect was never registered for. Casts refuse such targets with
    /// [`CastFailure::InvalidTarget`](crate::cast::CastFailure::InvalidTarget).
    pub fn apply_dot(&mut self, spell: SpellId, target: UnitId) -> DotId {
        let config = match self.spells[spell.0].config.dot.clone() {
            Some(config) => config,
            None => panic!("{} has no periodic effect", self.spells[spell.0].config.label),
        };
        let id = match self.ensure_dot(spell, target) {
            Ok(id) => id,
            Err(err) => panic!("cannot apply dot: {}", err),
        };
        let (snapshot, crit_chance) = self.dot_snapshot(spell, &config);

        let dot = &mut self.dots[id.0];
        let n = config.num_ticks;
        dot.per_tick = if dot.remaining > 0 && config.rollover {
            snapshot + dot.undelivered() / f64::from(n)
        } else {
            snapshot
        };
        dot.crit_chance = crit_chance;
        dot.remaining = n;
        dot.ticks_done = 0;
        let old_handle = dot.handle.take();
        trace!(dot = %config.label, target = target.0, per_tick = dot.per_tick, "dot applied");

        if let Some(handle) = old_handle {
            self.scheduler.cancel(handle);
        }
        let at = self.now() + config.tick_length;
        let handle = self.scheduler.schedule_at(at, Action::DotTick(id));
        self.dots[id.0].handle = Some(handle);

        let aura = self.dots[id.0].aura;
        self.activate_aura(aura);
        id
    }

    /// Stop ticking and expire the backing aura; undelivered ticks are lost.
    pub fn cancel_dot(&mut self, id: DotId) {
        self.stop_dot(id);
        let aura = self.dots[id.0].aura;
        self.deactivate_aura(aura);
    }

    fn stop_dot(&mut self, id: DotId) {
        let dot = &mut self.dots[id.0];
        dot.remaining = 0;
        if let Some(handle) = dot.handle.take() {
            self.scheduler.cancel(handle);
        }
    }

    pub(crate) fn dot_tick(&mut self, id: DotId) {
        let (spell, target, per_tick, crit_chance) = {
            let dot = &mut self.dots[id.0];
            dot.handle = None;
            if dot.remaining == 0 {
                return;
            }
            (dot.spell, dot.target, dot.per_tick, dot.crit_chance)
        };
        let (caster, flags, is_heal, tick_length, school_physical, crit_base) = {
            let s = &self.spells[spell.0];
            let config = s.config.dot.as_ref();
            (
                s.unit,
                s.config.flags,
                config.map_or(false, |c| c.is_heal),
                config.map_or(Duration::ZERO, |c| c.tick_length),
                s.config.school.is_physical(),
                s.config.crit_multiplier,
            )
        };

        let mut amount = per_tick;
        let mut outcome = HitOutcome::HIT;
        let mut resist_multiplier = 1.0;
        if !is_heal {
            let (multiplier, partial) = self.roll_mitigation(spell, caster, target);
            if !school_physical {
                resist_multiplier = multiplier;
                outcome |= partial;
            }
        }
        amount *= resist_multiplier;
        if !flags.contains(SpellFlags::IGNORE_TARGET_MODIFIERS) {
            amount *= self.target_multiplier(spell, target, is_heal);
        }
        if crit_chance > 0.0 && self.rng.chance(CRIT_ROLL, crit_chance) {
            outcome = (outcome & !HitOutcome::HIT) | HitOutcome::CRIT;
            let base = crit_base.unwrap_or(if school_physical { 2.0 } else { 1.5 });
            amount *= crit_multiplier(base, self.units[caster.0].pseudo.crit_damage_multiplier);
        }

        let dot = &mut self.dots[id.0];
        dot.remaining -= 1;
        dot.ticks_done += 1;
        let more = dot.remaining > 0;

        let result = SpellResult {
            spell,
            caster,
            target,
            outcome,
            amount,
            resist_multiplier,
            is_heal,
            periodic: true,
            from_proc: self.proc_depth > 0,
        };
        self.deliver_result(&result);

        // A listener re-applied the dot; the new application owns the ticks.
        if self.dots[id.0].handle.is_some() {
            return;
        }
        // The result may have expired the aura, which stops the dot.
        if more && self.dots[id.0].remaining > 0 && !self.trial_ended() {
            let at = self.now() + tick_length;
            let handle = self.scheduler.schedule_at(at, Action::DotTick(id));
            self.dots[id.0].handle = Some(handle);
        } else if !more {
            let aura = self.dots[id.0].aura;
            self.deactivate_aura(aura);
        }
    }

    pub(crate) fn reset_dots(&mut self) {
        for dot in &mut self.dots {
            dot.per_tick = 0.0;
            dot.crit_chance = 0.0;
            dot.remaining = 0;
            dot.ticks_done = 0;
            dot.handle = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DotConfig::new("Moonfire", 4, Duration::from_secs(3), 50.0);
        assert!(config.rollover);
        assert!(!config.can_crit);
        assert!(!config.is_heal);
        assert_eq!(config.duration(), Duration::from_secs(12));
        assert!(config.validate("Moonfire").is_ok());
    }

    #[test]
    fn test_config_validation() {
        let zero_ticks = DotConfig::new("Rend", 0, Duration::from_secs(3), 10.0);
        assert!(zero_ticks.validate("Rend").is_err());

        let zero_length = DotConfig::new("Rend", 5, Duration::ZERO, 10.0);
        assert!(zero_length.validate("Rend").is_err());
    }

    #[test]
    fn test_undelivered_value() {
        let dot = Dot {
            id: DotId(0),
            spell: SpellId(0),
            target: UnitId(1),
            aura: AuraId(0),
            per_tick: 25.0,
            crit_chance: 0.0,
            remaining: 3,
            ticks_done: 2,
            handle: None,
        };
        assert_eq!(dot.undelivered(), 75.0);
        assert!(dot.is_active());
    }
}
