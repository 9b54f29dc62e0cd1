//! The cast pipeline.
//!
//! `cast` runs the resource check, sets up timing, and either resolves the
//! spell immediately or schedules a hardcast continuation. Resolution walks
//! the spell's step list, rolling outcomes and delivering results.

use crate::aura::AuraEvent;
use crate::flags::{HitOutcome, ProcMask, SpellFlags};
use crate::outcome::{crit_multiplier, AttackTable, OutcomeModel, SpellResult};
use crate::scheduler::{Action, ActionHandle};
use crate::simulation::Simulation;
use crate::spell::{BaseAmount, SpellId, SpellStep, StepTarget};
use crate::stat::Stat;
use crate::unit::{UnitId, UnitKind};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Shortest non-zero global cooldown.
pub const MIN_GCD: Duration = Duration::from_secs(1);

const DAMAGE_ROLL: &str = "Damage Roll";
const GLANCE_ROLL: &str = "Glance Roll";

/// Why a cast attempt was refused. Refusals have no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastFailure {
    UnitDisabled,
    Casting,
    OnCooldown,
    OnSharedCooldown,
    OnGcd,
    InsufficientResource,
    ConditionFailed,
    /// The target is on the wrong side for this spell.
    InvalidTarget,
}

/// What a cast attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOutcome {
    /// Resolved immediately.
    Completed,
    /// Hardcast started; resolves at `completes_at`.
    Started { completes_at: Duration },
    Failed(CastFailure),
}

impl CastOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, CastOutcome::Failed(_))
    }
}

/// An in-progress hardcast.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Hardcast {
    pub(crate) spell: SpellId,
    pub(crate) target: UnitId,
    pub(crate) completes_at: Duration,
    /// When the GCD of this cast alone would have ended.
    pub(crate) gcd_ready_at: Duration,
    pub(crate) handle: ActionHandle,
}

/// Per-resolution bookkeeping.
struct StepContext {
    spell: SpellId,
    caster: UnitId,
    target: UnitId,
    landed: bool,
}

impl Simulation {
    /// Check every cast precondition without side effects.
    pub fn can_cast(&self, spell: SpellId) -> Result<(), CastFailure> {
        let s = &self.spells[spell.0];
        let unit = &self.units[s.unit.0];
        let flags = s.config.flags;

        if !unit.enabled {
            return Err(CastFailure::UnitDisabled);
        }
        if unit.hardcast.is_some() && !flags.contains(SpellFlags::CAST_WHILE_CASTING) {
            return Err(CastFailure::Casting);
        }
        if let Some(cd) = &s.cooldown {
            if !self.is_cooldown_ready(cd) {
                return Err(CastFailure::OnCooldown);
            }
        }
        if let Some(cd) = &s.config.cast.shared_cooldown {
            if !self.is_cooldown_ready(cd) {
                return Err(CastFailure::OnSharedCooldown);
            }
        }
        if !s.config.cast.gcd.is_zero() && !self.is_timer_ready(unit.gcd) {
            return Err(CastFailure::OnGcd);
        }
        if let Some(cost) = self.spell_cost(spell) {
            let bar = unit.resource_bar(cost.kind);
            if !bar.enabled || bar.current + 1e-9 < cost.amount {
                return Err(CastFailure::InsufficientResource);
            }
        }
        if let Some(condition) = &s.config.extra_condition {
            if !condition(self, spell) {
                return Err(CastFailure::ConditionFailed);
            }
        }
        Ok(())
    }

    /// Effective cast time after spell modifiers and haste.
    pub fn cast_time(&self, spell: SpellId) -> Duration {
        let s = &self.spells[spell.0];
        let base = s.config.cast.cast_time;
        if base.is_zero() {
            return base;
        }
        let mut secs = base.as_secs_f64() * s.mods.cast_time_multiplier;
        if !s.config.flags.contains(SpellFlags::IGNORE_HASTE) {
            secs /= self.haste_divisor(s.unit, s.config.proc_mask);
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Effective GCD: hasted like a cast, clamped to [`MIN_GCD`].
    pub fn gcd_time(&self, spell: SpellId) -> Duration {
        let s = &self.spells[spell.0];
        let base = s.config.cast.gcd;
        if base.is_zero() {
            return base;
        }
        let mut secs = base.as_secs_f64();
        if !s.config.flags.contains(SpellFlags::IGNORE_HASTE) {
            secs /= self.haste_divisor(s.unit, s.config.proc_mask);
        }
        Duration::from_secs_f64(secs).max(MIN_GCD)
    }

    pub(crate) fn haste_divisor(&self, unit: UnitId, mask: ProcMask) -> f64 {
        let pseudo = &self.units[unit.0].pseudo;
        if mask.matches(ProcMask::MELEE) {
            pseudo.melee_speed_multiplier * (1.0 + self.stat(unit, Stat::MeleeHaste) / 100.0)
        } else if mask.matches(ProcMask::RANGED) {
            pseudo.ranged_speed_multiplier * (1.0 + self.stat(unit, Stat::MeleeHaste) / 100.0)
        } else {
            pseudo.cast_speed_multiplier * (1.0 + self.stat(unit, Stat::SpellHaste) / 100.0)
        }
    }

    /// Helpful spells default to the caster, harmful ones to its current target.
    fn resolve_target(&self, spell: SpellId, target: Option<UnitId>) -> Result<UnitId, CastFailure> {
        let s = &self.spells[spell.0];
        let helpful = s.config.is_helpful();
        let target = if helpful {
            target.unwrap_or(s.unit)
        } else {
            target.or(self.units[s.unit.0].current_target).unwrap_or_else(|| {
                panic!(
                    "{} cast by {} has no target",
                    s.config.label, self.units[s.unit.0].name
                )
            })
        };

        let caster_hostile = self.units[s.unit.0].kind == UnitKind::Enemy;
        let target_hostile = self.units[target.0].kind == UnitKind::Enemy;
        if helpful && caster_hostile != target_hostile {
            return Err(CastFailure::InvalidTarget);
        }
        if s.config.dot.is_some() && !s.dots.contains_key(&target) {
            return Err(CastFailure::InvalidTarget);
        }
        Ok(target)
    }

    /// Attempt to cast `spell` on `target`. Without one, harmful spells go to
    /// the caster's current target and helpful spells to the caster.
    ///
    /// # Panics
    ///
    /// Panics if a harmful spell has no target at all.
    pub fn cast(&mut self, spell: SpellId, target: Option<UnitId>) -> CastOutcome {
        if let Err(failure) = self.can_cast(spell) {
            trace!(spell = %self.spells[spell.0].config.label, ?failure, "cast refused");
            return CastOutcome::Failed(failure);
        }
        let target = match self.resolve_target(spell, target) {
            Ok(target) => target,
            Err(failure) => {
                trace!(spell = %self.spells[spell.0].config.label, ?failure, "cast refused");
                return CastOutcome::Failed(failure);
            }
        };
        let caster = self.spells[spell.0].unit;
        let now = self.now();

        let cast_time = self.cast_time(spell);
        let gcd = self.gcd_time(spell);

        if let Some(cost) = self.spell_cost(spell) {
            self.spend_resource(caster, cost.kind, cost.amount);
        }

        let gcd_ready_at = now + gcd;
        if !gcd.is_zero() {
            let hold = if self.spells[spell.0]
                .config
                .flags
                .contains(SpellFlags::CAST_TIME_NO_GCD)
            {
                gcd
            } else {
                gcd.max(cast_time)
            };
            let gcd_timer = self.units[caster.0].gcd;
            self.set_timer_ready_at(gcd_timer, now + hold);
        }

        if let Some(cd) = self.spells[spell.0].cooldown {
            let duration = self.spell_cooldown_duration(spell).unwrap_or(cd.duration);
            self.set_timer_ready_at(cd.timer, now + cast_time + duration);
        }
        if let Some(shared) = self.spells[spell.0].config.cast.shared_cooldown {
            self.set_timer_ready_at(shared.timer, now + cast_time + shared.duration);
        }

        self.spells[spell.0].metrics.casts += 1;
        self.units[caster.0].metrics.casts += 1;
        debug!(
            unit = %self.units[caster.0].name,
            spell = %self.spells[spell.0].config.label,
            t = ?now,
            cast_time = ?cast_time,
            "cast started"
        );

        if cast_time.is_zero() {
            self.resolve_spell(spell, caster, target);
            return CastOutcome::Completed;
        }

        let completes_at = now + cast_time;
        let handle = self
            .scheduler
            .schedule_at(completes_at, Action::CastComplete(caster));
        self.units[caster.0].hardcast = Some(Hardcast {
            spell,
            target,
            completes_at,
            gcd_ready_at,
            handle,
        });
        CastOutcome::Started { completes_at }
    }

    /// Resolve `spell` right away, skipping cost, timing and cooldowns.
    ///
    /// A target on the wrong side is skipped without effect.
    pub fn cast_triggered(&mut self, spell: SpellId, target: Option<UnitId>) {
        let target = match self.resolve_target(spell, target) {
            Ok(target) => target,
            Err(failure) => {
                trace!(spell = %self.spells[spell.0].config.label, ?failure, "triggered cast skipped");
                return;
            }
        };
        let caster = self.spells[spell.0].unit;
        self.spells[spell.0].metrics.casts += 1;
        self.resolve_spell(spell, caster, target);
    }

    pub fn is_casting(&self, unit: UnitId) -> bool {
        self.units[unit.0].hardcast.is_some()
    }

    /// Time the current hardcast completes, if any.
    pub fn hardcast_ends_at(&self, unit: UnitId) -> Option<Duration> {
        self.units[unit.0].hardcast.map(|h| h.completes_at)
    }

    /// Cancel the unit's hardcast. The cost is not refunded.
    ///
    /// Returns the interrupted spell.
    pub fn interrupt_cast(&mut self, unit: UnitId) -> Option<SpellId> {
        let hardcast = self.units[unit.0].hardcast.take()?;
        self.scheduler.cancel(hardcast.handle);

        let now = self.now();
        let gcd_timer = self.units[unit.0].gcd;
        let gcd_ready_at = hardcast.gcd_ready_at.max(now);
        if self.timer(gcd_timer).ready_at() > gcd_ready_at {
            self.set_timer_ready_at(gcd_timer, gcd_ready_at);
        }
        debug!(
            unit = %self.units[unit.0].name,
            spell = %self.spells[hardcast.spell.0].config.label,
            t = ?now,
            "cast interrupted"
        );

        if let Some(handle) = self.units[unit.0].ready_handle.take() {
            self.scheduler.cancel(handle);
        }
        self.request_rotation(unit);
        Some(hardcast.spell)
    }

    pub(crate) fn complete_cast(&mut self, unit: UnitId) {
        if let Some(hardcast) = self.units[unit.0].hardcast.take() {
            self.resolve_spell(hardcast.spell, unit, hardcast.target);
        }
    }

    pub(crate) fn resolve_spell(&mut self, spell: SpellId, caster: UnitId, target: UnitId) {
        let steps = self.spells[spell.0].steps.clone();
        let mut ctx = StepContext {
            spell,
            caster,
            target,
            landed: true,
        };
        self.run_steps(&steps, &mut ctx);

        let flags = self.spells[spell.0].config.flags;
        if !flags.contains(SpellFlags::NO_ON_CAST_COMPLETE) && !self.trial_ended() {
            self.dispatch_cast_complete(caster, spell, target);
        }
    }

    fn run_steps(&mut self, steps: &[SpellStep], ctx: &mut StepContext) {
        for step in steps {
            match step {
                SpellStep::Damage {
                    base,
                    coefficient,
                    outcome,
                } => {
                    let result =
                        self.calculate_result(ctx.spell, ctx.caster, ctx.target, *base, *coefficient, *outcome, false);
                    ctx.landed = result.landed();
                    self.deliver_result(&result);
                }
                SpellStep::Heal {
                    base,
                    coefficient,
                    outcome,
                    on,
                } => {
                    let target = match on {
                        StepTarget::Caster => ctx.caster,
                        StepTarget::Target => ctx.target,
                    };
                    let result =
                        self.calculate_result(ctx.spell, ctx.caster, target, *base, *coefficient, *outcome, true);
                    ctx.landed = result.landed();
                    self.deliver_result(&result);
                }
                SpellStep::ApplyDot => {
                    self.apply_dot(ctx.spell, ctx.target);
                }
                SpellStep::ActivateAura(aura) => self.activate_aura(*aura),
                SpellStep::AddAuraStack(aura) => self.add_aura_stack(*aura),
                SpellStep::CastSpell { spell, on } => {
                    let target = match on {
                        StepTarget::Caster => ctx.caster,
                        StepTarget::Target => ctx.target,
                    };
                    self.cast_triggered(*spell, Some(target));
                }
                SpellStep::IfLanded(inner) => {
                    if ctx.landed {
                        self.run_steps(inner, ctx);
                    }
                }
                SpellStep::Custom(hook) => hook(self, ctx.spell, ctx.target),
                SpellStep::Placeholder(label) => self.hit_placeholder(ctx.spell, label),
            }
            if self.trial_ended() {
                return;
            }
        }
    }

    fn hit_placeholder(&mut self, spell: SpellId, label: &str) {
        self.spells[spell.0].metrics.placeholder_casts += 1;
        if self.placeholders.insert(label.to_string()) {
            warn!(
                spell = %self.spells[spell.0].config.label,
                placeholder = label,
                "unimplemented content has no effect"
            );
        }
    }

    fn base_amount(&mut self, spell: SpellId, caster: UnitId, base: BaseAmount) -> f64 {
        match base {
            BaseAmount::Flat(amount) => amount,
            BaseAmount::Range { min, max } => self.rng.roll(DAMAGE_ROLL, min, max),
            BaseAmount::Weapon { multiplier, bonus } => {
                let mask = self.spells[spell.0].config.proc_mask;
                let weapon = match self.units[caster.0].weapons.for_proc_mask(mask) {
                    Some(weapon) => *weapon,
                    None => return 0.0,
                };
                let power = if mask.matches(ProcMask::RANGED) {
                    Stat::RangedAttackPower
                } else {
                    Stat::AttackPower
                };
                let rolled = self
                    .rng
                    .roll(DAMAGE_ROLL, weapon.min_damage, weapon.max_damage);
                let normalized = self.stat(caster, power) / 14.0 * weapon.swing_speed;
                (rolled + normalized) * multiplier + bonus
            }
        }
    }

    /// Attacker-side multiplier for `spell`.
    pub(crate) fn attacker_multiplier(&self, spell: SpellId, is_heal: bool) -> f64 {
        let s = &self.spells[spell.0];
        if s.config.flags.contains(SpellFlags::IGNORE_ATTACKER_MODIFIERS) {
            return 1.0;
        }
        let pseudo = &self.units[s.unit.0].pseudo;
        let mut multiplier = s.mods.total_damage_multiplier() * s.config.damage_multiplier;
        if is_heal {
            multiplier *= pseudo.healing_dealt_multiplier;
        } else {
            multiplier *= pseudo.damage_dealt_multiplier;
            if !s.config.school.is_empty() {
                multiplier *= pseudo.school_damage_dealt.get(s.config.school);
            }
        }
        multiplier
    }

    /// Target-side multiplier for `spell` landing on `target`.
    pub(crate) fn target_multiplier(&self, spell: SpellId, target: UnitId, is_heal: bool) -> f64 {
        let pseudo = &self.units[target.0].pseudo;
        if is_heal {
            return pseudo.healing_taken_multiplier;
        }
        let school = self.spells[spell.0].config.school;
        let mut multiplier = pseudo.damage_taken_multiplier;
        if !school.is_empty() {
            multiplier *= pseudo.school_damage_taken.get(school);
        }
        multiplier
    }

    #[allow(clippy::too_many_arguments)]
    fn calculate_result(
        &mut self,
        spell: SpellId,
        caster: UnitId,
        target: UnitId,
        base: BaseAmount,
        coefficient: f64,
        model: OutcomeModel,
        is_heal: bool,
    ) -> SpellResult {
        let power = self.stat(caster, self.spells[spell.0].power_stat(is_heal));
        let mut amount = self.base_amount(spell, caster, base) + coefficient * power;
        amount *= self.attacker_multiplier(spell, is_heal);

        let table = AttackTable::new(&self.units[caster.0], &self.units[target.0]);
        let mut outcome = self.roll_outcome(spell, caster, target, &table, model);
        let mut resist_multiplier = 1.0;
        let (flags, crit_base) = {
            let s = &self.spells[spell.0];
            (s.config.flags, s.config.crit_multiplier)
        };

        if !outcome.landed() {
            amount = 0.0;
        } else {
            if !is_heal {
                let (multiplier, partial) = self.roll_mitigation(spell, caster, target);
                resist_multiplier = multiplier;
                outcome |= partial;
                amount *= resist_multiplier;
            }
            if !flags.contains(SpellFlags::IGNORE_TARGET_MODIFIERS) {
                amount *= self.target_multiplier(spell, target, is_heal);
            }
            if outcome.is_crit() {
                let base = crit_base.unwrap_or(if model.is_physical() { 2.0 } else { 1.5 });
                amount *= crit_multiplier(base, self.units[caster.0].pseudo.crit_damage_multiplier);
            }
            if outcome.matches(HitOutcome::GLANCE) {
                amount *= self.rng.roll(GLANCE_ROLL, table.glance_min, table.glance_max);
            }
            if outcome.matches(HitOutcome::BLOCK) {
                amount = (amount - self.stat(target, Stat::BlockValue).max(0.0)).max(0.0);
            }
        }

        SpellResult {
            spell,
            caster,
            target,
            outcome,
            amount: amount.max(0.0),
            resist_multiplier,
            is_heal,
            periodic: false,
            from_proc: self.proc_depth > 0,
        }
    }

    /// Apply a final result: health, metrics, then event dispatch.
    pub(crate) fn deliver_result(&mut self, result: &SpellResult) {
        let flags = self.spells[result.spell.0].config.flags;

        if result.is_heal {
            self.apply_healing(result.target, result.amount);
            self.units[result.caster.0].metrics.healing_dealt += result.amount;
        } else {
            self.apply_damage(result.target, result.amount);
            self.units[result.caster.0].metrics.damage_dealt += result.amount;
        }

        if !flags.contains(SpellFlags::NO_METRICS) {
            let metrics = &mut self.spells[result.spell.0].metrics;
            if result.is_heal {
                metrics.healing += result.amount;
            } else {
                metrics.damage += result.amount;
            }
            let outcome = result.outcome;
            if result.periodic {
                metrics.ticks += 1;
            }
            if outcome.matches(HitOutcome::MISS) {
                metrics.misses += 1;
            } else if outcome.matches(HitOutcome::DODGE) {
                metrics.dodges += 1;
            } else if outcome.matches(HitOutcome::PARRY) {
                metrics.parries += 1;
            } else {
                if outcome.is_crit() {
                    metrics.crits += 1;
                } else if !result.periodic {
                    metrics.hits += 1;
                }
                if outcome.matches(HitOutcome::GLANCE) {
                    metrics.glances += 1;
                }
                if outcome.matches(HitOutcome::BLOCK) {
                    metrics.blocks += 1;
                }
            }
        }

        trace!(
            spell = %self.spells[result.spell.0].config.label,
            target = result.target.0,
            outcome = %result.outcome,
            amount = result.amount,
            "result"
        );

        if flags.contains(SpellFlags::SUPPRESS_PROCS) || self.trial_ended() {
            return;
        }
        let (dealt, taken) = match (result.is_heal, result.periodic) {
            (false, false) => (AuraEvent::SpellHitDealt, AuraEvent::SpellHitTaken),
            (false, true) => (AuraEvent::PeriodicDamageDealt, AuraEvent::SpellHitTaken),
            (true, false) => (AuraEvent::HealDealt, AuraEvent::HealTaken),
            (true, true) => (AuraEvent::PeriodicHealDealt, AuraEvent::HealTaken),
        };
        if !flags.contains(SpellFlags::NO_ON_DAMAGE_DEALT) {
            self.dispatch_result(result.caster, dealt, result);
        }
        self.dispatch_result(result.target, taken, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_outcome_success() {
        assert!(CastOutcome::Completed.is_success());
        assert!(CastOutcome::Started {
            completes_at: Duration::from_secs(2)
        }
        .is_success());
        assert!(!CastOutcome::Failed(CastFailure::OnGcd).is_success());
    }

    #[test]
    fn test_min_gcd() {
        assert_eq!(MIN_GCD, Duration::from_secs(1));
    }
}
