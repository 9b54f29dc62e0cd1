//! Weapon swing loop.
//!
//! Each equipped hand of a unit with auto attacks enabled swings on its own
//! timer. A swing is resolved like any other spell, so white hits feed
//! proc triggers (PPM triggers in particular) through the regular event
//! dispatch.

use crate::error::SimResult;
use crate::flags::{ProcMask, SpellFlags};
use crate::outcome::OutcomeModel;
use crate::scheduler::{Action, ActionHandle};
use crate::school::SpellSchool;
use crate::simulation::Simulation;
use crate::spell::{BaseAmount, SpellConfig, SpellId, SpellStep};
use crate::unit::{Hand, UnitId};
use std::time::Duration;
use tracing::trace;

/// Off-hand swings deal half damage.
const OFF_HAND_MULTIPLIER: f64 = 0.5;

const HANDS: [Hand; 3] = [Hand::MainHand, Hand::OffHand, Hand::Ranged];

fn slot(hand: Hand) -> usize {
    match hand {
        Hand::MainHand => 0,
        Hand::OffHand => 1,
        Hand::Ranged => 2,
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct AutoAttackState {
    enabled: bool,
    swings: [Option<SpellId>; 3],
    handles: [Option<ActionHandle>; 3],
}

impl AutoAttackState {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }
}

fn swing_config(hand: Hand) -> SpellConfig {
    let (label, mask, multiplier, model) = match hand {
        Hand::MainHand => ("Auto Attack", ProcMask::MELEE_MH_AUTO, 1.0, OutcomeModel::MeleeWhite),
        Hand::OffHand => (
            "Auto Attack (Off Hand)",
            ProcMask::MELEE_OH_AUTO,
            OFF_HAND_MULTIPLIER,
            OutcomeModel::MeleeWhite,
        ),
        Hand::Ranged => ("Auto Shot", ProcMask::RANGED_AUTO, 1.0, OutcomeModel::RangedHitAndCrit),
    };
    SpellConfig::new(label, SpellSchool::PHYSICAL, mask)
        .with_flags(SpellFlags::NO_ON_CAST_COMPLETE)
        .with_step(SpellStep::damage(
            BaseAmount::Weapon {
                multiplier,
                bonus: 0.0,
            },
            0.0,
            model,
        ))
}

impl Simulation {
    /// Register swing spells for every equipped hand. Melee hands take
    /// precedence; a ranged weapon only swings when there is no main hand.
    pub(crate) fn register_auto_attacks(&mut self, unit: UnitId) -> SimResult<()> {
        if !self.units[unit.0].auto_attacks.enabled {
            return Ok(());
        }
        let weapons = self.units[unit.0].weapons;
        let hands: Vec<Hand> = if weapons.main_hand.is_some() {
            [Hand::MainHand, Hand::OffHand]
                .into_iter()
                .filter(|&hand| weapons.get(hand).is_some())
                .collect()
        } else if weapons.ranged.is_some() {
            vec![Hand::Ranged]
        } else {
            Vec::new()
        };
        for hand in hands {
            let spell = self.register_spell(unit, swing_config(hand))?;
            self.units[unit.0].auto_attacks.swings[slot(hand)] = Some(spell);
        }
        Ok(())
    }

    /// The swing spell for `hand`, if the unit auto attacks with it.
    pub fn auto_attack_spell(&self, unit: UnitId, hand: Hand) -> Option<SpellId> {
        self.units[unit.0].auto_attacks.swings[slot(hand)]
    }

    /// Current swing interval of `hand` after speed multipliers and haste.
    pub fn swing_interval(&self, unit: UnitId, hand: Hand) -> Option<Duration> {
        let weapon = self.units[unit.0].weapons.get(hand)?;
        let mask = match hand {
            Hand::MainHand => ProcMask::MELEE_MH_AUTO,
            Hand::OffHand => ProcMask::MELEE_OH_AUTO,
            Hand::Ranged => ProcMask::RANGED_AUTO,
        };
        let secs = weapon.swing_speed / self.haste_divisor(unit, mask);
        Some(Duration::from_secs_f64(secs.max(0.0)))
    }

    /// Start swinging every registered hand now.
    pub fn start_auto_attacks(&mut self, unit: UnitId) {
        let now = self.now();
        for hand in HANDS {
            let i = slot(hand);
            let state = &self.units[unit.0].auto_attacks;
            if state.swings[i].is_none() || state.handles[i].is_some() {
                continue;
            }
            let handle = self.scheduler.schedule_at(now, Action::AutoAttack { unit, hand });
            self.units[unit.0].auto_attacks.handles[i] = Some(handle);
        }
    }

    /// Stop every swing timer of `unit`.
    pub fn stop_auto_attacks(&mut self, unit: UnitId) {
        for hand in HANDS {
            if let Some(handle) = self.units[unit.0].auto_attacks.handles[slot(hand)].take() {
                self.scheduler.cancel(handle);
            }
        }
    }

    pub fn is_auto_attacking(&self, unit: UnitId) -> bool {
        self.units[unit.0].auto_attacks.handles.iter().any(Option::is_some)
    }

    pub(crate) fn swing(&mut self, unit: UnitId, hand: Hand) {
        let i = slot(hand);
        self.units[unit.0].auto_attacks.handles[i] = None;
        let spell = match self.units[unit.0].auto_attacks.swings[i] {
            Some(spell) => spell,
            None => return,
        };
        if !self.units[unit.0].enabled {
            return;
        }

        // Ranged swings wait for the current hardcast.
        if hand == Hand::Ranged {
            if let Some(ends_at) = self.hardcast_ends_at(unit) {
                let handle = self.scheduler.schedule_at(ends_at, Action::AutoAttack { unit, hand });
                self.units[unit.0].auto_attacks.handles[i] = Some(handle);
                return;
            }
        }

        if let Some(target) = self.units[unit.0].current_target {
            if !self.is_dead(target) {
                trace!(unit = %self.units[unit.0].name, ?hand, t = ?self.now(), "swing");
                self.spells[spell.0].metrics.casts += 1;
                self.resolve_spell(spell, unit, target);
            }
        }
        if self.trial_ended() || !self.units[unit.0].enabled {
            return;
        }

        if let Some(interval) = self.swing_interval(unit, hand) {
            let at = self.now() + interval;
            let handle = self.scheduler.schedule_at(at, Action::AutoAttack { unit, hand });
            self.units[unit.0].auto_attacks.handles[i] = Some(handle);
        }
    }

    pub(crate) fn reset_auto_attacks(&mut self) {
        for unit in &mut self.units {
            unit.auto_attacks.handles = [None; 3];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swing_configs() {
        let mh = swing_config(Hand::MainHand);
        assert_eq!(mh.proc_mask, ProcMask::MELEE_MH_AUTO);
        assert!(mh.flags.contains(SpellFlags::NO_ON_CAST_COMPLETE));

        let ranged = swing_config(Hand::Ranged);
        assert!(ranged.proc_mask.matches(ProcMask::RANGED));
    }

    #[test]
    fn test_slots_are_distinct() {
        let slots: Vec<usize> = HANDS.iter().map(|&h| slot(h)).collect();
        assert_eq!(slots, vec![0, 1, 2]);
    }
}
