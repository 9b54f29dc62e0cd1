//! Pets: units whose lifecycle belongs to an owner.
//!
//! A pet inherits part of its owner's stats. Whenever the owner's effective
//! stats change, the inherited block is recomputed and only the delta is
//! applied to the pet.

use crate::scheduler::{Action, ActionHandle};
use crate::simulation::Simulation;
use crate::stat::{Stat, Stats};
use crate::unit::UnitId;
use std::time::Duration;
use tracing::debug;

/// One "owner stat × factor → pet stat" rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InheritanceRule {
    pub from: Stat,
    pub to: Stat,
    pub factor: f64,
}

/// How a pet derives stats from its owner.
///
/// # Examples
///
/// ```rust
/// use simkernel::{Stat, StatInheritance, Stats};
///
/// let inheritance = StatInheritance::new()
///     .with(Stat::Stamina, Stat::Stamina, 0.3)
///     .with(Stat::SpellPower, Stat::AttackPower, 0.57);
///
/// let owner = Stats::new().with(Stat::Stamina, 100.0).with(Stat::SpellPower, 1000.0);
/// let inherited = inheritance.compute(&owner);
/// assert_eq!(inherited[Stat::Stamina], 30.0);
/// assert_eq!(inherited[Stat::AttackPower], 570.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatInheritance {
    rules: Vec<InheritanceRule>,
}

impl StatInheritance {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with(mut self, from: Stat, to: Stat, factor: f64) -> Self {
        self.rules.push(InheritanceRule { from, to, factor });
        self
    }

    pub fn rules(&self) -> &[InheritanceRule] {
        &self.rules
    }

    /// The inherited stat block for the given owner stats.
    pub fn compute(&self, owner: &Stats) -> Stats {
        let mut inherited = Stats::new();
        for rule in &self.rules {
            inherited[rule.to] += owner[rule.from] * rule.factor;
        }
        inherited
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PetState {
    pub(crate) owner: UnitId,
    pub(crate) inheritance: StatInheritance,
    pub(crate) inherited: Stats,
    pub(crate) enabled_on_reset: bool,
    pub(crate) timeout_handle: Option<ActionHandle>,
}

impl Simulation {
    /// Summon a pet, optionally for a limited time.
    ///
    /// Enabling an enabled pet only replaces its timeout.
    pub fn enable_pet(&mut self, pet: UnitId, timeout: Option<Duration>) {
        self.summon_pet(pet, timeout, true);
    }

    /// `restore_auras` is false during reset, which has already run the
    /// aura reset pass for every unit.
    fn summon_pet(&mut self, pet: UnitId, timeout: Option<Duration>, restore_auras: bool) {
        let state = match self.units[pet.0].pet.as_mut() {
            Some(state) => state,
            None => return,
        };
        if let Some(handle) = state.timeout_handle.take() {
            self.scheduler.cancel(handle);
        }

        if !self.units[pet.0].enabled {
            self.units[pet.0].enabled = true;
            self.refresh_pet_inheritance(pet);
            self.units[pet.0].reset_pools();
            if restore_auras {
                self.restore_unit_auras(pet);
            }
            debug!(pet = %self.units[pet.0].name, t = ?self.now(), "pet enabled");
            self.start_auto_attacks(pet);
            if self.agents[pet.0].is_some() {
                self.request_rotation(pet);
            }
        }

        if let Some(timeout) = timeout {
            let at = self.now() + timeout;
            let handle = self.scheduler.schedule_at(at, Action::PetTimeout(pet));
            if let Some(state) = self.units[pet.0].pet.as_mut() {
                state.timeout_handle = Some(handle);
            }
        }
    }

    /// Dismiss a pet: stop everything it is doing and drop inherited stats.
    pub fn disable_pet(&mut self, pet: UnitId) {
        if !self.units[pet.0].enabled || self.units[pet.0].pet.is_none() {
            return;
        }
        self.units[pet.0].enabled = false;

        if let Some(hardcast) = self.units[pet.0].hardcast.take() {
            self.scheduler.cancel(hardcast.handle);
        }
        if let Some(handle) = self.units[pet.0].ready_handle.take() {
            self.scheduler.cancel(handle);
        }
        self.stop_auto_attacks(pet);
        self.expire_all_auras(pet);

        let mut inherited = Stats::new();
        if let Some(state) = self.units[pet.0].pet.as_mut() {
            if let Some(handle) = state.timeout_handle.take() {
                self.scheduler.cancel(handle);
            }
            inherited = std::mem::take(&mut state.inherited);
        }
        self.add_stats_dynamic(pet, &-inherited);
        debug!(pet = %self.units[pet.0].name, t = ?self.now(), "pet disabled");
    }

    pub fn is_pet_enabled(&self, pet: UnitId) -> bool {
        self.units[pet.0].pet.is_some() && self.units[pet.0].enabled
    }

    /// Stats the pet currently inherits from its owner.
    pub fn inherited_stats(&self, pet: UnitId) -> Option<&Stats> {
        self.units[pet.0].pet.as_ref().map(|state| &state.inherited)
    }

    /// Recompute the inherited block and apply the difference.
    pub(crate) fn refresh_pet_inheritance(&mut self, pet: UnitId) {
        if !self.units[pet.0].enabled {
            return;
        }
        let (owner, previous, current) = match &self.units[pet.0].pet {
            Some(state) => {
                let owner_stats = self.units[state.owner.0].sheet.effective();
                (state.owner, state.inherited, state.inheritance.compute(owner_stats))
            }
            None => return,
        };
        let delta = current - previous;
        if delta.is_zero() {
            return;
        }
        if let Some(state) = self.units[pet.0].pet.as_mut() {
            state.inherited = current;
        }
        debug!(pet = %self.units[pet.0].name, owner = owner.0, "pet inheritance refreshed");
        self.add_stats_dynamic(pet, &delta);
    }

    pub(crate) fn reset_pets(&mut self) {
        for unit in &mut self.units {
            if let Some(state) = unit.pet.as_mut() {
                state.inherited = Stats::new();
                state.timeout_handle = None;
                unit.enabled = false;
            }
        }
    }

    pub(crate) fn summon_pets_on_reset(&mut self) {
        let pets: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| u.pet.as_ref().map_or(false, |s| s.enabled_on_reset))
            .map(|u| u.id)
            .collect();
        for pet in pets {
            self.summon_pet(pet, None, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_sums_rules_into_same_target() {
        let inheritance = StatInheritance::new()
            .with(Stat::Strength, Stat::AttackPower, 2.0)
            .with(Stat::AttackPower, Stat::AttackPower, 0.22);
        let owner = Stats::new()
            .with(Stat::Strength, 100.0)
            .with(Stat::AttackPower, 1000.0);
        let inherited = inheritance.compute(&owner);
        assert!((inherited[Stat::AttackPower] - 420.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_inheritance() {
        let owner = Stats::new().with(Stat::Stamina, 500.0);
        assert!(StatInheritance::new().compute(&owner).is_zero());
    }
}
