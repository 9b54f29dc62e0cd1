//! The aura engine: buffs and debuffs.
//!
//! An aura is either `Inactive` or `Active`. Activating an active aura is a
//! refresh. Side effects come in two flavors:
//!
//! * **Reversible effects** ([`AuraEffect`]) are applied in order on gain
//!   and reverted in reverse order on expire, so an aura always leaves the
//!   owner's stats the way it found them.
//! * **Hooks** are ordered lists of callbacks (on-gain, on-refresh,
//!   on-stacks-changed, on-expire, on-reset and event listeners). Later
//!   content appends to a list instead of wrapping an earlier callback.
//!
//! Event listeners run synchronously, in registration order, and only
//! while their aura is active.

use crate::dependency::DependencyId;
use crate::error::{SimError, SimResult};
use crate::outcome::SpellResult;
use crate::scheduler::{Action, ActionHandle};
use crate::simulation::Simulation;
use crate::spell::{SpellId, SpellMod};
use crate::stat::{PseudoStat, Stats};
use crate::unit::UnitId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Index of an aura within its simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuraId(pub(crate) usize);

/// Lifecycle hook: `(sim, aura)`.
pub type AuraHook = Arc<dyn Fn(&mut Simulation, AuraId) + Send + Sync>;
/// Stack hook: `(sim, aura, old_stacks, new_stacks)`.
pub type StacksHook = Arc<dyn Fn(&mut Simulation, AuraId, u32, u32) + Send + Sync>;
/// Result listener: `(sim, aura, result)`.
pub type SpellEventHook = Arc<dyn Fn(&mut Simulation, AuraId, &SpellResult) + Send + Sync>;
/// Cast-complete listener: `(sim, aura, spell, target)`.
pub type CastHook = Arc<dyn Fn(&mut Simulation, AuraId, SpellId, UnitId) + Send + Sync>;

/// Events an aura can listen to on its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuraEvent {
    SpellHitDealt,
    SpellHitTaken,
    HealDealt,
    HealTaken,
    PeriodicDamageDealt,
    PeriodicHealDealt,
    CastComplete,
}

impl AuraEvent {
    pub const COUNT: usize = 7;

    pub const ALL: [AuraEvent; AuraEvent::COUNT] = [
        AuraEvent::SpellHitDealt,
        AuraEvent::SpellHitTaken,
        AuraEvent::HealDealt,
        AuraEvent::HealTaken,
        AuraEvent::PeriodicDamageDealt,
        AuraEvent::PeriodicHealDealt,
        AuraEvent::CastComplete,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// How long an activation lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuraDuration {
    Finite(Duration),
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuraState {
    Inactive,
    Active,
}

/// A side effect the kernel applies on gain and reverts on expire.
#[derive(Debug, Clone, PartialEq)]
pub enum AuraEffect {
    /// Flat stats on the owner.
    Stats(Stats),
    /// Enable a dependency registered on the owner.
    EnableDependency(DependencyId),
    /// Multiply an owner pseudo stat (divided back out on expire).
    MultiplyPseudoStat(PseudoStat, f64),
    /// Add to an owner pseudo stat.
    AddPseudoStat(PseudoStat, f64),
    /// Modify one or more spells.
    SpellMod(SpellMod),
}

/// Everything needed to register an aura.
///
/// # Examples
///
/// ```rust
/// use simkernel::{AuraConfig, AuraEffect, PseudoStat, Stat, Stats};
/// use std::time::Duration;
///
/// let berserking = AuraConfig::new("Berserking")
///     .with_duration(Duration::from_secs(10))
///     .with_effect(AuraEffect::MultiplyPseudoStat(PseudoStat::CastSpeedMultiplier, 1.1))
///     .with_effect(AuraEffect::Stats(Stats::new().with(Stat::AttackPower, 50.0)));
/// assert_eq!(berserking.effects.len(), 2);
/// ```
#[derive(Clone)]
pub struct AuraConfig {
    pub label: String,
    pub duration: AuraDuration,
    pub max_stacks: u32,
    pub effects: Vec<AuraEffect>,
    /// Stats applied once per stack, by stack delta.
    pub stack_stats: Option<Stats>,
    /// Activate automatically at the start of every trial.
    pub activate_on_reset: bool,
    pub on_gain: Vec<AuraHook>,
    pub on_refresh: Vec<AuraHook>,
    pub on_expire: Vec<AuraHook>,
    pub on_reset: Vec<AuraHook>,
    pub on_stacks_change: Vec<StacksHook>,
    pub listeners: Vec<(AuraEvent, SpellEventHook)>,
    pub on_cast_complete: Vec<CastHook>,
}

impl AuraConfig {
    /// A permanent, unstacked aura with no effects.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            duration: AuraDuration::Permanent,
            max_stacks: 0,
            effects: Vec::new(),
            stack_stats: None,
            activate_on_reset: false,
            on_gain: Vec::new(),
            on_refresh: Vec::new(),
            on_expire: Vec::new(),
            on_reset: Vec::new(),
            on_stacks_change: Vec::new(),
            listeners: Vec::new(),
            on_cast_complete: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = AuraDuration::Finite(duration);
        self
    }

    pub fn permanent(mut self) -> Self {
        self.duration = AuraDuration::Permanent;
        self.activate_on_reset = true;
        self
    }

    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = max_stacks;
        self
    }

    pub fn with_effect(mut self, effect: AuraEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_stack_stats(mut self, per_stack: Stats) -> Self {
        self.stack_stats = Some(per_stack);
        self
    }

    pub fn on_gain<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId) + Send + Sync + 'static,
    {
        self.on_gain.push(Arc::new(hook));
        self
    }

    pub fn on_refresh<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId) + Send + Sync + 'static,
    {
        self.on_refresh.push(Arc::new(hook));
        self
    }

    pub fn on_expire<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId) + Send + Sync + 'static,
    {
        self.on_expire.push(Arc::new(hook));
        self
    }

    pub fn on_reset<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId) + Send + Sync + 'static,
    {
        self.on_reset.push(Arc::new(hook));
        self
    }

    pub fn on_stacks_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, u32, u32) + Send + Sync + 'static,
    {
        self.on_stacks_change.push(Arc::new(hook));
        self
    }

    /// Listen to a result event on the owner.
    ///
    /// # Panics
    ///
    /// Panics for [`AuraEvent::CastComplete`]; use [`AuraConfig::on_cast_complete`].
    pub fn on_event<F>(mut self, event: AuraEvent, hook: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, &SpellResult) + Send + Sync + 'static,
    {
        assert!(
            event != AuraEvent::CastComplete,
            "cast-complete listeners take (spell, target), use on_cast_complete"
        );
        self.listeners.push((event, Arc::new(hook)));
        self
    }

    pub fn on_spell_hit_dealt<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, &SpellResult) + Send + Sync + 'static,
    {
        self.on_event(AuraEvent::SpellHitDealt, hook)
    }

    pub fn on_spell_hit_taken<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, &SpellResult) + Send + Sync + 'static,
    {
        self.on_event(AuraEvent::SpellHitTaken, hook)
    }

    pub fn on_periodic_damage_dealt<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, &SpellResult) + Send + Sync + 'static,
    {
        self.on_event(AuraEvent::PeriodicDamageDealt, hook)
    }

    pub fn on_cast_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Simulation, AuraId, SpellId, UnitId) + Send + Sync + 'static,
    {
        self.on_cast_complete.push(Arc::new(hook));
        self
    }

    fn validate(&self) -> SimResult<()> {
        if self.label.is_empty() {
            return Err(SimError::invalid_content("(unnamed aura)", "aura label is empty"));
        }
        if self.duration == AuraDuration::Finite(Duration::ZERO) {
            return Err(SimError::invalid_content(
                &self.label,
                "finite duration must be positive",
            ));
        }
        for effect in &self.effects {
            if let AuraEffect::MultiplyPseudoStat(_, factor) = effect {
                if *factor == 0.0 || !factor.is_finite() {
                    return Err(SimError::invalid_content(
                        &self.label,
                        "pseudo stat multiplier must be finite and non-zero",
                    ));
                }
            }
            if let AuraEffect::SpellMod(spell_mod) = effect {
                spell_mod.validate(&self.label)?;
            }
        }
        Ok(())
    }
}

/// A registered aura and its runtime state.
pub struct Aura {
    pub(crate) id: AuraId,
    pub(crate) owner: UnitId,
    pub(crate) config: AuraConfig,
    pub(crate) state: AuraState,
    pub(crate) stacks: u32,
    pub(crate) expires_at: Option<Duration>,
    pub(crate) gained_at: Duration,
    pub(crate) expire_handle: Option<ActionHandle>,
    pub(crate) expiring: bool,
    pub(crate) uptime: Duration,
    pub(crate) activations: u32,
    pub(crate) refreshes: u32,
}

impl Aura {
    pub fn id(&self) -> AuraId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn owner(&self) -> UnitId {
        self.owner
    }

    pub fn state(&self) -> AuraState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == AuraState::Active
    }

    pub fn stacks(&self) -> u32 {
        self.stacks
    }

    pub fn max_stacks(&self) -> u32 {
        self.config.max_stacks
    }

    pub fn duration(&self) -> AuraDuration {
        self.config.duration
    }

    /// Expiry time of the current activation, `None` if inactive or permanent.
    pub fn expires_at(&self) -> Option<Duration> {
        self.expires_at
    }

    /// Uptime accumulated by completed activations this trial.
    pub fn uptime(&self) -> Duration {
        self.uptime
    }

    pub fn activations(&self) -> u32 {
        self.activations
    }

    pub fn refreshes(&self) -> u32 {
        self.refreshes
    }
}

impl Simulation {
    /// Register an aura on `unit`.
    pub fn register_aura(&mut self, unit: UnitId, config: AuraConfig) -> SimResult<AuraId> {
        self.ensure_registration_open(&config.label)?;
        config.validate()?;

        let id = AuraId(self.auras.len());
        let events: Vec<AuraEvent> = config
            .listeners
            .iter()
            .map(|(event, _)| *event)
            .chain((!config.on_cast_complete.is_empty()).then_some(AuraEvent::CastComplete))
            .collect();

        self.auras.push(Aura {
            id,
            owner: unit,
            config,
            state: AuraState::Inactive,
            stacks: 0,
            expires_at: None,
            gained_at: Duration::ZERO,
            expire_handle: None,
            expiring: false,
            uptime: Duration::ZERO,
            activations: 0,
            refreshes: 0,
        });

        let owner = &mut self.units[unit.0];
        owner.auras.push(id);
        for event in events {
            owner.listeners.add(event, id);
        }
        Ok(id)
    }

    /// Register a permanent aura that is active for the whole trial.
    pub fn register_permanent_aura(&mut self, unit: UnitId, config: AuraConfig) -> SimResult<AuraId> {
        self.register_aura(unit, config.permanent())
    }

    /// Append a result listener to an already-registered aura.
    pub fn add_aura_listener(&mut self, aura: AuraId, event: AuraEvent, hook: SpellEventHook) {
        assert!(
            event != AuraEvent::CastComplete,
            "cast-complete listeners take (spell, target), use add_cast_complete_listener"
        );
        self.auras[aura.0].config.listeners.push((event, hook));
        let owner = self.auras[aura.0].owner;
        self.units[owner.0].listeners.add(event, aura);
    }

    /// Append a cast-complete listener to an already-registered aura.
    pub fn add_cast_complete_listener(&mut self, aura: AuraId, hook: CastHook) {
        self.auras[aura.0].config.on_cast_complete.push(hook);
        let owner = self.auras[aura.0].owner;
        self.units[owner.0]
            .listeners
            .add(AuraEvent::CastComplete, aura);
    }

    pub fn aura(&self, id: AuraId) -> &Aura {
        &self.auras[id.0]
    }

    pub fn aura_by_label(&self, unit: UnitId, label: &str) -> Option<AuraId> {
        self.units[unit.0]
            .auras
            .iter()
            .copied()
            .find(|id| self.auras[id.0].config.label == label)
    }

    pub fn is_aura_active(&self, id: AuraId) -> bool {
        self.auras[id.0].is_active()
    }

    pub fn aura_stacks(&self, id: AuraId) -> u32 {
        self.auras[id.0].stacks
    }

    /// Time left on the current activation; `None` if inactive or permanent.
    pub fn aura_remaining(&self, id: AuraId) -> Option<Duration> {
        self.auras[id.0]
            .expires_at
            .map(|at| at.saturating_sub(self.now()))
    }

    /// Activate an aura, or refresh it if it is already active.
    pub fn activate_aura(&mut self, id: AuraId) {
        let duration = self.auras[id.0].config.duration;
        self.activate_aura_with(id, duration);
    }

    /// Activate with a one-off duration instead of the configured one.
    pub fn activate_aura_for(&mut self, id: AuraId, duration: Duration) {
        self.activate_aura_with(id, AuraDuration::Finite(duration));
    }

    fn activate_aura_with(&mut self, id: AuraId, duration: AuraDuration) {
        let now = self.now();
        if self.auras[id.0].is_active() {
            self.auras[id.0].refreshes += 1;
            self.schedule_aura_expiry(id, duration);
            trace!(aura = %self.auras[id.0].config.label, t = ?now, "aura refreshed");
            let hooks = self.auras[id.0].config.on_refresh.clone();
            for hook in hooks.iter() {
                hook(self, id);
            }
            return;
        }

        let aura = &mut self.auras[id.0];
        aura.state = AuraState::Active;
        aura.gained_at = now;
        aura.activations += 1;
        let owner = aura.owner;
        let effects = aura.config.effects.clone();
        debug!(aura = %aura.config.label, unit = owner.0, t = ?now, "aura gained");

        self.schedule_aura_expiry(id, duration);
        for effect in &effects {
            self.apply_aura_effect(owner, effect, true);
        }

        let hooks = self.auras[id.0].config.on_gain.clone();
        for hook in hooks.iter() {
            hook(self, id);
        }
    }

    fn schedule_aura_expiry(&mut self, id: AuraId, duration: AuraDuration) {
        if let Some(handle) = self.auras[id.0].expire_handle.take() {
            self.scheduler.cancel(handle);
        }
        match duration {
            AuraDuration::Finite(length) => {
                let at = self.now() + length;
                let handle = self.scheduler.schedule_at(at, Action::AuraExpire(id));
                let aura = &mut self.auras[id.0];
                aura.expires_at = Some(at);
                aura.expire_handle = Some(handle);
            }
            AuraDuration::Permanent => self.auras[id.0].expires_at = None,
        }
    }

    /// Expire an aura now. Does nothing if it is inactive.
    pub fn deactivate_aura(&mut self, id: AuraId) {
        {
            let aura = &self.auras[id.0];
            if !aura.is_active() || aura.expiring {
                return;
            }
        }
        self.auras[id.0].expiring = true;
        if let Some(handle) = self.auras[id.0].expire_handle.take() {
            self.scheduler.cancel(handle);
        }

        if self.auras[id.0].stacks > 0 {
            self.change_stacks(id, 0, false);
        }

        let owner = self.auras[id.0].owner;
        let effects = self.auras[id.0].config.effects.clone();
        for effect in effects.iter().rev() {
            self.apply_aura_effect(owner, effect, false);
        }

        let now = self.now();
        let aura = &mut self.auras[id.0];
        aura.state = AuraState::Inactive;
        aura.expires_at = None;
        aura.uptime += now.saturating_sub(aura.gained_at);
        aura.expiring = false;
        debug!(aura = %aura.config.label, unit = owner.0, t = ?now, "aura expired");

        let hooks = self.auras[id.0].config.on_expire.clone();
        for hook in hooks.iter() {
            hook(self, id);
        }
    }

    /// Set the stack count, clamped to `[0, max_stacks]`.
    ///
    /// Setting a positive count on an inactive aura activates it first.
    /// Dropping to zero stacks expires an aura that has `max_stacks > 0`.
    pub fn set_aura_stacks(&mut self, id: AuraId, stacks: u32) {
        let new = stacks.min(self.auras[id.0].config.max_stacks);
        if !self.auras[id.0].is_active() {
            if new == 0 {
                return;
            }
            self.activate_aura(id);
        }
        self.change_stacks(id, new, true);
    }

    pub fn add_aura_stack(&mut self, id: AuraId) {
        self.add_aura_stacks(id, 1);
    }

    pub fn add_aura_stacks(&mut self, id: AuraId, count: u32) {
        let current = if self.auras[id.0].is_active() {
            self.auras[id.0].stacks
        } else {
            0
        };
        self.set_aura_stacks(id, current.saturating_add(count));
    }

    pub fn remove_aura_stack(&mut self, id: AuraId) {
        self.remove_aura_stacks(id, 1);
    }

    pub fn remove_aura_stacks(&mut self, id: AuraId, count: u32) {
        if !self.auras[id.0].is_active() {
            return;
        }
        let current = self.auras[id.0].stacks;
        self.set_aura_stacks(id, current.saturating_sub(count));
    }

    fn change_stacks(&mut self, id: AuraId, new: u32, expire_on_zero: bool) {
        let aura = &mut self.auras[id.0];
        let old = aura.stacks;
        if old == new {
            return;
        }
        aura.stacks = new;
        let owner = aura.owner;
        let per_stack = aura.config.stack_stats;
        let max_stacks = aura.config.max_stacks;
        trace!(aura = %aura.config.label, old, new, "aura stacks changed");

        if let Some(per_stack) = per_stack {
            let delta = f64::from(new) - f64::from(old);
            self.add_stats_dynamic(owner, &(per_stack * delta));
        }

        let hooks = self.auras[id.0].config.on_stacks_change.clone();
        for hook in hooks.iter() {
            hook(self, id, old, new);
        }

        if expire_on_zero && new == 0 && max_stacks > 0 {
            self.deactivate_aura(id);
        }
    }

    fn apply_aura_effect(&mut self, owner: UnitId, effect: &AuraEffect, apply: bool) {
        match effect {
            AuraEffect::Stats(stats) => {
                let delta = if apply { *stats } else { -*stats };
                self.add_stats_dynamic(owner, &delta);
            }
            AuraEffect::EnableDependency(dep) => {
                if apply {
                    self.enable_dependency(owner, *dep);
                } else {
                    self.disable_dependency(owner, *dep);
                }
            }
            AuraEffect::MultiplyPseudoStat(stat, factor) => {
                let factor = if apply { *factor } else { 1.0 / *factor };
                self.multiply_pseudo_stat(owner, *stat, factor);
            }
            AuraEffect::AddPseudoStat(stat, amount) => {
                let amount = if apply { *amount } else { -*amount };
                self.add_pseudo_stat(owner, *stat, amount);
            }
            AuraEffect::SpellMod(spell_mod) => {
                if apply {
                    self.apply_spell_mod(spell_mod);
                } else {
                    self.remove_spell_mod(spell_mod);
                }
            }
        }
    }

    /// Expire every active aura on `unit`, in registration order.
    pub fn expire_all_auras(&mut self, unit: UnitId) {
        let auras = self.units[unit.0].auras.clone();
        for id in auras {
            self.deactivate_aura(id);
        }
    }

    /// Run the reset hooks of `unit`'s auras and bring back its permanent
    /// ones, as at the start of a trial. Used when a pet is resummoned.
    pub(crate) fn restore_unit_auras(&mut self, unit: UnitId) {
        let auras = self.units[unit.0].auras.clone();
        for &id in &auras {
            let hooks = self.auras[id.0].config.on_reset.clone();
            for hook in hooks.iter() {
                hook(self, id);
            }
        }
        for id in auras {
            if self.auras[id.0].config.activate_on_reset && !self.auras[id.0].is_active() {
                self.activate_aura(id);
            }
        }
    }

    /// Put every aura back into its pre-trial state. Unit stats are restored
    /// separately, so reversible effects are dropped rather than reverted.
    pub(crate) fn reset_auras(&mut self) {
        for aura in &mut self.auras {
            aura.state = AuraState::Inactive;
            aura.stacks = 0;
            aura.expires_at = None;
            aura.expire_handle = None;
            aura.expiring = false;
            aura.gained_at = Duration::ZERO;
            aura.uptime = Duration::ZERO;
            aura.activations = 0;
            aura.refreshes = 0;
        }

        for index in 0..self.auras.len() {
            let id = AuraId(index);
            let hooks = self.auras[index].config.on_reset.clone();
            for hook in hooks.iter() {
                hook(self, id);
            }
        }
        for index in 0..self.auras.len() {
            if self.auras[index].config.activate_on_reset {
                self.activate_aura(AuraId(index));
            }
        }
    }

    /// Fold the running activation of every active aura into its uptime.
    pub(crate) fn close_aura_uptime(&mut self) {
        let now = self.now();
        for aura in &mut self.auras {
            if aura.is_active() {
                aura.uptime += now.saturating_sub(aura.gained_at);
                aura.gained_at = now;
            }
        }
    }

    /// Run `event` listeners on `unit` for a finalized result.
    pub(crate) fn dispatch_result(&mut self, unit: UnitId, event: AuraEvent, result: &SpellResult) {
        let count = self.units[unit.0].listeners.get(event).len();
        for i in 0..count {
            let id = self.units[unit.0].listeners.get(event)[i];
            if !self.auras[id.0].is_active() {
                continue;
            }
            let hooks: Vec<SpellEventHook> = self.auras[id.0]
                .config
                .listeners
                .iter()
                .filter(|(e, _)| *e == event)
                .map(|(_, hook)| Arc::clone(hook))
                .collect();
            for hook in hooks.iter() {
                hook(self, id, result);
            }
        }
    }

    pub(crate) fn dispatch_cast_complete(&mut self, unit: UnitId, spell: SpellId, target: UnitId) {
        let count = self.units[unit.0]
            .listeners
            .get(AuraEvent::CastComplete)
            .len();
        for i in 0..count {
            let id = self.units[unit.0].listeners.get(AuraEvent::CastComplete)[i];
            if !self.auras[id.0].is_active() {
                continue;
            }
            let hooks = self.auras[id.0].config.on_cast_complete.clone();
            for hook in hooks.iter() {
                hook(self, id, spell, target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = AuraConfig::new("Flurry")
            .with_duration(Duration::from_secs(15))
            .with_max_stacks(3)
            .with_stack_stats(Stats::new().with(crate::stat::Stat::MeleeHaste, 10.0))
            .on_gain(|_, _| {})
            .on_expire(|_, _| {})
            .on_spell_hit_dealt(|_, _, _| {});
        assert_eq!(config.duration, AuraDuration::Finite(Duration::from_secs(15)));
        assert_eq!(config.max_stacks, 3);
        assert_eq!(config.on_gain.len(), 1);
        assert_eq!(config.listeners.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_permanent_activates_on_reset() {
        let config = AuraConfig::new("Trueshot").permanent();
        assert!(config.activate_on_reset);
        assert_eq!(config.duration, AuraDuration::Permanent);
    }

    #[test]
    fn test_validation_rejects_zero_duration_and_multiplier() {
        let zero = AuraConfig::new("Blink").with_duration(Duration::ZERO);
        assert!(matches!(zero.validate(), Err(SimError::InvalidContent { .. })));

        let bad = AuraConfig::new("Curse")
            .with_effect(AuraEffect::MultiplyPseudoStat(PseudoStat::DamageTakenMultiplier, 0.0));
        assert!(bad.validate().is_err());

        assert!(AuraConfig::new("").validate().is_err());
    }

    #[test]
    #[should_panic(expected = "use on_cast_complete")]
    fn test_cast_complete_via_on_event_panics() {
        let _ = AuraConfig::new("Presence").on_event(AuraEvent::CastComplete, |_, _, _| {});
    }

    #[test]
    fn test_event_indices() {
        for (i, event) in AuraEvent::ALL.iter().enumerate() {
            assert_eq!(event.index(), i);
        }
    }
}
