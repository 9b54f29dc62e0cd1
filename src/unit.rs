//! Units: players, pets and enemies.
//!
//! A unit is a composition of a stat sheet, pseudo stats, timers, spells,
//! auras, resources and weapons. Its kind is a tag; behavior is attached
//! through the [`Agent`](crate::agent::Agent) trait rather than by type.

use crate::aura::{AuraEvent, AuraId};
use crate::auto_attack::AutoAttackState;
use crate::cast::Hardcast;
use crate::config::EndCondition;
use crate::dependency::{DependencyId, StatDependency, StatSheet};
use crate::error::SimResult;
use crate::flags::ProcMask;
use crate::metrics::UnitMetrics;
use crate::pet::PetState;
use crate::scheduler::ActionHandle;
use crate::simulation::Simulation;
use crate::spell::SpellId;
use crate::stat::{PseudoStat, PseudoStats, Stat, Stats};
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Index of a unit within its simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub(crate) usize);

impl UnitId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What role a unit plays in the encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Player,
    Pet { owner: UnitId },
    Enemy,
}

/// Weapon slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    MainHand,
    OffHand,
    Ranged,
}

/// A weapon's damage range and base swing speed in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub min_damage: f64,
    pub max_damage: f64,
    pub swing_speed: f64,
}

impl Weapon {
    pub fn new(min_damage: f64, max_damage: f64, swing_speed: f64) -> Self {
        Self {
            min_damage,
            max_damage,
            swing_speed,
        }
    }

    /// Base swing interval, unaffected by haste.
    pub fn swing_interval(&self) -> Duration {
        Duration::from_secs_f64(self.swing_speed)
    }

    pub fn average_damage(&self) -> f64 {
        (self.min_damage + self.max_damage) / 2.0
    }
}

/// Equipped weapons.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Weapons {
    pub main_hand: Option<Weapon>,
    pub off_hand: Option<Weapon>,
    pub ranged: Option<Weapon>,
}

impl Weapons {
    pub fn get(&self, hand: Hand) -> Option<&Weapon> {
        match hand {
            Hand::MainHand => self.main_hand.as_ref(),
            Hand::OffHand => self.off_hand.as_ref(),
            Hand::Ranged => self.ranged.as_ref(),
        }
    }

    /// The hand an attack of this kind is made with.
    pub fn hand_for(mask: ProcMask) -> Hand {
        if mask.matches(ProcMask::MELEE_OH) {
            Hand::OffHand
        } else if mask.matches(ProcMask::RANGED) {
            Hand::Ranged
        } else {
            Hand::MainHand
        }
    }

    /// The weapon an attack of this kind is made with.
    pub fn for_proc_mask(&self, mask: ProcMask) -> Option<&Weapon> {
        self.get(Self::hand_for(mask))
    }
}

/// Spendable resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Mana,
    Energy,
    Rage,
}

impl ResourceKind {
    fn index(self) -> usize {
        match self {
            ResourceKind::Mana => 0,
            ResourceKind::Energy => 1,
            ResourceKind::Rage => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct ResourceBar {
    pub(crate) enabled: bool,
    pub(crate) current: f64,
    pub(crate) max: f64,
}

/// Energy and rage bars are capped at 100.
const POOL_MAX: f64 = 100.0;
const ENERGY_PER_TICK: f64 = 20.0;
/// Mana and energy regenerate every two seconds.
pub(crate) const REGEN_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct HealthBar {
    pub(crate) tracked: bool,
    pub(crate) current: f64,
    pub(crate) max: f64,
}

/// Per-event lists of auras listening on a unit, in registration order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Listeners {
    by_event: [Vec<AuraId>; AuraEvent::COUNT],
}

impl Listeners {
    pub(crate) fn get(&self, event: AuraEvent) -> &[AuraId] {
        &self.by_event[event.index()]
    }

    pub(crate) fn add(&mut self, event: AuraEvent, aura: AuraId) {
        let list = &mut self.by_event[event.index()];
        if !list.contains(&aura) {
            list.push(aura);
        }
    }
}

/// Static description of a unit, consumed when the unit is created.
#[derive(Debug, Clone)]
pub struct UnitSetup {
    pub name: String,
    pub level: u32,
    pub base_stats: Stats,
    pub pseudo_stats: PseudoStats,
    pub weapons: Weapons,
    pub resources: Vec<ResourceKind>,
    /// Track health and allow this unit to die.
    pub track_health: bool,
    /// Swing equipped weapons automatically.
    pub auto_attacks: bool,
}

impl UnitSetup {
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
            base_stats: Stats::new(),
            pseudo_stats: PseudoStats::new(),
            weapons: Weapons::default(),
            resources: Vec::new(),
            track_health: false,
            auto_attacks: false,
        }
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.base_stats = stats;
        self
    }

    pub fn with_pseudo_stats(mut self, pseudo: PseudoStats) -> Self {
        self.pseudo_stats = pseudo;
        self
    }

    pub fn with_main_hand(mut self, weapon: Weapon) -> Self {
        self.weapons.main_hand = Some(weapon);
        self
    }

    pub fn with_off_hand(mut self, weapon: Weapon) -> Self {
        self.weapons.off_hand = Some(weapon);
        self
    }

    pub fn with_ranged(mut self, weapon: Weapon) -> Self {
        self.weapons.ranged = Some(weapon);
        self
    }

    pub fn with_resource(mut self, kind: ResourceKind) -> Self {
        if !self.resources.contains(&kind) {
            self.resources.push(kind);
        }
        self
    }

    pub fn with_health(mut self) -> Self {
        self.track_health = true;
        self
    }

    pub fn with_auto_attacks(mut self) -> Self {
        self.auto_attacks = true;
        self
    }
}

/// A participant in the simulation.
pub struct Unit {
    pub(crate) id: UnitId,
    pub(crate) name: String,
    pub(crate) kind: UnitKind,
    pub(crate) level: u32,
    pub(crate) sheet: StatSheet,
    pub(crate) initial_sheet: StatSheet,
    pub(crate) pseudo: PseudoStats,
    pub(crate) initial_pseudo: PseudoStats,
    pub(crate) weapons: Weapons,
    resources: [ResourceBar; 3],
    pub(crate) health: HealthBar,
    pub(crate) gcd: TimerId,
    pub(crate) timers: Vec<TimerId>,
    pub(crate) spellbook: Vec<SpellId>,
    pub(crate) auras: Vec<AuraId>,
    pub(crate) listeners: Listeners,
    pub(crate) hardcast: Option<Hardcast>,
    pub(crate) current_target: Option<UnitId>,
    pub(crate) pets: Vec<UnitId>,
    pub(crate) pet: Option<PetState>,
    pub(crate) enabled: bool,
    pub(crate) ready_handle: Option<ActionHandle>,
    pub(crate) auto_attacks: AutoAttackState,
    pub(crate) metrics: UnitMetrics,
}

impl Unit {
    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn weapons(&self) -> &Weapons {
        &self.weapons
    }

    pub fn current_target(&self) -> Option<UnitId> {
        self.current_target
    }

    pub fn metrics(&self) -> &UnitMetrics {
        &self.metrics
    }

    pub fn gcd_timer(&self) -> TimerId {
        self.gcd
    }

    pub fn pets(&self) -> &[UnitId] {
        &self.pets
    }

    pub(crate) fn resource_bar(&self, kind: ResourceKind) -> &ResourceBar {
        &self.resources[kind.index()]
    }

    pub(crate) fn resource_bar_mut(&mut self, kind: ResourceKind) -> &mut ResourceBar {
        &mut self.resources[kind.index()]
    }

    /// Refill resources and health to their starting values.
    pub(crate) fn reset_pools(&mut self) {
        let stats = *self.sheet.effective();
        for kind in [ResourceKind::Mana, ResourceKind::Energy, ResourceKind::Rage] {
            let bar = &mut self.resources[kind.index()];
            if !bar.enabled {
                continue;
            }
            let (max, start) = match kind {
                ResourceKind::Mana => (stats[Stat::Mana], stats[Stat::Mana]),
                ResourceKind::Energy => (POOL_MAX, POOL_MAX),
                ResourceKind::Rage => (POOL_MAX, 0.0),
            };
            bar.max = max;
            bar.current = start;
        }
        self.health.max = stats[Stat::Health];
        self.health.current = self.health.max;
    }
}

/// Read access to a unit's stats.
pub trait HasStats {
    fn stats(&self) -> &Stats;
    fn pseudo_stats(&self) -> &PseudoStats;
    fn level(&self) -> u32;

    fn stat(&self, stat: Stat) -> f64 {
        self.stats()[stat]
    }
}

/// Read access to what a unit has registered.
pub trait HasSpellbook {
    fn spellbook(&self) -> &[SpellId];
    fn registered_auras(&self) -> &[AuraId];
}

impl HasStats for Unit {
    fn stats(&self) -> &Stats {
        self.sheet.effective()
    }

    fn pseudo_stats(&self) -> &PseudoStats {
        &self.pseudo
    }

    fn level(&self) -> u32 {
        self.level
    }
}

impl HasSpellbook for Unit {
    fn spellbook(&self) -> &[SpellId] {
        &self.spellbook
    }

    fn registered_auras(&self) -> &[AuraId] {
        &self.auras
    }
}

impl Simulation {
    pub(crate) fn add_unit(&mut self, setup: UnitSetup, kind: UnitKind) -> UnitId {
        let id = UnitId(self.units.len());
        let sheet = StatSheet::new(setup.base_stats);
        let mut resources = [ResourceBar::default(); 3];
        for resource in &setup.resources {
            resources[resource.index()].enabled = true;
        }
        self.units.push(Unit {
            id,
            name: setup.name,
            kind,
            level: setup.level,
            initial_sheet: sheet.clone(),
            sheet,
            pseudo: setup.pseudo_stats,
            initial_pseudo: setup.pseudo_stats,
            weapons: setup.weapons,
            resources,
            health: HealthBar {
                tracked: setup.track_health,
                ..HealthBar::default()
            },
            gcd: TimerId(usize::MAX),
            timers: Vec::new(),
            spellbook: Vec::new(),
            auras: Vec::new(),
            listeners: Listeners::default(),
            hardcast: None,
            current_target: None,
            pets: Vec::new(),
            pet: None,
            enabled: !matches!(kind, UnitKind::Pet { .. }),
            ready_handle: None,
            auto_attacks: AutoAttackState::new(setup.auto_attacks),
            metrics: UnitMetrics::default(),
        });
        self.agents.push(None);
        let gcd = self.new_timer(id);
        self.units[id.0].gcd = gcd;
        self.units[id.0].reset_pools();
        id
    }

    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.0]
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit_by_name(&self, name: &str) -> Option<UnitId> {
        self.units.iter().find(|u| u.name == name).map(|u| u.id)
    }

    /// Units of kind `Enemy`, in creation order.
    pub fn enemies(&self) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|u| u.kind == UnitKind::Enemy)
            .map(|u| u.id)
            .collect()
    }

    pub fn stat(&self, unit: UnitId, stat: Stat) -> f64 {
        self.units[unit.0].sheet.get(stat)
    }

    pub fn stats(&self, unit: UnitId) -> &Stats {
        self.units[unit.0].sheet.effective()
    }

    pub fn pseudo_stats(&self, unit: UnitId) -> &PseudoStats {
        &self.units[unit.0].pseudo
    }

    pub fn set_target(&mut self, unit: UnitId, target: Option<UnitId>) {
        self.units[unit.0].current_target = target;
    }

    /// Add flat stats at runtime and propagate the resulting delta.
    pub fn add_stats_dynamic(&mut self, unit: UnitId, stats: &Stats) {
        let delta = self.units[unit.0].sheet.add_flat(stats);
        self.on_stats_changed(unit, delta);
    }

    /// Register a dependency on `unit`. Cycles are rejected.
    pub fn register_dependency(
        &mut self,
        unit: UnitId,
        dep: StatDependency,
        enabled: bool,
    ) -> SimResult<DependencyId> {
        self.ensure_registration_open("stat dependency")?;
        let (id, delta) = self.units[unit.0].sheet.register_dependency(dep, enabled)?;
        self.on_stats_changed(unit, delta);
        Ok(id)
    }

    /// Enable a dependency. Enabling an enabled dependency changes nothing.
    pub fn enable_dependency(&mut self, unit: UnitId, dep: DependencyId) {
        let delta = self.units[unit.0].sheet.set_dependency(dep, true);
        self.on_stats_changed(unit, delta);
    }

    /// Disable a dependency. Disabling a disabled dependency changes nothing.
    pub fn disable_dependency(&mut self, unit: UnitId, dep: DependencyId) {
        let delta = self.units[unit.0].sheet.set_dependency(dep, false);
        self.on_stats_changed(unit, delta);
    }

    pub fn is_dependency_enabled(&self, unit: UnitId, dep: DependencyId) -> bool {
        self.units[unit.0].sheet.dependency_enabled(dep)
    }

    pub fn multiply_pseudo_stat(&mut self, unit: UnitId, stat: PseudoStat, factor: f64) {
        self.units[unit.0].pseudo.multiply(stat, factor);
    }

    pub fn add_pseudo_stat(&mut self, unit: UnitId, stat: PseudoStat, amount: f64) {
        self.units[unit.0].pseudo.add(stat, amount);
    }

    fn on_stats_changed(&mut self, unit: UnitId, delta: Stats) {
        if delta.is_zero() {
            return;
        }

        let u = &mut self.units[unit.0];
        for (stat, value) in u.sheet.effective().iter_nonzero() {
            if value < 0.0 && !stat.allows_negative() && delta[stat] != 0.0 {
                warn!(unit = %u.name, stat = %stat, value, "stat dropped below zero");
            }
        }
        if delta[Stat::Mana] != 0.0 {
            let bar = u.resource_bar_mut(ResourceKind::Mana);
            if bar.enabled {
                bar.max += delta[Stat::Mana];
                bar.current = bar.current.min(bar.max);
            }
        }
        if delta[Stat::Health] != 0.0 {
            u.health.max += delta[Stat::Health];
            u.health.current = u.health.current.min(u.health.max);
        }

        let pets = u.pets.clone();
        for pet in pets {
            self.refresh_pet_inheritance(pet);
        }
    }

    pub fn has_resource(&self, unit: UnitId, kind: ResourceKind) -> bool {
        self.units[unit.0].resource_bar(kind).enabled
    }

    pub fn resource(&self, unit: UnitId, kind: ResourceKind) -> f64 {
        self.units[unit.0].resource_bar(kind).current
    }

    pub fn max_resource(&self, unit: UnitId, kind: ResourceKind) -> f64 {
        self.units[unit.0].resource_bar(kind).max
    }

    /// Add resource, capped at the maximum. Returns the amount actually gained.
    pub fn add_resource(&mut self, unit: UnitId, kind: ResourceKind, amount: f64) -> f64 {
        let bar = self.units[unit.0].resource_bar_mut(kind);
        if !bar.enabled {
            return 0.0;
        }
        let before = bar.current;
        bar.current = (bar.current + amount).min(bar.max);
        bar.current - before
    }

    /// Spend resource. Returns false and spends nothing if there is not enough.
    pub fn spend_resource(&mut self, unit: UnitId, kind: ResourceKind, amount: f64) -> bool {
        let bar = self.units[unit.0].resource_bar_mut(kind);
        if !bar.enabled || bar.current + 1e-9 < amount {
            return false;
        }
        bar.current = (bar.current - amount).max(0.0);
        true
    }

    pub(crate) fn regen_tick(&mut self, unit: UnitId) {
        let mp5 = self.stat(unit, Stat::MP5);
        if mp5 > 0.0 {
            self.add_resource(unit, ResourceKind::Mana, mp5 * REGEN_INTERVAL.as_secs_f64() / 5.0);
        }
        self.add_resource(unit, ResourceKind::Energy, ENERGY_PER_TICK);
    }

    /// Current health, `None` if the unit does not track health.
    pub fn current_health(&self, unit: UnitId) -> Option<f64> {
        let health = &self.units[unit.0].health;
        health.tracked.then_some(health.current)
    }

    pub fn is_dead(&self, unit: UnitId) -> bool {
        let health = &self.units[unit.0].health;
        health.tracked && health.current <= 0.0
    }

    pub(crate) fn apply_damage(&mut self, target: UnitId, amount: f64) {
        let u = &mut self.units[target.0];
        u.metrics.damage_taken += amount;
        if !u.health.tracked || u.health.current <= 0.0 {
            return;
        }
        u.health.current -= amount;
        if u.health.current <= 0.0 {
            u.health.current = 0.0;
            u.metrics.deaths += 1;
            debug!(unit = %u.name, t = ?self.scheduler.now(), "unit died");
            if u.kind == UnitKind::Enemy && self.config.end_condition == EndCondition::TargetDeath
            {
                self.end_trial();
            }
        }
    }

    pub(crate) fn apply_healing(&mut self, target: UnitId, amount: f64) {
        let u = &mut self.units[target.0];
        u.metrics.healing_taken += amount;
        if u.health.tracked && u.health.current > 0.0 {
            u.health.current = (u.health.current + amount).min(u.health.max);
        }
    }
}
