//! Two-phase construction of a [`Simulation`].
//!
//! The builder collects unit setups and agents, then [`SimulationBuilder::build`]
//! creates the units, lets every agent register its content through a
//! [`Registrar`], and finalizes the simulation. Every content error surfaces
//! here, before any trial runs.

use crate::agent::{Agent, AgentFactory, Registrar};
use crate::config::SimulationConfig;
use crate::error::{SimError, SimResult};
use crate::pet::{PetState, StatInheritance};
use crate::simulation::Simulation;
use crate::stat::{PseudoStats, Stat, Stats};
use crate::unit::{UnitId, UnitKind, UnitSetup, Weapon};
use tracing::debug;

/// A player: a unit and the agent controlling it.
pub struct PlayerSetup {
    pub unit: UnitSetup,
    pub agent: Box<dyn Agent>,
}

impl PlayerSetup {
    pub fn new(unit: UnitSetup, agent: impl Agent + 'static) -> Self {
        Self {
            unit,
            agent: Box::new(agent),
        }
    }
}

/// A pet owned by a player.
pub struct PetSetup {
    pub unit: UnitSetup,
    pub agent: Option<Box<dyn Agent>>,
    pub inheritance: StatInheritance,
    /// Summon the pet at the start of every trial.
    pub summoned: bool,
}

impl PetSetup {
    pub fn new(unit: UnitSetup, inheritance: StatInheritance) -> Self {
        Self {
            unit,
            agent: None,
            inheritance,
            summoned: false,
        }
    }

    pub fn with_agent(mut self, agent: impl Agent + 'static) -> Self {
        self.agent = Some(Box::new(agent));
        self
    }

    /// Keep the pet out from the first instant of every trial.
    pub fn summoned(mut self) -> Self {
        self.summoned = true;
        self
    }
}

/// A preset enemy.
///
/// # Examples
///
/// ```rust
/// use simkernel::{PresetTarget, Stat, Stats};
///
/// let boss = PresetTarget::new("Patchwerk", 63)
///     .with_stats(Stats::new().with(Stat::Armor, 3731.0))
///     .with_health(1_000_000.0);
/// assert_eq!(boss.health, Some(1_000_000.0));
/// ```
#[derive(Clone)]
pub struct PresetTarget {
    pub name: String,
    pub level: u32,
    pub stats: Stats,
    pub pseudo_stats: PseudoStats,
    /// Tracked health; `None` makes the target immortal.
    pub health: Option<f64>,
    pub main_hand: Option<Weapon>,
    pub ai: Option<AgentFactory>,
}

impl PresetTarget {
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
            stats: Stats::new(),
            pseudo_stats: PseudoStats::new(),
            health: None,
            main_hand: None,
            ai: None,
        }
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_health(mut self, health: f64) -> Self {
        self.health = Some(health);
        self
    }

    /// Attacks against this target come from the front.
    pub fn tanked(mut self, can_block: bool, can_parry: bool) -> Self {
        self.pseudo_stats.in_front_of_target = true;
        self.pseudo_stats.can_block = can_block;
        self.pseudo_stats.can_parry = can_parry;
        self
    }

    /// Give the target a weapon it swings automatically.
    pub fn with_main_hand(mut self, weapon: Weapon) -> Self {
        self.main_hand = Some(weapon);
        self
    }

    pub fn with_ai(mut self, factory: AgentFactory) -> Self {
        self.ai = Some(factory);
        self
    }

    fn unit_setup(&self) -> UnitSetup {
        let mut stats = self.stats;
        let mut setup = UnitSetup::new(self.name.clone(), self.level).with_pseudo_stats(self.pseudo_stats);
        if let Some(health) = self.health {
            stats[Stat::Health] = health;
            setup = setup.with_health();
        }
        if let Some(weapon) = self.main_hand {
            setup = setup.with_main_hand(weapon).with_auto_attacks();
        }
        setup.with_stats(stats)
    }
}

/// Collects the encounter, then builds a finalized [`Simulation`].
pub struct SimulationBuilder {
    config: SimulationConfig,
    players: Vec<PlayerSetup>,
    pets: Vec<(usize, PetSetup)>,
    targets: Vec<PresetTarget>,
}

impl SimulationBuilder {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            players: Vec::new(),
            pets: Vec::new(),
            targets: Vec::new(),
        }
    }

    pub fn add_player(mut self, player: PlayerSetup) -> Self {
        self.players.push(player);
        self
    }

    /// Add a pet owned by the `owner`-th player (in `add_player` order).
    pub fn add_pet(mut self, owner: usize, pet: PetSetup) -> Self {
        self.pets.push((owner, pet));
        self
    }

    pub fn add_target(mut self, target: PresetTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Create the units, run every agent's registration and finalize.
    ///
    /// Players and pets target the first enemy; enemies target the first
    /// player.
    pub fn build(self) -> SimResult<Simulation> {
        self.config.validate()?;
        if self.targets.is_empty() {
            return Err(SimError::NoTargets);
        }

        let mut sim = Simulation::new(self.config);
        let mut agents: Vec<(UnitId, Box<dyn Agent>)> = Vec::new();

        let mut players = Vec::with_capacity(self.players.len());
        for player in self.players {
            let id = sim.add_unit(player.unit, UnitKind::Player);
            agents.push((id, player.agent));
            players.push(id);
        }

        for (owner_index, pet) in self.pets {
            let owner = *players
                .get(owner_index)
                .ok_or(SimError::UnknownUnit(owner_index))?;
            let id = sim.add_unit(pet.unit, UnitKind::Pet { owner });
            sim.units[id.0].pet = Some(PetState {
                owner,
                inheritance: pet.inheritance,
                inherited: Stats::new(),
                enabled_on_reset: pet.summoned,
                timeout_handle: None,
            });
            sim.units[owner.0].pets.push(id);
            if let Some(agent) = pet.agent {
                agents.push((id, agent));
            }
        }

        let mut enemies = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let id = sim.add_unit(target.unit_setup(), UnitKind::Enemy);
            if let Some(factory) = &target.ai {
                agents.push((id, factory()));
            }
            enemies.push(id);
        }

        let first_enemy = enemies.first().copied();
        let first_player = players.first().copied();
        for unit in &mut sim.units {
            unit.current_target = match unit.kind {
                UnitKind::Player | UnitKind::Pet { .. } => first_enemy,
                UnitKind::Enemy => first_player,
            };
        }

        for (id, mut agent) in agents {
            agent.initialize(&mut Registrar::new(&mut sim, id))?;
            sim.agents[id.0] = Some(agent);
        }

        sim.finalize()?;
        debug!(
            players = players.len(),
            enemies = enemies.len(),
            "simulation built"
        );
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_targets_fails() {
        let result = SimulationBuilder::new(SimulationConfig::default()).build();
        assert!(matches!(result, Err(SimError::NoTargets)));
    }

    #[test]
    fn test_invalid_config_fails_before_units_exist() {
        let result = SimulationBuilder::new(SimulationConfig {
            duration_secs: -1.0,
            ..SimulationConfig::default()
        })
        .add_target(PresetTarget::new("Dummy", 63))
        .build();
        assert!(matches!(result, Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_pet_with_unknown_owner() {
        let result = SimulationBuilder::new(SimulationConfig::default())
            .add_pet(0, PetSetup::new(UnitSetup::new("Imp", 60), StatInheritance::new()))
            .add_target(PresetTarget::new("Dummy", 63))
            .build();
        assert!(matches!(result, Err(SimError::UnknownUnit(0))));
    }

    #[test]
    fn test_target_health_is_tracked() {
        let sim = SimulationBuilder::new(SimulationConfig::default())
            .add_target(PresetTarget::new("Dummy", 63).with_health(5000.0))
            .build()
            .unwrap();
        let dummy = sim.unit_by_name("Dummy").unwrap();
        assert_eq!(sim.current_health(dummy), Some(5000.0));
        assert!(sim.is_finalized());
    }
}
