//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use simkernel::*;
use std::time::Duration;

pub fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value)
}

pub fn config(duration_secs: f64) -> SimulationConfig {
    SimulationConfig {
        duration_secs,
        ..SimulationConfig::default()
    }
}

/// Agent that registers content from a closure and never acts on its own.
pub struct Content<F>(Option<F>);

pub fn content<F>(register: F) -> Content<F>
where
    F: FnOnce(&mut Registrar<'_>) -> SimResult<()> + Send + 'static,
{
    Content(Some(register))
}

impl<F> Agent for Content<F>
where
    F: FnOnce(&mut Registrar<'_>) -> SimResult<()> + Send + 'static,
{
    fn initialize(&mut self, registrar: &mut Registrar<'_>) -> SimResult<()> {
        match self.0.take() {
            Some(register) => register(registrar),
            None => Ok(()),
        }
    }

    fn execute_rotation(&mut self, _sim: &mut Simulation, _unit: UnitId) {}
}

/// Agent that registers one spell and casts it whenever possible.
pub struct Spam {
    config: Option<SpellConfig>,
    spell: Option<SpellId>,
}

impl Spam {
    pub fn new(config: SpellConfig) -> Self {
        Self {
            config: Some(config),
            spell: None,
        }
    }
}

impl Agent for Spam {
    fn initialize(&mut self, registrar: &mut Registrar<'_>) -> SimResult<()> {
        if let Some(config) = self.config.take() {
            self.spell = Some(registrar.register_spell(config)?);
        }
        Ok(())
    }

    fn execute_rotation(&mut self, sim: &mut Simulation, _unit: UnitId) {
        if let Some(spell) = self.spell {
            sim.cast(spell, None);
        }
    }
}

/// One player against one level-60 dummy; the simulation is reset with seed 1.
pub fn duel(player: UnitSetup, agent: impl Agent + 'static, duration_secs: f64) -> (Simulation, UnitId, UnitId) {
    let mut sim = SimulationBuilder::new(config(duration_secs))
        .add_player(PlayerSetup::new(player, agent))
        .add_target(PresetTarget::new("Dummy", 60))
        .build()
        .unwrap();
    sim.reset(1);
    let player = sim.units()[0].id();
    let dummy = sim.unit_by_name("Dummy").unwrap();
    (sim, player, dummy)
}
