//! Controllable units.
//!
//! Content attaches behavior to a unit by implementing [`Agent`]. During
//! the build it registers spells, auras and triggers through a
//! [`Registrar`]; during a trial the kernel calls
//! [`Agent::execute_rotation`] whenever the unit may act.

use crate::aura::{AuraConfig, AuraId};
use crate::dependency::{DependencyId, StatDependency};
use crate::error::SimResult;
use crate::proc_trigger::{ProcTriggerConfig, ProcTriggerId};
use crate::simulation::Simulation;
use crate::spell::{SpellConfig, SpellId};
use crate::timer::{Cooldown, TimerId};
use crate::unit::UnitId;
use std::sync::Arc;
use std::time::Duration;

/// Behavior of a unit.
///
/// # Examples
///
/// ```rust
/// use simkernel::*;
/// use std::time::Duration;
///
/// struct Wand {
///     shoot: Option<SpellId>,
/// }
///
/// impl Agent for Wand {
///     fn initialize(&mut self, registrar: &mut Registrar<'_>) -> SimResult<()> {
///         let config = SpellConfig::new("Shoot", SpellSchool::SHADOW, ProcMask::RANGED_SPECIAL)
///             .with_gcd(Duration::from_millis(1500))
///             .with_step(SpellStep::damage(BaseAmount::Flat(100.0), 0.0, OutcomeModel::AlwaysHit));
///         self.shoot = Some(registrar.register_spell(config)?);
///         Ok(())
///     }
///
///     fn execute_rotation(&mut self, sim: &mut Simulation, _unit: UnitId) {
///         if let Some(shoot) = self.shoot {
///             sim.cast(shoot, None);
///         }
///     }
/// }
///
/// let mut sim = SimulationBuilder::new(SimulationConfig {
///     duration_secs: 15.0,
///     ..SimulationConfig::default()
/// })
/// .add_player(PlayerSetup::new(UnitSetup::new("Priest", 60), Wand { shoot: None }))
/// .add_target(PresetTarget::new("Dummy", 63))
/// .build()
/// .unwrap();
///
/// let result = sim.run_trial(1);
/// // One shot every 1.5 seconds from t=0 to t=13.5.
/// assert_eq!(result.unit("Priest").unwrap().damage, 1000.0);
/// ```
pub trait Agent: Send {
    /// Register content. Called once, while the simulation is being built.
    fn initialize(&mut self, registrar: &mut Registrar<'_>) -> SimResult<()>;

    /// Reset per-trial agent state. Called before every trial.
    fn reset(&mut self, _sim: &mut Simulation, _unit: UnitId) {}

    /// Decide what to do now. Called whenever the unit may act.
    fn execute_rotation(&mut self, sim: &mut Simulation, unit: UnitId);
}

/// A unit the kernel can drive. Every [`Agent`] is controllable.
pub trait IsControllable: Agent {}

impl<T: Agent + ?Sized> IsControllable for T {}

/// Creates a fresh agent, e.g. an enemy AI per simulation.
pub type AgentFactory = Arc<dyn Fn() -> Box<dyn Agent> + Send + Sync>;

/// Registration-phase view of the simulation for one unit.
pub struct Registrar<'a> {
    pub(crate) sim: &'a mut Simulation,
    pub(crate) unit: UnitId,
}

impl<'a> Registrar<'a> {
    pub(crate) fn new(sim: &'a mut Simulation, unit: UnitId) -> Self {
        Self { sim, unit }
    }

    /// The unit being registered.
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// The unit's default target, if any.
    pub fn target(&self) -> Option<UnitId> {
        self.sim.unit(self.unit).current_target()
    }

    /// Every enemy, in creation order.
    pub fn enemies(&self) -> Vec<UnitId> {
        self.sim.enemies()
    }

    /// Read-only access to the simulation under construction.
    pub fn sim(&self) -> &Simulation {
        &*self.sim
    }

    pub fn register_spell(&mut self, config: SpellConfig) -> SimResult<SpellId> {
        self.sim.register_spell(self.unit, config)
    }

    pub fn register_aura(&mut self, config: AuraConfig) -> SimResult<AuraId> {
        self.sim.register_aura(self.unit, config)
    }

    /// Register an aura on another unit, e.g. a debuff on the target.
    pub fn register_aura_on(&mut self, unit: UnitId, config: AuraConfig) -> SimResult<AuraId> {
        self.sim.register_aura(unit, config)
    }

    pub fn register_permanent_aura(&mut self, config: AuraConfig) -> SimResult<AuraId> {
        self.sim.register_permanent_aura(self.unit, config)
    }

    pub fn register_proc_trigger(&mut self, config: ProcTriggerConfig) -> SimResult<AuraId> {
        self.sim.register_proc_trigger(self.unit, config)
    }

    pub fn attach_proc_trigger(
        &mut self,
        aura: AuraId,
        config: ProcTriggerConfig,
    ) -> SimResult<ProcTriggerId> {
        self.sim.attach_proc_trigger(aura, config)
    }

    pub fn new_timer(&mut self) -> TimerId {
        self.sim.new_timer(self.unit)
    }

    /// A new cooldown on a fresh timer, for sharing between spells.
    pub fn cooldown(&mut self, duration: Duration) -> Cooldown {
        Cooldown::new(self.new_timer(), duration)
    }

    pub fn register_dependency(&mut self, dep: StatDependency, enabled: bool) -> SimResult<DependencyId> {
        self.sim.register_dependency(self.unit, dep, enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl Agent for Idle {
        fn initialize(&mut self, _registrar: &mut Registrar<'_>) -> SimResult<()> {
            Ok(())
        }

        fn execute_rotation(&mut self, _sim: &mut Simulation, _unit: UnitId) {}
    }

    fn assert_controllable<T: IsControllable + ?Sized>() {}

    #[test]
    fn test_every_agent_is_controllable() {
        assert_controllable::<Idle>();
        assert_controllable::<dyn Agent>();
    }
}
