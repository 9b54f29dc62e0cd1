//! # simkernel - Deterministic Combat Simulation Kernel
//!
//! A discrete-event kernel for simulating RPG combat encounters many times
//! over and reporting damage and healing distributions. It provides:
//! - **Deterministic** trials (same seed → same result, on any worker count)
//! - **Data-driven** content: spells, auras, dots and proc triggers are
//!   registered as ordered step lists, not hardcoded classes
//! - **Event-driven** time: nothing happens between scheduled actions
//! - **Reversible** stat effects backed by a cycle-free dependency graph
//!
//! ## Core Concepts
//!
//! ### Trial Loop
//!
//! ```text
//! [Scheduler] → Action → [Cast pipeline | Aura engine | Dot engine] → SpellResult → [Proc triggers]
//! ```
//!
//! 1. **Agents** decide what their unit does whenever it may act
//! 2. **Casts** check costs and cooldowns, then resolve their steps
//! 3. **Results** update health and metrics and are dispatched to aura listeners
//! 4. **Proc triggers** listen to results and fire more content
//!
//! ### Key Features
//!
//! - **Two-phase build**: content is registered through a `Registrar` and
//!   validated before any trial runs
//! - **Labeled randomness**: every roll draws from a named stream
//! - **Parallel trials**: `run_trials` spreads batches over a rayon pool
//!
//! ## Example
//!
//! ```rust
//! use simkernel::*;
//! use std::time::Duration;
//!
//! struct Fireballer {
//!     fireball: Option<SpellId>,
//! }
//!
//! impl Agent for Fireballer {
//!     fn initialize(&mut self, registrar: &mut Registrar<'_>) -> SimResult<()> {
//!         let fireball = SpellConfig::new("Fireball", SpellSchool::FIRE, ProcMask::SPELL_DAMAGE)
//!             .with_cast_time(Duration::from_millis(3000))
//!             .with_gcd(Duration::from_millis(1500))
//!             .with_step(SpellStep::damage(BaseAmount::Flat(600.0), 1.0, OutcomeModel::AlwaysHit));
//!         self.fireball = Some(registrar.register_spell(fireball)?);
//!         Ok(())
//!     }
//!
//!     fn execute_rotation(&mut self, sim: &mut Simulation, _unit: UnitId) {
//!         if let Some(fireball) = self.fireball {
//!             sim.cast(fireball, None);
//!         }
//!     }
//! }
//!
//! let mage = UnitSetup::new("Mage", 60).with_stats(Stats::new().with(Stat::SpellPower, 400.0));
//! let mut sim = SimulationBuilder::new(SimulationConfig { duration_secs: 30.0, ..SimulationConfig::default() })
//!     .add_player(PlayerSetup::new(mage, Fireballer { fireball: None }))
//!     .add_target(PresetTarget::new("Dummy", 60))
//!     .build()
//!     .unwrap();
//!
//! // Casts land at 3, 6, ..., 27 seconds; the one finishing at 30 is cut off.
//! let result = sim.run_trial(42);
//! assert_eq!(result.unit("Mage").unwrap().damage, 9.0 * 1000.0);
//! ```
//!
//! ## Modules
//!
//! - [`scheduler`] - Event queue, one-shot and periodic actions
//! - [`simulation`] - Owner of all state, trial loop and reset
//! - [`builder`] - Two-phase construction of a simulation
//! - [`unit`] - Units, resources, health and weapons
//! - [`stat`] / [`dependency`] / [`graph`] - Stats and derived-stat dependencies
//! - [`aura`] - Aura state machine, stacks and listeners
//! - [`spell`] / [`cast`] / [`outcome`] - Spells, the cast pipeline and attack tables
//! - [`dot`] - Periodic damage and healing
//! - [`proc_trigger`] - Chance-on-event triggers
//! - [`pet`] - Pet lifecycle and stat inheritance
//! - [`runner`] - Parallel trials and aggregation
//! - [`error`] - Error types

pub mod agent;
pub mod aura;
pub mod auto_attack;
pub mod builder;
pub mod cast;
pub mod config;
pub mod dependency;
pub mod dot;
pub mod error;
pub mod flags;
pub mod graph;
pub mod metrics;
pub mod outcome;
pub mod pet;
pub mod proc_trigger;
pub mod rng;
pub mod runner;
pub mod scheduler;
pub mod school;
pub mod simulation;
pub mod spell;
pub mod stat;
pub mod timer;
pub mod unit;

// Re-export main types for convenience
pub use builder::{PetSetup, PlayerSetup, PresetTarget, SimulationBuilder};
pub use config::{EndCondition, RunConfig, SimulationConfig};
pub use error::{SimError, SimResult};
pub use simulation::Simulation;

// Re-export the content model
pub use agent::{Agent, AgentFactory, IsControllable, Registrar};
pub use aura::{AuraConfig, AuraDuration, AuraEffect, AuraEvent, AuraId, AuraState};
pub use cast::{CastFailure, CastOutcome};
pub use dependency::{DependencyId, StatDependency};
pub use dot::{DotConfig, DotId};
pub use flags::{EventMask, HitOutcome, ProcMask, SpellFlags};
pub use outcome::{OutcomeModel, SpellResult};
pub use pet::StatInheritance;
pub use proc_trigger::{ppm_proc_chance, ProcAction, ProcChance, ProcEvent, ProcTriggerConfig, ProcTriggerId};
pub use scheduler::{ActionHandle, PeriodicId, PeriodicOptions};
pub use school::SpellSchool;
pub use spell::{
    BaseAmount, ResourceCost, SpellConfig, SpellId, SpellMod, SpellModKind, SpellModTarget,
    SpellStep, StepTarget,
};
pub use stat::{PseudoStat, PseudoStats, Stat, Stats};
pub use timer::{Cooldown, Timer, TimerId};
pub use unit::{Hand, HasSpellbook, HasStats, ResourceKind, UnitId, UnitKind, UnitSetup, Weapon};

// Re-export results and parallel running
pub use metrics::{Distribution, SpellMetrics, TrialResult, UnitReport};
pub use rng::{RngMode, SimRng};
pub use runner::{batch_ranges, run_trials, trial_seed, RunReport, TrialAbort, WorkerPool};
