//! The simulation: owner of all state and driver of the trial loop.
//!
//! A [`Simulation`] is built once by a
//! [`SimulationBuilder`](crate::builder::SimulationBuilder) and then runs
//! any number of trials. Each trial starts from [`Simulation::reset`], which
//! restores the state captured at the end of the build, and runs until the
//! configured duration elapses, a tracked enemy dies, or nothing is left to
//! do.

use crate::agent::Agent;
use crate::aura::Aura;
use crate::config::SimulationConfig;
use crate::dot::Dot;
use crate::error::{SimError, SimResult};
use crate::metrics::{SpellReport, TrialResult, UnitMetrics, UnitReport};
use crate::proc_trigger::ProcTrigger;
use crate::rng::SimRng;
use crate::scheduler::{Action, PeriodicOptions, PeriodicTask, Scheduler};
use crate::spell::Spell;
use crate::timer::TimerSlot;
use crate::unit::{ResourceKind, Unit, UnitId, REGEN_INTERVAL};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Rotation calls allowed for one unit at one instant before the trial is
/// considered stuck.
pub const MAX_ROTATIONS_PER_INSTANT: u32 = 1000;

const DURATION_ROLL: &str = "Duration Variation";

/// Per-trial bookkeeping.
#[derive(Debug, Clone, Default)]
struct TrialState {
    seed: u64,
    end_at: Duration,
    ended: bool,
    /// Last instant each unit's rotation ran and how often it ran then.
    rotations: Vec<(Duration, u32)>,
}

/// All state of one encounter.
pub struct Simulation {
    pub(crate) config: SimulationConfig,
    pub(crate) scheduler: Scheduler,
    pub(crate) rng: SimRng,
    pub(crate) units: Vec<Unit>,
    pub(crate) agents: Vec<Option<Box<dyn Agent>>>,
    pub(crate) timers: Vec<TimerSlot>,
    pub(crate) spells: Vec<Spell>,
    pub(crate) auras: Vec<Aura>,
    pub(crate) dots: Vec<Dot>,
    pub(crate) procs: Vec<ProcTrigger>,
    pub(crate) periodic: HashMap<u64, PeriodicTask>,
    pub(crate) next_periodic_id: u64,
    pub(crate) proc_depth: u32,
    pub(crate) placeholders: BTreeSet<String>,
    initial_targets: Vec<Option<UnitId>>,
    finalized: bool,
    trial: TrialState,
}

impl Simulation {
    pub(crate) fn new(config: SimulationConfig) -> Self {
        let rng = SimRng::new(0, config.rng_mode);
        Self {
            config,
            scheduler: Scheduler::new(),
            rng,
            units: Vec::new(),
            agents: Vec::new(),
            timers: Vec::new(),
            spells: Vec::new(),
            auras: Vec::new(),
            dots: Vec::new(),
            procs: Vec::new(),
            periodic: HashMap::new(),
            next_periodic_id: 0,
            proc_depth: 0,
            placeholders: BTreeSet::new(),
            initial_targets: Vec::new(),
            finalized: false,
            trial: TrialState::default(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Mutable access to the random source, for content rolls.
    pub fn rng(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    /// Seed of the current trial.
    pub fn seed(&self) -> u64 {
        self.trial.seed
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn ensure_registration_open(&self, label: &str) -> SimResult<()> {
        if self.finalized {
            return Err(SimError::RegistrationClosed(label.to_string()));
        }
        Ok(())
    }

    /// Close the registration phase and snapshot the pre-trial state.
    pub(crate) fn finalize(&mut self) -> SimResult<()> {
        for index in 0..self.units.len() {
            self.register_auto_attacks(UnitId(index))?;
        }
        for unit in &mut self.units {
            unit.initial_sheet = unit.sheet.clone();
            unit.initial_pseudo = unit.pseudo;
        }
        self.initial_targets = self.units.iter().map(|u| u.current_target).collect();
        self.finalized = true;
        debug!(
            units = self.units.len(),
            spells = self.spells.len(),
            auras = self.auras.len(),
            "simulation finalized"
        );
        Ok(())
    }

    /// Time at which the current trial ends unless something ends it earlier.
    pub fn trial_end_time(&self) -> Duration {
        self.trial.end_at
    }

    pub fn trial_ended(&self) -> bool {
        self.trial.ended
    }

    /// End the current trial now. Nothing else runs afterwards.
    pub fn end_trial(&mut self) {
        if self.trial.ended {
            return;
        }
        self.trial.ended = true;
        debug!(t = ?self.now(), seed = self.trial.seed, "trial ended");
    }

    /// Restore the pre-trial state and queue the opening actions.
    pub fn reset(&mut self, seed: u64) {
        self.rng.reseed(seed);
        self.scheduler.reset();
        self.periodic.clear();
        self.placeholders.clear();
        self.proc_depth = 0;
        self.trial = TrialState {
            seed,
            end_at: Duration::ZERO,
            ended: false,
            rotations: vec![(Duration::MAX, 0); self.units.len()],
        };

        let mut length = self.config.duration_secs;
        let variation = self.config.duration_variation_secs;
        if variation > 0.0 {
            length += self.rng.roll(DURATION_ROLL, -variation, variation);
        }
        self.trial.end_at = Duration::from_secs_f64(length);
        self.scheduler.schedule_at(self.trial.end_at, Action::EndTrial);

        for (unit, target) in self.units.iter_mut().zip(&self.initial_targets) {
            unit.sheet = unit.initial_sheet.clone();
            unit.pseudo = unit.initial_pseudo;
            unit.hardcast = None;
            unit.ready_handle = None;
            unit.current_target = *target;
            unit.metrics = UnitMetrics::default();
            unit.enabled = true;
            unit.reset_pools();
        }
        self.reset_pets();
        self.reset_timers();
        self.reset_spells();
        self.reset_dots();
        self.reset_procs();
        self.reset_auto_attacks();
        self.reset_auras();
        self.summon_pets_on_reset();

        for index in 0..self.agents.len() {
            if let Some(mut agent) = self.agents[index].take() {
                agent.reset(self, UnitId(index));
                self.agents[index] = Some(agent);
            }
        }

        for index in 0..self.units.len() {
            let unit = UnitId(index);
            if !self.units[index].enabled {
                continue;
            }
            self.request_rotation(unit);
            self.start_auto_attacks(unit);
            if self.has_resource(unit, ResourceKind::Mana) || self.has_resource(unit, ResourceKind::Energy) {
                self.schedule_periodic(PeriodicOptions {
                    start: REGEN_INTERVAL,
                    period: REGEN_INTERVAL,
                    tick_count: None,
                    action: Arc::new(move |sim: &mut Simulation, _| {
                        if sim.units[unit.0].enabled {
                            sim.regen_tick(unit);
                        }
                    }),
                });
            }
        }
        trace!(seed, end_at = ?self.trial.end_at, "trial reset");
    }

    /// Run one full trial and collect its results.
    pub fn run_trial(&mut self, seed: u64) -> TrialResult {
        self.reset(seed);
        while self.advance() {}
        self.collect_result()
    }

    /// Run the next due action. Returns false once the trial is over.
    pub fn advance(&mut self) -> bool {
        if self.trial.ended {
            return false;
        }
        match self.scheduler.pop_due(self.trial.end_at) {
            Some((_, action)) => {
                self.execute(action);
                !self.trial.ended
            }
            None => {
                self.scheduler.advance_clock(self.trial.end_at);
                self.end_trial();
                false
            }
        }
    }

    /// Run every action due no later than `at` and move the clock there.
    ///
    /// Stops early if the trial ends.
    pub fn advance_to(&mut self, at: Duration) {
        let until = at.min(self.trial.end_at);
        while !self.trial.ended {
            match self.scheduler.pop_due(until) {
                Some((_, action)) => self.execute(action),
                None => break,
            }
        }
        if !self.trial.ended {
            self.scheduler.advance_clock(until);
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::AuraExpire(id) => {
                self.auras[id.0].expire_handle = None;
                self.deactivate_aura(id);
            }
            Action::DotTick(id) => self.dot_tick(id),
            Action::CastComplete(unit) => self.complete_cast(unit),
            Action::UnitReady(unit) => self.run_rotation(unit),
            Action::AutoAttack { unit, hand } => self.swing(unit, hand),
            Action::PetTimeout(pet) => {
                if let Some(state) = self.units[pet.0].pet.as_mut() {
                    state.timeout_handle = None;
                }
                self.disable_pet(pet);
            }
            Action::Periodic(id) => self.run_periodic(id),
            Action::EndTrial => self.end_trial(),
            Action::Custom(action) => action(self),
        }
    }

    /// Make sure the unit's rotation runs as soon as it is free.
    ///
    /// Does nothing if a wake-up is already pending.
    pub fn request_rotation(&mut self, unit: UnitId) {
        let u = &self.units[unit.0];
        if !u.enabled || self.agents[unit.0].is_none() {
            return;
        }
        if let Some(handle) = u.ready_handle {
            if self.scheduler.is_pending(handle) {
                return;
            }
        }
        let at = self.next_free_time(unit);
        let handle = self.scheduler.schedule_at(at, Action::UnitReady(unit));
        self.units[unit.0].ready_handle = Some(handle);
    }

    /// Wake the unit's rotation at `at`, replacing any pending wake-up.
    pub fn wait_until(&mut self, unit: UnitId, at: Duration) {
        if let Some(handle) = self.units[unit.0].ready_handle.take() {
            self.scheduler.cancel(handle);
        }
        let at = at.max(self.now());
        let handle = self.scheduler.schedule_at(at, Action::UnitReady(unit));
        self.units[unit.0].ready_handle = Some(handle);
    }

    /// Wake the unit's rotation after `delay`.
    pub fn wait(&mut self, unit: UnitId, delay: Duration) {
        let at = self.now() + delay;
        self.wait_until(unit, at);
    }

    /// Earliest time the unit is off its GCD and not hardcasting.
    pub fn next_free_time(&self, unit: UnitId) -> Duration {
        let u = &self.units[unit.0];
        let gcd = self.timer(u.gcd).ready_at();
        let cast = u.hardcast.map_or(Duration::ZERO, |h| h.completes_at);
        self.now().max(gcd).max(cast)
    }

    fn run_rotation(&mut self, unit: UnitId) {
        self.units[unit.0].ready_handle = None;
        if !self.units[unit.0].enabled {
            return;
        }

        let now = self.now();
        let name = &self.units[unit.0].name;
        let (at, count) = &mut self.trial.rotations[unit.0];
        if *at == now {
            *count += 1;
            assert!(
                *count <= MAX_ROTATIONS_PER_INSTANT,
                "rotation loop: {} acted more than {} times at {:?}",
                name,
                MAX_ROTATIONS_PER_INSTANT,
                now
            );
        } else {
            *at = now;
            *count = 1;
        }

        let mut agent = match self.agents[unit.0].take() {
            Some(agent) => agent,
            None => return,
        };
        agent.execute_rotation(self, unit);
        self.agents[unit.0] = Some(agent);

        if self.trial.ended || !self.units[unit.0].enabled {
            return;
        }
        if self.units[unit.0].ready_handle.is_none() {
            let free_at = self.next_free_time(unit);
            if free_at > self.now() {
                let handle = self.scheduler.schedule_at(free_at, Action::UnitReady(unit));
                self.units[unit.0].ready_handle = Some(handle);
            }
        }
    }

    fn collect_result(&mut self) -> TrialResult {
        self.close_aura_uptime();
        let duration = self.now().as_secs_f64();
        let per_second = |amount: f64| if duration > 0.0 { amount / duration } else { 0.0 };

        let units = self
            .units
            .iter()
            .map(|unit| {
                let spells = unit
                    .spellbook
                    .iter()
                    .map(|id| {
                        let spell = &self.spells[id.0];
                        SpellReport {
                            label: spell.config.label.clone(),
                            metrics: spell.metrics,
                        }
                    })
                    .collect();
                UnitReport {
                    name: unit.name.clone(),
                    damage: unit.metrics.damage_dealt,
                    healing: unit.metrics.healing_dealt,
                    dps: per_second(unit.metrics.damage_dealt),
                    hps: per_second(unit.metrics.healing_dealt),
                    damage_taken: unit.metrics.damage_taken,
                    deaths: unit.metrics.deaths,
                    spells,
                }
            })
            .collect();

        TrialResult {
            seed: self.trial.seed,
            duration,
            units,
            placeholders: self.placeholders.iter().cloned().collect(),
        }
    }
}
