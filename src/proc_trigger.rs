//! Proc triggers.
//!
//! A trigger listens to result events through an aura. It can own a
//! permanent aura of its own, or ride on an existing aura and only be live
//! while that aura is active.
//!
//! For each qualifying event the checks run in this order: proc-from-proc
//! gate, proc mask, outcome, school, harmful, internal cooldown, chance.
//! Only when all pass is the internal cooldown started and the handler run.

use crate::aura::{AuraConfig, AuraEvent, AuraId};
use crate::error::{SimError, SimResult};
use crate::flags::{EventMask, HitOutcome, ProcMask};
use crate::outcome::SpellResult;
use crate::school::SpellSchool;
use crate::simulation::Simulation;
use crate::spell::SpellId;
use crate::timer::Cooldown;
use crate::unit::{UnitId, Weapons};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Index of a proc trigger within its simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcTriggerId(pub(crate) usize);

/// Probability model of a trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcChance {
    /// Fixed chance per qualifying event, in `[0, 1]`.
    Flat(f64),
    /// Procs per minute, normalized by the swinging weapon's base speed.
    Ppm(f64),
}

/// Per-event chance for a PPM trigger: `ppm * swing_interval / 60`.
///
/// # Examples
///
/// ```rust
/// use simkernel::ppm_proc_chance;
/// use std::time::Duration;
///
/// // One proc per minute on a 3.0 speed weapon is a 5% chance per swing.
/// let chance = ppm_proc_chance(1.0, Duration::from_secs(3));
/// assert!((chance - 0.05).abs() < 1e-12);
/// ```
pub fn ppm_proc_chance(ppm: f64, swing_interval: Duration) -> f64 {
    ppm * swing_interval.as_secs_f64() / 60.0
}

/// What fired a trigger.
#[derive(Debug, Clone, Copy)]
pub struct ProcEvent {
    pub trigger: ProcTriggerId,
    /// Aura the trigger listens through.
    pub aura: AuraId,
    pub spell: SpellId,
    pub caster: UnitId,
    pub target: UnitId,
    /// `None` for cast-complete events.
    pub result: Option<SpellResult>,
}

impl ProcEvent {
    /// The other party from the trigger owner's point of view.
    pub fn counterpart(&self, owner: UnitId) -> UnitId {
        if self.caster == owner {
            self.target
        } else {
            self.caster
        }
    }
}

pub type ProcHook = Arc<dyn Fn(&mut Simulation, &ProcEvent) + Send + Sync>;

/// What a trigger does when it fires.
#[derive(Clone)]
pub enum ProcAction {
    /// Resolve a spell on the event's counterpart, without cost or timing.
    CastSpell(SpellId),
    ActivateAura(AuraId),
    AddAuraStack(AuraId),
    Custom(ProcHook),
}

impl std::fmt::Debug for ProcAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcAction::CastSpell(id) => write!(f, "CastSpell({:?})", id),
            ProcAction::ActivateAura(id) => write!(f, "ActivateAura({:?})", id),
            ProcAction::AddAuraStack(id) => write!(f, "AddAuraStack({:?})", id),
            ProcAction::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Everything needed to register a proc trigger.
///
/// Empty masks mean "any": an empty `proc_mask`, `outcome` or `school`
/// does not filter.
#[derive(Debug, Clone)]
pub struct ProcTriggerConfig {
    pub name: String,
    pub callbacks: EventMask,
    pub proc_mask: ProcMask,
    pub outcome: HitOutcome,
    pub school: SpellSchool,
    /// Only results that dealt damage.
    pub harmful: bool,
    pub chance: ProcChance,
    pub icd: Option<Duration>,
    pub can_proc_from_procs: bool,
    pub action: ProcAction,
}

impl ProcTriggerConfig {
    pub fn new(name: impl Into<String>, callbacks: EventMask, action: ProcAction) -> Self {
        Self {
            name: name.into(),
            callbacks,
            proc_mask: ProcMask::EMPTY,
            outcome: HitOutcome::EMPTY,
            school: SpellSchool::NONE,
            harmful: false,
            chance: ProcChance::Flat(1.0),
            icd: None,
            can_proc_from_procs: false,
            action,
        }
    }

    pub fn with_proc_mask(mut self, mask: ProcMask) -> Self {
        self.proc_mask = mask;
        self
    }

    pub fn with_outcome(mut self, outcome: HitOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_school(mut self, school: SpellSchool) -> Self {
        self.school = school;
        self
    }

    pub fn harmful(mut self) -> Self {
        self.harmful = true;
        self
    }

    pub fn with_chance(mut self, chance: f64) -> Self {
        self.chance = ProcChance::Flat(chance);
        self
    }

    pub fn with_ppm(mut self, ppm: f64) -> Self {
        self.chance = ProcChance::Ppm(ppm);
        self
    }

    pub fn with_icd(mut self, icd: Duration) -> Self {
        self.icd = Some(icd);
        self
    }

    pub fn procs_from_procs(mut self) -> Self {
        self.can_proc_from_procs = true;
        self
    }

    fn validate(&self) -> SimResult<()> {
        if self.name.is_empty() {
            return Err(SimError::invalid_content("(unnamed proc)", "proc trigger name is empty"));
        }
        if self.callbacks.is_empty() {
            return Err(SimError::invalid_content(&self.name, "proc trigger listens to nothing"));
        }
        match self.chance {
            ProcChance::Flat(p) if !(0.0..=1.0).contains(&p) => Err(SimError::invalid_content(
                &self.name,
                format!("chance {} is outside [0, 1]", p),
            )),
            ProcChance::Ppm(ppm) if ppm < 0.0 || !ppm.is_finite() => Err(
                SimError::invalid_content(&self.name, "ppm must be non-negative"),
            ),
            _ => match self.icd {
                Some(icd) if icd.is_zero() => Err(SimError::invalid_content(
                    &self.name,
                    "internal cooldown is zero",
                )),
                _ => Ok(()),
            },
        }
    }
}

/// A registered trigger.
pub struct ProcTrigger {
    pub(crate) config: ProcTriggerConfig,
    pub(crate) aura: AuraId,
    pub(crate) owner: UnitId,
    pub(crate) icd: Option<Cooldown>,
    pub(crate) fires: u32,
}

impl ProcTrigger {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn aura(&self) -> AuraId {
        self.aura
    }

    pub fn icd(&self) -> Option<Cooldown> {
        self.icd
    }

    /// Times fired this trial.
    pub fn fires(&self) -> u32 {
        self.fires
    }
}

const EVENT_MAP: [(EventMask, AuraEvent); 6] = [
    (EventMask::SPELL_HIT_DEALT, AuraEvent::SpellHitDealt),
    (EventMask::SPELL_HIT_TAKEN, AuraEvent::SpellHitTaken),
    (EventMask::HEAL_DEALT, AuraEvent::HealDealt),
    (EventMask::HEAL_TAKEN, AuraEvent::HealTaken),
    (EventMask::PERIODIC_DAMAGE_DEALT, AuraEvent::PeriodicDamageDealt),
    (EventMask::PERIODIC_HEAL_DEALT, AuraEvent::PeriodicHealDealt),
];

impl Simulation {
    /// Register a trigger with its own permanent aura on `unit`.
    ///
    /// Returns the aura; the trigger is live from the start of every trial.
    pub fn register_proc_trigger(&mut self, unit: UnitId, config: ProcTriggerConfig) -> SimResult<AuraId> {
        config.validate()?;
        let aura = self.register_aura(unit, AuraConfig::new(config.name.clone()).permanent())?;
        self.attach_proc_trigger(aura, config)?;
        Ok(aura)
    }

    /// Attach a trigger to an existing aura; it is live only while the aura is active.
    pub fn attach_proc_trigger(&mut self, aura: AuraId, config: ProcTriggerConfig) -> SimResult<ProcTriggerId> {
        self.ensure_registration_open(&config.name)?;
        config.validate()?;
        let owner = self.auras[aura.0].owner;
        let icd = config
            .icd
            .map(|duration| Cooldown::new(self.new_timer(owner), duration));
        let callbacks = config.callbacks;

        let id = ProcTriggerId(self.procs.len());
        self.procs.push(ProcTrigger {
            config,
            aura,
            owner,
            icd,
            fires: 0,
        });

        for (mask, event) in EVENT_MAP {
            if callbacks.matches(mask) {
                self.add_aura_listener(
                    aura,
                    event,
                    Arc::new(move |sim: &mut Simulation, aura: AuraId, result: &SpellResult| {
                        sim.try_proc(ProcEvent {
                            trigger: id,
                            aura,
                            spell: result.spell,
                            caster: result.caster,
                            target: result.target,
                            result: Some(*result),
                        })
                    }),
                );
            }
        }
        if callbacks.matches(EventMask::CAST_COMPLETE) {
            self.add_cast_complete_listener(
                aura,
                Arc::new(move |sim: &mut Simulation, aura: AuraId, spell: SpellId, target: UnitId| {
                    let caster = sim.spells[spell.0].unit;
                    sim.try_proc(ProcEvent {
                        trigger: id,
                        aura,
                        spell,
                        caster,
                        target,
                        result: None,
                    })
                }),
            );
        }
        Ok(id)
    }

    pub fn proc_trigger(&self, id: ProcTriggerId) -> &ProcTrigger {
        &self.procs[id.0]
    }

    fn try_proc(&mut self, event: ProcEvent) {
        let trigger = &self.procs[event.trigger.0];
        let config = &trigger.config;
        let spell = &self.spells[event.spell.0].config;

        let from_proc = self.proc_depth > 0
            || spell.proc_mask.matches(ProcMask::PROC)
            || event.result.map_or(false, |r| r.from_proc);
        if from_proc && !config.can_proc_from_procs {
            return;
        }
        if !config.proc_mask.is_empty() && !spell.proc_mask.matches(config.proc_mask) {
            return;
        }
        if let Some(result) = &event.result {
            if !config.outcome.is_empty() && !result.outcome.matches(config.outcome) {
                return;
            }
        }
        if !config.school.is_empty() && !spell.school.matches(config.school) {
            return;
        }
        if config.harmful {
            match &event.result {
                Some(result) if !result.is_heal && result.amount > 0.0 => {}
                _ => return,
            }
        }
        if let Some(icd) = &trigger.icd {
            if !self.is_cooldown_ready(icd) {
                return;
            }
        }

        let chance = match config.chance {
            ProcChance::Flat(p) => p,
            ProcChance::Ppm(ppm) => match self.units[trigger.owner.0]
                .weapons
                .get(Weapons::hand_for(spell.proc_mask))
            {
                Some(weapon) => ppm_proc_chance(ppm, weapon.swing_interval()),
                None => 0.0,
            },
        };
        let name = config.name.clone();
        if !self.rng.chance(&name, chance) {
            return;
        }

        let trigger = &mut self.procs[event.trigger.0];
        trigger.fires += 1;
        let icd = trigger.icd;
        let owner = trigger.owner;
        let action = trigger.config.action.clone();
        if let Some(icd) = icd {
            self.use_cooldown(&icd);
        }
        trace!(proc = %name, t = ?self.now(), "proc fired");

        self.proc_depth += 1;
        match action {
            ProcAction::CastSpell(spell) => {
                let target = event.counterpart(owner);
                self.cast_triggered(spell, Some(target));
            }
            ProcAction::ActivateAura(aura) => self.activate_aura(aura),
            ProcAction::AddAuraStack(aura) => self.add_aura_stack(aura),
            ProcAction::Custom(hook) => hook(self, &event),
        }
        self.proc_depth -= 1;
    }

    pub(crate) fn reset_procs(&mut self) {
        for trigger in &mut self.procs {
            trigger.fires = 0;
        }
        self.proc_depth = 0;
    }
}
