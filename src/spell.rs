//! Spell templates and spell modifiers.
//!
//! A spell is registered once from a [`SpellConfig`]. What a cast does is an
//! ordered list of [`SpellStep`]s; later content adds steps or modifiers
//! instead of wrapping an earlier callback.

use crate::aura::AuraId;
use crate::dot::{DotConfig, DotId};
use crate::error::{SimError, SimResult};
use crate::flags::{ProcMask, SpellFlags};
use crate::metrics::SpellMetrics;
use crate::outcome::OutcomeModel;
use crate::school::SpellSchool;
use crate::simulation::Simulation;
use crate::stat::Stat;
use crate::timer::Cooldown;
use crate::unit::{ResourceKind, UnitId, UnitKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Index of a spell within its simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpellId(pub(crate) usize);

/// Content callback run as a spell step: `(sim, spell, target)`.
pub type SpellHook = Arc<dyn Fn(&mut Simulation, SpellId, UnitId) + Send + Sync>;

/// Extra castability check: `(sim, spell)`.
pub type CastCondition = Arc<dyn Fn(&Simulation, SpellId) -> bool + Send + Sync>;

/// What a cast costs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceCost {
    pub kind: ResourceKind,
    pub amount: f64,
}

impl ResourceCost {
    pub fn mana(amount: f64) -> Self {
        Self {
            kind: ResourceKind::Mana,
            amount,
        }
    }

    pub fn energy(amount: f64) -> Self {
        Self {
            kind: ResourceKind::Energy,
            amount,
        }
    }

    pub fn rage(amount: f64) -> Self {
        Self {
            kind: ResourceKind::Rage,
            amount,
        }
    }
}

/// Timing and cost of a cast.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CastConfig {
    pub cost: Option<ResourceCost>,
    pub cast_time: Duration,
    /// Zero means the spell is off the GCD.
    pub gcd: Duration,
    /// Private cooldown; a timer is created at registration.
    pub cooldown: Option<Duration>,
    /// Cooldown group shared with other spells.
    pub shared_cooldown: Option<Cooldown>,
}

/// Where the base amount of a damage or healing step comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaseAmount {
    Flat(f64),
    Range { min: f64, max: f64 },
    /// A roll of the weapon matching the spell's proc mask, normalized by
    /// attack power, then `* multiplier + bonus`.
    Weapon { multiplier: f64, bonus: f64 },
}

/// Who a step lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTarget {
    Caster,
    Target,
}

/// One effect of a resolving cast.
#[derive(Clone)]
pub enum SpellStep {
    Damage {
        base: BaseAmount,
        coefficient: f64,
        outcome: OutcomeModel,
    },
    Heal {
        base: BaseAmount,
        coefficient: f64,
        outcome: OutcomeModel,
        on: StepTarget,
    },
    /// Apply this spell's periodic effect to the target.
    ApplyDot,
    ActivateAura(AuraId),
    AddAuraStack(AuraId),
    /// Resolve another spell immediately, without cost or timing.
    CastSpell { spell: SpellId, on: StepTarget },
    /// Steps that only run if the last damage or heal step landed.
    IfLanded(Vec<SpellStep>),
    Custom(SpellHook),
    /// Knowingly unimplemented content: no effect, reported in the run.
    Placeholder(String),
}

impl SpellStep {
    pub fn damage(base: BaseAmount, coefficient: f64, outcome: OutcomeModel) -> Self {
        SpellStep::Damage {
            base,
            coefficient,
            outcome,
        }
    }

    pub fn heal(base: BaseAmount, coefficient: f64, outcome: OutcomeModel) -> Self {
        SpellStep::Heal {
            base,
            coefficient,
            outcome,
            on: StepTarget::Target,
        }
    }

    pub fn custom<F>(hook: F) -> Self
    where
        F: Fn(&mut Simulation, SpellId, UnitId) + Send + Sync + 'static,
    {
        SpellStep::Custom(Arc::new(hook))
    }

    fn is_damaging(&self) -> bool {
        match self {
            SpellStep::Damage { .. } | SpellStep::ApplyDot => true,
            SpellStep::IfLanded(steps) => steps.iter().any(SpellStep::is_damaging),
            _ => false,
        }
    }

    fn validate(&self, label: &str) -> SimResult<()> {
        match self {
            SpellStep::Damage { base, .. } | SpellStep::Heal { base, .. } => {
                if let BaseAmount::Range { min, max } = base {
                    if min > max {
                        return Err(SimError::invalid_content(
                            label,
                            format!("damage range {}..{} has min > max", min, max),
                        ));
                    }
                }
                Ok(())
            }
            SpellStep::IfLanded(steps) => steps.iter().try_for_each(|s| s.validate(label)),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for SpellStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpellStep::Damage {
                base,
                coefficient,
                outcome,
            } => write!(f, "Damage({:?}, {}, {:?})", base, coefficient, outcome),
            SpellStep::Heal {
                base,
                coefficient,
                outcome,
                on,
            } => write!(f, "Heal({:?}, {}, {:?}, {:?})", base, coefficient, outcome, on),
            SpellStep::ApplyDot => f.write_str("ApplyDot"),
            SpellStep::ActivateAura(id) => write!(f, "ActivateAura({:?})", id),
            SpellStep::AddAuraStack(id) => write!(f, "AddAuraStack({:?})", id),
            SpellStep::CastSpell { spell, on } => write!(f, "CastSpell({:?}, {:?})", spell, on),
            SpellStep::IfLanded(steps) => write!(f, "IfLanded({:?})", steps),
            SpellStep::Custom(_) => f.write_str("Custom"),
            SpellStep::Placeholder(label) => write!(f, "Placeholder({})", label),
        }
    }
}

/// Everything needed to register a spell.
///
/// # Examples
///
/// ```rust
/// use simkernel::{BaseAmount, OutcomeModel, ProcMask, ResourceCost, SpellConfig, SpellSchool, SpellStep};
/// use std::time::Duration;
///
/// let frostbolt = SpellConfig::new("Frostbolt", SpellSchool::FROST, ProcMask::SPELL_DAMAGE)
///     .with_cost(ResourceCost::mana(260.0))
///     .with_cast_time(Duration::from_millis(2500))
///     .with_gcd(Duration::from_millis(1500))
///     .with_step(SpellStep::damage(
///         BaseAmount::Range { min: 440.0, max: 475.0 },
///         0.814,
///         OutcomeModel::MagicHitAndCrit,
///     ));
/// assert_eq!(frostbolt.steps.len(), 1);
/// ```
#[derive(Clone)]
pub struct SpellConfig {
    pub label: String,
    pub school: SpellSchool,
    pub proc_mask: ProcMask,
    pub flags: SpellFlags,
    pub cast: CastConfig,
    pub steps: Vec<SpellStep>,
    pub extra_condition: Option<CastCondition>,
    /// Flat crit chance (0..1) added to this spell's rolls.
    pub bonus_crit_chance: f64,
    /// Flat hit chance (0..1) added to this spell's rolls.
    pub bonus_hit_chance: f64,
    /// Base crit multiplier override (2.0 physical, 1.5 otherwise).
    pub crit_multiplier: Option<f64>,
    pub damage_multiplier: f64,
    pub dot: Option<DotConfig>,
}

impl SpellConfig {
    pub fn new(label: impl Into<String>, school: SpellSchool, proc_mask: ProcMask) -> Self {
        Self {
            label: label.into(),
            school,
            proc_mask,
            flags: SpellFlags::EMPTY,
            cast: CastConfig::default(),
            steps: Vec::new(),
            extra_condition: None,
            bonus_crit_chance: 0.0,
            bonus_hit_chance: 0.0,
            crit_multiplier: None,
            damage_multiplier: 1.0,
            dot: None,
        }
    }

    pub fn with_flags(mut self, flags: SpellFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_cost(mut self, cost: ResourceCost) -> Self {
        self.cast.cost = Some(cost);
        self
    }

    pub fn with_cast_time(mut self, cast_time: Duration) -> Self {
        self.cast.cast_time = cast_time;
        self
    }

    pub fn with_gcd(mut self, gcd: Duration) -> Self {
        self.cast.gcd = gcd;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cast.cooldown = Some(cooldown);
        self
    }

    pub fn with_shared_cooldown(mut self, cooldown: Cooldown) -> Self {
        self.cast.shared_cooldown = Some(cooldown);
        self
    }

    pub fn with_step(mut self, step: SpellStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Simulation, SpellId) -> bool + Send + Sync + 'static,
    {
        self.extra_condition = Some(Arc::new(condition));
        self
    }

    pub fn with_bonus_crit(mut self, chance: f64) -> Self {
        self.bonus_crit_chance += chance;
        self
    }

    pub fn with_bonus_hit(mut self, chance: f64) -> Self {
        self.bonus_hit_chance += chance;
        self
    }

    pub fn with_crit_multiplier(mut self, multiplier: f64) -> Self {
        self.crit_multiplier = Some(multiplier);
        self
    }

    pub fn with_damage_multiplier(mut self, multiplier: f64) -> Self {
        self.damage_multiplier *= multiplier;
        self
    }

    /// Attach a periodic effect; adds an [`SpellStep::ApplyDot`] step.
    pub fn with_dot(mut self, dot: DotConfig) -> Self {
        self.dot = Some(dot);
        self.steps.push(SpellStep::ApplyDot);
        self
    }

    pub fn is_helpful(&self) -> bool {
        self.flags.contains(SpellFlags::HELPFUL)
    }

    fn validate(&self) -> SimResult<()> {
        if self.label.is_empty() {
            return Err(SimError::invalid_content("(unnamed spell)", "spell label is empty"));
        }
        if self.proc_mask.is_empty() && self.steps.iter().any(SpellStep::is_damaging) {
            return Err(SimError::invalid_content(
                &self.label,
                "damaging spell has an empty proc mask",
            ));
        }
        if self.cast.cooldown == Some(Duration::ZERO) {
            return Err(SimError::invalid_content(&self.label, "cooldown duration is zero"));
        }
        if let Some(shared) = &self.cast.shared_cooldown {
            if shared.duration.is_zero() {
                return Err(SimError::invalid_content(
                    &self.label,
                    "shared cooldown duration is zero",
                ));
            }
        }
        if let Some(cost) = &self.cast.cost {
            if cost.amount < 0.0 || !cost.amount.is_finite() {
                return Err(SimError::invalid_content(&self.label, "cost must be non-negative"));
            }
        }
        if self.steps.iter().any(|s| matches!(s, SpellStep::ApplyDot)) && self.dot.is_none() {
            return Err(SimError::invalid_content(
                &self.label,
                "ApplyDot step without a dot config",
            ));
        }
        if let Some(dot) = &self.dot {
            dot.validate(&self.label)?;
        }
        self.steps.iter().try_for_each(|s| s.validate(&self.label))
    }
}

/// What a [`SpellMod`] applies to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpellModTarget {
    Spell(SpellId),
    /// Every spell of `unit` whose school overlaps.
    School { unit: UnitId, school: SpellSchool },
    /// Every spell of `unit` whose proc mask overlaps.
    ProcMask { unit: UnitId, mask: ProcMask },
}

/// The modification itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpellModKind {
    DamageMultiplier(f64),
    /// Summed with other additive modifiers into one `(1 + sum)` factor.
    DamageAdditive(f64),
    CostMultiplier(f64),
    CostFlat(f64),
    CastTimeMultiplier(f64),
    CooldownFlat(Duration),
    CooldownMultiplier(f64),
    BonusCritChance(f64),
}

/// A reversible modifier on one or more spells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpellMod {
    pub target: SpellModTarget,
    pub kind: SpellModKind,
}

impl SpellMod {
    pub fn new(target: SpellModTarget, kind: SpellModKind) -> Self {
        Self { target, kind }
    }

    pub(crate) fn validate(&self, label: &str) -> SimResult<()> {
        let factor = match self.kind {
            SpellModKind::DamageMultiplier(f)
            | SpellModKind::CostMultiplier(f)
            | SpellModKind::CastTimeMultiplier(f)
            | SpellModKind::CooldownMultiplier(f) => f,
            _ => return Ok(()),
        };
        if factor == 0.0 || !factor.is_finite() {
            return Err(SimError::invalid_content(
                label,
                "spell mod multiplier must be finite and non-zero",
            ));
        }
        Ok(())
    }
}

/// Accumulated modifiers on one spell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpellModifiers {
    pub damage_multiplier: f64,
    pub damage_additive: f64,
    pub cost_multiplier: f64,
    pub cost_flat: f64,
    pub cast_time_multiplier: f64,
    /// Signed seconds; may go negative while a reduction is applied.
    pub cooldown_flat_secs: f64,
    pub cooldown_multiplier: f64,
    pub bonus_crit_chance: f64,
}

impl SpellModifiers {
    pub fn new() -> Self {
        Self {
            damage_multiplier: 1.0,
            damage_additive: 0.0,
            cost_multiplier: 1.0,
            cost_flat: 0.0,
            cast_time_multiplier: 1.0,
            cooldown_flat_secs: 0.0,
            cooldown_multiplier: 1.0,
            bonus_crit_chance: 0.0,
        }
    }

    /// Combined damage factor from every damage modifier.
    pub fn total_damage_multiplier(&self) -> f64 {
        self.damage_multiplier * (1.0 + self.damage_additive)
    }

    fn apply(&mut self, kind: SpellModKind, sign: f64) {
        let scale = |factor: f64| if sign > 0.0 { factor } else { 1.0 / factor };
        match kind {
            SpellModKind::DamageMultiplier(f) => self.damage_multiplier *= scale(f),
            SpellModKind::DamageAdditive(a) => self.damage_additive += sign * a,
            SpellModKind::CostMultiplier(f) => self.cost_multiplier *= scale(f),
            SpellModKind::CostFlat(a) => self.cost_flat += sign * a,
            SpellModKind::CastTimeMultiplier(f) => self.cast_time_multiplier *= scale(f),
            SpellModKind::CooldownFlat(d) => self.cooldown_flat_secs += sign * d.as_secs_f64(),
            SpellModKind::CooldownMultiplier(f) => self.cooldown_multiplier *= scale(f),
            SpellModKind::BonusCritChance(c) => self.bonus_crit_chance += sign * c,
        }
    }
}

impl Default for SpellModifiers {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered spell and its runtime state.
pub struct Spell {
    pub(crate) id: SpellId,
    pub(crate) unit: UnitId,
    pub(crate) config: SpellConfig,
    pub(crate) steps: Arc<[SpellStep]>,
    pub(crate) cooldown: Option<Cooldown>,
    pub(crate) mods: SpellModifiers,
    pub(crate) dots: BTreeMap<UnitId, DotId>,
    pub(crate) metrics: SpellMetrics,
}

impl Spell {
    pub fn id(&self) -> SpellId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn config(&self) -> &SpellConfig {
        &self.config
    }

    pub fn cooldown(&self) -> Option<Cooldown> {
        self.cooldown
    }

    pub fn modifiers(&self) -> &SpellModifiers {
        &self.mods
    }

    pub fn metrics(&self) -> &SpellMetrics {
        &self.metrics
    }

    /// Stat providing the power coefficient for this spell.
    pub fn power_stat(&self, is_heal: bool) -> Stat {
        power_stat(self.config.proc_mask, is_heal)
    }
}

/// Melee scales with attack power, ranged with ranged attack power, heals
/// with healing power and everything else with spell power.
pub fn power_stat(mask: ProcMask, is_heal: bool) -> Stat {
    if is_heal {
        Stat::HealingPower
    } else if mask.matches(ProcMask::RANGED) {
        Stat::RangedAttackPower
    } else if mask.matches(ProcMask::MELEE) {
        Stat::AttackPower
    } else {
        Stat::SpellPower
    }
}

impl Simulation {
    /// Register a spell for `unit`.
    pub fn register_spell(&mut self, unit: UnitId, config: SpellConfig) -> SimResult<SpellId> {
        self.ensure_registration_open(&config.label)?;
        config.validate()?;

        let id = SpellId(self.spells.len());
        let cooldown = config
            .cast
            .cooldown
            .map(|duration| Cooldown::new(self.new_timer(unit), duration));
        let has_dot = config.dot.is_some();
        let helpful = config.is_helpful();

        self.spells.push(Spell {
            id,
            unit,
            steps: config.steps.clone().into(),
            config,
            cooldown,
            mods: SpellModifiers::new(),
            dots: BTreeMap::new(),
            metrics: SpellMetrics::default(),
        });
        self.units[unit.0].spellbook.push(id);

        if has_dot {
            // Harmful dots land on the other side, helpful ones on the caster's.
            let targets_enemies = (self.units[unit.0].kind == UnitKind::Enemy) == helpful;
            let targets: Vec<UnitId> = self
                .units
                .iter()
                .filter(|u| (u.kind == UnitKind::Enemy) == targets_enemies)
                .map(|u| u.id)
                .collect();
            for target in targets {
                self.ensure_dot(id, target)?;
            }
        }
        Ok(id)
    }

    pub fn spell(&self, id: SpellId) -> &Spell {
        &self.spells[id.0]
    }

    pub fn spell_by_label(&self, unit: UnitId, label: &str) -> Option<SpellId> {
        self.units[unit.0]
            .spellbook
            .iter()
            .copied()
            .find(|id| self.spells[id.0].config.label == label)
    }

    /// Append a step to an already-registered spell.
    pub fn add_spell_step(&mut self, spell: SpellId, step: SpellStep) -> SimResult<()> {
        let s = &mut self.spells[spell.0];
        step.validate(&s.config.label)?;
        s.config.steps.push(step);
        s.steps = s.config.steps.clone().into();
        Ok(())
    }

    fn spell_mod_matches(&self, target: SpellModTarget, spell: &Spell) -> bool {
        match target {
            SpellModTarget::Spell(id) => spell.id == id,
            SpellModTarget::School { unit, school } => {
                spell.unit == unit && spell.config.school.matches(school)
            }
            SpellModTarget::ProcMask { unit, mask } => {
                spell.unit == unit && spell.config.proc_mask.matches(mask)
            }
        }
    }

    fn change_spell_mod(&mut self, spell_mod: &SpellMod, sign: f64) {
        let matching: Vec<usize> = self
            .spells
            .iter()
            .filter(|s| self.spell_mod_matches(spell_mod.target, s))
            .map(|s| s.id.0)
            .collect();
        for index in matching {
            self.spells[index].mods.apply(spell_mod.kind, sign);
        }
    }

    /// Apply a spell modifier to every spell it targets.
    pub fn apply_spell_mod(&mut self, spell_mod: &SpellMod) {
        self.change_spell_mod(spell_mod, 1.0);
    }

    /// Revert a previously applied spell modifier.
    pub fn remove_spell_mod(&mut self, spell_mod: &SpellMod) {
        self.change_spell_mod(spell_mod, -1.0);
    }

    /// Cost of the next cast after modifiers.
    pub fn spell_cost(&self, spell: SpellId) -> Option<ResourceCost> {
        let s = &self.spells[spell.0];
        if s.config.flags.contains(SpellFlags::NO_COST) {
            return None;
        }
        s.config.cast.cost.map(|cost| {
            let multiplier = s.mods.cost_multiplier * self.units[s.unit.0].pseudo.cost_multiplier;
            ResourceCost {
                kind: cost.kind,
                amount: ((cost.amount + s.mods.cost_flat) * multiplier).max(0.0),
            }
        })
    }

    /// Cooldown duration after modifiers.
    pub fn spell_cooldown_duration(&self, spell: SpellId) -> Option<Duration> {
        let s = &self.spells[spell.0];
        s.cooldown.map(|cd| {
            let secs = (cd.duration.as_secs_f64() + s.mods.cooldown_flat_secs)
                * s.mods.cooldown_multiplier;
            Duration::from_secs_f64(secs.max(0.0))
        })
    }

    /// Whether the spell's own and shared cooldowns are ready.
    pub fn is_spell_ready(&self, spell: SpellId) -> bool {
        let s = &self.spells[spell.0];
        s.cooldown.map_or(true, |cd| self.is_cooldown_ready(&cd))
            && s.config
                .cast
                .shared_cooldown
                .map_or(true, |cd| self.is_cooldown_ready(&cd))
    }

    pub(crate) fn reset_spells(&mut self) {
        for spell in &mut self.spells {
            spell.mods = SpellModifiers::new();
            spell.metrics = SpellMetrics::default();
        }
    }
}
