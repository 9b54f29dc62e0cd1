//! Stat dependencies and the per-unit stat sheet.
//!
//! A [`StatDependency`] derives part of one stat from another ("strength
//! grants 2 attack power") or scales a stat by a factor. Dependencies are
//! registered once, toggled on and off by auras, and evaluated in the
//! topological order of a [`StatGraph`].
//!
//! Within one stat the evaluation runs in two phases, additive then
//! multiplicative:
//!
//! ```text
//! value = (base + Σ source × factor) × Π multipliers
//! ```

use crate::error::{SimError, SimResult};
use crate::graph::StatGraph;
use crate::stat::{Stat, Stats, STAT_COUNT};

/// Handle to a registered dependency on one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId(pub(crate) usize);

/// How a dependency contributes to its target stat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DependencyKind {
    /// `target += source × factor`, applied in the additive phase.
    Scaling { source: Stat, factor: f64 },
    /// `target *= factor`, applied after all scaling contributions.
    Multiplier { factor: f64 },
}

/// A rule deriving (part of) `target` from the rest of the stat vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatDependency {
    pub target: Stat,
    pub kind: DependencyKind,
}

impl StatDependency {
    /// `target += source × factor`.
    pub fn scaling(source: Stat, target: Stat, factor: f64) -> Self {
        Self {
            target,
            kind: DependencyKind::Scaling { source, factor },
        }
    }

    /// `stat *= factor`.
    pub fn multiplier(stat: Stat, factor: f64) -> Self {
        Self {
            target: stat,
            kind: DependencyKind::Multiplier { factor },
        }
    }

    fn validate(&self) -> SimResult<()> {
        let label = format!("{} dependency", self.target);
        match self.kind {
            DependencyKind::Scaling { factor, .. } if !factor.is_finite() => {
                Err(SimError::invalid_content(label, "scaling factor must be finite"))
            }
            DependencyKind::Multiplier { factor } if !factor.is_finite() || factor == 0.0 => Err(
                SimError::invalid_content(label, "multiplier must be finite and non-zero"),
            ),
            _ => Ok(()),
        }
    }
}

/// Registered dependencies of one unit, with their enabled flags.
#[derive(Debug, Clone)]
pub struct DependencyManager {
    deps: Vec<StatDependency>,
    enabled: Vec<bool>,
    by_target: Vec<Vec<usize>>,
    order: Vec<Stat>,
}

impl DependencyManager {
    pub fn new() -> Self {
        Self {
            deps: Vec::new(),
            enabled: Vec::new(),
            by_target: vec![Vec::new(); STAT_COUNT],
            order: Stat::ALL.to_vec(),
        }
    }

    /// Register a dependency.
    ///
    /// The evaluation order is rebuilt eagerly, so a dependency that would
    /// close a cycle is rejected here and leaves the manager untouched.
    pub fn register(&mut self, dep: StatDependency, enabled: bool) -> SimResult<DependencyId> {
        dep.validate()?;

        let mut graph = StatGraph::with_all_stats();
        for existing in self.deps.iter().chain(std::iter::once(&dep)) {
            if let DependencyKind::Scaling { source, .. } = existing.kind {
                graph.add_edge(existing.target, source);
            }
        }
        let order = graph.topological_sort()?;

        let id = DependencyId(self.deps.len());
        self.by_target[dep.target.index()].push(id.0);
        self.deps.push(dep);
        self.enabled.push(enabled);
        self.order = order;
        Ok(id)
    }

    pub fn get(&self, id: DependencyId) -> Option<&StatDependency> {
        self.deps.get(id.0)
    }

    pub fn is_enabled(&self, id: DependencyId) -> bool {
        self.enabled.get(id.0).copied().unwrap_or(false)
    }

    /// Set the enabled flag, returning whether it changed.
    pub fn set_enabled(&mut self, id: DependencyId, enabled: bool) -> bool {
        match self.enabled.get_mut(id.0) {
            Some(flag) if *flag != enabled => {
                *flag = enabled;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Evaluate every enabled dependency on top of `base`.
    pub fn apply(&self, base: &Stats) -> Stats {
        let mut out = *base;
        for &stat in &self.order {
            let targeting = &self.by_target[stat.index()];
            if targeting.is_empty() {
                continue;
            }

            let mut value = base[stat];
            let mut multiplier = 1.0;
            for &i in targeting {
                if !self.enabled[i] {
                    continue;
                }
                match self.deps[i].kind {
                    DependencyKind::Scaling { source, factor } => value += out[source] * factor,
                    DependencyKind::Multiplier { factor } => multiplier *= factor,
                }
            }
            out[stat] = value * multiplier;
        }
        out
    }
}

impl Default for DependencyManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Base and effective stats of a unit.
///
/// `base` is the sum of flat modifiers; `effective` is `base` with all
/// enabled dependencies applied. Every mutation returns the delta it caused
/// on `effective`, which callers forward to whatever depends on this unit.
#[derive(Debug, Clone)]
pub struct StatSheet {
    base: Stats,
    effective: Stats,
    deps: DependencyManager,
}

impl StatSheet {
    pub fn new(base: Stats) -> Self {
        Self {
            base,
            effective: base,
            deps: DependencyManager::new(),
        }
    }

    pub fn base(&self) -> &Stats {
        &self.base
    }

    pub fn effective(&self) -> &Stats {
        &self.effective
    }

    pub fn get(&self, stat: Stat) -> f64 {
        self.effective[stat]
    }

    pub fn dependencies(&self) -> &DependencyManager {
        &self.deps
    }

    /// Register a dependency; returns its id and the effective delta.
    pub fn register_dependency(
        &mut self,
        dep: StatDependency,
        enabled: bool,
    ) -> SimResult<(DependencyId, Stats)> {
        let id = self.deps.register(dep, enabled)?;
        let delta = if enabled { self.recompute() } else { Stats::new() };
        Ok((id, delta))
    }

    /// Add flat modifiers to the base vector.
    pub fn add_flat(&mut self, delta: &Stats) -> Stats {
        self.base += *delta;
        self.recompute()
    }

    /// Enable or disable a dependency; a no-op toggle returns a zero delta.
    pub fn set_dependency(&mut self, id: DependencyId, enabled: bool) -> Stats {
        if self.deps.set_enabled(id, enabled) {
            self.recompute()
        } else {
            Stats::new()
        }
    }

    pub fn dependency_enabled(&self, id: DependencyId) -> bool {
        self.deps.is_enabled(id)
    }

    fn recompute(&mut self) -> Stats {
        let updated = self.deps.apply(&self.base);
        let delta = updated - self.effective;
        self.effective = updated;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warrior_base() -> Stats {
        Stats::from_pairs(&[
            (Stat::Strength, 100.0),
            (Stat::Agility, 50.0),
            (Stat::AttackPower, 10.0),
        ])
    }

    #[test]
    fn test_scaling_dependency() {
        let mut sheet = StatSheet::new(warrior_base());
        let (_, delta) = sheet
            .register_dependency(StatDependency::scaling(Stat::Strength, Stat::AttackPower, 2.0), true)
            .unwrap();

        assert_eq!(sheet.get(Stat::AttackPower), 210.0);
        assert_eq!(delta[Stat::AttackPower], 200.0);
        assert_eq!(delta[Stat::Strength], 0.0);
    }

    #[test]
    fn test_toggle_is_idempotent() {
        let mut sheet = StatSheet::new(warrior_base());
        let (id, _) = sheet
            .register_dependency(StatDependency::scaling(Stat::Strength, Stat::BlockValue, 0.5), false)
            .unwrap();

        let first = sheet.set_dependency(id, true);
        assert_eq!(first[Stat::BlockValue], 50.0);
        let after_first = *sheet.effective();

        let second = sheet.set_dependency(id, true);
        assert!(second.is_zero());
        assert_eq!(*sheet.effective(), after_first);

        sheet.set_dependency(id, false);
        let disabled = *sheet.effective();
        assert!(sheet.set_dependency(id, false).is_zero());
        assert_eq!(*sheet.effective(), disabled);
        assert_eq!(disabled, warrior_base());
    }

    #[test]
    fn test_independent_dependencies_on_same_target() {
        let mut sheet = StatSheet::new(warrior_base());
        let (from_str, _) = sheet
            .register_dependency(StatDependency::scaling(Stat::Strength, Stat::AttackPower, 2.0), true)
            .unwrap();
        let (from_agi, _) = sheet
            .register_dependency(StatDependency::scaling(Stat::Agility, Stat::AttackPower, 1.0), true)
            .unwrap();
        assert_eq!(sheet.get(Stat::AttackPower), 10.0 + 200.0 + 50.0);

        let delta = sheet.set_dependency(from_str, false);
        assert_eq!(delta[Stat::AttackPower], -200.0);
        assert_eq!(sheet.get(Stat::AttackPower), 60.0);
        assert!(sheet.dependency_enabled(from_agi));
    }

    #[test]
    fn test_multiplier_applies_after_scaling() {
        let mut sheet = StatSheet::new(warrior_base());
        sheet
            .register_dependency(StatDependency::scaling(Stat::Strength, Stat::AttackPower, 2.0), true)
            .unwrap();
        let (kings, _) = sheet
            .register_dependency(StatDependency::multiplier(Stat::Strength, 1.1), false)
            .unwrap();

        sheet.set_dependency(kings, true);
        assert!((sheet.get(Stat::Strength) - 110.0).abs() < 1e-9);
        // Attack power follows the multiplied strength.
        assert!((sheet.get(Stat::AttackPower) - 230.0).abs() < 1e-9);

        let delta = sheet.add_flat(&Stats::new().with(Stat::Strength, 10.0));
        assert!((delta[Stat::Strength] - 11.0).abs() < 1e-9);
        assert!((delta[Stat::AttackPower] - 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_cycle_rejected_and_sheet_unchanged() {
        let mut sheet = StatSheet::new(warrior_base());
        sheet
            .register_dependency(StatDependency::scaling(Stat::Strength, Stat::AttackPower, 2.0), true)
            .unwrap();
        let before = *sheet.effective();

        let err = sheet
            .register_dependency(StatDependency::scaling(Stat::AttackPower, Stat::Strength, 0.1), true)
            .unwrap_err();
        assert!(matches!(err, SimError::DependencyCycle { .. }));
        assert_eq!(sheet.dependencies().len(), 1);
        assert_eq!(*sheet.effective(), before);
    }

    #[test]
    fn test_invalid_multiplier_rejected() {
        let mut manager = DependencyManager::new();
        let err = manager
            .register(StatDependency::multiplier(Stat::Stamina, 0.0), true)
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidContent { .. }));
        assert!(manager.is_empty());
    }
}
