//! Parallel trials.
//!
//! Trials are split into contiguous index batches and the batches run on a
//! rayon pool. Each batch builds its own [`Simulation`] from the factory and
//! runs its trials sequentially; the seed of trial `i` depends only on the
//! base seed and `i`, so a run gives the same report for any worker count.

use crate::config::RunConfig;
use crate::error::{SimError, SimResult};
use crate::metrics::{Distribution, TrialResult};
use crate::rng::mix_seed;
use crate::simulation::Simulation;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info};

/// How many worker threads run trial batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPool {
    /// Number of worker threads. If 0, use rayon's global pool (all cores).
    pub workers: usize,
}

impl WorkerPool {
    pub fn with_workers(workers: usize) -> Self {
        Self { workers }
    }

    /// Run `f` on a pool of this size.
    pub fn install<F, R>(&self, f: F) -> SimResult<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.workers == 0 {
            return Ok(f());
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| SimError::InvalidConfig(format!("thread pool: {}", e)))?;
        Ok(pool.install(f))
    }
}

/// Split `total` items into up to `num_batches` contiguous ranges `[start, end)`.
///
/// # Examples
///
/// ```rust
/// use simkernel::batch_ranges;
///
/// assert_eq!(batch_ranges(10, 3), vec![(0, 4), (4, 7), (7, 10)]);
/// assert!(batch_ranges(0, 4).is_empty());
/// ```
pub fn batch_ranges(total: usize, num_batches: usize) -> Vec<(usize, usize)> {
    if total == 0 || num_batches == 0 {
        return Vec::new();
    }
    let num_batches = num_batches.min(total);
    let base = total / num_batches;
    let remainder = total % num_batches;
    let mut ranges = Vec::with_capacity(num_batches);
    let mut start = 0;
    for i in 0..num_batches {
        let end = start + base + usize::from(i < remainder);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Seed of trial `index` in a run seeded with `base`.
pub fn trial_seed(base: u64, index: u64) -> u64 {
    mix_seed(base.wrapping_add(index))
}

/// A trial that panicked. The rest of its batch did not run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialAbort {
    pub trial: u32,
    pub seed: u64,
    pub reason: String,
}

/// Aggregated outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub iterations: u32,
    pub completed: u32,
    pub duration: Distribution,
    /// Per-unit damage per second, keyed by unit name.
    pub dps: BTreeMap<String, Distribution>,
    pub hps: BTreeMap<String, Distribution>,
    pub aborted: Vec<TrialAbort>,
    /// Unimplemented content reached in any trial.
    pub placeholders: BTreeSet<String>,
}

impl RunReport {
    fn new(iterations: u32) -> Self {
        Self {
            iterations,
            completed: 0,
            duration: Distribution::new(),
            dps: BTreeMap::new(),
            hps: BTreeMap::new(),
            aborted: Vec::new(),
            placeholders: BTreeSet::new(),
        }
    }

    fn record(&mut self, result: &TrialResult) {
        self.completed += 1;
        self.duration.push(result.duration);
        for unit in &result.units {
            self.dps.entry(unit.name.clone()).or_default().push(unit.dps);
            self.hps.entry(unit.name.clone()).or_default().push(unit.hps);
        }
        self.placeholders.extend(result.placeholders.iter().cloned());
    }

    /// Mean dps of the named unit over completed trials.
    pub fn mean_dps(&self, unit: &str) -> Option<f64> {
        self.dps.get(unit).map(Distribution::mean)
    }

    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct BatchOutcome {
    results: Vec<TrialResult>,
    abort: Option<TrialAbort>,
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic")
    }
}

fn run_batch<F>(factory: &F, base_seed: u64, (start, end): (usize, usize)) -> SimResult<BatchOutcome>
where
    F: Fn() -> SimResult<Simulation>,
{
    let mut sim = factory()?;
    let mut results = Vec::with_capacity(end - start);
    for index in start..end {
        let seed = trial_seed(base_seed, index as u64);
        match panic::catch_unwind(AssertUnwindSafe(|| sim.run_trial(seed))) {
            Ok(result) => results.push(result),
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                error!(trial = index, seed, %reason, "trial aborted");
                return Ok(BatchOutcome {
                    results,
                    abort: Some(TrialAbort {
                        trial: index as u32,
                        seed,
                        reason,
                    }),
                });
            }
        }
    }
    Ok(BatchOutcome {
        results,
        abort: None,
    })
}

/// Run `config.iterations` trials in parallel and aggregate the results.
///
/// The factory is called once up front so that a malformed encounter fails
/// before any trial runs, then once per batch.
///
/// # Examples
///
/// ```rust
/// use simkernel::*;
///
/// let factory = || {
///     SimulationBuilder::new(SimulationConfig { duration_secs: 10.0, ..SimulationConfig::default() })
///         .add_target(PresetTarget::new("Dummy", 63))
///         .build()
/// };
/// let report = run_trials(factory, &RunConfig { iterations: 8, seed: 3, workers: 2 }).unwrap();
/// assert_eq!(report.completed, 8);
/// assert!(report.aborted.is_empty());
/// ```
pub fn run_trials<F>(factory: F, config: &RunConfig) -> SimResult<RunReport>
where
    F: Fn() -> SimResult<Simulation> + Sync,
{
    config.validate()?;
    factory()?;

    let iterations = config.iterations as usize;
    let base_seed = config.seed;
    let factory = &factory;
    let batches: Vec<BatchOutcome> = WorkerPool::with_workers(config.workers).install(|| {
        batch_ranges(iterations, rayon::current_num_threads())
            .into_par_iter()
            .map(|range| run_batch(factory, base_seed, range))
            .collect::<SimResult<Vec<_>>>()
    })??;

    let mut report = RunReport::new(config.iterations);
    for batch in &batches {
        for result in &batch.results {
            report.record(result);
        }
        if let Some(abort) = &batch.abort {
            report.aborted.push(abort.clone());
        }
    }
    info!(
        iterations = report.iterations,
        completed = report.completed,
        aborted = report.aborted.len(),
        "run finished"
    );
    Ok(report)
}
