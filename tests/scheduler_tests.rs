mod common;

use common::*;
use simkernel::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Log = Arc<Mutex<Vec<(f64, String)>>>;

fn idle() -> (Simulation, UnitId, UnitId) {
    duel(UnitSetup::new("Hunter", 60), content(|_| Ok(())), 60.0)
}

fn record(log: &Log, label: &str) -> impl FnOnce(&mut Simulation) + Send + 'static {
    let log = Arc::clone(log);
    let label = label.to_string();
    move |sim: &mut Simulation| {
        log.lock().unwrap().push((sim.now().as_secs_f64(), label));
    }
}

fn labels(log: &Log) -> Vec<String> {
    log.lock().unwrap().iter().map(|(_, l)| l.clone()).collect()
}

/// Test that actions due at the same instant run in scheduling order
#[test]
fn test_same_instant_is_fifo() {
    let (mut sim, _, _) = idle();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    sim.schedule_at(secs(5.0), record(&log, "c"));
    sim.schedule_at(secs(3.0), record(&log, "a"));
    sim.schedule_at(secs(5.0), record(&log, "d"));
    sim.schedule_at(secs(3.0), record(&log, "b"));
    let cancelled = sim.schedule_at(secs(4.0), record(&log, "x"));
    assert!(sim.cancel(cancelled));
    assert!(!sim.is_pending(cancelled));

    sim.advance_to(secs(10.0));
    assert_eq!(labels(&log), vec!["a", "b", "c", "d"]);
    assert_eq!(sim.now(), secs(10.0));
}

/// Test that work scheduled for now by a running action runs after it
#[test]
fn test_nested_scheduling_at_same_instant() {
    let (mut sim, _, _) = idle();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let inner = record(&log, "inner");
    let outer_log = Arc::clone(&log);
    sim.schedule_at(secs(1.0), move |sim: &mut Simulation| {
        outer_log.lock().unwrap().push((sim.now().as_secs_f64(), "outer".into()));
        let now = sim.now();
        sim.schedule_at(now, inner);
    });
    sim.schedule_at(secs(1.0), record(&log, "sibling"));

    sim.advance_to(secs(2.0));
    assert_eq!(labels(&log), vec!["outer", "sibling", "inner"]);
    assert!(log.lock().unwrap().iter().all(|(t, _)| *t == 1.0));
}

/// Test that a periodic task runs its ticks and can be cancelled
#[test]
fn test_periodic_ticks() {
    let (mut sim, _, _) = idle();
    let ticks: Arc<Mutex<Vec<(f64, u32)>>> = Arc::new(Mutex::new(Vec::new()));

    let bounded_ticks = Arc::clone(&ticks);
    sim.schedule_periodic(PeriodicOptions {
        start: secs(1.0),
        period: secs(2.0),
        tick_count: Some(3),
        action: Arc::new(move |sim: &mut Simulation, tick: u32| {
            bounded_ticks.lock().unwrap().push((sim.now().as_secs_f64(), tick));
        }),
    });
    sim.advance_to(secs(20.0));
    assert_eq!(*ticks.lock().unwrap(), vec![(1.0, 1), (3.0, 2), (5.0, 3)]);

    let count = Arc::new(Mutex::new(0u32));
    let unbounded_count = Arc::clone(&count);
    let id = sim.schedule_periodic(PeriodicOptions {
        start: secs(21.0),
        period: secs(1.0),
        tick_count: None,
        action: Arc::new(move |_: &mut Simulation, _: u32| {
            *unbounded_count.lock().unwrap() += 1;
        }),
    });
    sim.advance_to(secs(25.0));
    assert_eq!(*count.lock().unwrap(), 5);
    assert!(sim.cancel_periodic(id));
    assert!(!sim.is_periodic_active(id));
    sim.advance_to(secs(30.0));
    assert_eq!(*count.lock().unwrap(), 5);
}

/// Test that a zero tick count schedules nothing
#[test]
fn test_periodic_zero_ticks() {
    let (mut sim, _, _) = idle();
    let ran = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&ran);
    sim.schedule_periodic(PeriodicOptions {
        start: secs(1.0),
        period: secs(1.0),
        tick_count: Some(0),
        action: Arc::new(move |_: &mut Simulation, _: u32| {
            *flag.lock().unwrap() = true;
        }),
    });
    sim.advance_to(secs(10.0));
    assert!(!*ran.lock().unwrap());
}

/// Test that scheduling into the past aborts the trial
#[test]
#[should_panic(expected = "causality violation")]
fn test_scheduling_in_the_past_panics() {
    let (mut sim, _, _) = idle();
    sim.advance_to(secs(5.0));
    sim.schedule_at(secs(4.0), |_: &mut Simulation| {});
}

/// Test that nothing runs after the trial end
#[test]
fn test_nothing_runs_after_end() {
    let (mut sim, _, _) = idle();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    sim.schedule_at(secs(60.0), record(&log, "at end"));
    sim.schedule_at(secs(61.0), record(&log, "after end"));

    while sim.advance() {}
    assert!(sim.trial_ended());
    assert!(labels(&log).is_empty());
    assert_eq!(sim.now(), sim.trial_end_time());
}

struct Spinner;

impl Agent for Spinner {
    fn initialize(&mut self, _registrar: &mut Registrar<'_>) -> SimResult<()> {
        Ok(())
    }

    fn execute_rotation(&mut self, sim: &mut Simulation, unit: UnitId) {
        sim.wait(unit, Duration::ZERO);
    }
}

/// Test that a rotation that never lets time pass is caught
#[test]
#[should_panic(expected = "rotation loop")]
fn test_rotation_loop_guard() {
    let mut sim = SimulationBuilder::new(config(10.0))
        .add_player(PlayerSetup::new(UnitSetup::new("Spinner", 60), Spinner))
        .add_target(PresetTarget::new("Dummy", 60))
        .build()
        .unwrap();
    sim.run_trial(1);
}
