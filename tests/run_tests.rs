mod common;

use common::*;
use simkernel::*;

fn frostbolt() -> SpellConfig {
    SpellConfig::new("Frostbolt", SpellSchool::FROST, ProcMask::SPELL_DAMAGE)
        .with_cast_time(secs(2.5))
        .with_gcd(secs(1.5))
        .with_step(SpellStep::damage(
            BaseAmount::Range {
                min: 440.0,
                max: 475.0,
            },
            0.814,
            OutcomeModel::MagicHitAndCrit,
        ))
}

fn encounter() -> SimResult<Simulation> {
    let mage = UnitSetup::new("Mage", 60).with_stats(
        Stats::new()
            .with(Stat::SpellPower, 300.0)
            .with(Stat::SpellCrit, 10.0),
    );
    SimulationBuilder::new(SimulationConfig {
        duration_secs: 120.0,
        duration_variation_secs: 10.0,
        ..SimulationConfig::default()
    })
    .add_player(PlayerSetup::new(mage, Spam::new(frostbolt())))
    .add_target(PresetTarget::new("Boss", 63))
    .build()
}

struct Fragile {
    doomed_seed: u64,
}

impl Agent for Fragile {
    fn initialize(&mut self, _registrar: &mut Registrar<'_>) -> SimResult<()> {
        Ok(())
    }

    fn execute_rotation(&mut self, sim: &mut Simulation, _unit: UnitId) {
        if sim.seed() == self.doomed_seed {
            panic!("boom in trial seeded {}", self.doomed_seed);
        }
    }
}

/// Test that the same seed gives the same trial
#[test]
fn test_trial_is_reproducible() {
    let mut sim = encounter().unwrap();
    let first = sim.run_trial(99);
    let second = sim.run_trial(99);
    assert_eq!(first, second);
    assert_ne!(first, sim.run_trial(100));
}

/// Test that the report does not depend on the worker count
#[test]
fn test_report_is_independent_of_workers() {
    let run = |workers| {
        run_trials(
            encounter,
            &RunConfig {
                iterations: 24,
                seed: 2024,
                workers,
            },
        )
        .unwrap()
    };
    let single = run(1);
    assert_eq!(single.completed, 24);
    assert_eq!(single, run(3));
    assert_eq!(single, run(4));
    assert!(single.mean_dps("Mage").unwrap() > 0.0);
    assert!(single.duration.min() >= 110.0);
    assert!(single.duration.max() <= 130.0);
}

/// Test that a panicking trial is reported and stops only its batch
#[test]
fn test_aborted_trial_is_reported() {
    let doomed_seed = trial_seed(7, 5);
    let factory = move || {
        SimulationBuilder::new(config(30.0))
            .add_player(PlayerSetup::new(UnitSetup::new("Rogue", 60), Fragile { doomed_seed }))
            .add_target(PresetTarget::new("Dummy", 60))
            .build()
    };
    let report = run_trials(
        factory,
        &RunConfig {
            iterations: 10,
            seed: 7,
            workers: 1,
        },
    )
    .unwrap();

    assert_eq!(report.completed, 5);
    assert_eq!(report.aborted.len(), 1);
    let abort = &report.aborted[0];
    assert_eq!(abort.trial, 5);
    assert_eq!(abort.seed, doomed_seed);
    assert!(abort.reason.contains("boom"));
}

/// Test that malformed content fails the run before any trial
#[test]
fn test_malformed_content_fails_fast() {
    let factory = || {
        SimulationBuilder::new(config(30.0))
            .add_player(PlayerSetup::new(
                UnitSetup::new("Mage", 60),
                Spam::new(SpellConfig::new("", SpellSchool::FIRE, ProcMask::SPELL_DAMAGE)),
            ))
            .add_target(PresetTarget::new("Dummy", 60))
            .build()
    };
    let result = run_trials(factory, &RunConfig::default());
    assert!(matches!(result, Err(SimError::InvalidContent { .. })));
}

/// Test that a zero-iteration run is rejected
#[test]
fn test_zero_iterations_rejected() {
    let result = run_trials(
        encounter,
        &RunConfig {
            iterations: 0,
            ..RunConfig::default()
        },
    );
    assert!(matches!(result, Err(SimError::InvalidConfig(_))));
}

/// Test that a trial ends when the tracked target dies
#[test]
fn test_target_death_ends_trial() {
    let nuke = SpellConfig::new("Nuke", SpellSchool::ARCANE, ProcMask::SPELL_DAMAGE)
        .with_gcd(secs(1.5))
        .with_step(SpellStep::damage(BaseAmount::Flat(1000.0), 0.0, OutcomeModel::AlwaysHit));
    let mut sim = SimulationBuilder::new(SimulationConfig {
        duration_secs: 60.0,
        end_condition: EndCondition::TargetDeath,
        ..SimulationConfig::default()
    })
    .add_player(PlayerSetup::new(UnitSetup::new("Mage", 60), Spam::new(nuke)))
    .add_target(PresetTarget::new("Dummy", 60).with_health(5000.0))
    .build()
    .unwrap();

    let result = sim.run_trial(1);
    // Casts at 0, 1.5, 3, 4.5 and 6 seconds.
    assert_eq!(result.duration, 6.0);
    assert_eq!(result.unit("Mage").unwrap().damage, 5000.0);
    assert_eq!(result.unit("Dummy").unwrap().deaths, 1);
    assert!(sim.is_dead(sim.unit_by_name("Dummy").unwrap()));
}

/// Test that unimplemented content shows up in the run report
#[test]
fn test_placeholders_reported() {
    let factory = || {
        let judgement = SpellConfig::new("Judgement", SpellSchool::HOLY, ProcMask::SPELL_DAMAGE)
            .with_gcd(secs(1.5))
            .with_step(SpellStep::Placeholder(String::from("Judgement of Wisdom")));
        SimulationBuilder::new(config(15.0))
            .add_player(PlayerSetup::new(UnitSetup::new("Paladin", 60), Spam::new(judgement)))
            .add_target(PresetTarget::new("Dummy", 60))
            .build()
    };
    let report = run_trials(
        factory,
        &RunConfig {
            iterations: 4,
            seed: 1,
            workers: 2,
        },
    )
    .unwrap();

    assert!(report.placeholders.contains("Judgement of Wisdom"));
    assert_eq!(report.mean_dps("Paladin"), Some(0.0));
    let json = report.to_json().unwrap();
    assert!(json.contains("\"placeholders\""));
    assert!(json.contains("\"dps\""));
}
