mod common;

use common::*;
use simkernel::*;
use std::sync::{Arc, Mutex};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Test that a dependency closing a cycle fails the build
#[test]
fn test_dependency_cycle_rejected() {
    let agent = content(|r| {
        r.register_dependency(StatDependency::scaling(Stat::Strength, Stat::AttackPower, 2.0), true)?;
        r.register_dependency(StatDependency::scaling(Stat::AttackPower, Stat::Strength, 0.1), true)?;
        Ok(())
    });
    let result = SimulationBuilder::new(config(30.0))
        .add_player(PlayerSetup::new(UnitSetup::new("Warrior", 60), agent))
        .add_target(PresetTarget::new("Dummy", 60))
        .build();
    match result {
        Err(SimError::DependencyCycle { path }) => {
            assert!(path.contains(&Stat::Strength));
            assert!(path.contains(&Stat::AttackPower));
        }
        Err(other) => panic!("expected a cycle, got {}", other),
        Ok(_) => panic!("expected a cycle"),
    }
}

/// Test that toggling a dependency is idempotent
#[test]
fn test_dependency_toggle_is_idempotent() {
    let slot: Arc<Mutex<Option<DependencyId>>> = Arc::new(Mutex::new(None));
    let register_slot = Arc::clone(&slot);
    let agent = content(move |r| {
        let dep = r.register_dependency(StatDependency::multiplier(Stat::Stamina, 1.1), false)?;
        *register_slot.lock().unwrap() = Some(dep);
        Ok(())
    });
    let druid = UnitSetup::new("Druid", 60).with_stats(Stats::new().with(Stat::Stamina, 100.0));
    let (mut sim, player, _) = duel(druid, agent, 30.0);
    let dep = slot.lock().unwrap().unwrap();

    assert!(!sim.is_dependency_enabled(player, dep));
    assert_eq!(sim.stat(player, Stat::Stamina), 100.0);

    sim.enable_dependency(player, dep);
    sim.enable_dependency(player, dep);
    assert!(close(sim.stat(player, Stat::Stamina), 110.0));

    sim.disable_dependency(player, dep);
    sim.disable_dependency(player, dep);
    assert!(close(sim.stat(player, Stat::Stamina), 100.0));
}

/// Test that flat additions flow through enabled dependencies
#[test]
fn test_dynamic_stats_propagate_through_dependencies() {
    let agent = content(|r| {
        r.register_dependency(StatDependency::scaling(Stat::Strength, Stat::AttackPower, 2.0), true)?;
        r.register_dependency(StatDependency::multiplier(Stat::AttackPower, 1.1), true)?;
        Ok(())
    });
    let warrior = UnitSetup::new("Warrior", 60).with_stats(
        Stats::new()
            .with(Stat::Strength, 100.0)
            .with(Stat::AttackPower, 100.0),
    );
    let (mut sim, player, _) = duel(warrior, agent, 30.0);

    // (100 + 100 * 2) * 1.1
    assert!(close(sim.stat(player, Stat::AttackPower), 330.0));
    sim.add_stats_dynamic(player, &Stats::new().with(Stat::Strength, 50.0));
    assert!(close(sim.stat(player, Stat::AttackPower), 440.0));

    sim.reset(5);
    assert!(close(sim.stat(player, Stat::AttackPower), 330.0));
}

/// Test that registering content after the build is refused
#[test]
fn test_registration_closes_after_build() {
    let (mut sim, player, _) = duel(UnitSetup::new("Warrior", 60), content(|_| Ok(())), 30.0);
    let result = sim.register_dependency(
        player,
        StatDependency::scaling(Stat::Agility, Stat::MeleeCrit, 0.05),
        true,
    );
    assert!(matches!(result, Err(SimError::RegistrationClosed(_))));
    assert!(matches!(
        sim.register_aura(player, AuraConfig::new("Late")),
        Err(SimError::RegistrationClosed(_))
    ));
}

/// Test that a pet tracks its owner's stats while summoned
#[test]
fn test_pet_inheritance_tracks_owner() {
    let agent = content(|r| {
        r.register_aura(
            AuraConfig::new("Power Infusion")
                .with_duration(secs(15.0))
                .with_effect(AuraEffect::Stats(Stats::new().with(Stat::SpellPower, 100.0))),
        )?;
        Ok(())
    });
    let warlock = UnitSetup::new("Warlock", 60).with_stats(Stats::new().with(Stat::SpellPower, 1000.0));
    let imp = PetSetup::new(
        UnitSetup::new("Imp", 60),
        StatInheritance::new().with(Stat::SpellPower, Stat::AttackPower, 0.57),
    )
    .summoned();
    let mut sim = SimulationBuilder::new(config(60.0))
        .add_player(PlayerSetup::new(warlock, agent))
        .add_pet(0, imp)
        .add_target(PresetTarget::new("Dummy", 60))
        .build()
        .unwrap();
    sim.reset(3);
    let owner = sim.unit_by_name("Warlock").unwrap();
    let pet = sim.unit_by_name("Imp").unwrap();
    let infusion = sim.aura_by_label(owner, "Power Infusion").unwrap();

    assert_eq!(sim.unit(owner).pets(), &[pet]);
    assert_eq!(sim.unit(pet).kind(), UnitKind::Pet { owner });
    assert!(sim.is_pet_enabled(pet));
    assert!(close(sim.stat(pet, Stat::AttackPower), 570.0));

    sim.activate_aura(infusion);
    assert!(close(sim.stat(pet, Stat::AttackPower), 627.0));
    sim.advance_to(secs(15.0));
    assert!(close(sim.stat(pet, Stat::AttackPower), 570.0));

    sim.disable_pet(pet);
    assert!(!sim.is_pet_enabled(pet));
    assert!(close(sim.stat(pet, Stat::AttackPower), 0.0));

    // Owner changes while dismissed are picked up on the next summon.
    sim.add_stats_dynamic(owner, &Stats::new().with(Stat::SpellPower, 200.0));
    assert!(close(sim.stat(pet, Stat::AttackPower), 0.0));
    sim.enable_pet(pet, Some(secs(10.0)));
    assert!(close(sim.stat(pet, Stat::AttackPower), 684.0));

    sim.advance_to(secs(25.0));
    assert!(!sim.is_pet_enabled(pet));
}

/// Test that an unsummoned pet starts each trial dismissed
#[test]
fn test_pet_not_summoned_on_reset() {
    let imp = PetSetup::new(UnitSetup::new("Imp", 60), StatInheritance::new());
    let mut sim = SimulationBuilder::new(config(60.0))
        .add_player(PlayerSetup::new(UnitSetup::new("Warlock", 60), content(|_| Ok(()))))
        .add_pet(0, imp)
        .add_target(PresetTarget::new("Dummy", 60))
        .build()
        .unwrap();
    sim.reset(1);
    let pet = sim.unit_by_name("Imp").unwrap();
    assert!(!sim.is_pet_enabled(pet));

    sim.enable_pet(pet, None);
    assert!(sim.is_pet_enabled(pet));
    sim.reset(2);
    assert!(!sim.is_pet_enabled(pet));
}

/// Test that a resummoned pet gets its permanent auras back
#[test]
fn test_pet_resummon_restores_permanent_auras() {
    let resets = Arc::new(Mutex::new(0u32));
    let hook_resets = Arc::clone(&resets);
    let felhunter_content = content(move |r| {
        let hook_resets = Arc::clone(&hook_resets);
        r.register_permanent_aura(
            AuraConfig::new("Demonic Frenzy")
                .with_effect(AuraEffect::Stats(Stats::new().with(Stat::AttackPower, 100.0)))
                .on_reset(move |_, _| *hook_resets.lock().unwrap() += 1),
        )?;
        Ok(())
    });
    let felhunter = PetSetup::new(UnitSetup::new("Felhunter", 60), StatInheritance::new())
        .with_agent(felhunter_content)
        .summoned();
    let mut sim = SimulationBuilder::new(config(60.0))
        .add_player(PlayerSetup::new(UnitSetup::new("Warlock", 60), content(|_| Ok(()))))
        .add_pet(0, felhunter)
        .add_target(PresetTarget::new("Dummy", 60))
        .build()
        .unwrap();
    sim.reset(1);
    let pet = sim.unit_by_name("Felhunter").unwrap();
    let frenzy = sim.aura_by_label(pet, "Demonic Frenzy").unwrap();

    assert!(sim.is_aura_active(frenzy));
    assert!(close(sim.stat(pet, Stat::AttackPower), 100.0));
    assert_eq!(*resets.lock().unwrap(), 1);

    sim.disable_pet(pet);
    assert!(!sim.is_aura_active(frenzy));
    assert!(close(sim.stat(pet, Stat::AttackPower), 0.0));

    sim.advance_to(secs(5.0));
    sim.enable_pet(pet, None);
    assert!(sim.is_aura_active(frenzy));
    assert!(close(sim.stat(pet, Stat::AttackPower), 100.0));
    assert_eq!(*resets.lock().unwrap(), 2);
}

/// Test that labeled streams do not disturb each other
#[test]
fn test_labeled_streams_are_independent() {
    let mut alone = SimRng::new(42, RngMode::Labeled);
    let expected: Vec<f64> = (0..5).map(|_| alone.next_f64("Hit Table")).collect();

    let mut mixed = SimRng::new(42, RngMode::Labeled);
    let mut seen = Vec::new();
    for _ in 0..5 {
        mixed.next_f64("Crusader");
        seen.push(mixed.next_f64("Hit Table"));
        mixed.roll("Damage Roll", 10.0, 20.0);
    }
    assert_eq!(seen, expected);

    let mut shared = SimRng::new(42, RngMode::Shared);
    let mut interleaved = Vec::new();
    for _ in 0..5 {
        shared.next_f64("Crusader");
        interleaved.push(shared.next_f64("Hit Table"));
    }
    assert_ne!(interleaved, expected);
}

/// Test that reseeding replays the same sequence
#[test]
fn test_reseed_replays() {
    let mut rng = SimRng::new(7, RngMode::Labeled);
    let first: Vec<f64> = (0..3).map(|_| rng.next_f64("Glance Roll")).collect();
    rng.reseed(7);
    let second: Vec<f64> = (0..3).map(|_| rng.next_f64("Glance Roll")).collect();
    assert_eq!(first, second);
}
