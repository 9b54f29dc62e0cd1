mod common;

use common::*;
use simkernel::*;

fn mage() -> UnitSetup {
    UnitSetup::new("Mage", 60)
        .with_stats(Stats::new().with(Stat::Mana, 1000.0))
        .with_resource(ResourceKind::Mana)
}

fn bolt(label: &str) -> SpellConfig {
    SpellConfig::new(label, SpellSchool::FROST, ProcMask::SPELL_DAMAGE).with_step(SpellStep::damage(
        BaseAmount::Flat(500.0),
        0.0,
        OutcomeModel::AlwaysHit,
    ))
}

fn spells(configs: Vec<SpellConfig>) -> impl Agent {
    content(move |r| {
        for config in configs {
            r.register_spell(config)?;
        }
        Ok(())
    })
}

/// Test that a cooldown becomes ready exactly at its end
#[test]
fn test_cooldown_boundary() {
    let fire_blast = bolt("Fire Blast").with_cooldown(secs(6.0));
    let (mut sim, player, _) = duel(mage(), spells(vec![fire_blast]), 60.0);
    let spell = sim.spell_by_label(player, "Fire Blast").unwrap();

    assert_eq!(sim.cast(spell, None), CastOutcome::Completed);
    assert_eq!(sim.cast(spell, None), CastOutcome::Failed(CastFailure::OnCooldown));

    sim.advance_to(secs(5.999));
    assert_eq!(sim.can_cast(spell), Err(CastFailure::OnCooldown));
    assert!(!sim.is_spell_ready(spell));

    sim.advance_to(secs(6.0));
    assert_eq!(sim.can_cast(spell), Ok(()));
    assert_eq!(sim.cast(spell, None), CastOutcome::Completed);
    assert_eq!(sim.spell(spell).metrics().casts, 2);
}

/// Test that a hardcast resolves when it completes, not when it starts
#[test]
fn test_hardcast_resolves_on_completion() {
    let frostbolt = bolt("Frostbolt")
        .with_cast_time(secs(2.0))
        .with_gcd(secs(1.5));
    let (mut sim, player, _) = duel(mage(), spells(vec![frostbolt]), 60.0);
    let spell = sim.spell_by_label(player, "Frostbolt").unwrap();

    assert_eq!(
        sim.cast(spell, None),
        CastOutcome::Started {
            completes_at: secs(2.0)
        }
    );
    assert!(sim.is_casting(player));
    assert_eq!(sim.cast(spell, None), CastOutcome::Failed(CastFailure::Casting));

    sim.advance_to(secs(1.999));
    assert_eq!(sim.unit(player).metrics().damage_dealt, 0.0);
    sim.advance_to(secs(2.0));
    assert_eq!(sim.unit(player).metrics().damage_dealt, 500.0);
    assert!(!sim.is_casting(player));
}

/// Test that an interrupted cast keeps its cost but not its effect
#[test]
fn test_interrupt_keeps_cost_restores_gcd() {
    let frostbolt = bolt("Frostbolt")
        .with_cost(ResourceCost::mana(100.0))
        .with_cast_time(secs(2.0))
        .with_gcd(secs(1.5));
    let (mut sim, player, _) = duel(mage(), spells(vec![frostbolt]), 60.0);
    let spell = sim.spell_by_label(player, "Frostbolt").unwrap();

    sim.cast(spell, None);
    assert_eq!(sim.resource(player, ResourceKind::Mana), 900.0);
    // The GCD is held for the whole cast.
    assert_eq!(sim.timer(sim.unit(player).gcd_timer()).ready_at(), secs(2.0));

    sim.advance_to(secs(1.0));
    assert_eq!(sim.interrupt_cast(player), Some(spell));
    assert!(!sim.is_casting(player));
    assert_eq!(sim.timer(sim.unit(player).gcd_timer()).ready_at(), secs(1.5));

    sim.advance_to(secs(10.0));
    assert_eq!(sim.unit(player).metrics().damage_dealt, 0.0);
    assert_eq!(sim.resource(player, ResourceKind::Mana), 900.0);
    assert_eq!(sim.interrupt_cast(player), None);
}

/// Test that a refused cast has no side effects
#[test]
fn test_insufficient_resource() {
    let pyroblast = bolt("Pyroblast").with_cost(ResourceCost::mana(2000.0));
    let (mut sim, player, _) = duel(mage(), spells(vec![pyroblast]), 60.0);
    let spell = sim.spell_by_label(player, "Pyroblast").unwrap();

    assert_eq!(
        sim.cast(spell, None),
        CastOutcome::Failed(CastFailure::InsufficientResource)
    );
    assert_eq!(sim.resource(player, ResourceKind::Mana), 1000.0);
    assert_eq!(sim.spell(spell).metrics().casts, 0);
    assert_eq!(sim.timer(sim.unit(player).gcd_timer()).ready_at(), secs(0.0));
}

/// Test that spells sharing the GCD or a cooldown group block each other
#[test]
fn test_gcd_and_shared_cooldown() {
    let agent = content(|r| {
        let group = r.cooldown(secs(30.0));
        r.register_spell(bolt("Frostbolt").with_gcd(secs(1.5)))?;
        r.register_spell(bolt("Arcane Missiles").with_gcd(secs(1.5)))?;
        r.register_spell(bolt("Ice Block").with_shared_cooldown(group))?;
        r.register_spell(bolt("Ice Barrier").with_shared_cooldown(group))?;
        Ok(())
    });
    let (mut sim, player, _) = duel(mage(), agent, 60.0);
    let frostbolt = sim.spell_by_label(player, "Frostbolt").unwrap();
    let missiles = sim.spell_by_label(player, "Arcane Missiles").unwrap();
    let block = sim.spell_by_label(player, "Ice Block").unwrap();
    let barrier = sim.spell_by_label(player, "Ice Barrier").unwrap();

    assert!(sim.cast(frostbolt, None).is_success());
    assert_eq!(sim.cast(missiles, None), CastOutcome::Failed(CastFailure::OnGcd));
    // Off-GCD spells are unaffected.
    assert!(sim.cast(block, None).is_success());
    assert_eq!(
        sim.cast(barrier, None),
        CastOutcome::Failed(CastFailure::OnSharedCooldown)
    );

    sim.advance_to(secs(1.5));
    assert!(sim.cast(missiles, None).is_success());
    sim.advance_to(secs(30.0));
    assert!(sim.cast(barrier, None).is_success());
}

/// Test haste on cast times and the GCD floor
#[test]
fn test_haste_and_gcd_floor() {
    let fireball = bolt("Fireball")
        .with_cast_time(secs(3.0))
        .with_gcd(secs(1.5));
    let (mut sim, player, _) = duel(mage(), spells(vec![fireball]), 60.0);
    let spell = sim.spell_by_label(player, "Fireball").unwrap();

    assert_eq!(sim.cast_time(spell), secs(3.0));
    assert_eq!(sim.gcd_time(spell), secs(1.5));

    sim.multiply_pseudo_stat(player, PseudoStat::CastSpeedMultiplier, 1.5);
    assert_eq!(sim.cast_time(spell), secs(2.0));
    assert_eq!(sim.gcd_time(spell), secs(1.0));

    sim.add_stats_dynamic(player, &Stats::new().with(Stat::SpellHaste, 50.0));
    assert!(sim.cast_time(spell) < secs(1.34));
    assert_eq!(sim.gcd_time(spell), secs(1.0));
}

/// Test that crit-only outcome models never miss
#[test]
fn test_crit_only_models_never_miss() {
    let agent = content(|r| {
        r.register_spell(
            SpellConfig::new("Ignite Tick", SpellSchool::FIRE, ProcMask::SPELL_DAMAGE).with_step(
                SpellStep::damage(BaseAmount::Flat(10.0), 0.0, OutcomeModel::MagicCritOnly),
            ),
        )?;
        r.register_spell(
            SpellConfig::new("Bloodthirst", SpellSchool::PHYSICAL, ProcMask::MELEE_MH_SPECIAL)
                .with_step(SpellStep::damage(
                    BaseAmount::Flat(10.0),
                    0.0,
                    OutcomeModel::MeleeSpecialCritOnly,
                )),
        )?;
        Ok(())
    });
    let mut sim = SimulationBuilder::new(config(60.0))
        .add_player(PlayerSetup::new(
            UnitSetup::new("Warrior", 60).with_stats(
                Stats::new()
                    .with(Stat::MeleeCrit, 20.0)
                    .with(Stat::SpellCrit, 20.0),
            ),
            agent,
        ))
        .add_target(PresetTarget::new("Boss", 63).tanked(true, true))
        .build()
        .unwrap();
    sim.reset(9);
    let player = sim.units()[0].id();

    for label in ["Ignite Tick", "Bloodthirst"] {
        let spell = sim.spell_by_label(player, label).unwrap();
        for _ in 0..500 {
            sim.cast_triggered(spell, None);
        }
        let metrics = sim.spell(spell).metrics();
        assert_eq!(metrics.misses + metrics.dodges + metrics.parries, 0, "{}", label);
        assert_eq!(metrics.blocks + metrics.glances, 0, "{}", label);
        assert_eq!(metrics.hits + metrics.crits, 500, "{}", label);
        assert!(metrics.crits > 0, "{}", label);
    }
}

/// Test that a cost modifier applied by an aura is reverted with it
#[test]
fn test_spell_mod_from_aura() {
    let agent = content(|r| {
        let spell = r.register_spell(bolt("Frostbolt").with_cost(ResourceCost::mana(100.0)))?;
        r.register_aura(
            AuraConfig::new("Clearcasting")
                .with_duration(secs(15.0))
                .with_effect(AuraEffect::SpellMod(SpellMod::new(
                    SpellModTarget::Spell(spell),
                    SpellModKind::CostMultiplier(0.5),
                ))),
        )?;
        Ok(())
    });
    let (mut sim, player, _) = duel(mage(), agent, 60.0);
    let spell = sim.spell_by_label(player, "Frostbolt").unwrap();
    let aura = sim.aura_by_label(player, "Clearcasting").unwrap();

    sim.activate_aura(aura);
    assert_eq!(sim.spell_cost(spell).map(|c| c.amount), Some(50.0));
    sim.cast(spell, None);
    assert_eq!(sim.resource(player, ResourceKind::Mana), 950.0);

    sim.deactivate_aura(aura);
    assert_eq!(sim.spell_cost(spell).map(|c| c.amount), Some(100.0));
}

/// Test that a placeholder step is counted and reported but does nothing
#[test]
fn test_placeholder_step() {
    let judgement = SpellConfig::new("Judgement", SpellSchool::HOLY, ProcMask::SPELL_DAMAGE)
        .with_step(SpellStep::Placeholder(String::from("Judgement of Wisdom")));
    let (mut sim, player, _) = duel(mage(), spells(vec![judgement]), 60.0);
    let spell = sim.spell_by_label(player, "Judgement").unwrap();

    sim.cast(spell, None);
    sim.cast(spell, None);
    assert_eq!(sim.spell(spell).metrics().placeholder_casts, 2);
    assert_eq!(sim.unit(player).metrics().damage_dealt, 0.0);
}
