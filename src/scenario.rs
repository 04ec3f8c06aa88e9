//! Named headless scenarios, selected with the STARLANCE_TEST environment
//! variable.  Each spawns a deterministic world slice, runs for a fixed frame
//! budget, prints a PASS/FAIL verdict, and exits.

use crate::body::{spawn_asteroid_belt, spawn_planet, CelestialBody, Doomed};
use crate::config::SimConfig;
use crate::vessel::{Faction, ShipAi, Vessel, VesselKind};
use crate::weapons::Shockwave;
use bevy::prelude::*;
use std::io::Write;

/// Scenario bookkeeping.
#[derive(Resource)]
pub struct ScenarioConfig {
    pub enabled: bool,
    pub name: String,
    pub frame_limit: u32,
    pub frame_count: u32,
    pub initial_bodies: usize,
    pub initial_vessels: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: String::new(),
            frame_limit: 300,
            frame_count: 0,
            initial_bodies: 0,
            initial_vessels: 0,
        }
    }
}

fn bare_ship(pos: Vec2, heading: f32, faction: Faction, hp: i32) -> Vessel {
    // A leaderless defender with no home station holds position, which keeps
    // scripted geometry intact.
    let mut ai = ShipAi::stray();
    ai.assignment = crate::vessel::Assignment::Defender;
    Vessel {
        pos,
        vel: Vec2::ZERO,
        heading,
        radius: 25.0,
        hp,
        shield_hit: 0,
        faction,
        reload: f32::MAX,
        bullet_speed: 20.0,
        bullet_size: 5.0,
        bullet_life: 50.0,
        score: 0,
        tier: 0,
        transformation_timer: 0,
        blink: 0,
        kind: VesselKind::Ship(ai),
    }
}

/// Two equal asteroids on a collision course; they must merge into one body
/// at the root-sum-square radius with summed mass.
pub fn spawn_scenario_merge_pair(mut commands: Commands, mut scenario: ResMut<ScenarioConfig>) {
    scenario.name = "merge_pair".into();
    scenario.frame_limit = 300;

    commands.spawn(CelestialBody::asteroid(
        Vec2::new(-200.0, 0.0),
        Vec2::new(2.0, 0.0),
        40.0,
    ));
    commands.spawn(CelestialBody::asteroid(
        Vec2::new(200.0, 0.0),
        Vec2::new(-2.0, 0.0),
        40.0,
    ));
    println!("✓ Spawned scenario: two 40-unit asteroids closing head-on");
}

/// A giant against a barely-above-minimum rock: the rock is destroyed, the
/// giant keeps its size.
pub fn spawn_scenario_giant_vs_normal(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut scenario: ResMut<ScenarioConfig>,
) {
    scenario.name = "giant_vs_normal".into();
    scenario.frame_limit = 300;

    commands.spawn(CelestialBody::asteroid(
        Vec2::ZERO,
        Vec2::ZERO,
        config.asteroid_max_size + 10.0,
    ));
    commands.spawn(CelestialBody::asteroid(
        Vec2::new(800.0, 0.0),
        Vec2::new(-4.0, 0.0),
        config.asteroid_min_size * 1.1,
    ));
    println!("✓ Spawned scenario: giant vs near-minimum asteroid");
}

/// Fill the planet budget, then crash two giants: the merge must not mint a
/// planet over the limit.
pub fn spawn_scenario_planet_limit(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut scenario: ResMut<ScenarioConfig>,
) {
    scenario.name = "planet_limit".into();
    scenario.frame_limit = 600;

    let mut rng = rand::thread_rng();
    for i in 0..config.planet_limit {
        let angle = i as f32 / config.planet_limit as f32 * std::f32::consts::TAU;
        let pos = Vec2::new(angle.cos(), angle.sin()) * config.world_bounds * 0.6;
        spawn_planet(&mut commands, pos, 1_200.0, &config, &mut rng);
    }
    let giant = config.asteroid_max_size + 10.0;
    commands.spawn(CelestialBody::asteroid(
        Vec2::new(-700.0, 0.0),
        Vec2::new(3.0, 0.0),
        giant,
    ));
    commands.spawn(CelestialBody::asteroid(
        Vec2::new(700.0, 0.0),
        Vec2::new(-3.0, 0.0),
        giant,
    ));
    println!(
        "✓ Spawned scenario: {} planets (budget full) plus two giants closing",
        config.planet_limit
    );
}

/// A one-hit-point vessel takes a single bullet: it must be gone at the end.
pub fn spawn_scenario_one_hit_kill(
    mut commands: Commands,
    mut scenario: ResMut<ScenarioConfig>,
) {
    scenario.name = "one_hit_kill".into();
    scenario.frame_limit = 120;

    let hostile = Faction {
        friendly: false,
        hue: 0.0,
    };
    commands.spawn(bare_ship(Vec2::ZERO, 0.0, hostile, 1));
    commands.spawn(crate::projectile::Projectile {
        pos: Vec2::new(-400.0, 0.0),
        vel: Vec2::new(20.0, 0.0),
        heading: 0.0,
        life: 60.0,
        size: 5.0,
        tier: 0,
        friendly: true,
        hue: crate::constants::FRIENDLY_HUE,
        owner: None,
        ignore_gravity: false,
    });
    println!("✓ Spawned scenario: hp=1 vessel with one bullet inbound");
}

/// A belt left to stew: merges and splits should change the body count.
pub fn spawn_scenario_belt(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut scenario: ResMut<ScenarioConfig>,
) {
    scenario.name = "belt".into();
    scenario.frame_limit = 600;

    let mut rng = rand::thread_rng();
    spawn_asteroid_belt(
        &mut commands,
        Vec2::ZERO,
        1_000.0,
        5_000.0,
        120,
        &config,
        &mut rng,
    );
    println!("✓ Spawned scenario: 120-asteroid belt");
}

/// A god ring sweeping a ring of rocks: everything in the band vaporizes,
/// the owner survives.
pub fn spawn_scenario_god_ring(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut scenario: ResMut<ScenarioConfig>,
) {
    scenario.name = "god_ring".into();
    scenario.frame_limit = 120;

    let hostile = Faction {
        friendly: false,
        hue: 40.0,
    };
    let owner = commands.spawn(bare_ship(Vec2::ZERO, 0.0, hostile, 10)).id();
    commands.spawn(Shockwave::god_ring(Vec2::ZERO, owner, &config));

    for i in 0..12 {
        let angle = i as f32 / 12.0 * std::f32::consts::TAU;
        commands.spawn(CelestialBody::asteroid(
            Vec2::new(angle.cos(), angle.sin()) * 3_000.0,
            Vec2::ZERO,
            150.0,
        ));
    }
    println!("✓ Spawned scenario: god ring with a 12-rock picket at 3000");
}

/// Records the starting roster on frame one, logs progress periodically.
pub fn scenario_progress_system(
    mut scenario: ResMut<ScenarioConfig>,
    bodies: Query<&CelestialBody, Without<Doomed>>,
    vessels: Query<&Vessel, Without<Doomed>>,
) {
    if !scenario.enabled {
        return;
    }
    scenario.frame_count += 1;

    let body_count = bodies.iter().count();
    let vessel_count = vessels.iter().count();

    if scenario.frame_count == 1 {
        scenario.initial_bodies = body_count;
        scenario.initial_vessels = vessel_count;
        println!(
            "Frame 1 [{}]: {} bodies, {} vessels",
            scenario.name, body_count, vessel_count
        );
    } else if scenario.frame_count.is_multiple_of(50)
        || scenario.frame_count == scenario.frame_limit
    {
        println!(
            "Frame {} [{}]: {} bodies, {} vessels",
            scenario.frame_count, scenario.name, body_count, vessel_count
        );
    }
}

/// Evaluates the verdict on the last frame and exits.
pub fn scenario_verification_system(
    scenario: Res<ScenarioConfig>,
    config: Res<SimConfig>,
    bodies: Query<&CelestialBody, Without<Doomed>>,
    vessels: Query<&Vessel, Without<Doomed>>,
    mut exit: MessageWriter<bevy::app::AppExit>,
) {
    if !scenario.enabled || scenario.frame_count != scenario.frame_limit {
        return;
    }

    let body_count = bodies.iter().count();
    let vessel_count = vessels.iter().count();
    let planet_count = bodies.iter().filter(|b| b.is_planet()).count();

    println!("\n── Scenario complete: {} ──", scenario.name);
    println!("Frames: {}", scenario.frame_count);
    println!(
        "Bodies: {} → {} ({} planets)",
        scenario.initial_bodies, body_count, planet_count
    );
    println!(
        "Vessels: {} → {}",
        scenario.initial_vessels, vessel_count
    );

    let verdict = match scenario.name.as_str() {
        "merge_pair" => {
            let merged = bodies
                .iter()
                .find(|b| (b.radius - 59.4).abs() < 0.5 && (b.mass - 160.0).abs() < 1.0);
            if body_count == 1 && merged.is_some() {
                "✓ PASS: one body at root-sum-square radius with summed mass".into()
            } else {
                format!("✗ FAIL: expected one ~59.4-radius body, have {body_count}")
            }
        }
        "giant_vs_normal" => {
            let giant_intact = bodies
                .iter()
                .any(|b| b.radius >= config.asteroid_max_size);
            if body_count == 1 && giant_intact {
                "✓ PASS: small rock destroyed, giant unchanged".into()
            } else {
                format!("✗ FAIL: {body_count} bodies remain, giant intact: {giant_intact}")
            }
        }
        "planet_limit" => {
            if planet_count <= config.planet_limit {
                format!(
                    "✓ PASS: planet count {} within budget {}",
                    planet_count, config.planet_limit
                )
            } else {
                format!(
                    "✗ FAIL: {} planets exceed budget {}",
                    planet_count, config.planet_limit
                )
            }
        }
        "one_hit_kill" => {
            if vessel_count == 0 {
                "✓ PASS: one-hit vessel removed from the roster".into()
            } else {
                format!("✗ FAIL: {vessel_count} vessels still alive")
            }
        }
        "belt" => {
            if body_count != scenario.initial_bodies {
                "✓ PASS: belt interacted (merges or splits occurred)".into()
            } else {
                "✗ FAIL: belt count unchanged, no interactions".into()
            }
        }
        "god_ring" => {
            if body_count == 0 && vessel_count == 1 {
                "✓ PASS: picket vaporized, owner survived its own ring".into()
            } else {
                format!("✗ FAIL: {body_count} rocks and {vessel_count} vessels remain")
            }
        }
        other => format!("✗ FAIL: unknown scenario '{other}'"),
    };

    println!("{verdict}\n");
    let _ = std::io::stdout().flush();
    exit.write(bevy::app::AppExit::Success);
}
