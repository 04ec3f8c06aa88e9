use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use rand::Rng;
use std::env;
use std::time::Duration;

use starlance::body::{spawn_asteroid_belt, spawn_planet, HomePlanet};
use starlance::config::{load_sim_config, SimConfig};
use starlance::scenario::{
    scenario_progress_system, scenario_verification_system, spawn_scenario_belt,
    spawn_scenario_giant_vs_normal, spawn_scenario_god_ring, spawn_scenario_merge_pair,
    spawn_scenario_one_hit_kill, spawn_scenario_planet_limit, ScenarioConfig,
};
use starlance::simulation::{SimSet, SimulationPlugin};
use starlance::vessel::{
    standard_slot_layout, Faction, PilotControlled, ShipAi, ShipRole, Vessel, VesselKind,
};

/// Seed the default open-world run: a belt, a few planets, the home world,
/// and the pilot's ship.
fn spawn_initial_world(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut home: ResMut<HomePlanet>,
) {
    let mut rng = rand::thread_rng();

    spawn_asteroid_belt(
        &mut commands,
        Vec2::ZERO,
        2_000.0,
        config.world_bounds * 0.8,
        400,
        &config,
        &mut rng,
    );

    for _ in 0..4 {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let dist = rng.gen_range(6_000.0..config.world_bounds * 0.7);
        let pos = Vec2::new(angle.cos(), angle.sin()) * dist;
        spawn_planet(
            &mut commands,
            pos,
            rng.gen_range(800.0..1_800.0),
            &config,
            &mut rng,
        );
    }

    let home_planet = spawn_planet(&mut commands, Vec2::new(3_500.0, 0.0), 1_400.0, &config, &mut rng);
    home.0 = Some(home_planet);

    let mut pilot_ai = ShipAi::stray();
    pilot_ai.role = ShipRole::Leader {
        slots: standard_slot_layout(),
    };
    commands.spawn((
        Vessel {
            pos: Vec2::new(1_000.0, 0.0),
            vel: Vec2::ZERO,
            heading: std::f32::consts::FRAC_PI_2,
            radius: config.ship_size / 2.0,
            hp: config.ship_resistance,
            shield_hit: 0,
            faction: Faction {
                friendly: true,
                hue: config.friendly_hue,
            },
            reload: 0.0,
            bullet_speed: 20.0,
            bullet_size: 5.0,
            bullet_life: 60.0,
            score: 0,
            tier: 0,
            transformation_timer: 0,
            blink: 60,
            kind: VesselKind::Ship(pilot_ai),
        },
        PilotControlled,
    ));

    println!("✓ Spawned initial world: belt, 5 planets, pilot ship");
}

fn main() {
    // Check for scenario mode
    let scenario = env::var("STARLANCE_TEST").ok();

    let mut app = App::new();

    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
        Duration::from_secs_f64(1.0 / 60.0),
    )))
    .add_plugins(SimulationPlugin);

    if let Some(name) = scenario {
        app.insert_resource(ScenarioConfig {
            enabled: true,
            ..Default::default()
        });
        app.add_systems(
            Update,
            (scenario_progress_system, scenario_verification_system)
                .chain()
                .after(SimSet::Scoring),
        );

        match name.as_str() {
            "merge_pair" => {
                app.add_systems(Startup, spawn_scenario_merge_pair.after(load_sim_config));
            }
            "giant_vs_normal" => {
                app.add_systems(Startup, spawn_scenario_giant_vs_normal.after(load_sim_config));
            }
            "planet_limit" => {
                app.add_systems(Startup, spawn_scenario_planet_limit.after(load_sim_config));
            }
            "one_hit_kill" => {
                app.add_systems(Startup, spawn_scenario_one_hit_kill.after(load_sim_config));
            }
            "belt" => {
                app.add_systems(Startup, spawn_scenario_belt.after(load_sim_config));
            }
            "god_ring" => {
                app.add_systems(Startup, spawn_scenario_god_ring.after(load_sim_config));
            }
            other => {
                eprintln!("Unknown STARLANCE_TEST scenario: {other}");
                eprintln!(
                    "Known: merge_pair, giant_vs_normal, planet_limit, one_hit_kill, belt, god_ring"
                );
                std::process::exit(1);
            }
        }
    } else {
        app.add_systems(Startup, spawn_initial_world.after(load_sim_config));
    }

    app.run();
}
