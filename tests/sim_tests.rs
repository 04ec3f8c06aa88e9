//! End-to-end simulation tests: full app, real schedule, headless frames.

use bevy::prelude::*;
use starlance::body::{promote_to_planet, CelestialBody, HomePlanet, PlanetBudget};
use starlance::config::SimConfig;
use starlance::events::{KillCredit, StationSpawnRequest, VesselDestroyed};
use starlance::projectile::Projectile;
use starlance::simulation::{SimSet, SimulationPlugin};
use starlance::vessel::{
    Assignment, Faction, PilotControlled, PilotState, ShipAi, StationAnchor, Vessel, VesselKind,
};

fn test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(SimulationPlugin);
    app
}

fn run_frames(app: &mut App, frames: usize) {
    for _ in 0..frames {
        app.update();
    }
}

fn ship(pos: Vec2, faction: Faction, hp: i32) -> Vessel {
    Vessel {
        pos,
        vel: Vec2::ZERO,
        heading: 0.0,
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
        kind: VesselKind::Ship(ShipAi::stray()),
    }
}

/// Like [`ship`], but pinned in place: a leaderless defender with no home
/// station neither wanders nor orbits.
fn holding(pos: Vec2, faction: Faction, hp: i32) -> Vessel {
    let mut vessel = ship(pos, faction, hp);
    if let Some(ai) = vessel.ship_mut() {
        ai.assignment = Assignment::Defender;
    }
    vessel
}

fn bullet(pos: Vec2, vel: Vec2, friendly: bool, owner: Option<Entity>) -> Projectile {
    Projectile {
        pos,
        vel,
        heading: vel.y.atan2(vel.x),
        life: 60.0,
        size: 5.0,
        tier: 0,
        friendly,
        hue: if friendly { 210.0 } else { 0.0 },
        owner,
        ignore_gravity: false,
    }
}

const HOSTILE: Faction = Faction {
    friendly: false,
    hue: 0.0,
};
const FRIENDLY: Faction = Faction {
    friendly: true,
    hue: 210.0,
};

#[test]
fn equal_asteroids_merge_with_summed_mass() {
    let mut app = test_app();
    app.world_mut().spawn(CelestialBody::asteroid(
        Vec2::new(-200.0, 0.0),
        Vec2::new(2.0, 0.0),
        40.0,
    ));
    app.world_mut().spawn(CelestialBody::asteroid(
        Vec2::new(200.0, 0.0),
        Vec2::new(-2.0, 0.0),
        40.0,
    ));

    run_frames(&mut app, 150);

    let mut query = app.world_mut().query::<&CelestialBody>();
    let bodies: Vec<CelestialBody> = query.iter(app.world()).cloned().collect();
    assert_eq!(bodies.len(), 1, "pair should have merged into one body");
    // r = sqrt(40² + 40²) × 1.05 ≈ 59.4, mass = 80 + 80.
    assert!(
        (bodies[0].radius - 59.4).abs() < 0.5,
        "merged radius was {}",
        bodies[0].radius
    );
    assert!(
        (bodies[0].mass - 160.0).abs() < 1.0,
        "merged mass was {}",
        bodies[0].mass
    );
}

#[test]
fn giant_destroys_near_minimum_rock_unchanged() {
    let mut app = test_app();
    let config = app.world().resource::<SimConfig>().clone();
    let giant_radius = config.asteroid_max_size + 10.0;

    app.world_mut().spawn(CelestialBody::asteroid(
        Vec2::ZERO,
        Vec2::ZERO,
        giant_radius,
    ));
    app.world_mut().spawn(CelestialBody::asteroid(
        Vec2::new(800.0, 0.0),
        Vec2::new(-4.0, 0.0),
        config.asteroid_min_size * 1.1,
    ));

    run_frames(&mut app, 150);

    let mut query = app.world_mut().query::<&CelestialBody>();
    let bodies: Vec<CelestialBody> = query.iter(app.world()).cloned().collect();
    assert_eq!(bodies.len(), 1, "small rock should be gone");
    assert!(
        (bodies[0].radius - giant_radius).abs() < 1.0,
        "giant changed size: {}",
        bodies[0].radius
    );
}

#[test]
fn giant_merge_never_exceeds_planet_budget() {
    let mut app = test_app();
    let config = app.world().resource::<SimConfig>().clone();
    let mut rng = rand::thread_rng();
    let limit = app.world().resource::<PlanetBudget>().limit;

    for i in 0..limit {
        let angle = i as f32 / limit as f32 * std::f32::consts::TAU;
        let pos = Vec2::new(angle.cos(), angle.sin()) * config.world_bounds * 0.6;
        let mut body = CelestialBody::asteroid(pos, Vec2::ZERO, 1_200.0);
        promote_to_planet(&mut body, &config, &mut rng);
        app.world_mut().spawn(body);
    }

    let giant = config.asteroid_max_size + 10.0;
    app.world_mut().spawn(CelestialBody::asteroid(
        Vec2::new(-700.0, 0.0),
        Vec2::new(3.0, 0.0),
        giant,
    ));
    app.world_mut().spawn(CelestialBody::asteroid(
        Vec2::new(700.0, 0.0),
        Vec2::new(-3.0, 0.0),
        giant,
    ));

    run_frames(&mut app, 200);

    let mut query = app.world_mut().query::<&CelestialBody>();
    let planets = query.iter(app.world()).filter(|b| b.is_planet()).count();
    assert!(
        planets <= limit,
        "{planets} planets exceed the budget of {limit}"
    );
}

#[derive(Resource, Default)]
struct WreckCount(usize);

fn count_wrecks(mut wrecks: MessageReader<VesselDestroyed>, mut count: ResMut<WreckCount>) {
    count.0 += wrecks.read().count();
}

#[test]
fn one_hit_point_vessel_dies_exactly_once() {
    let mut app = test_app();
    app.insert_resource(WreckCount::default());
    app.add_systems(Update, count_wrecks.after(SimSet::Scoring));

    app.world_mut().spawn(holding(Vec2::ZERO, HOSTILE, 1));
    app.world_mut()
        .spawn(bullet(Vec2::new(-400.0, 0.0), Vec2::new(20.0, 0.0), true, None));

    run_frames(&mut app, 60);

    assert_eq!(
        app.world().resource::<WreckCount>().0,
        1,
        "destruction must be reported exactly once"
    );
    let mut query = app.world_mut().query::<&Vessel>();
    let survivors = query.iter(app.world()).count();
    assert_eq!(survivors, 0, "the dead vessel must leave the roster");
}

#[test]
fn station_requests_are_one_per_planet() {
    let mut app = test_app();
    let config = app.world().resource::<SimConfig>().clone();
    let mut rng = rand::thread_rng();

    let mut body = CelestialBody::asteroid(Vec2::new(5_000.0, 0.0), Vec2::ZERO, 1_200.0);
    promote_to_planet(&mut body, &config, &mut rng);
    let planet = app.world_mut().spawn(body).id();

    // Two requests in the same frame must still mint one station.
    app.world_mut().write_message(StationSpawnRequest { planet });
    app.world_mut().write_message(StationSpawnRequest { planet });
    app.update();

    let stations = |app: &mut App| {
        let mut query = app.world_mut().query::<&Vessel>();
        query.iter(app.world()).filter(|v| v.is_station()).count()
    };
    assert_eq!(stations(&mut app), 1);

    // A second latch for the same planet is dropped.
    app.world_mut().write_message(StationSpawnRequest { planet });
    app.update();
    assert_eq!(stations(&mut app), 1);
}

#[test]
fn home_station_is_friendly_and_others_are_not() {
    let mut app = test_app();
    let config = app.world().resource::<SimConfig>().clone();
    let mut rng = rand::thread_rng();

    let mut home_body = CelestialBody::asteroid(Vec2::new(5_000.0, 0.0), Vec2::ZERO, 1_200.0);
    promote_to_planet(&mut home_body, &config, &mut rng);
    let home_planet = app.world_mut().spawn(home_body).id();
    app.world_mut().resource_mut::<HomePlanet>().0 = Some(home_planet);

    let mut other_body = CelestialBody::asteroid(Vec2::new(-9_000.0, 0.0), Vec2::ZERO, 1_000.0);
    promote_to_planet(&mut other_body, &config, &mut rng);
    let other_planet = app.world_mut().spawn(other_body).id();

    app.world_mut()
        .write_message(StationSpawnRequest { planet: home_planet });
    app.world_mut()
        .write_message(StationSpawnRequest { planet: other_planet });
    app.update();

    let mut query = app.world_mut().query::<&Vessel>();
    let factions: Vec<(bool, Entity)> = query
        .iter(app.world())
        .filter_map(|v| {
            v.station()
                .map(|anchor| (v.faction.friendly, anchor.host_planet))
        })
        .collect();
    assert_eq!(factions.len(), 2);
    for (friendly, host) in factions {
        assert_eq!(friendly, host == home_planet);
    }
}

#[test]
fn pilot_killing_a_friendly_flips_the_fleet() {
    let mut app = test_app();

    let pilot = app
        .world_mut()
        .spawn((ship(Vec2::ZERO, FRIENDLY, 2), PilotControlled))
        .id();
    let wingman = app.world_mut().spawn(ship(Vec2::new(300.0, 0.0), FRIENDLY, 2)).id();

    app.world_mut().write_message(KillCredit {
        killer: pilot,
        reward: 200,
        victim_friendly_vessel: true,
    });
    app.update();

    assert!(
        app.world().resource::<PilotState>().lone_wolf,
        "betrayal must mark the pilot a lone wolf"
    );
    let turned = app.world().get::<Vessel>(wingman).unwrap();
    assert!(!turned.faction.friendly, "former wingman must turn hostile");
    // Treachery pays negative.
    let pilot_vessel = app.world().get::<Vessel>(pilot).unwrap();
    assert!(pilot_vessel.score < 0, "treachery must cost score");
}

#[test]
fn coincident_bullets_destroy_a_vessel_only_once() {
    let mut app = test_app();
    app.insert_resource(WreckCount::default());
    app.add_systems(Update, count_wrecks.after(SimSet::Scoring));

    app.world_mut().spawn(holding(Vec2::ZERO, HOSTILE, 1));
    // Tier-2 volleys fire two shots at the same offset; model the worst case
    // with two bullets arriving on the exact same track.
    for _ in 0..2 {
        app.world_mut()
            .spawn(bullet(Vec2::new(-40.0, 0.0), Vec2::new(20.0, 0.0), true, None));
    }

    run_frames(&mut app, 5);

    assert_eq!(
        app.world().resource::<WreckCount>().0,
        1,
        "a 1-hp vessel must be reported destroyed exactly once"
    );
}

#[test]
fn coincident_bullets_split_an_asteroid_only_once() {
    let mut app = test_app();
    app.world_mut()
        .spawn(CelestialBody::asteroid(Vec2::ZERO, Vec2::ZERO, 200.0));
    for _ in 0..2 {
        app.world_mut()
            .spawn(bullet(Vec2::new(-220.0, 0.0), Vec2::new(20.0, 0.0), true, None));
    }

    run_frames(&mut app, 1);

    let mut query = app.world_mut().query::<&CelestialBody>();
    let children = query.iter(app.world()).count();
    assert_eq!(children, 2, "one split must yield exactly two children");
}

#[test]
fn pilot_gunfire_wounds_friendlies_and_marks_betrayal() {
    let mut app = test_app();
    let pilot = app
        .world_mut()
        .spawn((ship(Vec2::new(-400.0, 0.0), FRIENDLY, 2), PilotControlled))
        .id();
    let wingman = app.world_mut().spawn(holding(Vec2::ZERO, FRIENDLY, 1)).id();

    app.world_mut()
        .spawn(bullet(Vec2::new(-60.0, 0.0), Vec2::new(20.0, 0.0), true, Some(pilot)));
    run_frames(&mut app, 10);

    assert!(
        app.world().get::<Vessel>(wingman).is_none(),
        "the pilot's own shots must not pass through friendlies"
    );
    assert!(
        app.world().resource::<PilotState>().lone_wolf,
        "killing a wingman by gunfire must trigger betrayal"
    );
    let pilot_vessel = app.world().get::<Vessel>(pilot).unwrap();
    assert!(pilot_vessel.score < 0);
}

#[test]
fn stations_fire_on_nearby_rocks() {
    let mut app = test_app();
    let config = app.world().resource::<SimConfig>().clone();
    let mut rng = rand::thread_rng();

    let mut body = CelestialBody::asteroid(Vec2::new(5_000.0, 0.0), Vec2::ZERO, 1_200.0);
    promote_to_planet(&mut body, &config, &mut rng);
    let planet = app.world_mut().spawn(body).id();

    // A hand-built anchored station, guns ready, squad timer parked.
    app.world_mut().spawn(Vessel {
        pos: Vec2::new(6_630.0, 0.0),
        vel: Vec2::ZERO,
        heading: 0.0,
        radius: config.station_radius,
        hp: config.station_resistance,
        shield_hit: 0,
        faction: HOSTILE,
        reload: 0.0,
        bullet_speed: 20.0,
        bullet_size: 5.0,
        bullet_life: 50.0,
        score: 0,
        tier: 0,
        transformation_timer: 0,
        blink: 0,
        kind: VesselKind::Station(StationAnchor {
            host_planet: planet,
            orbit_distance: 1_630.0,
            orbit_angle: 0.0,
            orbit_speed: 0.0,
            spawn_timer: f32::MAX,
        }),
    });
    // A rock straight down the station's heading.
    app.world_mut().spawn(CelestialBody::asteroid(
        Vec2::new(7_030.0, 0.0),
        Vec2::ZERO,
        100.0,
    ));

    run_frames(&mut app, 2);

    let mut query = app.world_mut().query::<&Projectile>();
    assert!(
        query.iter(app.world()).count() >= 1,
        "stations must clear rocks drifting past them"
    );
}

#[test]
fn leaderless_stray_picks_waypoints_and_moves() {
    let mut app = test_app();
    let stray = app.world_mut().spawn(ship(Vec2::ZERO, HOSTILE, 2)).id();

    run_frames(&mut app, 30);

    let vessel = app.world().get::<Vessel>(stray).unwrap();
    assert!(vessel.ship().unwrap().waypoint.is_some());
    assert!(
        vessel.pos.length() > 1.0,
        "an unattached stray must roam instead of idling"
    );
}

#[test]
fn sustained_danger_makes_a_wingman_abandon_its_squad() {
    let mut app = test_app();
    let leader = app
        .world_mut()
        .spawn(holding(Vec2::new(0.0, 2_000.0), HOSTILE, 2))
        .id();
    let wingman = app.world_mut().spawn(ship(Vec2::ZERO, HOSTILE, 2)).id();
    {
        let mut vessel = app.world_mut().get_mut::<Vessel>(leader).unwrap();
        // Facing +y, so slot offsets pass through unrotated.
        vessel.heading = std::f32::consts::FRAC_PI_2;
    }
    {
        let mut vessel = app.world_mut().get_mut::<Vessel>(wingman).unwrap();
        let ai = vessel.ship_mut().unwrap();
        ai.leader = Some(leader);
        ai.formation_offset = Vec2::new(0.0, -2_000.0); // slot lands on the origin
    }
    // A rock parked inside the critical radius, neither closing nor leaving.
    app.world_mut().spawn(CelestialBody::asteroid(
        Vec2::new(150.0, 0.0),
        Vec2::ZERO,
        90.0,
    ));

    run_frames(&mut app, 45);

    let vessel = app.world().get::<Vessel>(wingman).unwrap();
    let ai = vessel.ship().unwrap();
    assert!(ai.leader.is_none(), "sustained danger must break formation");
    assert!(ai.squad_id.is_none());
}

#[test]
fn incoming_fire_triggers_a_sidestep() {
    let mut app = test_app();
    let leader = app
        .world_mut()
        .spawn(holding(Vec2::new(0.0, 2_000.0), HOSTILE, 2))
        .id();
    let wingman = app.world_mut().spawn(ship(Vec2::ZERO, HOSTILE, 2)).id();
    {
        let mut vessel = app.world_mut().get_mut::<Vessel>(leader).unwrap();
        vessel.heading = std::f32::consts::FRAC_PI_2;
    }
    {
        let mut vessel = app.world_mut().get_mut::<Vessel>(wingman).unwrap();
        let ai = vessel.ship_mut().unwrap();
        ai.leader = Some(leader);
        ai.formation_offset = Vec2::new(0.0, -2_000.0);
    }
    // A friendly bullet boring straight in along the x axis.
    app.world_mut()
        .spawn(bullet(Vec2::new(300.0, 0.0), Vec2::new(-20.0, 0.0), true, None));

    run_frames(&mut app, 1);

    let vessel = app.world().get::<Vessel>(wingman).unwrap();
    assert!(
        vessel.vel.y.abs() > 1.0,
        "a predicted bullet impact must push the wingman sideways"
    );
}

#[test]
fn kill_credits_raise_tier_through_the_ladder() {
    let mut app = test_app();
    let shooter = app.world_mut().spawn(ship(Vec2::ZERO, HOSTILE, 2)).id();

    app.world_mut().write_message(KillCredit {
        killer: shooter,
        reward: 9_000,
        victim_friendly_vessel: false,
    });
    app.update();

    let vessel = app.world().get::<Vessel>(shooter).unwrap();
    assert_eq!(vessel.score, 9_000);
    assert_eq!(vessel.tier, 8, "9000 points is exactly tier 8");
}
