//! Combat AI: the FORMATION ⇄ COMBAT state machine, target acquisition,
//! orbit-strafe steering, and every firing gate (cone, occlusion, ally
//! block, god-ring safety).
//!
//! All checks operate on immutable per-frame snapshots of the fleet roster,
//! so a ship never reads another ship's half-updated state.

use crate::body::{CelestialBody, Doomed, HomePlanet};
use crate::config::SimConfig;
use crate::dynamics::ActivePlanets;
use crate::spatial_grid::SpatialGrid;
use crate::vessel::{AiState, Faction, PilotControlled, Vessel};
use crate::weapons::{fire_god_ring, fire_volley};
use bevy::prelude::*;
use rand::Rng;

/// Heading gate for any deliberate shot: 30 degrees.
const FIRE_CONE: f32 = std::f32::consts::FRAC_PI_6;

/// Occlusion half-cone for allied vessels on the firing line.
const OCCLUSION_CONE_ALLY: f32 = 0.25;

/// Tighter occlusion half-cone reserved for the pilot's ship.
const OCCLUSION_CONE_PILOT: f32 = 0.2;

/// Any vessel this close to the firing line blocks the shot outright.
const BLOCK_CONE: f32 = 0.35;

/// Immutable view of one vessel for this frame's AI queries.
#[derive(Debug, Clone, Copy)]
pub struct VesselSnap {
    pub entity: Entity,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub faction: Faction,
    pub is_station: bool,
    pub is_pilot: bool,
}

/// Signed smallest rotation from `from` to `to`, in (−π, π].
pub fn angle_diff(from: f32, to: f32) -> f32 {
    let mut diff = to - from;
    while diff > std::f32::consts::PI {
        diff -= std::f32::consts::TAU;
    }
    while diff <= -std::f32::consts::PI {
        diff += std::f32::consts::TAU;
    }
    diff
}

/// Friendly-fire occlusion: true when no ally (and no pilot, for friendly
/// firers) sits between the firer and the target inside the occlusion cone.
pub fn is_trajectory_clear(
    firer: &VesselSnap,
    target: Vec2,
    others: &[VesselSnap],
) -> bool {
    let to_target = target - firer.pos;
    let trajectory = to_target.y.atan2(to_target.x);
    let dist_to_target = to_target.length();

    for other in others {
        if other.entity == firer.entity {
            continue;
        }
        let respect_pilot = firer.faction.friendly && other.is_pilot;
        if !respect_pilot && !firer.faction.allied(&other.faction) {
            continue;
        }
        let to_other = other.pos - firer.pos;
        if to_other.length() >= dist_to_target {
            continue;
        }
        let cone = if other.is_pilot {
            OCCLUSION_CONE_PILOT
        } else {
            OCCLUSION_CONE_ALLY
        };
        let off_line = angle_diff(trajectory, to_other.y.atan2(to_other.x)).abs();
        if off_line < cone {
            return false;
        }
    }
    true
}

/// Anything — ally or not — parked on the firing line blocks the shot.
fn shot_blocked(firer: &VesselSnap, target: Vec2, others: &[VesselSnap]) -> bool {
    let to_target = target - firer.pos;
    let trajectory = to_target.y.atan2(to_target.x);
    let dist_to_target = to_target.length();

    others.iter().any(|other| {
        if other.entity == firer.entity {
            return false;
        }
        let to_other = other.pos - firer.pos;
        to_other.length() < dist_to_target
            && angle_diff(trajectory, to_other.y.atan2(to_other.x)).abs() < BLOCK_CONE
    })
}

/// Effective weapon tier for an AI vessel: flat score steps, unlike the
/// pilot's progressive ladder.
pub fn ai_tier(score: i64, step: i64) -> u32 {
    (score.max(0) / step.max(1)) as u32
}

/// God-ring safety: an AI must not fire the ring with any ally — or, for the
/// friendly fleet, the home planet — inside the blast's safety radius.
pub fn allies_within_blast(
    firer: &VesselSnap,
    others: &[VesselSnap],
    home_planet_pos: Option<Vec2>,
    safety_radius: f32,
) -> bool {
    if firer.faction.friendly {
        if let Some(home) = home_planet_pos {
            if firer.pos.distance(home) < safety_radius {
                return true;
            }
        }
    }
    others.iter().any(|other| {
        other.entity != firer.entity
            && firer.faction.allied(&other.faction)
            && firer.pos.distance(other.pos) < safety_radius
    })
}

/// Full firing pipeline for one AI shot at `target`.
///
/// Re-derives the cone test, runs the occlusion and block checks, and on
/// success spawns the volley (or god ring) and sets the reload.  Returns
/// whether a shot was fired.
#[allow(clippy::too_many_arguments)]
pub fn enemy_shoot(
    commands: &mut Commands,
    firer_entity: Entity,
    vessel: &mut Vessel,
    target: Vec2,
    snaps: &[VesselSnap],
    home_planet_pos: Option<Vec2>,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> bool {
    let snap = VesselSnap {
        entity: firer_entity,
        pos: vessel.pos,
        vel: vessel.vel,
        radius: vessel.radius,
        faction: vessel.faction,
        is_station: vessel.is_station(),
        is_pilot: false,
    };

    let tier = ai_tier(vessel.score, config.evolution_score_step);

    if tier >= 12 {
        if vessel.transformation_timer > 0 {
            return false;
        }
        if allies_within_blast(&snap, snaps, home_planet_pos, config.god_ring_safety_radius) {
            return false;
        }
        fire_god_ring(commands, firer_entity, vessel, config);
        return true;
    }

    let to_target = target - vessel.pos;
    let trajectory = to_target.y.atan2(to_target.x);
    if angle_diff(vessel.heading, trajectory).abs() > FIRE_CONE {
        return false;
    }
    if !is_trajectory_clear(&snap, target, snaps) {
        return false;
    }
    if shot_blocked(&snap, target, snaps) {
        return false;
    }

    fire_volley(commands, firer_entity, vessel, tier, config);
    vessel.reload = 30.0 + rng.gen_range(0.0..20.0);
    true
}

/// Snapshot the fleet roster for this frame's AI passes.
pub fn snapshot_vessels(
    vessels: &Query<(Entity, &Vessel), Without<Doomed>>,
    pilots: &Query<(), With<PilotControlled>>,
) -> Vec<VesselSnap> {
    vessels
        .iter()
        .map(|(entity, v)| VesselSnap {
            entity,
            pos: v.pos,
            vel: v.vel,
            radius: v.radius,
            faction: v.faction,
            is_station: v.is_station(),
            is_pilot: pilots.get(entity).is_ok(),
        })
        .collect()
}

/// FORMATION → COMBAT when a rival closes inside sight range; back out only
/// beyond 1.5× (hysteresis), or when the target stops existing.
pub fn ai_state_transition_system(
    config: Res<SimConfig>,
    pilots: Query<(), With<PilotControlled>>,
    mut vessels: ParamSet<(
        Query<(Entity, &Vessel), Without<Doomed>>,
        Query<(Entity, &mut Vessel), (Without<Doomed>, Without<PilotControlled>)>,
    )>,
) {
    let snaps = snapshot_vessels(&vessels.p0(), &pilots);

    for (entity, mut vessel) in vessels.p1().iter_mut() {
        let pos = vessel.pos;
        let faction = vessel.faction;
        let Some(ai) = vessel.ship_mut() else {
            continue;
        };

        let nearest_rival = snaps
            .iter()
            .filter(|s| s.entity != entity && !s.is_station && faction.rival(&s.faction))
            .map(|s| (s.entity, pos.distance(s.pos)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match ai.state {
            AiState::Formation => {
                if let Some((rival, dist)) = nearest_rival {
                    if dist < config.sight_range {
                        ai.state = AiState::Combat;
                        ai.target = Some(rival);
                    }
                }
            }
            AiState::Combat => {
                // Re-validate the held target, then apply hysteresis.
                let target_dist = ai.target.and_then(|t| {
                    snaps
                        .iter()
                        .find(|s| s.entity == t)
                        .map(|s| pos.distance(s.pos))
                });
                match target_dist {
                    Some(dist) if dist <= config.sight_range * 1.5 => {}
                    _ => match nearest_rival {
                        Some((rival, dist)) if dist <= config.sight_range * 1.5 => {
                            ai.target = Some(rival);
                        }
                        _ => {
                            ai.state = AiState::Formation;
                            ai.target = None;
                        }
                    },
                }
            }
        }
    }
}

/// Orbit-strafe steering and firing for ships in COMBAT.
pub fn combat_steering_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    home: Res<HomePlanet>,
    planets: Res<ActivePlanets>,
    pilots: Query<(), With<PilotControlled>>,
    bodies: Query<&CelestialBody, Without<Doomed>>,
    mut vessels: ParamSet<(
        Query<(Entity, &Vessel), Without<Doomed>>,
        Query<(Entity, &mut Vessel), (Without<Doomed>, Without<PilotControlled>)>,
    )>,
) {
    let mut rng = rand::thread_rng();
    let snaps = snapshot_vessels(&vessels.p0(), &pilots);
    let home_planet_pos = home
        .0
        .and_then(|h| planets.0.iter().find(|p| p.entity == h).map(|p| p.pos));

    for (entity, mut vessel) in vessels.p1().iter_mut() {
        let pos = vessel.pos;
        let faction = vessel.faction;
        let Some(ai) = vessel.ship_mut() else {
            continue;
        };
        if ai.state != AiState::Combat {
            continue;
        }
        let orbit_dir = match ai.squad_id {
            Some(id) if id % 2 == 0 => 1.0,
            Some(_) => -1.0,
            None => 1.0,
        };
        let Some(target_snap) = ai
            .target
            .and_then(|t| snaps.iter().find(|s| s.entity == t).copied())
        else {
            continue;
        };

        let to_target = target_snap.pos - pos;
        let dist = to_target.length().max(1.0);
        let dir = to_target / dist;

        // Proportional heading control toward the target.
        let desired = to_target.y.atan2(to_target.x);
        let heading_error = angle_diff(vessel.heading, desired);
        vessel.heading += heading_error * 0.04;

        // Radial spring toward the combat orbit distance, tangential strafe,
        // and separation from squadmates.
        let dist_error = dist - config.combat_orbit_distance;
        let tangent = Vec2::new(-dir.y, dir.x) * orbit_dir;
        let mut accel = dir * dist_error * 0.002 + tangent * 0.08;

        for other in &snaps {
            if other.entity == entity || !faction.allied(&other.faction) {
                continue;
            }
            let delta = pos - other.pos;
            let d = delta.length();
            if d > f32::EPSILON && d < config.separation_distance {
                accel += delta / d * (config.separation_distance - d) * 0.01;
            }
        }

        vessel.vel = (vessel.vel + accel) * 0.96;
        let tier = ai_tier(vessel.score, config.evolution_score_step);
        let cap = if tier >= 12 {
            config.ship_max_speed * 2.0
        } else {
            config.ship_max_speed
        };
        vessel.vel = vessel.vel.clamp_length_max(cap);

        // Primary fire at the target.
        if vessel.reload <= 0.0 && heading_error.abs() < 0.4 {
            if enemy_shoot(
                &mut commands,
                entity,
                &mut vessel,
                target_snap.pos,
                &snaps,
                home_planet_pos,
                &config,
                &mut rng,
            ) {
                vessel.reload = 30.0 + rng.gen_range(0.0..50.0);
                continue;
            }
        }

        // Opportunistic secondary fire at asteroids drifting through the fight.
        if vessel.reload <= 0.0 {
            for candidate in grid.neighbors(pos) {
                let Ok(body) = bodies.get(candidate) else {
                    continue;
                };
                if body.is_planet() || !body.on_plane() {
                    continue;
                }
                let to_body = body.pos - pos;
                if to_body.length() > 1000.0 {
                    continue;
                }
                let off = angle_diff(vessel.heading, to_body.y.atan2(to_body.x)).abs();
                if off < 0.5
                    && enemy_shoot(
                        &mut commands,
                        entity,
                        &mut vessel,
                        body.pos,
                        &snaps,
                        home_planet_pos,
                        &config,
                        &mut rng,
                    )
                {
                    break;
                }
            }
        }
    }
}

/// Opportunistic firing while in FORMATION, in strict priority order:
/// rivals, enemy planets (friendly fleet only), asteroids threatening the
/// home station, stray asteroids, then the pilot for hostile fleets.
pub fn proactive_scanner_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    home: Res<HomePlanet>,
    planets: Res<ActivePlanets>,
    pilots: Query<(), With<PilotControlled>>,
    bodies: Query<&CelestialBody, Without<Doomed>>,
    mut vessels: ParamSet<(
        Query<(Entity, &Vessel), Without<Doomed>>,
        Query<(Entity, &mut Vessel), (Without<Doomed>, Without<PilotControlled>)>,
    )>,
) {
    let mut rng = rand::thread_rng();
    let snaps = snapshot_vessels(&vessels.p0(), &pilots);
    let home_planet_pos = home
        .0
        .and_then(|h| planets.0.iter().find(|p| p.entity == h).map(|p| p.pos));

    for (entity, mut vessel) in vessels.p1().iter_mut() {
        if vessel.reload > 0.0 {
            continue;
        }
        let pos = vessel.pos;
        let faction = vessel.faction;
        let (formation, home_station) = match vessel.ship() {
            Some(ai) => (ai.state == AiState::Formation, ai.home_station),
            // Stations defend themselves: rivals, then nearby rocks.
            None => (true, None),
        };
        if !formation {
            continue;
        }

        let mut fired = false;

        // 1. Rivals in weapons range.
        for snap in &snaps {
            if snap.entity == entity || snap.is_station || !faction.rival(&snap.faction) {
                continue;
            }
            if pos.distance(snap.pos) < config.sight_range
                && enemy_shoot(
                    &mut commands,
                    entity,
                    &mut vessel,
                    snap.pos,
                    &snaps,
                    home_planet_pos,
                    &config,
                    &mut rng,
                )
            {
                fired = true;
                break;
            }
        }
        if fired {
            continue;
        }
        // Stations still take part in the generic asteroid clearing below.
        let is_station = vessel.is_station();

        // 2. Enemy planets (friendly wingmen chip away at rival worlds).
        if faction.friendly && !is_station {
            for p in &planets.0 {
                if p.z >= 0.5 || home.0 == Some(p.entity) {
                    continue;
                }
                if pos.distance(p.pos) < config.sight_range
                    && enemy_shoot(
                        &mut commands,
                        entity,
                        &mut vessel,
                        p.pos,
                        &snaps,
                        home_planet_pos,
                        &config,
                        &mut rng,
                    )
                {
                    fired = true;
                    break;
                }
            }
        }
        if fired {
            continue;
        }

        // 3. Asteroids threatening the home station.
        let station_snap = home_station.and_then(|s| snaps.iter().find(|v| v.entity == s));
        if let Some(station) = station_snap {
            let danger_range = station.radius * 8.0;
            for candidate in grid.neighbors(pos) {
                let Ok(body) = bodies.get(candidate) else {
                    continue;
                };
                if body.is_planet() || !body.on_plane() {
                    continue;
                }
                if body.pos.distance(station.pos) < danger_range
                    && pos.distance(body.pos) < config.sight_range
                    && enemy_shoot(
                        &mut commands,
                        entity,
                        &mut vessel,
                        body.pos,
                        &snaps,
                        home_planet_pos,
                        &config,
                        &mut rng,
                    )
                {
                    fired = true;
                    break;
                }
            }
        }
        if fired {
            continue;
        }

        // 4. Generic asteroid clearing.
        for candidate in grid.neighbors(pos) {
            let Ok(body) = bodies.get(candidate) else {
                continue;
            };
            if body.is_planet() || !body.on_plane() {
                continue;
            }
            if pos.distance(body.pos) < 1500.0
                && enemy_shoot(
                    &mut commands,
                    entity,
                    &mut vessel,
                    body.pos,
                    &snaps,
                    home_planet_pos,
                    &config,
                    &mut rng,
                )
            {
                fired = true;
                break;
            }
        }
        if fired {
            continue;
        }

        // 5. The pilot, for hostile fleets.
        if !faction.friendly && !is_station {
            if let Some(pilot) = snaps.iter().find(|s| s.is_pilot) {
                if pos.distance(pilot.pos) < config.sight_range {
                    enemy_shoot(
                        &mut commands,
                        entity,
                        &mut vessel,
                        pilot.pos,
                        &snaps,
                        home_planet_pos,
                        &config,
                        &mut rng,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(entity: Entity, pos: Vec2, faction: Faction, is_pilot: bool) -> VesselSnap {
        VesselSnap {
            entity,
            pos,
            vel: Vec2::ZERO,
            radius: 25.0,
            faction,
            is_station: false,
            is_pilot,
        }
    }

    fn entities(n: usize) -> Vec<Entity> {
        let mut world = World::new();
        (0..n).map(|_| world.spawn_empty().id()).collect()
    }

    const RED: Faction = Faction {
        friendly: false,
        hue: 0.0,
    };

    #[test]
    fn angle_diff_wraps_correctly() {
        assert!((angle_diff(0.1, -0.1) + 0.2).abs() < 1e-6);
        let near_pi = angle_diff(3.0, -3.0);
        assert!(near_pi.abs() < 0.3);
    }

    #[test]
    fn ally_between_firer_and_target_blocks_the_shot() {
        let ids = entities(2);
        let firer = snap(ids[0], Vec2::ZERO, RED, false);
        // Ally dead ahead at half the target distance, on the firing line.
        let ally = snap(ids[1], Vec2::new(500.0, 10.0), RED, false);
        let target = Vec2::new(1000.0, 0.0);

        assert!(!is_trajectory_clear(&firer, target, &[firer, ally]));
    }

    #[test]
    fn ally_beyond_target_does_not_block() {
        let ids = entities(2);
        let firer = snap(ids[0], Vec2::ZERO, RED, false);
        let ally = snap(ids[1], Vec2::new(2000.0, 0.0), RED, false);
        let target = Vec2::new(1000.0, 0.0);

        assert!(is_trajectory_clear(&firer, target, &[firer, ally]));
    }

    #[test]
    fn rival_on_the_line_does_not_occlude() {
        let ids = entities(2);
        let firer = snap(ids[0], Vec2::ZERO, RED, false);
        let rival = snap(
            ids[1],
            Vec2::new(500.0, 0.0),
            Faction {
                friendly: false,
                hue: 120.0,
            },
            false,
        );
        let target = Vec2::new(1000.0, 0.0);

        // Occlusion only protects allies; rivals in the way are fair game.
        assert!(is_trajectory_clear(&firer, target, &[firer, rival]));
    }

    #[test]
    fn ai_tier_is_flat_score_steps() {
        assert_eq!(ai_tier(0, 1000), 0);
        assert_eq!(ai_tier(11_999, 1000), 11);
        assert_eq!(ai_tier(12_500, 1000), 12);
    }

    #[test]
    fn god_ring_vetoed_with_ally_in_blast_radius() {
        let ids = entities(2);
        let firer = snap(ids[0], Vec2::ZERO, RED, false);
        let ally = snap(ids[1], Vec2::new(2000.0, 0.0), RED, false);
        assert!(allies_within_blast(&firer, &[firer, ally], None, 2500.0));

        let far_ally = snap(ids[1], Vec2::new(4000.0, 0.0), RED, false);
        assert!(!allies_within_blast(&firer, &[firer, far_ally], None, 2500.0));
    }

    #[test]
    fn friendly_firer_respects_home_planet_radius() {
        let ids = entities(1);
        let blue = Faction {
            friendly: true,
            hue: 210.0,
        };
        let firer = snap(ids[0], Vec2::ZERO, blue, false);
        assert!(allies_within_blast(
            &firer,
            &[firer],
            Some(Vec2::new(1000.0, 0.0)),
            2500.0
        ));
    }
}
