//! Formation AI: squad roles, slot management, leader patrol, the wingman
//! spring-follower, obstacle evasion, and defender orbits.
//!
//! Mutations are two-phase throughout: each system reads an immutable pass
//! over the roster first, computes its decisions, then applies them through
//! targeted `get_mut` lookups so no ship ever steers against a half-updated
//! squadmate.

use crate::body::{CelestialBody, Doomed};
use crate::combat_ai::{angle_diff, enemy_shoot, snapshot_vessels};
use crate::config::SimConfig;
use crate::dynamics::ActivePlanets;
use crate::projectile::Projectile;
use crate::spatial_grid::SpatialGrid;
use crate::vessel::{
    standard_slot_layout, AiState, Assignment, Faction, NextSquadId, PilotControlled, ShipRole,
    Vessel,
};
use bevy::prelude::*;
use rand::Rng;
use std::collections::HashMap;

/// Leaders consider a patrol waypoint reached inside this radius.
const WAYPOINT_RADIUS: f32 = 500.0;

/// Asteroids this close to the home station trigger the defense override.
const HOME_DEFENSE_RANGE: f32 = 2500.0;

/// Leader steering gains.
const LEADER_HEADING_GAIN: f32 = 0.05;
const LEADER_THRUST: f32 = 0.5;

/// World-space position of a formation slot.
///
/// Offsets are authored with the leader facing +y, so the frame rotates by
/// `heading − π/2`.
pub fn slot_world_position(leader_pos: Vec2, leader_heading: f32, offset: Vec2) -> Vec2 {
    leader_pos + Vec2::from_angle(leader_heading - std::f32::consts::FRAC_PI_2).rotate(offset)
}

/// Linear closest approach between two tracks over `horizon` frames.
///
/// Returns (time, distance) at the minimum; time is clamped to [0, horizon].
pub fn closest_approach(rel_pos: Vec2, rel_vel: Vec2, horizon: f32) -> (f32, f32) {
    let v_sq = rel_vel.length_squared();
    let t = if v_sq <= f32::EPSILON {
        0.0
    } else {
        (-rel_pos.dot(rel_vel) / v_sq).clamp(0.0, horizon)
    };
    (t, (rel_pos + rel_vel * t).length())
}

/// Reassigns ships between DEFENDER and STRAY per station headcount.
///
/// For each station, its ships sorted by distance; the nearest squad-size
/// cohort defends (and drops any leader it was following), the rest roam.
pub fn role_assignment_system(
    config: Res<SimConfig>,
    mut vessels: Query<(Entity, &mut Vessel), (Without<Doomed>, Without<PilotControlled>)>,
) {
    // station → (ship, distance) roster, read-only pass.
    let mut rosters: HashMap<Entity, Vec<(Entity, f32)>> = HashMap::new();
    let mut station_pos: HashMap<Entity, Vec2> = HashMap::new();

    for (entity, vessel) in vessels.iter() {
        if vessel.is_station() {
            station_pos.insert(entity, vessel.pos);
        }
    }
    for (entity, vessel) in vessels.iter() {
        let Some(ai) = vessel.ship() else { continue };
        let Some(station) = ai.home_station else {
            continue;
        };
        let Some(&pos) = station_pos.get(&station) else {
            continue;
        };
        rosters
            .entry(station)
            .or_default()
            .push((entity, vessel.pos.distance(pos)));
    }

    for roster in rosters.values_mut() {
        roster.sort_by(|a, b| a.1.total_cmp(&b.1));
        for (rank, (ship, _)) in roster.iter().enumerate() {
            let Ok((_, mut vessel)) = vessels.get_mut(*ship) else {
                continue;
            };
            let Some(ai) = vessel.ship_mut() else { continue };
            if rank < config.squad_size {
                ai.assignment = Assignment::Defender;
                // Defenders hold the planet; they do not follow leaders out.
                ai.leader = None;
                ai.squad_id = None;
            } else {
                ai.assignment = Assignment::Stray;
            }
        }
    }

    // Orphaned ships whose station died keep flying as strays.
    for (_, mut vessel) in vessels.iter_mut() {
        let Some(ai) = vessel.ship_mut() else { continue };
        if let Some(station) = ai.home_station {
            if !station_pos.contains_key(&station) {
                ai.home_station = None;
                ai.assignment = Assignment::Stray;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct MemberSnap {
    entity: Entity,
    pos: Vec2,
    faction: Faction,
    is_pilot: bool,
    leader: Option<Entity>,
    stray: bool,
}

/// Revalidates squad slots and recruits unattached strays.
///
/// Join priority for a friendly stray: the pilot's squad, then any same-fleet
/// leader in range; last resort is pairing up with a nearby unattached stray,
/// promoting it to leader of a fresh squad.
pub fn squad_membership_system(
    config: Res<SimConfig>,
    mut next_squad: ResMut<NextSquadId>,
    pilots: Query<(), With<PilotControlled>>,
    mut vessels: Query<(Entity, &mut Vessel), Without<Doomed>>,
) {
    // Read-only roster pass.
    let mut members: Vec<MemberSnap> = Vec::new();
    // leader → (slots working copy, squad id).
    let mut squads: HashMap<Entity, (Vec<crate::vessel::SquadSlot>, Option<u32>)> = HashMap::new();

    for (entity, vessel) in vessels.iter() {
        let Some(ai) = vessel.ship() else { continue };
        members.push(MemberSnap {
            entity,
            pos: vessel.pos,
            faction: vessel.faction,
            is_pilot: pilots.get(entity).is_ok(),
            leader: ai.leader,
            stray: ai.assignment == Assignment::Stray,
        });
        if let ShipRole::Leader { slots } = &ai.role {
            squads.insert(entity, (slots.clone(), ai.squad_id));
        }
    }

    let alive: HashMap<Entity, usize> = members
        .iter()
        .enumerate()
        .map(|(i, m)| (m.entity, i))
        .collect();

    // Slot revalidation: occupants must be alive and still following us.
    for (leader, (slots, _)) in squads.iter_mut() {
        for slot in slots.iter_mut() {
            let valid = slot.occupant.is_some_and(|occupant| {
                alive
                    .get(&occupant)
                    .is_some_and(|&i| members[i].leader == Some(*leader))
            });
            if !valid {
                slot.occupant = None;
            }
        }
    }

    let same_fleet = |a: &MemberSnap, b: &MemberSnap| a.faction.allied(&b.faction);

    // member → (leader, slot offset, squad id)
    let mut joins: Vec<(Entity, Entity, Vec2, Option<u32>)> = Vec::new();
    let mut promotions: Vec<(Entity, u32)> = Vec::new();

    let recruits: Vec<MemberSnap> = members
        .iter()
        .filter(|m| !m.is_pilot && m.leader.is_none() && m.stray)
        .copied()
        .collect();

    for recruit in &recruits {
        if joins.iter().any(|(member, ..)| *member == recruit.entity) {
            continue;
        }
        // Someone may already have promoted this recruit into a leader.
        if squads.contains_key(&recruit.entity) {
            continue;
        }

        // 1. The pilot's squad, for friendlies in range.
        let pilot_leader = members
            .iter()
            .find(|m| m.is_pilot && recruit.faction.friendly)
            .filter(|pilot| recruit.pos.distance(pilot.pos) < config.player_join_range)
            .map(|pilot| pilot.entity);

        // 2. Any same-fleet NPC leader in close range with a free slot.
        let npc_leader = members
            .iter()
            .filter(|m| {
                squads.contains_key(&m.entity)
                    && !m.is_pilot
                    && same_fleet(recruit, m)
                    && recruit.pos.distance(m.pos) < config.leader_join_range
            })
            .map(|m| (m.entity, recruit.pos.distance(m.pos)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(entity, _)| entity);

        let mut chosen = pilot_leader.or(npc_leader);

        // 3. Pair up with another unattached stray, promoting it.
        if chosen.is_none() {
            let buddy = recruits
                .iter()
                .filter(|m| {
                    m.entity != recruit.entity
                        && !squads.contains_key(&m.entity)
                        && same_fleet(recruit, m)
                        && recruit.pos.distance(m.pos) < config.leader_join_range
                        && !joins.iter().any(|(member, ..)| *member == m.entity)
                })
                .map(|m| (m.entity, recruit.pos.distance(m.pos)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(entity, _)| entity);
            if let Some(buddy) = buddy {
                let squad_id = next_squad.take();
                squads.insert(buddy, (standard_slot_layout(), Some(squad_id)));
                promotions.push((buddy, squad_id));
                chosen = Some(buddy);
            }
        }

        let Some(leader) = chosen else { continue };
        let Some((slots, squad_id)) = squads.get_mut(&leader) else {
            continue;
        };
        if let Some(slot) = slots.iter_mut().find(|s| s.occupant.is_none()) {
            slot.occupant = Some(recruit.entity);
            joins.push((recruit.entity, leader, slot.offset, *squad_id));
        }
    }

    // Apply phase.
    for (entity, squad_id) in promotions {
        let Ok((_, mut vessel)) = vessels.get_mut(entity) else {
            continue;
        };
        if let Some(ai) = vessel.ship_mut() {
            ai.role = ShipRole::Leader {
                slots: Vec::new(), // overwritten by the slot write-back below
            };
            ai.squad_id = Some(squad_id);
            ai.leader = None;
            ai.waypoint = None;
        }
    }
    for (leader, (slots, _)) in squads {
        let Ok((_, mut vessel)) = vessels.get_mut(leader) else {
            continue;
        };
        if let Some(ai) = vessel.ship_mut() {
            ai.role = ShipRole::Leader { slots };
        }
    }
    for (member, leader, offset, squad_id) in joins {
        let Ok((_, mut vessel)) = vessels.get_mut(member) else {
            continue;
        };
        if let Some(ai) = vessel.ship_mut() {
            ai.role = ShipRole::Wingman;
            ai.leader = Some(leader);
            ai.formation_offset = offset;
            ai.squad_id = squad_id;
        }
    }
}

/// Waypoint wandering: pick waypoints, cruise toward them, override
/// everything to defend the home station when rocks close in.  Applies to
/// leaders and to leaderless strays, which roam on the same rules.
pub fn leader_patrol_system(
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    bodies: Query<&CelestialBody, Without<Doomed>>,
    mut vessels: Query<(Entity, &mut Vessel), (Without<Doomed>, Without<PilotControlled>)>,
) {
    let mut rng = rand::thread_rng();

    // Station positions, read-only pass.
    let stations: Vec<(Entity, Vec2, Faction)> = vessels
        .iter()
        .filter(|(_, v)| v.is_station())
        .map(|(e, v)| (e, v.pos, v.faction))
        .collect();

    for (_, mut vessel) in vessels.iter_mut() {
        let pos = vessel.pos;
        let faction = vessel.faction;
        let Some(ai) = vessel.ship_mut() else { continue };
        let wanders = matches!(ai.role, ShipRole::Leader { .. })
            || (ai.leader.is_none() && ai.assignment == Assignment::Stray);
        if ai.state != AiState::Formation || !wanders {
            continue;
        }

        // Home defense trumps the patrol route.
        let home = ai
            .home_station
            .and_then(|s| stations.iter().find(|(e, ..)| *e == s))
            .map(|(_, p, ..)| *p);
        let mut defense_target = None;
        if let Some(home_pos) = home {
            defense_target = grid
                .neighbors(home_pos)
                .into_iter()
                .filter_map(|e| bodies.get(e).ok())
                .filter(|b| !b.is_planet() && b.on_plane())
                .map(|b| (b.pos, b.pos.distance(home_pos)))
                .filter(|(_, d)| *d < HOME_DEFENSE_RANGE)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(p, _)| p);
        }

        if let Some(threat) = defense_target {
            ai.waypoint = Some(threat);
        } else {
            let reached = ai
                .waypoint
                .is_none_or(|w| pos.distance(w) < WAYPOINT_RADIUS);
            if reached {
                let rival_stations: Vec<Vec2> = stations
                    .iter()
                    .filter(|(_, _, station_faction)| faction.rival(station_faction))
                    .map(|(_, p, ..)| *p)
                    .collect();
                ai.waypoint = if !rival_stations.is_empty() && rng.gen_bool(0.5) {
                    Some(rival_stations[rng.gen_range(0..rival_stations.len())])
                } else {
                    let extent = config.world_bounds * 0.9;
                    Some(Vec2::new(
                        rng.gen_range(-extent..extent),
                        rng.gen_range(-extent..extent),
                    ))
                };
            }
        }

        let Some(waypoint) = ai.waypoint else { continue };
        let to_waypoint = waypoint - pos;
        let desired = to_waypoint.y.atan2(to_waypoint.x);
        let error = angle_diff(vessel.heading, desired);
        vessel.heading += error * LEADER_HEADING_GAIN;
        let forward = Vec2::new(vessel.heading.cos(), vessel.heading.sin());
        vessel.vel += forward * LEADER_THRUST;
        vessel.vel = vessel.vel.clamp_length_max(config.leader_cruise_speed);
    }
}

/// The wingman spring-follower, plus obstacle prediction and evasion.
#[allow(clippy::too_many_arguments)]
pub fn wingman_steering_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    planets: Res<ActivePlanets>,
    home: Res<crate::body::HomePlanet>,
    pilots: Query<(), With<PilotControlled>>,
    bodies: Query<&CelestialBody, Without<Doomed>>,
    projectiles: Query<&Projectile, Without<Doomed>>,
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

    // leader → (pos, vel, heading) for slot targeting.
    let leaders: HashMap<Entity, (Vec2, Vec2, f32)> = vessels
        .p0()
        .iter()
        .filter(|(_, v)| v.ship().is_some())
        .map(|(e, v)| (e, (v.pos, v.vel, v.heading)))
        .collect();
    // squadmate positions for separation, squad id keyed.
    let squadmates: Vec<(Entity, Vec2, f32, Option<u32>)> = vessels
        .p0()
        .iter()
        .filter_map(|(e, v)| v.ship().map(|ai| (e, v.pos, v.radius, ai.squad_id)))
        .collect();

    for (entity, mut vessel) in vessels.p1().iter_mut() {
        let pos = vessel.pos;
        let vel = vessel.vel;
        let radius = vessel.radius;
        let faction = vessel.faction;
        let squad_id = vessel.ship().and_then(|ai| ai.squad_id);

        let Some(ai) = vessel.ship_mut() else { continue };
        if ai.state != AiState::Formation {
            ai.danger_timer = 0;
            continue;
        }
        let Some(leader_entity) = ai.leader else {
            continue;
        };
        let Some(&(leader_pos, leader_vel, leader_heading)) = leaders.get(&leader_entity) else {
            // Leader died this frame; go stray and let recruitment pick us up.
            ai.leader = None;
            ai.squad_id = None;
            continue;
        };
        let offset = ai.formation_offset;

        // Obstacle prediction against nearby rocks.
        let mut nearest_threat: Option<(Vec2, Vec2, f32, f32)> = None;
        for candidate in grid.neighbors(pos) {
            let Ok(body) = bodies.get(candidate) else {
                continue;
            };
            if body.is_planet() || !body.on_plane() {
                continue;
            }
            let d = pos.distance(body.pos);
            if d > config.danger_scan_range {
                continue;
            }
            let (_, approach) =
                closest_approach(body.pos - pos, body.vel - vel, config.collision_predict_frames);
            if approach < config.critical_danger_range + body.radius
                && nearest_threat.is_none_or(|(.., best)| d < best)
            {
                nearest_threat = Some((body.pos, body.vel, body.radius, d));
            }
        }

        let critical = nearest_threat.is_some_and(|(.., d)| d < config.critical_danger_range);
        if critical {
            ai.danger_timer += 1;
        } else {
            ai.danger_timer = 0;
        }

        if ai.danger_timer > config.danger_dwell_frames {
            // Bail out of the formation entirely and dodge.
            ai.leader = None;
            ai.squad_id = None;
            ai.formation_offset = Vec2::ZERO;
            ai.danger_timer = 0;
            if let Some((threat_pos, ..)) = nearest_threat {
                let away = pos - threat_pos;
                let perp = Vec2::new(-away.y, away.x).normalize_or(Vec2::X);
                vessel.vel += perp * 3.0;
            }
            continue;
        }

        // Spring toward the slot, velocity-matched to the leader.
        let target = slot_world_position(leader_pos, leader_heading, offset);
        let to_target = target - pos;
        let dist = to_target.length();
        let catch_up = if dist > 500.0 { 1.5 } else { 1.0 };
        let mut accel = to_target * 0.25 * catch_up + (leader_vel - vel) * 0.25;
        if dist < 200.0 {
            accel *= dist / 200.0;
        }

        // Keep clear of the leader itself.
        let leader_radius = snaps
            .iter()
            .find(|s| s.entity == leader_entity)
            .map_or(radius, |s| s.radius);
        let from_leader = pos - leader_pos;
        if from_leader.length() < radius + leader_radius + 10.0 {
            accel += from_leader.normalize_or(Vec2::X) * 1.5;
        }

        // And clear of squadmates.
        if let Some(squad) = squad_id {
            for (other, other_pos, other_radius, other_squad) in &squadmates {
                if *other == entity || *other_squad != Some(squad) {
                    continue;
                }
                let delta = pos - *other_pos;
                let d = delta.length();
                let required = 30.0 + (radius + other_radius) * 0.5;
                if d > f32::EPSILON && d < required {
                    accel += delta / d * (required - d) * 0.08;
                }
            }
        }

        vessel.vel = ((vel + accel) * 0.90).clamp_length_max(config.ship_max_speed);

        // Face and shoot a rock on collision course.
        if let Some((threat_pos, _, _, d)) = nearest_threat {
            if d < config.danger_shoot_range {
                let to_threat = threat_pos - pos;
                let desired = to_threat.y.atan2(to_threat.x);
                let error = angle_diff(vessel.heading, desired);
                vessel.heading += error * 0.3;
                if vessel.reload <= 0.0
                    && error.abs() < 0.3
                    && enemy_shoot(
                        &mut commands,
                        entity,
                        &mut vessel,
                        threat_pos,
                        &snaps,
                        home_planet_pos,
                        &config,
                        &mut rng,
                    )
                {
                    vessel.reload = 20.0 + rng.gen_range(0.0..30.0);
                }
            }
        }

        // Sidestep incoming fire.
        for bullet in projectiles.iter() {
            if bullet.friendly == faction.friendly && (bullet.hue - faction.hue).abs() < 0.5 {
                continue;
            }
            if pos.distance(bullet.pos) > config.danger_scan_range {
                continue;
            }
            let (_, approach) = closest_approach(
                bullet.pos - pos,
                bullet.vel - vessel.vel,
                config.projectile_predict_frames,
            );
            if approach < radius + bullet.size + 10.0 {
                let lateral = Vec2::new(-bullet.vel.y, bullet.vel.x).normalize_or(Vec2::Y);
                let side = if lateral.dot(pos - bullet.pos) >= 0.0 {
                    1.0
                } else {
                    -1.0
                };
                vessel.vel += lateral * side * 3.0;
                break;
            }
        }
    }
}

/// Defenders (and idle strays) ride a gravity-consistent orbit around their
/// station's host planet.
pub fn defender_orbit_system(
    config: Res<SimConfig>,
    bodies: Query<&CelestialBody, Without<Doomed>>,
    mut vessels: Query<(Entity, &mut Vessel), (Without<Doomed>, Without<PilotControlled>)>,
) {
    // station → host planet, read-only pass.
    let hosts: HashMap<Entity, Entity> = vessels
        .iter()
        .filter_map(|(e, v)| v.station().map(|anchor| (e, anchor.host_planet)))
        .collect();

    for (_, mut vessel) in vessels.iter_mut() {
        let pos = vessel.pos;
        let vel = vessel.vel;
        let radius = vessel.radius;
        let Some(ai) = vessel.ship() else { continue };
        if ai.state != AiState::Formation || ai.leader.is_some() {
            continue;
        }
        let idle_stray = ai.assignment == Assignment::Stray && vel.length() < 10.0;
        if ai.assignment != Assignment::Defender && !idle_stray {
            continue;
        }
        let Some(planet_entity) = ai.home_station.and_then(|s| hosts.get(&s).copied()) else {
            continue;
        };
        let Ok(planet) = bodies.get(planet_entity) else {
            continue;
        };

        let ring = planet.radius * 1.8 + radius;
        let from_planet = pos - planet.pos;
        let d = from_planet.length().max(1.0);
        let radial = from_planet / d;
        let ring_pos = planet.pos + radial * ring;
        let orbit_speed =
            (config.gravity_const * planet.mass * config.planet_gravity_range_factor
                / d.max(10.0))
            .sqrt();
        let tangent = Vec2::new(-radial.y, radial.x);

        let desired = tangent * orbit_speed + (ring_pos - pos) * 0.05;
        vessel.vel = vel.lerp(desired, 0.05);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_frame_is_identity_when_facing_up() {
        // Offsets are authored facing +y; at heading π/2 they pass through.
        let offset = Vec2::new(-150.0, -150.0);
        let slot = slot_world_position(Vec2::ZERO, std::f32::consts::FRAC_PI_2, offset);
        assert!((slot - offset).length() < 1e-4);
    }

    #[test]
    fn slot_behind_leader_tracks_heading() {
        // (0, -150) means "directly behind"; with the leader facing +x the
        // slot must land at (-150, 0).
        let slot = slot_world_position(Vec2::ZERO, 0.0, Vec2::new(0.0, -150.0));
        assert!((slot - Vec2::new(-150.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn head_on_tracks_collide_at_midpoint_time() {
        // Target 600 units ahead, closing at 10/frame.
        let (t, d) = closest_approach(Vec2::new(600.0, 0.0), Vec2::new(-10.0, 0.0), 120.0);
        assert!((t - 60.0).abs() < 1e-3);
        assert!(d < 1e-3);
    }

    #[test]
    fn diverging_tracks_report_current_distance() {
        let (t, d) = closest_approach(Vec2::new(600.0, 0.0), Vec2::new(10.0, 0.0), 120.0);
        assert_eq!(t, 0.0);
        assert!((d - 600.0).abs() < 1e-3);
    }

    #[test]
    fn approach_clamps_to_horizon() {
        // Closing slowly: true minimum is at t = 600, outside a 60-frame
        // horizon, so the prediction reports the distance at the horizon.
        let (t, d) = closest_approach(Vec2::new(600.0, 0.0), Vec2::new(-1.0, 0.0), 60.0);
        assert_eq!(t, 60.0);
        assert!((d - 540.0).abs() < 1e-3);
    }
}
