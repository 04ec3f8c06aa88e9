//! Pairwise body interaction: attraction bands, the merge/split/promote
//! branch table, and end-of-frame tombstone compaction.
//!
//! Two-phase matching: planets are few and huge, so they are tested pairwise
//! against each other and against every asteroid; asteroid↔asteroid pairs go
//! through the spatial grid with an entity-order de-duplication rule.  All
//! destruction is deferred through the `Doomed` tombstone and applied by
//! [`compact_doomed_system`] in `PostUpdate` — nothing is removed from
//! storage mid-iteration.

use crate::body::{
    promote_to_planet, spawn_planet_debris, CelestialBody, Doomed, HomePlanet, PlanetBudget,
};
use crate::config::SimConfig;
use crate::events::{BodyDestroyed, HomeLossCause, HomePlanetLost};
use crate::spatial_grid::SpatialGrid;
use crate::weapons::Shockwave;
use bevy::prelude::*;
use rand::Rng;
use std::collections::HashSet;

/// Radius of the merged body from combined circular area, with a 5% volume
/// gain modelling accretion.
pub fn merged_radius(r1: f32, r2: f32) -> f32 {
    (r1 * r1 + r2 * r2).sqrt() * 1.05
}

/// Radius of a split fragment, or `None` when halving would drop below the
/// minimum asteroid size (forbidden fragments are simply not created).
pub fn fragment_radius(parent: f32, min_size: f32) -> Option<f32> {
    let child = parent * 0.5;
    (child >= min_size).then_some(child)
}

/// Pre-contact attraction force between a pair in the band
/// `touching < d < 3×(r1+r2)`.
///
/// Returns the force magnitude; callers divide by each body's own mass for
/// the per-body acceleration.  The distance floor differs per pair kind to
/// keep close-range forces bounded.
pub fn attraction_force(
    config: &SimConfig,
    a_planet: bool,
    b_planet: bool,
    any_giant: bool,
    m1: f32,
    m2: f32,
    d_sq: f32,
) -> f32 {
    let g = config.gravity_const;
    if a_planet && b_planet {
        g * m1 * m2 * config.attraction_planet / d_sq.max(2000.0)
    } else if a_planet || b_planet {
        g * m1 * m2 / d_sq.max(500.0)
    } else {
        let mult = if any_giant {
            config.attraction_giant
        } else {
            config.attraction_asteroid
        };
        g * m1 * m2 * mult / d_sq.max(400.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct BodySnap {
    entity: Entity,
    pos: Vec2,
    vel: Vec2,
    radius: f32,
    mass: f32,
    blink: u32,
    planet: bool,
    giant: bool,
}

/// Resolves all body↔body interactions for this frame.
pub fn body_collision_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    mut budget: ResMut<PlanetBudget>,
    mut home: ResMut<HomePlanet>,
    mut destroyed: MessageWriter<BodyDestroyed>,
    mut home_lost: MessageWriter<HomePlanetLost>,
    mut bodies: Query<(Entity, &mut CelestialBody), Without<Doomed>>,
) {
    let mut rng = rand::thread_rng();

    // Snapshot interaction-plane bodies.  Positions read here are
    // post-integration; mutations below go through `bodies.get_mut`.
    let mut snaps: Vec<BodySnap> = Vec::new();
    for (entity, body) in bodies.iter() {
        if !body.on_plane() {
            continue;
        }
        snaps.push(BodySnap {
            entity,
            pos: body.pos,
            vel: body.vel,
            radius: body.radius,
            mass: body.mass,
            blink: body.blink,
            planet: body.is_planet(),
            giant: body.is_giant(&config),
        });
    }

    let mut live_planets = snaps.iter().filter(|s| s.planet).count();

    // Candidate pairs: planet↔planet and planet↔asteroid pairwise (planets
    // are too large for the grid's 3×3 guarantee), asteroid↔asteroid via the
    // grid with entity-order de-duplication.
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    let planet_idx: Vec<usize> = (0..snaps.len()).filter(|&i| snaps[i].planet).collect();
    for (n, &i) in planet_idx.iter().enumerate() {
        for &j in planet_idx.iter().skip(n + 1) {
            pairs.push((i, j));
        }
        for (j, snap) in snaps.iter().enumerate() {
            if !snap.planet {
                pairs.push((i, j));
            }
        }
    }
    let index_of: std::collections::HashMap<Entity, usize> = snaps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.entity, i))
        .collect();
    for (i, snap) in snaps.iter().enumerate() {
        if snap.planet {
            continue;
        }
        for other in grid.neighbors_excluding(snap.entity, snap.pos) {
            let Some(&j) = index_of.get(&other) else {
                continue;
            };
            if snaps[j].planet || snap.entity >= snaps[j].entity {
                continue;
            }
            pairs.push((i, j));
        }
    }

    // Bodies consumed by an overlap resolution this frame; further pairs
    // touching them are skipped so a body cannot merge twice.
    let mut consumed: HashSet<usize> = HashSet::new();

    for (i, j) in pairs {
        if consumed.contains(&i) || consumed.contains(&j) {
            continue;
        }
        let (a, b) = (snaps[i], snaps[j]);
        if a.blink > 0 || b.blink > 0 {
            continue;
        }

        let delta = b.pos - a.pos;
        let d_sq = delta.length_squared();
        let sum_r = a.radius + b.radius;
        let dist = d_sq.sqrt();

        if dist >= sum_r * 3.0 {
            continue;
        }

        if dist >= sum_r {
            // Attraction band: visible pre-contact drift toward each other.
            let force = attraction_force(
                &config,
                a.planet,
                b.planet,
                a.giant || b.giant,
                a.mass,
                b.mass,
                d_sq,
            );
            let dir = if dist > f32::EPSILON {
                delta / dist
            } else {
                Vec2::X
            };
            if let Ok((_, mut body)) = bodies.get_mut(a.entity) {
                body.vel += dir * (force / a.mass);
            }
            if let Ok((_, mut body)) = bodies.get_mut(b.entity) {
                body.vel -= dir * (force / b.mass);
            }
            continue;
        }

        // ── Overlap: branch on pair kind ─────────────────────────────────────
        match (a.planet, b.planet) {
            (true, true) => {
                // Mutual annihilation.  Debris and shockwaves fly; the planet
                // budget drops by 2 to slow repopulation after the cataclysm.
                for snap in [a, b] {
                    commands.entity(snap.entity).insert(Doomed);
                    destroyed.write(BodyDestroyed {
                        entity: snap.entity,
                        was_planet: true,
                        pos: snap.pos,
                        radius: snap.radius,
                    });
                    commands.spawn(Shockwave::blast(snap.pos));
                    if home.0 == Some(snap.entity) {
                        home.0 = None;
                        home_lost.write(HomePlanetLost {
                            cause: HomeLossCause::Collision,
                        });
                    }
                }
                let midpoint = (a.pos + b.pos) * 0.5;
                spawn_planet_debris(&mut commands, midpoint, &config, &mut rng);
                budget.limit = budget.limit.saturating_sub(2);
                live_planets = live_planets.saturating_sub(2);
                consumed.insert(i);
                consumed.insert(j);
            }
            (true, false) | (false, true) => {
                let (planet, asteroid, asteroid_idx) =
                    if a.planet { (a, b, j) } else { (b, a, i) };
                if asteroid.radius <= config.asteroid_min_size * 1.5 {
                    // Too small to matter: redirected onto a safe orbit
                    // instead of merging, which would otherwise micro-merge
                    // forever as capture keeps feeding it back in.
                    let normal = (asteroid.pos - planet.pos).normalize_or(Vec2::X);
                    let safe_dist =
                        planet.radius * config.planet_orbit_radius_factor + asteroid.radius;
                    let tangent = Vec2::new(-normal.y, normal.x);
                    let orbit_speed = (config.gravity_const
                        * planet.mass
                        * config.planet_gravity_range_factor
                        / safe_dist.max(10.0))
                    .sqrt();
                    if let Ok((_, mut body)) = bodies.get_mut(asteroid.entity) {
                        body.pos = planet.pos + normal * safe_dist;
                        body.vel = tangent * orbit_speed + planet.vel;
                    }
                } else {
                    // Absorption: planet grows through targetR easing toward
                    // the combined-area radius, capped at the planet max.
                    if let Ok((_, mut body)) = bodies.get_mut(planet.entity) {
                        let grown = (planet.radius * planet.radius
                            + asteroid.radius * asteroid.radius * 1.5)
                            .sqrt()
                            .min(config.planet_max_size);
                        body.target_radius = Some(grown);
                        body.mass = planet.mass + asteroid.mass;
                    }
                    commands.entity(asteroid.entity).insert(Doomed);
                    destroyed.write(BodyDestroyed {
                        entity: asteroid.entity,
                        was_planet: false,
                        pos: asteroid.pos,
                        radius: asteroid.radius,
                    });
                    consumed.insert(asteroid_idx);
                }
            }
            (false, false) => match (a.giant, b.giant) {
                (true, true) => {
                    let total_mass = a.mass + b.mass;
                    let pos = (a.pos * a.mass + b.pos * b.mass) / total_mass;
                    let vel = (a.vel * a.mass + b.vel * b.mass) / total_mass * 0.5;
                    if let Ok((_, mut body)) = bodies.get_mut(a.entity) {
                        body.pos = pos;
                        body.vel = vel;
                        if live_planets < budget.limit {
                            body.set_radius(
                                merged_radius(a.radius, b.radius)
                                    .max(config.asteroid_max_size + 10.0),
                            );
                            body.mass = total_mass * 0.05;
                            promote_to_planet(&mut body, &config, &mut rng);
                            live_planets += 1;
                        } else {
                            // Limit reached: just a bigger giant.
                            body.set_radius(merged_radius(a.radius, b.radius));
                            body.mass = total_mass;
                        }
                    }
                    commands.entity(b.entity).insert(Doomed);
                    destroyed.write(BodyDestroyed {
                        entity: b.entity,
                        was_planet: false,
                        pos: b.pos,
                        radius: b.radius,
                    });
                    consumed.insert(i);
                    consumed.insert(j);
                }
                (true, false) | (false, true) => {
                    let (giant, normal) = if a.giant { (a, b) } else { (b, a) };
                    if normal.radius <= config.asteroid_min_size * 1.2 {
                        // Absorbed outright; the giant survives unchanged.
                        commands.entity(normal.entity).insert(Doomed);
                        destroyed.write(BodyDestroyed {
                            entity: normal.entity,
                            was_planet: false,
                            pos: normal.pos,
                            radius: normal.radius,
                        });
                        consumed.insert(if a.giant { j } else { i });
                    } else {
                        // Violent split: both shatter into half-radius
                        // children launched along a shared random axis.
                        for snap in [giant, normal] {
                            if let Some(child_r) =
                                fragment_radius(snap.radius, config.asteroid_min_size)
                            {
                                let axis_angle = rng.gen_range(0.0..std::f32::consts::TAU);
                                let axis = Vec2::new(axis_angle.cos(), axis_angle.sin());
                                for sign in [1.0, -1.0] {
                                    let mut child = CelestialBody::asteroid(
                                        snap.pos + axis * sign * child_r,
                                        axis * sign * config.asteroid_max_speed,
                                        child_r,
                                    );
                                    child.blink = config.split_blink_frames;
                                    commands.spawn(child);
                                }
                            }
                            commands.entity(snap.entity).insert(Doomed);
                            destroyed.write(BodyDestroyed {
                                entity: snap.entity,
                                was_planet: false,
                                pos: snap.pos,
                                radius: snap.radius,
                            });
                        }
                        consumed.insert(i);
                        consumed.insert(j);
                    }
                }
                (false, false) => {
                    // Accretion: mass-weighted inelastic merge into `a`.
                    let total_mass = a.mass + b.mass;
                    if let Ok((_, mut body)) = bodies.get_mut(a.entity) {
                        body.pos = (a.pos * a.mass + b.pos * b.mass) / total_mass;
                        body.vel = (a.vel * a.mass + b.vel * b.mass) / total_mass;
                        body.set_radius(merged_radius(a.radius, b.radius));
                        body.mass = total_mass;
                    }
                    commands.entity(b.entity).insert(Doomed);
                    destroyed.write(BodyDestroyed {
                        entity: b.entity,
                        was_planet: false,
                        pos: b.pos,
                        radius: b.radius,
                    });
                    consumed.insert(i);
                    consumed.insert(j);
                }
            },
        }
    }
}

/// End-of-frame compaction: every tombstoned entity leaves storage here and
/// nowhere else.
pub fn compact_doomed_system(mut commands: Commands, doomed: Query<Entity, With<Doomed>>) {
    for entity in doomed.iter() {
        commands.entity(entity).despawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_radius_matches_area_sum_with_gain() {
        let r = merged_radius(40.0, 40.0);
        assert!((r - (3200.0_f32).sqrt() * 1.05).abs() < 1e-3);
        assert!((r - 59.397).abs() < 0.01);
    }

    #[test]
    fn fragments_below_minimum_are_dropped() {
        assert_eq!(fragment_radius(100.0, 90.0), None);
        assert_eq!(fragment_radius(200.0, 90.0), Some(100.0));
    }

    #[test]
    fn giant_pairs_attract_far_harder_than_normal_pairs() {
        let cfg = SimConfig::default();
        let normal = attraction_force(&cfg, false, false, false, 100.0, 100.0, 1_000_000.0);
        let giant = attraction_force(&cfg, false, false, true, 100.0, 100.0, 1_000_000.0);
        assert!(giant / normal > 50.0);
    }

    #[test]
    fn planet_pairs_use_their_own_distance_floor() {
        let cfg = SimConfig::default();
        // Below the 2000 floor the force stops growing.
        let at_floor = attraction_force(&cfg, true, true, false, 10.0, 10.0, 2000.0);
        let below_floor = attraction_force(&cfg, true, true, false, 10.0, 10.0, 100.0);
        assert_eq!(at_floor, below_floor);
    }
}
