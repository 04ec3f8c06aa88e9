//! Projectile integration and hit resolution.
//!
//! Bullets live for a fixed frame count, feel planet gravity unless their
//! tier exempts them, and die on their first collision.  Hits are resolved
//! bullet-by-bullet with mutations applied through targeted `get_mut`
//! lookups; destruction goes through the shared tombstone pass.

use crate::body::{CelestialBody, Doomed};
use crate::collision::fragment_radius;
use crate::config::SimConfig;
use crate::dynamics::ActivePlanets;
use crate::events::{BodyDestroyed, KillCredit, VesselDestroyed};
use crate::spatial_grid::SpatialGrid;
use crate::vessel::{Faction, PilotControlled, Vessel};
use bevy::prelude::*;
use std::collections::HashSet;

/// A live bullet.
#[derive(Component, Debug, Clone)]
pub struct Projectile {
    pub pos: Vec2,
    pub vel: Vec2,
    pub heading: f32,
    /// Remaining frames.
    pub life: f32,
    pub size: f32,
    /// Firer's tier at launch; fixes damage/visual scaling for this bullet.
    pub tier: u32,
    pub friendly: bool,
    pub hue: f32,
    /// May dangle if the firer dies first; only forfeits score attribution.
    pub owner: Option<Entity>,
    /// Tier ≥ 8 shots punch straight through gravity wells.
    pub ignore_gravity: bool,
}

impl Projectile {
    fn faction(&self) -> Faction {
        Faction {
            friendly: self.friendly,
            hue: self.hue,
        }
    }
}

/// Integrates bullets: gravity bend, motion, lifetime, bounds.
pub fn projectile_update_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    planets: Res<ActivePlanets>,
    mut projectiles: Query<(Entity, &mut Projectile), Without<Doomed>>,
) {
    for (entity, mut bullet) in projectiles.iter_mut() {
        if !bullet.ignore_gravity {
            for p in &planets.0 {
                if p.z >= 0.5 {
                    continue;
                }
                let delta = p.pos - bullet.pos;
                let d_sq = delta.length_squared();
                let range = p.radius * config.planet_gravity_range_factor;
                if d_sq >= range * range {
                    continue;
                }
                let pull = config.gravity_const * p.mass * config.planet_gravity_range_factor
                    / d_sq.max(100.0);
                bullet.vel += delta / d_sq.sqrt().max(1.0) * pull;
            }
        }

        let vel = bullet.vel;
        bullet.pos += vel;
        bullet.life -= 1.0;

        let out_of_bounds = bullet.pos.x.abs() > config.world_bounds + config.boundary_tolerance
            || bullet.pos.y.abs() > config.world_bounds + config.boundary_tolerance;
        if bullet.life <= 0.0 || out_of_bounds || !bullet.pos.is_finite() {
            commands.entity(entity).insert(Doomed);
        }
    }
}

/// Resolves bullet↔body and bullet↔vessel hits.
///
/// Bodies come from the spatial grid (asteroids) plus the planet snapshot;
/// vessels are scanned directly — the fleet roster is two orders of magnitude
/// smaller than the body roster.  Victims are tombstoned through deferred
/// commands, so a per-frame `consumed` set keeps a second coincident bullet
/// from re-resolving the same kill.
pub fn projectile_hit_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    planets: Res<ActivePlanets>,
    pilots: Query<(), With<PilotControlled>>,
    projectiles: Query<(Entity, &Projectile), Without<Doomed>>,
    bodies: Query<(Entity, &CelestialBody), Without<Doomed>>,
    mut vessels: Query<(Entity, &mut Vessel), Without<Doomed>>,
    mut body_destroyed: MessageWriter<BodyDestroyed>,
    mut vessel_destroyed: MessageWriter<VesselDestroyed>,
    mut credit: MessageWriter<KillCredit>,
) {
    let mut rng = rand::thread_rng();
    use rand::Rng;

    let mut consumed: HashSet<Entity> = HashSet::new();

    'bullets: for (bullet_entity, bullet) in projectiles.iter() {
        // Planets swallow bullets whole.
        for p in &planets.0 {
            if p.z < 0.5 && bullet.pos.distance_squared(p.pos) < p.radius * p.radius {
                commands.entity(bullet_entity).insert(Doomed);
                continue 'bullets;
            }
        }

        for candidate in grid.neighbors(bullet.pos) {
            let Ok((body_entity, body)) = bodies.get(candidate) else {
                continue;
            };
            if consumed.contains(&body_entity)
                || body.is_planet()
                || body.blink > 0
                || !body.on_plane()
            {
                continue;
            }
            let hit_range = body.radius + bullet.size;
            if bullet.pos.distance_squared(body.pos) >= hit_range * hit_range {
                continue;
            }

            commands.entity(bullet_entity).insert(Doomed);

            if let Some(child_r) = fragment_radius(body.radius, config.asteroid_min_size) {
                // Crack in two, perpendicular to the shot.
                let axis_angle = bullet.heading + std::f32::consts::FRAC_PI_2;
                let axis = Vec2::new(axis_angle.cos(), axis_angle.sin());
                for sign in [1.0f32, -1.0] {
                    let mut child = CelestialBody::asteroid(
                        body.pos + axis * sign * child_r,
                        body.vel + axis * sign * rng.gen_range(2.0..config.asteroid_max_speed),
                        child_r,
                    );
                    child.blink = config.split_blink_frames;
                    commands.spawn(child);
                }
            } else if let Some(owner) = bullet.owner {
                credit.write(KillCredit {
                    killer: owner,
                    reward: config.reward_asteroid,
                    victim_friendly_vessel: false,
                });
            }
            consumed.insert(body_entity);
            commands.entity(body_entity).insert(Doomed);
            body_destroyed.write(BodyDestroyed {
                entity: body_entity,
                was_planet: false,
                pos: body.pos,
                radius: body.radius,
            });
            continue 'bullets;
        }

        // The pilot's own shots do hurt friendlies; that is how betrayal starts.
        let pilot_fire = bullet.owner.is_some_and(|o| pilots.get(o).is_ok());

        for (vessel_entity, mut vessel) in vessels.iter_mut() {
            if bullet.owner == Some(vessel_entity)
                || consumed.contains(&vessel_entity)
                || vessel.blink > 0
                || (!pilot_fire && bullet.faction().allied(&vessel.faction))
            {
                continue;
            }
            let hit_range = vessel.radius + bullet.size;
            if bullet.pos.distance_squared(vessel.pos) >= hit_range * hit_range {
                continue;
            }

            commands.entity(bullet_entity).insert(Doomed);
            vessel.hp -= 1;
            vessel.shield_hit = 30;

            if vessel.hp <= 0 {
                consumed.insert(vessel_entity);
                commands.entity(vessel_entity).insert(Doomed);
                vessel_destroyed.write(VesselDestroyed {
                    entity: vessel_entity,
                    was_station: vessel.is_station(),
                    friendly: vessel.faction.friendly,
                    pos: vessel.pos,
                    killer: bullet.owner,
                });
                if let Some(owner) = bullet.owner {
                    credit.write(KillCredit {
                        killer: owner,
                        reward: if vessel.is_station() {
                            config.reward_station
                        } else {
                            config.reward_ship
                        },
                        victim_friendly_vessel: vessel.faction.friendly,
                    });
                }
            }
            continue 'bullets;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullet_faction_matches_firer_side() {
        let bullet = Projectile {
            pos: Vec2::ZERO,
            vel: Vec2::X,
            heading: 0.0,
            life: 60.0,
            size: 5.0,
            tier: 3,
            friendly: false,
            hue: 40.0,
            owner: None,
            ignore_gravity: false,
        };
        let same_fleet = Faction {
            friendly: false,
            hue: 40.0,
        };
        let rival_fleet = Faction {
            friendly: false,
            hue: 300.0,
        };
        assert!(bullet.faction().allied(&same_fleet));
        assert!(bullet.faction().rival(&rival_fleet));
    }
}
