//! Per-frame integration of celestial bodies.
//!
//! Runs first in the frame: radius easing, the planet z-depth cycle,
//! elliptical orbit advance, gravitational capture of asteroids, speed
//! clamping, boundary containment, and defensive NaN filtering.  The spatial
//! grid is rebuilt immediately after this system so the collision phase sees
//! post-integration positions.

use crate::body::{BodyKind, CelestialBody, Doomed};
use crate::config::SimConfig;
use crate::events::StationSpawnRequest;
use crate::vessel::{PilotControlled, Vessel};
use bevy::prelude::*;

/// Snapshot of a live planet taken during the planet pass, consumed by the
/// asteroid-capture pass and by projectile gravity.
#[derive(Debug, Clone, Copy)]
pub struct PlanetSnapshot {
    pub entity: Entity,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub mass: f32,
    pub z: f32,
}

/// Planets visible to the rest of the frame, refreshed by
/// [`body_dynamics_system`].
#[derive(Resource, Debug, Default)]
pub struct ActivePlanets(pub Vec<PlanetSnapshot>);

/// Ease `current` toward `target` by 2% per frame, snapping within 1.0 unit.
/// Returns the new radius and whether the target was reached.
pub fn eased_radius(current: f32, target: f32) -> (f32, bool) {
    if (target - current).abs() < 1.0 {
        (target, true)
    } else {
        (current + (target - current) * 0.02, false)
    }
}

/// World-space point on a planet's rotated ellipse at its current anomaly.
pub fn ellipse_point(orbit: &crate::body::PlanetOrbit) -> Vec2 {
    let local = Vec2::new(
        orbit.semi_major * orbit.angle.cos(),
        orbit.semi_minor * orbit.angle.sin(),
    );
    let (sin_r, cos_r) = orbit.rotation.sin_cos();
    orbit.center
        + Vec2::new(
            local.x * cos_r - local.y * sin_r,
            local.x * sin_r + local.y * cos_r,
        )
}

/// Gravity feathering near a planet surface: 0 at the surface, ramping to
/// full strength at one fifth of the gravity range.  Prevents a hard "wall"
/// of acceleration right at the radius.
pub fn surface_feather(dist: f32, planet_radius: f32, gravity_range: f32) -> f32 {
    let full_at = gravity_range / 5.0;
    if dist <= planet_radius {
        0.0
    } else if dist >= full_at {
        1.0
    } else {
        (dist - planet_radius) / (full_at - planet_radius).max(1.0)
    }
}

/// Frames a planet dwells at the far point of its z cycle before returning.
const Z_FAR_DWELL: u32 = 120;

/// Integrates every celestial body for this frame.
///
/// Planets first (so the asteroid pass sees their post-advance positions),
/// then asteroids with capture physics, then shared clamping/containment.
pub fn body_dynamics_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut planets: ResMut<ActivePlanets>,
    mut spawn_requests: MessageWriter<StationSpawnRequest>,
    mut query: Query<(Entity, &mut CelestialBody), Without<Doomed>>,
) {
    planets.0.clear();

    // ── Planet pass ──────────────────────────────────────────────────────────
    for (entity, mut body) in query.iter_mut() {
        if !body.is_planet() {
            continue;
        }

        if let Some(target) = body.target_radius {
            let (r, done) = eased_radius(body.radius, target);
            body.set_radius(r);
            if done {
                body.target_radius = None;
            }
        }

        let z_speed = body.z_speed;
        let mut z = body.z;
        let max_z = config.max_z_depth;
        let BodyKind::Planet(ref mut orbit) = body.kind else {
            continue;
        };

        // z cycle: drift toward the background, dwell, come back.
        if orbit.z_wait > 0 {
            orbit.z_wait -= 1;
        } else {
            z += z_speed;
        }
        let mut new_z_speed = z_speed;
        if z >= max_z {
            z = max_z;
            new_z_speed = -z_speed.abs();
            orbit.z_wait = Z_FAR_DWELL;
        } else if z <= 0.0 {
            z = 0.0;
            new_z_speed = z_speed.abs();
        }

        // One station-spawn attempt per surfacing; re-armed in the background.
        if z < 0.2 && !orbit.station_latched {
            orbit.station_latched = true;
            spawn_requests.write(StationSpawnRequest { planet: entity });
        } else if z > 1.0 {
            orbit.station_latched = false;
        }

        // Orbit advance, damped by depth.  Velocity is derived from the
        // next-position delta so collision response stays physically
        // consistent with orbital motion.
        let z_modifier = 1.0 / (1.0 + z);
        orbit.angle += orbit.angular_speed * z_modifier;
        let next = ellipse_point(orbit);

        body.vel = next - body.pos;
        body.z = z;
        body.z_speed = new_z_speed;

        planets.0.push(PlanetSnapshot {
            entity,
            pos: next,
            vel: body.vel,
            radius: body.radius,
            mass: body.mass,
            z,
        });
    }

    // ── Asteroid pass ────────────────────────────────────────────────────────
    for (_, mut body) in query.iter_mut() {
        if body.is_planet() {
            continue;
        }

        if let Some(target) = body.target_radius {
            let (r, done) = eased_radius(body.radius, target);
            body.set_radius(r);
            if done {
                body.target_radius = None;
            }
        }

        if body.on_plane() {
            apply_planet_capture(&mut body, &planets.0, &config);
        }
    }

    // ── Shared integration, clamping, containment, NaN filtering ─────────────
    for (entity, mut body) in query.iter_mut() {
        let is_planet = body.is_planet();

        if !is_planet {
            let max_speed = config.asteroid_max_speed;
            body.vel = body.vel.clamp_length_max(max_speed);

            let limit = config.world_bounds - config.boundary_tolerance;
            let correction = config.boundary_correction;
            if body.pos.x.abs() > limit {
                body.vel.x -= correction * body.pos.x.signum();
            }
            if body.pos.y.abs() > limit {
                body.vel.y -= correction * body.pos.y.signum();
            }
        }

        let vel = body.vel;
        body.pos += vel;

        if body.blink > 0 {
            body.blink -= 1;
        }

        if !body.pos.is_finite() || !body.vel.is_finite() {
            commands.entity(entity).insert(Doomed);
        }
    }
}

/// Gravity and capture blending from the nearest live planet onto one asteroid.
fn apply_planet_capture(body: &mut CelestialBody, planets: &[PlanetSnapshot], config: &SimConfig) {
    let mut nearest: Option<(&PlanetSnapshot, f32)> = None;
    for p in planets {
        if p.z >= 0.5 {
            continue;
        }
        let d_sq = body.pos.distance_squared(p.pos);
        if nearest.map_or(true, |(_, best)| d_sq < best) {
            nearest = Some((p, d_sq));
        }
    }
    let Some((planet, d_sq)) = nearest else {
        return;
    };
    let dist = d_sq.sqrt();

    let gravity_range = planet.radius * config.planet_gravity_range_factor;
    if dist >= gravity_range || dist <= f32::EPSILON {
        return;
    }

    let orbit_radius = planet.radius * config.planet_orbit_radius_factor + body.radius;
    let small = body.radius <= config.asteroid_min_size * 1.5;

    if small && dist < orbit_radius * 2.0 {
        // Orbit candidate: blend toward a tangential vis-viva velocity plus a
        // radial spring on the distance error.  Produces stable quasi-circular
        // captured orbits rather than surface crashes.
        let to_planet = (planet.pos - body.pos) / dist;
        let tangent = Vec2::new(-to_planet.y, to_planet.x);
        let orbit_speed = (config.gravity_const
            * planet.mass
            * config.planet_gravity_range_factor
            / dist.max(10.0))
        .sqrt();
        let target_vel = tangent * orbit_speed + planet.vel;
        body.vel += (target_vel - body.vel) * 0.1;

        let dist_error = dist - orbit_radius;
        body.vel += to_planet * dist_error * 0.005;
    } else {
        let pull = config.gravity_const * planet.mass * config.planet_gravity_range_factor
            / d_sq.max(100.0);
        body.vel += (planet.pos - body.pos) / dist * pull;
    }
}

/// Feathered planet gravity on the pilot-controlled vessel — the symmetric
/// counterpart of asteroid capture, minus the orbit blending.
pub fn pilot_gravity_system(
    config: Res<SimConfig>,
    planets: Res<ActivePlanets>,
    mut pilots: Query<&mut Vessel, With<PilotControlled>>,
) {
    for mut vessel in pilots.iter_mut() {
        for p in &planets.0 {
            if p.z >= 0.5 {
                continue;
            }
            let delta = p.pos - vessel.pos;
            let dist = delta.length();
            let gravity_range = p.radius * config.planet_gravity_range_factor;
            if dist >= gravity_range || dist <= f32::EPSILON {
                continue;
            }
            let feather = surface_feather(dist, p.radius, gravity_range);
            let pull = config.gravity_const * p.mass * config.planet_gravity_range_factor
                / (dist * dist).max(100.0)
                * feather;
            vessel.vel += delta / dist * pull;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::planet_orbit_for;
    use rand::thread_rng;

    #[test]
    fn radius_easing_approaches_and_snaps() {
        let (r, done) = eased_radius(100.0, 200.0);
        assert!(!done);
        assert!((r - 102.0).abs() < 1e-3);

        let (r, done) = eased_radius(199.5, 200.0);
        assert!(done);
        assert_eq!(r, 200.0);
    }

    #[test]
    fn ellipse_point_stays_within_semi_major() {
        let cfg = SimConfig::default();
        let mut orbit = planet_orbit_for(Vec2::new(4000.0, 2000.0), &cfg, &mut thread_rng());
        for i in 0..100 {
            orbit.angle = i as f32 * 0.1;
            let p = ellipse_point(&orbit);
            assert!(p.distance(orbit.center) <= orbit.semi_major + 1.0);
        }
    }

    #[test]
    fn feather_is_zero_at_surface_and_one_far_out() {
        assert_eq!(surface_feather(500.0, 500.0, 4000.0), 0.0);
        assert_eq!(surface_feather(800.0, 500.0, 4000.0), 1.0);
        let mid = surface_feather(650.0, 500.0, 4000.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn capture_blends_toward_tangential_velocity() {
        let cfg = SimConfig::default();
        let planet = PlanetSnapshot {
            entity: Entity::PLACEHOLDER,
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            radius: 1000.0,
            mass: crate::body::mass_from_radius(1000.0),
            z: 0.0,
        };
        // Small asteroid sitting inside the capture band with zero velocity.
        let mut body =
            CelestialBody::asteroid(Vec2::new(1600.0, 0.0), Vec2::ZERO, cfg.asteroid_min_size);
        apply_planet_capture(&mut body, &[planet], &cfg);
        // Blend must introduce a tangential (y) component.
        assert!(body.vel.y.abs() > 0.0);
    }

    #[test]
    fn distant_asteroid_feels_no_pull() {
        let cfg = SimConfig::default();
        let planet = PlanetSnapshot {
            entity: Entity::PLACEHOLDER,
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            radius: 1000.0,
            mass: crate::body::mass_from_radius(1000.0),
            z: 0.0,
        };
        let mut body = CelestialBody::asteroid(Vec2::new(50_000.0, 0.0), Vec2::ZERO, 200.0);
        apply_planet_capture(&mut body, &[planet], &cfg);
        assert_eq!(body.vel, Vec2::ZERO);
    }
}
