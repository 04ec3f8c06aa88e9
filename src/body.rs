//! Celestial body components and spawn helpers.
//!
//! A body is either an asteroid or a planet — one component, one explicit
//! enum, so the collision branch table in `collision.rs` can match
//! exhaustively.  "Giant" is not a stored flag: it is derived from radius so
//! it can never go stale as bodies grow or shrink.

use crate::config::SimConfig;
use bevy::prelude::*;
use rand::Rng;

/// Mass is always derived from radius, never stored independently of it.
pub fn mass_from_radius(radius: f32) -> f32 {
    radius * radius * 0.05
}

/// Orbital parameters for a planet.  Planets ride a rotated ellipse around a
/// per-planet center rather than integrating gravity against each other.
#[derive(Debug, Clone)]
pub struct PlanetOrbit {
    pub center: Vec2,
    pub semi_major: f32,
    pub semi_minor: f32,
    pub eccentricity: f32,
    /// Current eccentric anomaly (radians).
    pub angle: f32,
    /// Orientation of the ellipse in world space.
    pub rotation: f32,
    /// Angular advance per frame; sign encodes direction.
    pub angular_speed: f32,
    /// Frames left to dwell at the far point of the z cycle.
    pub z_wait: u32,
    /// One station-spawn attempt per z cycle; reset above z = 1.0.
    pub station_latched: bool,
}

/// Which kind of celestial body this is.
#[derive(Debug, Clone)]
pub enum BodyKind {
    Asteroid,
    Planet(PlanetOrbit),
}

/// A celestial body: asteroid or planet.
#[derive(Component, Debug, Clone)]
pub struct CelestialBody {
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    /// When set, `radius` eases toward this value by 2% per frame.
    pub target_radius: Option<f32>,
    pub mass: f32,
    /// 0 = interaction plane, >0 = background (excluded from collision and
    /// gravity by callers).
    pub z: f32,
    pub z_speed: f32,
    /// Frames of post-spawn interaction exemption remaining.
    pub blink: u32,
    pub kind: BodyKind,
}

impl CelestialBody {
    pub fn asteroid(pos: Vec2, vel: Vec2, radius: f32) -> Self {
        Self {
            pos,
            vel,
            radius,
            target_radius: None,
            mass: mass_from_radius(radius),
            z: 0.0,
            z_speed: 0.0,
            blink: 0,
            kind: BodyKind::Asteroid,
        }
    }

    pub fn is_planet(&self) -> bool {
        matches!(self.kind, BodyKind::Planet(_))
    }

    /// A giant is an asteroid at or above the max non-planet radius,
    /// eligible for planet promotion on merge.
    pub fn is_giant(&self, config: &SimConfig) -> bool {
        matches!(self.kind, BodyKind::Asteroid) && self.radius >= config.asteroid_max_size
    }

    /// On the interaction plane: collides, attracts, and is grid-inserted.
    pub fn on_plane(&self) -> bool {
        self.z < 0.5
    }

    /// Set a new radius directly, keeping mass consistent.
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
        self.mass = mass_from_radius(radius);
    }
}

/// Tombstone marker: the body (or vessel) is dead but stays in storage until
/// the end-of-frame compaction pass so no system removes entities
/// mid-iteration.
#[derive(Component, Debug, Clone, Copy)]
pub struct Doomed;

/// The planet the friendly faction calls home, when one exists.
#[derive(Resource, Debug, Default)]
pub struct HomePlanet(pub Option<Entity>);

/// Live planet budget.  Starts at `planet_limit` and is reduced by 2 every
/// planet-on-planet annihilation, cooling down repopulation after cataclysms.
#[derive(Resource, Debug)]
pub struct PlanetBudget {
    pub limit: usize,
}

impl Default for PlanetBudget {
    fn default() -> Self {
        Self {
            limit: crate::constants::PLANET_LIMIT,
        }
    }
}

/// Build the orbital parameters for a planet at `pos`.
///
/// The orbit center is offset up to 30% of the world bounds from the origin;
/// the semi-major axis derives from the planet's current distance to that
/// center so the ellipse passes near the spawn position.
pub fn planet_orbit_for(pos: Vec2, config: &SimConfig, rng: &mut impl Rng) -> PlanetOrbit {
    let center_dist = rng.gen_range(0.0..config.world_bounds * 0.3);
    let center_ang = rng.gen_range(0.0..std::f32::consts::TAU);
    let center = Vec2::new(center_ang.cos(), center_ang.sin()) * center_dist;

    let from_center = pos - center;
    let dist = from_center.length();
    let semi_major = (dist * rng.gen_range(0.8..1.2)).max(1000.0);
    let eccentricity: f32 = rng.gen_range(0.1..0.7);
    let semi_minor = semi_major * (1.0 - eccentricity * eccentricity).sqrt();

    // Slower for larger orbits (Kepler's third law, loosely).
    let base_orbit_speed = 0.5;
    let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

    PlanetOrbit {
        center,
        semi_major,
        semi_minor,
        eccentricity,
        angle: from_center.y.atan2(from_center.x),
        rotation: rng.gen_range(0.0..std::f32::consts::TAU),
        angular_speed: (base_orbit_speed / semi_major) * direction,
        z_wait: 0,
        station_latched: false,
    }
}

/// Promote an asteroid in place to a planet: orbit attributes initialized,
/// z cycle started.  The caller is responsible for checking the planet budget.
pub fn promote_to_planet(body: &mut CelestialBody, config: &SimConfig, rng: &mut impl Rng) {
    let orbit = planet_orbit_for(body.pos, config, rng);
    body.z_speed = rng.gen_range(0.0005..0.0015);
    body.kind = BodyKind::Planet(orbit);
}

/// Small random per-axis drift applied to freshly spawned asteroids.
fn drift_component(rng: &mut impl Rng) -> f32 {
    let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    (0.1 + rng.gen_range(0.0..0.09)) * sign
}

/// Spawn a plain asteroid with small random drift, as belt generation does.
pub fn spawn_asteroid(
    commands: &mut Commands,
    pos: Vec2,
    radius: f32,
    rng: &mut impl Rng,
) -> Entity {
    let vel = Vec2::new(drift_component(rng), drift_component(rng));
    commands
        .spawn(CelestialBody::asteroid(pos, vel, radius))
        .id()
}

/// Spawn a ring of asteroids between `inner` and `outer` radius around `center`
/// with a gentle tangential drift, half at 50% and half at 25% of max size.
pub fn spawn_asteroid_belt(
    commands: &mut Commands,
    center: Vec2,
    inner: f32,
    outer: f32,
    count: usize,
    config: &SimConfig,
    rng: &mut impl Rng,
) {
    for _ in 0..count {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let dist = rng.gen_range(inner..outer);
        let pos = center + Vec2::new(angle.cos(), angle.sin()) * dist;
        let radius = if rng.gen_bool(0.5) { 0.5 } else { 0.25 } * config.asteroid_max_size;

        let tangent = angle + std::f32::consts::FRAC_PI_2;
        let orbital_speed =
            rng.gen_range(0.2..0.5) * if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let vel = Vec2::new(drift_component(rng), drift_component(rng))
            + Vec2::new(tangent.cos(), tangent.sin()) * orbital_speed;

        commands.spawn(CelestialBody::asteroid(pos, vel, radius));
    }
}

/// Spawn a planet directly (world setup / scenarios).
pub fn spawn_planet(
    commands: &mut Commands,
    pos: Vec2,
    radius: f32,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> Entity {
    let mut body = CelestialBody::asteroid(pos, Vec2::ZERO, radius);
    promote_to_planet(&mut body, config, rng);
    commands.spawn(body).id()
}

/// Spawn the hot debris field left by a planet-on-planet annihilation.
///
/// Fragments are spread widely so they do not immediately re-collide into a
/// splitting cascade, and blink for two seconds while dispersing.
pub fn spawn_planet_debris(
    commands: &mut Commands,
    center: Vec2,
    config: &SimConfig,
    rng: &mut impl Rng,
) {
    for _ in 0..config.planet_debris_count {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let offset = rng.gen_range(0.0..600.0);
        let pos = center + Vec2::new(angle.cos(), angle.sin()) * offset;

        // Keep debris below giant size to avoid instant promotion chains.
        let max_debris = config.asteroid_max_size * 0.5;
        let radius = rng.gen_range(config.asteroid_min_size..max_debris);

        let speed = rng.gen_range(0.5..1.0) * config.asteroid_max_speed * 4.0;
        let vel = Vec2::new(angle.cos(), angle.sin()) * speed;

        let mut body = CelestialBody::asteroid(pos, vel, radius);
        body.blink = 120;
        commands.spawn(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn mass_tracks_radius() {
        let mut body = CelestialBody::asteroid(Vec2::ZERO, Vec2::ZERO, 40.0);
        assert!((body.mass - 80.0).abs() < 1e-3);
        body.set_radius(100.0);
        assert!((body.mass - 500.0).abs() < 1e-3);
    }

    #[test]
    fn giant_classification_uses_config_threshold() {
        let cfg = SimConfig::default();
        let small = CelestialBody::asteroid(Vec2::ZERO, Vec2::ZERO, 100.0);
        let giant = CelestialBody::asteroid(Vec2::ZERO, Vec2::ZERO, cfg.asteroid_max_size);
        assert!(!small.is_giant(&cfg));
        assert!(giant.is_giant(&cfg));
    }

    #[test]
    fn planets_are_never_giants() {
        let cfg = SimConfig::default();
        let mut body = CelestialBody::asteroid(Vec2::ZERO, Vec2::ZERO, cfg.asteroid_max_size * 2.0);
        promote_to_planet(&mut body, &cfg, &mut thread_rng());
        assert!(body.is_planet());
        assert!(!body.is_giant(&cfg));
    }

    #[test]
    fn orbit_semi_axes_are_consistent() {
        let cfg = SimConfig::default();
        let orbit = planet_orbit_for(Vec2::new(5000.0, 0.0), &cfg, &mut thread_rng());
        let expected = orbit.semi_major * (1.0 - orbit.eccentricity * orbit.eccentricity).sqrt();
        assert!((orbit.semi_minor - expected).abs() < 1e-3);
        assert!(orbit.semi_major >= 1000.0);
    }
}
