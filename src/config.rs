//! Runtime simulation configuration loaded from `assets/sim.toml`.
//!
//! [`SimConfig`] is a Bevy [`Resource`] that mirrors every constant in
//! [`crate::constants`].  At startup, [`load_sim_config`] reads
//! `assets/sim.toml` and overwrites the defaults with any values present in
//! the file.  Missing keys fall back to the compile-time defaults, so a
//! minimal TOML can override just the constants you care about.
//!
//! ## Usage in systems
//!
//! Add `config: Res<SimConfig>` to any system parameter list and read values
//! with `config.gravity_const`, `config.sight_range`, etc.
//!
//! Keep `src/constants.rs` in sync: it remains the **authoritative default**
//! source used by `SimConfig::default()`.

use crate::constants::*;
use bevy::prelude::*;
use serde::Deserialize;

/// Runtime-tunable physics and gameplay configuration.
///
/// All fields default to the corresponding compile-time constant from
/// `src/constants.rs`.  Override any subset by setting the value in
/// `assets/sim.toml`.
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // ── World ────────────────────────────────────────────────────────────────
    pub world_bounds: f32,
    pub gravity_const: f32,
    pub max_z_depth: f32,
    pub boundary_correction: f32,
    pub boundary_tolerance: f32,

    // ── Spatial Grid ─────────────────────────────────────────────────────────
    pub grid_cell_size: f32,

    // ── Asteroids ────────────────────────────────────────────────────────────
    pub asteroid_max_size: f32,
    pub asteroid_min_size: f32,
    pub asteroid_max_speed: f32,
    pub asteroid_split_offset: f32,
    pub split_blink_frames: u32,

    // ── Attraction Band ──────────────────────────────────────────────────────
    pub attraction_asteroid: f32,
    pub attraction_giant: f32,
    pub attraction_planet: f32,

    // ── Planets ──────────────────────────────────────────────────────────────
    pub planet_limit: usize,
    pub planet_max_size: f32,
    pub planet_debris_count: usize,
    pub planet_gravity_range_factor: f32,
    pub planet_orbit_radius_factor: f32,

    // ── Ships ────────────────────────────────────────────────────────────────
    pub sight_range: f32,
    pub combat_orbit_distance: f32,
    pub separation_distance: f32,
    pub evolution_score_step: i64,
    pub ship_limit: usize,
    pub ship_resistance: i32,
    pub ship_size: f32,
    pub ship_max_speed: f32,
    pub friendly_hue: f32,
    pub bullet_primary_lifetime: f32,
    pub bullet_secondary_lifetime: f32,

    // ── Stations ─────────────────────────────────────────────────────────────
    pub station_resistance: i32,
    pub station_radius: f32,
    pub station_spawn_timer: f32,
    pub squad_size: usize,
    pub defender_capacity: usize,

    // ── Formation AI ─────────────────────────────────────────────────────────
    pub danger_scan_range: f32,
    pub critical_danger_range: f32,
    pub danger_shoot_range: f32,
    pub danger_dwell_frames: u32,
    pub collision_predict_frames: f32,
    pub projectile_predict_frames: f32,
    pub leader_cruise_speed: f32,
    pub player_join_range: f32,
    pub leader_join_range: f32,

    // ── Weapons ──────────────────────────────────────────────────────────────
    pub transformation_frames: u32,
    pub god_ring_safety_radius: f32,
    pub god_ring_max_r: f32,
    pub god_ring_growth: f32,
    pub god_ring_band: f32,
    pub god_ring_reload: f32,

    // ── Score Rewards ────────────────────────────────────────────────────────
    pub reward_asteroid: i64,
    pub reward_ship: i64,
    pub reward_station: i64,
    pub reward_planet: i64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            // World
            world_bounds: WORLD_BOUNDS,
            gravity_const: GRAVITY_CONST,
            max_z_depth: MAX_Z_DEPTH,
            boundary_correction: BOUNDARY_CORRECTION,
            boundary_tolerance: BOUNDARY_TOLERANCE,
            // Spatial Grid
            grid_cell_size: GRID_CELL_SIZE,
            // Asteroids
            asteroid_max_size: ASTEROID_MAX_SIZE,
            asteroid_min_size: ASTEROID_MIN_SIZE,
            asteroid_max_speed: ASTEROID_MAX_SPEED,
            asteroid_split_offset: ASTEROID_SPLIT_OFFSET,
            split_blink_frames: SPLIT_BLINK_FRAMES,
            // Attraction Band
            attraction_asteroid: ATTRACTION_ASTEROID,
            attraction_giant: ATTRACTION_GIANT,
            attraction_planet: ATTRACTION_PLANET,
            // Planets
            planet_limit: PLANET_LIMIT,
            planet_max_size: PLANET_MAX_SIZE,
            planet_debris_count: PLANET_DEBRIS_COUNT,
            planet_gravity_range_factor: PLANET_GRAVITY_RANGE_FACTOR,
            planet_orbit_radius_factor: PLANET_ORBIT_RADIUS_FACTOR,
            // Ships
            sight_range: SIGHT_RANGE,
            combat_orbit_distance: COMBAT_ORBIT_DISTANCE,
            separation_distance: SEPARATION_DISTANCE,
            evolution_score_step: EVOLUTION_SCORE_STEP,
            ship_limit: SHIP_LIMIT,
            ship_resistance: SHIP_RESISTANCE,
            ship_size: SHIP_SIZE,
            ship_max_speed: SHIP_MAX_SPEED,
            friendly_hue: FRIENDLY_HUE,
            bullet_primary_lifetime: BULLET_PRIMARY_LIFETIME,
            bullet_secondary_lifetime: BULLET_SECONDARY_LIFETIME,
            // Stations
            station_resistance: STATION_RESISTANCE,
            station_radius: STATION_RADIUS,
            station_spawn_timer: STATION_SPAWN_TIMER,
            squad_size: SQUAD_SIZE,
            defender_capacity: DEFENDER_CAPACITY,
            // Formation AI
            danger_scan_range: DANGER_SCAN_RANGE,
            critical_danger_range: CRITICAL_DANGER_RANGE,
            danger_shoot_range: DANGER_SHOOT_RANGE,
            danger_dwell_frames: DANGER_DWELL_FRAMES,
            collision_predict_frames: COLLISION_PREDICT_FRAMES,
            projectile_predict_frames: PROJECTILE_PREDICT_FRAMES,
            leader_cruise_speed: LEADER_CRUISE_SPEED,
            player_join_range: PLAYER_JOIN_RANGE,
            leader_join_range: LEADER_JOIN_RANGE,
            // Weapons
            transformation_frames: TRANSFORMATION_FRAMES,
            god_ring_safety_radius: GOD_RING_SAFETY_RADIUS,
            god_ring_max_r: GOD_RING_MAX_R,
            god_ring_growth: GOD_RING_GROWTH,
            god_ring_band: GOD_RING_BAND,
            god_ring_reload: GOD_RING_RELOAD,
            // Score Rewards
            reward_asteroid: REWARD_ASTEROID,
            reward_ship: REWARD_SHIP,
            reward_station: REWARD_STATION,
            reward_planet: REWARD_PLANET,
        }
    }
}

/// Startup system: attempt to load `assets/sim.toml` and overwrite the
/// `SimConfig` resource with any values present in the file.
///
/// Missing keys retain their compiled defaults.  TOML parse errors are printed
/// to stderr but do not abort the simulation.  A missing file is silently
/// ignored (defaults are already in place from `insert_resource`).
pub fn load_sim_config(mut config: ResMut<SimConfig>) {
    let path = "assets/sim.toml";
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<SimConfig>(&contents) {
            Ok(loaded) => {
                *config = loaded;
                println!("✓ Loaded sim config from {path}");
            }
            Err(e) => {
                eprintln!("⚠ Failed to parse {path}: {e}; using defaults");
            }
        },
        Err(_) => {
            // File not present — defaults are already in place; not an error.
            println!("ℹ No {path} found; using compiled defaults");
        }
    }

    // Loaded values that would destabilize the simulation fall back to their
    // compiled defaults, key by key.
    if let Err(e) = crate::error::validate_gravity_const(config.gravity_const) {
        eprintln!("⚠ {e}; using default");
        config.gravity_const = GRAVITY_CONST;
    }
    if let Err(e) = crate::error::validate_grid_cell_size(config.grid_cell_size, config.sight_range)
    {
        eprintln!("⚠ {e}; using default");
        config.grid_cell_size = GRID_CELL_SIZE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.grid_cell_size, GRID_CELL_SIZE);
        assert_eq!(cfg.planet_limit, PLANET_LIMIT);
        assert_eq!(cfg.evolution_score_step, EVOLUTION_SCORE_STEP);
    }

    #[test]
    fn partial_toml_overrides_only_named_keys() {
        let cfg: SimConfig = toml::from_str("sight_range = 1234.0").unwrap();
        assert_eq!(cfg.sight_range, 1234.0);
        assert_eq!(cfg.combat_orbit_distance, COMBAT_ORBIT_DISTANCE);
    }
}
