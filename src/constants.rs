//! Centralised physics and gameplay constants.
//!
//! All tuneable values live here so they can be found, reasoned-about, and
//! modified in one place without source-diving across multiple modules.
//! [`crate::config::SimConfig`] mirrors every value and can override any
//! subset from `assets/sim.toml` at startup.
//!
//! ## Tuning guidance
//!
//! Each constant includes its observable consequence where it is not obvious.
//! Gains and timers are per-frame at the simulation's 60 fps step.

// ── World ─────────────────────────────────────────────────────────────────────

/// Half-extent of the playable square, in world units.
///
/// Bodies drifting past `WORLD_BOUNDS − BOUNDARY_TOLERANCE` receive a
/// corrective deceleration pushing them back toward the origin.
pub const WORLD_BOUNDS: f32 = 20_000.0;

/// Inverse-square gravity strength constant for body↔body attraction.
pub const GRAVITY_CONST: f32 = 0.9;

/// Maximum z-depth a planet reaches before bouncing back toward the
/// interaction plane.  z = 0 is the plane; larger is further behind it.
pub const MAX_Z_DEPTH: f32 = 2.0;

/// Per-frame corrective force applied to out-of-bounds bodies.
pub const BOUNDARY_CORRECTION: f32 = 0.05;

/// Bodies may overshoot the world edge by this much before correction kicks in.
pub const BOUNDARY_TOLERANCE: f32 = 1_000.0;

// ── Spatial Grid ──────────────────────────────────────────────────────────────

/// Cell edge length for the broad-phase grid.
///
/// Chosen equal to the ship sight range so a 3×3 neighbourhood covers every
/// interaction query in the simulation.  Shrinking it below the largest planet
/// diameter (2 × `PLANET_MAX_SIZE`) would reintroduce false negatives for
/// planet-sized bodies, which is why planets are matched pairwise instead of
/// through the grid.
pub const GRID_CELL_SIZE: f32 = 2_000.0;

// ── Asteroids ─────────────────────────────────────────────────────────────────

/// Radius at or above which an asteroid counts as a "giant" and becomes
/// eligible for planet promotion on merge.
pub const ASTEROID_MAX_SIZE: f32 = 450.0;

/// Minimum asteroid radius.  Fragments that would come out smaller than this
/// are dropped rather than spawned.
pub const ASTEROID_MIN_SIZE: f32 = 90.0;

/// Global speed clamp for asteroids (units/frame).
pub const ASTEROID_MAX_SPEED: f32 = 10.0;

/// Lateral displacement applied to split fragments and destruction junk so
/// children do not spawn overlapping their sibling.
pub const ASTEROID_SPLIT_OFFSET: f32 = 300.0;

/// Frames of interaction exemption granted to fresh fragments.
pub const SPLIT_BLINK_FRAMES: u32 = 30;

// ── Attraction Band ───────────────────────────────────────────────────────────
//
// Bodies inside 3×(r1+r2) of each other but not yet touching exchange a
// pairwise pull so approaching pairs visibly drift together before contact.
// The giant/normal constants differ by ~60×; this is a balance tunable, not a
// physical law — giants need the stronger pull to sweep their neighbourhood.

/// Attraction multiplier between two ordinary asteroids.
pub const ATTRACTION_ASTEROID: f32 = 0.08;

/// Attraction multiplier when either asteroid in the pair is a giant.
pub const ATTRACTION_GIANT: f32 = 5.0;

/// Attraction multiplier between two planets (on top of `GRAVITY_CONST`).
pub const ATTRACTION_PLANET: f32 = 15.0;

// ── Planets ───────────────────────────────────────────────────────────────────

/// Maximum simultaneous live planets.  Giant merges that would exceed this
/// produce an oversized asteroid instead of a promotion.
pub const PLANET_LIMIT: usize = 20;

/// Radius cap for planets; growth from absorbed asteroids saturates here.
pub const PLANET_MAX_SIZE: f32 = 3_000.0;

/// Hot debris fragments emitted when two planets annihilate each other.
pub const PLANET_DEBRIS_COUNT: usize = 25;

/// Multiple of a planet's radius within which asteroids feel its pull.
pub const PLANET_GRAVITY_RANGE_FACTOR: f32 = 8.0;

/// Multiple of a planet's radius marking the stable capture-orbit band.
pub const PLANET_ORBIT_RADIUS_FACTOR: f32 = 1.5;

// ── Ships ─────────────────────────────────────────────────────────────────────

/// Distance at which a rival vessel flips a ship from FORMATION to COMBAT.
/// The reverse transition requires 1.5× this distance (hysteresis).
pub const SIGHT_RANGE: f32 = 2_000.0;

/// Preferred orbit distance from the current combat target.
pub const COMBAT_ORBIT_DISTANCE: f32 = 340.0;

/// Same-faction ships closer than this push each other apart.
pub const SEPARATION_DISTANCE: f32 = 30.0;

/// Score required per evolution tier (progressive above tier 7).
pub const EVOLUTION_SCORE_STEP: i64 = 1_000;

/// Global cap on friendly ships.  Hostile fleets get 3× this for balance.
pub const SHIP_LIMIT: usize = 70;

/// Hull hit points for a freshly spawned ship.
pub const SHIP_RESISTANCE: i32 = 2;

/// Ship bounding diameter (world units); collision radius is half this.
pub const SHIP_SIZE: f32 = 50.0;

/// Absolute speed cap for any ship; tier-12 hulls may hit twice this.
pub const SHIP_MAX_SPEED: f32 = 90.0;

/// Hue reserved for the friendly faction.  Hostile fleets roll hues outside
/// the blue band so factions stay visually distinct.
pub const FRIENDLY_HUE: f32 = 210.0;

/// Lifetime (frames) of primary-pattern projectiles.
pub const BULLET_PRIMARY_LIFETIME: f32 = 60.0;

/// Lifetime (frames) of secondary (wide-angle) projectiles.
pub const BULLET_SECONDARY_LIFETIME: f32 = 20.0;

// ── Stations ──────────────────────────────────────────────────────────────────

/// Hull hit points for a station.
pub const STATION_RESISTANCE: i32 = 6;

/// Station collision radius.
pub const STATION_RADIUS: f32 = 70.0;

/// Base frames between squad releases from a station (plus equal random fuzz).
pub const STATION_SPAWN_TIMER: f32 = 300.0;

/// Ships released per squad spawn.
pub const SQUAD_SIZE: usize = 7;

/// Live ships per station classified as defenders; the rest become strays.
pub const DEFENDER_CAPACITY: usize = 7;

// ── Formation AI ──────────────────────────────────────────────────────────────

/// Range at which a wingman starts tracking an asteroid as a danger.
pub const DANGER_SCAN_RANGE: f32 = 400.0;

/// Range inside which a persistent danger forces squad abandonment.
pub const CRITICAL_DANGER_RANGE: f32 = 200.0;

/// Range inside which a wingman will fire on a threatening asteroid.
pub const DANGER_SHOOT_RANGE: f32 = 600.0;

/// Frames a critical danger must persist before the wingman abandons its squad.
pub const DANGER_DWELL_FRAMES: u32 = 30;

/// Look-ahead horizon (frames) for linear collision prediction vs asteroids.
pub const COLLISION_PREDICT_FRAMES: f32 = 60.0;

/// Look-ahead horizon (frames) for incoming-projectile dodging.
pub const PROJECTILE_PREDICT_FRAMES: f32 = 30.0;

/// Leader patrol cruise speed (units/frame).
pub const LEADER_CRUISE_SPEED: f32 = 12.0;

/// Friendly strays inside this range may claim a slot in the pilot's squad.
pub const PLAYER_JOIN_RANGE: f32 = 1_500.0;

/// Unattached ships inside this range may claim a slot on an NPC leader.
pub const LEADER_JOIN_RANGE: f32 = 300.0;

// ── Weapons ───────────────────────────────────────────────────────────────────

/// Frames the tier-12 metamorphosis takes; normal fire is suppressed meanwhile.
pub const TRANSFORMATION_FRAMES: u32 = 600;

/// Radius the god ring must verify clear of allies before an AI fires it.
pub const GOD_RING_SAFETY_RADIUS: f32 = 2_500.0;

/// Expansion cutoff for the god ring.
pub const GOD_RING_MAX_R: f32 = 6_000.0;

/// God-ring radial growth per frame.
pub const GOD_RING_GROWTH: f32 = 120.0;

/// Destruction band width of the god ring's leading edge.
pub const GOD_RING_BAND: f32 = 600.0;

/// Reload (frames) imposed on a vessel after firing the god ring.
pub const GOD_RING_RELOAD: f32 = 300.0;

// ── Score Rewards ─────────────────────────────────────────────────────────────

pub const REWARD_ASTEROID: i64 = 100;
pub const REWARD_SHIP: i64 = 200;
pub const REWARD_STATION: i64 = 500;
pub const REWARD_PLANET: i64 = 1_000;
