//! Simulation event messages.
//!
//! The core's observable outcomes are published as buffered Bevy messages so
//! outer layers (rendering, audio, harness verification) can consume them
//! without reaching into simulation internals.  All messages are fire-and-
//! forget: the core never reads its own `BodyDestroyed`/`VesselDestroyed`
//! streams except for score attribution.

use bevy::prelude::*;

/// Why a home planet was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeLossCause {
    /// Vaporized by the pilot's own god ring.
    Player,
    /// Destroyed by a hostile vessel's weapon.
    Enemy,
    /// Annihilated in a planet-on-planet collision.
    Collision,
}

/// A celestial body was tombstoned this frame.
#[derive(Message, Debug, Clone, Copy)]
pub struct BodyDestroyed {
    pub entity: Entity,
    pub was_planet: bool,
    pub pos: Vec2,
    pub radius: f32,
}

/// A ship or station reached zero hull (or was vaporized).
#[derive(Message, Debug, Clone, Copy)]
pub struct VesselDestroyed {
    pub entity: Entity,
    pub was_station: bool,
    pub friendly: bool,
    pub pos: Vec2,
    /// The vessel credited with the kill, when attributable.
    pub killer: Option<Entity>,
}

/// The designated home planet left the world.
#[derive(Message, Debug, Clone, Copy)]
pub struct HomePlanetLost {
    pub cause: HomeLossCause,
}

/// A vessel's evolution tier changed.
#[derive(Message, Debug, Clone, Copy)]
pub struct TierChanged {
    pub vessel: Entity,
    pub from: u32,
    pub to: u32,
}

/// The pilot destroyed a friendly vessel; every friendly ship turns hostile.
#[derive(Message, Debug, Clone, Copy)]
pub struct BetrayalTriggered;

/// Zero non-planet bodies remain live.  Fired at most once per run.
#[derive(Message, Debug, Clone, Copy)]
pub struct Victory;

/// Internal: score attribution for a kill, consumed by the progression system.
#[derive(Message, Debug, Clone, Copy)]
pub struct KillCredit {
    pub killer: Entity,
    pub reward: i64,
    /// True when the victim was a friendly vessel (betrayal trigger when the
    /// killer is the pilot).
    pub victim_friendly_vessel: bool,
}

/// Internal: a planet's z-cycle latched a station-spawn attempt.
#[derive(Message, Debug, Clone, Copy)]
pub struct StationSpawnRequest {
    pub planet: Entity,
}
