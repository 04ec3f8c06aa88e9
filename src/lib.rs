//! Starlance simulation core
//!
//! A headless real-time space-combat simulation: celestial-body physics with
//! merge/split collisions, planet promotion and orbital dynamics, plus
//! autonomous fleets with formation and combat AI.

pub mod body;
pub mod collision;
pub mod combat_ai;
pub mod config;
pub mod constants;
pub mod dynamics;
pub mod error;
pub mod events;
pub mod formation_ai;
pub mod projectile;
pub mod scenario;
pub mod score;
pub mod simulation;
pub mod spatial_grid;
pub mod vessel;
pub mod weapons;
