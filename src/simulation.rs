//! Simulation plugin: resources, message registration, and the fixed system
//! order for one frame of the world.

use crate::body::{HomePlanet, PlanetBudget};
use crate::collision::{body_collision_system, compact_doomed_system};
use crate::combat_ai::{ai_state_transition_system, combat_steering_system, proactive_scanner_system};
use crate::config::{load_sim_config, SimConfig};
use crate::dynamics::{body_dynamics_system, pilot_gravity_system, ActivePlanets};
use crate::events::{
    BetrayalTriggered, BodyDestroyed, HomePlanetLost, KillCredit, StationSpawnRequest, TierChanged,
    VesselDestroyed, Victory,
};
use crate::formation_ai::{
    defender_orbit_system, leader_patrol_system, role_assignment_system, squad_membership_system,
    wingman_steering_system,
};
use crate::projectile::{projectile_hit_system, projectile_update_system};
use crate::score::{
    score_progression_system, station_wreck_system, victory_system, VictoryLatch,
};
use crate::spatial_grid::{rebuild_spatial_grid_system, SpatialGrid};
use crate::vessel::{
    pilot_command_system, station_spawn_request_system, station_update_system,
    vessel_integrate_system, NextSquadId, PilotCommand, PilotState,
};
use crate::weapons::shockwave_update_system;
use bevy::prelude::*;

/// Frame phases, chained.  Physics settles positions before the AI reads
/// them; weapons resolve before scoring consumes the kill credits.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimSet {
    Physics,
    Ai,
    Vessels,
    Weapons,
    Scoring,
}

pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SimConfig::default())
            .insert_resource(SpatialGrid::new(crate::constants::GRID_CELL_SIZE))
            .insert_resource(ActivePlanets::default())
            .insert_resource(HomePlanet::default())
            .insert_resource(PlanetBudget::default())
            .insert_resource(PilotCommand::default())
            .insert_resource(PilotState::default())
            .insert_resource(NextSquadId::default())
            .insert_resource(VictoryLatch::default())
            .add_message::<BodyDestroyed>()
            .add_message::<VesselDestroyed>()
            .add_message::<HomePlanetLost>()
            .add_message::<TierChanged>()
            .add_message::<BetrayalTriggered>()
            .add_message::<Victory>()
            .add_message::<KillCredit>()
            .add_message::<StationSpawnRequest>()
            .add_systems(Startup, load_sim_config)
            .configure_sets(
                Update,
                (
                    SimSet::Physics,
                    SimSet::Ai,
                    SimSet::Vessels,
                    SimSet::Weapons,
                    SimSet::Scoring,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    body_dynamics_system,
                    rebuild_spatial_grid_system,
                    body_collision_system,
                )
                    .chain()
                    .in_set(SimSet::Physics),
            )
            .add_systems(
                Update,
                (
                    role_assignment_system,
                    squad_membership_system,
                    ai_state_transition_system,
                    combat_steering_system,
                    proactive_scanner_system,
                    leader_patrol_system,
                    wingman_steering_system,
                    defender_orbit_system,
                )
                    .chain()
                    .in_set(SimSet::Ai),
            )
            .add_systems(
                Update,
                (
                    station_spawn_request_system,
                    station_update_system,
                    pilot_command_system,
                    pilot_gravity_system,
                    vessel_integrate_system,
                )
                    .chain()
                    .in_set(SimSet::Vessels),
            )
            .add_systems(
                Update,
                (
                    projectile_update_system,
                    projectile_hit_system,
                    shockwave_update_system,
                )
                    .chain()
                    .in_set(SimSet::Weapons),
            )
            .add_systems(
                Update,
                (score_progression_system, station_wreck_system, victory_system)
                    .chain()
                    .in_set(SimSet::Scoring),
            )
            // Tombstones are collected after every Update system has had its
            // look at the dying entities.
            .add_systems(PostUpdate, compact_doomed_system);
    }
}
