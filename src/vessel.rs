//! Vessel components (ships and stations) and their lifecycle systems.
//!
//! A vessel is either a ship or a station — one component, one enum, mirroring
//! the celestial-body model.  Stations anchor a faction to a host planet and
//! periodically release squads of stray ships; ships carry the AI state that
//! `combat_ai.rs` and `formation_ai.rs` drive.

use crate::body::{CelestialBody, Doomed};
use crate::config::SimConfig;
use crate::events::StationSpawnRequest;
use bevy::prelude::*;
use rand::Rng;
use std::collections::HashSet;

/// Faction identity.  Hue equality denotes same-fleet for hostile ships; the
/// friendly faction shares one reserved hue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Faction {
    pub friendly: bool,
    pub hue: f32,
}

impl Faction {
    pub fn allied(&self, other: &Faction) -> bool {
        if self.friendly && other.friendly {
            return true;
        }
        !self.friendly && !other.friendly && (self.hue - other.hue).abs() < 0.5
    }

    pub fn rival(&self, other: &Faction) -> bool {
        !self.allied(other)
    }
}

/// Behavioural state for the combat state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiState {
    Formation,
    Combat,
}

/// Defender ships stay near their home planet; strays roam and may join
/// formations.  Recomputed every frame from station capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Defender,
    Stray,
}

/// A formation-relative offset assignable to one wingman occupant.
#[derive(Debug, Clone, Copy)]
pub struct SquadSlot {
    pub offset: Vec2,
    pub occupant: Option<Entity>,
}

/// The standard six-slot wedge used by promoted leaders and the pilot squad.
pub fn standard_slot_layout() -> Vec<SquadSlot> {
    [
        Vec2::new(-150.0, -150.0),
        Vec2::new(150.0, -150.0),
        Vec2::new(-300.0, -300.0),
        Vec2::new(300.0, -300.0),
        Vec2::new(-450.0, -450.0),
        Vec2::new(450.0, -450.0),
    ]
    .into_iter()
    .map(|offset| SquadSlot {
        offset,
        occupant: None,
    })
    .collect()
}

/// Leader ships own slots; wingmen occupy one.
#[derive(Debug, Clone)]
pub enum ShipRole {
    Leader { slots: Vec<SquadSlot> },
    Wingman,
}

/// Per-ship AI bookkeeping.
#[derive(Debug, Clone)]
pub struct ShipAi {
    pub state: AiState,
    pub role: ShipRole,
    pub assignment: Assignment,
    /// Leader this ship follows; re-validated before every dereference.
    pub leader: Option<Entity>,
    pub squad_id: Option<u32>,
    pub formation_offset: Vec2,
    /// Station this ship defends; cleared when the station dies.
    pub home_station: Option<Entity>,
    /// Current combat target, if any.
    pub target: Option<Entity>,
    /// Consecutive frames an asteroid has been critically close.
    pub danger_timer: u32,
    /// Leader patrol destination.
    pub waypoint: Option<Vec2>,
}

impl ShipAi {
    pub fn stray() -> Self {
        Self {
            state: AiState::Formation,
            role: ShipRole::Wingman,
            assignment: Assignment::Stray,
            leader: None,
            squad_id: None,
            formation_offset: Vec2::ZERO,
            home_station: None,
            target: None,
            danger_timer: 0,
            waypoint: None,
        }
    }
}

/// Station-specific state: anchored to a host planet, orbiting slowly,
/// releasing squads on a timer.
#[derive(Debug, Clone)]
pub struct StationAnchor {
    pub host_planet: Entity,
    pub orbit_distance: f32,
    pub orbit_angle: f32,
    pub orbit_speed: f32,
    pub spawn_timer: f32,
}

/// Which kind of vessel this is.
#[derive(Debug, Clone)]
pub enum VesselKind {
    Ship(ShipAi),
    Station(StationAnchor),
}

/// A ship or station.
#[derive(Component, Debug, Clone)]
pub struct Vessel {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Heading in radians.
    pub heading: f32,
    pub radius: f32,
    pub hp: i32,
    /// Cosmetic grace frames after a shield hit.
    pub shield_hit: u32,
    pub faction: Faction,
    /// Frames until the next shot is allowed.
    pub reload: f32,
    pub bullet_speed: f32,
    pub bullet_size: f32,
    pub bullet_life: f32,
    pub score: i64,
    pub tier: u32,
    /// Frames left in the tier-12 metamorphosis; normal fire suppressed.
    pub transformation_timer: u32,
    pub blink: u32,
    pub kind: VesselKind,
}

impl Vessel {
    pub fn ship(&self) -> Option<&ShipAi> {
        match &self.kind {
            VesselKind::Ship(ai) => Some(ai),
            VesselKind::Station(_) => None,
        }
    }

    pub fn ship_mut(&mut self) -> Option<&mut ShipAi> {
        match &mut self.kind {
            VesselKind::Ship(ai) => Some(ai),
            VesselKind::Station(_) => None,
        }
    }

    pub fn station(&self) -> Option<&StationAnchor> {
        match &self.kind {
            VesselKind::Station(anchor) => Some(anchor),
            VesselKind::Ship(_) => None,
        }
    }

    pub fn station_mut(&mut self) -> Option<&mut StationAnchor> {
        match &mut self.kind {
            VesselKind::Station(anchor) => Some(anchor),
            VesselKind::Ship(_) => None,
        }
    }

    pub fn is_station(&self) -> bool {
        matches!(self.kind, VesselKind::Station(_))
    }
}

/// Marks the vessel driven by external commands rather than the AI.
#[derive(Component, Debug, Clone, Copy)]
pub struct PilotControlled;

/// Command inputs consumed from the (external) input layer each frame.
#[derive(Resource, Debug, Default)]
pub struct PilotCommand {
    pub thrust: Vec2,
    pub heading: Option<f32>,
    pub fire: bool,
}

/// Pilot standing with the friendly faction.
#[derive(Resource, Debug, Default)]
pub struct PilotState {
    /// Set on betrayal; friendly stations stop treating the pilot as kin.
    pub lone_wolf: bool,
    /// Spare hulls banked from station kills.
    pub lives: u32,
}

/// Monotonic squad-id source.  Parity of the id picks strafe direction in
/// combat, so consecutive squads alternate orbit direction.
#[derive(Resource, Debug, Default)]
pub struct NextSquadId(pub u32);

impl NextSquadId {
    pub fn take(&mut self) -> u32 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }
}

/// Hostile fleet hues avoid the blue band so factions stay distinct on radar.
pub fn hostile_fleet_hue(rng: &mut impl Rng) -> f32 {
    ((rng.gen_range(0.0..260.0) + 260.0) as u32 % 360) as f32
}

/// Spawn a stray ship belonging to `faction` near `pos`.
pub fn spawn_ship(
    commands: &mut Commands,
    pos: Vec2,
    vel: Vec2,
    heading: f32,
    faction: Faction,
    home_station: Option<Entity>,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> Entity {
    let mut ai = ShipAi::stray();
    ai.home_station = home_station;
    commands
        .spawn(Vessel {
            pos,
            vel,
            heading,
            radius: config.ship_size / 2.0,
            hp: config.ship_resistance,
            shield_hit: 0,
            faction,
            reload: rng.gen_range(100.0..200.0),
            bullet_speed: rng.gen_range(15.0..25.0),
            bullet_size: rng.gen_range(4.0..7.0),
            bullet_life: rng.gen_range(45.0..60.0),
            score: 0,
            tier: 0,
            transformation_timer: 0,
            blink: 30,
            kind: VesselKind::Ship(ai),
        })
        .id()
}

/// Spawn a station orbiting `planet`.
pub fn spawn_station(
    commands: &mut Commands,
    planet: Entity,
    planet_body: &CelestialBody,
    friendly: bool,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> Entity {
    let orbit_distance = planet_body.radius * 1.3 + config.station_radius;
    let orbit_angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let pos = planet_body.pos + Vec2::new(orbit_angle.cos(), orbit_angle.sin()) * orbit_distance;
    let hue = if friendly {
        config.friendly_hue
    } else {
        hostile_fleet_hue(rng)
    };
    let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

    commands
        .spawn(Vessel {
            pos,
            vel: planet_body.vel,
            heading: rng.gen_range(0.0..std::f32::consts::TAU),
            radius: config.station_radius,
            hp: config.station_resistance,
            shield_hit: 0,
            faction: Faction { friendly, hue },
            reload: 120.0,
            bullet_speed: 20.0,
            bullet_size: 6.0,
            bullet_life: 50.0,
            score: 0,
            tier: 0,
            transformation_timer: 0,
            blink: 60,
            kind: VesselKind::Station(StationAnchor {
                host_planet: planet,
                orbit_distance,
                orbit_angle,
                orbit_speed: direction * 0.002,
                spawn_timer: 180.0,
            }),
        })
        .id()
}

/// Handles station-spawn requests latched by the planet z cycle.
///
/// One station per planet: requests for planets that already anchor a live
/// station are dropped, matching the resource-limit policy of skipping
/// rather than erroring.
pub fn station_spawn_request_system(
    mut commands: Commands,
    mut requests: MessageReader<StationSpawnRequest>,
    config: Res<SimConfig>,
    home: Res<crate::body::HomePlanet>,
    pilot: Res<PilotState>,
    bodies: Query<&CelestialBody, Without<Doomed>>,
    vessels: Query<&Vessel, Without<Doomed>>,
) {
    let mut rng = rand::thread_rng();
    // Stations spawn through deferred commands, so duplicate requests in the
    // same frame must be deduped here, not against the live roster.
    let mut granted: HashSet<Entity> = HashSet::new();
    for request in requests.read() {
        let Ok(planet_body) = bodies.get(request.planet) else {
            continue;
        };
        if !planet_body.is_planet() {
            continue;
        }
        let already_anchored = granted.contains(&request.planet)
            || vessels.iter().any(|v| {
                v.station()
                    .is_some_and(|anchor| anchor.host_planet == request.planet)
            });
        if already_anchored {
            continue;
        }
        granted.insert(request.planet);

        let friendly = !pilot.lone_wolf && home.0 == Some(request.planet);
        spawn_station(
            &mut commands,
            request.planet,
            planet_body,
            friendly,
            &config,
            &mut rng,
        );
    }
}

/// Keeps stations glued to their host planet's orbit, ticks squad-release
/// timers, and tombstones stations whose planet has left the world.
pub fn station_update_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    bodies: Query<&CelestialBody, Without<Doomed>>,
    mut vessels: Query<(Entity, &mut Vessel), Without<Doomed>>,
) {
    let mut rng = rand::thread_rng();

    // Fleet headcounts for the squad-release caps.
    let mut friendly_ships = 0usize;
    let mut hostile_ships = 0usize;
    for (_, vessel) in vessels.iter() {
        if vessel.ship().is_some() {
            if vessel.faction.friendly {
                friendly_ships += 1;
            } else {
                hostile_ships += 1;
            }
        }
    }

    let mut squads_to_spawn: Vec<(Vec2, Vec2, Faction, Entity, f32)> = Vec::new();

    for (entity, mut vessel) in vessels.iter_mut() {
        let faction = vessel.faction;
        let radius = vessel.radius;
        let Some(anchor) = vessel.station_mut() else {
            continue;
        };

        let Ok(planet) = bodies.get(anchor.host_planet) else {
            // Host planet destroyed: the station goes down with it.
            commands.entity(entity).insert(Doomed);
            continue;
        };

        anchor.orbit_angle += anchor.orbit_speed;
        let offset =
            Vec2::new(anchor.orbit_angle.cos(), anchor.orbit_angle.sin()) * anchor.orbit_distance;

        anchor.spawn_timer -= 1.0;
        if anchor.spawn_timer <= 0.0 {
            anchor.spawn_timer =
                config.station_spawn_timer + rng.gen_range(0.0..config.station_spawn_timer);

            let (at_cap, cap) = if faction.friendly {
                (friendly_ships >= config.ship_limit, config.ship_limit)
            } else {
                // Hostile fleets get a larger global cap for balance.
                (
                    hostile_ships >= config.ship_limit * 3,
                    config.ship_limit * 3,
                )
            };
            if at_cap {
                println!(
                    "ℹ {}",
                    crate::error::SimError::LimitReached {
                        what: "squad",
                        limit: cap,
                    }
                );
            } else {
                squads_to_spawn.push((planet.pos + offset, planet.vel, faction, entity, radius));
                if faction.friendly {
                    friendly_ships += config.squad_size;
                } else {
                    hostile_ships += config.squad_size;
                }
            }
        }

        vessel.pos = planet.pos + offset;
        vessel.vel = planet.vel;
    }

    for (pos, vel, faction, station, radius) in squads_to_spawn {
        for _ in 0..config.squad_size {
            let spawn_dist = radius * 2.0 + rng.gen_range(0.0..50.0);
            let spawn_angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let ship_pos = pos + Vec2::new(spawn_angle.cos(), spawn_angle.sin()) * spawn_dist;
            let jitter = Vec2::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5));
            spawn_ship(
                &mut commands,
                ship_pos,
                vel + jitter,
                spawn_angle + std::f32::consts::PI,
                faction,
                Some(station),
                &config,
                &mut rng,
            );
        }
    }
}

/// Shared per-frame vessel bookkeeping: ship position integration, reload and
/// grace-timer decay.  Station positions are owned by
/// [`station_update_system`].
pub fn vessel_integrate_system(mut vessels: Query<&mut Vessel, Without<Doomed>>) {
    for mut vessel in vessels.iter_mut() {
        if !vessel.is_station() {
            let vel = vessel.vel;
            vessel.pos += vel;
        }
        if vessel.reload > 0.0 {
            vessel.reload -= 1.0;
        }
        if vessel.shield_hit > 0 {
            vessel.shield_hit -= 1;
        }
        if vessel.blink > 0 {
            vessel.blink -= 1;
        }
        if vessel.transformation_timer > 0 {
            vessel.transformation_timer -= 1;
        }
        // Degenerate velocities reset rather than propagate.
        if !vessel.vel.is_finite() {
            vessel.vel = Vec2::ZERO;
        }
        if !vessel.pos.is_finite() {
            vessel.pos = Vec2::ZERO;
        }
    }
}

/// Applies pilot thrust/heading/fire commands to the pilot-controlled vessel.
///
/// The pilot fires on its progressive tier and skips the AI's ally-safety
/// scan; pulling the trigger near friends is the pilot's own problem (and the
/// betrayal system's).
pub fn pilot_command_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    command: Res<PilotCommand>,
    mut pilots: Query<(Entity, &mut Vessel), With<PilotControlled>>,
) {
    for (entity, mut vessel) in pilots.iter_mut() {
        vessel.vel += command.thrust;
        if let Some(heading) = command.heading {
            vessel.heading = heading;
        }
        if command.fire && vessel.reload <= 0.0 {
            if vessel.tier >= 12 {
                if vessel.transformation_timer == 0 {
                    crate::weapons::fire_god_ring(&mut commands, entity, &mut vessel, &config);
                }
            } else {
                let tier = vessel.tier;
                crate::weapons::fire_volley(&mut commands, entity, &vessel, tier, &config);
                vessel.reload = 30.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faction_allied_rules() {
        let friendly = Faction {
            friendly: true,
            hue: 210.0,
        };
        let red = Faction {
            friendly: false,
            hue: 0.0,
        };
        let red_too = Faction {
            friendly: false,
            hue: 0.0,
        };
        let green = Faction {
            friendly: false,
            hue: 120.0,
        };

        assert!(friendly.allied(&friendly));
        assert!(red.allied(&red_too));
        assert!(red.rival(&green));
        assert!(friendly.rival(&red));
    }

    #[test]
    fn hostile_hue_avoids_blue_band() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let hue = hostile_fleet_hue(&mut rng);
            assert!(!(160.0..260.0).contains(&hue), "hue {hue} is in blue band");
        }
    }

    #[test]
    fn slot_layout_has_six_empty_slots() {
        let slots = standard_slot_layout();
        assert_eq!(slots.len(), 6);
        assert!(slots.iter().all(|s| s.occupant.is_none()));
    }

    #[test]
    fn squad_ids_alternate_parity() {
        let mut ids = NextSquadId::default();
        let a = ids.take();
        let b = ids.take();
        assert_ne!(a % 2, b % 2);
    }
}
