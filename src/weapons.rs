//! Tiered weapon patterns, the god ring, and shockwave propagation.
//!
//! Tiers 0–11 fire a symmetric fan whose count, spread, and scaling step up
//! per the fixed pattern table below.  Tier 12 replaces the fan entirely with
//! the god ring: an expanding band that vaporizes everything it touches
//! except its owner.

use crate::body::{CelestialBody, Doomed, HomePlanet};
use crate::config::SimConfig;
use crate::events::{
    BodyDestroyed, HomeLossCause, HomePlanetLost, KillCredit, VesselDestroyed,
};
use crate::projectile::Projectile;
use crate::vessel::{PilotControlled, Vessel};
use bevy::prelude::*;

/// An expanding pressure ring.
///
/// Plain blasts (planet deaths, station deaths) knock bodies around; the god
/// ring variant vaporizes instead.
#[derive(Component, Debug, Clone)]
pub struct Shockwave {
    pub origin: Vec2,
    pub radius: f32,
    pub max_radius: f32,
    pub alpha: f32,
    pub strength: f32,
    pub god_ring: bool,
    /// Immune to its own ring; receives kill credit.
    pub owner: Option<Entity>,
}

impl Shockwave {
    /// A conventional blast wave.
    pub fn blast(origin: Vec2) -> Self {
        Self {
            origin,
            radius: 10.0,
            max_radius: 1200.0,
            alpha: 1.0,
            strength: 30.0,
            god_ring: false,
            owner: None,
        }
    }

    /// The tier-12 ultimate weapon.
    pub fn god_ring(origin: Vec2, owner: Entity, config: &SimConfig) -> Self {
        Self {
            origin,
            radius: 100.0,
            max_radius: config.god_ring_max_r,
            alpha: 3.0,
            strength: 2000.0,
            god_ring: true,
            owner: Some(owner),
        }
    }
}

/// Angular offsets (radians) and primary/secondary flags for one volley.
///
/// Tier names from the pilot's evolution ladder; counts climb 1 → 21.
pub fn tier_pattern(tier: u32) -> Vec<(f32, bool)> {
    let mut shots = Vec::new();
    let mut fan = |count: u32, step: f32| {
        shots.push((0.0, true));
        for i in 1..=count {
            shots.push((i as f32 * step, true));
            shots.push((-(i as f32) * step, true));
        }
    };
    match tier {
        11 => fan(10, 0.02),
        10 => fan(6, 0.04),
        9 => fan(3, 0.08),
        8 => fan(2, 0.12),
        7 => {
            shots.extend([
                (0.0, true),
                (0.1, true),
                (-0.1, true),
                (0.2, false),
                (-0.2, false),
                (0.3, false),
                (-0.3, false),
            ]);
        }
        6 => {
            shots.extend([
                (0.0, true),
                (0.12, true),
                (-0.12, true),
                (0.24, false),
                (-0.24, false),
            ]);
        }
        5 => {
            shots.extend([
                (0.0, true),
                (0.15, true),
                (-0.15, true),
                (0.3, false),
                (-0.3, false),
            ]);
        }
        4 => shots.extend([(0.0, true), (0.2, false), (-0.2, false)]),
        3 => shots.extend([(0.0, true), (0.1, true), (-0.1, true)]),
        2 => shots.extend([(0.0, true), (0.0, true)]),
        _ => shots.push((0.0, true)),
    }
    shots
}

/// Per-tier projectile speed multiplier.
pub fn speed_scale(tier: u32) -> f32 {
    1.0 + tier as f32 * 0.1
}

/// Per-tier projectile size multiplier.
pub fn size_scale(tier: u32) -> f32 {
    1.0 + tier as f32 * 0.18
}

/// Spawn one fan volley from `firer`.  The caller has already decided the
/// shot is allowed (reload, cone, occlusion); this only builds projectiles.
pub fn fire_volley(
    commands: &mut Commands,
    firer: Entity,
    vessel: &Vessel,
    tier: u32,
    config: &SimConfig,
) {
    let visual_scale = 1.0 + tier as f32 * 0.1;
    let spawn_radius = vessel.radius * visual_scale + 20.0;
    let forward = Vec2::new(vessel.heading.cos(), vessel.heading.sin());
    let origin = vessel.pos + forward * spawn_radius;

    for (offset, primary) in tier_pattern(tier) {
        let angle = vessel.heading + offset;
        let dir = Vec2::new(angle.cos(), angle.sin());
        let life = if primary {
            vessel.bullet_life
        } else {
            config.bullet_secondary_lifetime
        };
        commands.spawn(Projectile {
            pos: origin,
            vel: dir * vessel.bullet_speed * speed_scale(tier) + vessel.vel,
            heading: angle,
            life,
            size: vessel.bullet_size * size_scale(tier),
            tier,
            friendly: vessel.faction.friendly,
            hue: vessel.faction.hue,
            owner: Some(firer),
            ignore_gravity: tier >= 8,
        });
    }
}

/// Fire the tier-12 ring and put the firer on its long cooldown.
pub fn fire_god_ring(commands: &mut Commands, firer: Entity, vessel: &mut Vessel, config: &SimConfig) {
    commands.spawn(Shockwave::god_ring(vessel.pos, firer, config));
    vessel.reload = config.god_ring_reload;
}

/// Expands and ages every shockwave, applying knockback (plain blasts) or
/// vaporization with kill credit (god rings) inside the leading band.
pub fn shockwave_update_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut home: ResMut<HomePlanet>,
    mut waves: Query<(Entity, &mut Shockwave)>,
    mut bodies: Query<(Entity, &mut CelestialBody), Without<Doomed>>,
    mut vessels: Query<(Entity, &mut Vessel), Without<Doomed>>,
    pilots: Query<(), With<PilotControlled>>,
    mut body_destroyed: MessageWriter<BodyDestroyed>,
    mut vessel_destroyed: MessageWriter<VesselDestroyed>,
    mut home_lost: MessageWriter<HomePlanetLost>,
    mut credit: MessageWriter<KillCredit>,
) {
    for (wave_entity, mut wave) in waves.iter_mut() {
        let band = if wave.god_ring {
            wave.radius += config.god_ring_growth;
            wave.alpha -= 0.003;
            config.god_ring_band
        } else {
            wave.radius += 15.0;
            wave.alpha -= 0.01;
            30.0
        };

        if wave.radius >= wave.max_radius || wave.alpha <= 0.0 {
            commands.entity(wave_entity).despawn();
            continue;
        }

        let inner = wave.radius - band;

        if wave.god_ring {
            let owner_is_pilot = wave
                .owner
                .is_some_and(|owner| pilots.get(owner).is_ok());

            for (entity, body) in bodies.iter_mut() {
                if !body.on_plane() {
                    continue;
                }
                let d = body.pos.distance(wave.origin);
                if d >= wave.radius || d <= inner {
                    continue;
                }
                commands.entity(entity).insert(Doomed);
                body_destroyed.write(BodyDestroyed {
                    entity,
                    was_planet: body.is_planet(),
                    pos: body.pos,
                    radius: body.radius,
                });
                if let Some(owner) = wave.owner {
                    credit.write(KillCredit {
                        killer: owner,
                        reward: if body.is_planet() {
                            config.reward_planet
                        } else {
                            config.reward_asteroid
                        },
                        victim_friendly_vessel: false,
                    });
                }
                if home.0 == Some(entity) {
                    home.0 = None;
                    home_lost.write(HomePlanetLost {
                        cause: if owner_is_pilot {
                            HomeLossCause::Player
                        } else {
                            HomeLossCause::Enemy
                        },
                    });
                }
            }

            for (entity, vessel) in vessels.iter_mut() {
                if wave.owner == Some(entity) {
                    continue;
                }
                let d = vessel.pos.distance(wave.origin);
                if d >= wave.radius || d <= inner {
                    continue;
                }
                commands.entity(entity).insert(Doomed);
                vessel_destroyed.write(VesselDestroyed {
                    entity,
                    was_station: vessel.is_station(),
                    friendly: vessel.faction.friendly,
                    pos: vessel.pos,
                    killer: wave.owner,
                });
                if let Some(owner) = wave.owner {
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
        } else {
            // Plain blast: radial knockback fading with distance.
            for (_, mut body) in bodies.iter_mut() {
                if !body.on_plane() {
                    continue;
                }
                let delta = body.pos - wave.origin;
                let d = delta.length();
                if d >= wave.radius || d <= inner || d <= f32::EPSILON {
                    continue;
                }
                let force = wave.strength * (1.0 - d / wave.max_radius) * 0.1;
                body.vel += delta / d * force;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_counts_follow_the_tier_ladder() {
        let expected = [1, 1, 2, 3, 3, 5, 5, 7, 5, 7, 13, 21];
        for (tier, &count) in expected.iter().enumerate() {
            assert_eq!(
                tier_pattern(tier as u32).len(),
                count,
                "tier {tier} should fire {count} shots"
            );
        }
    }

    #[test]
    fn patterns_are_angularly_symmetric() {
        for tier in 0..12 {
            let sum: f32 = tier_pattern(tier).iter().map(|(a, _)| a).sum();
            assert!(sum.abs() < 1e-6, "tier {tier} fan is not symmetric");
        }
    }

    #[test]
    fn high_tiers_have_no_secondary_shots() {
        // Tiers 8–11 fire primaries only; 4–7 mix in wide secondaries.
        assert!(tier_pattern(9).iter().all(|&(_, primary)| primary));
        assert!(tier_pattern(7).iter().any(|&(_, primary)| !primary));
    }

    #[test]
    fn scaling_grows_with_tier() {
        assert!(speed_scale(11) > speed_scale(0));
        assert!((size_scale(5) - 1.9).abs() < 1e-6);
    }
}
