//! Score progression: the tier step function, kill rewards, betrayal, and
//! the victory condition.

use crate::body::{CelestialBody, Doomed};
use crate::config::SimConfig;
use crate::events::{BetrayalTriggered, KillCredit, TierChanged, VesselDestroyed, Victory};
use crate::vessel::{AiState, PilotControlled, PilotState, Vessel};
use bevy::prelude::*;

/// Evolution tier for a score.
///
/// Flat `step` per tier until tier 7; beyond that each tier costs
/// `(tier − 5) × step` (tier 7→8 costs 2 steps, 8→9 costs 3, …).  Pure,
/// monotone, and idempotent in `score`.
pub fn ship_tier(score: i64, step: i64) -> u32 {
    let score = score.max(0);
    let step = step.max(1);

    let mut tier: u32 = 0;
    let mut threshold: i64 = 0;
    let mut required = step;

    while score >= threshold + required {
        threshold += required;
        tier += 1;
        required = if tier >= 7 {
            (tier as i64 - 5) * step
        } else {
            step
        };
    }

    tier
}

/// Applies kill credit to the killer's score and tier, handling betrayal when
/// the pilot guns down a friendly.
pub fn score_progression_system(
    config: Res<SimConfig>,
    mut pilot_state: ResMut<PilotState>,
    mut credits: MessageReader<KillCredit>,
    mut vessels: Query<(Entity, &mut Vessel), Without<Doomed>>,
    pilots: Query<(), With<PilotControlled>>,
    mut tier_changed: MessageWriter<TierChanged>,
    mut betrayal: MessageWriter<BetrayalTriggered>,
) {
    let mut betrayal_now = false;

    for credit in credits.read() {
        let killer_is_pilot = pilots.get(credit.killer).is_ok();
        let treachery =
            credit.victim_friendly_vessel && killer_is_pilot && !pilot_state.lone_wolf;

        let Ok((_, mut killer)) = vessels.get_mut(credit.killer) else {
            // Killer died before the credit landed; attribution is forfeit.
            continue;
        };

        let reward = if treachery { -credit.reward } else { credit.reward };
        killer.score += reward;

        let old_tier = killer.tier;
        let new_tier = ship_tier(killer.score, config.evolution_score_step);
        if new_tier != old_tier {
            if new_tier == 12 && old_tier < 12 {
                killer.transformation_timer = config.transformation_frames;
            } else if new_tier < 12 && old_tier >= 12 {
                killer.transformation_timer = 0;
            }
            killer.tier = new_tier;
            tier_changed.write(TierChanged {
                vessel: credit.killer,
                from: old_tier,
                to: new_tier,
            });
        }

        if treachery {
            betrayal_now = true;
        }
    }

    if betrayal_now {
        pilot_state.lone_wolf = true;
        betrayal.write(BetrayalTriggered);
        // Every friendly ship turns on the pilot at once.
        for (entity, mut vessel) in vessels.iter_mut() {
            if pilots.get(entity).is_ok() || !vessel.faction.friendly {
                continue;
            }
            vessel.faction.friendly = false;
            vessel.faction.hue = 0.0;
            if let Some(ai) = vessel.ship_mut() {
                ai.state = AiState::Combat;
                ai.leader = None;
                ai.squad_id = None;
            }
        }
    }
}

/// A dying station leaves junk behind and, when the pilot took it down,
/// refits the pilot's ship.
pub fn station_wreck_system(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut pilot_state: ResMut<PilotState>,
    mut wrecks: MessageReader<VesselDestroyed>,
    mut pilots: Query<(Entity, &mut Vessel), With<PilotControlled>>,
) {
    for wreck in wrecks.read() {
        if !wreck.was_station {
            continue;
        }

        let mut junk = CelestialBody::asteroid(
            wreck.pos + Vec2::new(config.asteroid_split_offset, 0.0),
            Vec2::new(config.asteroid_max_speed, 0.0),
            config.asteroid_min_size,
        );
        junk.blink = config.split_blink_frames;
        commands.spawn(junk);

        let pilot_killed_it = wreck
            .killer
            .is_some_and(|killer| pilots.get(killer).is_ok());
        if pilot_killed_it && !wreck.friendly {
            pilot_state.lives += 1;
            for (_, mut pilot) in pilots.iter_mut() {
                pilot.hp = config.ship_resistance;
            }
        }
    }
}

/// Latches once asteroids have existed, fires [`Victory`] once none remain.
#[derive(Resource, Debug, Default)]
pub struct VictoryLatch {
    pub bodies_seen: bool,
    pub fired: bool,
}

pub fn victory_system(
    mut latch: ResMut<VictoryLatch>,
    bodies: Query<&CelestialBody, Without<Doomed>>,
    mut victory: MessageWriter<Victory>,
) {
    if latch.fired {
        return;
    }
    let asteroids = bodies.iter().filter(|b| !b.is_planet()).count();
    if asteroids > 0 {
        latch.bodies_seen = true;
    } else if latch.bodies_seen {
        latch.fired = true;
        victory.write(Victory);
        println!("Victory: field cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds_match_the_ladder() {
        let step = 1000;
        assert_eq!(ship_tier(0, step), 0);
        assert_eq!(ship_tier(999, step), 0);
        assert_eq!(ship_tier(1000, step), 1);
        assert_eq!(ship_tier(6999, step), 6);
        assert_eq!(ship_tier(7000, step), 7);
        // Tier 7 → 8 costs 2 steps.
        assert_eq!(ship_tier(8999, step), 7);
        assert_eq!(ship_tier(9000, step), 8);
        // Tier 8 → 9 costs 3 steps.
        assert_eq!(ship_tier(11_999, step), 8);
        assert_eq!(ship_tier(12_000, step), 9);
    }

    #[test]
    fn tier_is_monotone_and_idempotent() {
        let step = 1000;
        let mut last = 0;
        for score in (0..30_000).step_by(137) {
            let tier = ship_tier(score, step);
            assert!(tier >= last, "tier regressed at score {score}");
            assert_eq!(tier, ship_tier(score, step));
            last = tier;
        }
    }

    #[test]
    fn negative_scores_clamp_to_tier_zero() {
        assert_eq!(ship_tier(-5000, 1000), 0);
    }
}
