//! The actor behavior state machine.
//!
//! Each actor carries one [`ActorState`]; the transition function for each
//! tag is pure data-in/data-out over the actor and a context snapshot, so a
//! tick never allocates state objects. [`advance`] drives transitions in a
//! loop until the state settles, which lets several hops (say Idle →
//! Pursuit → Attack) land in a single tick without delay.

use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorId, ActorKind};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Behavior state of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorState {
    /// Standing by; watching for a target or a path order.
    Idle,
    /// Closing distance to the attack target.
    Pursuit,
    /// In range; striking on the attack-speed cadence.
    Attack {
        /// Remaining charge until the next strike.
        #[serde(with = "fixed_serde")]
        time_to_attack: Fixed,
    },
    /// Walking a formation path.
    PathPlanning,
    /// Dead; counting down to a possible respawn.
    Dead,
}

impl ActorState {
    /// Stable discriminant for hashing and snapshots.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Pursuit => 1,
            Self::Attack { .. } => 2,
            Self::PathPlanning => 3,
            Self::Dead => 4,
        }
    }
}

/// Point-in-time facts about the attack target, resolved through the actor
/// table before the owning actor is borrowed mutably.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSnapshot {
    /// Target position this tick.
    pub position: Vec2Fixed,
    /// Target collision size.
    pub size: Fixed,
    /// Whether the target is already dead.
    pub is_dead: bool,
}

/// Resolved context one actor needs for one tick of its state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateContext {
    /// Snapshot of the attack target, `None` when no target is set or the
    /// reference no longer resolves.
    pub target: Option<TargetSnapshot>,
    /// Position of the scheduled respawn structure, `None` until one is set.
    pub respawn_position: Option<Vec2Fixed>,
}

/// A melee strike to resolve against the actor table.
///
/// Ranged attackers do not produce damage events here; their strikes set
/// the ready-to-fire flag consumed by the projectile handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageEvent {
    /// Striking actor.
    pub attacker: ActorId,
    /// Struck actor.
    pub target: ActorId,
    /// Damage to apply.
    pub damage: u32,
}

/// Drive the actor's state machine for one tick.
///
/// Runs the current state's update; on a transition, applies the old
/// state's exit effects and the new state's entry effects, then updates
/// again, until no further transition is returned.
pub fn advance(
    actor: &mut Actor,
    ctx: &StateContext,
    delta_time: Fixed,
    events: &mut Vec<DamageEvent>,
) {
    let mut next = update(actor, ctx, delta_time, events);
    while let Some(new_state) = next {
        exit(actor, ctx);
        enter(actor, &new_state);
        actor.state = new_state;
        next = update(actor, ctx, delta_time, events);
    }
}

/// Entry effects of a state.
fn enter(actor: &mut Actor, state: &ActorState) {
    if matches!(state, ActorState::Dead) {
        actor.die();
    }
}

/// Exit effects of the actor's current state.
fn exit(actor: &mut Actor, ctx: &StateContext) {
    match actor.state {
        ActorState::Dead => {
            // Towers revive through capture, which restores them directly.
            if actor.kind != ActorKind::Tower {
                if let Some(position) = ctx.respawn_position {
                    actor.respawn(position);
                }
            }
        }
        ActorState::PathPlanning => {
            actor.velocity = Vec2Fixed::ZERO;
            actor.path_helper.finish();
        }
        _ => {}
    }
}

/// One update of the current state. Returns the next state on a
/// transition, `None` to stay.
fn update(
    actor: &mut Actor,
    ctx: &StateContext,
    delta_time: Fixed,
    events: &mut Vec<DamageEvent>,
) -> Option<ActorState> {
    match actor.state {
        ActorState::Idle => update_idle(actor),
        ActorState::Pursuit => update_pursuit(actor, ctx),
        ActorState::Attack { time_to_attack } => {
            update_attack(actor, ctx, delta_time, time_to_attack, events)
        }
        ActorState::PathPlanning => update_path_planning(actor, ctx, delta_time),
        ActorState::Dead => update_dead(actor, ctx, delta_time),
    }
}

fn update_idle(actor: &Actor) -> Option<ActorState> {
    if actor.hp == 0 {
        return Some(ActorState::Dead);
    }
    if actor.attack_target.is_some() {
        return Some(ActorState::Pursuit);
    }
    if actor.path_helper.is_path_planning() {
        return Some(ActorState::PathPlanning);
    }
    None
}

fn update_pursuit(actor: &mut Actor, ctx: &StateContext) -> Option<ActorState> {
    if actor.hp == 0 {
        actor.velocity = Vec2Fixed::ZERO;
        return Some(ActorState::Dead);
    }
    if actor.path_helper.is_path_planning() {
        actor.stop_attack();
        return Some(ActorState::PathPlanning);
    }
    let Some(target) = live_target(actor, ctx) else {
        actor.velocity = Vec2Fixed::ZERO;
        actor.stop_attack();
        return Some(ActorState::Idle);
    };

    if actor.position.distance(target.position) <= actor.attack_range + target.size {
        actor.velocity = Vec2Fixed::ZERO;
        return Some(ActorState::Attack {
            time_to_attack: actor.attack_speed,
        });
    }

    let to_target = target.position - actor.position;
    actor.velocity = to_target.scaled_to(actor.max_speed);
    None
}

fn update_attack(
    actor: &mut Actor,
    ctx: &StateContext,
    delta_time: Fixed,
    time_to_attack: Fixed,
    events: &mut Vec<DamageEvent>,
) -> Option<ActorState> {
    if actor.hp == 0 {
        actor.stop_attack();
        return Some(ActorState::Dead);
    }
    if actor.path_helper.is_path_planning() {
        actor.stop_attack();
        return Some(ActorState::PathPlanning);
    }
    let Some(target) = live_target(actor, ctx) else {
        actor.stop_attack();
        return Some(ActorState::Idle);
    };

    if actor.position.distance(target.position) > actor.attack_range + target.size {
        return Some(ActorState::Pursuit);
    }

    let mut charge = time_to_attack - delta_time;
    if charge <= Fixed::ZERO {
        charge = actor.attack_speed;
        strike(actor, events);
    }
    actor.state = ActorState::Attack {
        time_to_attack: charge,
    };
    None
}

fn update_path_planning(
    actor: &mut Actor,
    ctx: &StateContext,
    delta_time: Fixed,
) -> Option<ActorState> {
    if actor.hp == 0 {
        return Some(ActorState::Dead);
    }
    if actor.attack_target.is_some() {
        return Some(ActorState::Attack {
            time_to_attack: actor.attack_speed,
        });
    }
    if !actor.path_helper.is_path_planning() {
        return Some(ActorState::Idle);
    }

    // Clamp the final approach so one tick of travel never overshoots the
    // steering target.
    if let Some(destination) = actor.path_helper.destination() {
        let to_destination = destination - actor.position;
        let step = actor.velocity * delta_time;
        if to_destination.magnitude() < step.magnitude() && delta_time > Fixed::ZERO {
            actor.velocity = to_destination / delta_time;
        }
    }
    None
}

fn update_dead(actor: &mut Actor, ctx: &StateContext, delta_time: Fixed) -> Option<ActorState> {
    if actor.kind == ActorKind::Tower {
        // A captured tower has been revived in place; leave the graveyard.
        if actor.is_dead {
            return None;
        }
        return Some(ActorState::Idle);
    }

    if actor.time_to_respawn <= Fixed::ZERO && ctx.respawn_position.is_some() {
        return Some(ActorState::Idle);
    }
    actor.decrease_respawn_time(delta_time);
    None
}

/// Resolve the attack target if it is set and alive.
fn live_target(actor: &Actor, ctx: &StateContext) -> Option<TargetSnapshot> {
    if actor.attack_target.is_none() {
        return None;
    }
    ctx.target.filter(|target| !target.is_dead)
}

/// Resolve a due strike: ranged attackers flag a shot for the projectile
/// handler, everyone else lands damage directly.
fn strike(actor: &mut Actor, events: &mut Vec<DamageEvent>) {
    let Some(target) = actor.attack_target else {
        return;
    };

    if let Some(ranged) = actor.ranged_payload_mut() {
        ranged.ready_to_fire = true;
    } else {
        events.push(DamageEvent {
            attacker: actor.id,
            target,
            damage: actor.attack,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorStats, PlayerId, RangedPayload};

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(fixed(x), fixed(y))
    }

    fn fighter(position: Vec2Fixed) -> Actor {
        let stats = ActorStats {
            attack: 10,
            max_hp: 100,
            max_speed: fixed(10),
            size: fixed(1),
            total_respawn_time: fixed(10),
            los_radius: fixed(4),
            attack_speed: fixed(5),
            attack_range: fixed(10),
        };
        Actor::new(0, PlayerId::P1, ActorKind::Swordsman, stats, position)
    }

    fn snapshot(position: Vec2Fixed) -> TargetSnapshot {
        TargetSnapshot {
            position,
            size: fixed(1),
            is_dead: false,
        }
    }

    fn step(actor: &mut Actor, ctx: &StateContext) -> Vec<DamageEvent> {
        let mut events = Vec::new();
        advance(actor, ctx, Fixed::ONE, &mut events);
        events
    }

    #[test]
    fn test_idle_stays_idle() {
        let mut actor = fighter(Vec2Fixed::ZERO);
        step(&mut actor, &StateContext::default());
        assert_eq!(actor.state, ActorState::Idle);
    }

    #[test]
    fn test_idle_to_pursuit_to_attack_in_one_tick() {
        // Target already in range: both hops land in a single advance call
        let mut actor = fighter(Vec2Fixed::ZERO);
        actor.attack_target = Some(1);
        let ctx = StateContext {
            target: Some(snapshot(vec2(5, 0))),
            respawn_position: None,
        };

        step(&mut actor, &ctx);
        assert!(matches!(actor.state, ActorState::Attack { .. }));
        assert_eq!(actor.velocity, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_pursuit_closes_at_max_speed() {
        let mut actor = fighter(Vec2Fixed::ZERO);
        actor.attack_target = Some(1);
        let ctx = StateContext {
            target: Some(snapshot(vec2(100, 0))),
            respawn_position: None,
        };

        step(&mut actor, &ctx);
        assert_eq!(actor.state, ActorState::Pursuit);
        // Straight east at max speed, within fixed-sqrt precision
        let epsilon = Fixed::from_num(1) / fixed(1000);
        assert!((actor.velocity.x - fixed(10)).abs() < epsilon);
        assert_eq!(actor.velocity.y, Fixed::ZERO);
    }

    #[test]
    fn test_pursuit_drops_dead_target() {
        let mut actor = fighter(Vec2Fixed::ZERO);
        actor.attack_target = Some(1);
        actor.state = ActorState::Pursuit;
        let ctx = StateContext {
            target: Some(TargetSnapshot {
                position: vec2(50, 0),
                size: fixed(1),
                is_dead: true,
            }),
            respawn_position: None,
        };

        step(&mut actor, &ctx);
        assert_eq!(actor.state, ActorState::Idle);
        assert_eq!(actor.attack_target, None);
        assert_eq!(actor.velocity, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_attack_cadence() {
        // attack_speed 5: first strike after five ticks, then every fifth
        let mut actor = fighter(Vec2Fixed::ZERO);
        actor.attack_target = Some(1);
        let ctx = StateContext {
            target: Some(snapshot(vec2(5, 0))),
            respawn_position: None,
        };

        let mut strikes = Vec::new();
        for tick in 1..=15 {
            let events = step(&mut actor, &ctx);
            if !events.is_empty() {
                strikes.push(tick);
                assert_eq!(events[0].damage, 10);
                assert_eq!(events[0].target, 1);
            }
        }
        assert_eq!(strikes, vec![5, 10, 15]);
    }

    #[test]
    fn test_ranged_attack_sets_ready_flag() {
        let mut actor = fighter(Vec2Fixed::ZERO);
        actor.kind = ActorKind::Archer;
        actor = actor.with_ranged(RangedPayload::new(fixed(8), fixed(6), Fixed::ONE));
        actor.attack_target = Some(1);
        let ctx = StateContext {
            target: Some(snapshot(vec2(5, 0))),
            respawn_position: None,
        };

        let mut fired_at = None;
        for tick in 1..=5 {
            let events = step(&mut actor, &ctx);
            assert!(events.is_empty(), "ranged strikes produce no melee events");
            if actor.ranged_payload().unwrap().ready_to_fire && fired_at.is_none() {
                fired_at = Some(tick);
            }
        }
        assert_eq!(fired_at, Some(5));
    }

    #[test]
    fn test_dead_from_any_state_within_one_call() {
        for state in [
            ActorState::Idle,
            ActorState::Pursuit,
            ActorState::Attack {
                time_to_attack: fixed(3),
            },
            ActorState::PathPlanning,
        ] {
            let mut actor = fighter(Vec2Fixed::ZERO);
            actor.state = state;
            actor.hp = 0;

            step(&mut actor, &StateContext::default());
            assert_eq!(actor.state, ActorState::Dead, "from {state:?}");
            assert!(actor.is_dead);
        }
    }

    #[test]
    fn test_respawn_round_trip() {
        let mut actor = fighter(vec2(3, 3));
        actor.hp = 0;
        step(&mut actor, &StateContext::default());
        assert_eq!(actor.state, ActorState::Dead);

        // Countdown not elapsed: stays dead
        let home = vec2(8, 8);
        let ctx = StateContext {
            target: None,
            respawn_position: Some(home),
        };
        for _ in 0..9 {
            step(&mut actor, &ctx);
            assert_eq!(actor.state, ActorState::Dead);
        }

        // Tick ten: countdown hits zero, next advance revives exactly once
        step(&mut actor, &ctx);
        step(&mut actor, &ctx);
        assert_eq!(actor.state, ActorState::Idle);
        assert_eq!(actor.hp, actor.max_hp);
        assert_eq!(actor.position, home);
    }

    #[test]
    fn test_dead_without_respawn_target_stays_dead() {
        let mut actor = fighter(Vec2Fixed::ZERO);
        actor.hp = 0;
        for _ in 0..50 {
            step(&mut actor, &StateContext::default());
        }
        assert_eq!(actor.state, ActorState::Dead);
        assert_eq!(actor.time_to_respawn, Fixed::ZERO);
    }

    #[test]
    fn test_path_planning_cancels_attack() {
        let mut actor = fighter(Vec2Fixed::ZERO);
        actor.state = ActorState::Pursuit;
        actor.attack_target = Some(1);
        actor
            .path_helper
            .set_path(1, Vec2Fixed::ZERO, None);
        let ctx = StateContext {
            target: Some(snapshot(vec2(50, 0))),
            respawn_position: None,
        };

        step(&mut actor, &ctx);
        assert_eq!(actor.state, ActorState::PathPlanning);
        assert_eq!(actor.attack_target, None);
    }

    #[test]
    fn test_path_planning_clamps_final_approach() {
        let mut actor = fighter(Vec2Fixed::ZERO);
        actor.state = ActorState::PathPlanning;
        actor
            .path_helper
            .set_path(1, Vec2Fixed::ZERO, None);
        actor.path_helper.steer_towards(vec2(3, 0));
        actor.velocity = vec2(10, 0);

        step(&mut actor, &StateContext::default());
        // Three units away at speed ten: clamped to arrive exactly
        assert_eq!(actor.velocity, vec2(3, 0));
    }
}
