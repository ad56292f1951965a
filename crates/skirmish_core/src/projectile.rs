//! Ranged projectile spawning and resolution.
//!
//! Ranged attackers never damage their targets directly: their attack
//! state raises a ready-to-fire flag, and the handler turns each flag into
//! a homing projectile with damage scaled by the terrain of the shooter and
//! the target. Projectiles re-aim at their target's current position every
//! tick rather than flying ballistically.

use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorId, ActorKind, PlayerId};
use crate::actor_state::DamageEvent;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::terrain::{terrain_multiplier, Terrain, TerrainKind};

/// A projectile in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Handler-local identifier, monotonically increasing.
    pub id: u64,
    /// Player whose attacker fired this.
    pub player_id: PlayerId,
    /// Actor that fired this projectile.
    pub shooter: ActorId,
    /// Arrow or FireBall.
    pub kind: ActorKind,
    /// Damage on impact, terrain multiplier already applied.
    pub damage: u32,
    /// Travel speed in world units per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Remaining lifetime in ticks.
    #[serde(with = "fixed_serde")]
    pub time_to_live: Fixed,
    /// Collision size.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
    /// Current position.
    pub position: Vec2Fixed,
    /// Current velocity, re-aimed every tick.
    pub velocity: Vec2Fixed,
    /// Actor this projectile homes on.
    pub target: ActorId,
}

/// Spawns and advances all live projectiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileHandler {
    next_projectile_id: u64,
    projectiles: Vec<Projectile>,
}

impl ProjectileHandler {
    /// Create an empty handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Projectiles currently in flight.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// One tick: launch pending shots, then move and resolve everything.
    ///
    /// Returns the damage events for the state to apply; a projectile whose
    /// lifetime expires or whose target died deals no damage.
    pub fn update(
        &mut self,
        delta_time: Fixed,
        actors: &mut [Actor],
        terrain: &Terrain,
    ) -> Vec<DamageEvent> {
        self.launch_pending(actors, terrain);
        self.advance_projectiles(delta_time, actors)
    }

    /// Consume every ready-to-fire flag into a projectile.
    fn launch_pending(&mut self, actors: &mut [Actor], terrain: &Terrain) {
        for shooter_id in 0..actors.len() {
            let shooter = &actors[shooter_id];
            let Some(ranged) = shooter.ranged_payload() else {
                continue;
            };
            if !ranged.ready_to_fire {
                continue;
            }
            let Some(target_id) = shooter.attack_target else {
                actors[shooter_id]
                    .ranged_payload_mut()
                    .expect("checked ranged above")
                    .ready_to_fire = false;
                continue;
            };

            let source_kind = cell_kind(terrain, shooter.position);
            let target_kind = cell_kind(terrain, actors[target_id].position);
            let multiplier = terrain_multiplier(source_kind, target_kind);
            let damage = (Fixed::from_num(shooter.attack) * multiplier)
                .round()
                .to_num::<u32>();

            let kind = match shooter.kind {
                ActorKind::Archer => ActorKind::Arrow,
                _ => ActorKind::FireBall,
            };

            let shooter = &actors[shooter_id];
            let ranged = shooter.ranged_payload().expect("checked ranged above");
            let projectile = Projectile {
                id: self.next_projectile_id,
                player_id: shooter.controlling_player(),
                shooter: shooter_id,
                kind,
                damage,
                speed: ranged.projectile_speed,
                time_to_live: ranged.projectile_ttl,
                size: ranged.projectile_size,
                position: shooter.position,
                velocity: Vec2Fixed::ZERO,
                target: target_id,
            };
            self.next_projectile_id += 1;
            tracing::debug!(
                projectile = projectile.id,
                shooter = shooter_id,
                target = target_id,
                damage,
                "projectile launched"
            );
            self.projectiles.push(projectile);

            actors[shooter_id]
                .ranged_payload_mut()
                .expect("checked ranged above")
                .ready_to_fire = false;
        }
    }

    /// Move every projectile toward its target's current position and
    /// resolve hits, expiries and dead targets. Resolved projectiles are
    /// dropped from the active list and never move again.
    fn advance_projectiles(&mut self, delta_time: Fixed, actors: &[Actor]) -> Vec<DamageEvent> {
        let mut events = Vec::new();

        self.projectiles.retain_mut(|projectile| {
            let target = &actors[projectile.target];

            projectile.time_to_live -= delta_time;
            if projectile.time_to_live < Fixed::ZERO || target.is_dead {
                // Fizzles out: no damage
                return false;
            }

            let contact = projectile.size + target.size;
            if projectile.position.distance(target.position) < contact {
                events.push(DamageEvent {
                    attacker: projectile.shooter,
                    target: projectile.target,
                    damage: projectile.damage,
                });
                return false;
            }

            // Re-aim at where the target is now, not where it was at launch
            let to_target = target.position - projectile.position;
            projectile.velocity = to_target.scaled_to(projectile.speed);
            projectile.position = projectile.position + projectile.velocity * delta_time;
            true
        });

        events
    }
}

fn cell_kind(terrain: &Terrain, position: Vec2Fixed) -> TerrainKind {
    terrain
        .coordinate_to_element(position)
        .map_or(TerrainKind::Plain, |cell| cell.kind)
}
