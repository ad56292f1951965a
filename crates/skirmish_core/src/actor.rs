//! Actor records and per-kind payloads.
//!
//! Every simulated entity — unit, building or flag — is one `Actor` record
//! in the authoritative table, discriminated by [`ActorKind`] with a
//! kind-specific payload. All cross-actor references are plain IDs resolved
//! through the table at use time, so a stale reference can never dangle.

use serde::{Deserialize, Serialize};

use crate::actor_state::ActorState;
use crate::formation::PathPlannerHelper;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Number of players in a battle.
pub const NUM_PLAYERS: usize = 2;

/// Index of an actor in the dense actor table.
pub type ActorId = usize;

/// One of the two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerId {
    /// First player.
    P1,
    /// Second player.
    P2,
}

impl PlayerId {
    /// Table index of this player.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::P1 => 0,
            Self::P2 => 1,
        }
    }

    /// The other player.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::P1 => Self::P2,
            Self::P2 => Self::P1,
        }
    }

    /// Both players, in table order.
    #[must_use]
    pub const fn both() -> [Self; NUM_PLAYERS] {
        [Self::P1, Self::P2]
    }
}

/// Discriminant over every actor kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    /// The flag-carrying hero unit; one per player.
    King,
    /// The home structure; respawn point and flag drop target.
    Base,
    /// The capturable flag; one per player.
    Flag,
    /// Contested ranged structure; changes hands through contention.
    Tower,
    /// Melee infantry.
    Swordsman,
    /// Ranged unit firing arrows.
    Archer,
    /// Ranged unit hurling fireballs.
    Magician,
    /// Fast unit with a wide line of sight.
    Scout,
    /// Arrow projectile (lives in the projectile handler).
    Arrow,
    /// Fireball projectile (lives in the projectile handler).
    FireBall,
}

impl ActorKind {
    /// Whether this kind is a mobile unit.
    #[must_use]
    pub const fn is_unit(self) -> bool {
        matches!(
            self,
            Self::King | Self::Swordsman | Self::Archer | Self::Magician | Self::Scout
        )
    }

    /// Whether this kind is a stationary structure.
    #[must_use]
    pub const fn is_structure(self) -> bool {
        matches!(self, Self::Base | Self::Tower | Self::Flag)
    }

    /// Whether this kind is a projectile.
    #[must_use]
    pub const fn is_projectile(self) -> bool {
        matches!(self, Self::Arrow | Self::FireBall)
    }

    /// Whether this kind can join formations and plan paths.
    #[must_use]
    pub const fn can_plan_path(self) -> bool {
        self.is_unit()
    }

    /// Whether this kind can be ordered to attack.
    #[must_use]
    pub const fn can_attack(self) -> bool {
        matches!(
            self,
            Self::King | Self::Tower | Self::Swordsman | Self::Archer | Self::Magician
        )
    }

    /// Whether this kind fires projectiles instead of striking directly.
    #[must_use]
    pub const fn is_ranged(self) -> bool {
        matches!(self, Self::Archer | Self::Magician | Self::Tower)
    }

    /// Whether dead units may be scheduled to revive here.
    #[must_use]
    pub const fn is_respawn_structure(self) -> bool {
        matches!(self, Self::Base | Self::Tower)
    }
}

/// Launch parameters and firing state of a ranged attacker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangedPayload {
    /// Projectile travel speed in world units per tick.
    #[serde(with = "fixed_serde")]
    pub projectile_speed: Fixed,
    /// Projectile lifetime in ticks.
    #[serde(with = "fixed_serde")]
    pub projectile_ttl: Fixed,
    /// Projectile collision size.
    #[serde(with = "fixed_serde")]
    pub projectile_size: Fixed,
    /// Set by the attack state when a shot is due; consumed by the
    /// projectile handler the same tick.
    pub ready_to_fire: bool,
}

impl RangedPayload {
    /// Create launch parameters with the ready flag cleared.
    #[must_use]
    pub const fn new(projectile_speed: Fixed, projectile_ttl: Fixed, projectile_size: Fixed) -> Self {
        Self {
            projectile_speed,
            projectile_ttl,
            projectile_size,
            ready_to_fire: false,
        }
    }
}

/// Ownership tug-of-war state of a tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerPayload {
    /// Current owner.
    pub owner: PlayerId,
    /// Owner before the most recent capture.
    pub prev_owner: PlayerId,
    /// Radius within which units contend for the tower.
    #[serde(with = "fixed_serde")]
    pub contention_radius: Fixed,
    /// Score magnitude at which the tower changes hands.
    #[serde(with = "fixed_serde")]
    pub max_contention_score: Fixed,
    /// Running score; positive favors player one, negative player two.
    #[serde(with = "fixed_serde")]
    pub contention_score: Fixed,
    /// The tower's own ranged armament.
    pub ranged: RangedPayload,
}

/// Kind-specific actor data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorPayload {
    /// Kinds with no extra data.
    None,
    /// King: the enemy flag currently carried, if any.
    King {
        /// Carried flag actor, `None` when empty-handed.
        held_flag: Option<ActorId>,
    },
    /// Flag: the enemy king currently carrying it, if any.
    Flag {
        /// Carrying king actor, `None` while planted.
        captor: Option<ActorId>,
    },
    /// Tower: contention plus armament.
    Tower(TowerPayload),
    /// Archer or magician armament.
    Ranged(RangedPayload),
}

/// Combat and movement statistics used to construct an actor.
///
/// Plain data; the world bootstrap (fixtures, drivers) fills one per actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorStats {
    /// Damage dealt per strike or projectile.
    pub attack: u32,
    /// Maximum (and starting) hit points.
    pub max_hp: u32,
    /// Top movement speed in world units per tick.
    #[serde(with = "fixed_serde")]
    pub max_speed: Fixed,
    /// Collision and adjacency size.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
    /// Ticks a fresh corpse must wait before it may revive.
    #[serde(with = "fixed_serde")]
    pub total_respawn_time: Fixed,
    /// Line-of-sight flood-fill budget.
    #[serde(with = "fixed_serde")]
    pub los_radius: Fixed,
    /// Ticks between strikes while attacking.
    #[serde(with = "fixed_serde")]
    pub attack_speed: Fixed,
    /// Reach of a strike, measured from the attacker's edge.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,
}

impl Default for ActorStats {
    fn default() -> Self {
        Self {
            attack: 10,
            max_hp: 100,
            max_speed: Fixed::from_num(5),
            size: Fixed::from_num(1),
            total_respawn_time: Fixed::from_num(10),
            los_radius: Fixed::from_num(4),
            attack_speed: Fixed::from_num(5),
            attack_range: Fixed::from_num(2),
        }
    }
}

/// One simulated entity in the authoritative table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Dense table index; `actors[id].id == id` always holds.
    pub id: ActorId,
    /// Owning player.
    pub player_id: PlayerId,
    /// Kind discriminant.
    pub kind: ActorKind,
    /// Current behavior state.
    pub state: ActorState,
    /// Damage dealt per strike.
    pub attack: u32,
    /// Current hit points; zero exactly when dying or dead.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Top movement speed.
    #[serde(with = "fixed_serde")]
    pub max_speed: Fixed,
    /// Collision and adjacency size.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
    /// Ticks a fresh corpse waits before it may revive.
    #[serde(with = "fixed_serde")]
    pub total_respawn_time: Fixed,
    /// Remaining respawn countdown; zero when elapsed.
    #[serde(with = "fixed_serde")]
    pub time_to_respawn: Fixed,
    /// World position.
    pub position: Vec2Fixed,
    /// World velocity, applied by the movement integration step.
    pub velocity: Vec2Fixed,
    /// Current attack target; never owns the target.
    pub attack_target: Option<ActorId>,
    /// Structure this corpse will revive at; `None` until scheduled.
    pub respawn_target: Option<ActorId>,
    /// Line-of-sight flood-fill budget.
    #[serde(with = "fixed_serde")]
    pub los_radius: Fixed,
    /// Ticks between strikes.
    #[serde(with = "fixed_serde")]
    pub attack_speed: Fixed,
    /// Strike reach from the attacker's edge.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,
    /// True from the death transition until revival.
    pub is_dead: bool,
    /// Formation membership bookkeeping.
    pub path_helper: PathPlannerHelper,
    /// Kind-specific data.
    pub payload: ActorPayload,
}

impl Actor {
    /// Create an actor of the given kind at a position.
    ///
    /// The payload defaults per kind; ranged kinds and towers get their
    /// armament through [`with_ranged`](Self::with_ranged) and
    /// [`with_tower`](Self::with_tower).
    #[must_use]
    pub fn new(
        id: ActorId,
        player_id: PlayerId,
        kind: ActorKind,
        stats: ActorStats,
        position: Vec2Fixed,
    ) -> Self {
        let payload = match kind {
            ActorKind::King => ActorPayload::King { held_flag: None },
            ActorKind::Flag => ActorPayload::Flag { captor: None },
            _ => ActorPayload::None,
        };

        Self {
            id,
            player_id,
            kind,
            state: ActorState::Idle,
            attack: stats.attack,
            hp: stats.max_hp,
            max_hp: stats.max_hp,
            max_speed: stats.max_speed,
            size: stats.size,
            total_respawn_time: stats.total_respawn_time,
            time_to_respawn: Fixed::ZERO,
            position,
            velocity: Vec2Fixed::ZERO,
            attack_target: None,
            respawn_target: None,
            los_radius: stats.los_radius,
            attack_speed: stats.attack_speed,
            attack_range: stats.attack_range,
            is_dead: false,
            path_helper: PathPlannerHelper::new(),
            payload,
        }
    }

    /// Builder method to arm a ranged unit (archer or magician).
    #[must_use]
    pub fn with_ranged(mut self, ranged: RangedPayload) -> Self {
        self.payload = ActorPayload::Ranged(ranged);
        self
    }

    /// Builder method to set up a tower's contention state and armament.
    #[must_use]
    pub fn with_tower(
        mut self,
        contention_radius: Fixed,
        max_contention_score: Fixed,
        ranged: RangedPayload,
    ) -> Self {
        self.payload = ActorPayload::Tower(TowerPayload {
            owner: self.player_id,
            prev_owner: self.player_id,
            contention_radius,
            max_contention_score,
            contention_score: Fixed::ZERO,
            ranged,
        });
        self
    }

    /// Apply damage, saturating at zero hit points.
    pub fn damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }

    /// Death entry effects: zero hp, clear target and velocity, start the
    /// respawn countdown, clear the respawn target back to unset.
    ///
    /// Towers skip the countdown; they only revive through capture.
    pub fn die(&mut self) {
        self.is_dead = true;
        self.hp = 0;
        self.velocity = Vec2Fixed::ZERO;
        self.attack_target = None;
        self.respawn_target = None;
        self.stop_firing();

        if let ActorPayload::Tower(tower) = &mut self.payload {
            self.time_to_respawn = Fixed::ZERO;
            tower.contention_score = Fixed::ZERO;
        } else {
            self.time_to_respawn = self.total_respawn_time;
        }
    }

    /// Revive at the given position with full hit points.
    pub fn respawn(&mut self, position: Vec2Fixed) {
        self.is_dead = false;
        self.hp = self.max_hp;
        self.position = position;
        self.respawn_target = None;
    }

    /// Count the respawn countdown down, floored at zero.
    pub fn decrease_respawn_time(&mut self, delta_time: Fixed) {
        self.time_to_respawn = (self.time_to_respawn - delta_time).max(Fixed::ZERO);
    }

    /// Clear the attack target and any pending shot.
    pub fn stop_attack(&mut self) {
        self.attack_target = None;
        self.stop_firing();
    }

    fn stop_firing(&mut self) {
        match &mut self.payload {
            ActorPayload::Ranged(ranged) => ranged.ready_to_fire = false,
            ActorPayload::Tower(tower) => tower.ranged.ready_to_fire = false,
            _ => {}
        }
    }

    /// The ranged armament, for archers, magicians and towers.
    #[must_use]
    pub fn ranged_payload(&self) -> Option<&RangedPayload> {
        match &self.payload {
            ActorPayload::Ranged(ranged) => Some(ranged),
            ActorPayload::Tower(tower) => Some(&tower.ranged),
            _ => None,
        }
    }

    /// Mutable ranged armament.
    pub fn ranged_payload_mut(&mut self) -> Option<&mut RangedPayload> {
        match &mut self.payload {
            ActorPayload::Ranged(ranged) => Some(ranged),
            ActorPayload::Tower(tower) => Some(&mut tower.ranged),
            _ => None,
        }
    }

    /// The player currently controlling this actor.
    ///
    /// Towers answer with their contention owner, which tracks captures;
    /// everything else answers with its fixed owning player.
    #[must_use]
    pub fn controlling_player(&self) -> PlayerId {
        match &self.payload {
            ActorPayload::Tower(tower) => tower.owner,
            _ => self.player_id,
        }
    }

    /// Clamp the position into the world rectangle `[0, bounds)`.
    pub fn check_bounds(&mut self, bounds: Vec2Fixed) {
        if self.position.x < Fixed::ZERO {
            self.position.x = Fixed::ZERO;
        }
        if self.position.y < Fixed::ZERO {
            self.position.y = Fixed::ZERO;
        }
        if self.position.x >= bounds.x {
            self.position.x = bounds.x - Fixed::ONE;
        }
        if self.position.y >= bounds.y {
            self.position.y = bounds.y - Fixed::ONE;
        }
    }
}
