//! The read-restricted per-player facade and the AI contract.
//!
//! An AI never touches the world directly: it holds a
//! [`PlayerStateHandler`] wrapping that player's private buffer `State`.
//! Queries return point-in-time snapshot views, never live references, and
//! enemy views carry only what the player could actually observe. Commands
//! validate against the buffer, apply locally so the AI sees its own
//! effects, and are recorded in the command log for the merge.

use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorId, ActorKind, ActorPayload, PlayerId};
use crate::command::{CommandLog, PlayerCommand};
use crate::error::CommandError;
use crate::formation::FormationMaker;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::pathfinding::{PathError, TerrainWeights};
use crate::state::State;
use crate::terrain::{LosStatus, TerrainKind};

/// Full snapshot of one of the player's own actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitView {
    /// Actor ID.
    pub id: ActorId,
    /// Kind discriminant.
    pub kind: ActorKind,
    /// Current hit points.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Position this tick.
    pub position: Vec2Fixed,
    /// Velocity this tick.
    pub velocity: Vec2Fixed,
    /// Damage per strike.
    pub attack: u32,
    /// Strike reach.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,
    /// Top speed.
    #[serde(with = "fixed_serde")]
    pub max_speed: Fixed,
    /// Collision size.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
    /// Remaining respawn countdown.
    #[serde(with = "fixed_serde")]
    pub time_to_respawn: Fixed,
    /// Whether the actor is dead.
    pub is_dead: bool,
    /// Current attack target, if any.
    pub attack_target: Option<ActorId>,
}

impl UnitView {
    fn of(actor: &Actor) -> Self {
        Self {
            id: actor.id,
            kind: actor.kind,
            hp: actor.hp,
            max_hp: actor.max_hp,
            position: actor.position,
            velocity: actor.velocity,
            attack: actor.attack,
            attack_range: actor.attack_range,
            max_speed: actor.max_speed,
            size: actor.size,
            time_to_respawn: actor.time_to_respawn,
            is_dead: actor.is_dead,
            attack_target: actor.attack_target,
        }
    }
}

/// Restricted snapshot of an enemy actor: what a player can observe from
/// the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyUnitView {
    /// Actor ID.
    pub id: ActorId,
    /// Kind discriminant.
    pub kind: ActorKind,
    /// Position this tick.
    pub position: Vec2Fixed,
    /// Collision size.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
}

impl EnemyUnitView {
    fn of(actor: &Actor) -> Self {
        Self {
            id: actor.id,
            kind: actor.kind,
            position: actor.position,
            size: actor.size,
        }
    }
}

/// Snapshot of a tower, visible to both players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerView {
    /// Actor ID.
    pub id: ActorId,
    /// Player currently controlling the tower.
    pub owner: PlayerId,
    /// Position.
    pub position: Vec2Fixed,
    /// Current hit points.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Collision size.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
}

/// Snapshot of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagView {
    /// Actor ID.
    pub id: ActorId,
    /// Player the flag belongs to.
    pub player_id: PlayerId,
    /// Position this tick (rides on the captor while carried).
    pub position: Vec2Fixed,
    /// Whether an enemy king currently carries it.
    pub is_captured: bool,
}

/// Snapshot of one terrain cell as a player sees it.
///
/// The terrain kind of a cell the player has never seen is masked to
/// [`TerrainKind::Undefined`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainView {
    /// Cell center in world coordinates.
    pub center: Vec2Fixed,
    /// Cell size in world units.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
    /// Visibility status for the player.
    pub los: LosStatus,
    /// Terrain kind, masked while unexplored.
    pub kind: TerrainKind,
}

/// Capability handed to an AI: one update against the player's buffer.
///
/// Implementations may only call the command and query surface of the
/// handler; every read is a point-in-time snapshot.
pub trait PlayerAi {
    /// One decision pass against the player's buffer state.
    fn update(&mut self, handler: &mut PlayerStateHandler);
}

/// An AI that does nothing. Useful as a default opponent and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleAi;

impl PlayerAi for IdleAi {
    fn update(&mut self, _handler: &mut PlayerStateHandler) {}
}

/// A player's window onto the world: a private buffer `State` plus the
/// command log that carries its mutations to the canonical state.
#[derive(Debug, Clone)]
pub struct PlayerStateHandler {
    state: State,
    player_id: PlayerId,
    log: CommandLog,
}

impl PlayerStateHandler {
    /// Wrap a buffer state for one player.
    #[must_use]
    pub fn new(state: State, player_id: PlayerId) -> Self {
        Self {
            state,
            player_id,
            log: CommandLog::new(),
        }
    }

    /// The player this handler belongs to.
    #[must_use]
    pub const fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Buffer tick as of the last merge.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.state.tick()
    }

    // ------------------------------------------------------------------
    // Merge boundary (driver-facing)
    // ------------------------------------------------------------------

    /// Take the recorded command log for replay onto the canonical state.
    pub fn take_log(&mut self) -> Vec<PlayerCommand> {
        self.log.drain()
    }

    /// Replace the buffer with a fresh canonical copy and clear the log.
    pub fn reset_buffer(&mut self, canonical: State) {
        self.state = canonical;
        self.log.clear();
    }

    /// The buffer state itself (read-only; used by merge checks and tests).
    #[must_use]
    pub fn buffer(&self) -> &State {
        &self.state
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Snapshot one of the player's own actors.
    ///
    /// Returns `None` for unknown IDs and for actors of the other player;
    /// enemies are only observable through the enemy queries.
    #[must_use]
    pub fn unit_from_id(&self, id: ActorId) -> Option<UnitView> {
        self.state
            .actor(id)
            .filter(|actor| actor.player_id == self.player_id)
            .map(UnitView::of)
    }

    /// IDs of the player's living units.
    #[must_use]
    pub fn player_unit_ids(&self) -> Vec<ActorId> {
        self.state.player_unit_ids(self.player_id).to_vec()
    }

    /// IDs of enemy units currently in direct sight.
    #[must_use]
    pub fn player_enemy_ids(&self) -> Vec<ActorId> {
        self.state.player_enemy_ids(self.player_id).to_vec()
    }

    /// Snapshot an enemy unit, if it is currently in direct sight.
    #[must_use]
    pub fn enemy_from_id(&self, id: ActorId) -> Option<EnemyUnitView> {
        if !self.state.player_enemy_ids(self.player_id).contains(&id) {
            return None;
        }
        self.state.actor(id).map(EnemyUnitView::of)
    }

    /// Towers the player currently controls.
    #[must_use]
    pub fn towers(&self) -> Vec<TowerView> {
        self.towers_of(self.player_id)
    }

    /// Towers the enemy currently controls.
    #[must_use]
    pub fn enemy_towers(&self) -> Vec<TowerView> {
        self.towers_of(self.player_id.opponent())
    }

    fn towers_of(&self, player: PlayerId) -> Vec<TowerView> {
        self.state
            .towers_of(player)
            .into_iter()
            .filter_map(|id| self.state.actor(id))
            .map(|actor| TowerView {
                id: actor.id,
                owner: actor.controlling_player(),
                position: actor.position,
                hp: actor.hp,
                max_hp: actor.max_hp,
                size: actor.size,
            })
            .collect()
    }

    /// The player's own king.
    #[must_use]
    pub fn king(&self) -> UnitView {
        UnitView::of(self.expect_actor(self.state.king_id(self.player_id)))
    }

    /// The enemy king, as an outside view.
    #[must_use]
    pub fn enemy_king(&self) -> EnemyUnitView {
        EnemyUnitView::of(self.expect_actor(self.state.king_id(self.player_id.opponent())))
    }

    /// The player's own base.
    #[must_use]
    pub fn base(&self) -> UnitView {
        UnitView::of(self.expect_actor(self.state.base_id(self.player_id)))
    }

    /// The enemy base, as an outside view.
    #[must_use]
    pub fn enemy_base(&self) -> EnemyUnitView {
        EnemyUnitView::of(self.expect_actor(self.state.base_id(self.player_id.opponent())))
    }

    /// The player's own flag.
    #[must_use]
    pub fn flag(&self) -> FlagView {
        self.flag_view(self.state.flag_id(self.player_id))
    }

    /// The enemy flag.
    #[must_use]
    pub fn enemy_flag(&self) -> FlagView {
        self.flag_view(self.state.flag_id(self.player_id.opponent()))
    }

    fn flag_view(&self, id: ActorId) -> FlagView {
        let actor = self.expect_actor(id);
        FlagView {
            id: actor.id,
            player_id: actor.player_id,
            position: actor.position,
            is_captured: matches!(actor.payload, ActorPayload::Flag { captor: Some(_) }),
        }
    }

    fn expect_actor(&self, id: ActorId) -> &Actor {
        self.state
            .actor(id)
            .expect("registry IDs always resolve in a validated state")
    }

    /// The player's dead units whose respawn countdown has elapsed.
    #[must_use]
    pub fn respawnables(&self) -> Vec<UnitView> {
        self.state
            .respawnable_ids(self.player_id)
            .into_iter()
            .filter_map(|id| self.state.actor(id))
            .map(UnitView::of)
            .collect()
    }

    /// Number of terrain rows (and columns).
    #[must_use]
    pub fn terrain_rows(&self) -> u32 {
        self.state.terrain().rows()
    }

    /// Snapshot the terrain cell at a world position.
    ///
    /// Returns `None` outside the grid. Cells the player has never seen
    /// report [`TerrainKind::Undefined`].
    #[must_use]
    pub fn terrain_at(&self, position: Vec2Fixed) -> Option<TerrainView> {
        let (x, y) = self.state.terrain().coordinate_to_offset(position)?;
        Some(self.terrain_view(x, y))
    }

    /// Snapshot the terrain cell at a grid offset.
    #[must_use]
    pub fn terrain_at_offset(&self, x: u32, y: u32) -> Option<TerrainView> {
        if !self.state.terrain().in_bounds(x, y) {
            return None;
        }
        Some(self.terrain_view(x, y))
    }

    fn terrain_view(&self, x: u32, y: u32) -> TerrainView {
        let terrain = self.state.terrain();
        let cell = terrain.element(x, y);
        let los = cell.los[self.player_id.index()];
        let kind = if los == LosStatus::Unexplored {
            TerrainKind::Undefined
        } else {
            cell.kind
        };
        TerrainView {
            center: terrain.offset_to_center(x, y),
            size: terrain.cell_size(),
            los,
            kind,
        }
    }

    /// Plan a path through the buffer's terrain without moving anything.
    ///
    /// # Errors
    ///
    /// Propagates [`PathError`] from the search.
    pub fn plan_path(
        &mut self,
        start: Vec2Fixed,
        destination: Vec2Fixed,
        weights: TerrainWeights,
    ) -> Result<Vec<Vec2Fixed>, PathError> {
        let mut waypoints = Vec::new();
        self.state
            .plan_path(start, destination, weights, &mut waypoints)?;
        Ok(waypoints)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn issue(&mut self, command: PlayerCommand) -> Result<(), CommandError> {
        self.state.apply_command(self.player_id, &command)?;
        self.log.record(command);
        Ok(())
    }

    /// Form units up and walk them to a destination.
    ///
    /// # Errors
    ///
    /// See [`CommandError`] for the taxonomy.
    pub fn move_units(
        &mut self,
        units: Vec<ActorId>,
        destination: Vec2Fixed,
        maker: FormationMaker,
        weights: TerrainWeights,
    ) -> Result<(), CommandError> {
        self.issue(PlayerCommand::MoveUnits {
            units,
            destination,
            maker,
            weights,
        })
    }

    /// Mark a target for every listed attacker.
    ///
    /// # Errors
    ///
    /// See [`CommandError`] for the taxonomy.
    pub fn attack_unit(
        &mut self,
        attackers: Vec<ActorId>,
        target: ActorId,
    ) -> Result<(), CommandError> {
        self.issue(PlayerCommand::AttackUnit { attackers, target })
    }

    /// Pick up the enemy flag with the king.
    ///
    /// # Errors
    ///
    /// See [`CommandError`] for the taxonomy.
    pub fn flag_capture(&mut self) -> Result<(), CommandError> {
        self.issue(PlayerCommand::FlagCapture)
    }

    /// Drop a carried flag at the own base.
    ///
    /// # Errors
    ///
    /// See [`CommandError`] for the taxonomy.
    pub fn flag_drop(&mut self) -> Result<(), CommandError> {
        self.issue(PlayerCommand::FlagDrop)
    }

    /// Schedule a dead unit to revive at a tower or base.
    ///
    /// # Errors
    ///
    /// See [`CommandError`] for the taxonomy.
    pub fn respawn_unit(&mut self, unit: ActorId, structure: ActorId) -> Result<(), CommandError> {
        self.issue(PlayerCommand::RespawnUnit { unit, structure })
    }
}
