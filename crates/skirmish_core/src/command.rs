//! Player command log and the buffer merge protocol.
//!
//! A player's AI mutates only its private buffer state; every mutation goes
//! through the command surface and is recorded here as an ordered log
//! entry. Merging a buffer into the canonical state replays the log through
//! the same validated surface, which makes the merge auditable and makes an
//! empty log a strict no-op.

use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::formation::FormationMaker;
use crate::math::Vec2Fixed;
use crate::pathfinding::TerrainWeights;

/// One buffered mutation, exactly mirroring the command surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCommand {
    /// Form the units up and walk them to a destination.
    MoveUnits {
        /// Selected units; the first becomes the leader.
        units: Vec<ActorId>,
        /// Destination point in world coordinates.
        destination: Vec2Fixed,
        /// Formation shape to hold on the way.
        maker: FormationMaker,
        /// Per-terrain movement weights for the path search.
        weights: TerrainWeights,
    },
    /// Mark a target for every listed attacker.
    AttackUnit {
        /// Attacking units.
        attackers: Vec<ActorId>,
        /// Actor to attack.
        target: ActorId,
    },
    /// Pick up the enemy flag with the king.
    FlagCapture,
    /// Drop a carried flag at the own base.
    FlagDrop,
    /// Schedule a dead unit to revive at a structure.
    RespawnUnit {
        /// The dead unit.
        unit: ActorId,
        /// Tower or base to revive at.
        structure: ActorId,
    },
}

/// Ordered log of the commands a player issued since the last merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLog {
    entries: Vec<PlayerCommand>,
}

impl CommandLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command.
    pub fn record(&mut self, command: PlayerCommand) {
        self.entries.push(command);
    }

    /// Take every recorded command, leaving the log empty.
    pub fn drain(&mut self) -> Vec<PlayerCommand> {
        std::mem::take(&mut self.entries)
    }

    /// Discard everything without replaying.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Commands recorded so far, in issue order.
    #[must_use]
    pub fn entries(&self) -> &[PlayerCommand] {
        &self.entries
    }

    /// Number of recorded commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded since the last merge.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
