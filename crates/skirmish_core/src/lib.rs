//! # Skirmish Core
//!
//! Deterministic battle simulation core for the two-player skirmish game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No threads
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Identical authoritative and player-buffer states that differ only by
//!   the commands applied to them
//! - Headless driver builds
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`math`] - Fixed-point math utilities
//! - [`terrain`] - Terrain grid and per-player line of sight
//! - [`pathfinding`] - A* search over the terrain grid
//! - [`formation`] - Formation movement and the path planner
//! - [`actor`] - Actor records and per-kind payloads
//! - [`actor_state`] - The actor behavior state machine
//! - [`projectile`] - Ranged projectile spawning and resolution
//! - [`state`] - The authoritative world and its command surface
//! - [`command`] - Player command log and the buffer merge protocol
//! - [`player`] - The read-restricted per-player facade and AI contract

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod actor;
pub mod actor_state;
pub mod command;
pub mod error;
pub mod formation;
pub mod math;
pub mod pathfinding;
pub mod player;
pub mod projectile;
pub mod state;
pub mod terrain;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::actor::{
        Actor, ActorId, ActorKind, ActorStats, PlayerId, RangedPayload, NUM_PLAYERS,
    };
    pub use crate::actor_state::ActorState;
    pub use crate::command::{CommandLog, PlayerCommand};
    pub use crate::error::{CommandError, GameError, Result};
    pub use crate::formation::{Formation, FormationMaker, PathPlanner, PathPlannerHelper};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::pathfinding::{Graph, PathError, TerrainWeights};
    pub use crate::player::{IdleAi, PlayerAi, PlayerStateHandler};
    pub use crate::state::{State, TowerCaptureLogEntry};
    pub use crate::terrain::{LosStatus, Terrain, TerrainElement, TerrainKind};
}
