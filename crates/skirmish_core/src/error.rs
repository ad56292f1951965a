//! Error types for the battle simulation.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for internal simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid actor reference.
    #[error("Actor not found: {0}")]
    ActorNotFound(usize),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// State snapshot serialization failure.
    #[error("Failed to serialize state: {0}")]
    SerializationFailed(String),
}

/// Failure taxonomy of the player command surface.
///
/// Commands never panic and never throw; each precondition violation maps to
/// a distinct variant so AI callers can branch on cause. The variants group
/// into the four causes the interface guarantees: invalid input, ownership
/// violation, target invalid/dead, and out of range / line of sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The selection list was empty.
    #[error("No units selected")]
    EmptySelection,

    /// An actor ID was outside the actor table.
    #[error("Actor ID out of range")]
    InvalidActorId,

    /// The caller does not own the addressed actor.
    #[error("Actor is not owned by the calling player")]
    NotOwned,

    /// The addressed actor is dead and cannot act.
    #[error("Actor is dead")]
    ActorDead,

    /// The target ID was outside the actor table.
    #[error("Target ID out of range")]
    InvalidTarget,

    /// The target belongs to the calling player.
    #[error("Cannot attack an allied actor")]
    TargetOwned,

    /// The target is already dead.
    #[error("Target is dead")]
    TargetDead,

    /// The target is not in the caller's direct line of sight.
    #[error("Target is not in line of sight")]
    NotInLineOfSight,

    /// The king is too far from the structure to interact with it.
    #[error("Too far away")]
    TooFar,

    /// The king already holds a flag.
    #[error("Already holding a flag")]
    AlreadyHoldingFlag,

    /// The king holds no flag to drop.
    #[error("Not holding a flag")]
    NotHoldingFlag,

    /// The actor's respawn countdown has not elapsed.
    #[error("Respawn countdown still running")]
    StillRespawning,

    /// The actor is alive; only dead actors can be scheduled for respawn.
    #[error("Actor is not dead")]
    NotDead,

    /// The respawn structure is not a tower or base, or is invalid.
    #[error("Invalid respawn structure")]
    InvalidRespawnTarget,

    /// No route exists to the requested destination.
    #[error("Destination is unreachable")]
    Unreachable,
}
