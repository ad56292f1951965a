//! # Skirmish Drivers
//!
//! The concurrency harness around [`skirmish_core`]: one authoritative
//! tick loop plus one thread per player AI, exchanging state only at
//! well-defined merge points.
//!
//! Three execution contexts run concurrently:
//!
//! - Each [`PlayerDriver`](player_driver::PlayerDriver) runs a player's AI
//!   against that player's private buffer state. When the AI pass finishes,
//!   the driver flags the buffer as ready and parks on a condition variable
//!   until the main loop has merged and refreshed it.
//! - The [`MainDriver`](main_driver::MainDriver) tick loop, once per
//!   fixed-duration tick, replays the command logs of every flagged buffer
//!   onto the canonical state, advances the simulation, and pushes fresh
//!   canonical copies back to just-merged players. A slow AI is simply
//!   skipped for a tick, never waited on.
//!
//! Cross-thread coordination is confined to a handful of flags behind a
//! mutex/condvar pair per player; actual state copies are exchanged only at
//! merge points and never mutated concurrently.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod main_driver;
pub mod player_driver;

pub use config::DriverConfig;
pub use main_driver::MainDriver;
pub use player_driver::PlayerDriver;

/// Initialize tracing from the environment (`RUST_LOG`).
///
/// Call once at process startup; repeated calls are ignored.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
