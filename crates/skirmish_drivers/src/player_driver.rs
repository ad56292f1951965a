//! Per-player AI thread.
//!
//! A player driver owns the thread that runs one player's AI against that
//! player's buffer state. The loop is gated by a condition variable instead
//! of a busy poll, but keeps the original protocol: run one AI pass, flag
//! the buffer as ready (`modify_done`), park until the main loop has merged
//! the command log and pushed a fresh canonical copy back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use skirmish_core::actor::PlayerId;
use skirmish_core::command::PlayerCommand;
use skirmish_core::player::{PlayerAi, PlayerStateHandler};
use skirmish_core::state::State;

/// Flags steering one player thread.
#[derive(Debug, Default)]
struct SlotControl {
    /// Set by the player thread when an AI pass has finished; cleared by
    /// the main loop after merging and refreshing the buffer.
    modify_done: bool,
    /// Terminates the loop.
    game_over: bool,
    /// Suspends the loop without terminating it.
    paused: bool,
}

/// State shared between a player thread and the main loop.
pub(crate) struct PlayerSlot {
    control: Mutex<SlotControl>,
    wakeup: Condvar,
    handler: Mutex<PlayerStateHandler>,
    ai_nanos: AtomicU64,
}

impl PlayerSlot {
    fn new(handler: PlayerStateHandler) -> Self {
        Self {
            control: Mutex::new(SlotControl::default()),
            wakeup: Condvar::new(),
            handler: Mutex::new(handler),
            ai_nanos: AtomicU64::new(0),
        }
    }

    fn is_modify_done(&self) -> bool {
        self.control.lock().expect("player control poisoned").modify_done
    }

    fn drain_commands(&self) -> Vec<PlayerCommand> {
        self.handler.lock().expect("player buffer poisoned").take_log()
    }

    fn push_canonical(&self, canonical: &State) {
        {
            let mut handler = self.handler.lock().expect("player buffer poisoned");
            handler.reset_buffer(canonical.clone());
        }
        let mut control = self.control.lock().expect("player control poisoned");
        control.modify_done = false;
        drop(control);
        self.wakeup.notify_all();
    }
}

/// Runs one player's AI in a dedicated thread.
pub struct PlayerDriver {
    player_id: PlayerId,
    slot: Arc<PlayerSlot>,
    thread: Option<JoinHandle<()>>,
    ai: Option<Box<dyn PlayerAi + Send>>,
}

impl PlayerDriver {
    /// Create a driver for one player; the thread starts on [`run`](Self::run).
    #[must_use]
    pub fn new(handler: PlayerStateHandler, ai: Box<dyn PlayerAi + Send>) -> Self {
        let player_id = handler.player_id();
        Self {
            player_id,
            slot: Arc::new(PlayerSlot::new(handler)),
            thread: None,
            ai: Some(ai),
        }
    }

    /// The player this driver runs.
    #[must_use]
    pub const fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Start the player thread.
    ///
    /// # Panics
    ///
    /// Panics if the driver was already started.
    pub fn run(&mut self) {
        assert!(self.thread.is_none(), "player driver already running");
        let slot = Arc::clone(&self.slot);
        let mut ai = self.ai.take().expect("AI present until first run");
        let player_id = self.player_id;

        self.thread = Some(std::thread::spawn(move || {
            tracing::debug!(?player_id, "player loop started");
            loop {
                {
                    let mut control = slot.control.lock().expect("player control poisoned");
                    while (control.modify_done || control.paused) && !control.game_over {
                        control = slot
                            .wakeup
                            .wait(control)
                            .expect("player control poisoned");
                    }
                    if control.game_over {
                        break;
                    }
                }

                let started = Instant::now();
                {
                    let mut handler = slot.handler.lock().expect("player buffer poisoned");
                    ai.update(&mut handler);
                }
                let elapsed = started.elapsed();
                slot.ai_nanos
                    .fetch_add(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX), Ordering::Relaxed);

                let mut control = slot.control.lock().expect("player control poisoned");
                control.modify_done = true;
            }
            tracing::debug!(?player_id, "player loop stopped");
        }));
    }

    /// Whether an AI pass has finished and the buffer awaits a merge.
    ///
    /// Never blocks on the AI: the flag lives behind its own mutex, which
    /// the player thread holds only momentarily.
    #[must_use]
    pub fn is_modify_done(&self) -> bool {
        self.slot.is_modify_done()
    }

    /// Drain the buffered command log for replay onto the canonical state.
    #[must_use]
    pub fn drain_commands(&self) -> Vec<PlayerCommand> {
        self.slot.drain_commands()
    }

    /// Replace the buffer with a fresh canonical copy, clear the ready
    /// flag, and wake the player thread for its next pass.
    pub fn push_canonical(&self, canonical: &State) {
        self.slot.push_canonical(canonical);
    }

    /// Suspend the player loop after its current pass.
    pub fn pause(&self) {
        let mut control = self.slot.control.lock().expect("player control poisoned");
        control.paused = true;
    }

    /// Resume a paused player loop.
    pub fn resume(&self) {
        let mut control = self.slot.control.lock().expect("player control poisoned");
        control.paused = false;
        drop(control);
        self.slot.wakeup.notify_all();
    }

    /// Total wall-clock time spent inside the AI so far.
    #[must_use]
    pub fn ai_time(&self) -> Duration {
        Duration::from_nanos(self.ai_nanos())
    }

    pub(crate) fn ai_nanos(&self) -> u64 {
        self.slot.ai_nanos.load(Ordering::Relaxed)
    }

    /// Stop the player loop and join its thread.
    ///
    /// Safe to call more than once; a hung AI finishes its current pass
    /// before the thread observes the flag.
    pub fn stop(&mut self) {
        {
            let mut control = self.slot.control.lock().expect("player control poisoned");
            control.game_over = true;
        }
        self.slot.wakeup.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(player_id = ?self.player_id, "player thread panicked");
            }
        }
    }
}

impl Drop for PlayerDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The merge half of a player driver: what the tick loop needs to check,
/// drain and refresh one player's buffer without owning the thread.
pub(crate) struct MergePort {
    slot: Arc<PlayerSlot>,
    pub(crate) player_id: PlayerId,
}

impl PlayerDriver {
    /// Hand the tick loop its merge port; the thread stays owned here so
    /// the shutdown order (players first) holds.
    pub(crate) fn merge_port(&self) -> MergePort {
        MergePort {
            slot: Arc::clone(&self.slot),
            player_id: self.player_id,
        }
    }
}

impl MergePort {
    pub(crate) fn is_modify_done(&self) -> bool {
        self.slot.is_modify_done()
    }

    pub(crate) fn drain_commands(&self) -> Vec<PlayerCommand> {
        self.slot.drain_commands()
    }

    pub(crate) fn push_canonical(&self, canonical: &State) {
        self.slot.push_canonical(canonical);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::player::IdleAi;
    use skirmish_test_utils::fixtures;

    fn handler(player: PlayerId) -> PlayerStateHandler {
        PlayerStateHandler::new(fixtures::two_player_state(), player)
    }

    #[test]
    fn test_flag_raises_after_pass() {
        let mut driver = PlayerDriver::new(handler(PlayerId::P1), Box::new(IdleAi));
        driver.run();

        // The idle AI finishes almost immediately
        let deadline = Instant::now() + Duration::from_secs(2);
        while !driver.is_modify_done() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(driver.is_modify_done());

        driver.stop();
    }

    #[test]
    fn test_push_canonical_triggers_next_pass() {
        struct CountingAi(Arc<AtomicU64>);
        impl PlayerAi for CountingAi {
            fn update(&mut self, _handler: &mut PlayerStateHandler) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let passes = Arc::new(AtomicU64::new(0));
        let mut driver = PlayerDriver::new(
            handler(PlayerId::P1),
            Box::new(CountingAi(Arc::clone(&passes))),
        );
        let canonical = fixtures::two_player_state();
        driver.run();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !driver.is_modify_done() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(passes.load(Ordering::Relaxed), 1);

        driver.push_canonical(&canonical);
        let deadline = Instant::now() + Duration::from_secs(2);
        while !driver.is_modify_done() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(passes.load(Ordering::Relaxed), 2);

        driver.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut driver = PlayerDriver::new(handler(PlayerId::P2), Box::new(IdleAi));
        driver.run();
        driver.stop();
        driver.stop();
    }
}
