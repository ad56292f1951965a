//! The authoritative tick loop.
//!
//! The main driver owns the canonical state and both player drivers. Once
//! per fixed-duration tick it replays the command logs of every player
//! whose buffer is flagged ready, advances the canonical state, and pushes
//! a fresh copy back to exactly those players. Players that were not ready
//! keep their stale buffers until their next flag-and-merge cycle; the tick
//! never waits on a slow AI.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use skirmish_core::actor::PlayerId;
use skirmish_core::math::Fixed;
use skirmish_core::player::{PlayerAi, PlayerStateHandler};
use skirmish_core::state::State;

use crate::config::DriverConfig;
use crate::player_driver::{MergePort, PlayerDriver};

/// Flags shared with the tick-loop thread.
#[derive(Debug, Default)]
struct MainShared {
    game_over: AtomicBool,
    paused: AtomicBool,
    ticks: AtomicU64,
}

/// Owns the canonical state, the tick loop and both player drivers.
pub struct MainDriver {
    config: DriverConfig,
    shared: Arc<MainShared>,
    players: Vec<PlayerDriver>,
    canonical: Option<State>,
    thread: Option<JoinHandle<State>>,
}

impl MainDriver {
    /// Wire up a battle: each player gets a private buffer copy of the
    /// canonical state and a driver for its AI.
    #[must_use]
    pub fn new(
        config: DriverConfig,
        canonical: State,
        ai_one: Box<dyn PlayerAi + Send>,
        ai_two: Box<dyn PlayerAi + Send>,
    ) -> Self {
        let buffer_one = PlayerStateHandler::new(canonical.clone(), PlayerId::P1);
        let buffer_two = PlayerStateHandler::new(canonical.clone(), PlayerId::P2);
        Self {
            config,
            shared: Arc::new(MainShared::default()),
            players: vec![
                PlayerDriver::new(buffer_one, ai_one),
                PlayerDriver::new(buffer_two, ai_two),
            ],
            canonical: Some(canonical),
            thread: None,
        }
    }

    /// Ticks the canonical state has advanced so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    /// Whether the tick loop has ended (duration cap or stop request).
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.shared.game_over.load(Ordering::Relaxed)
    }

    /// Wall-clock AI time of player one divided by player two's.
    ///
    /// A diagnostic for grossly unbalanced AI budgets.
    #[must_use]
    pub fn time_ratio(&self) -> f64 {
        let one = self.players[0].ai_nanos();
        let two = self.players[1].ai_nanos().max(1);
        #[allow(clippy::cast_precision_loss)]
        {
            one as f64 / two as f64
        }
    }

    /// Start both player threads and the tick loop.
    ///
    /// # Panics
    ///
    /// Panics if the driver was already started.
    pub fn run(&mut self) {
        assert!(self.thread.is_none(), "main driver already running");
        let canonical = self.canonical.take().expect("canonical present until run");

        for player in &mut self.players {
            player.run();
        }

        let shared = Arc::clone(&self.shared);
        let config = self.config;
        // The tick loop only needs the merge half of each driver; the
        // threads themselves stay owned by `self` for the shutdown order.
        let merge_ports: Vec<MergePort> = self.players.iter().map(PlayerDriver::merge_port).collect();

        self.thread = Some(std::thread::spawn(move || {
            tick_loop(canonical, &merge_ports, &shared, config)
        }));
    }

    /// Suspend the tick loop and both player loops.
    ///
    /// Paused wall-clock time is excised from the tick accounting, so game
    /// time does not advance while paused.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
        for player in &self.players {
            player.pause();
        }
        tracing::info!("battle paused");
    }

    /// Resume a paused battle.
    pub fn resume(&self) {
        for player in &self.players {
            player.resume();
        }
        self.shared.paused.store(false, Ordering::SeqCst);
        tracing::info!("battle resumed");
    }

    /// Ask the tick loop to end after the current tick.
    pub fn request_stop(&self) {
        self.shared.game_over.store(true, Ordering::SeqCst);
    }

    /// Stop everything in the mandated order and return the final
    /// canonical state.
    ///
    /// Player drivers are stopped and joined first, so no buffer merge can
    /// race against a dying producer; only then is the tick loop joined.
    /// Returns `None` when the driver never ran or was already stopped.
    pub fn stop(&mut self) -> Option<State> {
        for player in &mut self.players {
            player.stop();
        }
        self.shared.game_over.store(true, Ordering::SeqCst);
        self.thread.take().and_then(|thread| match thread.join() {
            Ok(state) => Some(state),
            Err(_) => {
                tracing::error!("tick loop panicked");
                None
            }
        })
    }
}

impl Drop for MainDriver {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// The authoritative loop body, run on its own thread.
fn tick_loop(
    mut canonical: State,
    players: &[MergePort],
    shared: &MainShared,
    config: DriverConfig,
) -> State {
    let tick_budget = config.tick_budget();
    let max_ticks = config.max_ticks();
    let delta_time = Fixed::ONE;

    tracing::info!(
        ticks_per_second = config.ticks_per_second,
        max_ticks,
        "tick loop started"
    );

    while !shared.game_over.load(Ordering::SeqCst) {
        let tick_start = Instant::now();

        // Pause: spin gently; the paused span is excised from the budget
        let mut paused_for = Duration::ZERO;
        while shared.paused.load(Ordering::SeqCst) {
            if shared.game_over.load(Ordering::SeqCst) {
                return canonical;
            }
            let pause_start = Instant::now();
            std::thread::sleep(Duration::from_millis(1));
            paused_for += pause_start.elapsed();
        }

        // Merge-in: replay the command logs of every ready buffer
        let merged: Vec<bool> = players.iter().map(MergePort::is_modify_done).collect();
        for (port, &ready) in players.iter().zip(&merged) {
            if ready {
                let commands = port.drain_commands();
                canonical.replay_log(port.player_id, &commands);
            }
        }

        canonical.update(delta_time);
        let ticks = shared.ticks.fetch_add(1, Ordering::Relaxed) + 1;

        // Merge-out: only just-merged players get the fresh copy; the rest
        // keep their stale buffers until their own flag comes up
        for (port, &ready) in players.iter().zip(&merged) {
            if ready {
                port.push_canonical(&canonical);
            }
        }

        if ticks >= max_ticks {
            tracing::info!(ticks, "game duration cap reached");
            shared.game_over.store(true, Ordering::SeqCst);
            break;
        }

        let spent = tick_start.elapsed().saturating_sub(paused_for);
        if spent < tick_budget {
            std::thread::sleep(tick_budget - spent);
        }
    }

    tracing::info!(ticks = shared.ticks.load(Ordering::Relaxed), "tick loop ended");
    canonical
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::formation::FormationMaker;
    use skirmish_core::pathfinding::TerrainWeights;
    use skirmish_core::player::IdleAi;
    use skirmish_test_utils::fixtures;

    fn fast_config() -> DriverConfig {
        DriverConfig {
            ticks_per_second: 200,
            max_game_duration_ms: 60_000,
        }
    }

    #[test]
    fn test_ticks_advance_and_stop_in_order() {
        let canonical = fixtures::two_player_state();
        let mut driver = MainDriver::new(
            fast_config(),
            canonical,
            Box::new(IdleAi),
            Box::new(IdleAi),
        );
        driver.run();

        let deadline = Instant::now() + Duration::from_secs(5);
        while driver.ticks() < 5 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(driver.ticks() >= 5, "tick loop must advance");

        let final_state = driver.stop().expect("canonical returned on stop");
        assert!(final_state.tick() >= 5);
        // Second stop is a no-op
        assert!(driver.stop().is_none());
    }

    #[test]
    fn test_duration_cap_ends_the_loop() {
        let canonical = fixtures::two_player_state();
        let mut driver = MainDriver::new(
            DriverConfig {
                ticks_per_second: 500,
                max_game_duration_ms: 20,
            },
            canonical,
            Box::new(IdleAi),
            Box::new(IdleAi),
        );
        driver.run();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !driver.is_game_over() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(driver.is_game_over());

        let final_state = driver.stop().expect("canonical returned on stop");
        // 20ms of game time at 2ms per tick
        assert_eq!(final_state.tick(), 10);
    }

    #[test]
    fn test_buffered_commands_reach_canonical() {
        // An AI that orders its units east exactly once
        struct MarchAi {
            issued: bool,
        }
        impl skirmish_core::player::PlayerAi for MarchAi {
            fn update(&mut self, handler: &mut skirmish_core::player::PlayerStateHandler) {
                if self.issued {
                    return;
                }
                let units = handler.player_unit_ids();
                if units.is_empty() {
                    return;
                }
                let destination = skirmish_core::math::Vec2Fixed::new(
                    Fixed::from_num(40),
                    Fixed::from_num(40),
                );
                if handler
                    .move_units(
                        units,
                        destination,
                        FormationMaker::Grid {
                            spacing: Fixed::from_num(2),
                        },
                        TerrainWeights::uniform(),
                    )
                    .is_ok()
                {
                    self.issued = true;
                }
            }
        }

        let canonical = fixtures::two_player_state();
        let marcher = canonical.player_unit_ids(PlayerId::P1)[0];
        let start = canonical.actor(marcher).unwrap().position;

        let mut driver = MainDriver::new(
            fast_config(),
            canonical,
            Box::new(MarchAi { issued: false }),
            Box::new(IdleAi),
        );
        driver.run();

        let deadline = Instant::now() + Duration::from_secs(5);
        while driver.ticks() < 40 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let final_state = driver.stop().expect("canonical returned on stop");

        let after = final_state.actor(marcher).unwrap().position;
        assert_ne!(start, after, "the move order must reach the canonical state");
    }

    #[test]
    fn test_pause_freezes_game_time() {
        let canonical = fixtures::two_player_state();
        let mut driver = MainDriver::new(
            fast_config(),
            canonical,
            Box::new(IdleAi),
            Box::new(IdleAi),
        );
        driver.run();

        let deadline = Instant::now() + Duration::from_secs(5);
        while driver.ticks() < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        driver.pause();
        // Give the loop a moment to observe the pause flag
        std::thread::sleep(Duration::from_millis(20));
        let frozen = driver.ticks();
        std::thread::sleep(Duration::from_millis(100));
        assert!(
            driver.ticks() <= frozen + 1,
            "game time must not advance while paused"
        );

        driver.resume();
        let deadline = Instant::now() + Duration::from_secs(5);
        while driver.ticks() <= frozen + 1 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(driver.ticks() > frozen + 1);

        driver.stop();
    }
}
