//! Game context shared between the main loop and worker threads

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::{format_short_with_limit, ClockError, TurnClock};
use crate::config::AppConfig;
use crate::delegate::Function0Delegate;
use crate::turns::{TeamId, TurnSystem};
use crate::world::WorldLootList;

use super::messages::LoopMessage;

/// Everything a running game needs, constructed once and passed to the loop
pub struct GameContext {
    config: AppConfig,
    clock: Arc<TurnClock>,
    turns: Arc<TurnSystem>,
    loot: Arc<WorldLootList>,
    on_start_running_clock: Function0Delegate,
    sender: Sender<LoopMessage>,
    inbox: Receiver<LoopMessage>,
}

impl GameContext {
    /// Spawn the turn clock and wire it to the turn system:
    /// - every granted turn resets and starts the clock
    /// - an expired clock posts [`LoopMessage::TurnTimeOver`]
    /// - starting the clock for the first time begins the first turn
    pub fn new(config: AppConfig, turns: Arc<TurnSystem>) -> Result<Self, ClockError> {
        let policy = config.dispatch.policy;
        let clock = Arc::new(TurnClock::spawn(config.clock.to_clock_config(policy))?);
        let loot = WorldLootList::attached(&turns);
        let (sender, inbox) = unbounded();

        let weak_clock = Arc::downgrade(&clock);
        turns.on_turn_get().register(move |_: &TeamId| {
            if let Some(clock) = weak_clock.upgrade() {
                clock.reset();
                clock.start();
            }
        });

        let time_over = sender.clone();
        let expiring = Arc::downgrade(&turns);
        clock.on_time_over().register_fn(move || {
            let Some(turns) = expiring.upgrade() else {
                return;
            };
            let turn = turns.turn_number();
            if time_over.send(LoopMessage::TurnTimeOver { turn }).is_err() {
                warn!("Main loop is gone, dropping time-over notice");
            }
        });

        let on_start_running_clock = Function0Delegate::with_policy(policy);
        let first_turn = turns.clone();
        on_start_running_clock.register_once_fn(move || first_turn.begin());

        Ok(Self {
            config,
            clock,
            turns,
            loot,
            on_start_running_clock,
            sender,
            inbox,
        })
    }

    /// Begin the first turn and let the clock run
    pub fn start_game(&self) {
        info!("Starting game with {} team(s)", self.turns.teams().len());
        self.on_start_running_clock.fire();
    }

    /// Handle messages posted since the last frame. Must be called from the main
    /// loop. Returns false once a shutdown was requested.
    pub fn update(&self) -> bool {
        let mut keep_running = true;
        for message in self.inbox.try_iter() {
            match message {
                LoopMessage::TurnTimeOver { turn } if turn != self.turns.turn_number() => {
                    debug!("Ignoring time-over notice for turn {}, which already ended", turn);
                }
                LoopMessage::TurnTimeOver { .. } => {
                    info!("Time is up for {}", self.turns.active_team().id());
                    self.end_turn();
                }
                LoopMessage::Shutdown => keep_running = false,
            }
        }
        keep_running
    }

    /// Pass the turn to the next team
    pub fn end_turn(&self) -> TeamId {
        self.turns.next_turn()
    }

    /// Handle for posting messages from other threads
    pub fn sender(&self) -> Sender<LoopMessage> {
        self.sender.clone()
    }

    /// Remaining turn time as `MM:SS`.
    ///
    /// Unbounded turns, and values the short format cannot hold, fall back to
    /// the clock's own display text.
    pub fn remaining_short(&self) -> String {
        let remaining = match self.clock.remaining() {
            Ok(remaining) => remaining,
            Err(_) => return self.clock.display_string(),
        };
        let millis = i64::try_from(remaining.as_millis()).unwrap_or(i64::MAX);
        match format_short_with_limit(millis, self.config.clock.short_format_limit_ms) {
            Ok(text) => text,
            Err(e) => {
                warn!("{}", e);
                self.clock.display_string()
            }
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn clock(&self) -> &TurnClock {
        &self.clock
    }

    pub fn turns(&self) -> &Arc<TurnSystem> {
        &self.turns
    }

    pub fn loot(&self) -> &Arc<WorldLootList> {
        &self.loot
    }

    pub fn on_start_running_clock(&self) -> &Function0Delegate {
        &self.on_start_running_clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::DispatchPolicy;
    use crate::turns::{Player, Team};
    use crate::world::{Loot, LootKind};
    use std::thread;
    use std::time::{Duration, Instant};

    fn context(turn_duration_ms: Option<u64>) -> GameContext {
        context_with_teams(turn_duration_ms, 2)
    }

    fn context_with_teams(turn_duration_ms: Option<u64>, team_count: usize) -> GameContext {
        let policy = DispatchPolicy::Propagate;
        let teams = (0..team_count)
            .map(|i| {
                let corner = (i as i32 * 10 + 2, i as i32 * 10 + 2);
                Team::new(TeamId(i), Player::new(format!("Player {i}"), corner, 2, (28, 25), policy))
            })
            .collect();
        let turns = Arc::new(TurnSystem::new(teams, policy).unwrap());
        let mut config = AppConfig::default();
        config.clock.turn_duration_ms = turn_duration_ms;
        config.clock.tick_interval_ms = 2;
        config.clock.idle_interval_ms = 5;
        GameContext::new(config, turns).unwrap()
    }

    #[test]
    fn test_start_game_runs_clock() {
        let ctx = context(Some(60_000));
        assert!(!ctx.clock().is_running());

        ctx.start_game();
        assert!(ctx.clock().is_running());
        assert_eq!(ctx.turns().active_team().id(), TeamId(0));

        // Only the first start begins a turn
        ctx.on_start_running_clock().fire();
        assert_eq!(ctx.turns().active_team().id(), TeamId(0));
    }

    #[test]
    fn test_end_turn_resets_clock() {
        let ctx = context(Some(60_000));
        ctx.start_game();
        thread::sleep(Duration::from_millis(30));
        assert!(ctx.clock().elapsed() > Duration::ZERO);

        assert_eq!(ctx.end_turn(), TeamId(1));
        assert!(ctx.clock().is_running());
        assert!(ctx.clock().elapsed() < Duration::from_millis(30));
    }

    #[test]
    fn test_time_over_ends_turn_on_update() {
        let ctx = context(Some(50));
        ctx.start_game();

        let deadline = Instant::now() + Duration::from_secs(5);
        while ctx.turns().active_team().id() == TeamId(0) {
            assert!(Instant::now() < deadline, "turn never ended");
            assert!(ctx.update());
            thread::sleep(Duration::from_millis(5));
        }
        // The next team's turn started a fresh countdown
        assert!(ctx.clock().is_running());
    }

    #[test]
    fn test_stale_time_over_ignored_after_manual_end_turn() {
        let ctx = context_with_teams(Some(30), 3);
        let (expired_tx, expired_rx) = crossbeam_channel::bounded(1);
        ctx.clock().on_time_over().register_fn(move || {
            let _ = expired_tx.try_send(());
        });
        ctx.start_game();

        expired_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("clock never expired");
        // Keep the next turn from expiring while the check runs
        ctx.clock().set_turn_duration(Some(Duration::from_secs(60)));
        // Team 0 ends its turn by hand before the loop sees the notice
        assert_eq!(ctx.end_turn(), TeamId(1));

        assert!(ctx.update());
        assert_eq!(ctx.turns().active_team().id(), TeamId(1));
    }

    #[test]
    fn test_shutdown_message_stops_update() {
        let ctx = context(Some(60_000));
        let sender = ctx.sender();
        thread::spawn(move || sender.send(LoopMessage::Shutdown).unwrap())
            .join()
            .unwrap();
        assert!(!ctx.update());
    }

    #[test]
    fn test_remaining_short() {
        let ctx = context(Some(120_000));
        assert_eq!(ctx.remaining_short(), "02:00");

        let infinite = context(None);
        assert_eq!(infinite.remaining_short(), infinite.clock().display_string());
    }

    #[test]
    fn test_remaining_short_falls_back_above_limit() {
        let ctx = context(Some(100 * 60_000));
        assert_eq!(ctx.remaining_short(), "100:00:000");
    }

    #[test]
    fn test_loot_follows_turns() {
        let ctx = context(Some(60_000));
        ctx.start_game();
        ctx.loot()
            .add(Loot::new(LootKind::Treasure, "Treasure", 24, 22))
            .unwrap();
        assert_eq!(ctx.loot().visible_len(), 0);

        ctx.end_turn();
        assert_eq!(ctx.loot().visible_len(), 1);
    }
}
