//! Turn clock
//!
//! Counts down the time a team has for its turn on a dedicated thread. The main
//! loop only reads [`TurnClock::display_string`] and toggles the run state; the
//! clock thread owns the elapsed counter and the display text.

pub mod format;

pub use format::{format_millis, format_short, format_short_with_limit, FormatError, SHORT_FORMAT_LIMIT_MS};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::delegate::{DispatchPolicy, Function0Delegate};

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("turn time is infinite, there is no remaining time")]
    InfiniteTurn,
    #[error("failed to spawn turn clock thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Turn time choices offered before a game starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnTimePreset {
    TenMinutes,
    FiveMinutes,
    ThreeMinutes,
    #[default]
    TwoMinutes,
    OneMinute,
    FortySeconds,
}

impl TurnTimePreset {
    pub const ALL: [TurnTimePreset; 6] = [
        TurnTimePreset::TenMinutes,
        TurnTimePreset::FiveMinutes,
        TurnTimePreset::ThreeMinutes,
        TurnTimePreset::TwoMinutes,
        TurnTimePreset::OneMinute,
        TurnTimePreset::FortySeconds,
    ];

    pub fn duration(&self) -> Duration {
        match self {
            TurnTimePreset::TenMinutes => Duration::from_secs(10 * 60),
            TurnTimePreset::FiveMinutes => Duration::from_secs(5 * 60),
            TurnTimePreset::ThreeMinutes => Duration::from_secs(3 * 60),
            TurnTimePreset::TwoMinutes => Duration::from_secs(2 * 60),
            TurnTimePreset::OneMinute => Duration::from_secs(60),
            TurnTimePreset::FortySeconds => Duration::from_secs(40),
        }
    }

    /// Display label for the selection box
    pub fn label(&self) -> &'static str {
        match self {
            TurnTimePreset::TenMinutes => "10 min",
            TurnTimePreset::FiveMinutes => "5 min",
            TurnTimePreset::ThreeMinutes => "3 min",
            TurnTimePreset::TwoMinutes => "2 min",
            TurnTimePreset::OneMinute => "1 min",
            TurnTimePreset::FortySeconds => "40 sec",
        }
    }
}

/// Turn clock configuration
#[derive(Debug, Clone)]
pub struct ClockConfig {
    /// Time per turn, `None` for an unbounded turn
    pub turn_duration: Option<Duration>,
    /// Sampling interval while running
    pub tick_interval: Duration,
    /// Sleep interval while stopped
    pub idle_interval: Duration,
    /// Failure policy of the "time over" delegate
    pub dispatch_policy: DispatchPolicy,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            turn_duration: Some(TurnTimePreset::default().duration()),
            tick_interval: Duration::from_millis(5),
            idle_interval: Duration::from_millis(15),
            dispatch_policy: DispatchPolicy::default(),
        }
    }
}

/// Shortest wait between two samples; zero would spin the clock thread
const MIN_INTERVAL: Duration = Duration::from_millis(1);

enum ClockSignal {
    Wake,
    Shutdown,
}

#[derive(Debug)]
struct ClockState {
    running: bool,
    elapsed: Duration,
    last_sample: Option<Instant>,
    turn_duration: Option<Duration>,
    display: String,
    /// Set once "time over" has been reported for the current turn
    expiry_reported: bool,
}

impl ClockState {
    fn new(turn_duration: Option<Duration>) -> Self {
        let initial = turn_duration.map(as_millis).unwrap_or(0);
        Self {
            running: false,
            elapsed: Duration::ZERO,
            last_sample: None,
            turn_duration,
            display: format_millis(initial),
            expiry_reported: false,
        }
    }

    /// Accumulate time up to `now`. Returns true when the turn has just expired
    /// and the expiry has not been reported yet.
    fn advance(&mut self, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        if let Some(previous) = self.last_sample {
            self.elapsed += now.saturating_duration_since(previous);
        }
        self.last_sample = Some(now);

        match self.turn_duration {
            Some(turn) if self.elapsed >= turn => {
                self.running = false;
                self.last_sample = None;
                self.display = format_millis(0);
                !std::mem::replace(&mut self.expiry_reported, true)
            }
            Some(turn) => {
                self.display = format_millis(as_millis(turn - self.elapsed));
                false
            }
            // Unbounded turns count up
            None => {
                self.display = format_millis(as_millis(self.elapsed));
                false
            }
        }
    }
}

fn as_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

struct ClockShared {
    state: Mutex<ClockState>,
    on_time_over: Function0Delegate,
}

/// Countdown timer running on its own thread
pub struct TurnClock {
    shared: Arc<ClockShared>,
    signals: Sender<ClockSignal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TurnClock {
    /// Spawn the clock thread. The clock starts stopped.
    pub fn spawn(config: ClockConfig) -> Result<Self, ClockError> {
        let shared = Arc::new(ClockShared {
            state: Mutex::new(ClockState::new(config.turn_duration)),
            on_time_over: Function0Delegate::with_policy(config.dispatch_policy),
        });
        let (signals, receiver) = bounded(1);
        let tick_interval = config.tick_interval.max(MIN_INTERVAL);
        let idle_interval = config.idle_interval.max(MIN_INTERVAL);

        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("turn-clock".to_string())
            .spawn(move || {
                run_clock(thread_shared, receiver, tick_interval, idle_interval)
            })?;

        Ok(Self {
            shared,
            signals,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Let the time run. No-op if already running.
    pub fn start(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.running {
                return;
            }
            state.running = true;
            state.last_sample = Some(Instant::now());
        }
        info!("Turn clock started");
        // Cut the idle sleep short; a full buffer already holds a wake-up
        if let Err(TrySendError::Disconnected(_)) = self.signals.try_send(ClockSignal::Wake) {
            warn!("Turn clock thread is not running");
        }
    }

    /// Freeze the time. No-op if already stopped.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if state.running {
            state.running = false;
            state.last_sample = None;
            info!("Turn clock stopped");
        }
    }

    /// Zero the elapsed time without touching the run state.
    ///
    /// The display text is refreshed by the next tick, so a stopped clock keeps
    /// showing its last value until it is started again.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        state.elapsed = Duration::ZERO;
        state.expiry_reported = false;
        if state.running {
            state.last_sample = Some(Instant::now());
        }
        debug!("Turn clock reset");
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Time accumulated while running since the last reset
    pub fn elapsed(&self) -> Duration {
        self.shared.state.lock().elapsed
    }

    /// Text to draw, `MM:SS:mmm`
    pub fn display_string(&self) -> String {
        self.shared.state.lock().display.clone()
    }

    pub fn turn_duration(&self) -> Option<Duration> {
        self.shared.state.lock().turn_duration
    }

    /// Change the time per turn, `None` for unbounded turns. Takes effect on the
    /// next tick; a stopped clock at zero shows the new duration right away.
    pub fn set_turn_duration(&self, turn_duration: Option<Duration>) {
        let mut state = self.shared.state.lock();
        state.turn_duration = turn_duration;
        state.expiry_reported = false;
        if !state.running && state.elapsed.is_zero() {
            state.display = format_millis(turn_duration.map(as_millis).unwrap_or(0));
        }
        info!("Turn duration set to {:?}", turn_duration);
    }

    pub fn is_turn_time_infinite(&self) -> bool {
        self.shared.state.lock().turn_duration.is_none()
    }

    /// Time left in the current turn.
    ///
    /// Fails with [`ClockError::InfiniteTurn`] when no turn duration is set.
    pub fn remaining(&self) -> Result<Duration, ClockError> {
        let state = self.shared.state.lock();
        let turn = state.turn_duration.ok_or(ClockError::InfiniteTurn)?;
        Ok(turn.saturating_sub(state.elapsed))
    }

    /// Fired on the clock thread, once per expiry
    pub fn on_time_over(&self) -> &Function0Delegate {
        &self.shared.on_time_over
    }

    /// Stop the clock thread and wait for it to exit. Idempotent.
    pub fn shutdown(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        let _ = self.signals.send(ClockSignal::Shutdown);
        if handle.join().is_err() {
            warn!("Turn clock thread panicked");
        }
    }
}

impl Drop for TurnClock {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_clock(
    shared: Arc<ClockShared>,
    signals: Receiver<ClockSignal>,
    tick_interval: Duration,
    idle_interval: Duration,
) {
    debug!("Turn clock thread started");
    loop {
        let (expired, running) = {
            let mut state = shared.state.lock();
            let expired = state.advance(Instant::now());
            (expired, state.running)
        };

        if expired {
            info!("Turn time is over");
            shared.on_time_over.fire();
        }

        let wait = if running { tick_interval } else { idle_interval };
        match signals.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(ClockSignal::Wake) => trace!("Turn clock woken early"),
            Ok(ClockSignal::Shutdown) => break,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Turn clock control channel closed");
                break;
            }
        }
    }
    debug!("Turn clock thread exiting");
}
