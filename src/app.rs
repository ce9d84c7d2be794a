//! Main Loop
//!
//! Runs the single-threaded game loop at a fixed frame rate. Each frame flushes
//! coalesced pointer input, handles messages from worker threads, then hands a
//! snapshot of the clock and world state to the draw callback.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::input::MouseHandler;
use crate::shared::GameContext;
use crate::turns::TeamId;

/// What the draw step gets to see each frame
#[derive(Debug, Clone)]
pub struct FrameInfo {
    /// Frame counter, starting at 0
    pub frame: u64,
    /// Pointer callbacks run this frame
    pub input_callbacks: usize,
    /// Team whose turn it is
    pub active_team: TeamId,
    /// Clock text, `MM:SS:mmm`
    pub clock_text: String,
    /// Remaining time, `MM:SS` where it fits
    pub clock_short: String,
    /// Loot entries visible to the active player
    pub visible_loot: usize,
}

/// Totals of one [`GameApp::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub frames: u64,
    pub input_callbacks: usize,
}

/// Main loop coordinator
pub struct GameApp<E> {
    context: GameContext,
    mouse: Arc<MouseHandler<E>>,
    frame_time: Duration,
}

impl<E: Send + 'static> GameApp<E> {
    pub fn new(context: GameContext, mouse: Arc<MouseHandler<E>>) -> Self {
        let frame_time = context.config().game_loop.frame_time();
        Self {
            context,
            mouse,
            frame_time,
        }
    }

    pub fn context(&self) -> &GameContext {
        &self.context
    }

    /// Handler to register with the input dispatch thread
    pub fn mouse_handler(&self) -> Arc<MouseHandler<E>> {
        self.mouse.clone()
    }

    /// Run one frame without waiting. Returns `None` once a shutdown was
    /// requested.
    pub fn step(&self, frame: u64) -> Option<FrameInfo> {
        let input_callbacks = self.mouse.flush_callbacks();
        if !self.context.update() {
            return None;
        }

        Some(FrameInfo {
            frame,
            input_callbacks,
            active_team: self.context.turns().active_team().id(),
            clock_text: self.context.clock().display_string(),
            clock_short: self.context.remaining_short(),
            visible_loot: self.context.loot().visible_len(),
        })
    }

    /// Loop until `max_frames` frames ran or a shutdown message arrives
    pub fn run<F>(&self, max_frames: Option<u64>, mut draw: F) -> LoopReport
    where
        F: FnMut(&FrameInfo),
    {
        info!(
            "Main loop starting at {:.1} fps",
            1.0 / self.frame_time.as_secs_f64()
        );
        let mut report = LoopReport::default();

        while max_frames.map_or(true, |max| report.frames < max) {
            let frame_start = Instant::now();
            let Some(info) = self.step(report.frames) else {
                debug!("Shutdown requested");
                break;
            };
            report.input_callbacks += info.input_callbacks;
            draw(&info);
            report.frames += 1;

            if let Some(rest) = self.frame_time.checked_sub(frame_start.elapsed()) {
                thread::sleep(rest);
            }
        }

        info!("Main loop stopped after {} frame(s)", report.frames);
        report
    }
}
