//! Pfeile - headless run of the turn coordination core
//!
//! Drives the main loop with a synthetic input thread so the clock, input
//! coalescing and loot visibility can be watched in the log.

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pfeile_sync::app::GameApp;
use pfeile_sync::config::{self, AppConfig};
use pfeile_sync::input::{InputMode, InputTarget, MouseHandler};
use pfeile_sync::shared::GameContext;
use pfeile_sync::storage;
use pfeile_sync::turns::{Player, Team, TeamId, TurnSystem};
use pfeile_sync::world::{Loot, LootKind, WorldLootList};

const WORLD_SIZE: (usize, usize) = (28, 25);

/// Pfeile - turn clock and input coordination demo
#[derive(Parser, Debug)]
#[command(name = "pfeile")]
#[command(about = "Runs the turn clock, input coalescing and loot visibility headless")]
struct Args {
    /// Seconds per turn (overrides the config file)
    #[arg(short, long)]
    turn_seconds: Option<u64>,

    /// Unbounded turns
    #[arg(long)]
    infinite: bool,

    /// Frames to run before exiting
    #[arg(short, long, default_value = "600")]
    frames: u64,

    /// Deliver pointer events on the input thread instead of the main loop
    #[arg(long)]
    direct_input: bool,
}

/// Pointer event as delivered by the input thread
#[derive(Debug, Clone, Copy)]
struct PointerEvent {
    grid_x: i32,
    grid_y: i32,
}

/// Active screen: picks up visible loot under a click
struct WorldScreen {
    loot: Arc<WorldLootList>,
    hover: Mutex<Option<(i32, i32)>>,
}

impl InputTarget<PointerEvent> for WorldScreen {
    fn mouse_pressed(&self, event: &PointerEvent) {
        let target = self
            .loot
            .visible()
            .into_iter()
            .find(|loot| (loot.grid_x, loot.grid_y) == (event.grid_x, event.grid_y));

        if let Some(loot) = target {
            match self.loot.collect(loot.id) {
                Ok(Some(loot)) => info!("Collected {} at ({}, {})", loot.name, loot.grid_x, loot.grid_y),
                Ok(None) => debug!("{} was already collected", loot.name),
                Err(e) => warn!("Collecting failed: {}", e),
            }
        }
    }

    fn mouse_moved(&self, event: &PointerEvent) {
        *self.hover.lock() = Some((event.grid_x, event.grid_y));
    }
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = load_or_create_config();
    if let Some(seconds) = args.turn_seconds {
        config.clock.turn_duration_ms = Some(seconds * 1_000);
    }
    if args.infinite {
        config.clock.turn_duration_ms = None;
    }
    if args.direct_input {
        config.input.mode = InputMode::Direct;
    }

    let policy = config.dispatch.policy;
    let turns = Arc::new(TurnSystem::new(
        vec![
            Team::new(TeamId(0), Player::new("Player", (3, 3), 3, WORLD_SIZE, policy)),
            Team::new(TeamId(1), Player::new("Opponent", (24, 21), 3, WORLD_SIZE, policy)),
        ],
        policy,
    )?);
    let input_mode = config.input.mode;
    let context = GameContext::new(config, turns)?;

    for (x, y) in [(4, 4), (5, 2), (14, 12), (23, 20)] {
        context.loot().add(Loot::new(LootKind::Treasure, "Treasure", x, y))?;
    }
    context.loot().add(Loot::bag_from("Goblin", 2, 5))?;

    let screen = Arc::new(WorldScreen {
        loot: context.loot().clone(),
        hover: Mutex::new(None),
    });
    let mouse = Arc::new(MouseHandler::new(
        screen.clone() as Arc<dyn InputTarget<PointerEvent>>,
        input_mode,
    ));
    let app = GameApp::new(context, mouse);

    let (stop_input, input_stopped) = bounded::<()>(1);
    let input_thread = {
        let mouse = app.mouse_handler();
        thread::Builder::new()
            .name("input-dispatch".to_string())
            .spawn(move || run_synthetic_input(mouse, input_stopped))?
    };

    app.context().start_game();
    let report = app.run(Some(args.frames), |frame| {
        if frame.frame % 60 == 0 {
            info!(
                "[{}] {} | {} | {} loot visible | hover {:?}",
                frame.active_team,
                frame.clock_text,
                frame.clock_short,
                frame.visible_loot,
                *screen.hover.lock()
            );
        }
    });

    let _ = stop_input.send(());
    if input_thread.join().is_err() {
        warn!("Input thread panicked");
    }

    info!(
        "Ran {} frame(s), {} pointer callback(s), {} loot left",
        report.frames,
        report.input_callbacks,
        app.context().loot().len()
    );
    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config() -> AppConfig {
    if let Ok(config_path) = storage::config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return config;
                }
                Err(e) => warn!("Ignoring {:?}: {}", config_path, e),
            }
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

/// Stand-in for the windowing system's dispatch thread: sweeps the pointer
/// across the map in bursts and clicks every few sweeps.
fn run_synthetic_input(mouse: Arc<MouseHandler<PointerEvent>>, stop: crossbeam_channel::Receiver<()>) {
    let (width, height) = (WORLD_SIZE.0 as i32, WORLD_SIZE.1 as i32);
    let mut step: i32 = 0;
    loop {
        for i in 0..5 {
            mouse.mouse_moved(PointerEvent {
                grid_x: (step + i) % width,
                grid_y: (step / 2) % height,
            });
        }
        if step % 7 == 0 {
            let event = PointerEvent {
                grid_x: step % width,
                grid_y: step % height,
            };
            mouse.mouse_pressed(event);
            mouse.mouse_released(event);
        }
        step = step.wrapping_add(1);

        match stop.recv_timeout(Duration::from_millis(4)) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Synthetic input stopped");
}
