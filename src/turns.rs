//! Teams, players and turn order
//!
//! The turn system hands the turn from team to team and announces every change
//! through delegates. Subscribers run on whichever thread advances the turn,
//! which in the game is always the main loop.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::{debug, info};

use crate::delegate::{Delegate, DispatchPolicy, Function0Delegate};
use crate::world::vision::{VisionError, VisionMap, VisionQuery, VisionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeamId(pub usize);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team {}", self.0)
    }
}

/// Life value changed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifeChangedEvent {
    pub new_life: f64,
}

/// Hit points of an entity
pub struct Life {
    max_life: f64,
    regeneration: f64,
    life: Mutex<f64>,
    on_life_changed: Delegate<LifeChangedEvent>,
    on_death: Arc<Function0Delegate>,
}

impl Life {
    /// `max_life` must be positive
    pub fn new(max_life: f64, regeneration: f64, starting_life: f64, policy: DispatchPolicy) -> Self {
        debug_assert!(max_life > 0.0);
        let on_death = Arc::new(Function0Delegate::with_policy(policy));
        let on_life_changed = Delegate::with_policy(policy);

        let death = on_death.clone();
        on_life_changed.register(move |event: &LifeChangedEvent| {
            if event.new_life <= 0.0 {
                death.fire();
            }
        });

        Self {
            max_life,
            regeneration,
            life: Mutex::new(starting_life),
            on_life_changed,
            on_death,
        }
    }

    pub fn life(&self) -> f64 {
        *self.life.lock()
    }

    pub fn max_life(&self) -> f64 {
        self.max_life
    }

    /// Life in percent of the maximum
    pub fn relative_life(&self) -> f64 {
        self.life() / self.max_life * 100.0
    }

    pub fn set_life(&self, new_life: f64) {
        *self.life.lock() = new_life;
        self.on_life_changed.call(&LifeChangedEvent { new_life });
    }

    /// Apply one turn of regeneration, capped at the maximum
    pub fn regenerate(&self) {
        let new_life = (self.life() + self.regeneration).min(self.max_life);
        self.set_life(new_life);
    }

    pub fn on_life_changed(&self) -> &Delegate<LifeChangedEvent> {
        &self.on_life_changed
    }

    /// Fired when life drops to zero or below
    pub fn on_death(&self) -> &Function0Delegate {
        &self.on_death
    }
}

/// An entity moved to another tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationChangedEvent {
    pub from: (i32, i32),
    pub to: (i32, i32),
}

/// Player-controlled entity heading a team
pub struct Player {
    name: String,
    position: Mutex<(i32, i32)>,
    sight_radius: i32,
    vision: VisionMap,
    life: Life,
    on_location_changed: Delegate<LocationChangedEvent>,
    on_turn_get: Function0Delegate,
}

impl Player {
    pub fn new(
        name: impl Into<String>,
        position: (i32, i32),
        sight_radius: i32,
        world_size: (usize, usize),
        policy: DispatchPolicy,
    ) -> Self {
        let vision = VisionMap::new(world_size.0, world_size.1);
        vision.update_sight(position.0, position.1, sight_radius);
        Self {
            name: name.into(),
            position: Mutex::new(position),
            sight_radius,
            vision,
            life: Life::new(400.0, 3.0, 400.0, policy),
            on_location_changed: Delegate::with_policy(policy),
            on_turn_get: Function0Delegate::with_policy(policy),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> (i32, i32) {
        *self.position.lock()
    }

    pub fn vision(&self) -> &VisionMap {
        &self.vision
    }

    pub fn life(&self) -> &Life {
        &self.life
    }

    /// Move to a tile, update the sight and announce the move.
    /// Subscribers see the new vision state.
    pub fn move_to(&self, grid_x: i32, grid_y: i32) {
        let from = std::mem::replace(&mut *self.position.lock(), (grid_x, grid_y));
        self.vision.update_sight(grid_x, grid_y, self.sight_radius);
        debug!("{} moved from {:?} to ({}, {})", self.name, from, grid_x, grid_y);
        self.on_location_changed.call(&LocationChangedEvent {
            from,
            to: (grid_x, grid_y),
        });
    }

    pub fn on_location_changed(&self) -> &Delegate<LocationChangedEvent> {
        &self.on_location_changed
    }

    /// Fired whenever this player's team receives the turn
    pub fn on_turn_get(&self) -> &Function0Delegate {
        &self.on_turn_get
    }
}

/// A team commanded by one player
pub struct Team {
    id: TeamId,
    head: Arc<Player>,
    extra_damage: Mutex<f32>,
}

impl Team {
    pub fn new(id: TeamId, head: Player) -> Arc<Self> {
        Arc::new(Self {
            id,
            head: Arc::new(head),
            extra_damage: Mutex::new(1.0),
        })
    }

    pub fn id(&self) -> TeamId {
        self.id
    }

    pub fn head(&self) -> &Arc<Player> {
        &self.head
    }

    /// Damage multiplier, 1.0 without bonus
    pub fn extra_damage(&self) -> f32 {
        *self.extra_damage.lock()
    }

    /// Raise the damage multiplier until this team's next turn
    pub fn grant_damage_bonus(self: &Arc<Self>, bonus: f32) {
        *self.extra_damage.lock() += bonus;
        let team: Weak<Team> = Arc::downgrade(self);
        self.head.on_turn_get().register_once_fn(move || {
            if let Some(team) = team.upgrade() {
                *team.extra_damage.lock() -= bonus;
            }
        });
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("a turn system needs at least one team")]
    NoTeams,
}

/// Turn order over a fixed set of teams
pub struct TurnSystem {
    teams: Vec<Arc<Team>>,
    current: Mutex<usize>,
    /// Turns granted so far
    turn_number: AtomicU64,
    on_turn_get: Delegate<TeamId>,
    on_turn_ended: Delegate<TeamId>,
}

impl TurnSystem {
    pub fn new(teams: Vec<Arc<Team>>, policy: DispatchPolicy) -> Result<Self, TurnError> {
        if teams.is_empty() {
            return Err(TurnError::NoTeams);
        }
        Ok(Self {
            teams,
            current: Mutex::new(0),
            turn_number: AtomicU64::new(0),
            on_turn_get: Delegate::with_policy(policy),
            on_turn_ended: Delegate::with_policy(policy),
        })
    }

    pub fn teams(&self) -> &[Arc<Team>] {
        &self.teams
    }

    pub fn active_team(&self) -> &Arc<Team> {
        &self.teams[*self.current.lock()]
    }

    pub fn active_player(&self) -> &Arc<Player> {
        self.active_team().head()
    }

    /// Grant the first turn to the current team
    pub fn begin(&self) {
        self.grant(self.active_team().clone());
    }

    /// End the current team's turn and pass it to the next team
    pub fn next_turn(&self) -> TeamId {
        let (ended, next) = {
            let mut current = self.current.lock();
            let ended = self.teams[*current].clone();
            *current = (*current + 1) % self.teams.len();
            (ended, self.teams[*current].clone())
        };
        self.on_turn_ended.call(&ended.id());
        self.grant(next.clone());
        next.id()
    }

    /// Number of turns granted so far. Changes before any turn subscriber runs.
    pub fn turn_number(&self) -> u64 {
        self.turn_number.load(Ordering::SeqCst)
    }

    fn grant(&self, team: Arc<Team>) {
        let turn = self.turn_number.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Turn {} granted to {} ({})", turn, team.id(), team.head().name());
        self.on_turn_get.call(&team.id());
        team.head().on_turn_get().fire();
    }

    /// Fired with the team that receives the turn
    pub fn on_turn_get(&self) -> &Delegate<TeamId> {
        &self.on_turn_get
    }

    pub fn on_turn_ended(&self) -> &Delegate<TeamId> {
        &self.on_turn_ended
    }
}

/// The world as seen by the player whose turn it is
impl VisionQuery for TurnSystem {
    fn vision_status_of(&self, grid_x: i32, grid_y: i32) -> Result<VisionStatus, VisionError> {
        self.active_player().vision().vision_status_of(grid_x, grid_y)
    }
}
