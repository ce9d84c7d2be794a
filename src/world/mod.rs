//! World objects and their visible subset
//!
//! [`VisibleSubsetCache`] keeps every placed object plus the list of objects the
//! active player can currently see. The visible list is rebuilt from scratch on
//! every add, successful remove, turn change and player move, so drawing only
//! walks what is on screen.

pub mod loot;
pub mod vision;

pub use loot::{Loot, LootId, LootKind};
pub use vision::{VisionError, VisionMap, VisionQuery, VisionStatus};

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

use crate::turns::TurnSystem;

/// Something that sits on a grid tile and can be told apart from its peers
pub trait Placed {
    type Id: PartialEq + Copy + fmt::Debug;

    fn id(&self) -> Self::Id;
    fn grid_position(&self) -> (i32, i32);
}

/// Every placed loot, plus the ones not hidden from the active player
pub type WorldLootList = VisibleSubsetCache<Loot>;

/// Master collection with a derived, vision-filtered view
pub struct VisibleSubsetCache<T> {
    items: Mutex<Vec<Arc<T>>>,
    visible: Mutex<Vec<Arc<T>>>,
    vision: Arc<dyn VisionQuery>,
    /// Completed rebuilds of the visible list
    generation: AtomicU64,
}

impl<T> VisibleSubsetCache<T>
where
    T: Placed + Send + Sync + 'static,
{
    pub fn new(vision: Arc<dyn VisionQuery>) -> Self {
        Self {
            items: Mutex::new(Vec::with_capacity(20)),
            visible: Mutex::new(Vec::with_capacity(12)),
            vision,
            generation: AtomicU64::new(0),
        }
    }

    /// Create a cache that refreshes itself whenever a team gets the turn or
    /// any team's player moves.
    pub fn attached(turns: &Arc<TurnSystem>) -> Arc<Self> {
        let cache = Arc::new(Self::new(turns.clone()));
        cache.subscribe(turns);
        cache
    }

    /// Register the refresh with the turn system and every team head
    pub fn subscribe(self: &Arc<Self>, turns: &TurnSystem) {
        let weak = Arc::downgrade(self);
        turns.on_turn_get().register(move |team| {
            refresh_from_event(&weak, &format!("turn granted to {team}"));
        });

        for team in turns.teams() {
            let weak = Arc::downgrade(self);
            let name = team.head().name().to_string();
            team.head().on_location_changed().register(move |_| {
                refresh_from_event(&weak, &format!("{name} moved"));
            });
        }
    }

    /// Place an item and refresh the visible list
    pub fn add(&self, item: T) -> Result<Arc<T>, VisionError> {
        let item = Arc::new(item);
        self.items.lock().push(item.clone());
        self.update_visible()?;
        Ok(item)
    }

    /// Remove the item with `id`. Returns the removed item, or `None` without
    /// touching the visible list when no such item is placed.
    pub fn remove(&self, id: T::Id) -> Result<Option<Arc<T>>, VisionError> {
        let removed = {
            let mut items = self.items.lock();
            items
                .iter()
                .position(|item| item.id() == id)
                .map(|index| items.remove(index))
        };

        if removed.is_some() {
            self.update_visible()?;
        }
        Ok(removed)
    }

    /// Rebuild the visible list from the master list and the current vision.
    /// Returns the number of visible items.
    ///
    /// A failing vision query leaves the visible list empty and returns the
    /// error; serving the previous list would hide the failure.
    ///
    /// Lock order is `visible` then `items`. The master list is read while the
    /// visible list is held, so a rebuild that finishes last has seen every
    /// change made before it started.
    pub fn update_visible(&self) -> Result<usize, VisionError> {
        let mut visible = self.visible.lock();
        let items: Vec<Arc<T>> = self.items.lock().clone();

        visible.clear();
        for item in items {
            let (x, y) = item.grid_position();
            match self.vision.vision_status_of(x, y) {
                Ok(VisionStatus::Hidden) => {}
                Ok(_) => visible.push(item),
                Err(e) => {
                    visible.clear();
                    return Err(e);
                }
            }
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        debug!("Visible subset rebuilt: {} item(s)", visible.len());
        Ok(visible.len())
    }

    /// Snapshot of every placed item
    pub fn items(&self) -> Vec<Arc<T>> {
        self.items.lock().clone()
    }

    /// Snapshot of the items not hidden from the active player
    pub fn visible(&self) -> Vec<Arc<T>> {
        self.visible.lock().clone()
    }

    /// Walk the visible items under the lock, e.g. to draw them
    pub fn for_each_visible(&self, mut f: impl FnMut(&T)) {
        for item in self.visible.lock().iter() {
            f(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn visible_len(&self) -> usize {
        self.visible.lock().len()
    }

    /// Number of completed rebuilds, bumps on every successful refresh
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl VisibleSubsetCache<Loot> {
    /// Pick up the loot with `id`
    pub fn collect(&self, id: LootId) -> Result<Option<Arc<Loot>>, VisionError> {
        self.remove(id)
    }
}

fn refresh_from_event<T>(cache: &Weak<VisibleSubsetCache<T>>, trigger: &str)
where
    T: Placed + Send + Sync + 'static,
{
    let Some(cache) = cache.upgrade() else {
        return;
    };
    if let Err(e) = cache.update_visible() {
        error!("Failed to refresh visible subset after {}: {}", trigger, e);
    }
}

impl<T> fmt::Debug for VisibleSubsetCache<T>
where
    T: Placed + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible = self.visible_len();
        f.debug_struct("VisibleSubsetCache")
            .field("items", &*self.items.lock())
            .field("visible", &visible)
            .finish()
    }
}
