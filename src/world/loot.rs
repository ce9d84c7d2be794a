//! Loot lying on the world grid

use std::fmt;
use uuid::Uuid;

use super::Placed;

/// Stable identity of a placed loot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LootId(Uuid);

impl LootId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LootId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LootKind {
    /// Dropped by a dead entity
    BagOfLoots,
    /// Spawned by the world
    Treasure,
}

/// A loot placed on a tile
#[derive(Debug, Clone, PartialEq)]
pub struct Loot {
    pub id: LootId,
    pub name: String,
    pub kind: LootKind,
    pub grid_x: i32,
    pub grid_y: i32,
}

impl Loot {
    pub fn new(kind: LootKind, name: impl Into<String>, grid_x: i32, grid_y: i32) -> Self {
        Self {
            id: LootId::new(),
            name: name.into(),
            kind,
            grid_x,
            grid_y,
        }
    }

    /// Bag dropped where `dead_name` died
    pub fn bag_from(dead_name: &str, grid_x: i32, grid_y: i32) -> Self {
        Self::new(
            LootKind::BagOfLoots,
            format!("BagOfLoots [from {dead_name}]"),
            grid_x,
            grid_y,
        )
    }
}

impl Placed for Loot {
    type Id = LootId;

    fn id(&self) -> LootId {
        self.id
    }

    fn grid_position(&self) -> (i32, i32) {
        (self.grid_x, self.grid_y)
    }
}
