//! Tile visibility as seen by the active player

use parking_lot::RwLock;
use thiserror::Error;

/// Per-tile visibility classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisionStatus {
    /// Never seen
    #[default]
    Hidden,
    /// Seen before, not in sight now
    Revealed,
    /// Currently in sight
    Visible,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisionError {
    #[error("tile ({x}, {y}) is outside the {width}x{height} world")]
    OutOfBounds { x: i32, y: i32, width: usize, height: usize },
    #[error("vision query failed: {0}")]
    Query(String),
}

/// Answers visibility questions for grid coordinates
pub trait VisionQuery: Send + Sync {
    fn vision_status_of(&self, grid_x: i32, grid_y: i32) -> Result<VisionStatus, VisionError>;
}

/// Row-major visibility grid
#[derive(Debug)]
pub struct VisionMap {
    width: usize,
    height: usize,
    tiles: RwLock<Vec<VisionStatus>>,
}

impl VisionMap {
    /// Create a map with every tile hidden
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            tiles: RwLock::new(vec![VisionStatus::Hidden; width * height]),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, grid_x: i32, grid_y: i32) -> Result<usize, VisionError> {
        let out_of_bounds = || VisionError::OutOfBounds {
            x: grid_x,
            y: grid_y,
            width: self.width,
            height: self.height,
        };
        let x = usize::try_from(grid_x).map_err(|_| out_of_bounds())?;
        let y = usize::try_from(grid_y).map_err(|_| out_of_bounds())?;
        if x >= self.width || y >= self.height {
            return Err(out_of_bounds());
        }
        Ok(y * self.width + x)
    }

    pub fn set_status(&self, grid_x: i32, grid_y: i32, status: VisionStatus) -> Result<(), VisionError> {
        let index = self.index(grid_x, grid_y)?;
        self.tiles.write()[index] = status;
        Ok(())
    }

    /// Mark tiles within `radius` (Chebyshev distance) of the center as visible
    /// and demote previously visible tiles to revealed.
    pub fn update_sight(&self, center_x: i32, center_y: i32, radius: i32) {
        let mut tiles = self.tiles.write();
        for tile in tiles.iter_mut() {
            if *tile == VisionStatus::Visible {
                *tile = VisionStatus::Revealed;
            }
        }
        for y in (center_y - radius)..=(center_y + radius) {
            for x in (center_x - radius)..=(center_x + radius) {
                if let Ok(index) = self.index(x, y) {
                    tiles[index] = VisionStatus::Visible;
                }
            }
        }
    }
}

impl VisionQuery for VisionMap {
    fn vision_status_of(&self, grid_x: i32, grid_y: i32) -> Result<VisionStatus, VisionError> {
        let index = self.index(grid_x, grid_y)?;
        Ok(self.tiles.read()[index])
    }
}
