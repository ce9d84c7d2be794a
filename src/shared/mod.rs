//! Game context and messaging between worker threads and the main loop
//!
//! The context owns the turn clock, the turn system and the world loot list and
//! wires their delegates together. Worker threads never mutate turn order
//! themselves; they post a [`LoopMessage`] that the main loop handles.

pub mod state;
pub mod messages;

pub use state::GameContext;
pub use messages::LoopMessage;
