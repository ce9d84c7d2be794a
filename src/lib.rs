//! Pfeile coordination core
//!
//! Cross-thread plumbing of the Pfeile turn-based strategy game: event
//! delegates, the turn clock thread, pointer input coalescing and the
//! vision-filtered world loot list.

pub mod app;
pub mod clock;
pub mod config;
pub mod delegate;
pub mod input;
pub mod shared;
pub mod storage;
pub mod turns;
pub mod world;
