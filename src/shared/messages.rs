//! Messages posted to the main loop from other threads

/// Work the main loop picks up on its next frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMessage {
    /// The turn clock ran out during turn number `turn`. Ignored if that turn
    /// already ended by the time the message is handled.
    TurnTimeOver { turn: u64 },
    /// Leave the main loop after the current frame
    Shutdown,
}
