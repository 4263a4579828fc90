pub mod clock;
pub mod judge;
pub mod lane;

/// The audio backend as seen by the play clock: polled once per tick, never driven.
pub trait AudioClock {
    /// Whether the backing track is currently playing.
    fn is_playing(&self) -> bool;

    /// Current playback position in milliseconds.
    fn position_ms(&self) -> f64;
}
