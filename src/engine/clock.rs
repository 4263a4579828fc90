use crate::engine::AudioClock;
use crate::model::config::PlayConfig;
use log::info;
use serde::Serialize;
use std::time::Instant;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The backing track has not started; nothing is judged.
    PreRoll,
    /// Elapsed time follows the audio position.
    Synced,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ClockSample {
    pub elapsed_ms: f64,
    pub phase: Phase,
}

/// Reconciles wall-clock time, the pre-roll and the audio position into one
/// elapsed-time value per tick.
#[derive(Debug, Clone)]
pub struct PlayClock {
    grace_period_ms: f64,
    audio_offset_ms: f64,
    synced: bool,
}

impl PlayClock {
    pub fn new(config: &PlayConfig) -> Self {
        Self {
            grace_period_ms: config.grace_period_ms,
            audio_offset_ms: config.audio_offset_ms,
            synced: false,
        }
    }

    /// `wall_ms` is time since the attempt started. Once the audio has been seen
    /// playing the clock stays synced to it until [`PlayClock::reset`].
    pub fn sample(&mut self, wall_ms: f64, audio: &impl AudioClock) -> ClockSample {
        if !self.synced && audio.is_playing() {
            self.synced = true;
            info!("Audio playback started at {:.3}ms wall time, syncing to it..!", wall_ms);
        }

        if self.synced {
            ClockSample {
                elapsed_ms: audio.position_ms() + self.audio_offset_ms,
                phase: Phase::Synced,
            }
        } else {
            ClockSample {
                elapsed_ms: wall_ms - self.grace_period_ms,
                phase: Phase::PreRoll,
            }
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn reset(&mut self) {
        self.synced = false;
    }
}

/// Milliseconds of wall time since construction.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
