use thiserror::Error;

/// Structural failures while decoding a chart, plus chart selection errors.
#[derive(Debug, Error, PartialEq)]
pub enum ChartError {
    #[error("Bad chunk tag at byte {offset}: expected {expected:?}, found {found:?}")]
    BadMagic {
        offset: usize,
        expected: [u8; 4],
        found: [u8; 4],
    },

    #[error("Unexpected end of data at byte {offset} while reading {context}")]
    Truncated { offset: usize, context: &'static str },

    #[error("Variable-length quantity at byte {offset} is longer than 4 bytes")]
    VlqOverflow { offset: usize },

    #[error("Data byte {byte:#04x} at byte {offset} with no running status to reuse")]
    MissingRunningStatus { offset: usize, byte: u8 },

    #[error("Unsupported event status {status:#04x} at byte {offset}")]
    UnsupportedEvent { offset: usize, status: u8 },

    #[error("Invalid timing: {0}")]
    InvalidTiming(String),

    #[error("Unknown difficulty '{0}'")]
    UnknownDifficulty(String),
}

/// Rejected play settings.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Hit windows must be positive and ascending, got perfect={perfect} good={good} bad={bad}")]
    HitWindows { perfect: f64, good: f64, bad: f64 },

    #[error("Scroll speed must be a positive number, got {0}")]
    Speed(f64),

    #[error("Travel time must be a positive number of milliseconds, got {0}")]
    TravelTime(f64),

    #[error("Tick rate must be between 1 and 10000 Hz, got {0}")]
    TickRate(u32),
}
