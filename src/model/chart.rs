use crate::error::ChartError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five input lanes, in fixed left-to-right order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LaneId {
    Green,
    Red,
    Yellow,
    Blue,
    Orange,
}

impl LaneId {
    pub const ALL: [LaneId; 5] = [
        LaneId::Green,
        LaneId::Red,
        LaneId::Yellow,
        LaneId::Blue,
        LaneId::Orange,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            LaneId::Green => "green",
            LaneId::Red => "red",
            LaneId::Yellow => "yellow",
            LaneId::Blue => "blue",
            LaneId::Orange => "orange",
        }
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Difficulty {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "e" | "easy" => Ok(Difficulty::Easy),
            "m" | "medium" => Ok(Difficulty::Medium),
            "h" | "hard" => Ok(Difficulty::Hard),
            "x" | "expert" => Ok(Difficulty::Expert),
            _ => Err(ChartError::UnknownDifficulty(s.to_owned())),
        }
    }
}

/// Non-interactive guide line drawn across the highway.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Beat,
    Measure,
}

/// A single timed target. All times are milliseconds from the song start.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Note {
    pub target: i64,
    /// Release target for hold notes, `None` for taps.
    pub target_release: Option<i64>,
    pub hit_time: Option<i64>,
    pub release_time: Option<i64>,
    /// Rendering hint only, 0 when far away and 1 on target.
    #[serde(skip)]
    pub progress: f32,
    pub marker: Option<MarkerKind>,
}

impl Note {
    pub fn tap(target: i64) -> Self {
        Self {
            target,
            target_release: None,
            hit_time: None,
            release_time: None,
            progress: 0.0,
            marker: None,
        }
    }

    pub fn hold(target: i64, target_release: i64) -> Self {
        Self {
            target_release: Some(target_release),
            ..Self::tap(target)
        }
    }

    pub fn marker(target: i64, kind: MarkerKind) -> Self {
        Self {
            marker: Some(kind),
            ..Self::tap(target)
        }
    }

    pub fn is_hold(&self) -> bool {
        self.target_release.is_some()
    }

    pub fn is_marker(&self) -> bool {
        self.marker.is_some()
    }

    pub fn is_hit(&self) -> bool {
        self.hit_time.is_some()
    }

    /// Clears everything a play attempt wrote into the note.
    pub fn reset(&mut self) {
        self.hit_time = None;
        self.release_time = None;
        self.progress = 0.0;
    }
}

/// The ordered note list of one lane, as built by the importer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Lane {
    pub id: LaneId,
    pub notes: Vec<Note>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SongMetadata {
    pub bpm: f64,
    pub division: u16,
    pub length_ms: i64,
    /// Tempo found in the file itself; informational only.
    pub file_bpm: Option<f64>,
}

impl SongMetadata {
    pub fn ms_per_beat(&self) -> f64 {
        60_000.0 / self.bpm
    }

    pub fn ms_per_tick(&self) -> f64 {
        self.ms_per_beat() / self.division as f64
    }

    /// Absolute tick to ms in one step, so long songs never accumulate drift.
    pub fn tick_to_ms(&self, tick: u64) -> f64 {
        tick as f64 * 60_000.0 / (self.bpm * self.division as f64)
    }

    /// Sustains no longer than a 32nd note count as taps.
    pub fn min_hold_duration_ms(&self) -> f64 {
        self.ms_per_beat() / 8.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Chart {
    pub metadata: SongMetadata,
    pub difficulty: Difficulty,
    pub total_notes: usize,
    pub lanes: Vec<Lane>,
    pub guides: Vec<Note>,
}

impl Chart {
    pub fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.iter().find(|lane| lane.id == id)
    }

    pub fn hold_count(&self) -> usize {
        self.lanes
            .iter()
            .flat_map(|lane| lane.notes.iter())
            .filter(|note| note.is_hold())
            .count()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn difficulty_labels() {
        assert_eq!("Expert".parse::<Difficulty>().unwrap(), Difficulty::Expert);
        assert_eq!(" x ".parse::<Difficulty>().unwrap(), Difficulty::Expert);
        assert_eq!("e".parse::<Difficulty>().unwrap(), Difficulty::Easy);

        for difficulty in Difficulty::ALL {
            assert_eq!(difficulty.label().parse::<Difficulty>().unwrap(), difficulty);
        }
    }

    #[test]
    fn unknown_difficulty_is_recoverable() {
        let err = "nightmare".parse::<Difficulty>().unwrap_err();
        assert!(matches!(err, ChartError::UnknownDifficulty(ref label) if label == "nightmare"));
    }

    #[test]
    fn tempo_derived_lengths() {
        let metadata = SongMetadata {
            bpm: 120.0,
            division: 480,
            length_ms: 0,
            file_bpm: None,
        };

        assert_eq!(metadata.ms_per_beat(), 500.0);
        assert_eq!(metadata.ms_per_tick(), 500.0 / 480.0);
        assert_eq!(metadata.tick_to_ms(480), 500.0);
        assert_eq!(metadata.tick_to_ms(480 * 1000), 500_000.0);
        assert_eq!(metadata.min_hold_duration_ms(), 62.5);
    }

    #[test]
    fn note_reset_keeps_targets() {
        let mut note = Note::hold(100, 400);
        note.hit_time = Some(101);
        note.release_time = Some(390);
        note.progress = 1.0;

        note.reset();
        assert_eq!(note, Note::hold(100, 400));
    }
}
