use crate::model::chart::{Difficulty, LaneId};

// -----------------------------------------------------------------------------
// Hardcoded pitch blocks, one octave apart:
//
//   Easy   60..=64 (C4..E4)
//   Medium 72..=76 (C5..E5)
//   Hard   84..=88 (C6..E6)
//   Expert 96..=100 (C7..E7)
//
// Within a block the pitches map onto the lanes left to right.
// -----------------------------------------------------------------------------

/// Lowest pitch of the block used by `difficulty`.
pub fn base_pitch(difficulty: Difficulty) -> u8 {
    match difficulty {
        Difficulty::Easy => 60,
        Difficulty::Medium => 72,
        Difficulty::Hard => 84,
        Difficulty::Expert => 96,
    }
}

/// Return the lane a pitch plays on for the given difficulty, if any.
pub fn lane_for_pitch(difficulty: Difficulty, pitch: u8) -> Option<LaneId> {
    let offset = pitch.checked_sub(base_pitch(difficulty))?;
    LaneId::ALL.get(offset as usize).copied()
}

/// Inverse of [`lane_for_pitch`], handy when authoring charts.
pub fn pitch_for_lane(difficulty: Difficulty, lane: LaneId) -> u8 {
    base_pitch(difficulty) + lane.index() as u8
}
