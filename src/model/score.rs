use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rating {
    Perfect,
    Good,
    Bad,
    Miss,
}

impl Rating {
    pub fn points(self) -> u64 {
        match self {
            Rating::Perfect => 300,
            Rating::Good => 100,
            Rating::Bad => 50,
            Rating::Miss => 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    Sss,
    Ss,
    S,
    A,
    B,
    C,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Grade::Sss => "SSS",
            Grade::Ss => "SS",
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
        };
        f.write_str(label)
    }
}

/// Grade tiers, strictest first. The first tier whose threshold the percentage
/// meets wins, so the order here is load-bearing.
pub const GRADE_THRESHOLDS: &[(Grade, f64)] = &[
    (Grade::Sss, 100.0),
    (Grade::Ss, 90.0),
    (Grade::S, 80.0),
    (Grade::A, 70.0),
    (Grade::B, 60.0),
    (Grade::C, 0.0),
];

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Score {
    pub perfect: u32,
    pub good: u32,
    pub bad: u32,
    pub miss: u32,
    pub combo: u32,
    pub max_combo: u32,
    pub total_notes: u32,
}

impl Score {
    pub fn new(total_notes: usize) -> Self {
        Self {
            total_notes: total_notes as u32,
            ..Self::default()
        }
    }

    pub fn add_hit(&mut self, rating: Rating) {
        match rating {
            Rating::Perfect => self.perfect += 1,
            Rating::Good => self.good += 1,
            Rating::Bad => self.bad += 1,
            Rating::Miss => self.miss += 1,
        }

        if rating == Rating::Miss {
            self.combo = 0;
        } else {
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
        }
    }

    pub fn judged(&self) -> u32 {
        self.perfect + self.good + self.bad + self.miss
    }

    pub fn score(&self) -> u64 {
        self.perfect as u64 * Rating::Perfect.points()
            + self.good as u64 * Rating::Good.points()
            + self.bad as u64 * Rating::Bad.points()
            + self.miss as u64 * Rating::Miss.points()
    }

    /// Share of the chart hit Perfect or Good, in percent.
    pub fn percentage(&self) -> f64 {
        if self.total_notes == 0 {
            return 0.0;
        }

        (self.perfect + self.good) as f64 * 100.0 / self.total_notes as f64
    }

    /// Points earned against the best possible points for what was judged so far.
    pub fn accuracy(&self) -> f64 {
        let judged = self.judged();
        if judged == 0 {
            return 0.0;
        }

        self.score() as f64 * 100.0 / (judged as u64 * Rating::Perfect.points()) as f64
    }

    pub fn grade(&self) -> Grade {
        if self.total_notes == 0 {
            return Grade::C;
        }

        let percentage = self.percentage();
        GRADE_THRESHOLDS
            .iter()
            .find(|(_, threshold)| percentage >= *threshold)
            .map(|(grade, _)| *grade)
            .unwrap_or(Grade::C)
    }

    pub fn summary(&self) -> ScoreSummary {
        ScoreSummary {
            score: self.score(),
            grade: self.grade().to_string(),
            percentage: self.percentage(),
            accuracy: self.accuracy(),
            perfect: self.perfect,
            good: self.good,
            bad: self.bad,
            miss: self.miss,
            max_combo: self.max_combo,
            total_notes: self.total_notes,
        }
    }
}

/// Snapshot of a finished attempt, shaped for export.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    pub score: u64,
    pub grade: String,
    pub percentage: f64,
    pub accuracy: f64,
    pub perfect: u32,
    pub good: u32,
    pub bad: u32,
    pub miss: u32,
    pub max_combo: u32,
    pub total_notes: u32,
}
