use crate::error::ConfigError;
use crate::model::score::Rating;
use serde::{Deserialize, Serialize};

/// Tolerance bands around a note's target, tightest first. All in milliseconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct HitWindows {
    pub perfect_ms: f64,
    pub good_ms: f64,
    pub bad_ms: f64,
}

impl Default for HitWindows {
    fn default() -> Self {
        Self {
            perfect_ms: 40.0,
            good_ms: 50.0,
            bad_ms: 60.0,
        }
    }
}

impl HitWindows {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ascending = self.perfect_ms > 0.0
            && self.perfect_ms < self.good_ms
            && self.good_ms < self.bad_ms
            && self.bad_ms.is_finite();

        if !ascending {
            return Err(ConfigError::HitWindows {
                perfect: self.perfect_ms,
                good: self.good_ms,
                bad: self.bad_ms,
            });
        }

        Ok(())
    }
}

/// Classify a signed timing error. Deltas landing exactly on a threshold fall
/// to the coarser band.
pub fn judge(delta_ms: f64, windows: &HitWindows) -> Rating {
    let delta = delta_ms.abs();

    if delta < windows.perfect_ms {
        Rating::Perfect
    } else if delta < windows.good_ms {
        Rating::Good
    } else if delta < windows.bad_ms {
        Rating::Bad
    } else {
        Rating::Miss
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bands() {
        let windows = HitWindows::default();

        assert_eq!(judge(0.0, &windows), Rating::Perfect);
        assert_eq!(judge(5.0, &windows), Rating::Perfect);
        assert_eq!(judge(45.0, &windows), Rating::Good);
        assert_eq!(judge(55.0, &windows), Rating::Bad);
        assert_eq!(judge(500.0, &windows), Rating::Miss);
    }

    #[test]
    fn boundaries_are_exclusive() {
        let windows = HitWindows::default();

        assert_eq!(judge(39.0, &windows), Rating::Perfect);
        assert_eq!(judge(40.0, &windows), Rating::Good);
        assert_eq!(judge(49.0, &windows), Rating::Good);
        assert_eq!(judge(50.0, &windows), Rating::Bad);
        assert_eq!(judge(59.0, &windows), Rating::Bad);
        assert_eq!(judge(60.0, &windows), Rating::Miss);
    }

    #[test]
    fn early_and_late_are_symmetric() {
        let windows = HitWindows::default();

        for delta in [0.0, 12.5, 39.9, 40.0, 49.0, 50.0, 59.9, 60.0, 1000.0] {
            assert_eq!(judge(delta, &windows), judge(-delta, &windows), "delta {}", delta);
        }
    }

    #[test]
    fn window_validation() {
        assert!(HitWindows::default().validate().is_ok());

        let unordered = HitWindows {
            perfect_ms: 50.0,
            good_ms: 40.0,
            bad_ms: 60.0,
        };
        assert!(matches!(
            unordered.validate(),
            Err(ConfigError::HitWindows { .. })
        ));

        let zero = HitWindows {
            perfect_ms: 0.0,
            ..HitWindows::default()
        };
        assert!(zero.validate().is_err());
    }
}
