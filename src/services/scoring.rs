//! Time-decayed scoring for correct answers.

use thiserror::Error;

/// Points for a correct answer given instantly.
pub const MAX_POINTS: u32 = 1000;
/// Points for a correct answer given at the very end of the window.
pub const MIN_POINTS: u32 = 200;

/// Rejected point bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreRulesError {
    /// A correct answer must always be worth something.
    #[error("minimum points must be strictly positive")]
    ZeroFloor,
    /// The floor must sit below the ceiling.
    #[error("minimum points ({min}) must be lower than maximum points ({max})")]
    Inverted {
        /// Configured floor.
        min: u32,
        /// Configured ceiling.
        max: u32,
    },
}

/// Linear decay from `max_points` at zero elapsed time to `min_points` at the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRules {
    min_points: u32,
    max_points: u32,
}

impl Default for ScoreRules {
    fn default() -> Self {
        Self {
            min_points: MIN_POINTS,
            max_points: MAX_POINTS,
        }
    }
}

impl ScoreRules {
    /// Build rules, enforcing `0 < min_points < max_points`.
    pub fn new(min_points: u32, max_points: u32) -> Result<Self, ScoreRulesError> {
        if min_points == 0 {
            return Err(ScoreRulesError::ZeroFloor);
        }
        if min_points >= max_points {
            return Err(ScoreRulesError::Inverted {
                min: min_points,
                max: max_points,
            });
        }
        Ok(Self {
            min_points,
            max_points,
        })
    }

    /// Points for a correct answer given after `elapsed_ms` of a `duration_ms` window.
    ///
    /// A missing elapsed time (no recorded question start) and a zero-length
    /// window both earn the floor.
    pub fn points_for(&self, elapsed_ms: Option<u64>, duration_ms: u64) -> u32 {
        let Some(elapsed_ms) = elapsed_ms else {
            return self.min_points;
        };
        if duration_ms == 0 {
            return self.min_points;
        }

        let remaining = duration_ms.saturating_sub(elapsed_ms);
        let span = u64::from(self.max_points - self.min_points);
        let bonus = remaining.saturating_mul(span) / duration_ms;

        let points = u64::from(self.min_points).saturating_add(bonus);
        points.clamp(u64::from(self.min_points), u64::from(self.max_points)) as u32
    }
}

/// Score with the default bounds.
pub fn score(elapsed_ms: u64, duration_ms: u64) -> u32 {
    ScoreRules::default().points_for(Some(elapsed_ms), duration_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_answer_earns_the_ceiling() {
        assert_eq!(score(0, 15_000), MAX_POINTS);
    }

    #[test]
    fn answer_at_deadline_earns_the_floor() {
        assert_eq!(score(15_000, 15_000), MIN_POINTS);
        assert_eq!(score(40_000, 15_000), MIN_POINTS);
    }

    #[test]
    fn decay_is_linear_and_floored() {
        // 14_500 ms left out of 15_000 -> 773.33 bonus points.
        assert_eq!(score(500, 15_000), 973);
        // 1_000 ms left -> 53.33 bonus points.
        assert_eq!(score(14_000, 15_000), 253);
        assert_eq!(score(7_500, 15_000), 600);
    }

    #[test]
    fn first_second_answers_score_at_least_950() {
        for elapsed in [0, 250, 500, 900] {
            assert!(score(elapsed, 15_000) >= 950, "elapsed {elapsed}");
        }
    }

    #[test]
    fn score_is_bounded_and_non_increasing() {
        let duration = 15_000;
        let mut previous = u32::MAX;
        for elapsed in (0..=duration).step_by(37) {
            let points = score(elapsed, duration);
            assert!((MIN_POINTS..=MAX_POINTS).contains(&points));
            assert!(points <= previous);
            previous = points;
        }
    }

    #[test]
    fn missing_start_time_scores_the_floor() {
        let rules = ScoreRules::default();
        assert_eq!(rules.points_for(None, 15_000), MIN_POINTS);
        assert_eq!(rules.points_for(Some(0), 0), MIN_POINTS);
    }

    #[test]
    fn custom_bounds_are_validated() {
        assert_eq!(ScoreRules::new(0, 100), Err(ScoreRulesError::ZeroFloor));
        assert_eq!(
            ScoreRules::new(500, 500),
            Err(ScoreRulesError::Inverted { min: 500, max: 500 })
        );

        let rules = ScoreRules::new(100, 500).unwrap();
        assert_eq!(rules.points_for(Some(0), 10_000), 500);
        assert_eq!(rules.points_for(Some(5_000), 10_000), 300);
        assert_eq!(rules.points_for(Some(10_000), 10_000), 100);
    }
}
