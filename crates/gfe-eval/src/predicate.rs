//! Match Predicate
//!
//! Decides whether an AI event and a ground-truth event may be the same
//! real-world occurrence at a given strictness level.

use gfe_core::{Event, GfeError, Result, StrictnessLevel};

/// A strictness level bound to a time tolerance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPredicate {
    level: StrictnessLevel,
    tolerance_seconds: f64,
}

impl MatchPredicate {
    /// Create a predicate; the tolerance must be a positive, finite number of seconds
    pub fn new(level: StrictnessLevel, tolerance_seconds: f64) -> Result<Self> {
        if !tolerance_seconds.is_finite() || tolerance_seconds <= 0.0 {
            return Err(GfeError::InvalidSetting(format!(
                "tolerance must be a positive number of seconds, got {tolerance_seconds}"
            )));
        }

        Ok(Self {
            level,
            tolerance_seconds,
        })
    }

    pub fn level(&self) -> StrictnessLevel {
        self.level
    }

    pub fn tolerance_seconds(&self) -> f64 {
        self.tolerance_seconds
    }

    /// Check if two events match.
    ///
    /// Time window and action are always required. Team is compared only at
    /// `Strict`, outcome at `Strict` and `Medium`.
    pub fn matches(&self, ai: &Event, gt: &Event) -> bool {
        if ai.time_delta(gt) > self.tolerance_seconds {
            return false;
        }
        if ai.action != gt.action {
            return false;
        }
        if self.level.requires_team() && !fields_agree(ai.team.as_deref(), gt.team.as_deref()) {
            return false;
        }
        if self.level.requires_outcome()
            && !fields_agree(ai.outcome.as_deref(), gt.outcome.as_deref())
        {
            return false;
        }

        true
    }
}

/// Optional attributes agree when both are absent or both present and equal.
/// A value missing on only one side never acts as a wildcard. Comparison is
/// exact; the loader has already trimmed surrounding whitespace.
pub fn fields_agree(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(time: f64, team: &str, outcome: &str) -> Event {
        Event::new("e", time, "Shot")
            .with_team(team)
            .with_outcome(outcome)
    }

    #[test]
    fn test_rejects_bad_tolerance() {
        assert!(MatchPredicate::new(StrictnessLevel::Loose, 0.0).is_err());
        assert!(MatchPredicate::new(StrictnessLevel::Loose, -5.0).is_err());
        assert!(MatchPredicate::new(StrictnessLevel::Loose, f64::NAN).is_err());
        assert!(MatchPredicate::new(StrictnessLevel::Loose, f64::INFINITY).is_err());
    }

    #[test]
    fn test_time_window_is_inclusive() {
        let p = MatchPredicate::new(StrictnessLevel::Loose, 2.0).unwrap();
        assert!(p.matches(&shot(10.0, "home", "Point"), &shot(12.0, "home", "Point")));
        assert!(!p.matches(&shot(10.0, "home", "Point"), &shot(12.5, "home", "Point")));
    }

    #[test]
    fn test_action_always_required() {
        let ai = shot(10.0, "home", "Point");
        let gt = Event::new("g", 10.0, "Kickout")
            .with_team("home")
            .with_outcome("Point");

        for level in StrictnessLevel::ALL {
            let p = MatchPredicate::new(level, 20.0).unwrap();
            assert!(!p.matches(&ai, &gt), "{level} must compare actions");
        }
    }

    #[test]
    fn test_action_compared_exactly() {
        let ai = Event::new("a", 10.0, "shot");
        let gt = Event::new("g", 11.0, "Shot");

        for level in StrictnessLevel::ALL {
            let p = MatchPredicate::new(level, 20.0).unwrap();
            assert!(!p.matches(&ai, &gt), "{level} must not fold case");
        }
    }

    #[test]
    fn test_levels() {
        let ai = shot(10.0, "home", "Point");
        let other_team = shot(12.0, "away", "Point");
        let other_outcome = shot(12.0, "home", "Wide");

        let strict = MatchPredicate::new(StrictnessLevel::Strict, 20.0).unwrap();
        let medium = MatchPredicate::new(StrictnessLevel::Medium, 20.0).unwrap();
        let loose = MatchPredicate::new(StrictnessLevel::Loose, 20.0).unwrap();

        assert!(!strict.matches(&ai, &other_team));
        assert!(medium.matches(&ai, &other_team));
        assert!(loose.matches(&ai, &other_team));

        assert!(!strict.matches(&ai, &other_outcome));
        assert!(!medium.matches(&ai, &other_outcome));
        assert!(loose.matches(&ai, &other_outcome));
    }

    #[test]
    fn test_missing_outcome_is_not_a_wildcard() {
        let ai = Event::new("a", 10.0, "Shot").with_team("home");
        let gt = shot(10.0, "home", "Point");

        let medium = MatchPredicate::new(StrictnessLevel::Medium, 20.0).unwrap();
        let loose = MatchPredicate::new(StrictnessLevel::Loose, 20.0).unwrap();

        assert!(!medium.matches(&ai, &gt));
        assert!(!medium.matches(&gt, &ai));
        assert!(loose.matches(&ai, &gt));
    }

    #[test]
    fn test_fields_agree() {
        assert!(fields_agree(None, None));
        assert!(fields_agree(Some("Point"), Some("Point")));
        assert!(!fields_agree(Some("Point"), Some("point")));
        assert!(!fields_agree(Some("Point"), None));
        assert!(!fields_agree(None, Some("Point")));
        assert!(!fields_agree(Some("Point"), Some("Goal")));
    }
}
