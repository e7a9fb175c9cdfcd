//! Validity windows and the temporal filter.
//!
//! Grants and delegations carry an optional validity window. The engine
//! evaluates every check at an explicit instant (`as_of`), so windows are
//! absolute [`DateTime<Utc>`] pairs rather than process-relative clocks —
//! this is what makes retroactive "what would have been allowed" queries
//! and deterministic tests possible.
//!
//! # Boundary Semantics
//!
//! A window covers `as_of` iff:
//!
//! ```text
//! (valid_from is None or valid_from <= as_of)   -- inclusive lower bound
//! and (valid_until is None or valid_until > as_of)  -- strict upper bound
//! ```
//!
//! A grant whose `valid_until` equals `as_of` is already expired.
//! Expiry is expected steady-state behavior, not a fault: expired grants
//! are dropped without error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An optional validity window, open-ended on either side.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use warden_engine::ValidityWindow;
///
/// let now = Utc::now();
///
/// // Open window: always valid
/// assert!(ValidityWindow::open().contains(now));
///
/// // Bounded window: inclusive from, strict until
/// let window = ValidityWindow::between(now, now + Duration::hours(1));
/// assert!(window.contains(now));                         // from == as_of: valid
/// assert!(!window.contains(now + Duration::hours(1)));   // until == as_of: expired
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// Instant the window opens, or `None` for "since forever".
    pub valid_from: Option<DateTime<Utc>>,
    /// Instant the window closes, or `None` for "until revoked".
    pub valid_until: Option<DateTime<Utc>>,
}

impl ValidityWindow {
    /// Creates a window with no bounds (always valid).
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Creates a window bounded on both sides.
    #[must_use]
    pub fn between(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            valid_from: Some(from),
            valid_until: Some(until),
        }
    }

    /// Creates a window open from `from` with no upper bound.
    #[must_use]
    pub fn starting(from: DateTime<Utc>) -> Self {
        Self {
            valid_from: Some(from),
            valid_until: None,
        }
    }

    /// Creates a window valid until `until` with no lower bound.
    #[must_use]
    pub fn expiring(until: DateTime<Utc>) -> Self {
        Self {
            valid_from: None,
            valid_until: Some(until),
        }
    }

    /// Returns `true` if the window covers `as_of`.
    ///
    /// Lower bound is inclusive, upper bound is strict.
    #[must_use]
    pub fn contains(&self, as_of: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if from > as_of {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if until <= as_of {
                return false;
            }
        }
        true
    }

    /// Returns `true` if the window has an upper bound.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.valid_until.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid timestamp")
    }

    #[test]
    fn open_window_always_contains() {
        let window = ValidityWindow::open();
        assert!(window.contains(t0()));
        assert!(window.contains(t0() + Duration::days(365 * 100)));
        assert!(!window.is_bounded());
    }

    #[test]
    fn lower_bound_is_inclusive() {
        let window = ValidityWindow::starting(t0());
        assert!(window.contains(t0()));
        assert!(window.contains(t0() + Duration::seconds(1)));
        assert!(!window.contains(t0() - Duration::seconds(1)));
    }

    #[test]
    fn upper_bound_is_strict() {
        let window = ValidityWindow::expiring(t0());
        assert!(!window.contains(t0()));
        assert!(window.contains(t0() - Duration::seconds(1)));
        assert!(window.is_bounded());
    }

    #[test]
    fn bounded_window() {
        let window = ValidityWindow::between(t0(), t0() + Duration::hours(1));
        assert!(!window.contains(t0() - Duration::seconds(1)));
        assert!(window.contains(t0()));
        assert!(window.contains(t0() + Duration::minutes(30)));
        assert!(!window.contains(t0() + Duration::hours(1)));
        assert!(!window.contains(t0() + Duration::hours(2)));
    }

    #[test]
    fn default_is_open() {
        assert_eq!(ValidityWindow::default(), ValidityWindow::open());
    }

    #[test]
    fn serde_roundtrip() {
        let window = ValidityWindow::between(t0(), t0() + Duration::hours(1));
        let json = serde_json::to_string(&window).expect("serialize");
        let parsed: ValidityWindow = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, window);
    }
}
