//! Decision results and the explanation trail.
//!
//! Every check produces a [`Verdict`]. In explain mode the verdict also
//! carries a [`TrailEntry`] per grant the engine looked at, stating why
//! it was included or excluded — the machine-readable audit record the
//! surrounding system persists.

use crate::grant::PermissionGrant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a grant appears in the explanation trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrailReason {
    /// Grant entered the applicable candidate set.
    Considered,
    /// Grant decided the verdict.
    Selected,
    /// Lost to a grant with a narrower resource scope.
    ExcludedLowerSpecificity,
    /// Lost to a grant with a higher priority value.
    ExcludedLowerPriority,
    /// Validity window does not cover the evaluation instant.
    ExcludedOutsideWindow,
    /// Resource scope does not cover the queried resource.
    ExcludedScopeMismatch,
    /// Malformed grant (resource id without resource type).
    ExcludedInvalidShape,
    /// Lost on source ordering (direct beats delegated beats role).
    ExcludedWeakerSource,
    /// An allow overridden by a deny at equal specificity.
    ExcludedDenyOverride,
}

impl TrailReason {
    /// Returns the reason as its wire string (kebab-case).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Considered => "considered",
            Self::Selected => "selected",
            Self::ExcludedLowerSpecificity => "excluded-lower-specificity",
            Self::ExcludedLowerPriority => "excluded-lower-priority",
            Self::ExcludedOutsideWindow => "excluded-outside-window",
            Self::ExcludedScopeMismatch => "excluded-scope-mismatch",
            Self::ExcludedInvalidShape => "excluded-invalid-shape",
            Self::ExcludedWeakerSource => "excluded-weaker-source",
            Self::ExcludedDenyOverride => "excluded-deny-override",
        }
    }

    /// Returns `true` for any of the exclusion reasons.
    #[must_use]
    pub fn is_exclusion(&self) -> bool {
        !matches!(self, Self::Considered | Self::Selected)
    }
}

/// One step of the explanation trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailEntry {
    /// The grant this entry speaks about.
    pub grant: PermissionGrant,
    /// Why it was included or excluded.
    pub reason: TrailReason,
}

impl TrailEntry {
    /// Creates a trail entry.
    #[must_use]
    pub fn new(grant: PermissionGrant, reason: TrailReason) -> Self {
        Self { grant, reason }
    }
}

/// The outcome of a permission check.
///
/// A verdict is always definite: `allowed` is `true` or `false`, never
/// "unknown". When a deny was caused by an engine or adapter failure
/// rather than policy, [`error_code`](Self::error_code) carries the
/// machine-readable code so callers can distinguish the two without
/// ever being tempted to default to allow.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use warden_engine::Verdict;
///
/// let verdict = Verdict::default_deny(Utc::now());
/// assert!(verdict.is_denied());
/// assert!(!verdict.is_error());
/// assert_eq!(verdict.status_str(), "denied");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// The decision.
    pub allowed: bool,
    /// The single grant that decided the outcome, if any.
    pub matched: Option<PermissionGrant>,
    /// Ordered explanation trail (empty unless explain/debug mode).
    pub trail: Vec<TrailEntry>,
    /// The instant the decision was evaluated against.
    pub evaluated_at: DateTime<Utc>,
    /// Error code when the deny was caused by a failure, not policy.
    pub error_code: Option<String>,
}

impl Verdict {
    /// The fail-closed default: no applicable grant, deny.
    #[must_use]
    pub fn default_deny(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            matched: None,
            trail: Vec::new(),
            evaluated_at,
            error_code: None,
        }
    }

    /// A verdict decided by `matched`.
    #[must_use]
    pub fn decided(matched: PermissionGrant, evaluated_at: DateTime<Utc>) -> Self {
        Self {
            allowed: matched.is_granted,
            matched: Some(matched),
            trail: Vec::new(),
            evaluated_at,
            error_code: None,
        }
    }

    /// A fail-closed deny caused by an engine or adapter failure.
    #[must_use]
    pub fn errored(code: &'static str, evaluated_at: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            matched: None,
            trail: Vec::new(),
            evaluated_at,
            error_code: Some(code.to_string()),
        }
    }

    /// Attaches an explanation trail.
    #[must_use]
    pub fn with_trail(mut self, trail: Vec<TrailEntry>) -> Self {
        self.trail = trail;
        self
    }

    /// Returns `true` if access was allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Returns `true` if access was denied (policy or failure).
    #[must_use]
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    /// Returns `true` if the deny was caused by a failure rather than
    /// policy.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error_code.is_some()
    }

    /// Returns the status as a string ("allowed", "denied", "error").
    #[must_use]
    pub fn status_str(&self) -> &'static str {
        if self.is_error() {
            "error"
        } else if self.allowed {
            "allowed"
        } else {
            "denied"
        }
    }

    /// Returns the trail entry of the selected grant, if the trail was
    /// populated and a grant was selected.
    #[must_use]
    pub fn selected_entry(&self) -> Option<&TrailEntry> {
        self.trail
            .iter()
            .find(|e| e.reason == TrailReason::Selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::GrantSubject;
    use warden_types::{PermissionCode, UserId};

    fn grant() -> PermissionGrant {
        PermissionGrant::allow(
            GrantSubject::User(UserId::named("alice")),
            PermissionCode::parse("a.b").expect("valid code"),
        )
    }

    #[test]
    fn default_deny_is_policy_deny() {
        let verdict = Verdict::default_deny(Utc::now());
        assert!(verdict.is_denied());
        assert!(!verdict.is_error());
        assert!(verdict.matched.is_none());
        assert_eq!(verdict.status_str(), "denied");
    }

    #[test]
    fn decided_takes_polarity_from_grant() {
        let allow = Verdict::decided(grant(), Utc::now());
        assert!(allow.is_allowed());
        assert_eq!(allow.status_str(), "allowed");

        let mut deny_grant = grant();
        deny_grant.is_granted = false;
        let deny = Verdict::decided(deny_grant, Utc::now());
        assert!(deny.is_denied());
        assert!(!deny.is_error());
    }

    #[test]
    fn errored_is_deny_with_code() {
        let verdict = Verdict::errored("WARDEN_STORE_UNAVAILABLE", Utc::now());
        assert!(verdict.is_denied());
        assert!(verdict.is_error());
        assert_eq!(verdict.status_str(), "error");
        assert_eq!(
            verdict.error_code.as_deref(),
            Some("WARDEN_STORE_UNAVAILABLE")
        );
    }

    #[test]
    fn selected_entry_found() {
        let verdict = Verdict::decided(grant(), Utc::now()).with_trail(vec![
            TrailEntry::new(grant(), TrailReason::Considered),
            TrailEntry::new(grant(), TrailReason::Selected),
        ]);
        let entry = verdict.selected_entry().expect("selected entry present");
        assert_eq!(entry.reason, TrailReason::Selected);
    }

    #[test]
    fn reason_wire_strings() {
        assert_eq!(TrailReason::Considered.as_str(), "considered");
        assert_eq!(TrailReason::Selected.as_str(), "selected");
        assert_eq!(
            TrailReason::ExcludedLowerSpecificity.as_str(),
            "excluded-lower-specificity"
        );
        assert!(TrailReason::ExcludedLowerSpecificity.is_exclusion());
        assert!(!TrailReason::Selected.is_exclusion());
    }

    #[test]
    fn reason_serde_matches_wire_string() {
        for reason in [
            TrailReason::Considered,
            TrailReason::Selected,
            TrailReason::ExcludedLowerSpecificity,
            TrailReason::ExcludedLowerPriority,
            TrailReason::ExcludedOutsideWindow,
            TrailReason::ExcludedScopeMismatch,
            TrailReason::ExcludedInvalidShape,
            TrailReason::ExcludedWeakerSource,
            TrailReason::ExcludedDenyOverride,
        ] {
            let json = serde_json::to_string(&reason).expect("serialize");
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn verdict_serde_roundtrip() {
        let verdict = Verdict::decided(grant(), Utc::now())
            .with_trail(vec![TrailEntry::new(grant(), TrailReason::Selected)]);
        let json = serde_json::to_string(&verdict).expect("serialize");
        let parsed: Verdict = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, verdict);
    }
}
