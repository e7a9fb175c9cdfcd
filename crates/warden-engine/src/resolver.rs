//! Conflict resolution — the core decision algorithm.
//!
//! Merges every applicable grant into a single verdict using a total
//! order; the first rule that separates two grants decides between them:
//!
//! 1. **Specificity** — instance beats type beats unscoped
//! 2. **Deny beats allow** at equal specificity (administrators can
//!    always carve out exceptions regardless of insertion order)
//! 3. Higher `priority` wins
//! 4. `Direct` beats `Delegated` beats `Role`
//! 5. Among role grants, the more privileged subject role (lower
//!    effective hierarchy level) wins
//! 6. Remaining ties keep the earliest candidate (rule 2 already
//!    guarantees a full tie cannot pit a deny against an allow)
//!
//! No applicable grant at all resolves to deny — fail-closed.

use crate::grant::{PermissionGrant, ResourceSelector};
use crate::hierarchy::HierarchyIndex;
use crate::verdict::{TrailEntry, TrailReason};
use std::cmp::Ordering;

/// Optionally-recording trail sink.
///
/// `check_permission` runs with a disabled recorder unless the debug
/// flag is set; `explain` always records.
#[derive(Debug, Default)]
pub(crate) struct TrailRecorder {
    entries: Option<Vec<TrailEntry>>,
}

impl TrailRecorder {
    /// A recorder that keeps entries.
    pub(crate) fn recording() -> Self {
        Self {
            entries: Some(Vec::new()),
        }
    }

    /// A recorder that drops entries.
    pub(crate) fn disabled() -> Self {
        Self { entries: None }
    }

    pub(crate) fn push(&mut self, grant: &PermissionGrant, reason: TrailReason) {
        if let Some(entries) = &mut self.entries {
            entries.push(TrailEntry::new(grant.clone(), reason));
        }
    }

    /// Consumes the recorder, returning collected entries (empty when
    /// disabled).
    pub(crate) fn into_entries(self) -> Vec<TrailEntry> {
        self.entries.unwrap_or_default()
    }
}

/// The rule by which one grant outranked another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Specificity,
    Polarity,
    Priority,
    Source,
    RoleLevel,
}

/// Compares two grants under the resolution total order.
///
/// Returns `Greater` if `a` outranks `b`, along with the first rule that
/// separated them.
fn compare(
    a: &PermissionGrant,
    b: &PermissionGrant,
    index: &HierarchyIndex,
) -> (Ordering, Option<Rule>) {
    let spec = a.resource.specificity().cmp(&b.resource.specificity());
    if spec != Ordering::Equal {
        return (spec, Some(Rule::Specificity));
    }

    // Deny outranks allow at equal specificity.
    let polarity = u8::from(!a.is_granted).cmp(&u8::from(!b.is_granted));
    if polarity != Ordering::Equal {
        return (polarity, Some(Rule::Polarity));
    }

    let priority = a.priority.cmp(&b.priority);
    if priority != Ordering::Equal {
        return (priority, Some(Rule::Priority));
    }

    let source = a.source.rank().cmp(&b.source.rank());
    if source != Ordering::Equal {
        return (source, Some(Rule::Source));
    }

    // Both role-sourced: more privileged subject role wins. Levels are
    // inverted so that "greater" still means "outranks".
    let level = role_level_rank(a, index).cmp(&role_level_rank(b, index));
    if level != Ordering::Equal {
        return (level, Some(Rule::RoleLevel));
    }

    (Ordering::Equal, None)
}

/// Rank for the role-level tie-break: lower effective level (more
/// privileged) ranks higher; non-role grants and unknown roles rank
/// lowest.
fn role_level_rank(grant: &PermissionGrant, index: &HierarchyIndex) -> i64 {
    grant
        .subject
        .role_id()
        .and_then(|id| index.effective_level(id))
        .map_or(i64::MIN, |level| -i64::from(level))
}

/// Prepares raw candidates for resolution: drops malformed grants,
/// grants outside their validity window, and grants whose subject does
/// not reach the user (wrong user, or a role grant the user's roles do
/// not absorb).
///
/// Malformed grants are never silently upgraded; they are logged and
/// excluded. Expired grants are dropped without noise — expiry is
/// steady-state behavior.
pub(crate) fn prepare_candidates(
    grants: Vec<PermissionGrant>,
    user: warden_types::UserId,
    held_roles: &[warden_types::RoleId],
    index: &HierarchyIndex,
    as_of: chrono::DateTime<chrono::Utc>,
    trail: &mut TrailRecorder,
) -> Vec<PermissionGrant> {
    let mut kept = Vec::with_capacity(grants.len());
    for grant in grants {
        if !grant.has_valid_shape() {
            tracing::warn!(
                subject = %grant.subject,
                code = %grant.permission_code,
                "dropping malformed grant: resource id without resource type"
            );
            trail.push(&grant, TrailReason::ExcludedInvalidShape);
            continue;
        }
        if !grant.window.contains(as_of) {
            trail.push(&grant, TrailReason::ExcludedOutsideWindow);
            continue;
        }
        match grant.subject {
            crate::grant::GrantSubject::User(id) => {
                if id != user {
                    tracing::debug!(
                        subject = %grant.subject,
                        user = %user,
                        "skipping grant for a different user"
                    );
                    continue;
                }
            }
            crate::grant::GrantSubject::Role(role_id) => {
                if !index.grant_reaches(role_id, held_roles) {
                    tracing::debug!(
                        subject = %grant.subject,
                        user = %user,
                        "role grant not absorbed by user's roles"
                    );
                    continue;
                }
            }
        }
        kept.push(grant);
    }
    kept
}

/// Resolves a candidate set into the single deciding grant.
///
/// `candidates` must already be shape-valid, temporally valid, and
/// applicable to the user; this function handles resource-scope
/// exclusion and the priority ordering. Returns `None` when no grant
/// applies (fail-closed deny).
pub(crate) fn resolve(
    candidates: Vec<PermissionGrant>,
    resource: &ResourceSelector,
    index: &HierarchyIndex,
    trail: &mut TrailRecorder,
) -> Option<PermissionGrant> {
    let mut applicable: Vec<PermissionGrant> = Vec::with_capacity(candidates.len());
    for grant in candidates {
        if grant.resource.covers(resource) {
            applicable.push(grant);
        } else {
            trail.push(&grant, TrailReason::ExcludedScopeMismatch);
        }
    }

    if applicable.is_empty() {
        return None;
    }

    for grant in &applicable {
        trail.push(grant, TrailReason::Considered);
    }

    let mut winner_idx = 0;
    for idx in 1..applicable.len() {
        let (ordering, _) = compare(&applicable[idx], &applicable[winner_idx], index);
        if ordering == Ordering::Greater {
            winner_idx = idx;
        }
    }

    for (idx, grant) in applicable.iter().enumerate() {
        if idx == winner_idx {
            trail.push(grant, TrailReason::Selected);
            continue;
        }
        let (_, rule) = compare(grant, &applicable[winner_idx], index);
        let reason = match rule {
            Some(Rule::Specificity) => TrailReason::ExcludedLowerSpecificity,
            Some(Rule::Polarity) => TrailReason::ExcludedDenyOverride,
            Some(Rule::Priority) => TrailReason::ExcludedLowerPriority,
            Some(Rule::Source) | Some(Rule::RoleLevel) | None => TrailReason::ExcludedWeakerSource,
        };
        trail.push(grant, reason);
    }

    let winner = applicable.swap_remove(winner_idx);
    tracing::debug!(
        subject = %winner.subject,
        code = %winner.permission_code,
        resource = %winner.resource,
        polarity = winner.polarity_str(),
        source = winner.source.as_str(),
        "conflict resolved"
    );
    Some(winner)
}
