//! Identifier types for Warden.
//!
//! All identifiers are UUID-based so they are safe to transmit across
//! process boundaries and to persist without coordination.

use serde::{Deserialize, Serialize};
use uuid::{uuid, Uuid};

/// Warden namespace UUID for deterministic UUID v5 generation.
///
/// Used to derive stable identifiers for entities that are seeded by
/// code rather than created at runtime (well-known roles, fixture users).
const WARDEN_NAMESPACE: Uuid = uuid!("6f1c9d6e-2a47-4c5b-9a33-ef0e3b1d8c52");

/// Identifier for a user (the subject of permission checks).
///
/// A user is *who* is acting. What they are allowed to do is decided by
/// the engine from their grants, roles, and delegations — identity and
/// permission are deliberately separate concerns.
///
/// # UUID Strategy
///
/// - [`new`](Self::new) — random UUID v4 for users created at runtime
/// - [`named`](Self::named) — deterministic UUID v5 from a label, stable
///   across processes (useful for fixtures and seeded accounts)
///
/// # Example
///
/// ```
/// use warden_types::UserId;
///
/// let alice1 = UserId::named("alice");
/// let alice2 = UserId::named("alice");
/// assert_eq!(alice1, alice2);       // Deterministic
///
/// let anon = UserId::new();
/// assert_ne!(anon, alice1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Creates a new [`UserId`] with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic [`UserId`] from a label via UUID v5.
    ///
    /// The same label always produces the same id.
    #[must_use]
    pub fn named(label: &str) -> Self {
        Self(Uuid::new_v5(
            &WARDEN_NAMESPACE,
            format!("user:{label}").as_bytes(),
        ))
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Identifier for a role in the authority hierarchy.
///
/// Roles form a directed acyclic graph of parent links. A role id only
/// identifies a node; hierarchy structure and levels live on the `Role`
/// record owned by the engine crate.
///
/// # UUID Strategy
///
/// Well-known roles ("admin", "manager", "staff") should use
/// [`named`](Self::named) so that every process derives the same id from
/// the role code, mirroring how seeded entities keep stable identities
/// across machines.
///
/// # Example
///
/// ```
/// use warden_types::RoleId;
///
/// let m1 = RoleId::named("manager");
/// let m2 = RoleId::named("manager");
/// assert_eq!(m1, m2);
///
/// let ad_hoc = RoleId::new();
/// assert_ne!(ad_hoc, m1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub Uuid);

impl RoleId {
    /// Creates a new [`RoleId`] with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic [`RoleId`] from a role code via UUID v5.
    #[must_use]
    pub fn named(code: &str) -> Self {
        Self(Uuid::new_v5(
            &WARDEN_NAMESPACE,
            format!("role:{code}").as_bytes(),
        ))
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "role:{}", self.0)
    }
}

/// Identifier for a delegation record.
///
/// Delegations are immutable once created (revocation flips a flag; scope
/// changes create a new record), so their ids are stable handles for audit
/// trails and operator tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DelegationId(pub Uuid);

#[allow(clippy::new_without_default)] // Default intentionally not implemented - see below
impl DelegationId {
    /// Creates a new [`DelegationId`] with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

// NOTE: DelegationId intentionally does NOT implement Default.
// A default-constructed id would not correspond to any stored delegation,
// and delegation ids appear in audit output. Construct explicitly.

impl std::fmt::Display for DelegationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "delegation:{}", self.0)
    }
}

// Tests are in lib.rs as integration tests for public API
