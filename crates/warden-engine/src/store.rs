//! Grant store adapter contract.
//!
//! The engine never performs I/O itself; everything it evaluates comes
//! through the [`GrantStore`] trait, implemented by the persistence
//! layer. The engine treats a store failure as fatal for that single
//! call and fails closed (deny with an error code) — retries, latency
//! budgets, and caching of raw rows are the adapter's business.
//!
//! # Architecture
//!
//! ```text
//! GrantStore trait (THIS MODULE)        ← abstract definition
//!          │
//!          ├── MemoryStore (THIS MODULE) ← in-memory reference impl
//!          └── (external) SQL/ORM adapters in the persistence layer
//! ```
//!
//! # What the adapter returns
//!
//! [`fetch_candidate_grants`](GrantStore::fetch_candidate_grants) returns
//! raw grants tagged by subject plus the user's role memberships. It must
//! include the user's own direct grants and the role-subject grants for
//! the permission code across **all** roles (exact code match only) — the
//! engine decides which role grants reach the user, so hierarchy
//! semantics live in exactly one place instead of per adapter. Returning
//! a superset (e.g. ignoring the resource filter) is legal; the engine
//! re-filters.

use crate::delegation::Delegation;
use crate::grant::{GrantSubject, PermissionGrant, ResourceSelector};
use crate::hierarchy::Role;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use warden_types::{DelegationId, PermissionCode, RoleId, UserId};

/// Error returned by grant store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or answered abnormally.
    #[error("grant store unavailable: {reason}")]
    Unavailable {
        /// Adapter-provided failure description.
        reason: String,
    },
}

impl StoreError {
    /// Convenience constructor for adapter failures.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// The candidate set for one (user, permission code) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateGrants {
    /// Roles the user holds directly (before hierarchy expansion).
    pub user_role_ids: Vec<RoleId>,
    /// Raw grants tagged by subject: the user's direct grants plus
    /// role-subject grants for the permission code.
    pub grants: Vec<PermissionGrant>,
}

/// Read-only interface the engine uses to fetch decision inputs.
///
/// Implementations must be `Send + Sync`; the engine runs concurrent
/// checks against a single shared store reference.
pub trait GrantStore: Send + Sync {
    /// Fetches the full role list, used to (re)build the hierarchy index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store is unreachable.
    fn fetch_roles(&self) -> Result<Vec<Role>, StoreError>;

    /// Fetches candidate grants for a (user, permission code) pair.
    ///
    /// `resource` is a narrowing hint; adapters may ignore it and return
    /// a superset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store is unreachable.
    fn fetch_candidate_grants(
        &self,
        user: UserId,
        code: &PermissionCode,
        resource: &ResourceSelector,
    ) -> Result<CandidateGrants, StoreError>;

    /// Fetches delegations where `delegatee` is the recipient and the
    /// scope covers `code` (wildcard scopes included).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store is unreachable.
    fn fetch_delegations(
        &self,
        delegatee: UserId,
        code: &PermissionCode,
    ) -> Result<Vec<Delegation>, StoreError>;
}

// Allow engines to share a store behind Arc without a newtype.
impl<T: GrantStore + ?Sized> GrantStore for std::sync::Arc<T> {
    fn fetch_roles(&self) -> Result<Vec<Role>, StoreError> {
        (**self).fetch_roles()
    }

    fn fetch_candidate_grants(
        &self,
        user: UserId,
        code: &PermissionCode,
        resource: &ResourceSelector,
    ) -> Result<CandidateGrants, StoreError> {
        (**self).fetch_candidate_grants(user, code, resource)
    }

    fn fetch_delegations(
        &self,
        delegatee: UserId,
        code: &PermissionCode,
    ) -> Result<Vec<Delegation>, StoreError> {
        (**self).fetch_delegations(delegatee, code)
    }
}

/// Thread-safe, in-memory [`GrantStore`] implementation.
///
/// The reference store for tests and embedded use. Data is held behind
/// `RwLock`s; read-heavy permission checks take read locks only.
///
/// # Example
///
/// ```
/// use warden_engine::{GrantStore, GrantSubject, MemoryStore, PermissionGrant, ResourceSelector, Role};
/// use warden_types::{PermissionCode, RoleId, UserId};
///
/// let store = MemoryStore::new();
/// let staff = RoleId::named("staff");
/// let alice = UserId::named("alice");
/// let code = PermissionCode::parse("workflow.approve").unwrap();
///
/// store.add_role(Role::new(staff, "staff", 2));
/// store.assign_role(alice, staff);
/// store.add_grant(PermissionGrant::allow(GrantSubject::Role(staff), code.clone()));
///
/// let candidates = store
///     .fetch_candidate_grants(alice, &code, &ResourceSelector::any())
///     .unwrap();
/// assert_eq!(candidates.user_role_ids, vec![staff]);
/// assert_eq!(candidates.grants.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    roles: RwLock<Vec<Role>>,
    memberships: RwLock<HashMap<UserId, Vec<RoleId>>>,
    grants: RwLock<Vec<PermissionGrant>>,
    delegations: RwLock<Vec<Delegation>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a role record.
    pub fn add_role(&self, role: Role) {
        self.roles.write().push(role);
    }

    /// Assigns a role to a user (idempotent).
    pub fn assign_role(&self, user: UserId, role: RoleId) {
        let mut memberships = self.memberships.write();
        let held = memberships.entry(user).or_default();
        if !held.contains(&role) {
            held.push(role);
        }
    }

    /// Adds a grant.
    pub fn add_grant(&self, grant: PermissionGrant) {
        self.grants.write().push(grant);
    }

    /// Adds a delegation record.
    pub fn add_delegation(&self, delegation: Delegation) {
        self.delegations.write().push(delegation);
    }

    /// Marks a delegation revoked. Returns `true` if it existed.
    ///
    /// Revocation is the only mutation delegations support; scope
    /// changes are modeled as a new delegation plus a revoke.
    pub fn revoke_delegation(&self, id: DelegationId) -> bool {
        let mut delegations = self.delegations.write();
        match delegations.iter_mut().find(|d| d.id == id) {
            Some(delegation) => {
                delegation.revoked = true;
                true
            }
            None => false,
        }
    }
}

impl GrantStore for MemoryStore {
    fn fetch_roles(&self) -> Result<Vec<Role>, StoreError> {
        Ok(self.roles.read().clone())
    }

    fn fetch_candidate_grants(
        &self,
        user: UserId,
        code: &PermissionCode,
        _resource: &ResourceSelector,
    ) -> Result<CandidateGrants, StoreError> {
        let user_role_ids = self
            .memberships
            .read()
            .get(&user)
            .cloned()
            .unwrap_or_default();

        let grants = self
            .grants
            .read()
            .iter()
            .filter(|g| g.permission_code == *code)
            .filter(|g| match g.subject {
                GrantSubject::User(id) => id == user,
                GrantSubject::Role(_) => true,
            })
            .cloned()
            .collect();

        Ok(CandidateGrants {
            user_role_ids,
            grants,
        })
    }

    fn fetch_delegations(
        &self,
        delegatee: UserId,
        code: &PermissionCode,
    ) -> Result<Vec<Delegation>, StoreError> {
        Ok(self
            .delegations
            .read()
            .iter()
            .filter(|d| d.delegatee == delegatee && d.scope.covers(code))
            .cloned()
            .collect())
    }
}
