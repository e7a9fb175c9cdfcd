//! The public decision API.
//!
//! [`PermissionEngine`] orchestrates the full resolution pipeline:
//!
//! ```text
//! fetch candidates (GrantStore)
//!     → shape + temporal filter
//!     → delegation expansion (DelegationWalker)
//!     → hierarchy expansion (HierarchyIndex)
//!     → conflict resolution (resolver)
//!     → Verdict
//! ```
//!
//! Every call is a pure function of its inputs and the current snapshot:
//! the engine keeps no per-call state, so concurrent checks for
//! different users run fully in parallel. The only shared state is the
//! hierarchy snapshot behind `RwLock<Arc<_>>`; readers clone the `Arc`
//! and never hold the lock across evaluation, and a rebuild swaps in a
//! fresh index instead of mutating the old one.
//!
//! # Fail-Closed
//!
//! Any unresolved failure — unreachable store, missing hierarchy —
//! produces a deny verdict carrying the error code. The engine never
//! returns an "unknown" state and never retries; adapter resilience is
//! the adapter's concern.

use crate::delegation::{Delegation, DelegationWalker};
use crate::grant::ResourceSelector;
use crate::hierarchy::HierarchyIndex;
use crate::resolver::{prepare_candidates, resolve, TrailRecorder};
use crate::store::{CandidateGrants, GrantStore};
use crate::verdict::Verdict;
use crate::EngineError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use warden_types::{ErrorCode, PermissionCode, UserId};

/// Engine tuning knobs.
///
/// # Example
///
/// ```
/// use warden_engine::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_debug_trail(true)
///     .with_max_delegation_depth(4);
/// assert!(config.debug_trail);
/// assert_eq!(config.max_delegation_depth, 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Populate the explanation trail in `check_permission` (not just
    /// `explain`).
    pub debug_trail: bool,
    /// Hard cap on delegation walk depth, over and above per-link
    /// chain-depth limits.
    pub max_delegation_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug_trail: false,
            max_delegation_depth: 8,
        }
    }
}

impl EngineConfig {
    /// Sets the debug-trail flag.
    #[must_use]
    pub fn with_debug_trail(mut self, on: bool) -> Self {
        self.debug_trail = on;
        self
    }

    /// Sets the delegation depth cap.
    #[must_use]
    pub fn with_max_delegation_depth(mut self, depth: u32) -> Self {
        self.max_delegation_depth = depth;
        self
    }
}

/// One item of a bulk check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionQuery {
    /// The permission to check.
    pub code: PermissionCode,
    /// The queried resource scope.
    pub resource: ResourceSelector,
}

impl PermissionQuery {
    /// Creates an unscoped query for `code`.
    #[must_use]
    pub fn new(code: PermissionCode) -> Self {
        Self {
            code,
            resource: ResourceSelector::any(),
        }
    }

    /// Narrows the query to a resource scope.
    #[must_use]
    pub fn with_resource(mut self, resource: ResourceSelector) -> Self {
        self.resource = resource;
        self
    }
}

/// The permission resolution engine.
///
/// # Example
///
/// ```
/// use warden_engine::{
///     EngineConfig, GrantSubject, MemoryStore, PermissionEngine, PermissionGrant,
///     ResourceSelector, Role,
/// };
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
/// let engine = PermissionEngine::new(store);
/// engine.rebuild_hierarchy().unwrap();
///
/// let verdict = engine.check_permission(alice, &code, &ResourceSelector::any(), None);
/// assert!(verdict.is_allowed());
/// ```
#[derive(Debug)]
pub struct PermissionEngine<S: GrantStore> {
    store: S,
    config: EngineConfig,
    /// Current hierarchy snapshot; `None` until the first successful
    /// rebuild. Readers clone the `Arc`, rebuilds swap it.
    hierarchy: RwLock<Option<Arc<HierarchyIndex>>>,
}

impl<S: GrantStore> PermissionEngine<S> {
    /// Creates an engine with the default configuration.
    ///
    /// The hierarchy snapshot starts empty; call
    /// [`rebuild_hierarchy`](Self::rebuild_hierarchy) before serving
    /// checks.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Creates an engine with an explicit configuration.
    #[must_use]
    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            hierarchy: RwLock::new(None),
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuilds the hierarchy snapshot from the store and atomically
    /// swaps it in.
    ///
    /// The persistence layer calls this after any role or hierarchy
    /// mutation (the cache-invalidation signal). On failure the
    /// previous snapshot — if any — stays in service.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Store`] if the role fetch fails
    /// - [`EngineError::Hierarchy`] if the role graph is cyclic or has
    ///   dangling parents (fatal: the rebuild is aborted)
    pub fn rebuild_hierarchy(&self) -> Result<(), EngineError> {
        let roles = self.store.fetch_roles()?;
        let index = HierarchyIndex::build(&roles)?;
        *self.hierarchy.write() = Some(Arc::new(index));
        tracing::info!(roles = roles.len(), "hierarchy snapshot rebuilt and swapped");
        Ok(())
    }

    /// Checks whether `user` may perform `code` on `resource`.
    ///
    /// `as_of` defaults to the current instant; passing an explicit
    /// value makes the call deterministic and enables retroactive
    /// "what would have been allowed" queries.
    ///
    /// The trail is populated only when [`EngineConfig::debug_trail`]
    /// is set; use [`explain`](Self::explain) for a guaranteed trail.
    pub fn check_permission(
        &self,
        user: UserId,
        code: &PermissionCode,
        resource: &ResourceSelector,
        as_of: Option<DateTime<Utc>>,
    ) -> Verdict {
        self.check_inner(user, code, resource, as_of, self.config.debug_trail)
    }

    /// Like [`check_permission`](Self::check_permission), with the full
    /// explanation trail always populated.
    pub fn explain(
        &self,
        user: UserId,
        code: &PermissionCode,
        resource: &ResourceSelector,
        as_of: Option<DateTime<Utc>>,
    ) -> Verdict {
        self.check_inner(user, code, resource, as_of, true)
    }

    /// Checks a batch of queries for one user.
    ///
    /// Candidate grants and first-hop delegations are fetched once per
    /// *unique* permission code — a performance contract, not a
    /// convenience. A fetch failure denies the affected items with an
    /// error code; it never fails the whole batch.
    pub fn check_bulk(
        &self,
        user: UserId,
        queries: &[PermissionQuery],
        as_of: Option<DateTime<Utc>>,
    ) -> Vec<Verdict> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        let Some(index) = self.current_index() else {
            return queries
                .iter()
                .map(|_| self.not_built_verdict(user, as_of))
                .collect();
        };

        // One round-trip per unique code; None marks a failed fetch.
        let mut fetched: HashMap<PermissionCode, Option<(CandidateGrants, Vec<Delegation>)>> =
            HashMap::new();
        for query in queries {
            if fetched.contains_key(&query.code) {
                continue;
            }
            let result = self
                .store
                .fetch_candidate_grants(user, &query.code, &ResourceSelector::any())
                .and_then(|candidates| {
                    self.store
                        .fetch_delegations(user, &query.code)
                        .map(|delegations| (candidates, delegations))
                });
            let entry = match result {
                Ok(pair) => Some(pair),
                Err(err) => {
                    tracing::warn!(
                        user = %user,
                        code = %query.code,
                        error = %err,
                        "bulk fetch failed; denying affected items"
                    );
                    None
                }
            };
            fetched.insert(query.code.clone(), entry);
        }

        queries
            .iter()
            .map(|query| match fetched.get(&query.code) {
                Some(Some((candidates, delegations))) => self.evaluate(
                    &index,
                    user,
                    &query.code,
                    &query.resource,
                    as_of,
                    candidates.clone(),
                    Some(delegations),
                    self.config.debug_trail,
                ),
                _ => Verdict::errored(
                    EngineError::Store(crate::store::StoreError::unavailable("bulk fetch"))
                        .code(),
                    as_of,
                ),
            })
            .collect()
    }

    fn check_inner(
        &self,
        user: UserId,
        code: &PermissionCode,
        resource: &ResourceSelector,
        as_of: Option<DateTime<Utc>>,
        record_trail: bool,
    ) -> Verdict {
        let as_of = as_of.unwrap_or_else(Utc::now);
        let Some(index) = self.current_index() else {
            return self.not_built_verdict(user, as_of);
        };

        match self.store.fetch_candidate_grants(user, code, resource) {
            Ok(candidates) => self.evaluate(
                &index, user, code, resource, as_of, candidates, None, record_trail,
            ),
            Err(err) => {
                let engine_err = EngineError::from(err);
                tracing::warn!(
                    user = %user,
                    code = %code,
                    error = %engine_err,
                    "candidate fetch failed; failing closed"
                );
                Verdict::errored(engine_err.code(), as_of)
            }
        }
    }

    /// Runs the resolution pipeline over an already-fetched candidate
    /// set.
    #[allow(clippy::too_many_arguments)]
    fn evaluate(
        &self,
        index: &HierarchyIndex,
        user: UserId,
        code: &PermissionCode,
        resource: &ResourceSelector,
        as_of: DateTime<Utc>,
        candidates: CandidateGrants,
        delegation_seed: Option<&[Delegation]>,
        record_trail: bool,
    ) -> Verdict {
        let mut recorder = if record_trail {
            TrailRecorder::recording()
        } else {
            TrailRecorder::disabled()
        };

        let mut pool = prepare_candidates(
            candidates.grants,
            user,
            &candidates.user_role_ids,
            index,
            as_of,
            &mut recorder,
        );

        let walker = DelegationWalker::new(&self.store, index, self.config.max_delegation_depth);
        pool.extend(walker.expand(user, code, resource, as_of, delegation_seed));

        let winner = resolve(pool, resource, index, &mut recorder);
        let verdict = match winner {
            Some(grant) => Verdict::decided(grant, as_of),
            None => Verdict::default_deny(as_of),
        }
        .with_trail(recorder.into_entries());

        // Audit logging: allowed at debug, denied at warn.
        if verdict.is_allowed() {
            tracing::debug!(
                user = %user,
                code = %code,
                resource = %resource,
                "permission allowed"
            );
        } else {
            tracing::warn!(
                user = %user,
                code = %code,
                resource = %resource,
                "permission denied"
            );
        }
        verdict
    }

    fn current_index(&self) -> Option<Arc<HierarchyIndex>> {
        self.hierarchy.read().clone()
    }

    fn not_built_verdict(&self, user: UserId, as_of: DateTime<Utc>) -> Verdict {
        tracing::warn!(
            user = %user,
            "check before first hierarchy rebuild; failing closed"
        );
        Verdict::errored(EngineError::HierarchyNotBuilt.code(), as_of)
    }
}
