//! Delegated authority and the chain walker.
//!
//! A delegation is a temporary transfer of a subset of one user's
//! *effective* authority to another user. It is authority transfer, not
//! an independent grant: a delegatee can never receive more access than
//! the delegator currently holds, and a delegator who would be denied
//! transfers nothing.
//!
//! # Lifecycle
//!
//! Delegations are immutable after creation except for revocation. A
//! scope change is modeled as a new delegation plus a revoke of the old
//! one, which keeps the audit history intact — this module exposes no
//! scope mutators.
//!
//! # Chain Walking
//!
//! Re-delegation chains are walked breadth-first from the querying user.
//! A link `d + 1` hops above the user is usable only when its
//! `max_chain_depth` exceeds `d`, so the default depth of 1 permits
//! direct delegation and forbids re-delegation entirely. A revisited
//! delegator means a cycle: the offending link is excluded and logged,
//! and the walk continues — one broken delegation never denies access
//! derivable through clean paths.

use crate::grant::{GrantSource, GrantSubject, PermissionGrant, ResourceSelector};
use crate::hierarchy::HierarchyIndex;
use crate::resolver::{prepare_candidates, resolve, TrailRecorder};
use crate::store::{GrantStore, StoreError};
use crate::window::ValidityWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use warden_types::{DelegationId, PermissionCode, UserId};

/// Which permissions a delegation transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelegationScope {
    /// Everything the delegator holds (`"*"`).
    All,
    /// A fixed list of permission codes.
    Codes(Vec<PermissionCode>),
}

impl DelegationScope {
    /// Returns `true` if the scope covers `code`.
    #[must_use]
    pub fn covers(&self, code: &PermissionCode) -> bool {
        match self {
            Self::All => true,
            Self::Codes(codes) => codes.contains(code),
        }
    }

    /// Returns `true` if the scope names `code` explicitly (not via the
    /// wildcard). Exact scopes shadow wildcard scopes from the same
    /// delegator.
    #[must_use]
    pub fn is_exact(&self, code: &PermissionCode) -> bool {
        match self {
            Self::All => false,
            Self::Codes(codes) => codes.contains(code),
        }
    }
}

/// A delegation record.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use warden_engine::{Delegation, DelegationScope, ValidityWindow};
/// use warden_types::{PermissionCode, UserId};
///
/// let code = PermissionCode::parse("report.export").unwrap();
/// let delegation = Delegation::new(
///     UserId::named("alice"),
///     UserId::named("bob"),
///     DelegationScope::Codes(vec![code]),
/// )
/// .with_window(ValidityWindow::expiring(Utc::now() + Duration::hours(1)));
///
/// assert!(delegation.usable_at(Utc::now()));
/// assert!(!delegation.usable_at(Utc::now() + Duration::hours(2)));
/// assert_eq!(delegation.max_chain_depth, 1); // no re-delegation by default
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delegation {
    /// Stable record id.
    pub id: DelegationId,
    /// The user transferring authority.
    pub delegator: UserId,
    /// The user receiving it.
    pub delegatee: UserId,
    /// Which permissions are transferred.
    pub scope: DelegationScope,
    /// When the delegation is in force.
    pub window: ValidityWindow,
    /// Set by revocation; a revoked delegation transfers nothing.
    pub revoked: bool,
    /// How many hops the transferred authority may travel. 1 = the
    /// delegatee may not re-delegate.
    pub max_chain_depth: u32,
}

impl Delegation {
    /// Creates a delegation with an open window, not revoked, chain
    /// depth 1.
    #[must_use]
    pub fn new(delegator: UserId, delegatee: UserId, scope: DelegationScope) -> Self {
        Self {
            id: DelegationId::new(),
            delegator,
            delegatee,
            scope,
            window: ValidityWindow::open(),
            revoked: false,
            max_chain_depth: 1,
        }
    }

    /// Sets the validity window.
    #[must_use]
    pub fn with_window(mut self, window: ValidityWindow) -> Self {
        self.window = window;
        self
    }

    /// Sets the maximum chain depth.
    #[must_use]
    pub fn with_max_chain_depth(mut self, depth: u32) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Returns `true` if the delegation is in force at `as_of`:
    /// not revoked and inside its validity window.
    #[must_use]
    pub fn usable_at(&self, as_of: DateTime<Utc>) -> bool {
        !self.revoked && self.window.contains(as_of)
    }
}

/// Walks delegation chains and synthesizes [`GrantSource::Delegated`]
/// grants for the querying user.
pub(crate) struct DelegationWalker<'a, S: GrantStore + ?Sized> {
    store: &'a S,
    index: &'a HierarchyIndex,
    /// Hard cap on walk depth, over and above per-link chain depths.
    max_depth: u32,
}

impl<'a, S: GrantStore + ?Sized> DelegationWalker<'a, S> {
    pub(crate) fn new(store: &'a S, index: &'a HierarchyIndex, max_depth: u32) -> Self {
        Self {
            store,
            index,
            max_depth,
        }
    }

    /// Expands the user's effective grant set with delegated authority.
    ///
    /// `seed` supplies pre-fetched first-hop delegations (the bulk path
    /// fetches once per unique permission code); when `None` the walker
    /// fetches them itself.
    ///
    /// Failures are contained: an unreachable store or a cyclic link
    /// excludes that path and the walk continues with whatever remains.
    pub(crate) fn expand(
        &self,
        user: UserId,
        code: &PermissionCode,
        resource: &ResourceSelector,
        as_of: DateTime<Utc>,
        seed: Option<&[Delegation]>,
    ) -> Vec<PermissionGrant> {
        let mut synthesized = Vec::new();
        let mut visited: HashSet<UserId> = HashSet::from([user]);
        let mut frontier = vec![user];
        let mut depth = 0u32;

        while !frontier.is_empty() && depth < self.max_depth {
            let mut next = Vec::new();
            for node in frontier {
                let fetched;
                let delegations: &[Delegation] = match (depth, seed) {
                    (0, Some(seeded)) => seeded,
                    _ => match self.store.fetch_delegations(node, code) {
                        Ok(d) => {
                            fetched = d;
                            &fetched
                        }
                        Err(err) => {
                            tracing::warn!(
                                delegatee = %node,
                                code = %code,
                                error = %err,
                                "delegation fetch failed; excluding this path"
                            );
                            continue;
                        }
                    },
                };

                for link in select_links(delegations, code, as_of, depth) {
                    if !visited.insert(link.delegator) {
                        tracing::warn!(
                            delegation = %link.id,
                            delegator = %link.delegator,
                            delegatee = %link.delegatee,
                            "cyclic delegation chain; link excluded"
                        );
                        continue;
                    }
                    match self.local_authority(link.delegator, code, resource, as_of) {
                        Ok(Some(matched)) => {
                            synthesized.push(synthesize(user, code, &matched, link));
                        }
                        Ok(None) => {
                            tracing::debug!(
                                delegator = %link.delegator,
                                code = %code,
                                "delegator holds no effective allow; nothing transferred"
                            );
                        }
                        Err(err) => {
                            tracing::warn!(
                                delegator = %link.delegator,
                                error = %err,
                                "delegator authority fetch failed; link excluded"
                            );
                        }
                    }
                    next.push(link.delegator);
                }
            }
            frontier = next;
            depth += 1;
        }

        synthesized
    }

    /// The delegator's own effective allow for (code, resource) at
    /// `as_of`, from role and direct grants only. Deeper delegated
    /// authority is reached by further BFS hops, not by recursing here.
    fn local_authority(
        &self,
        delegator: UserId,
        code: &PermissionCode,
        resource: &ResourceSelector,
        as_of: DateTime<Utc>,
    ) -> Result<Option<PermissionGrant>, StoreError> {
        let candidates = self.store.fetch_candidate_grants(delegator, code, resource)?;
        let mut trail = TrailRecorder::disabled();
        let prepared = prepare_candidates(
            candidates.grants,
            delegator,
            &candidates.user_role_ids,
            self.index,
            as_of,
            &mut trail,
        );
        let winner = resolve(prepared, resource, self.index, &mut trail);
        Ok(winner.filter(|w| w.is_granted))
    }
}

/// Picks at most one usable link per delegator at this walk depth,
/// preferring an exact-code scope over the `All` wildcard.
fn select_links<'d>(
    delegations: &'d [Delegation],
    code: &PermissionCode,
    as_of: DateTime<Utc>,
    depth: u32,
) -> Vec<&'d Delegation> {
    let mut best: HashMap<UserId, &'d Delegation> = HashMap::new();
    for link in delegations {
        if !link.usable_at(as_of) || !link.scope.covers(code) || link.max_chain_depth <= depth {
            continue;
        }
        match best.get(&link.delegator) {
            Some(current) if current.scope.is_exact(code) || !link.scope.is_exact(code) => {}
            _ => {
                best.insert(link.delegator, link);
            }
        }
    }
    let mut links: Vec<&Delegation> = best.into_values().collect();
    // Deterministic walk order regardless of hash iteration.
    links.sort_by_key(|l| l.id);
    links
}

/// Builds the synthetic delegated grant the querying user receives.
fn synthesize(
    user: UserId,
    code: &PermissionCode,
    matched: &PermissionGrant,
    link: &Delegation,
) -> PermissionGrant {
    PermissionGrant {
        subject: GrantSubject::User(user),
        permission_code: code.clone(),
        resource: matched.resource.clone(),
        is_granted: true,
        priority: matched.priority,
        window: link.window.clone(),
        source: GrantSource::Delegated,
        granted_by: Some(link.delegator),
        is_temporary: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Role;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use warden_types::RoleId;

    fn code(s: &str) -> PermissionCode {
        PermissionCode::parse(s).expect("valid code")
    }

    fn export() -> PermissionCode {
        code("report.export")
    }

    fn empty_index() -> HierarchyIndex {
        HierarchyIndex::empty()
    }

    fn give_direct_allow(store: &MemoryStore, user: UserId, c: &PermissionCode) {
        store.add_grant(PermissionGrant::allow(GrantSubject::User(user), c.clone()));
    }

    #[test]
    fn scope_covers_and_exactness() {
        let exact = DelegationScope::Codes(vec![export()]);
        assert!(exact.covers(&export()));
        assert!(exact.is_exact(&export()));
        assert!(!exact.covers(&code("user.delete")));

        let all = DelegationScope::All;
        assert!(all.covers(&export()));
        assert!(!all.is_exact(&export()));
    }

    #[test]
    fn direct_delegation_transfers_allow() {
        let store = MemoryStore::new();
        let alice = UserId::named("alice");
        let bob = UserId::named("bob");
        give_direct_allow(&store, alice, &export());
        store.add_delegation(Delegation::new(
            alice,
            bob,
            DelegationScope::Codes(vec![export()]),
        ));

        let index = empty_index();
        let walker = DelegationWalker::new(&store, &index, 8);
        let grants = walker.expand(bob, &export(), &ResourceSelector::any(), Utc::now(), None);

        assert_eq!(grants.len(), 1);
        let grant = &grants[0];
        assert!(grant.is_granted);
        assert_eq!(grant.source, GrantSource::Delegated);
        assert_eq!(grant.subject, GrantSubject::User(bob));
        assert_eq!(grant.granted_by, Some(alice));
        assert!(grant.is_temporary);
    }

    #[test]
    fn delegator_without_authority_transfers_nothing() {
        let store = MemoryStore::new();
        let alice = UserId::named("alice");
        let bob = UserId::named("bob");
        store.add_delegation(Delegation::new(alice, bob, DelegationScope::All));

        let index = empty_index();
        let walker = DelegationWalker::new(&store, &index, 8);
        let grants = walker.expand(bob, &export(), &ResourceSelector::any(), Utc::now(), None);
        assert!(grants.is_empty());
    }

    #[test]
    fn delegator_denied_transfers_nothing() {
        // An explicit deny on the delegator means there is no authority
        // to transfer, even if an allow also exists (deny wins the tie).
        let store = MemoryStore::new();
        let alice = UserId::named("alice");
        let bob = UserId::named("bob");
        give_direct_allow(&store, alice, &export());
        store.add_grant(PermissionGrant::deny(GrantSubject::User(alice), export()));
        store.add_delegation(Delegation::new(alice, bob, DelegationScope::All));

        let index = empty_index();
        let walker = DelegationWalker::new(&store, &index, 8);
        let grants = walker.expand(bob, &export(), &ResourceSelector::any(), Utc::now(), None);
        assert!(grants.is_empty());
    }

    #[test]
    fn expired_delegation_ignored() {
        let store = MemoryStore::new();
        let alice = UserId::named("alice");
        let bob = UserId::named("bob");
        let now = Utc::now();
        give_direct_allow(&store, alice, &export());
        store.add_delegation(
            Delegation::new(alice, bob, DelegationScope::All)
                .with_window(ValidityWindow::expiring(now - Duration::hours(1))),
        );

        let index = empty_index();
        let walker = DelegationWalker::new(&store, &index, 8);
        assert!(walker
            .expand(bob, &export(), &ResourceSelector::any(), now, None)
            .is_empty());
    }

    #[test]
    fn revoked_delegation_ignored() {
        let store = MemoryStore::new();
        let alice = UserId::named("alice");
        let bob = UserId::named("bob");
        give_direct_allow(&store, alice, &export());
        let delegation = Delegation::new(alice, bob, DelegationScope::All);
        let id = delegation.id;
        store.add_delegation(delegation);
        store.revoke_delegation(id);

        let index = empty_index();
        let walker = DelegationWalker::new(&store, &index, 8);
        assert!(walker
            .expand(bob, &export(), &ResourceSelector::any(), Utc::now(), None)
            .is_empty());
    }

    #[test]
    fn delegator_role_authority_transfers() {
        // The delegator's authority may itself come through a role.
        let store = MemoryStore::new();
        let alice = UserId::named("alice");
        let bob = UserId::named("bob");
        let managers = RoleId::named("managers");
        store.add_role(Role::new(managers, "managers", 1));
        store.assign_role(alice, managers);
        store.add_grant(PermissionGrant::allow(GrantSubject::Role(managers), export()));
        store.add_delegation(Delegation::new(alice, bob, DelegationScope::All));

        let index = HierarchyIndex::build(
            &store.fetch_roles().expect("roles fetch"),
        )
        .expect("hierarchy builds");
        let walker = DelegationWalker::new(&store, &index, 8);
        let grants = walker.expand(bob, &export(), &ResourceSelector::any(), Utc::now(), None);
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].granted_by, Some(alice));
    }

    #[test]
    fn default_depth_forbids_redelegation() {
        // carol -> alice (depth 1), alice -> bob (depth 1):
        // bob must not receive carol's authority through alice.
        let store = MemoryStore::new();
        let carol = UserId::named("carol");
        let alice = UserId::named("alice");
        let bob = UserId::named("bob");
        give_direct_allow(&store, carol, &export());
        store.add_delegation(Delegation::new(carol, alice, DelegationScope::All));
        store.add_delegation(Delegation::new(alice, bob, DelegationScope::All));

        let index = empty_index();
        let walker = DelegationWalker::new(&store, &index, 8);
        let grants = walker.expand(bob, &export(), &ResourceSelector::any(), Utc::now(), None);
        // alice has no local authority and carol's link only allows one hop.
        assert!(grants.is_empty());
    }

    #[test]
    fn redelegation_allowed_with_sufficient_depth() {
        let store = MemoryStore::new();
        let carol = UserId::named("carol");
        let alice = UserId::named("alice");
        let bob = UserId::named("bob");
        give_direct_allow(&store, carol, &export());
        store.add_delegation(
            Delegation::new(carol, alice, DelegationScope::All).with_max_chain_depth(2),
        );
        store.add_delegation(Delegation::new(alice, bob, DelegationScope::All));

        let index = empty_index();
        let walker = DelegationWalker::new(&store, &index, 8);
        let grants = walker.expand(bob, &export(), &ResourceSelector::any(), Utc::now(), None);
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].granted_by, Some(carol));
    }

    #[test]
    fn cycle_completes_and_excludes_cyclic_path() {
        // a -> b -> c -> a with generous chain depths: the walk must
        // terminate and synthesize from the clean prefix only.
        let store = MemoryStore::new();
        let a = UserId::named("a");
        let b = UserId::named("b");
        let c = UserId::named("c");
        give_direct_allow(&store, b, &export());
        give_direct_allow(&store, c, &export());
        store.add_delegation(Delegation::new(b, a, DelegationScope::All).with_max_chain_depth(9));
        store.add_delegation(Delegation::new(c, b, DelegationScope::All).with_max_chain_depth(9));
        store.add_delegation(Delegation::new(a, c, DelegationScope::All).with_max_chain_depth(9));

        let index = empty_index();
        let walker = DelegationWalker::new(&store, &index, 8);
        let grants = walker.expand(a, &export(), &ResourceSelector::any(), Utc::now(), None);

        // b at hop 1, c at hop 2; the c -> a link closing the cycle is excluded.
        let delegators: Vec<_> = grants.iter().filter_map(|g| g.granted_by).collect();
        assert_eq!(delegators.len(), 2);
        assert!(delegators.contains(&b));
        assert!(delegators.contains(&c));
    }

    #[test]
    fn exact_scope_shadows_wildcard_from_same_delegator() {
        let store = MemoryStore::new();
        let alice = UserId::named("alice");
        let bob = UserId::named("bob");
        let now = Utc::now();
        give_direct_allow(&store, alice, &export());

        let exact_window = ValidityWindow::expiring(now + Duration::hours(1));
        store.add_delegation(Delegation::new(alice, bob, DelegationScope::All));
        store.add_delegation(
            Delegation::new(alice, bob, DelegationScope::Codes(vec![export()]))
                .with_window(exact_window.clone()),
        );

        let index = empty_index();
        let walker = DelegationWalker::new(&store, &index, 8);
        let grants = walker.expand(bob, &export(), &ResourceSelector::any(), now, None);

        // One link per delegator, and it is the exact one.
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].window, exact_window);
    }

    #[test]
    fn hard_depth_cap_bounds_walk() {
        // A long chain with generous per-link depths is still cut off by
        // the engine-level cap.
        let store = MemoryStore::new();
        let users: Vec<UserId> = (0..5)
            .map(|i| UserId::named(&format!("user-{i}")))
            .collect();
        give_direct_allow(&store, users[4], &export());
        for i in 0..4 {
            store.add_delegation(
                Delegation::new(users[i + 1], users[i], DelegationScope::All)
                    .with_max_chain_depth(9),
            );
        }

        let index = empty_index();
        let capped = DelegationWalker::new(&store, &index, 2);
        let grants = capped.expand(users[0], &export(), &ResourceSelector::any(), Utc::now(), None);
        // users[4]'s authority sits 4 hops away; the cap stops at 2.
        assert!(grants.is_empty());

        let deep = DelegationWalker::new(&store, &index, 8);
        let grants = deep.expand(users[0], &export(), &ResourceSelector::any(), Utc::now(), None);
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].granted_by, Some(users[4]));
    }

    #[test]
    fn seeded_first_hop_is_used() {
        let store = MemoryStore::new();
        let alice = UserId::named("alice");
        let bob = UserId::named("bob");
        give_direct_allow(&store, alice, &export());
        // Delegation exists only in the seed, not in the store.
        let seed = vec![Delegation::new(alice, bob, DelegationScope::All)];

        let index = empty_index();
        let walker = DelegationWalker::new(&store, &index, 8);
        let grants = walker.expand(
            bob,
            &export(),
            &ResourceSelector::any(),
            Utc::now(),
            Some(&seed),
        );
        assert_eq!(grants.len(), 1);
    }

    #[test]
    fn delegation_serde_roundtrip() {
        let delegation = Delegation::new(
            UserId::named("alice"),
            UserId::named("bob"),
            DelegationScope::Codes(vec![export()]),
        )
        .with_max_chain_depth(3);
        let json = serde_json::to_string(&delegation).expect("serialize");
        let parsed: Delegation = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, delegation);
    }
}
