//! Role hierarchy index.
//!
//! Roles form a directed acyclic graph over parent links, where a parent
//! is the more privileged role (level 0 = highest authority). The index
//! is an immutable snapshot built from a full role list; it is rebuilt
//! from scratch when the hierarchy changes and atomically swapped in by
//! the engine, never mutated in place.
//!
//! # Inheritance Direction
//!
//! Seniors absorb the grants of the roles beneath them; juniors never
//! receive grants attached to their seniors:
//!
//! ```text
//! Manager (level 1)          Manager holds its own grants
//!    └── Staff (level 2)     ... plus Staff's grants (absorbed upward)
//! ```
//!
//! A role-subject grant on role G therefore applies to users holding G
//! itself or any ancestor of G. A user with only Staff never sees a
//! Manager grant; a user with Manager (directly or through a deeper
//! ancestor chain) sees both.
//!
//! # Cycles
//!
//! A cycle in the parent graph corrupts every decision downstream, so it
//! is a fatal build error: [`HierarchyError::CyclicHierarchy`] aborts the
//! rebuild and the engine keeps serving the previous snapshot.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use warden_types::RoleId;

/// A role record as fetched from the store.
///
/// # Example
///
/// ```
/// use warden_engine::Role;
/// use warden_types::RoleId;
///
/// let manager = RoleId::named("manager");
/// let staff = Role::new(RoleId::named("staff"), "staff", 2).with_parents(vec![manager]);
/// assert_eq!(staff.parents, vec![manager]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role id.
    pub id: RoleId,
    /// Human-readable role code ("manager", "staff").
    pub code: String,
    /// Authority rank; 0 is the highest authority.
    pub hierarchy_level: u32,
    /// Parent roles (more privileged). Empty for root roles.
    pub parents: Vec<RoleId>,
}

impl Role {
    /// Creates a role with no parents.
    #[must_use]
    pub fn new(id: RoleId, code: impl Into<String>, hierarchy_level: u32) -> Self {
        Self {
            id,
            code: code.into(),
            hierarchy_level,
            parents: Vec::new(),
        }
    }

    /// Sets the parent roles.
    #[must_use]
    pub fn with_parents(mut self, parents: Vec<RoleId>) -> Self {
        self.parents = parents;
        self
    }
}

/// Errors raised while building the hierarchy index.
///
/// Build errors are fatal for the rebuild: a corrupt hierarchy makes
/// every subsequent decision unreliable, so no index is produced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HierarchyError {
    /// The parent graph contains a cycle.
    #[error("cyclic role hierarchy involving {role_id}")]
    CyclicHierarchy {
        /// A role on the detected cycle.
        role_id: RoleId,
    },

    /// A role references a parent that is not in the role set.
    #[error("role {role_id} references unknown parent {parent_id}")]
    UnknownParent {
        /// The role with the dangling reference.
        role_id: RoleId,
        /// The missing parent.
        parent_id: RoleId,
    },
}

/// Immutable, concurrently-readable snapshot of the role hierarchy.
///
/// Ancestor closures are computed lazily per role and memoized — role
/// sets are small (tens, not millions) and the index is discarded
/// wholesale on every hierarchy change, so precomputing everything up
/// front buys nothing.
///
/// # Example
///
/// ```
/// use warden_engine::{HierarchyIndex, Role};
/// use warden_types::RoleId;
///
/// let admin = RoleId::named("admin");
/// let manager = RoleId::named("manager");
/// let staff = RoleId::named("staff");
///
/// let index = HierarchyIndex::build(&[
///     Role::new(admin, "admin", 0),
///     Role::new(manager, "manager", 1).with_parents(vec![admin]),
///     Role::new(staff, "staff", 2).with_parents(vec![manager]),
/// ])
/// .unwrap();
///
/// assert!(index.is_ancestor(staff, admin));     // admin is above staff
/// assert!(!index.is_ancestor(admin, staff));
/// assert_eq!(index.effective_level(staff), Some(0)); // most privileged reachable level
/// ```
#[derive(Debug)]
pub struct HierarchyIndex {
    roles: HashMap<RoleId, Role>,
    /// Memoized transitive ancestor closures, keyed by role id.
    ancestors: RwLock<HashMap<RoleId, Arc<HashSet<RoleId>>>>,
}

impl HierarchyIndex {
    /// Builds an index from a full role list.
    ///
    /// # Errors
    ///
    /// - [`HierarchyError::UnknownParent`] if a parent link dangles
    /// - [`HierarchyError::CyclicHierarchy`] if the parent graph cycles
    pub fn build(roles: &[Role]) -> Result<Self, HierarchyError> {
        let map: HashMap<RoleId, Role> = roles.iter().map(|r| (r.id, r.clone())).collect();

        for role in map.values() {
            for parent in &role.parents {
                if !map.contains_key(parent) {
                    return Err(HierarchyError::UnknownParent {
                        role_id: role.id,
                        parent_id: *parent,
                    });
                }
            }
        }

        detect_cycles(&map)?;

        tracing::debug!(roles = map.len(), "hierarchy index built");
        Ok(Self {
            roles: map,
            ancestors: RwLock::new(HashMap::new()),
        })
    }

    /// Builds an empty index (no roles).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            roles: HashMap::new(),
            ancestors: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the role record for `id`, if known.
    #[must_use]
    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(&id)
    }

    /// Returns the number of roles in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Returns `true` if the snapshot holds no roles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Returns the transitive ancestor set of `role` (excluding `role`
    /// itself). Unknown roles have no ancestors.
    #[must_use]
    pub fn ancestors_of(&self, role: RoleId) -> Arc<HashSet<RoleId>> {
        if let Some(cached) = self.ancestors.read().get(&role) {
            return Arc::clone(cached);
        }

        let mut closure = HashSet::new();
        let mut queue: Vec<RoleId> = match self.roles.get(&role) {
            Some(r) => r.parents.clone(),
            None => Vec::new(),
        };
        while let Some(next) = queue.pop() {
            if closure.insert(next) {
                if let Some(r) = self.roles.get(&next) {
                    queue.extend(r.parents.iter().copied());
                }
            }
        }

        let closure = Arc::new(closure);
        self.ancestors
            .write()
            .insert(role, Arc::clone(&closure));
        closure
    }

    /// Returns `true` if `candidate_ancestor` is a (transitive) ancestor
    /// of `role`.
    #[must_use]
    pub fn is_ancestor(&self, role: RoleId, candidate_ancestor: RoleId) -> bool {
        self.ancestors_of(role).contains(&candidate_ancestor)
    }

    /// Returns the effective hierarchy level of `role`:
    /// `min(own level, min(ancestor levels))` — a role carries the most
    /// privileged level reachable through any parent path.
    #[must_use]
    pub fn effective_level(&self, role: RoleId) -> Option<u32> {
        let own = self.roles.get(&role)?.hierarchy_level;
        let best_ancestor = self
            .ancestors_of(role)
            .iter()
            .filter_map(|id| self.roles.get(id))
            .map(|r| r.hierarchy_level)
            .min();
        Some(match best_ancestor {
            Some(level) => own.min(level),
            None => own,
        })
    }

    /// Returns `true` if a role-subject grant on `grant_role` reaches a
    /// user holding `held_roles`.
    ///
    /// Seniors absorb juniors: the grant reaches holders of `grant_role`
    /// itself and holders of any ancestor of `grant_role`.
    #[must_use]
    pub fn grant_reaches(&self, grant_role: RoleId, held_roles: &[RoleId]) -> bool {
        held_roles
            .iter()
            .any(|held| *held == grant_role || self.is_ancestor(grant_role, *held))
    }
}

/// Iterative three-color DFS over parent links.
fn detect_cycles(roles: &HashMap<RoleId, Role>) -> Result<(), HierarchyError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<RoleId, Mark> = HashMap::new();

    for &start in roles.keys() {
        if marks.contains_key(&start) {
            continue;
        }
        // Stack of (role, next-parent-index) frames.
        let mut stack: Vec<(RoleId, usize)> = vec![(start, 0)];
        marks.insert(start, Mark::Visiting);

        while let Some((current, idx)) = stack.pop() {
            let parents = &roles[&current].parents;
            if idx < parents.len() {
                stack.push((current, idx + 1));
                let parent = parents[idx];
                match marks.get(&parent) {
                    Some(Mark::Visiting) => {
                        return Err(HierarchyError::CyclicHierarchy { role_id: parent });
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(parent, Mark::Visiting);
                        stack.push((parent, 0));
                    }
                }
            } else {
                marks.insert(current, Mark::Done);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(code: &str) -> RoleId {
        RoleId::named(code)
    }

    fn chain() -> Vec<Role> {
        vec![
            Role::new(rid("admin"), "admin", 0),
            Role::new(rid("manager"), "manager", 1).with_parents(vec![rid("admin")]),
            Role::new(rid("staff"), "staff", 2).with_parents(vec![rid("manager")]),
        ]
    }

    #[test]
    fn build_empty() {
        let index = HierarchyIndex::build(&[]).expect("empty hierarchy builds");
        assert!(index.is_empty());
        assert!(index.ancestors_of(rid("ghost")).is_empty());
    }

    #[test]
    fn ancestors_transitive() {
        let index = HierarchyIndex::build(&chain()).expect("chain builds");
        let ancestors = index.ancestors_of(rid("staff"));
        assert!(ancestors.contains(&rid("manager")));
        assert!(ancestors.contains(&rid("admin")));
        assert_eq!(ancestors.len(), 2);

        assert!(index.ancestors_of(rid("admin")).is_empty());
    }

    #[test]
    fn is_ancestor_directional() {
        let index = HierarchyIndex::build(&chain()).expect("chain builds");
        assert!(index.is_ancestor(rid("staff"), rid("manager")));
        assert!(index.is_ancestor(rid("staff"), rid("admin")));
        assert!(!index.is_ancestor(rid("manager"), rid("staff")));
        assert!(!index.is_ancestor(rid("admin"), rid("staff")));
    }

    #[test]
    fn memoization_returns_same_closure() {
        let index = HierarchyIndex::build(&chain()).expect("chain builds");
        let first = index.ancestors_of(rid("staff"));
        let second = index.ancestors_of(rid("staff"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn effective_level_inherits_most_privileged() {
        let index = HierarchyIndex::build(&chain()).expect("chain builds");
        assert_eq!(index.effective_level(rid("admin")), Some(0));
        assert_eq!(index.effective_level(rid("manager")), Some(0));
        assert_eq!(index.effective_level(rid("staff")), Some(0));
        assert_eq!(index.effective_level(rid("ghost")), None);
    }

    #[test]
    fn effective_level_without_ancestors_is_own() {
        let roles = vec![Role::new(rid("solo"), "solo", 3)];
        let index = HierarchyIndex::build(&roles).expect("builds");
        assert_eq!(index.effective_level(rid("solo")), Some(3));
    }

    #[test]
    fn diamond_hierarchy_builds() {
        // Two paths to the same ancestor is a DAG, not a cycle.
        let roles = vec![
            Role::new(rid("root"), "root", 0),
            Role::new(rid("left"), "left", 1).with_parents(vec![rid("root")]),
            Role::new(rid("right"), "right", 1).with_parents(vec![rid("root")]),
            Role::new(rid("leaf"), "leaf", 2).with_parents(vec![rid("left"), rid("right")]),
        ];
        let index = HierarchyIndex::build(&roles).expect("diamond builds");
        let ancestors = index.ancestors_of(rid("leaf"));
        assert_eq!(ancestors.len(), 3);
    }

    #[test]
    fn direct_cycle_rejected() {
        let roles = vec![
            Role::new(rid("a"), "a", 0).with_parents(vec![rid("b")]),
            Role::new(rid("b"), "b", 1).with_parents(vec![rid("a")]),
        ];
        let err = HierarchyIndex::build(&roles).expect_err("cycle must be rejected");
        assert!(matches!(err, HierarchyError::CyclicHierarchy { .. }));
    }

    #[test]
    fn self_cycle_rejected() {
        let roles = vec![Role::new(rid("a"), "a", 0).with_parents(vec![rid("a")])];
        let err = HierarchyIndex::build(&roles).expect_err("self-cycle must be rejected");
        assert_eq!(
            err,
            HierarchyError::CyclicHierarchy { role_id: rid("a") }
        );
    }

    #[test]
    fn long_cycle_rejected() {
        let roles = vec![
            Role::new(rid("a"), "a", 0).with_parents(vec![rid("c")]),
            Role::new(rid("b"), "b", 1).with_parents(vec![rid("a")]),
            Role::new(rid("c"), "c", 2).with_parents(vec![rid("b")]),
        ];
        assert!(HierarchyIndex::build(&roles).is_err());
    }

    #[test]
    fn unknown_parent_rejected() {
        let roles = vec![Role::new(rid("a"), "a", 0).with_parents(vec![rid("missing")])];
        let err = HierarchyIndex::build(&roles).expect_err("dangling parent must be rejected");
        assert!(matches!(err, HierarchyError::UnknownParent { .. }));
    }

    #[test]
    fn grant_reaches_holder_and_seniors() {
        let index = HierarchyIndex::build(&chain()).expect("chain builds");

        // Grant attached to staff reaches staff, manager, and admin holders.
        assert!(index.grant_reaches(rid("staff"), &[rid("staff")]));
        assert!(index.grant_reaches(rid("staff"), &[rid("manager")]));
        assert!(index.grant_reaches(rid("staff"), &[rid("admin")]));

        // Grant attached to manager never reaches a staff-only holder.
        assert!(!index.grant_reaches(rid("manager"), &[rid("staff")]));
        assert!(index.grant_reaches(rid("manager"), &[rid("admin")]));
        assert!(!index.grant_reaches(rid("manager"), &[]));
    }
}
