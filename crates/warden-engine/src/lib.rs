//! Permission resolution engine for Warden.
//!
//! This crate decides whether a user may perform an action on a
//! resource, by combining role-hierarchy inheritance, direct user
//! grants/denials, resource-scoped overrides, time-bounded grants, and
//! delegated authority — then resolving conflicts deterministically.
//!
//! # Resolution Model
//!
//! ```text
//! Verdict = resolve( hierarchy(ROLE grants) ∪ DIRECT grants ∪ DELEGATED grants )
//!               │
//!               ├── 1. specificity   : instance > type > unscoped
//!               ├── 2. polarity      : deny beats allow at equal specificity
//!               ├── 3. priority      : higher value wins
//!               ├── 4. source        : direct > delegated > role
//!               └── 5. no match      : deny (fail-closed)
//! ```
//!
//! # Crate Architecture
//!
//! ```text
//! warden-types   (UserId, RoleId, PermissionCode, ErrorCode)
//!      ↑
//! warden-engine  ◄── THIS CRATE
//!   ├── grant      : PermissionGrant — one closed shape for all sources
//!   ├── window     : ValidityWindow — temporal filter
//!   ├── hierarchy  : HierarchyIndex — role DAG snapshot, cycle-checked
//!   ├── store      : GrantStore trait + MemoryStore reference impl
//!   ├── delegation : Delegation + chain walker
//!   ├── resolver   : conflict resolution (internal)
//!   ├── verdict    : Verdict + explanation trail
//!   └── engine     : PermissionEngine — the public decision API
//! ```
//!
//! # Design Principles
//!
//! - **Fail-closed** — no applicable grant, a malformed grant, or any
//!   internal failure resolves to deny, never to an ambiguous state
//! - **Pure per call** — a check is a function of its inputs and the
//!   current snapshot; identical inputs yield identical verdicts
//! - **One hierarchy owner** — the store returns raw grants tagged by
//!   subject; hierarchy expansion happens here and nowhere else
//! - **Snapshots, not mutation** — the role hierarchy is an immutable
//!   index swapped wholesale on rebuild; readers never block
//!
//! # Example
//!
//! ```
//! use warden_engine::{
//!     GrantSubject, MemoryStore, PermissionEngine, PermissionGrant, ResourceSelector, Role,
//! };
//! use warden_types::{PermissionCode, RoleId, UserId};
//!
//! let store = MemoryStore::new();
//! let manager = RoleId::named("manager");
//! let staff = RoleId::named("staff");
//! let alice = UserId::named("alice");
//! let approve = PermissionCode::parse("workflow.approve").unwrap();
//!
//! store.add_role(Role::new(manager, "manager", 1));
//! store.add_role(Role::new(staff, "staff", 2).with_parents(vec![manager]));
//! store.assign_role(alice, staff);
//!
//! // Role-wide allow, with a direct deny carved out for one workflow.
//! store.add_grant(PermissionGrant::allow(GrantSubject::Role(staff), approve.clone()));
//! store.add_grant(
//!     PermissionGrant::deny(GrantSubject::User(alice), approve.clone())
//!         .with_resource(ResourceSelector::instance("workflow", "W-42")),
//! );
//!
//! let engine = PermissionEngine::new(store);
//! engine.rebuild_hierarchy().unwrap();
//!
//! let w42 = ResourceSelector::instance("workflow", "W-42");
//! let w99 = ResourceSelector::instance("workflow", "W-99");
//! assert!(engine.check_permission(alice, &approve, &w42, None).is_denied());
//! assert!(engine.check_permission(alice, &approve, &w99, None).is_allowed());
//! ```

pub mod delegation;
pub mod engine;
pub mod error;
pub mod grant;
pub mod hierarchy;
mod resolver;
pub mod store;
pub mod verdict;
pub mod window;

// Re-export core types
pub use delegation::{Delegation, DelegationScope};
pub use engine::{EngineConfig, PermissionEngine, PermissionQuery};
pub use error::EngineError;
pub use grant::{GrantSource, GrantSubject, PermissionGrant, ResourceSelector, Specificity};
pub use hierarchy::{HierarchyError, HierarchyIndex, Role};
pub use store::{CandidateGrants, GrantStore, MemoryStore, StoreError};
pub use verdict::{TrailEntry, TrailReason, Verdict};
pub use window::ValidityWindow;

// Re-export foundational ids from warden_types for convenience
pub use warden_types::{DelegationId, PermissionCode, RoleId, UserId};
