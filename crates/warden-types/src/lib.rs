//! Core types for the Warden permission engine.
//!
//! This crate provides the foundational identifier types and the error
//! code contract shared by the Warden crates.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Contract Layer                            │
//! │  (SemVer stable, safe for adapters and callers to depend on)│
//! ├─────────────────────────────────────────────────────────────┤
//! │  warden-types  : UserId, RoleId, PermissionCode  ◄── HERE    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Engine Layer                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  warden-engine : hierarchy, grants, delegation, resolver     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The split keeps adapter implementations (persistence layers providing
//! grants) free of engine internals: a store only needs ids, codes, and
//! the value types re-exported by `warden-engine`.
//!
//! # Identifier Design
//!
//! All identifiers are UUID-based:
//!
//! - **Network compatibility**: safe to transmit across processes/machines
//! - **Determinism where it matters**: seeded entities use UUID v5 so the
//!   same code/label derives the same id everywhere
//! - **Serialization**: first-class serde support
//!
//! # Example
//!
//! ```
//! use warden_types::{PermissionCode, RoleId, UserId};
//!
//! // Seeded roles have deterministic ids
//! let manager = RoleId::named("manager");
//! assert_eq!(manager, RoleId::named("manager"));
//!
//! // Runtime users get random ids
//! let user = UserId::new();
//!
//! // Permission codes are validated dotted strings
//! let code = PermissionCode::parse("workflow.approve").unwrap();
//! assert_eq!(code.domain(), "workflow");
//! ```

mod code;
mod error;
mod id;

pub use code::{CodeError, PermissionCode};
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{DelegationId, RoleId, UserId};
