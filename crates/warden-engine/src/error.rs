//! Engine error taxonomy.
//!
//! Two propagation classes:
//!
//! - **Construction-time** errors (a cyclic hierarchy) are not recovered
//!   locally — the rebuild fails and the engine keeps serving the
//!   previous snapshot until the data is fixed.
//! - **Per-call** errors (adapter failure, malformed grants, cyclic
//!   delegations) are isolated to that call or that grant and surface
//!   as a deny verdict carrying the error code — never an "unknown"
//!   state a caller might default to allow.

use crate::hierarchy::HierarchyError;
use crate::store::StoreError;
use thiserror::Error;
use warden_types::{DelegationId, ErrorCode};

/// Unified error type for the permission engine.
///
/// # Example
///
/// ```
/// use warden_engine::EngineError;
/// use warden_types::ErrorCode;
///
/// let err = EngineError::HierarchyNotBuilt;
/// assert_eq!(err.code(), "WARDEN_HIERARCHY_NOT_BUILT");
/// assert!(err.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// The role hierarchy could not be built.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// A delegation chain loops back on itself.
    ///
    /// Recoverable: the offending link is excluded from resolution and
    /// an operator can revoke it.
    #[error("cyclic delegation chain at {delegation_id}")]
    CyclicDelegation {
        /// The link that closed the cycle.
        delegation_id: DelegationId,
    },

    /// The grant store adapter failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A grant violated the id-requires-type invariant.
    #[error("invalid grant shape: resource id without resource type")]
    InvalidGrantShape,

    /// No hierarchy snapshot exists yet; `rebuild_hierarchy` has never
    /// succeeded.
    #[error("role hierarchy index has not been built")]
    HierarchyNotBuilt,
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        match self {
            Self::Hierarchy(HierarchyError::CyclicHierarchy { .. }) => "WARDEN_CYCLIC_HIERARCHY",
            Self::Hierarchy(HierarchyError::UnknownParent { .. }) => "WARDEN_UNKNOWN_PARENT_ROLE",
            Self::CyclicDelegation { .. } => "WARDEN_CYCLIC_DELEGATION",
            Self::Store(_) => "WARDEN_STORE_UNAVAILABLE",
            Self::InvalidGrantShape => "WARDEN_INVALID_GRANT",
            Self::HierarchyNotBuilt => "WARDEN_HIERARCHY_NOT_BUILT",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // The hierarchy data itself must be fixed; no retry helps.
            Self::Hierarchy(_) => false,
            // Operator can revoke the link; the store can come back;
            // the malformed grant can be repaired; a rebuild can succeed.
            Self::CyclicDelegation { .. }
            | Self::Store(_)
            | Self::InvalidGrantShape
            | Self::HierarchyNotBuilt => true,
        }
    }
}
