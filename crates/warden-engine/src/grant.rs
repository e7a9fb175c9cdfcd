//! The unified grant model.
//!
//! Every allow/deny statement the engine evaluates — role-based grants,
//! direct user grants, resource-scoped overrides, and synthesized
//! delegation grants — is normalized into a single closed shape,
//! [`PermissionGrant`], after fetch. The resolver matches on the
//! [`GrantSource`] tag exhaustively; there is no stringly-typed branching
//! on where a grant came from.
//!
//! # Specificity
//!
//! A grant's resource scope has one of three specificity tiers:
//!
//! | Tier | Selector | Applies to |
//! |------|----------|------------|
//! | Instance | `type` + `id` | one resource instance |
//! | Type | `type` only | every instance of a type |
//! | Unscoped | neither | everything |
//!
//! Narrower always beats broader during resolution. A selector with an id
//! but no type widens instead of narrowing and is rejected as malformed.

use crate::window::ValidityWindow;
use serde::{Deserialize, Serialize};
use warden_types::{PermissionCode, RoleId, UserId};

/// The subject a grant is attached to: a role or an individual user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantSubject {
    /// Grant attached to a role; reaches users through the hierarchy.
    Role(RoleId),
    /// Grant attached directly to a user.
    User(UserId),
}

impl GrantSubject {
    /// Returns the role id if this is a role subject.
    #[must_use]
    pub fn role_id(&self) -> Option<RoleId> {
        match self {
            Self::Role(id) => Some(*id),
            Self::User(_) => None,
        }
    }

    /// Returns the user id if this is a user subject.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Role(_) => None,
            Self::User(id) => Some(*id),
        }
    }
}

impl std::fmt::Display for GrantSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Role(id) => write!(f, "{id}"),
            Self::User(id) => write!(f, "{id}"),
        }
    }
}

/// Where a grant originated.
///
/// Grants closer to the subject outrank inherited ones when everything
/// else ties: `Direct` beats `Delegated` beats `Role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantSource {
    /// Inherited through role membership and the role hierarchy.
    Role,
    /// Granted to the user directly.
    Direct,
    /// Synthesized from another user's delegated authority.
    Delegated,
}

impl GrantSource {
    /// Resolution rank: higher outranks lower when all else ties.
    #[must_use]
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::Role => 0,
            Self::Delegated => 1,
            Self::Direct => 2,
        }
    }

    /// Returns the source as a lowercase string for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Direct => "direct",
            Self::Delegated => "delegated",
        }
    }
}

/// How narrowly a grant's resource scope is defined.
///
/// Ordered: `Unscoped < Type < Instance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Specificity {
    /// No resource scope: applies to everything.
    Unscoped,
    /// Scoped to a resource type.
    Type,
    /// Scoped to a single resource instance.
    Instance,
}

/// Resource scope of a grant or a permission query.
///
/// # Invariant
///
/// `resource_id` without `resource_type` is malformed: an id only narrows
/// within a type, it never widens. The engine drops such grants with a
/// warning instead of guessing ([`ResourceSelector::specificity`] returns
/// `None` for them).
///
/// # Example
///
/// ```
/// use warden_engine::{ResourceSelector, Specificity};
///
/// let any = ResourceSelector::any();
/// let workflows = ResourceSelector::of_type("workflow");
/// let w42 = ResourceSelector::instance("workflow", "W-42");
///
/// assert_eq!(any.specificity(), Some(Specificity::Unscoped));
/// assert_eq!(workflows.specificity(), Some(Specificity::Type));
/// assert_eq!(w42.specificity(), Some(Specificity::Instance));
///
/// // Broader selectors cover narrower queries, never the reverse
/// assert!(workflows.covers(&w42));
/// assert!(!w42.covers(&workflows));
/// assert!(any.covers(&w42));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceSelector {
    /// Resource type, or `None` for "any type".
    pub resource_type: Option<String>,
    /// Resource instance id, or `None` for "any instance of the type".
    pub resource_id: Option<String>,
}

impl ResourceSelector {
    /// Selector covering every resource.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Selector covering every instance of a resource type.
    #[must_use]
    pub fn of_type(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            resource_id: None,
        }
    }

    /// Selector covering a single resource instance.
    #[must_use]
    pub fn instance(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            resource_id: Some(resource_id.into()),
        }
    }

    /// Returns the specificity tier, or `None` for the malformed
    /// id-without-type shape.
    #[must_use]
    pub fn specificity(&self) -> Option<Specificity> {
        match (&self.resource_type, &self.resource_id) {
            (None, None) => Some(Specificity::Unscoped),
            (Some(_), None) => Some(Specificity::Type),
            (Some(_), Some(_)) => Some(Specificity::Instance),
            (None, Some(_)) => None,
        }
    }

    /// Returns `true` if this selector is equal to or broader than the
    /// queried scope.
    ///
    /// An unscoped selector covers everything; a type selector covers
    /// queries about that type (and its instances); an instance selector
    /// covers only the exact instance. Malformed selectors cover nothing.
    #[must_use]
    pub fn covers(&self, query: &ResourceSelector) -> bool {
        match self.specificity() {
            Some(Specificity::Unscoped) => true,
            Some(Specificity::Type) => self.resource_type == query.resource_type,
            Some(Specificity::Instance) => {
                self.resource_type == query.resource_type && self.resource_id == query.resource_id
            }
            None => false,
        }
    }
}

impl std::fmt::Display for ResourceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.resource_type, &self.resource_id) {
            (None, None) => f.write_str("*"),
            (Some(t), None) => write!(f, "{t}/*"),
            (Some(t), Some(i)) => write!(f, "{t}/{i}"),
            (None, Some(i)) => write!(f, "?/{i}"),
        }
    }
}

/// A single allow/deny statement.
///
/// All grant sources are normalized into this one shape after fetch, so
/// the resolver works on a uniform candidate set.
///
/// # Example
///
/// ```
/// use warden_engine::{GrantSubject, PermissionGrant, ResourceSelector};
/// use warden_types::{PermissionCode, RoleId, UserId};
///
/// let code = PermissionCode::parse("workflow.approve").unwrap();
///
/// // Role-wide allow
/// let role_allow = PermissionGrant::allow(
///     GrantSubject::Role(RoleId::named("manager")),
///     code.clone(),
/// );
/// assert!(role_allow.is_granted);
///
/// // Direct deny narrowed to one workflow
/// let override_deny = PermissionGrant::deny(GrantSubject::User(UserId::named("u")), code)
///     .with_resource(ResourceSelector::instance("workflow", "W-42"))
///     .with_priority(10);
/// assert!(!override_deny.is_granted);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// Who the grant is attached to.
    pub subject: GrantSubject,
    /// The permission this grant speaks about (exact code).
    pub permission_code: PermissionCode,
    /// Resource scope.
    pub resource: ResourceSelector,
    /// `true` = allow, `false` = explicit deny.
    pub is_granted: bool,
    /// Higher wins among grants tied on specificity and polarity.
    pub priority: i32,
    /// Validity window; open-ended sides are `None`.
    pub window: ValidityWindow,
    /// Where the grant came from.
    pub source: GrantSource,
    /// The user who issued the grant, when known.
    pub granted_by: Option<UserId>,
    /// Marks time-bounded grants whose expiry is routine, not exceptional.
    pub is_temporary: bool,
}

impl PermissionGrant {
    /// Creates an allow grant with defaults: unscoped, priority 0, open
    /// window, source inferred from the subject (`Role` subjects are
    /// role-sourced, `User` subjects direct).
    #[must_use]
    pub fn allow(subject: GrantSubject, permission_code: PermissionCode) -> Self {
        Self::new(subject, permission_code, true)
    }

    /// Creates an explicit deny grant with the same defaults as
    /// [`allow`](Self::allow).
    #[must_use]
    pub fn deny(subject: GrantSubject, permission_code: PermissionCode) -> Self {
        Self::new(subject, permission_code, false)
    }

    fn new(subject: GrantSubject, permission_code: PermissionCode, is_granted: bool) -> Self {
        let source = match subject {
            GrantSubject::Role(_) => GrantSource::Role,
            GrantSubject::User(_) => GrantSource::Direct,
        };
        Self {
            subject,
            permission_code,
            resource: ResourceSelector::any(),
            is_granted,
            priority: 0,
            window: ValidityWindow::open(),
            source,
            granted_by: None,
            is_temporary: false,
        }
    }

    /// Sets the resource scope.
    #[must_use]
    pub fn with_resource(mut self, resource: ResourceSelector) -> Self {
        self.resource = resource;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the validity window and marks the grant temporary when the
    /// window has an upper bound.
    #[must_use]
    pub fn with_window(mut self, window: ValidityWindow) -> Self {
        self.is_temporary = window.is_bounded();
        self.window = window;
        self
    }

    /// Overrides the grant source.
    #[must_use]
    pub fn with_source(mut self, source: GrantSource) -> Self {
        self.source = source;
        self
    }

    /// Records the issuing user.
    #[must_use]
    pub fn granted_by(mut self, user: UserId) -> Self {
        self.granted_by = Some(user);
        self
    }

    /// Returns `true` if the resource scope satisfies the
    /// id-requires-type invariant.
    #[must_use]
    pub fn has_valid_shape(&self) -> bool {
        self.resource.specificity().is_some()
    }

    /// Returns the polarity as a string for logs ("allow"/"deny").
    #[must_use]
    pub fn polarity_str(&self) -> &'static str {
        if self.is_granted {
            "allow"
        } else {
            "deny"
        }
    }
}
