//! Authorization decisions.
//!
//! An [`Authorizer`] answers one [`AuthorizationQuery`] at a time. The gate
//! only forwards a request if every query it derived is answered with
//! [`Decision::Allow`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::attributes::AuthorizationQuery;
use crate::error::AuthzError;

mod cached;

pub use cached::{CachingAuthorizer, DEFAULT_ALLOW_TTL, DEFAULT_AUTHZ_CAPACITY, DEFAULT_DENY_TTL};

/// Verdict of an authorizer for a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// The query is permitted
    Allow,
    /// The query is explicitly refused
    Deny,
    /// The authorizer has no rule for the query
    NoOpinion,
}

impl Decision {
    /// Returns true only for [`Decision::Allow`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Deny => write!(f, "deny"),
            Decision::NoOpinion => write!(f, "no_opinion"),
        }
    }
}

/// An authorizer's answer: the decision plus an optional reason.
///
/// The reason is recorded in the audit log only; it is never sent to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzResponse {
    /// The verdict
    pub decision: Decision,
    /// Free-form explanation, possibly empty
    pub reason: String,
}

impl AuthzResponse {
    /// An allow verdict without reason.
    pub fn allow() -> Self {
        Self::new(Decision::Allow, "")
    }

    /// A deny verdict.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::new(Decision::Deny, reason)
    }

    /// A no-opinion verdict.
    pub fn no_opinion(reason: impl Into<String>) -> Self {
        Self::new(Decision::NoOpinion, reason)
    }

    /// Creates a response.
    pub fn new(decision: Decision, reason: impl Into<String>) -> Self {
        Self {
            decision,
            reason: reason.into(),
        }
    }
}

/// Decides authorization queries.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns the verdict for `query`.
    async fn authorize(&self, query: &AuthorizationQuery) -> Result<AuthzResponse, AuthzError>;
}

#[async_trait]
impl<T: Authorizer + ?Sized> Authorizer for Arc<T> {
    async fn authorize(&self, query: &AuthorizationQuery) -> Result<AuthzResponse, AuthzError> {
        (**self).authorize(query).await
    }
}

#[async_trait]
impl<T: Authorizer + ?Sized> Authorizer for Box<T> {
    async fn authorize(&self, query: &AuthorizationQuery) -> Result<AuthzResponse, AuthzError> {
        (**self).authorize(query).await
    }
}
