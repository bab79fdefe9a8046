//! Audit event schema.

use std::fmt;

use crate::attributes::AuthorizationQuery;

/// Gate step an audit event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventKind {
    /// Identifying the caller
    Authentication,
    /// Deriving authorization queries from the request
    AttributeResolution,
    /// Checking a query against the authorizer
    Authorization,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEventKind::Authentication => write!(f, "authentication"),
            AuditEventKind::AttributeResolution => write!(f, "attribute_resolution"),
            AuditEventKind::Authorization => write!(f, "authorization"),
        }
    }
}

/// Outcome of an audited step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Step succeeded
    Success,
    /// Step was refused
    Denied,
    /// Step failed due to an error
    Error,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Denied => write!(f, "denied"),
            AuditOutcome::Error => write!(f, "error"),
        }
    }
}

/// A structured audit event.
///
/// # Example
///
/// ```
/// use access_gate::audit::{AuditEvent, AuditEventKind, AuditOutcome};
///
/// let event = AuditEvent::new(
///     "req-123",
///     Some("alice"),
///     AuditEventKind::Authorization,
///     AuditOutcome::Denied,
/// )
/// .with_verb("get")
/// .with_resource("pods", "log")
/// .with_reason("no rule matched");
///
/// assert_eq!(event.request_id(), "req-123");
/// assert_eq!(event.user(), Some("alice"));
/// assert_eq!(event.subresource(), Some("log"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    request_id: String,
    /// None until authentication has succeeded
    user: Option<String>,
    kind: AuditEventKind,
    outcome: AuditOutcome,
    verb: Option<String>,
    resource: Option<String>,
    subresource: Option<String>,
    path: Option<String>,
    query_count: Option<usize>,
    reason: Option<String>,
}

impl AuditEvent {
    /// Creates an event with the required fields.
    pub fn new(
        request_id: impl Into<String>,
        user: Option<impl Into<String>>,
        kind: AuditEventKind,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            user: user.map(Into::into),
            kind,
            outcome,
            verb: None,
            resource: None,
            subresource: None,
            path: None,
            query_count: None,
            reason: None,
        }
    }

    /// Creates an authorization event carrying the coordinates of `query`.
    pub fn for_query(
        request_id: impl Into<String>,
        query: &AuthorizationQuery,
        outcome: AuditOutcome,
    ) -> Self {
        let event = Self::new(
            request_id,
            Some(query.user.name.as_str()),
            AuditEventKind::Authorization,
            outcome,
        )
        .with_verb(query.verb.as_str());

        match query.path() {
            Some(path) => event.with_path(path),
            None => event.with_resource(query.resource(), query.subresource()),
        }
    }

    /// Sets the authorization verb.
    pub fn with_verb(mut self, verb: impl Into<String>) -> Self {
        self.verb = Some(verb.into());
        self
    }

    /// Sets the resource and subresource.
    pub fn with_resource(mut self, resource: impl Into<String>, subresource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self.subresource = Some(subresource.into());
        self
    }

    /// Sets the request path, without query string.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets how many queries the request resolved to.
    pub fn with_query_count(mut self, count: usize) -> Self {
        self.query_count = Some(count);
        self
    }

    /// Sets a human-readable reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the request identifier.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the user, if authenticated.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Returns the event kind.
    pub fn kind(&self) -> AuditEventKind {
        self.kind
    }

    /// Returns the outcome.
    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }

    /// Returns the verb, if set.
    pub fn verb(&self) -> Option<&str> {
        self.verb.as_deref()
    }

    /// Returns the resource, if set.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Returns the subresource, if set.
    pub fn subresource(&self) -> Option<&str> {
        self.subresource.as_deref()
    }

    /// Returns the path, if set.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Returns the query count, if set.
    pub fn query_count(&self) -> Option<usize> {
        self.query_count
    }

    /// Returns the reason, if set.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuditEvent[kind={}, outcome={}, request_id={}, user={}",
            self.kind,
            self.outcome,
            self.request_id,
            self.user.as_deref().unwrap_or("<none>")
        )?;

        if let Some(verb) = &self.verb {
            write!(f, ", verb={}", verb)?;
        }
        if let Some(resource) = &self.resource {
            write!(f, ", resource={}", resource)?;
        }
        if let Some(subresource) = &self.subresource {
            write!(f, ", subresource={}", subresource)?;
        }
        if let Some(path) = &self.path {
            write!(f, ", path={}", path)?;
        }
        if let Some(count) = self.query_count {
            write!(f, ", queries={}", count)?;
        }
        if let Some(reason) = &self.reason {
            write!(f, ", reason={}", reason)?;
        }

        write!(f, "]")
    }
}
