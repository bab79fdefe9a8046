use std::fmt;
use std::path::PathBuf;

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Response, StatusCode};

/// Message returned for every authentication failure.
///
/// The detail is suppressed so callers cannot tell a missing credential
/// from a failing authenticator.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Message returned when no authorization query can be derived from a request.
pub const MALFORMED_MESSAGE: &str = "Bad Request. The request or configuration is malformed.";

/// A terminal gate outcome that stops the request from reaching the upstream.
///
/// Every rejection carries the HTTP status the gate emits and the body text
/// sent back to the caller.
///
/// # Examples
///
/// ```
/// use access_gate::{Rejection, RejectionKind};
/// use http::StatusCode;
///
/// let rejection = Rejection::unauthenticated();
/// assert_eq!(rejection.kind(), RejectionKind::Unauthenticated);
/// assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
/// assert_eq!(rejection.message(), "Unauthorized");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Rejection {
    kind: RejectionKind,
    message: String,
}

impl Rejection {
    /// Creates a new rejection.
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The caller could not be authenticated (401).
    pub fn unauthenticated() -> Self {
        Self::new(RejectionKind::Unauthenticated, UNAUTHORIZED_MESSAGE)
    }

    /// No authorization query could be derived from the request (400).
    pub fn malformed() -> Self {
        Self::new(RejectionKind::MalformedRequest, MALFORMED_MESSAGE)
    }

    /// A query was denied, or the decision source had no opinion (403).
    pub fn forbidden(user: &str, verb: &str, resource: &str, subresource: &str) -> Self {
        Self::new(
            RejectionKind::Forbidden,
            format!(
                "Forbidden (user={}, verb={}, resource={}, subresource={})",
                user, verb, resource, subresource
            ),
        )
    }

    /// The decision source failed while evaluating a query (500).
    pub fn authorization_error(user: &str, verb: &str, resource: &str, subresource: &str) -> Self {
        Self::new(
            RejectionKind::AuthorizationError,
            format!(
                "Authorization error (user={}, verb={}, resource={}, subresource={})",
                user, verb, resource, subresource
            ),
        )
    }

    /// Returns the rejection kind.
    pub fn kind(&self) -> RejectionKind {
        self.kind
    }

    /// Returns the body text sent to the caller.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status for this rejection.
    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Builds the plain-text HTTP response for this rejection.
    pub fn into_response(self) -> Response<String> {
        let status = self.status();
        let mut response = Response::new(self.message);
        *response.status_mut() = status;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

/// The kind of gate rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    /// Missing or invalid credential, or an authenticator failure
    Unauthenticated,
    /// The request (or configuration) yields no authorization query
    MalformedRequest,
    /// An authorization query was not allowed
    Forbidden,
    /// The authorizer failed to produce a decision
    AuthorizationError,
}

impl RejectionKind {
    /// Returns the HTTP status emitted for this kind.
    pub fn status(&self) -> StatusCode {
        match self {
            RejectionKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            RejectionKind::MalformedRequest => StatusCode::BAD_REQUEST,
            RejectionKind::Forbidden => StatusCode::FORBIDDEN,
            RejectionKind::AuthorizationError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionKind::Unauthenticated => write!(f, "unauthenticated"),
            RejectionKind::MalformedRequest => write!(f, "malformed request"),
            RejectionKind::Forbidden => write!(f, "forbidden"),
            RejectionKind::AuthorizationError => write!(f, "authorization error"),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration or CA file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that failed to load
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid YAML for the model
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A header-injection field name is not a valid HTTP header name
    #[error("invalid header name for {field}: {value:?}")]
    InvalidHeaderName {
        /// The configuration field holding the name
        field: &'static str,
        /// The rejected value
        value: String,
    },

    /// A resource-attribute template failed to compile or render
    #[error("invalid template for resourceAttributes.{field}: {reason}")]
    Template {
        /// The resource-attribute field the template belongs to
        field: &'static str,
        /// Why the template was rejected
        reason: String,
    },

    /// The client CA bundle contains no certificate
    #[error("client CA bundle contains no certificate")]
    EmptyCaBundle,

    /// The client CA bundle could not be decoded
    #[error("invalid client CA bundle: {0}")]
    InvalidCaBundle(String),
}

/// Errors raised by an authenticator that could not reach a verdict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthnError {
    /// A presented client certificate failed verification
    #[error("invalid client certificate: {0}")]
    InvalidCertificate(String),

    /// The identity source failed or was unreachable
    #[error("authenticator failure: {0}")]
    Internal(String),
}

/// Errors raised by an authorizer that could not reach a decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// The decision source was unreachable
    #[error("decision source unavailable: {0}")]
    Unavailable(String),

    /// The decision source returned an unusable answer
    #[error("authorizer failure: {0}")]
    Internal(String),
}
