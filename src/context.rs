use http::{HeaderMap, HeaderName, HeaderValue};

use crate::attributes::AuthorizationQuery;
use crate::config::HeaderConfig;
use crate::error::{Rejection, RejectionKind};
use crate::identity::Identity;
use crate::state::{Authed, Authorized, Unauthed};

/// Per-request context tracking how far the gate has got.
///
/// `RequestCtx<S>` is generic over its progression state:
/// - `RequestCtx<Unauthed>`: only a request id
/// - `RequestCtx<Authed>`: has the caller's identity
/// - `RequestCtx<Authorized>`: has the identity and the allowed queries
///
/// # Type-State Progression
///
/// ```text
/// RequestCtx<Unauthed> --authenticate--> RequestCtx<Authed> --authorize--> RequestCtx<Authorized>
/// ```
///
/// Identity headers can only be written from `RequestCtx<Authorized>`, so a
/// rejected request can never leak identity upstream.
///
/// Contexts cannot be constructed by user code; [`AccessGate`](crate::AccessGate)
/// drives the transitions.
#[derive(Debug, Clone)]
pub struct RequestCtx<S = Authorized> {
    request_id: String,
    state: S,
}

impl<S> RequestCtx<S> {
    /// Returns the request id for this context.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl RequestCtx<Unauthed> {
    pub(crate) fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            state: Unauthed::new(),
        }
    }

    /// Moves to `Authed` if the authenticator produced an identity.
    ///
    /// # Errors
    ///
    /// Returns an `Unauthenticated` rejection if `identity` is `None`.
    pub fn authenticate(self, identity: Option<Identity>) -> Result<RequestCtx<Authed>, Rejection> {
        match identity {
            Some(identity) => Ok(RequestCtx {
                request_id: self.request_id,
                state: Authed::new(identity),
            }),
            None => Err(Rejection::unauthenticated()),
        }
    }
}

impl RequestCtx<Authed> {
    /// Returns the authenticated identity.
    pub fn identity(&self) -> &Identity {
        &self.state.identity
    }

    /// Moves to `Authorized` once every query has been allowed.
    pub(crate) fn authorize(self, queries: Vec<AuthorizationQuery>) -> RequestCtx<Authorized> {
        RequestCtx {
            request_id: self.request_id,
            state: Authorized::new(self.state.identity, queries),
        }
    }
}

impl RequestCtx<Authorized> {
    /// Returns the authenticated identity.
    pub fn identity(&self) -> &Identity {
        &self.state.identity
    }

    /// Returns the queries that were allowed, in evaluation order.
    pub fn queries(&self) -> &[AuthorizationQuery] {
        &self.state.queries
    }

    /// Writes the identity headers described by `policy` into `headers`.
    ///
    /// Existing values of both headers are replaced, so callers cannot smuggle
    /// their own identity upstream. Nothing is written if either value cannot
    /// be encoded.
    ///
    /// # Errors
    ///
    /// Returns an `AuthorizationError` rejection if a header name or value is
    /// not representable in HTTP.
    pub fn annotate(&self, headers: &mut HeaderMap, policy: &HeaderConfig) -> Result<(), Rejection> {
        let identity = self.identity();

        let user_name = header_name(&policy.user_field_name)?;
        let groups_name = header_name(&policy.groups_field_name)?;
        let user_value = header_value(&identity.name)?;
        let groups_value = header_value(&identity.joined_groups(&policy.group_separator))?;

        headers.insert(user_name, user_value);
        headers.insert(groups_name, groups_value);
        Ok(())
    }
}

fn header_name(name: &str) -> Result<HeaderName, Rejection> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
        Rejection::new(
            RejectionKind::AuthorizationError,
            format!("Internal error: invalid identity header name {:?}", name),
        )
    })
}

fn header_value(value: &str) -> Result<HeaderValue, Rejection> {
    HeaderValue::from_str(value).map_err(|_| {
        Rejection::new(
            RejectionKind::AuthorizationError,
            "Internal error: identity cannot be encoded as a header value",
        )
    })
}
