//! Type-state markers for request progression through the gate.
//!
//! A request context moves `Unauthed → Authed → Authorized`; each state holds
//! exactly what the gate has proven so far. None of the states can be built
//! outside this crate:
//!
//! ```compile_fail
//! use access_gate::{Authorized, Identity};
//!
//! let forged = Authorized {
//!     identity: Identity::new("mallory"),
//!     queries: Vec::new(),
//! };
//! ```
//!
//! ```compile_fail
//! let forged = access_gate::Authorized::new(access_gate::Identity::new("mallory"), Vec::new());
//! ```

use crate::attributes::AuthorizationQuery;
use crate::identity::Identity;

/// Marker for a request whose caller has not been authenticated yet.
#[derive(Debug, Clone, Copy)]
pub struct Unauthed {
    _private: (),
}

impl Unauthed {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// State of a request with an authenticated caller.
#[derive(Debug, Clone)]
pub struct Authed {
    pub(crate) identity: Identity,
}

impl Authed {
    pub(crate) fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

/// State of a request for which every derived query was allowed.
#[derive(Debug, Clone)]
pub struct Authorized {
    pub(crate) identity: Identity,
    pub(crate) queries: Vec<AuthorizationQuery>,
}

impl Authorized {
    pub(crate) fn new(identity: Identity, queries: Vec<AuthorizationQuery>) -> Self {
        Self { identity, queries }
    }
}
