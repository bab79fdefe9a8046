//! Inline HTTP access-control gate.
//!
//! The gate sits in front of an upstream service and decides, per request,
//! whether the request may be forwarded:
//! - **Authentication**: an [`Authenticator`](authn::Authenticator) resolves the caller's [`Identity`]
//! - **Attribute resolution**: the request is mapped onto one or more authorization
//!   queries, optionally fanned out over the values of a query parameter
//! - **Authorization**: every query must be allowed by the [`Authorizer`](authz::Authorizer)
//! - **Annotation**: the identity is written into configurable request headers
//!
//! Any failing step ends the request with a [`Rejection`] carrying the HTTP
//! status to answer with (401, 400, 403 or 500).
//!
//! # Core Types
//!
//! - [`AccessGate`]: runs requests through the steps above
//! - [`AuthConfig`](config::AuthConfig): serde configuration, validated when the gate is built
//! - [`RequestCtx`]: type-state request context, `Unauthed → Authed → Authorized`
//! - [`Rejection`]: terminal failure, convertible into an HTTP response
//! - [`audit::AuditSink`]: receives one event per gate step
//!
//! # Examples
//!
//! ```
//! use access_gate::config::AuthConfig;
//!
//! let config = AuthConfig::from_yaml_str(
//!     r#"
//! authentication:
//!   header:
//!     enabled: true
//! authorization:
//!   rewrites:
//!     byQueryParameter:
//!       name: namespace
//!   resourceAttributes:
//!     resource: pods
//!     namespace: "{{.Value}}"
//! "#,
//! )
//! .expect("valid configuration");
//!
//! assert_eq!(config.authorization.rewrite_parameter(), Some("namespace"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attributes;
pub mod audit;
pub mod authn;
pub mod authz;
pub mod config;
mod context;
mod error;
mod gate;
mod identity;
pub mod request;
mod state;
pub mod template;

pub use context::RequestCtx;
pub use error::{
    AuthnError, AuthzError, ConfigError, Rejection, RejectionKind, MALFORMED_MESSAGE,
    UNAUTHORIZED_MESSAGE,
};
pub use gate::{AccessGate, AccessGateBuilder};
pub use identity::Identity;
pub use state::{Authed, Authorized, Unauthed};
