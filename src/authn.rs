//! Caller authentication.
//!
//! An [`Authenticator`] maps a request onto an [`Identity`]. Returning
//! `Ok(None)` means the request carried no credential this authenticator
//! understands; an `Err` means it could not reach a verdict. The gate treats
//! both as unauthenticated.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AuthnError;
use crate::identity::Identity;
use crate::request::RequestView;

mod cached;
mod chain;
mod x509;

pub use cached::{CachingAuthenticator, DEFAULT_AUTHN_CAPACITY, DEFAULT_AUTHN_TTL};
pub use chain::AuthenticatorChain;
pub use x509::X509Authenticator;

/// Resolves the caller of a request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the caller's identity, `None` if the request carries no
    /// usable credential.
    async fn authenticate(&self, req: &RequestView<'_>) -> Result<Option<Identity>, AuthnError>;
}

#[async_trait]
impl<T: Authenticator + ?Sized> Authenticator for Arc<T> {
    async fn authenticate(&self, req: &RequestView<'_>) -> Result<Option<Identity>, AuthnError> {
        (**self).authenticate(req).await
    }
}

#[async_trait]
impl<T: Authenticator + ?Sized> Authenticator for Box<T> {
    async fn authenticate(&self, req: &RequestView<'_>) -> Result<Option<Identity>, AuthnError> {
        (**self).authenticate(req).await
    }
}
