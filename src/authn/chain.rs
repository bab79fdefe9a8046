//! Ordered fallback across several authenticators.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::Authenticator;
use crate::error::AuthnError;
use crate::identity::Identity;
use crate::request::RequestView;

/// Tries authenticators in order and returns the first identity found.
///
/// If none produces an identity, the last error wins; with no errors the
/// request is unauthenticated.
///
/// # Example
///
/// ```
/// use access_gate::authn::AuthenticatorChain;
///
/// let chain = AuthenticatorChain::new();
/// assert!(chain.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct AuthenticatorChain {
    authenticators: Vec<Arc<dyn Authenticator>>,
}

impl AuthenticatorChain {
    /// Creates an empty chain, which authenticates nobody.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an authenticator to the chain.
    pub fn with(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticators.push(Arc::new(authenticator));
        self
    }

    /// Appends a shared authenticator to the chain.
    pub fn push(&mut self, authenticator: Arc<dyn Authenticator>) {
        self.authenticators.push(authenticator);
    }

    /// Returns the number of authenticators in the chain.
    pub fn len(&self) -> usize {
        self.authenticators.len()
    }

    /// Returns true if the chain has no authenticators.
    pub fn is_empty(&self) -> bool {
        self.authenticators.is_empty()
    }
}

impl std::fmt::Debug for AuthenticatorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatorChain")
            .field("len", &self.authenticators.len())
            .finish()
    }
}

#[async_trait]
impl Authenticator for AuthenticatorChain {
    async fn authenticate(&self, req: &RequestView<'_>) -> Result<Option<Identity>, AuthnError> {
        let mut last_error: Option<AuthnError> = None;

        for (index, authenticator) in self.authenticators.iter().enumerate() {
            match authenticator.authenticate(req).await {
                Ok(Some(identity)) => return Ok(Some(identity)),
                Ok(None) => {}
                Err(e) => {
                    debug!(index, error = %e, "authenticator failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}
