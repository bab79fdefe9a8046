//! Short-lived cache of bearer-token authentication results.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use super::Authenticator;
use crate::error::AuthnError;
use crate::identity::Identity;
use crate::request::RequestView;

/// Default lifetime of a cached authentication result.
pub const DEFAULT_AUTHN_TTL: Duration = Duration::from_secs(2 * 60);

/// Default number of tokens kept before the least recently used is evicted.
pub const DEFAULT_AUTHN_CAPACITY: usize = 4096;

struct CachedIdentity {
    identity: Identity,
    expires_at: Instant,
}

/// Caches successful authentications, keyed by bearer token.
///
/// Only identities are cached: unauthenticated verdicts and errors always go
/// back to the inner authenticator, as do requests without a bearer token.
/// At most `capacity` tokens are kept.
pub struct CachingAuthenticator<A> {
    inner: A,
    cache: Mutex<LruCache<String, CachedIdentity>>,
    ttl: Duration,
}

impl<A: Authenticator> CachingAuthenticator<A> {
    /// Wraps `inner` with the default TTL and capacity.
    pub fn new(inner: A) -> Self {
        Self::with_ttl(inner, DEFAULT_AUTHN_TTL)
    }

    /// Wraps `inner`, keeping verdicts for `ttl`.
    pub fn with_ttl(inner: A, ttl: Duration) -> Self {
        Self::with_capacity(inner, ttl, DEFAULT_AUTHN_CAPACITY)
    }

    /// Wraps `inner`, keeping at most `capacity` verdicts for `ttl` each.
    ///
    /// A capacity of zero is treated as one.
    pub fn with_capacity(inner: A, ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Returns the number of cached entries, expired ones included.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Returns the maximum number of cached entries.
    pub fn capacity(&self) -> usize {
        self.cache.lock().cap().get()
    }

    /// Drops every cached verdict.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    fn lookup(&self, token: &str) -> Option<Identity> {
        let mut cache = self.cache.lock();
        let entry = cache.get(token)?;
        if entry.expires_at > Instant::now() {
            return Some(entry.identity.clone());
        }
        cache.pop(token);
        None
    }
}

impl<A> std::fmt::Debug for CachingAuthenticator<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.cache.lock();
        f.debug_struct("CachingAuthenticator")
            .field("entries", &cache.len())
            .field("capacity", &cache.cap())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<A: Authenticator> Authenticator for CachingAuthenticator<A> {
    async fn authenticate(&self, req: &RequestView<'_>) -> Result<Option<Identity>, AuthnError> {
        let Some(token) = req.bearer_token() else {
            return self.inner.authenticate(req).await;
        };

        if let Some(identity) = self.lookup(token) {
            return Ok(Some(identity));
        }

        let identity = self.inner.authenticate(req).await?;
        if let Some(identity) = &identity {
            self.cache.lock().put(
                token.to_string(),
                CachedIdentity {
                    identity: identity.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
        Ok(identity)
    }
}
