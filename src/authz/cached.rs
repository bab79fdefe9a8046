//! Decision cache in front of an authorizer.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use super::{Authorizer, AuthzResponse};
use crate::attributes::AuthorizationQuery;
use crate::error::AuthzError;

/// Default lifetime of a cached allow verdict.
pub const DEFAULT_ALLOW_TTL: Duration = Duration::from_secs(5 * 60);

/// Default lifetime of a cached deny or no-opinion verdict.
pub const DEFAULT_DENY_TTL: Duration = Duration::from_secs(30);

/// Default number of verdicts kept before the least recently used is evicted.
pub const DEFAULT_AUTHZ_CAPACITY: usize = 8192;

struct CachedDecision {
    response: AuthzResponse,
    expires_at: Instant,
}

/// Caches authorizer verdicts per query.
///
/// Allow verdicts live longer than refusals so that newly granted access
/// shows up quickly. Errors are never cached. The cache holds at most
/// `capacity` verdicts; beyond that the least recently used one is evicted.
pub struct CachingAuthorizer<Z> {
    inner: Z,
    cache: Mutex<LruCache<AuthorizationQuery, CachedDecision>>,
    allow_ttl: Duration,
    deny_ttl: Duration,
}

impl<Z: Authorizer> CachingAuthorizer<Z> {
    /// Wraps `inner` with the default TTLs and capacity.
    pub fn new(inner: Z) -> Self {
        Self::with_ttls(inner, DEFAULT_ALLOW_TTL, DEFAULT_DENY_TTL)
    }

    /// Wraps `inner` with explicit TTLs for allow and non-allow verdicts.
    pub fn with_ttls(inner: Z, allow_ttl: Duration, deny_ttl: Duration) -> Self {
        Self::with_capacity(inner, allow_ttl, deny_ttl, DEFAULT_AUTHZ_CAPACITY)
    }

    /// Wraps `inner` with explicit TTLs and a maximum number of entries.
    ///
    /// A capacity of zero is treated as one.
    pub fn with_capacity(inner: Z, allow_ttl: Duration, deny_ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            allow_ttl,
            deny_ttl,
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

    fn lookup(&self, query: &AuthorizationQuery) -> Option<AuthzResponse> {
        let mut cache = self.cache.lock();
        let entry = cache.get(query)?;
        if entry.expires_at > Instant::now() {
            return Some(entry.response.clone());
        }
        cache.pop(query);
        None
    }
}

impl<Z> std::fmt::Debug for CachingAuthorizer<Z> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.cache.lock();
        f.debug_struct("CachingAuthorizer")
            .field("entries", &cache.len())
            .field("capacity", &cache.cap())
            .field("allow_ttl", &self.allow_ttl)
            .field("deny_ttl", &self.deny_ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<Z: Authorizer> Authorizer for CachingAuthorizer<Z> {
    async fn authorize(&self, query: &AuthorizationQuery) -> Result<AuthzResponse, AuthzError> {
        if let Some(response) = self.lookup(query) {
            return Ok(response);
        }

        let response = self.inner.authorize(query).await?;
        let ttl = if response.decision.is_allowed() {
            self.allow_ttl
        } else {
            self.deny_ttl
        };
        self.cache.lock().put(
            query.clone(),
            CachedDecision {
                response: response.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(response)
    }
}
