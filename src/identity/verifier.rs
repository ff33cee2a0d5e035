//! Per-request bearer token verification.
//!
//! With a zero TTL (the default) every call goes to the provider and nothing
//! is remembered. With a positive TTL a successful verification is reused for
//! at most that long; a token revoked at the provider can therefore stay
//! accepted here for up to one TTL unless it was signed out through this
//! process, which evicts it immediately.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::credentials::fingerprint;
use super::{Identity, IdentityError, IdentityProvider};

/// Upper bound on cached entries. Expired entries go first, then the oldest.
const MAX_CACHED_TOKENS: usize = 10_000;

pub struct TokenVerifier {
    provider: Arc<dyn IdentityProvider>,
    cache: Option<VerificationCache>,
}

struct VerificationCache {
    ttl: Duration,
    max_entries: usize,
    /// Token fingerprint -> (identity, verified at).
    entries: RwLock<HashMap<String, (Identity, Instant)>>,
}

impl VerificationCache {
    fn get(&self, key: &str) -> Option<Identity> {
        let entries = self.entries.read().expect("verification cache poisoned");
        entries
            .get(key)
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(identity, _)| identity.clone())
    }

    fn put(&self, key: String, identity: Identity) {
        let mut entries = self.entries.write().expect("verification cache poisoned");
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, (_, at)| at.elapsed() < ttl);

            let excess = (entries.len() + 1).saturating_sub(self.max_entries);
            if excess > 0 {
                let mut by_age: Vec<(Instant, String)> = entries
                    .iter()
                    .map(|(k, (_, at))| (*at, k.clone()))
                    .collect();
                by_age.sort_unstable();
                for (_, stale) in by_age.into_iter().take(excess) {
                    entries.remove(&stale);
                }
            }
        }
        entries.insert(key, (identity, Instant::now()));
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .expect("verification cache poisoned")
            .remove(key);
    }

    fn len(&self) -> usize {
        self.entries.read().expect("verification cache poisoned").len()
    }
}

impl TokenVerifier {
    /// A zero `cache_ttl` disables caching.
    pub fn new(provider: Arc<dyn IdentityProvider>, cache_ttl: Duration) -> Self {
        let cache = (!cache_ttl.is_zero()).then(|| VerificationCache {
            ttl: cache_ttl,
            max_entries: MAX_CACHED_TOKENS,
            entries: RwLock::new(HashMap::new()),
        });
        Self { provider, cache }
    }

    /// Resolve a bearer token to its identity.
    pub async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let Some(cache) = &self.cache else {
            return self.provider.get_user(token).await;
        };

        let key = fingerprint(token);
        if let Some(identity) = cache.get(&key) {
            tracing::trace!(user_id = %identity.id, "Token verification served from cache");
            return Ok(identity);
        }

        let identity = self.provider.get_user(token).await?;
        cache.put(key, identity.clone());
        Ok(identity)
    }

    /// Drop any cached verification for a token.
    pub fn forget(&self, token: &str) {
        if let Some(cache) = &self.cache {
            cache.remove(&fingerprint(token));
        }
    }

    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    /// Number of cached verifications (zero when caching is off).
    pub fn cached_len(&self) -> usize {
        self.cache.as_ref().map_or(0, VerificationCache::len)
    }
}
