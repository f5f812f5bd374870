//! Session-scoped Gemini `thoughtSignature` cache.
//!
//! Gemini rejects a multi-turn tool conversation unless each `functionCall`
//! part in the history carries the signature it issued. Clients that speak
//! OpenAI or Anthropic drop those signatures, so the hub remembers the latest
//! one per session and puts it back on the next request.
//!
//! One [`SignatureCache`] is shared by every request through the pipeline.
//! All read-modify-write sequences run under a single lock.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use llmswitch_types::SignatureCacheConfig;
use parking_lot::Mutex;

/// Latest signature seen for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSignatureEntry {
    pub signature: String,
    /// Message count of the request whose response carried the signature.
    pub message_count: usize,
    pub last_updated: DateTime<Utc>,
}

impl SessionSignatureEntry {
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.last_updated) > ttl
    }
}

#[derive(Default)]
struct CacheState {
    sessions: HashMap<String, SessionSignatureEntry>,
    /// Provider account -> session key of its most recent write.
    accounts: HashMap<String, String>,
}

pub struct SignatureCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    capacity: usize,
    min_signature_length: usize,
}

impl SignatureCache {
    pub fn new(config: &SignatureCacheConfig) -> Self {
        Self::with_limits(
            std::time::Duration::from_secs(config.ttl_secs),
            config.capacity,
            config.min_signature_length,
        )
    }

    pub fn with_limits(ttl: std::time::Duration, capacity: usize, min_signature_length: usize) -> Self {
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(365));
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
            capacity: capacity.max(1),
            min_signature_length,
        }
    }

    pub fn min_signature_length(&self) -> usize {
        self.min_signature_length
    }

    /// Signature for `key`, unless the session was rewound.
    ///
    /// A stored message count above `message_count` means the client went
    /// back in history; the entry is cleared and nothing is returned.
    pub fn get_and_maybe_invalidate(&self, key: &str, message_count: usize) -> Option<String> {
        self.get_and_maybe_invalidate_at(key, message_count, Utc::now())
    }

    pub fn get_and_maybe_invalidate_at(
        &self,
        key: &str,
        message_count: usize,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let mut state = self.state.lock();
        let entry = state.sessions.get(key)?;

        if entry.is_expired(now, self.ttl) {
            tracing::debug!("[SignatureCache] Session {} -> EXPIRED", key);
            state.sessions.remove(key);
            return None;
        }
        if entry.message_count > message_count {
            tracing::info!(
                "[SignatureCache] Session {} rewound ({} -> {} messages), clearing signature",
                key,
                entry.message_count,
                message_count
            );
            state.sessions.remove(key);
            return None;
        }

        tracing::debug!("[SignatureCache] Session {} -> HIT (len={})", key, entry.signature.len());
        Some(entry.signature.clone())
    }

    /// Store the latest signature for `key`. Last write wins.
    ///
    /// Signatures shorter than the configured minimum are ignored. When
    /// `account` is given, the account remembers `key` for cross-session reuse.
    pub fn put(&self, key: &str, signature: &str, message_count: usize, account: Option<&str>) -> bool {
        self.put_at(key, signature, message_count, account, Utc::now())
    }

    pub fn put_at(
        &self,
        key: &str,
        signature: &str,
        message_count: usize,
        account: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        if signature.len() < self.min_signature_length {
            tracing::debug!(
                "[SignatureCache] Ignoring short signature for {} (len={})",
                key,
                signature.len()
            );
            return false;
        }

        let mut state = self.state.lock();
        state.sessions.insert(
            key.to_string(),
            SessionSignatureEntry { signature: signature.to_string(), message_count, last_updated: now },
        );
        if let Some(account) = account.filter(|a| !a.is_empty()) {
            state.accounts.insert(account.to_string(), key.to_string());
        }
        tracing::debug!(
            "[SignatureCache] Cached signature for session {} (len={}, messages={})",
            key,
            signature.len(),
            message_count
        );

        if state.sessions.len() > self.capacity {
            self.evict(&mut state, now);
        }
        true
    }

    /// Key a request should use.
    ///
    /// A derived key with a live entry is used as is. Otherwise, if the
    /// provider account last wrote under a different key that is still live,
    /// the request is bound to that key.
    pub fn resolve_key(&self, account: Option<&str>, derived_key: &str) -> String {
        self.resolve_key_at(account, derived_key, Utc::now())
    }

    pub fn resolve_key_at(&self, account: Option<&str>, derived_key: &str, now: DateTime<Utc>) -> String {
        let state = self.state.lock();
        let live = |key: &str| state.sessions.get(key).is_some_and(|e| !e.is_expired(now, self.ttl));

        if live(derived_key) {
            return derived_key.to_string();
        }
        if let Some(origin) = account.and_then(|a| state.accounts.get(a)) {
            if origin != derived_key && live(origin) {
                tracing::info!("[SignatureCache] Reusing session {} for {} via account binding", origin, derived_key);
                return origin.clone();
            }
        }
        derived_key.to_string()
    }

    pub fn len(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.sessions.clear();
        state.accounts.clear();
    }

    fn evict(&self, state: &mut CacheState, now: DateTime<Utc>) {
        let before = state.sessions.len();
        state.sessions.retain(|_, entry| !entry.is_expired(now, self.ttl));

        while state.sessions.len() > self.capacity {
            let oldest = state
                .sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_updated)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    state.sessions.remove(&key);
                }
                None => break,
            }
        }

        let sessions = &state.sessions;
        state.accounts.retain(|_, key| sessions.contains_key(key));
        tracing::debug!("[SignatureCache] Evicted {} session entries", before - state.sessions.len());
    }
}

impl std::fmt::Debug for SignatureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureCache")
            .field("entries", &self.len())
            .field("ttl_secs", &self.ttl.num_seconds())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new(&SignatureCacheConfig::default())
    }
}

#[cfg(test)]
mod tests;
