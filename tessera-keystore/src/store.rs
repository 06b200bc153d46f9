//! The expiring cache.

use crate::clock::{Clock, SystemClock};
use crate::types::{CacheKey, GroupKey, KeyKind, Payload, SessionKeys, Ticket};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

struct Entry {
    expiration: DateTime<Utc>,
    payload: Payload,
}

/// Expiring map from `(source, destination, kind)` to key material.
///
/// Entries are never returned at or past their expiration. Expired entries
/// are dropped lazily, on the next lookup of the same key.
pub struct KeyStore {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    clock: Arc<dyn Clock>,
}

impl KeyStore {
    /// Create an empty store on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // Values are replaced whole, never mutated in place, so a poisoned
    // lock still guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------------
    // Generic access
    // -----------------------------------------------------------------------

    /// Insert or replace. The kind is taken from the payload.
    pub fn put(
        &self,
        source: &str,
        destination: &str,
        expiration: DateTime<Utc>,
        payload: Payload,
    ) {
        let key = CacheKey::new(source, destination, payload.kind());
        tracing::trace!(key = %key, %expiration, "keystore put");
        self.lock().insert(key, Entry { expiration, payload });
    }

    /// Look up a live entry, evicting it if it has expired.
    pub fn get(&self, source: &str, destination: &str, kind: KeyKind) -> Option<Payload> {
        let key = CacheKey::new(source, destination, kind);
        let now = self.clock.now();
        let mut entries = self.lock();

        match entries.get(&key) {
            None => return None,
            Some(entry) if now < entry.expiration => return Some(entry.payload.clone()),
            Some(_) => {}
        }
        entries.remove(&key);
        tracing::debug!(key = %key, "evicted expired keystore entry");
        None
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of resident entries, expired ones included until looked up.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // -----------------------------------------------------------------------
    // Typed helpers
    // -----------------------------------------------------------------------

    pub fn put_ticket(&self, source: &str, target: &str, ticket: Ticket, expiration: DateTime<Utc>) {
        self.put(source, target, expiration, Payload::Ticket(ticket));
    }

    pub fn get_ticket(&self, source: &str, target: &str) -> Option<Ticket> {
        match self.get(source, target, KeyKind::Ticket)? {
            Payload::Ticket(t) => Some(t),
            _ => None,
        }
    }

    pub fn put_sek(
        &self,
        source: &str,
        destination: &str,
        keys: SessionKeys,
        expiration: DateTime<Utc>,
    ) {
        self.put(source, destination, expiration, Payload::Sek(keys));
    }

    pub fn get_sek(&self, source: &str, destination: &str) -> Option<SessionKeys> {
        match self.get(source, destination, KeyKind::Sek)? {
            Payload::Sek(k) => Some(k),
            _ => None,
        }
    }

    pub fn put_group_key(
        &self,
        source: &str,
        group: &str,
        key: GroupKey,
        expiration: DateTime<Utc>,
    ) {
        self.put(source, group, expiration, Payload::GroupKey(key));
    }

    pub fn get_group_key(&self, source: &str, group: &str) -> Option<GroupKey> {
        match self.get(source, group, KeyKind::GroupKey)? {
            Payload::GroupKey(k) => Some(k),
            _ => None,
        }
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore").field("entries", &self.len()).finish()
    }
}
