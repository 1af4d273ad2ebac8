//! Suppression gate
//!
//! Decides whether a candidate alert key may fire now. The gate keeps one
//! expiry timestamp per dedup key; `admit` is an atomic check-and-set, so two
//! concurrent candidates with the same key can never both pass. Entries expire
//! on lookup - a stale entry behaves exactly like a missing one - and
//! [`DedupGate::purge_expired`] exists only to reclaim memory, never for
//! correctness.
//!
//! The key space is sharded to keep unrelated keys off the same lock. A lock
//! is only ever held for the duration of a map operation, never across an
//! await point.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::trace;

const SHARD_COUNT: usize = 16;

/// Check-and-set suppression state keyed by dedup key.
pub struct DedupGate {
    shards: Vec<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl DedupGate {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, DateTime<Utc>>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARD_COUNT]
    }

    /// Admit or suppress a dedup key as of `now`.
    ///
    /// Returns `true` exactly when no live entry exists for the key; in that
    /// case a fresh entry expiring at `now + window` is recorded. A suppressed
    /// hit does not extend the existing expiry, so a standing condition
    /// re-fires once per window measured from its first admission.
    pub fn admit(&self, key: &str, window: Duration, now: DateTime<Utc>) -> bool {
        let mut shard = self.shard(key).lock().expect("dedup shard poisoned");

        if let Some(expires_at) = shard.get(key)
            && *expires_at > now
        {
            trace!("suppressed {key} until {expires_at}");
            return false;
        }

        let expires_at = now + window;
        shard.insert(key.to_string(), expires_at);
        trace!("admitted {key}, suppressing repeats until {expires_at}");
        true
    }

    /// Remove the entry for a key, if any.
    ///
    /// Used when an admitted candidate could not be recorded: the firing never
    /// happened, so the key must not suppress the retry.
    pub fn revoke(&self, key: &str) {
        let mut shard = self.shard(key).lock().expect("dedup shard poisoned");
        shard.remove(key);
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut purged = 0;
        for shard in &self.shards {
            let mut shard = shard.lock().expect("dedup shard poisoned");
            let before = shard.len();
            shard.retain(|_, expires_at| *expires_at > now);
            purged += before - shard.len();
        }
        purged
    }

    /// Number of live entries (expired ones not yet purged are counted).
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().expect("dedup shard poisoned").len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupGate {
    fn default() -> Self {
        Self::new()
    }
}
