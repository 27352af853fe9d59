use crate::action_info::{ActionInfo, decode_payload};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Bounds applied to cached action info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionInfoCacheConfig {
    /// Records older than this are treated as absent; `None` keeps them forever
    pub ttl: Option<Duration>,
    /// Oldest records are evicted beyond this count; `None` means unbounded
    pub max_entries: Option<usize>,
}

impl Default for ActionInfoCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::from_secs(600)),
            max_entries: Some(1024),
        }
    }
}

impl ActionInfoCacheConfig {
    pub fn unbounded() -> Self {
        Self {
            ttl: None,
            max_entries: None,
        }
    }
}

#[derive(Debug)]
struct CachedActionInfo {
    record: ActionInfo,
    inserted_at: Instant,
    sequence: u64,
}

/// Concurrent map of resource name to pending action info.
///
/// Keys are independent: `put` and `pop` on different resource names never
/// block or disturb each other beyond shard contention.
#[derive(Debug)]
pub struct ActionInfoCache {
    entries: DashMap<String, CachedActionInfo>,
    config: ActionInfoCacheConfig,
    next_sequence: AtomicU64,
}

impl Default for ActionInfoCache {
    fn default() -> Self {
        Self::new(ActionInfoCacheConfig::default())
    }
}

impl ActionInfoCache {
    pub fn new(config: ActionInfoCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ActionInfoCacheConfig {
        &self.config
    }

    /// Insert or replace the record for `resource_name`
    pub fn put(&self, resource_name: impl Into<String>, record: ActionInfo) {
        self.purge_expired();
        self.insert(resource_name.into(), record);
        self.enforce_capacity();
    }

    fn insert(&self, resource_name: String, record: ActionInfo) {
        let entry = CachedActionInfo {
            record,
            inserted_at: Instant::now(),
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
        };
        if self.entries.insert(resource_name.clone(), entry).is_some() {
            debug!(resource = %resource_name, "Replaced cached action info");
        } else {
            debug!(resource = %resource_name, "Cached action info");
        }
    }

    /// Decode a metadata payload and cache every record in it.
    ///
    /// Nothing is cached unless the whole payload decodes. Capacity is
    /// enforced once the whole payload is in, so records from earlier
    /// payloads are evicted first. A payload with more records than
    /// `max_entries` cannot fit; only `max_entries` of its records are kept.
    /// Returns the number of records in the payload.
    pub fn put_payload(&self, data: &[u8]) -> Result<usize, serde_json::Error> {
        let decoded = decode_payload(data)?;
        let count = decoded.len();
        if let Some(max_entries) = self.config.max_entries
            && count > max_entries
        {
            warn!(
                "Action info payload holds {} records but the cache keeps at most {}",
                count, max_entries
            );
        }

        self.purge_expired();
        for (resource_name, record) in decoded {
            self.insert(resource_name, record);
        }
        self.enforce_capacity();
        Ok(count)
    }

    /// Remove and return the record for `resource_name`, if present and fresh
    pub fn pop(&self, resource_name: &str) -> Option<ActionInfo> {
        let (_, entry) = self.entries.remove(resource_name)?;
        if self.is_expired(&entry) {
            warn!(
                resource = %resource_name,
                age_secs = entry.inserted_at.elapsed().as_secs(),
                "Discarded expired action info, resource goes to the archive"
            );
            return None;
        }
        Some(entry.record)
    }

    /// Restart the TTL of a fresh record, e.g. when its transfer starts.
    /// Returns whether a fresh record was found.
    pub fn touch(&self, resource_name: &str) -> bool {
        let Some(mut entry) = self.entries.get_mut(resource_name) else {
            return false;
        };
        if self.is_expired(&entry) {
            return false;
        }
        entry.inserted_at = Instant::now();
        true
    }

    /// Whether a fresh record is cached for `resource_name`
    pub fn contains(&self, resource_name: &str) -> bool {
        self.entries
            .get(resource_name)
            .is_some_and(|entry| !self.is_expired(&entry))
    }

    /// Drop every record older than the configured TTL
    pub fn purge_expired(&self) -> usize {
        if self.config.ttl.is_none() {
            return 0;
        }
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            info!("Purged {} expired action info records", purged);
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all cached records
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn is_expired(&self, entry: &CachedActionInfo) -> bool {
        self.config
            .ttl
            .is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl)
    }

    fn enforce_capacity(&self) {
        let Some(max_entries) = self.config.max_entries else {
            return;
        };

        while self.entries.len() > max_entries {
            // The iterator holds shard locks, so pick the victim before removing it.
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.sequence)
                .map(|entry| (entry.key().clone(), entry.sequence));

            let Some((resource_name, sequence)) = oldest else {
                break;
            };
            if self
                .entries
                .remove_if(&resource_name, |_, entry| entry.sequence == sequence)
                .is_some()
            {
                debug!(resource = %resource_name, "Evicted oldest action info");
            }
        }
    }
}
