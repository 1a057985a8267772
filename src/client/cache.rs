use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::storage::{KeyValueStorage, StorageError};
use crate::widget::ConfigPayload;

/// Storage key of the cached configuration.
pub const CACHE_KEY: &str = "whatsapp_widget_config";

/// Maximum age of a cached configuration.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

// ============================================================================
// Clock
// ============================================================================

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct CachedEntry {
    #[serde(flatten)]
    payload: ConfigPayload,
    #[serde(rename = "_timestamp")]
    timestamp: i64,
}

/// What a cache read found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Fresh(ConfigPayload),
    Stale { age_ms: i64 },
    Malformed,
    Missing,
}

/// Time-bounded cache of the last successfully fetched configuration.
///
/// An entry is either fresh as a whole or discarded as a whole.
#[derive(Clone)]
pub struct LocalConfigCache {
    storage: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl LocalConfigCache {
    pub fn new(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            storage,
            clock,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up the cached configuration.
    ///
    /// Stale and malformed entries are removed on the way out. A timestamp in
    /// the future counts as stale.
    pub fn lookup(&self) -> Result<CacheLookup, StorageError> {
        let Some(raw) = self.storage.get(CACHE_KEY)? else {
            return Ok(CacheLookup::Missing);
        };

        let entry: CachedEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("discarding malformed cached config: {e}");
                let _ = self.storage.remove(CACHE_KEY);
                return Ok(CacheLookup::Malformed);
            }
        };

        // A timestamp too far from now to subtract cannot be a real write.
        let Some(age_ms) = self.clock.now_ms().checked_sub(entry.timestamp) else {
            debug!(timestamp = entry.timestamp, "discarding cached config with bogus timestamp");
            let _ = self.storage.remove(CACHE_KEY);
            return Ok(CacheLookup::Malformed);
        };
        if age_ms >= 0 && (age_ms as u128) < self.ttl.as_millis() {
            Ok(CacheLookup::Fresh(entry.payload))
        } else {
            let _ = self.storage.remove(CACHE_KEY);
            Ok(CacheLookup::Stale { age_ms })
        }
    }

    /// The cached payload if present and fresh. Every failure reads as a miss.
    pub fn read_fresh(&self) -> Option<ConfigPayload> {
        match self.lookup() {
            Ok(CacheLookup::Fresh(payload)) => Some(payload),
            Ok(_) => None,
            Err(e) => {
                debug!("config cache unreadable, treating as miss: {e}");
                None
            }
        }
    }

    /// Store a freshly fetched payload stamped with the current time.
    pub fn write(&self, payload: &ConfigPayload) -> Result<(), StorageError> {
        let entry = CachedEntry {
            payload: payload.clone(),
            timestamp: self.clock.now_ms(),
        };
        let raw = serde_json::to_string(&entry)
            .map_err(|e| StorageError::Unavailable(format!("cannot encode cache entry: {e}")))?;
        self.storage.set(CACHE_KEY, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::{DisabledStorage, MemoryStorage};
    use crate::widget::defaults::default_payload;
    use pretty_assertions::assert_eq;

    fn cache_with(storage: Arc<dyn KeyValueStorage>, clock: Arc<ManualClock>) -> LocalConfigCache {
        LocalConfigCache::new(storage, clock, DEFAULT_CACHE_TTL)
    }

    fn sample_payload() -> ConfigPayload {
        let mut payload = default_payload();
        payload.id = "cfg-42".into();
        payload.tooltip_text = "Talk to sales".into();
        payload
    }

    #[test]
    fn fresh_entry_roundtrips_exactly() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = cache_with(storage.clone(), clock.clone());

        let payload = sample_payload();
        cache.write(&payload).unwrap();
        clock.advance(Duration::from_millis(29_999));

        assert_eq!(cache.lookup().unwrap(), CacheLookup::Fresh(payload.clone()));
        // Hitting the cache again yields the identical value.
        assert_eq!(cache.read_fresh(), Some(payload));
    }

    #[test]
    fn entry_stores_timestamp_alongside_fields() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(42));
        cache_with(storage.clone(), clock).write(&sample_payload()).unwrap();

        let raw = storage.get(CACHE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["_timestamp"], 42);
        assert_eq!(value["id"], "cfg-42");
    }

    #[test]
    fn entry_expires_at_ttl() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(storage.clone(), clock.clone());

        cache.write(&sample_payload()).unwrap();
        clock.advance(Duration::from_millis(30_000));

        assert_eq!(cache.lookup().unwrap(), CacheLookup::Stale { age_ms: 30_000 });
        // Discarded as a whole.
        assert!(storage.get(CACHE_KEY).unwrap().is_none());
    }

    #[test]
    fn future_timestamp_is_stale() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(10_000));
        let cache = cache_with(storage, clock.clone());

        cache.write(&sample_payload()).unwrap();
        clock.set(5_000);
        assert!(matches!(cache.lookup().unwrap(), CacheLookup::Stale { .. }));
    }

    #[test]
    fn malformed_entry_is_a_miss() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(CACHE_KEY, "{not json").unwrap();
        let cache = cache_with(storage.clone(), Arc::new(ManualClock::new(0)));

        assert_eq!(cache.lookup().unwrap(), CacheLookup::Malformed);
        assert!(cache.read_fresh().is_none());
        assert!(storage.get(CACHE_KEY).unwrap().is_none());
    }

    #[test]
    fn entry_without_timestamp_is_malformed() {
        let storage = Arc::new(MemoryStorage::new());
        let raw = serde_json::to_string(&sample_payload()).unwrap();
        storage.set(CACHE_KEY, &raw).unwrap();
        let cache = cache_with(storage, Arc::new(ManualClock::new(0)));

        assert_eq!(cache.lookup().unwrap(), CacheLookup::Malformed);
    }

    #[test]
    fn out_of_range_timestamp_is_malformed() {
        let storage = Arc::new(MemoryStorage::new());
        let mut value = serde_json::to_value(sample_payload()).unwrap();
        value["_timestamp"] = serde_json::json!(i64::MIN);
        storage.set(CACHE_KEY, &value.to_string()).unwrap();
        let cache = cache_with(storage.clone(), Arc::new(ManualClock::new(1_700_000_000_000)));

        assert_eq!(cache.lookup().unwrap(), CacheLookup::Malformed);
        assert!(cache.read_fresh().is_none());
        assert!(storage.get(CACHE_KEY).unwrap().is_none());
    }

    #[test]
    fn unavailable_storage_reads_as_miss() {
        let cache = cache_with(Arc::new(DisabledStorage), Arc::new(ManualClock::new(0)));
        assert!(cache.lookup().is_err());
        assert!(cache.read_fresh().is_none());
        assert!(cache.write(&sample_payload()).is_err());
    }
}
