use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use oaguard_core::{KvStore, OaStatusRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Namespace tag keeping cache entries clear of unrelated stored state.
const KEY_PREFIX: &str = "oa_cache_";

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    /// Unix timestamp secs at write time.
    timestamp: u64,
    data: OaStatusRecord,
}

/// Time-boxed store of resolved open-access records, keyed by normalized
/// DOI. Expired entries are deleted lazily when a read observes them; there
/// is no proactive sweep.
///
/// The store sits behind a mutex so concurrent `decide()` calls can share
/// one cache; operations are short and synchronous. Concurrent writers for
/// the same DOI race benignly — last writer wins with an identical record.
pub struct OaStatusCache {
    store: Mutex<KvStore>,
    ttl: Duration,
}

impl OaStatusCache {
    pub fn new(store: KvStore, ttl: Duration) -> Self {
        Self {
            store: Mutex::new(store),
            ttl,
        }
    }

    /// The store stays usable even if a holder panicked mid-operation; each
    /// operation is a single statement against the kv table.
    fn store(&self) -> MutexGuard<'_, KvStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the cached record for a DOI, or `None` if absent or expired.
    /// An expired entry is removed as a side effect of the read.
    pub fn get(&self, doi: &str) -> Result<Option<OaStatusRecord>> {
        let key = cache_key(doi);
        let store = self.store();
        let Some(raw) = store.get(&key)? else {
            return Ok(None);
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                // Unreadable entries are treated like expired ones.
                debug!("dropping undecodable cache entry for {doi}: {e}");
                store.delete(&key)?;
                return Ok(None);
            }
        };

        if now_secs().saturating_sub(entry.timestamp) > self.ttl.as_secs() {
            store.delete(&key)?;
            return Ok(None);
        }

        Ok(Some(entry.data))
    }

    /// Upsert, stamping the current time.
    pub fn put(&self, doi: &str, record: &OaStatusRecord) -> Result<()> {
        let entry = CacheEntry {
            timestamp: now_secs(),
            data: record.clone(),
        };
        let raw = serde_json::to_string(&entry).map_err(oaguard_core::CoreError::from)?;
        self.store().put(&cache_key(doi), &raw)?;
        Ok(())
    }

    pub fn contains(&self, doi: &str) -> Result<bool> {
        Ok(self.store().get(&cache_key(doi))?.is_some())
    }

    /// Remove every cache entry; returns the number removed.
    pub fn clear_all(&self) -> Result<usize> {
        Ok(self.store().delete_prefix(KEY_PREFIX)?)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.store().keys_with_prefix(KEY_PREFIX)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn cache_key(doi: &str) -> String {
    let normalized = doi.trim().trim_start_matches("doi:").trim();
    format!("{KEY_PREFIX}{normalized}")
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use oaguard_core::OaStatus;

    use super::*;

    fn record(doi: &str, is_oa: bool) -> OaStatusRecord {
        OaStatusRecord {
            doi: doi.to_string(),
            is_oa,
            oa_status: Some(OaStatus::Gold),
            oa_url: None,
            host_type: None,
            version: None,
            license: None,
            error: None,
        }
    }

    fn cache(ttl: Duration) -> OaStatusCache {
        OaStatusCache::new(KvStore::open_in_memory().unwrap(), ttl)
    }

    #[test]
    fn put_then_get_returns_same_record() {
        let cache = cache(DEFAULT_TTL);
        let rec = record("10.1000/xyz", true);
        cache.put("10.1000/xyz", &rec).unwrap();
        assert_eq!(cache.get("10.1000/xyz").unwrap(), Some(rec));
    }

    #[test]
    fn doi_prefix_is_stripped_from_keys() {
        let cache = cache(DEFAULT_TTL);
        let rec = record("10.1000/xyz", true);
        cache.put("doi:10.1000/xyz", &rec).unwrap();
        assert_eq!(cache.get("10.1000/xyz").unwrap(), Some(rec));
    }

    #[test]
    fn expired_entry_is_deleted_on_read() {
        let cache = cache(Duration::from_secs(0));
        cache.put("10.1000/xyz", &record("10.1000/xyz", true)).unwrap();
        std::thread::sleep(Duration::from_millis(1100));

        assert_eq!(cache.get("10.1000/xyz").unwrap(), None);
        // The read removed the stale entry.
        assert!(!cache.contains("10.1000/xyz").unwrap());
    }

    #[test]
    fn poisoned_mutex_does_not_panic_readers() {
        let cache = std::sync::Arc::new(cache(DEFAULT_TTL));
        let rec = record("10.1000/xyz", true);
        cache.put("10.1000/xyz", &rec).unwrap();

        // Panic while holding the lock to poison it.
        let poisoner = std::sync::Arc::clone(&cache);
        std::thread::spawn(move || {
            let _guard = poisoner.store.lock().unwrap();
            panic!("poison");
        })
        .join()
        .unwrap_err();

        assert_eq!(cache.get("10.1000/xyz").unwrap(), Some(rec));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn clear_all_reports_count_and_spares_other_state() {
        let store = KvStore::open_in_memory().unwrap();
        store.put("settings_theme", "dark").unwrap();
        let cache = OaStatusCache::new(store, DEFAULT_TTL);

        cache.put("10.1000/a", &record("10.1000/a", true)).unwrap();
        cache.put("10.1000/b", &record("10.1000/b", false)).unwrap();

        assert_eq!(cache.clear_all().unwrap(), 2);
        assert!(cache.is_empty().unwrap());
    }
}
