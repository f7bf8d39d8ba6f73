use crate::{CacheShape, CacheValue};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use orgscan_core::{Compressor, OrgScanError, Result, ZstdCompressor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Introspection record for one cache entry, as returned by `describe()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryInfo {
    pub name: String,
    pub shape: CacheShape,
    pub is_empty: bool,
    pub element_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    compressed: String,
    shape: CacheShape,
    is_empty: bool,
    element_count: usize,
    created_at: DateTime<Utc>,
}

/// Key/value store of compressed payloads. Entries are created on first
/// write, overwritten on re-write, and removed only by explicit caller
/// action; there is no TTL or eviction.
///
/// Keys are namespaced as `<prefix>.<section>.<key>`; callers address
/// entries by the bare key within a section.
pub struct CacheStore {
    prefix: String,
    section: String,
    entries: DashMap<String, StoredEntry>,
    compressor: Arc<dyn Compressor>,
}

impl CacheStore {
    pub fn new(prefix: impl Into<String>, section: impl Into<String>) -> Self {
        Self::with_compressor(prefix, section, Arc::new(ZstdCompressor))
    }

    pub fn with_compressor(
        prefix: impl Into<String>,
        section: impl Into<String>,
        compressor: Arc<dyn Compressor>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            section: section.into(),
            entries: DashMap::new(),
            compressor,
        }
    }

    fn qualify(&self, key: &str) -> String {
        format!("{}.{}.{}", self.prefix, self.section, key)
    }

    pub fn set(&self, key: &str, value: &CacheValue) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        let compressed = self.compressor.compress(&serialized)?;
        let qualified = self.qualify(key);
        debug!(key = %qualified, bytes = compressed.len(), "cache write");
        self.entries.insert(
            qualified,
            StoredEntry {
                compressed,
                shape: value.shape(),
                is_empty: value.is_empty(),
                element_count: value.element_count(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Returns `None` for a missing key. A stored `CacheValue::Null` is a
    /// hit, returned as `Some(CacheValue::Null)`.
    pub fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let qualified = self.qualify(key);
        let Some(entry) = self.entries.get(&qualified) else {
            return Ok(None);
        };
        let serialized = self.compressor.decompress(&entry.compressed)?;
        let value: CacheValue = serde_json::from_str(&serialized)
            .map_err(|e| OrgScanError::Cache(format!("corrupt entry {qualified}: {e}")))?;
        Ok(Some(value))
    }

    pub fn remove(&self, key: &str) {
        let qualified = self.qualify(key);
        if self.entries.remove(&qualified).is_none() {
            warn!(key = %qualified, "remove of absent cache key");
        }
    }

    /// Bare keys (without the `<prefix>.<section>.` namespace).
    pub fn keys(&self) -> Vec<String> {
        let ns = format!("{}.{}.", self.prefix, self.section);
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter_map(|e| e.key().strip_prefix(&ns).map(str::to_string))
            .collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&self.qualify(key))
    }

    pub fn describe(&self) -> Vec<CacheEntryInfo> {
        let ns = format!("{}.{}.", self.prefix, self.section);
        let mut infos: Vec<CacheEntryInfo> = self
            .entries
            .iter()
            .filter_map(|e| {
                let name = e.key().strip_prefix(&ns)?.to_string();
                Some(CacheEntryInfo {
                    name,
                    shape: e.shape,
                    is_empty: e.is_empty,
                    element_count: e.element_count,
                    created_at: e.created_at,
                })
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn describe_one(&self, key: &str) -> Option<CacheEntryInfo> {
        let qualified = self.qualify(key);
        self.entries.get(&qualified).map(|e| CacheEntryInfo {
            name: key.to_string(),
            shape: e.shape,
            is_empty: e.is_empty,
            element_count: e.element_count,
            created_at: e.created_at,
        })
    }

    /// Drops every entry in this store's section.
    pub fn clear(&self) {
        let ns = format!("{}.{}.", self.prefix, self.section);
        self.entries.retain(|k, _| !k.starts_with(&ns));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgscan_core::NoopCompressor;

    #[test]
    fn missing_key_is_distinct_from_null_value() {
        let store = CacheStore::new("orgscan", "test");
        assert!(store.get("absent").unwrap().is_none());

        store.set("k", &CacheValue::Null).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(CacheValue::Null));
    }

    #[test]
    fn overwrite_replaces_entry() {
        let store = CacheStore::new("orgscan", "test");
        store.set("k", &CacheValue::from("one")).unwrap();
        store.set("k", &CacheValue::from("two")).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(CacheValue::from("two")));
        assert_eq!(store.keys(), vec!["k".to_string()]);
    }

    #[test]
    fn describe_reports_shape_and_count() {
        let store = CacheStore::with_compressor("orgscan", "test", Arc::new(NoopCompressor));
        store
            .set(
                "seq",
                &CacheValue::from(vec![serde_json::Value::from("a")]),
            )
            .unwrap();
        let infos = store.describe();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name, "seq");
        assert_eq!(infos[0].shape, CacheShape::Sequence);
        assert_eq!(infos[0].element_count, 1);
        assert!(!infos[0].is_empty);
    }
}
