//! Sled-backed persistent cache, one named partition per entity type.
//!
//! Records are serialized JSON keyed by entity id. The store is a
//! non-authoritative mirror of server state: every operation is fallible and
//! callers degrade to "cache unavailable" instead of failing the request.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// On-disk schema version. There is no migration path; a mismatch wipes
/// every partition at open.
const SCHEMA_VERSION: u32 = 1;

/// Key in the default tree holding the schema version marker.
const SCHEMA_KEY: &[u8] = b"schema-version";

/// Tree holding per-partition refresh timestamps.
const META_TREE: &str = "__meta";

/// Sled's reserved default tree, which must never be dropped.
const DEFAULT_TREE: &[u8] = b"__sled__default";

/// Consider cache stale after 1 hour.
/// Balances freshness with reducing unnecessary API calls for slowly-changing data.
const CACHE_STALE_MINUTES: i64 = 60;

/// An entity that can be mirrored into a named cache partition.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned {
    /// Stable identifier for this record (the server's `id`/`_id`).
    fn entity_id(&self) -> &str;

    /// Partition name for this entity type (e.g., "products", "orders").
    fn store_name() -> &'static str;
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(#[from] sled::Error),

    #[error("cache record malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Handle to the embedded cache database. Clone is cheap - sled shares the
/// underlying database via Arc.
#[derive(Clone)]
pub struct CacheStore {
    db: sled::Db,
    generations: Arc<Mutex<HashMap<&'static str, Arc<AtomicU64>>>>,
}

impl CacheStore {
    /// Open (creating on first use) the cache database at `path`.
    ///
    /// Rejects when the underlying storage cannot be opened (permissions,
    /// disk full, another process holding the lock); callers treat that as
    /// "cache unavailable", not fatal.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        Self::open_with_version(path, SCHEMA_VERSION)
    }

    /// Open an in-memory database that is discarded on drop. Used as the
    /// degraded mode when the on-disk cache cannot be opened.
    pub fn ephemeral() -> Result<Self, CacheError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db, SCHEMA_VERSION)
    }

    fn open_with_version(path: impl AsRef<Path>, version: u32) -> Result<Self, CacheError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Unavailable(sled::Error::Io(e)))?;
        }
        let db = sled::open(path)?;
        Self::with_db(db, version)
    }

    fn with_db(db: sled::Db, version: u32) -> Result<Self, CacheError> {
        let store = Self {
            db,
            generations: Arc::new(Mutex::new(HashMap::new())),
        };
        store.ensure_schema(version)?;
        Ok(store)
    }

    /// Verify the schema marker, wiping every partition on mismatch.
    /// Version 1, no migrations; the cache is a mirror, so a wipe loses
    /// nothing the next fetch cannot restore.
    fn ensure_schema(&self, version: u32) -> Result<(), CacheError> {
        let on_disk = self
            .db
            .get(SCHEMA_KEY)?
            .and_then(|v| String::from_utf8(v.to_vec()).ok())
            .and_then(|s| s.parse::<u32>().ok());

        match on_disk {
            Some(v) if v == version => Ok(()),
            Some(v) => {
                debug!(found = v, expected = version, "cache schema mismatch, wiping");
                for name in self.db.tree_names() {
                    if name.as_ref() == DEFAULT_TREE {
                        continue;
                    }
                    self.db.drop_tree(&name)?;
                }
                self.db.clear()?;
                self.write_version(version)
            }
            None => self.write_version(version),
        }
    }

    fn write_version(&self, version: u32) -> Result<(), CacheError> {
        self.db
            .insert(SCHEMA_KEY, version.to_string().as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    /// Open the named partition for an entity type, creating it lazily on
    /// first use.
    pub fn partition<T: Entity>(&self) -> Result<CachePartition<T>, CacheError> {
        let tree = self.db.open_tree(T::store_name())?;
        let meta = self.db.open_tree(META_TREE)?;
        let generation = {
            let mut generations = self
                .generations
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(
                generations
                    .entry(T::store_name())
                    .or_insert_with(|| Arc::new(AtomicU64::new(0))),
            )
        };
        Ok(CachePartition {
            tree,
            meta,
            generation,
            _entity: PhantomData,
        })
    }
}

/// One named partition, keyed by entity id. At most one record per id; a
/// `put` overwrites.
pub struct CachePartition<T> {
    tree: sled::Tree,
    meta: sled::Tree,
    generation: Arc<AtomicU64>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for CachePartition<T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            meta: self.meta.clone(),
            generation: Arc::clone(&self.generation),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> CachePartition<T> {
    /// Every record currently stored. Order is undefined.
    pub fn get_all(&self) -> Result<Vec<T>, CacheError> {
        let mut records = Vec::new();
        for item in self.tree.iter() {
            let (key, value) = item?;
            match serde_json::from_slice(&value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(
                        store = T::store_name(),
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "skipping malformed cache record"
                    );
                }
            }
        }
        Ok(records)
    }

    /// `get_all` filtered client-side. There is no indexed query support;
    /// this is an O(n) scan.
    pub fn get_filtered<P>(&self, predicate: P) -> Result<Vec<T>, CacheError>
    where
        P: Fn(&T) -> bool,
    {
        Ok(self.get_all()?.into_iter().filter(|r| predicate(r)).collect())
    }

    /// Single record by id, or None. A malformed stored record reads as a
    /// miss rather than an error.
    pub fn get(&self, id: &str) -> Result<Option<T>, CacheError> {
        let Some(value) = self.tree.get(id.as_bytes())? else {
            return Ok(None);
        };
        match serde_json::from_slice(&value) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                debug!(store = T::store_name(), id, error = %e, "malformed cache record treated as miss");
                Ok(None)
            }
        }
    }

    /// Insert-or-replace by id. No partial-update semantics; use `merge`
    /// to preserve unspecified fields.
    pub fn put(&self, record: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(record)?;
        self.tree.insert(record.entity_id().as_bytes(), bytes)?;
        self.bump();
        self.tree.flush()?;
        Ok(())
    }

    /// Insert-or-replace a batch; existing records with other ids are kept.
    pub fn put_all(&self, records: &[T]) -> Result<(), CacheError> {
        if records.is_empty() {
            return Ok(());
        }
        for record in records {
            let bytes = serde_json::to_vec(record)?;
            self.tree.insert(record.entity_id().as_bytes(), bytes)?;
        }
        self.bump();
        self.tree.flush()?;
        Ok(())
    }

    /// Make the partition mirror `records` exactly: absent ids are removed,
    /// present ones inserted or replaced.
    pub fn replace_all(&self, records: &[T]) -> Result<(), CacheError> {
        let keep: HashSet<&str> = records.iter().map(|r| r.entity_id()).collect();
        let mut stale_keys = Vec::new();
        for item in self.tree.iter() {
            let (key, _) = item?;
            if std::str::from_utf8(&key).map(|k| !keep.contains(k)).unwrap_or(true) {
                stale_keys.push(key);
            }
        }
        for key in stale_keys {
            self.tree.remove(key)?;
        }
        for record in records {
            let bytes = serde_json::to_vec(record)?;
            self.tree.insert(record.entity_id().as_bytes(), bytes)?;
        }
        self.bump();
        self.tree.flush()?;
        Ok(())
    }

    /// Read-modify-write: shallow-merge the fields of `patch` into the
    /// stored record, keeping unspecified fields. Returns the merged record,
    /// or None when nothing is stored under `id`.
    pub fn merge(&self, id: &str, patch: &Value) -> Result<Option<T>, CacheError> {
        let Some(raw) = self.tree.get(id.as_bytes())? else {
            return Ok(None);
        };
        let mut current: Value = match serde_json::from_slice(&raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(store = T::store_name(), id, error = %e, "malformed cache record treated as miss");
                return Ok(None);
            }
        };
        if let (Some(fields), Some(changes)) = (current.as_object_mut(), patch.as_object()) {
            for (key, value) in changes {
                fields.insert(key.clone(), value.clone());
            }
        }
        let merged: T = serde_json::from_value(current)?;
        self.tree
            .insert(id.as_bytes(), serde_json::to_vec(&merged)?)?;
        self.bump();
        self.tree.flush()?;
        Ok(Some(merged))
    }

    /// Remove a record. No-op (and no generation bump) when absent.
    pub fn delete(&self, id: &str) -> Result<(), CacheError> {
        if self.tree.remove(id.as_bytes())?.is_some() {
            self.bump();
            self.tree.flush()?;
        }
        Ok(())
    }

    /// Drop every record in the partition.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.tree.clear()?;
        self.meta.remove(T::store_name().as_bytes())?;
        self.bump();
        self.tree.flush()?;
        Ok(())
    }

    /// Write sequence token: bumped on every successful write, so a caller
    /// can detect that the partition changed while a fetch was in flight.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Record that the partition was just synchronized with the server.
    pub fn mark_refreshed(&self) -> Result<(), CacheError> {
        self.meta.insert(
            T::store_name().as_bytes(),
            Utc::now().to_rfc3339().as_bytes(),
        )?;
        self.meta.flush()?;
        Ok(())
    }

    /// When the partition last synchronized with the server, or None if it
    /// never has. Read errors degrade to None.
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        let raw = match self.meta.get(T::store_name().as_bytes()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!(store = T::store_name(), error = %e, "failed to read cache timestamp");
                return None;
            }
        };
        std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Whether the partition's last sync is older than the staleness window.
    /// Never synchronized counts as stale.
    pub fn is_stale(&self) -> bool {
        match self.cached_at() {
            Some(at) => (Utc::now() - at).num_minutes() > CACHE_STALE_MINUTES,
            None => true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Product;

    fn product(id: &str, name: &str, price: f64) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            category: "pain-relief".to_string(),
            price,
            stock: 5,
            image_url: None,
            seller_id: None,
            created_at: None,
        }
    }

    fn open_store() -> (tempfile::TempDir, CacheStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path().join("cache")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_is_idempotent_and_replaces() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();

        products.put(&product("p1", "Aspirin", 10.0)).unwrap();
        products.put(&product("p1", "Aspirin", 10.0)).unwrap();
        assert_eq!(products.get_all().unwrap().len(), 1);

        products.put(&product("p1", "Aspirin 500mg", 12.0)).unwrap();
        let all = products.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Aspirin 500mg");
        assert_eq!(all[0].price, 12.0);
    }

    #[test]
    fn test_get_filtered_scans_all_records() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();
        products.put(&product("p1", "Aspirin", 10.0)).unwrap();
        let mut other = product("p2", "Vitamin C", 8.0);
        other.category = "supplements".to_string();
        products.put(&other).unwrap();

        let matched = products
            .get_filtered(|p| p.category == "supplements")
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "p2");
    }

    #[test]
    fn test_delete_is_noop_when_absent() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();
        let before = products.generation();
        products.delete("missing").unwrap();
        assert_eq!(products.generation(), before);

        products.put(&product("p1", "Aspirin", 10.0)).unwrap();
        products.delete("p1").unwrap();
        assert!(products.get("p1").unwrap().is_none());
        assert!(products.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_merge_preserves_unspecified_fields() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();
        products.put(&product("p1", "Aspirin", 10.0)).unwrap();

        let merged = products
            .merge("p1", &serde_json::json!({"price": 15.0}))
            .unwrap()
            .unwrap();
        assert_eq!(merged.price, 15.0);
        assert_eq!(merged.name, "Aspirin");
        assert_eq!(merged.stock, 5);

        // Nothing stored under the id: merge reports None and writes nothing
        assert!(products
            .merge("missing", &serde_json::json!({"price": 1.0}))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_replace_all_drops_absent_ids() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();
        products.put(&product("p1", "Aspirin", 10.0)).unwrap();
        products.put(&product("p2", "Ibuprofen", 20.0)).unwrap();

        products
            .replace_all(&[product("p2", "Ibuprofen", 22.0), product("p3", "Cetirizine", 6.0)])
            .unwrap();

        let mut ids: Vec<String> = products
            .get_all()
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["p2", "p3"]);
        assert_eq!(products.get("p2").unwrap().unwrap().price, 22.0);
    }

    #[test]
    fn test_generation_bumps_on_writes_only() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();
        let g0 = products.generation();

        products.put(&product("p1", "Aspirin", 10.0)).unwrap();
        let g1 = products.generation();
        assert!(g1 > g0);

        products.get_all().unwrap();
        products.get("p1").unwrap();
        assert_eq!(products.generation(), g1);

        products.delete("p1").unwrap();
        assert!(products.generation() > g1);
    }

    #[test]
    fn test_schema_version_mismatch_wipes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache");
        {
            let store = CacheStore::open_with_version(&path, 1).unwrap();
            let products = store.partition::<Product>().unwrap();
            products.put(&product("p1", "Aspirin", 10.0)).unwrap();
        }
        let store = CacheStore::open_with_version(&path, 2).unwrap();
        let products = store.partition::<Product>().unwrap();
        assert!(products.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_refresh_metadata() {
        let (_dir, store) = open_store();
        let products = store.partition::<Product>().unwrap();
        assert!(products.cached_at().is_none());
        assert!(products.is_stale());

        products.mark_refreshed().unwrap();
        assert!(products.cached_at().is_some());
        assert!(!products.is_stale());

        products.clear().unwrap();
        assert!(products.cached_at().is_none());
    }
}
