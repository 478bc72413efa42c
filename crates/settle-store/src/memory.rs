//! In-memory [`DocumentCollection`].
//!
//! Used by tests, by the CLI's offline verification, and by the API when no
//! database is configured. All operations are synchronous under a
//! `parking_lot::RwLock`; the lock is never held across an `.await`.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::collection::{Document, DocumentCollection, Filter, IndexSpec, UpdateFn};
use crate::error::StoreError;

/// One declared index: index values → document keys, plus the reverse map
/// so a replaced document can be unindexed without re-reading it.
#[derive(Debug)]
struct Index {
    spec: IndexSpec,
    entries: HashMap<Vec<String>, BTreeSet<String>>,
    by_key: HashMap<String, Vec<String>>,
}

impl Index {
    fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            entries: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    fn add(&mut self, key: &str, doc: &Value) {
        if let Some(values) = self.spec.values_of(doc) {
            self.entries
                .entry(values.clone())
                .or_default()
                .insert(key.to_string());
            self.by_key.insert(key.to_string(), values);
        }
    }

    fn remove(&mut self, key: &str) {
        let Some(values) = self.by_key.remove(key) else {
            return;
        };
        if let Some(keys) = self.entries.get_mut(&values) {
            keys.remove(key);
            if keys.is_empty() {
                self.entries.remove(&values);
            }
        }
    }

    /// Whether a unique index already holds `doc`'s values under another key.
    fn rejects(&self, key: &str, doc: &Value) -> bool {
        self.spec.unique
            && self
                .spec
                .values_of(doc)
                .and_then(|values| self.entries.get(&values))
                .is_some_and(|keys| keys.iter().any(|k| k != key))
    }

    /// Index values for `filter`, if it constrains every indexed field.
    fn probe(&self, filter: &Filter) -> Option<Vec<String>> {
        self.spec
            .fields
            .iter()
            .map(|field| {
                filter
                    .conditions
                    .iter()
                    .find(|(f, _)| f == field)
                    .map(|(_, v)| v.clone())
            })
            .collect()
    }
}

#[derive(Debug)]
struct Inner<D> {
    docs: HashMap<String, D>,
    indexes: Vec<Index>,
}

impl<D: Document> Inner<D> {
    /// Store `doc` under `key`, refreshing every index. With `enforce`,
    /// unique indexes are checked first and nothing changes on a conflict.
    fn put(&mut self, key: String, doc: D, enforce: bool) -> Result<(), StoreError> {
        if !self.indexes.is_empty() {
            let value = serde_json::to_value(&doc)?;
            if enforce {
                if let Some(index) = self.indexes.iter().find(|i| i.rejects(&key, &value)) {
                    return Err(StoreError::UniqueViolation {
                        index: index.spec.name.to_string(),
                    });
                }
            }
            for index in &mut self.indexes {
                index.remove(&key);
                index.add(&key, &value);
            }
        }
        self.docs.insert(key, doc);
        Ok(())
    }
}

/// Thread-safe, cloneable in-memory collection.
///
/// Declared indexes are maintained as secondary maps, so lookups by an
/// indexed field and unique checks do not scan the collection.
#[derive(Debug)]
pub struct MemoryCollection<D: Document> {
    inner: Arc<RwLock<Inner<D>>>,
    index_calls: Arc<AtomicUsize>,
}

impl<D: Document> Clone for MemoryCollection<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            index_calls: Arc::clone(&self.index_calls),
        }
    }
}

impl<D: Document> Default for MemoryCollection<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> MemoryCollection<D> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                docs: HashMap::new(),
                indexes: Vec::new(),
            })),
            index_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.inner.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times `create_index` has been called.
    pub fn index_creations(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    /// Replace a document without unique checks.
    ///
    /// Only for seeding fixtures, e.g. loading an offline evidence bundle.
    pub fn seed(&self, doc: D) {
        let key = doc.key();
        if let Err(error) = self.inner.write().put(key, doc, false) {
            tracing::warn!(collection = D::COLLECTION, %error, "seeded document not indexed");
        }
    }

    fn create_index_sync(&self, spec: &IndexSpec) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.indexes.iter().any(|i| i.spec.name == spec.name) {
            return Ok(());
        }
        let mut index = Index::new(*spec);
        for (key, doc) in &inner.docs {
            index.add(key, &serde_json::to_value(doc)?);
        }
        inner.indexes.push(index);
        Ok(())
    }

    fn insert_sync(&self, doc: &D) -> Result<(), StoreError> {
        let key = doc.key();
        let mut inner = self.inner.write();
        if inner.docs.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                collection: D::COLLECTION,
                key,
            });
        }
        inner.put(key, doc.clone(), true)
    }

    fn find_sync(&self, filter: &Filter) -> Result<Vec<D>, StoreError> {
        let inner = self.inner.read();
        let indexed = inner
            .indexes
            .iter()
            .find_map(|i| i.probe(filter).map(|values| i.entries.get(&values)));
        let candidates: Vec<&D> = match indexed {
            Some(keys) => keys
                .into_iter()
                .flatten()
                .filter_map(|k| inner.docs.get(k))
                .collect(),
            None => inner.docs.values().collect(),
        };
        let mut out = Vec::new();
        for doc in candidates {
            if filter.matches(&serde_json::to_value(doc)?) {
                out.push(doc.clone());
            }
        }
        Ok(out)
    }

    fn update_sync(&self, key: &str, update: UpdateFn<'_, D>) -> Result<D, StoreError> {
        let mut inner = self.inner.write();
        let next = update(inner.docs.get(key))?;
        inner.put(key.to_string(), next.clone(), true)?;
        Ok(next)
    }
}

#[async_trait]
impl<D: Document> DocumentCollection<D> for MemoryCollection<D> {
    async fn create_index(&self, spec: &IndexSpec) -> Result<(), StoreError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        self.create_index_sync(spec)
    }

    async fn insert_one(&self, doc: &D) -> Result<(), StoreError> {
        self.insert_sync(doc)
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<D>, StoreError> {
        self.find_sync(filter)
    }

    async fn find_one(&self, key: &str) -> Result<Option<D>, StoreError> {
        Ok(self.inner.read().docs.get(key).cloned())
    }

    async fn find_one_and_update<'a>(
        &self,
        key: &str,
        update: UpdateFn<'a, D>,
    ) -> Result<D, StoreError> {
        self.update_sync(key, update)
    }
}
