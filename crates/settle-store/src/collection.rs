//! # Document Collection Abstraction
//!
//! Evidence stores never talk to a database directly. They hold a
//! [`DocumentCollection`], which offers four operations:
//!
//! - `create_index` — idempotent index creation
//! - `insert_one` — insert, failing on an existing key
//! - `find` — equality filter over top-level fields
//! - `find_one_and_update` — read, check and write one key as a single
//!   atomic step
//!
//! `find_one_and_update` is what makes write-once guards hold under
//! concurrency: the caller's closure sees the current document and builds
//! the next one while the implementation excludes every other writer for
//! that key. Two concurrent first-writes therefore cannot both observe an
//! empty field.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

/// A record type that can live in a [`DocumentCollection`].
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name. Also used as a namespace in shared tables.
    const COLLECTION: &'static str;

    /// The logical key of this document within its collection.
    fn key(&self) -> String;
}

/// Declarative index over top-level document fields.
///
/// A unique index only constrains documents in which every listed field is
/// present and non-null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub fields: &'static [&'static str],
    pub unique: bool,
}

impl IndexSpec {
    pub const fn lookup(name: &'static str, fields: &'static [&'static str]) -> Self {
        Self {
            name,
            fields,
            unique: false,
        }
    }

    pub const fn unique(name: &'static str, fields: &'static [&'static str]) -> Self {
        Self {
            name,
            fields,
            unique: true,
        }
    }

    /// The values this index sees for `doc`, or `None` if any is missing.
    pub(crate) fn values_of(&self, doc: &Value) -> Option<Vec<String>> {
        self.fields.iter().map(|f| field_text(doc, f)).collect()
    }
}

/// Equality filter over top-level fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub(crate) conditions: Vec<(&'static str, String)>,
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Into<String>) -> Self {
        Self::default().and(field, value)
    }

    pub fn and(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.conditions.push((field, value.into()));
        self
    }

    /// Whether a serialized document satisfies every condition.
    pub(crate) fn matches(&self, doc: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, want)| field_text(doc, field).as_deref() == Some(want.as_str()))
    }
}

/// Text form of a top-level field, matching Postgres `body->>'field'`.
pub(crate) fn field_text(doc: &Value, field: &str) -> Option<String> {
    match doc.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Check-and-build step run atomically by [`DocumentCollection::find_one_and_update`].
///
/// Receives the current document for the key (if any) and returns the
/// document to store, or an error that aborts the write.
pub type UpdateFn<'a, D> = Box<dyn FnOnce(Option<&D>) -> Result<D, StoreError> + Send + 'a>;

/// A keyed document collection with an atomic conditional update.
#[async_trait]
pub trait DocumentCollection<D: Document>: Send + Sync {
    /// Create an index if it does not already exist.
    async fn create_index(&self, spec: &IndexSpec) -> Result<(), StoreError>;

    /// Insert a new document.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateKey`] if a document with the same key exists;
    /// [`StoreError::UniqueViolation`] if a unique index rejects it.
    async fn insert_one(&self, doc: &D) -> Result<(), StoreError>;

    /// All documents matching `filter`, in no particular order.
    async fn find(&self, filter: &Filter) -> Result<Vec<D>, StoreError>;

    /// Fetch a single document by key.
    async fn find_one(&self, key: &str) -> Result<Option<D>, StoreError>;

    /// Atomically load the document at `key`, pass it to `update`, and store
    /// whatever `update` returns. If `update` fails, nothing is written.
    async fn find_one_and_update<'a>(
        &self,
        key: &str,
        update: UpdateFn<'a, D>,
    ) -> Result<D, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_text_matches_json_text_extraction() {
        let doc = json!({"orderId": "ORD-1", "settlementVersion": 2, "hash": null, "flag": true});
        assert_eq!(field_text(&doc, "orderId").as_deref(), Some("ORD-1"));
        assert_eq!(field_text(&doc, "settlementVersion").as_deref(), Some("2"));
        assert_eq!(field_text(&doc, "flag").as_deref(), Some("true"));
        assert_eq!(field_text(&doc, "hash"), None);
        assert_eq!(field_text(&doc, "missing"), None);
    }

    #[test]
    fn filter_requires_every_condition() {
        let doc = json!({"orderId": "ORD-1", "status": "FINAL"});
        assert!(Filter::eq("orderId", "ORD-1").matches(&doc));
        assert!(Filter::eq("orderId", "ORD-1").and("status", "FINAL").matches(&doc));
        assert!(!Filter::eq("orderId", "ORD-1").and("status", "DRAFT").matches(&doc));
        assert!(Filter::default().matches(&doc));
    }

    #[test]
    fn index_values_skip_sparse_documents() {
        const IDX: IndexSpec = IndexSpec::unique("u", &["orderId", "hash"]);
        assert_eq!(
            IDX.values_of(&json!({"orderId": "a", "hash": "h"})),
            Some(vec!["a".to_string(), "h".to_string()])
        );
        assert_eq!(IDX.values_of(&json!({"orderId": "a"})), None);
    }
}
