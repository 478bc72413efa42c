//! # Postgres Document Collection
//!
//! Every collection shares one `settle_documents` table (see
//! `migrations/`); a document is a JSONB `body` under
//! `(collection, doc_key)`. Indexes are Postgres expression indexes over
//! `body->>'field'`, partial on `collection` and, for unique indexes, on
//! every indexed field being non-null.
//!
//! `find_one_and_update` runs in one transaction that first takes
//! `pg_advisory_xact_lock` on the document key. The lock covers keys that
//! have no row yet, which `SELECT ... FOR UPDATE` cannot, so two concurrent
//! first-writes of the same key serialize.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::collection::{Document, DocumentCollection, Filter, IndexSpec, UpdateFn};
use crate::error::StoreError;

const PRIMARY_KEY: &str = "settle_documents_pkey";
const UNIQUE_VIOLATION: &str = "23505";

/// Connect to Postgres and apply the embedded migrations.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// A [`DocumentCollection`] backed by the `settle_documents` table.
#[derive(Debug)]
pub struct PgCollection<D> {
    pool: PgPool,
    _doc: PhantomData<fn() -> D>,
}

impl<D> Clone for PgCollection<D> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _doc: PhantomData,
        }
    }
}

impl<D: Document> PgCollection<D> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _doc: PhantomData,
        }
    }

    fn decode(key: &str, body: Value) -> Result<D, StoreError> {
        serde_json::from_value(body).map_err(|e| StoreError::Corrupt {
            collection: D::COLLECTION,
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn map_write_error(err: sqlx::Error, key: &str) -> StoreError {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db.constraint().unwrap_or_default();
                if constraint == PRIMARY_KEY {
                    return StoreError::DuplicateKey {
                        collection: D::COLLECTION,
                        key: key.to_string(),
                    };
                }
                return StoreError::UniqueViolation {
                    index: constraint.to_string(),
                };
            }
        }
        StoreError::Database(err)
    }
}

/// `CREATE INDEX` statement for `spec` within `collection`.
///
/// Field and index names are compile-time constants, never user input.
fn index_sql(collection: &str, spec: &IndexSpec) -> String {
    let columns: Vec<String> = spec
        .fields
        .iter()
        .map(|f| format!("(body->>'{f}')"))
        .collect();
    let mut predicate = format!("collection = '{collection}'");
    if spec.unique {
        for f in spec.fields {
            predicate.push_str(&format!(" AND (body->>'{f}') IS NOT NULL"));
        }
    }
    format!(
        "CREATE {unique}INDEX IF NOT EXISTS {name} ON settle_documents ({columns}) WHERE {predicate}",
        unique = if spec.unique { "UNIQUE " } else { "" },
        name = spec.name,
        columns = columns.join(", "),
    )
}

/// `SELECT` statement for `filter`; `$1` is the collection, `$2..` the values.
fn find_sql(filter: &Filter) -> String {
    let mut sql = String::from("SELECT doc_key, body FROM settle_documents WHERE collection = $1");
    for (i, (field, _)) in filter.conditions.iter().enumerate() {
        sql.push_str(&format!(" AND body->>'{field}' = ${}", i + 2));
    }
    sql
}

#[async_trait]
impl<D: Document> DocumentCollection<D> for PgCollection<D> {
    async fn create_index(&self, spec: &IndexSpec) -> Result<(), StoreError> {
        let sql = index_sql(D::COLLECTION, spec);
        sqlx::query(&sql).execute(&self.pool).await?;
        tracing::debug!(collection = D::COLLECTION, index = spec.name, "index ensured");
        Ok(())
    }

    async fn insert_one(&self, doc: &D) -> Result<(), StoreError> {
        let key = doc.key();
        let body = serde_json::to_value(doc)?;
        sqlx::query("INSERT INTO settle_documents (collection, doc_key, body) VALUES ($1, $2, $3)")
            .bind(D::COLLECTION)
            .bind(&key)
            .bind(&body)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(e, &key))?;
        Ok(())
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<D>, StoreError> {
        let sql = find_sql(filter);
        let mut query = sqlx::query_as::<_, (String, Value)>(&sql).bind(D::COLLECTION);
        for (_, value) in &filter.conditions {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(key, body)| Self::decode(&key, body))
            .collect()
    }

    async fn find_one(&self, key: &str) -> Result<Option<D>, StoreError> {
        let row: Option<(Value,)> = sqlx::query_as(
            "SELECT body FROM settle_documents WHERE collection = $1 AND doc_key = $2",
        )
        .bind(D::COLLECTION)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(body,)| Self::decode(key, body)).transpose()
    }

    async fn find_one_and_update<'a>(
        &self,
        key: &str,
        update: UpdateFn<'a, D>,
    ) -> Result<D, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("{}:{key}", D::COLLECTION))
            .execute(&mut *tx)
            .await?;

        let row: Option<(Value,)> = sqlx::query_as(
            "SELECT body FROM settle_documents WHERE collection = $1 AND doc_key = $2",
        )
        .bind(D::COLLECTION)
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?;
        let current = row.map(|(body,)| Self::decode(key, body)).transpose()?;

        // Dropping `tx` on error rolls back and releases the lock.
        let next = update(current.as_ref())?;
        let body = serde_json::to_value(&next)?;

        sqlx::query(
            "INSERT INTO settle_documents (collection, doc_key, body) VALUES ($1, $2, $3)
             ON CONFLICT (collection, doc_key)
             DO UPDATE SET body = EXCLUDED.body, updated_at = now()",
        )
        .bind(D::COLLECTION)
        .bind(key)
        .bind(&body)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::map_write_error(e, key))?;

        tx.commit().await?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_index_is_partial_on_presence() {
        let spec = IndexSpec::unique("m_hash", &["orderId", "exportManifestHash"]);
        let sql = index_sql("export_manifests", &spec);
        assert_eq!(
            sql,
            "CREATE UNIQUE INDEX IF NOT EXISTS m_hash ON settle_documents \
             ((body->>'orderId'), (body->>'exportManifestHash')) \
             WHERE collection = 'export_manifests' \
             AND (body->>'orderId') IS NOT NULL \
             AND (body->>'exportManifestHash') IS NOT NULL"
        );
    }

    #[test]
    fn lookup_index_has_no_presence_predicate() {
        let spec = IndexSpec::lookup("m_order", &["orderId"]);
        let sql = index_sql("export_manifests", &spec);
        assert!(sql.starts_with("CREATE INDEX IF NOT EXISTS m_order"));
        assert!(!sql.contains("IS NOT NULL"));
    }

    #[test]
    fn find_sql_numbers_parameters_after_collection() {
        let filter = Filter::eq("orderId", "ORD-1").and("status", "FINAL");
        assert_eq!(
            find_sql(&filter),
            "SELECT doc_key, body FROM settle_documents WHERE collection = $1 \
             AND body->>'orderId' = $2 AND body->>'status' = $3"
        );
    }
}
