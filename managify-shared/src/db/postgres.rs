/// PostgreSQL document store
///
/// Stores every collection in a single JSONB table:
///
/// ```sql
/// documents(seq BIGSERIAL, collection TEXT, id TEXT, body JSONB, created_at TIMESTAMPTZ)
/// ```
///
/// Filters compile to SQL predicates over `body`. Conditional updates lock
/// the target row with `SELECT ... FOR UPDATE` inside a transaction, so a
/// concurrent writer blocks and then re-evaluates the filter against the
/// committed row. Upserts additionally take a transaction-scoped advisory
/// lock derived from the collection and filter, which serializes
/// insert-if-absent races on the same key.
///
/// # Example
///
/// ```no_run
/// use managify_shared::db::postgres::PgDocumentStore;
/// use managify_shared::db::document::{DocumentStore, Filter};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let store = PgDocumentStore::new(pool);
/// let count = store.count_documents("projects", &Filter::All).await?;
/// println!("{} projects", count);
/// # Ok(())
/// # }
/// ```

use super::document::{
    Document, DocumentStore, Filter, FindOneAndUpdateOptions, FindOptions, FoundDocument,
    SortOrder, StoreError, Update, UpdateResult, ID_FIELD,
};
use crate::models::DocId;
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::debug;

/// Document store backed by a PostgreSQL JSONB table
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Creates a store over an existing pool
    ///
    /// The `documents` table must exist; see
    /// [`run_migrations`](crate::db::migrations::run_migrations).
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Locks and returns matching rows inside `tx`
    async fn select_for_update(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        filter: &Filter,
        limit: Option<i64>,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let mut qb = select_builder(collection, filter);
        qb.push(" ORDER BY seq");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        qb.push(" FOR UPDATE");

        let rows = qb.build().fetch_all(&mut **tx).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn write_body(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
        body: &Document,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE documents SET body = $1 WHERE collection = $2 AND id = $3")
            .bind(Json(body))
            .bind(collection)
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn insert_body(
        executor: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
        body: &Document,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id) DO NOTHING",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(body))
        .execute(&mut **executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Derives a stable advisory lock key for an upsert target
fn advisory_lock_key(collection: &str, filter: &Filter) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(collection.as_bytes());
    hasher.update(format!("{:?}", filter).as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

fn select_builder<'a>(collection: &str, filter: &Filter) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("SELECT id, body FROM documents WHERE collection = ");
    qb.push_bind(collection.to_string());
    qb.push(" AND ");
    push_filter(&mut qb, filter);
    qb
}

/// Appends `filter` as a SQL boolean expression over `body`
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::All => {
            qb.push("TRUE");
        }
        Filter::Eq(field, value) => {
            qb.push("(body -> ")
                .push_bind(field.clone())
                .push(") = ")
                .push_bind(Json(value.clone()));
        }
        Filter::In(field, values) => {
            if values.is_empty() {
                qb.push("FALSE");
                return;
            }
            qb.push("(");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push("(body -> ")
                    .push_bind(field.clone())
                    .push(") = ")
                    .push_bind(Json(value.clone()));
            }
            qb.push(")");
        }
        Filter::Lt(field, bound) => {
            qb.push("(CASE WHEN jsonb_typeof(body -> ")
                .push_bind(field.clone())
                .push(") = 'number' THEN (body ->> ")
                .push_bind(field.clone())
                .push(")::numeric < ")
                .push_bind(*bound)
                .push(" ELSE FALSE END)");
        }
        Filter::Contains(field, value) => {
            qb.push("(COALESCE(body -> ")
                .push_bind(field.clone())
                .push(", '[]'::jsonb) @> ")
                .push_bind(Json(Value::Array(vec![value.clone()])))
                .push(")");
        }
        Filter::And(parts) => {
            if parts.is_empty() {
                qb.push("TRUE");
                return;
            }
            qb.push("(");
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    qb.push(" AND ");
                }
                push_filter(qb, part);
            }
            qb.push(")");
        }
    }
}

fn decode_row(row: &PgRow) -> Result<(String, Document), StoreError> {
    let id: String = row.try_get("id")?;
    let Json(body): Json<Document> = row.try_get("body")?;
    Ok((id, body))
}

fn ensure_id(document: &mut Document) -> String {
    match document.get(ID_FIELD).and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            let id = DocId::new().to_string();
            document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let mut qb = select_builder(collection, filter);

        qb.push(" ORDER BY ");
        if let Some((field, order)) = &options.sort {
            qb.push("body -> ").push_bind(field.clone());
            qb.push(match order {
                SortOrder::Ascending => " ASC NULLS FIRST, ",
                SortOrder::Descending => " DESC NULLS LAST, ",
            });
        }
        qb.push("seq");

        if let Some(limit) = options.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| decode_row(row).map(|(_, body)| body))
            .collect()
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let mut qb = select_builder(collection, filter);
        qb.push(" ORDER BY seq LIMIT 1");

        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref()
            .map(|row| decode_row(row).map(|(_, body)| body))
            .transpose()
    }

    async fn insert_one(
        &self,
        collection: &str,
        mut document: Document,
    ) -> Result<String, StoreError> {
        let id = ensure_id(&mut document);

        let result = sqlx::query(
            "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id) DO NOTHING",
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(&document))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateId(id));
        }

        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut rows = Self::select_for_update(&mut tx, collection, filter, Some(1)).await?;

        let Some((id, mut body)) = rows.pop() else {
            tx.commit().await?;
            return Ok(UpdateResult::default());
        };

        let modified = update.apply(&mut body, false);
        if modified {
            Self::write_body(&mut tx, collection, &id, &body).await?;
        }
        tx.commit().await?;

        Ok(UpdateResult {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        let rows = Self::select_for_update(&mut tx, collection, filter, None).await?;

        let mut result = UpdateResult::default();
        for (id, mut body) in rows {
            result.matched += 1;
            if update.apply(&mut body, false) {
                Self::write_body(&mut tx, collection, &id, &body).await?;
                result.modified += 1;
            }
        }
        tx.commit().await?;

        Ok(result)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: FindOneAndUpdateOptions,
    ) -> Result<Option<FoundDocument>, StoreError> {
        let mut tx = self.pool.begin().await?;

        if options.upsert {
            let key = advisory_lock_key(collection, filter);
            debug!(collection, lock_key = key, "Acquiring upsert lock");
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }

        let mut rows = Self::select_for_update(&mut tx, collection, filter, Some(1)).await?;

        if let Some((id, mut body)) = rows.pop() {
            let before = body.clone();
            if update.apply(&mut body, false) {
                Self::write_body(&mut tx, collection, &id, &body).await?;
            }
            tx.commit().await?;

            let document = if options.return_after { body } else { before };
            return Ok(Some(FoundDocument {
                document,
                created: false,
            }));
        }

        if !options.upsert {
            tx.commit().await?;
            return Ok(None);
        }

        let mut created = filter.seed_document();
        update.apply(&mut created, true);
        let id = ensure_id(&mut created);

        if !Self::insert_body(&mut tx, collection, &id, &created).await? {
            return Err(StoreError::DuplicateId(id));
        }
        tx.commit().await?;

        Ok(options.return_after.then_some(FoundDocument {
            document: created,
            created: true,
        }))
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "DELETE FROM documents WHERE collection = ",
        );
        qb.push_bind(collection.to_string());
        qb.push(" AND id = (SELECT id FROM documents WHERE collection = ");
        qb.push_bind(collection.to_string());
        qb.push(" AND ");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY seq LIMIT 1)");

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "DELETE FROM documents WHERE collection = ",
        );
        qb.push_bind(collection.to_string());
        qb.push(" AND ");
        push_filter(&mut qb, filter);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM documents WHERE collection = ",
        );
        qb.push_bind(collection.to_string());
        qb.push(" AND ");
        push_filter(&mut qb, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_lock_key_is_stable() {
        let filter = Filter::eq("project_id", "p").and(Filter::eq("receiver_id", "r"));
        assert_eq!(
            advisory_lock_key("project_invites", &filter),
            advisory_lock_key("project_invites", &filter.clone())
        );
        assert_ne!(
            advisory_lock_key("project_invites", &filter),
            advisory_lock_key("project_invites", &Filter::eq("project_id", "q"))
        );
    }

    #[test]
    fn test_push_filter_sql_shape() {
        let filter = Filter::eq("owner_id", "o")
            .and(Filter::lt("project_size", 3))
            .and(Filter::is_in("status", ["pending", "accepted"]));

        let qb = select_builder("users", &filter);
        let sql = qb.sql();

        assert!(sql.starts_with("SELECT id, body FROM documents WHERE collection = $1 AND ("));
        assert!(sql.contains("(body -> $2) = $3"));
        assert!(sql.contains("jsonb_typeof"));
        assert!(sql.contains(" OR "));
    }

    #[test]
    fn test_push_filter_empty_in_is_false() {
        let qb = select_builder("users", &Filter::In("status".into(), vec![]));
        assert!(qb.sql().ends_with("FALSE"));
    }

    #[test]
    fn test_ensure_id_keeps_existing() {
        let mut doc = Document::new();
        doc.insert(ID_FIELD.into(), Value::String("abc".into()));
        assert_eq!(ensure_id(&mut doc), "abc");

        let mut empty = Document::new();
        let id = ensure_id(&mut empty);
        assert_eq!(id.len(), 32);
        assert_eq!(empty[ID_FIELD], Value::String(id));
    }
}
