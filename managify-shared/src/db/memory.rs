/// In-process document store
///
/// Keeps every collection as an insertion-ordered vector behind a single
/// async `RwLock`. Mutations hold the write lock for their whole
/// read-check-write sequence, which gives the same single-document
/// atomicity as the PostgreSQL backend.
///
/// Used for tests and for running the API without a database.
///
/// # Example
///
/// ```
/// use managify_shared::db::document::{DocumentStore, Filter};
/// use managify_shared::db::memory::MemoryStore;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let doc = json!({ "name": "Website" }).as_object().cloned().unwrap();
/// let id = store.insert_one("projects", doc).await?;
///
/// let found = store.find_one("projects", &Filter::id(id.as_str())).await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

use super::document::{
    compare_values, Document, DocumentStore, Filter, FindOneAndUpdateOptions, FindOptions,
    FoundDocument, SortOrder, StoreError, Update, UpdateResult, ID_FIELD,
};
use crate::models::DocId;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Document store backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let mut found: Vec<Document> = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default();

        if let Some((field, order)) = &options.sort {
            // Stable sort keeps insertion order between equal keys
            found.sort_by(|a, b| {
                let ordering = compare_values(a.get(field), b.get(field));
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = options.limit {
            found.truncate(limit);
        }

        Ok(found)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)))
            .cloned())
    }

    async fn insert_one(
        &self,
        collection: &str,
        mut document: Document,
    ) -> Result<String, StoreError> {
        let id = match document_id(&document) {
            Some(id) => id.to_string(),
            None => {
                let id = DocId::new().to_string();
                document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        if docs.iter().any(|d| document_id(d) == Some(id.as_str())) {
            return Err(StoreError::DuplicateId(id));
        }

        docs.push(document);
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| filter.matches(d)))
        else {
            return Ok(UpdateResult::default());
        };

        let modified = update.apply(doc, false);
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
        let mut collections = self.collections.write().await;
        let mut result = UpdateResult::default();

        if let Some(docs) = collections.get_mut(collection) {
            for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
                result.matched += 1;
                if update.apply(doc, false) {
                    result.modified += 1;
                }
            }
        }

        Ok(result)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: FindOneAndUpdateOptions,
    ) -> Result<Option<FoundDocument>, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        if let Some(doc) = docs.iter_mut().find(|d| filter.matches(d)) {
            let before = doc.clone();
            update.apply(doc, false);
            let document = if options.return_after { doc.clone() } else { before };
            return Ok(Some(FoundDocument {
                document,
                created: false,
            }));
        }

        if !options.upsert {
            return Ok(None);
        }

        let mut created = filter.seed_document();
        update.apply(&mut created, true);
        if document_id(&created).is_none() {
            created.insert(
                ID_FIELD.to_string(),
                Value::String(DocId::new().to_string()),
            );
        }
        docs.push(created.clone());

        Ok(options.return_after.then_some(FoundDocument {
            document: created,
            created: true,
        }))
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        match docs.iter().position(|d| filter.matches(d)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let store = MemoryStore::new();
        let id = store.insert_one("users", doc(json!({ "email": "a@x.com" }))).await.unwrap();

        assert_eq!(id.len(), 32);
        let found = store.find_one("users", &Filter::id(id.as_str())).await.unwrap().unwrap();
        assert_eq!(found["email"], json!("a@x.com"));
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_rejected() {
        let store = MemoryStore::new();
        store.insert_one("users", doc(json!({ "id": "abc" }))).await.unwrap();
        let result = store.insert_one("users", doc(json!({ "id": "abc" }))).await;
        assert!(matches!(result, Err(StoreError::DuplicateId(id)) if id == "abc"));
    }

    #[tokio::test]
    async fn test_find_sort_and_limit() {
        let store = MemoryStore::new();
        for n in [3, 1, 2] {
            store.insert_one("logs", doc(json!({ "n": n }))).await.unwrap();
        }

        let options = FindOptions::default()
            .sort_by("n", SortOrder::Descending)
            .limit(2);
        let found = store.find("logs", &Filter::All, &options).await.unwrap();

        let values: Vec<i64> = found.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(values, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_conditional_update_rechecks_filter() {
        let store = MemoryStore::new();
        let id = store
            .insert_one("users", doc(json!({ "project_size": 2 })))
            .await
            .unwrap();

        let filter = Filter::id(id.as_str()).and(Filter::lt("project_size", 3));
        let update = Update::new().inc("project_size", 1);

        assert_eq!(store.update_one("users", &filter, &update).await.unwrap().matched, 1);
        assert_eq!(store.update_one("users", &filter, &update).await.unwrap().matched, 0);

        let user = store.find_one("users", &Filter::id(id.as_str())).await.unwrap().unwrap();
        assert_eq!(user["project_size"], json!(3));
    }

    #[tokio::test]
    async fn test_concurrent_conditional_increments_respect_cap() {
        let store = MemoryStore::new();
        let id = store
            .insert_one("users", doc(json!({ "project_size": 0 })))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                let filter = Filter::id(id.as_str()).and(Filter::lt("project_size", 3));
                store
                    .update_one("users", &filter, &Update::new().inc("project_size", 1))
                    .await
                    .unwrap()
                    .matched
            }));
        }

        let mut granted = 0;
        for handle in handles {
            granted += handle.await.unwrap();
        }

        assert_eq!(granted, 3);
    }

    #[tokio::test]
    async fn test_upsert_creates_once() {
        let store = MemoryStore::new();
        let filter = Filter::eq("project_id", "p").and(Filter::eq("receiver_id", "r"));
        let update = Update::new().set_on_insert("status", "pending");
        let options = FindOneAndUpdateOptions {
            upsert: true,
            return_after: true,
        };

        let first = store
            .find_one_and_update("invites", &filter, &update, options)
            .await
            .unwrap()
            .unwrap();
        let second = store
            .find_one_and_update("invites", &filter, &update, options)
            .await
            .unwrap()
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.document["id"], second.document["id"]);
        assert_eq!(store.count_documents("invites", &filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_one_and_update_without_upsert() {
        let store = MemoryStore::new();
        let result = store
            .find_one_and_update(
                "invites",
                &Filter::id("missing"),
                &Update::new().set("status", "accepted"),
                FindOneAndUpdateOptions::default(),
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_many_and_delete_many() {
        let store = MemoryStore::new();
        for team in [json!(["m"]), json!(["m", "x"]), json!(["x"])] {
            store.insert_one("projects", doc(json!({ "owner_id": "o", "team": team }))).await.unwrap();
        }

        let result = store
            .update_many(
                "projects",
                &Filter::eq("owner_id", "o").and(Filter::contains("team", "m")),
                &Update::new().pull("team", "m"),
            )
            .await
            .unwrap();
        assert_eq!(result, UpdateResult { matched: 2, modified: 2 });

        let deleted = store.delete_many("projects", &Filter::eq("owner_id", "o")).await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(store.count_documents("projects", &Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_one_missing_collection() {
        let store = MemoryStore::new();
        assert_eq!(store.delete_one("nothing", &Filter::All).await.unwrap(), 0);
    }
}
