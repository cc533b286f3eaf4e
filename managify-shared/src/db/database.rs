/// Typed access to the document store
///
/// [`Database`] is the handle every service holds. It wraps any
/// [`DocumentStore`] backend, bounds each operation with a fixed deadline,
/// and hands out typed [`Collection`]s that convert between documents and
/// model structs with serde.
///
/// # Example
///
/// ```
/// use managify_shared::db::Database;
/// use managify_shared::db::document::Filter;
/// use managify_shared::models::{DocId, Project};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Database::memory();
/// let projects = db.collection::<Project>();
///
/// let owned = projects.count(&Filter::eq("owner_id", DocId::new())).await?;
/// assert_eq!(owned, 0);
/// # Ok(())
/// # }
/// ```

use super::document::{
    Document, DocumentStore, Filter, FindOneAndUpdateOptions, FindOptions, StoreError, Update,
    UpdateResult,
};
use super::memory::MemoryStore;
use crate::models::DocId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Default per-operation deadline
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// A struct persisted as a document in a fixed collection
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    /// Collection name
    const COLLECTION: &'static str;
}

/// Shared handle to the document store
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Wraps a backend with the default 5 second operation timeout
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_timeout(store, DEFAULT_OPERATION_TIMEOUT)
    }

    /// Wraps a backend with a custom operation timeout
    pub fn with_timeout(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Creates a database over a fresh in-memory store
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Per-operation timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Typed view of a model's collection
    pub fn collection<T: Model>(&self) -> Collection<T> {
        Collection {
            db: self.clone(),
            name: T::COLLECTION,
            _marker: PhantomData,
        }
    }

    /// Checks backend connectivity
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.run(self.store.ping()).await
    }

    /// Runs a store future under the operation deadline
    ///
    /// No retry happens on timeout; the caller sees `StoreError::Timeout`.
    async fn run<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

/// A typed model returned by [`Collection::find_one_and_update`]
#[derive(Debug, Clone)]
pub struct Found<T> {
    pub value: T,

    /// True when the upsert inserted the document
    pub created: bool,
}

/// Typed access to one collection
pub struct Collection<T> {
    db: Database,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            name: self.name,
            _marker: PhantomData,
        }
    }
}

fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!(
            "model serialized to non-object value: {}",
            other
        ))),
    }
}

fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

impl<T: Model> Collection<T> {
    /// Collection name
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<T>, StoreError> {
        let docs = self
            .db
            .run(self.db.store.find(self.name, filter, options))
            .await?;
        docs.into_iter().map(from_document).collect()
    }

    pub async fn find_all(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        self.find(filter, &FindOptions::default()).await
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        self.db
            .run(self.db.store.find_one(self.name, filter))
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn find_by_id(&self, id: DocId) -> Result<Option<T>, StoreError> {
        self.find_one(&Filter::id(id)).await
    }

    pub async fn insert_one(&self, value: &T) -> Result<(), StoreError> {
        let document = to_document(value)?;
        self.db
            .run(self.db.store.insert_one(self.name, document))
            .await?;
        Ok(())
    }

    pub async fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateResult, StoreError> {
        self.db
            .run(self.db.store.update_one(self.name, filter, update))
            .await
    }

    pub async fn update_many(
        &self,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        self.db
            .run(self.db.store.update_many(self.name, filter, update))
            .await
    }

    pub async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: &Update,
        options: FindOneAndUpdateOptions,
    ) -> Result<Option<Found<T>>, StoreError> {
        let found = self
            .db
            .run(
                self.db
                    .store
                    .find_one_and_update(self.name, filter, update, options),
            )
            .await?;

        found
            .map(|f| {
                Ok(Found {
                    value: from_document(f.document)?,
                    created: f.created,
                })
            })
            .transpose()
    }

    pub async fn delete_one(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.db
            .run(self.db.store.delete_one(self.name, filter))
            .await
    }

    pub async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.db
            .run(self.db.store.delete_many(self.name, filter))
            .await
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.db
            .run(self.db.store.count_documents(self.name, filter))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::db::document::FoundDocument;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: DocId,
        name: String,
        size: i64,
    }

    impl Model for Widget {
        const COLLECTION: &'static str = "widgets";
    }

    /// Backend whose every call hangs forever
    struct StalledStore;

    #[async_trait]
    impl DocumentStore for StalledStore {
        async fn find(&self, _: &str, _: &Filter, _: &FindOptions) -> Result<Vec<Document>, StoreError> {
            std::future::pending().await
        }
        async fn find_one(&self, _: &str, _: &Filter) -> Result<Option<Document>, StoreError> {
            std::future::pending().await
        }
        async fn insert_one(&self, _: &str, _: Document) -> Result<String, StoreError> {
            std::future::pending().await
        }
        async fn update_one(&self, _: &str, _: &Filter, _: &Update) -> Result<UpdateResult, StoreError> {
            std::future::pending().await
        }
        async fn update_many(&self, _: &str, _: &Filter, _: &Update) -> Result<UpdateResult, StoreError> {
            std::future::pending().await
        }
        async fn find_one_and_update(
            &self,
            _: &str,
            _: &Filter,
            _: &Update,
            _: FindOneAndUpdateOptions,
        ) -> Result<Option<FoundDocument>, StoreError> {
            std::future::pending().await
        }
        async fn delete_one(&self, _: &str, _: &Filter) -> Result<u64, StoreError> {
            std::future::pending().await
        }
        async fn delete_many(&self, _: &str, _: &Filter) -> Result<u64, StoreError> {
            std::future::pending().await
        }
        async fn count_documents(&self, _: &str, _: &Filter) -> Result<u64, StoreError> {
            std::future::pending().await
        }
        async fn ping(&self) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let db = Database::memory();
        let widgets = db.collection::<Widget>();
        let widget = Widget {
            id: DocId::new(),
            name: "gear".into(),
            size: 2,
        };

        widgets.insert_one(&widget).await.unwrap();
        assert_eq!(widgets.find_by_id(widget.id).await.unwrap(), Some(widget.clone()));
        assert_eq!(widgets.count(&Filter::eq("name", "gear")).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_time_out() {
        let db = Database::with_timeout(Arc::new(StalledStore), Duration::from_secs(5));
        let widgets = db.collection::<Widget>();

        let result = widgets.find_one(&Filter::All).await;
        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == Duration::from_secs(5)));
        assert!(matches!(db.ping().await, Err(StoreError::Timeout(_))));
    }

    #[test]
    fn test_to_document_rejects_scalars() {
        assert!(to_document(&42).is_err());
    }
}
