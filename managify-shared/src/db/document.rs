/// Document store abstraction
///
/// Managify persists every entity as a JSON document inside a named
/// collection. This module defines the storage contract shared by the
/// in-memory and PostgreSQL backends:
///
/// - [`Filter`]: the subset of query predicates the domain needs
/// - [`Update`]: field-level mutations applied atomically to one document
/// - [`DocumentStore`]: the async backend trait
///
/// Every document carries its identifier under the [`ID_FIELD`] key as a
/// 32-character hex string.
///
/// # Example
///
/// ```
/// use managify_shared::db::document::{Filter, Update};
/// use serde_json::json;
///
/// let filter = Filter::eq("owner_id", "5f0c6d2a9b8e4f7c8a1d2e3f4a5b6c7d")
///     .and(Filter::lt("project_size", 3));
/// let update = Update::new().inc("project_size", 1);
///
/// let mut doc = json!({ "owner_id": "5f0c6d2a9b8e4f7c8a1d2e3f4a5b6c7d", "project_size": 1 })
///     .as_object()
///     .cloned()
///     .unwrap();
///
/// assert!(filter.matches(&doc));
/// assert!(update.apply(&mut doc, false));
/// assert_eq!(doc["project_size"], json!(2));
/// ```

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::time::Duration;

/// Key under which every document stores its identifier
pub const ID_FIELD: &str = "id";

/// A stored document: a JSON object
pub type Document = Map<String, Value>;

/// Error type for document store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Operation exceeded the per-operation deadline
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// A document with the same id already exists in the collection
    #[error("Duplicate document id: {0}")]
    DuplicateId(String),

    /// Document could not be converted to or from its typed form
    #[error("Document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// PostgreSQL backend error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other backend failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Query predicate over a document's top-level fields
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document
    All,

    /// Field equals value
    Eq(String, Value),

    /// Field equals one of the values
    In(String, Vec<Value>),

    /// Numeric field is strictly less than the bound
    Lt(String, i64),

    /// Array field contains the value
    Contains(String, Value),

    /// All inner filters match
    And(Vec<Filter>),
}

impl Filter {
    /// Field equals value
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    /// Matches the document with the given id
    pub fn id(id: impl Into<Value>) -> Self {
        Filter::Eq(ID_FIELD.to_string(), id.into())
    }

    /// Field equals any of `values`
    pub fn is_in<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(
            field.to_string(),
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Numeric field is below `bound`
    pub fn lt(field: &str, bound: i64) -> Self {
        Filter::Lt(field.to_string(), bound)
    }

    /// Array field contains `value`
    pub fn contains(field: &str, value: impl Into<Value>) -> Self {
        Filter::Contains(field.to_string(), value.into())
    }

    /// Conjunction with another filter, flattening nested `And`s
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self {
            Filter::All => Vec::new(),
            Filter::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Filter::All => {}
            Filter::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        match parts.len() {
            0 => Filter::All,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    /// Evaluates the filter against a document
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::In(field, values) => doc.get(field).is_some_and(|v| values.contains(v)),
            Filter::Lt(field, bound) => doc
                .get(field)
                .and_then(Value::as_i64)
                .is_some_and(|v| v < *bound),
            Filter::Contains(field, value) => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
            Filter::And(parts) => parts.iter().all(|f| f.matches(doc)),
        }
    }

    /// Builds the initial body of a document created by an upsert
    ///
    /// Only plain equality predicates contribute fields; set membership,
    /// ranges and array predicates carry no single value to seed.
    pub fn seed_document(&self) -> Document {
        let mut doc = Document::new();
        self.seed_into(&mut doc);
        doc
    }

    fn seed_into(&self, doc: &mut Document) {
        match self {
            Filter::Eq(field, value) => {
                doc.insert(field.clone(), value.clone());
            }
            Filter::And(parts) => parts.iter().for_each(|f| f.seed_into(doc)),
            _ => {}
        }
    }
}

/// A single field mutation
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Overwrite field
    Set(String, Value),

    /// Add to an integer field, treating a missing field as zero
    Inc(String, i64),

    /// Append to an array field unless already present
    AddToSet(String, Value),

    /// Remove every occurrence of a value from an array field
    Pull(String, Value),

    /// Set field only when the update creates the document
    SetOnInsert(String, Value),
}

/// Ordered list of field mutations applied as one unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    /// Creates an empty update
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(field.to_string(), value.into()));
        self
    }

    pub fn inc(mut self, field: &str, by: i64) -> Self {
        self.ops.push(UpdateOp::Inc(field.to_string(), by));
        self
    }

    pub fn add_to_set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops
            .push(UpdateOp::AddToSet(field.to_string(), value.into()));
        self
    }

    pub fn pull(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Pull(field.to_string(), value.into()));
        self
    }

    pub fn set_on_insert(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops
            .push(UpdateOp::SetOnInsert(field.to_string(), value.into()));
        self
    }

    /// Operations in application order
    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    /// Applies the update in place
    ///
    /// `inserting` enables `SetOnInsert` operations. Returns whether any
    /// field actually changed.
    pub fn apply(&self, doc: &mut Document, inserting: bool) -> bool {
        let mut modified = false;

        for op in &self.ops {
            match op {
                UpdateOp::Set(field, value) => {
                    if doc.get(field) != Some(value) {
                        doc.insert(field.clone(), value.clone());
                        modified = true;
                    }
                }
                UpdateOp::Inc(field, by) => {
                    let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
                    doc.insert(field.clone(), Value::from(current + by));
                    modified |= *by != 0;
                }
                UpdateOp::AddToSet(field, value) => {
                    let slot = doc
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if !slot.is_array() {
                        *slot = Value::Array(Vec::new());
                    }
                    if let Value::Array(items) = slot {
                        if !items.contains(value) {
                            items.push(value.clone());
                            modified = true;
                        }
                    }
                }
                UpdateOp::Pull(field, value) => {
                    if let Some(Value::Array(items)) = doc.get_mut(field) {
                        let before = items.len();
                        items.retain(|item| item != value);
                        modified |= items.len() != before;
                    }
                }
                UpdateOp::SetOnInsert(field, value) => {
                    if inserting {
                        doc.insert(field.clone(), value.clone());
                        modified = true;
                    }
                }
            }
        }

        modified
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Options for [`DocumentStore::find`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Field and direction to sort by; insertion order when absent
    pub sort: Option<(String, SortOrder)>,

    /// Maximum number of documents returned
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn sort_by(mut self, field: &str, order: SortOrder) -> Self {
        self.sort = Some((field.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for [`DocumentStore::find_one_and_update`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOneAndUpdateOptions {
    /// Insert a document seeded from the filter when nothing matches
    pub upsert: bool,

    /// Return the document as it is after the update
    pub return_after: bool,
}

/// Outcome of a multi-document or conditional update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Documents matching the filter
    pub matched: u64,

    /// Documents whose body changed
    pub modified: u64,
}

/// Document returned by [`DocumentStore::find_one_and_update`]
#[derive(Debug, Clone, PartialEq)]
pub struct FoundDocument {
    pub document: Document,

    /// True when the upsert inserted a new document
    pub created: bool,
}

/// Orders two field values for sorting
///
/// Numbers compare numerically, strings lexicographically. Missing values
/// sort first.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

/// Storage backend for JSON documents
///
/// Single-document operations are atomic: a conditional update re-checks
/// its filter and applies its mutation as one step, so concurrent callers
/// never both observe the pre-update state.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns all documents matching `filter`
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    /// Returns the earliest-inserted document matching `filter`
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;

    /// Inserts a document; its [`ID_FIELD`] is assigned when missing
    ///
    /// Returns the document id.
    async fn insert_one(&self, collection: &str, document: Document)
        -> Result<String, StoreError>;

    /// Updates the earliest-inserted matching document
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError>;

    /// Updates every matching document
    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError>;

    /// Atomically finds and updates one document, optionally upserting
    ///
    /// Returns `None` when nothing matched and no upsert happened, or when
    /// an upsert created the document but `return_after` is false.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: FindOneAndUpdateOptions,
    ) -> Result<Option<FoundDocument>, StoreError>;

    /// Deletes the earliest-inserted matching document
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Deletes every matching document
    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Counts matching documents
    async fn count_documents(&self, collection: &str, filter: &Filter)
        -> Result<u64, StoreError>;

    /// Checks backend connectivity
    async fn ping(&self) -> Result<(), StoreError>;
}
