//! Document store contract.
//!
//! Records are schemaless JSON objects grouped in collections. Queries combine
//! equality filters with an optional single-field ordering. An ordered query
//! whose filters name a different field than the ordering needs a composite
//! index; until one is provisioned the store answers
//! [`StoreError::IndexRequired`].

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

mod memory;
mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// JSON object body of a stored document.
pub type Document = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldPath {
    /// The store-assigned document id.
    DocumentId,
    Field(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: FieldPath,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: FieldPath::Field(field.into()),
            value: value.into(),
        }
    }

    pub fn document_id(id: impl Into<String>) -> Self {
        Self {
            field: FieldPath::DocumentId,
            value: Value::String(id.into()),
        }
    }

    pub(crate) fn matches(&self, id: &str, data: &Document) -> bool {
        match &self.field {
            FieldPath::DocumentId => self.value.as_str() == Some(id),
            FieldPath::Field(name) => data.get(name) == Some(&self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn suffix(self) -> &'static str {
        match self {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Composite index this query needs, if any.
    pub fn required_index(&self) -> Option<IndexDefinition> {
        let order = self.order_by.as_ref()?;
        let mut fields: Vec<(String, Direction)> = self
            .filters
            .iter()
            .filter_map(|filter| match &filter.field {
                FieldPath::Field(name) if *name != order.field => {
                    Some((name.clone(), Direction::Ascending))
                }
                _ => None,
            })
            .collect();
        if fields.is_empty() {
            return None;
        }
        fields.dedup();
        fields.push((order.field.clone(), order.direction));
        Some(IndexDefinition {
            collection: self.collection.clone(),
            fields,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexDefinition {
    pub collection: String,
    pub fields: Vec<(String, Direction)>,
}

impl IndexDefinition {
    pub fn new(collection: impl Into<String>, fields: &[(&str, Direction)]) -> Self {
        Self {
            collection: collection.into(),
            fields: fields
                .iter()
                .map(|(name, direction)| (name.to_string(), *direction))
                .collect(),
        }
    }

    /// Stable identifier, e.g. `idx_todos_userId_asc_createdAt_desc`.
    pub fn name(&self) -> String {
        let mut name = format!("idx_{}", self.collection);
        for (field, direction) in &self.fields {
            name.push('_');
            name.push_str(field);
            name.push('_');
            name.push_str(direction.suffix());
        }
        name
    }
}

impl fmt::Display for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.collection)?;
        for (i, (field, direction)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", field, direction.suffix())?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("The query requires an index: provision {0}")]
    IndexRequired(IndexDefinition),

    #[error("No document to update: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("invalid field name `{0}`")]
    InvalidField(String),

    #[error("malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts `record` and returns the id the store assigned to it.
    async fn create(&self, collection: &str, record: Document) -> Result<String, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError>;

    /// Merges `patch` into an existing document.
    async fn update(&self, collection: &str, id: &str, patch: Document) -> Result<(), StoreError>;

    /// Removes a document. Deleting a missing id is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn provision_index(&self, index: &IndexDefinition) -> Result<(), StoreError>;
}

pub(crate) fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// Orders JSON scalars the way the document store sorts them: nulls, booleans,
// numbers, then strings.
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .unwrap_or_default()
                    .total_cmp(&y.as_f64().unwrap_or_default()),
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
