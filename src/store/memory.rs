use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    compare_values, new_document_id, Direction, Document, DocumentStore, IndexDefinition, Query,
    StoreError, StoredDocument,
};

/// In-process document store used by tests and `STORE_BACKEND=memory`.
///
/// Starts without composite indexes, so ordered multi-field queries fail with
/// [`StoreError::IndexRequired`] until [`DocumentStore::provision_index`] runs.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, HashMap<String, Document>>>,
    indexes: RwLock<HashSet<IndexDefinition>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, HashMap::len)
    }

    /// Raw document lookup that bypasses the query path.
    pub async fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, collection: &str, record: Document) -> Result<String, StoreError> {
        let id = new_document_id();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), record);
        Ok(id)
    }

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError> {
        if let Some(index) = query.required_index() {
            if !self.indexes.read().await.contains(&index) {
                return Err(StoreError::IndexRequired(index));
            }
        }

        let collections = self.collections.read().await;
        let mut docs: Vec<StoredDocument> = collections
            .get(&query.collection)
            .into_iter()
            .flatten()
            .filter(|(id, data)| query.filters.iter().all(|f| f.matches(id, data)))
            .map(|(id, data)| StoredDocument {
                id: id.clone(),
                data: data.clone(),
            })
            .collect();

        if let Some(order) = &query.order_by {
            docs.sort_by(|a, b| {
                let ordering = compare_values(a.data.get(&order.field), b.data.get(&order.field));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        Ok(docs)
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        doc.extend(patch);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        if let Some(docs) = self.collections.write().await.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn provision_index(&self, index: &IndexDefinition) -> Result<(), StoreError> {
        self.indexes.write().await.insert(index.clone());
        Ok(())
    }
}
