use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Pool, QueryBuilder, Sqlite,
};

use super::{
    new_document_id, Direction, Document, DocumentStore, FieldPath, IndexDefinition, Query,
    StoreError, StoredDocument,
};

// Row shape of the `documents` table
#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    data: String,
}

/// Document store kept in a single SQLite table, one JSON body per row.
///
/// Composite indexes are SQLite expression indexes over `json_extract`, and
/// their presence in `sqlite_master` decides whether an ordered multi-field
/// query is allowed.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: Pool<Sqlite>,
}

impl SqliteDocumentStore {
    /// Opens (creating if needed) the database at `url` and prepares the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            tracing::info!(url, "creating database");
            Sqlite::create_database(url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        tracing::info!(url, "connected to the database");

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self, StoreError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );"#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    async fn has_index(&self, index: &IndexDefinition) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?",
        )
        .bind(index.name())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

// Field names are spliced into SQL text, so only plain identifiers pass.
fn checked_name(name: &str) -> Result<&str, StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(StoreError::InvalidField(name.to_string()))
    }
}

fn json_extract(field: &str) -> Result<String, StoreError> {
    Ok(format!("json_extract(data, '$.{}')", checked_name(field)?))
}

fn push_equals(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => {
            builder.push(" IS NULL");
        }
        Value::Bool(flag) => {
            builder.push(" = ");
            builder.push_bind(i64::from(*flag));
        }
        Value::Number(number) => {
            builder.push(" = ");
            match number.as_i64() {
                Some(int) => builder.push_bind(int),
                None => builder.push_bind(number.as_f64().unwrap_or_default()),
            };
        }
        Value::String(text) => {
            builder.push(" = ");
            builder.push_bind(text.clone());
        }
        Value::Array(_) | Value::Object(_) => {
            builder.push(" = json(");
            builder.push_bind(value.to_string());
            builder.push(")");
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(&self, collection: &str, record: Document) -> Result<String, StoreError> {
        let id = new_document_id();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(&id)
            .bind(serde_json::to_string(&record)?)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError> {
        if let Some(index) = query.required_index() {
            if !self.has_index(&index).await? {
                return Err(StoreError::IndexRequired(index));
            }
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, data FROM documents WHERE collection = ");
        builder.push_bind(query.collection.clone());

        for filter in &query.filters {
            match &filter.field {
                FieldPath::DocumentId => {
                    builder.push(" AND id = ");
                    builder.push_bind(filter.value.as_str().unwrap_or_default().to_string());
                }
                FieldPath::Field(name) => {
                    builder.push(" AND ");
                    builder.push(json_extract(name)?);
                    push_equals(&mut builder, &filter.value);
                }
            }
        }

        if let Some(order) = &query.order_by {
            builder.push(" ORDER BY ");
            builder.push(json_extract(&order.field)?);
            builder.push(match order.direction {
                Direction::Ascending => " ASC",
                Direction::Descending => " DESC",
            });
        }

        tracing::debug!(sql = builder.sql(), "document query");

        let rows = builder
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StoredDocument {
                    id: row.id,
                    data: serde_json::from_str(&row.data)?,
                })
            })
            .collect()
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> Result<(), StoreError> {
        let rows_affected = sqlx::query(
            "UPDATE documents SET data = json_patch(data, ?) WHERE collection = ? AND id = ?",
        )
        .bind(serde_json::to_string(&patch)?)
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn provision_index(&self, index: &IndexDefinition) -> Result<(), StoreError> {
        checked_name(&index.collection)?;
        let mut columns = vec!["collection".to_string()];
        for (field, direction) in &index.fields {
            let mut column = json_extract(field)?;
            if *direction == Direction::Descending {
                column.push_str(" DESC");
            }
            columns.push(column);
        }

        let ddl = format!(
            "CREATE INDEX IF NOT EXISTS {} ON documents ({})",
            index.name(),
            columns.join(", ")
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        tracing::info!(index = %index, "provisioned composite index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Filter;
    use serde_json::json;

    async fn store() -> SqliteDocumentStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteDocumentStore::from_pool(pool).await.unwrap()
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn ordered_query_waits_for_index() {
        let store = store().await;
        for (user, at) in [("u1", 100), ("u2", 200), ("u1", 300)] {
            store
                .create(
                    "todos",
                    doc(json!({"userId": user, "createdAt": at, "completed": false})),
                )
                .await
                .unwrap();
        }

        let query = Query::collection("todos")
            .filter(Filter::eq("userId", "u1"))
            .order_by("createdAt", Direction::Descending);
        assert!(matches!(
            store.query(&query).await,
            Err(StoreError::IndexRequired(_))
        ));

        store
            .provision_index(&query.required_index().unwrap())
            .await
            .unwrap();
        let docs = store.query(&query).await.unwrap();
        let stamps: Vec<_> = docs.iter().map(|d| d.data["createdAt"].clone()).collect();
        assert_eq!(stamps, vec![json!(300), json!(100)]);
    }

    #[tokio::test]
    async fn filters_on_booleans_and_ids() {
        let store = store().await;
        let done = store
            .create("todos", doc(json!({"completed": true})))
            .await
            .unwrap();
        store
            .create("todos", doc(json!({"completed": false})))
            .await
            .unwrap();

        let completed = store
            .query(&Query::collection("todos").filter(Filter::eq("completed", true)))
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, done);

        let by_id = store
            .query(&Query::collection("todos").filter(Filter::document_id(done.clone())))
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);
    }

    #[tokio::test]
    async fn update_patches_and_delete_removes() {
        let store = store().await;
        let id = store
            .create("todos", doc(json!({"title": "a", "completed": false})))
            .await
            .unwrap();

        store
            .update("todos", &id, doc(json!({"completed": true})))
            .await
            .unwrap();
        let docs = store
            .query(&Query::collection("todos").filter(Filter::document_id(id.clone())))
            .await
            .unwrap();
        assert_eq!(docs[0].data["completed"], json!(true));
        assert_eq!(docs[0].data["title"], json!("a"));

        store.delete("todos", &id).await.unwrap();
        assert!(matches!(
            store.update("todos", &id, doc(json!({"completed": false}))).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_unsafe_field_names() {
        let store = store().await;
        let query = Query::collection("todos").filter(Filter::eq("x') OR 1=1 --", "y"));
        assert!(matches!(
            store.query(&query).await,
            Err(StoreError::InvalidField(_))
        ));
    }
}
