//! Task store client.
//!
//! Every operation runs on behalf of the user currently signed in through the
//! [`AuthGateway`]. Toggle and delete re-read the task before writing so that
//! an owner mismatch is reported as [`TaskError::Unauthorized`] instead of
//! being hidden by a query filter.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::{
    auth::AuthGateway,
    model::{Task, TaskRecord},
    store::{Direction, Document, DocumentStore, Filter, IndexDefinition, Query, StoreError},
};

pub const TASKS_COLLECTION: &str = "todos";

const OWNER_FIELD: &str = "userId";
const CREATED_FIELD: &str = "createdAt";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock at the millisecond precision `createdAt` is stored with.
///
/// Readings strictly increase, so tasks added within the same millisecond
/// still sort in creation order.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_millis: AtomicI64,
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_millis();
        let next = |last: i64| wall.max(last + 1);
        let millis = match self
            .last_millis
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(next(last)))
        {
            Ok(last) | Err(last) => next(last),
        };
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("User must be authenticated to manage todos")]
    Unauthenticated,

    #[error("Unauthorized to modify todo {0}")]
    Unauthorized(String),

    #[error("Todo not found: {0}")]
    NotFound(String),

    #[error("Todo title must not be empty")]
    EmptyTitle,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct TaskStore {
    documents: Arc<dyn DocumentStore>,
    auth: AuthGateway,
    clock: Arc<dyn Clock>,
}

impl TaskStore {
    pub fn new(documents: Arc<dyn DocumentStore>, auth: AuthGateway, clock: Arc<dyn Clock>) -> Self {
        Self {
            documents,
            auth,
            clock,
        }
    }

    /// Composite index backing the ordered listing query.
    pub fn required_index() -> IndexDefinition {
        IndexDefinition::new(
            TASKS_COLLECTION,
            &[
                (OWNER_FIELD, Direction::Ascending),
                (CREATED_FIELD, Direction::Descending),
            ],
        )
    }

    fn current_user_id(&self) -> Result<String, TaskError> {
        self.auth
            .current_user()
            .map(|session| session.user_id)
            .ok_or(TaskError::Unauthenticated)
    }

    /// Creates an open task owned by the current user and returns its id.
    pub async fn add(&self, title: &str) -> Result<String, TaskError> {
        let user_id = self.current_user_id()?;
        if title.trim().is_empty() {
            return Err(TaskError::EmptyTitle);
        }

        let record = TaskRecord {
            title: title.to_string(),
            completed: false,
            created_at: self.clock.now(),
            user_id,
        };
        let id = self
            .documents
            .create(TASKS_COLLECTION, to_document(&record)?)
            .await?;
        tracing::debug!(task_id = %id, "created todo");
        Ok(id)
    }

    /// All tasks of the current user, newest first.
    pub async fn list(&self) -> Result<Vec<Task>, TaskError> {
        let user_id = self.current_user_id()?;
        let owned = Query::collection(TASKS_COLLECTION).filter(Filter::eq(OWNER_FIELD, user_id));
        let ordered = owned
            .clone()
            .order_by(CREATED_FIELD, Direction::Descending);

        match self.documents.query(&ordered).await {
            Ok(docs) => docs
                .into_iter()
                .map(|doc| decode(doc.id, doc.data))
                .collect(),
            Err(StoreError::IndexRequired(index)) => {
                tracing::warn!(%index, "missing composite index, sorting todos in memory");
                let mut tasks = self
                    .documents
                    .query(&owned)
                    .await?
                    .into_iter()
                    .map(|doc| decode(doc.id, doc.data))
                    .collect::<Result<Vec<_>, _>>()?;
                tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(tasks)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn toggle(&self, id: &str, completed: bool) -> Result<(), TaskError> {
        self.owned_task(id).await?;

        let mut patch = Document::new();
        patch.insert("completed".to_string(), Value::Bool(completed));
        self.documents.update(TASKS_COLLECTION, id, patch).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), TaskError> {
        self.owned_task(id).await?;
        self.documents.delete(TASKS_COLLECTION, id).await?;
        Ok(())
    }

    async fn owned_task(&self, id: &str) -> Result<Task, TaskError> {
        let user_id = self.current_user_id()?;
        let doc = self
            .documents
            .query(&Query::collection(TASKS_COLLECTION).filter(Filter::document_id(id)))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;

        let task = decode(doc.id, doc.data)?;
        if task.user_id != user_id {
            tracing::warn!(task_id = %id, "todo owner mismatch");
            return Err(TaskError::Unauthorized(id.to_string()));
        }
        Ok(task)
    }
}

fn to_document(record: &TaskRecord) -> Result<Document, TaskError> {
    let value = serde_json::to_value(record).map_err(StoreError::from)?;
    Ok(serde_json::from_value(value).map_err(StoreError::from)?)
}

fn decode(id: String, data: Document) -> Result<Task, TaskError> {
    let record: TaskRecord =
        serde_json::from_value(Value::Object(data)).map_err(StoreError::from)?;
    Ok(record.into_task(id))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::MemoryAuthProvider;
    use crate::store::MemoryDocumentStore;
    use chrono::{Duration, TimeZone};
    use parking_lot::Mutex;

    /// Clock that advances one second per reading.
    pub(crate) struct SteppingClock(Mutex<DateTime<Utc>>);

    impl SteppingClock {
        pub(crate) fn new() -> Self {
            Self(Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()))
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut now = self.0.lock();
            *now += Duration::seconds(1);
            *now
        }
    }

    struct Fixture {
        documents: Arc<MemoryDocumentStore>,
        provider: Arc<MemoryAuthProvider>,
        clock: Arc<SteppingClock>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                documents: Arc::new(MemoryDocumentStore::new()),
                provider: Arc::new(MemoryAuthProvider::new()),
                clock: Arc::new(SteppingClock::new()),
            }
        }

        async fn store_for(&self, email: &str) -> TaskStore {
            let gateway = AuthGateway::new(self.provider.clone());
            gateway.register(email, "secret123", "user").await.unwrap();
            TaskStore::new(self.documents.clone(), gateway, self.clock.clone())
        }

        async fn with_index(self) -> Self {
            self.documents
                .provision_index(&TaskStore::required_index())
                .await
                .unwrap();
            self
        }
    }

    async fn system_clock_store(documents: Arc<MemoryDocumentStore>) -> TaskStore {
        let gateway = AuthGateway::new(Arc::new(MemoryAuthProvider::new()));
        gateway
            .register("ada@example.com", "secret123", "ada")
            .await
            .unwrap();
        TaskStore::new(documents, gateway, Arc::new(SystemClock::default()))
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let fixture = Fixture::new().with_index().await;
        let store = fixture.store_for("ada@example.com").await;
        store.add("A").await.unwrap();
        store.add("B").await.unwrap();

        let tasks = store.list().await.unwrap();
        assert_eq!(titles(&tasks), vec!["B", "A"]);
        assert!(tasks.iter().all(|t| !t.completed));
    }

    #[tokio::test]
    async fn list_falls_back_when_index_is_missing() {
        let fixture = Fixture::new();
        let store = fixture.store_for("ada@example.com").await;
        for title in ["first", "second", "third", "fourth"] {
            store.add(title).await.unwrap();
        }

        let tasks = store.list().await.unwrap();
        assert_eq!(titles(&tasks), vec!["fourth", "third", "second", "first"]);
    }

    #[test]
    fn system_clock_never_repeats_a_millisecond() {
        let clock = SystemClock::default();
        let readings: Vec<_> = (0..1_000).map(|_| clock.now()).collect();
        assert!(readings.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(readings
            .iter()
            .all(|at| at.timestamp_subsec_nanos() % 1_000_000 == 0));
    }

    #[tokio::test]
    async fn back_to_back_adds_keep_creation_order() {
        for _ in 0..100 {
            let documents = Arc::new(MemoryDocumentStore::new());
            documents
                .provision_index(&TaskStore::required_index())
                .await
                .unwrap();
            let store = system_clock_store(documents).await;
            store.add("A").await.unwrap();
            store.add("B").await.unwrap();
            assert_eq!(titles(&store.list().await.unwrap()), vec!["B", "A"]);
        }
    }

    #[tokio::test]
    async fn back_to_back_adds_keep_creation_order_without_index() {
        for _ in 0..100 {
            let store = system_clock_store(Arc::new(MemoryDocumentStore::new())).await;
            store.add("A").await.unwrap();
            store.add("B").await.unwrap();
            assert_eq!(titles(&store.list().await.unwrap()), vec!["B", "A"]);
        }
    }

    #[tokio::test]
    async fn list_only_shows_own_tasks() {
        let fixture = Fixture::new().with_index().await;
        let ada = fixture.store_for("ada@example.com").await;
        let bob = fixture.store_for("bob@example.com").await;
        ada.add("ada's").await.unwrap();
        bob.add("bob's").await.unwrap();

        assert_eq!(titles(&ada.list().await.unwrap()), vec!["ada's"]);
        assert_eq!(titles(&bob.list().await.unwrap()), vec!["bob's"]);
    }

    #[tokio::test]
    async fn toggle_changes_only_the_target() {
        let fixture = Fixture::new().with_index().await;
        let store = fixture.store_for("ada@example.com").await;
        let a = store.add("A").await.unwrap();
        store.add("B").await.unwrap();

        store.toggle(&a, true).await.unwrap();

        let tasks = store.list().await.unwrap();
        let completed: Vec<_> = tasks.iter().map(|t| (t.title.as_str(), t.completed)).collect();
        assert_eq!(completed, vec![("B", false), ("A", true)]);
    }

    #[tokio::test]
    async fn delete_removes_task() {
        let fixture = Fixture::new().with_index().await;
        let store = fixture.store_for("ada@example.com").await;
        let a = store.add("A").await.unwrap();
        store.add("B").await.unwrap();

        store.delete(&a).await.unwrap();

        let tasks = store.list().await.unwrap();
        assert_eq!(titles(&tasks), vec!["B"]);
        assert!(tasks.iter().all(|t| t.id != a));
    }

    #[tokio::test]
    async fn foreign_tasks_are_unauthorized() {
        let fixture = Fixture::new().with_index().await;
        let ada = fixture.store_for("ada@example.com").await;
        let bob = fixture.store_for("bob@example.com").await;
        let id = ada.add("A").await.unwrap();

        assert!(matches!(
            bob.toggle(&id, true).await,
            Err(TaskError::Unauthorized(_))
        ));
        assert!(matches!(
            bob.delete(&id).await,
            Err(TaskError::Unauthorized(_))
        ));

        let tasks = ada.list().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].completed);
        assert_eq!(fixture.documents.len(TASKS_COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn missing_tasks_are_not_found() {
        let fixture = Fixture::new();
        let store = fixture.store_for("ada@example.com").await;
        assert!(matches!(
            store.toggle("missing", true).await,
            Err(TaskError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("missing").await,
            Err(TaskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn signed_out_operations_fail() {
        let fixture = Fixture::new();
        let gateway = AuthGateway::new(fixture.provider.clone());
        let store = TaskStore::new(fixture.documents.clone(), gateway, fixture.clock.clone());

        assert!(matches!(store.add("A").await, Err(TaskError::Unauthenticated)));
        assert!(matches!(store.list().await, Err(TaskError::Unauthenticated)));
        assert!(matches!(
            store.delete("x").await,
            Err(TaskError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn empty_titles_are_rejected() {
        let fixture = Fixture::new();
        let store = fixture.store_for("ada@example.com").await;
        assert!(matches!(store.add("   ").await, Err(TaskError::EmptyTitle)));
        assert_eq!(fixture.documents.len(TASKS_COLLECTION).await, 0);
    }

    #[tokio::test]
    async fn stored_document_shape() {
        let fixture = Fixture::new();
        let store = fixture.store_for("ada@example.com").await;
        let id = store.add("Buy milk").await.unwrap();

        let doc = fixture.documents.get(TASKS_COLLECTION, &id).await.unwrap();
        assert_eq!(doc["title"], "Buy milk");
        assert_eq!(doc["completed"], false);
        assert!(doc["createdAt"].is_i64());
        assert!(doc["userId"].is_string());
    }
}
