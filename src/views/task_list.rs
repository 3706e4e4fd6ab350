use super::{escape, TaskIntent, TaskItemView};
use crate::{
    model::Task,
    tasks::{TaskError, TaskStore},
};

/// The signed-in screen: add-task form, task rows and stats.
///
/// Every mutation is followed by a full reload from the store. Failed actions
/// leave a notice on screen and are also handed back to the caller.
pub struct TaskListView {
    store: TaskStore,
    tasks: Vec<Task>,
    notice: Option<String>,
    mounted: bool,
}

impl TaskListView {
    pub fn new(store: TaskStore) -> Self {
        Self {
            store,
            tasks: Vec::new(),
            notice: None,
            mounted: false,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Initial load. Stays unmounted on failure so the next render retries.
    pub async fn mount(&mut self) -> Result<(), TaskError> {
        self.reload().await?;
        self.mounted = true;
        self.notice = None;
        Ok(())
    }

    pub async fn reload(&mut self) -> Result<(), TaskError> {
        match self.store.list().await {
            Ok(tasks) => {
                self.tasks = tasks;
                Ok(())
            }
            Err(err) => {
                self.notice = Some(format!("Could not load tasks: {}", err));
                Err(err)
            }
        }
    }

    /// Adds a task from the form input. Blank input is ignored.
    pub async fn add(&mut self, input: &str) -> Result<(), TaskError> {
        let title = input.trim();
        if title.is_empty() {
            return Ok(());
        }
        self.notice = None;
        let result = self.store.add(title).await.map(|_| ());
        self.finish(result).await
    }

    pub async fn dispatch(&mut self, intent: TaskIntent) -> Result<(), TaskError> {
        self.notice = None;
        let result = match &intent {
            TaskIntent::Toggle { id, completed } => self.store.toggle(id, *completed).await,
            TaskIntent::Delete { id } => self.store.delete(id).await,
        };
        self.finish(result).await
    }

    async fn finish(&mut self, result: Result<(), TaskError>) -> Result<(), TaskError> {
        if let Err(err) = &result {
            self.notice = Some(err.to_string());
        }
        let reloaded = self.reload().await;
        result.and(reloaded)
    }

    pub fn render(&self) -> String {
        let items = if self.tasks.is_empty() {
            r#"<div class="empty-state">No tasks yet. Add one above to get started!</div>"#
                .to_string()
        } else {
            self.tasks
                .iter()
                .map(|task| TaskItemView::new(task).render())
                .collect::<Vec<_>>()
                .join("\n")
        };
        let notice = self
            .notice
            .as_deref()
            .map(|text| format!(r#"<div class="notice" role="alert">{}</div>"#, escape(text)))
            .unwrap_or_default();
        let completed = self.tasks.iter().filter(|t| t.completed).count();

        format!(
            r#"<div class="container">
  <h1>My Tasks</h1>
  <form class="todo-form" method="post" action="/todos">
    <input type="text" name="title" placeholder="What needs to be done?" required autofocus>
    <button type="submit" class="primary">Add Task</button>
  </form>
  {notice}
  <div class="todo-list">
{items}
  </div>
  <div class="stats">
    <span>{total} total tasks</span>
    <span>{completed} completed</span>
  </div>
</div>"#,
            total = self.tasks.len(),
        )
    }
}
