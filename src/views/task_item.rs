use super::escape;
use crate::model::Task;

/// What a task row asks its list to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskIntent {
    Toggle { id: String, completed: bool },
    Delete { id: String },
}

// One row of the task list
pub struct TaskItemView<'a> {
    task: &'a Task,
}

impl<'a> TaskItemView<'a> {
    pub fn new(task: &'a Task) -> Self {
        Self { task }
    }

    /// Intent emitted when the checkbox is flipped.
    pub fn toggle_intent(&self) -> TaskIntent {
        TaskIntent::Toggle {
            id: self.task.id.clone(),
            completed: !self.task.completed,
        }
    }

    pub fn delete_intent(&self) -> TaskIntent {
        TaskIntent::Delete {
            id: self.task.id.clone(),
        }
    }

    pub fn render(&self) -> String {
        let id = escape(&self.task.id);
        let completed = self.task.completed;
        let next_state = !completed;

        format!(
            r#"<div class="todo-item{item_class}">
  <form method="post" action="/todos/{id}/toggle">
    <input type="hidden" name="completed" value="{next_state}">
    <button type="submit" class="checkbox{checked}" title="{toggle_title}" aria-pressed="{completed}"></button>
  </form>
  <span class="todo-text">{title}</span>
  <form method="post" action="/todos/{id}/delete">
    <button type="submit" class="delete-btn" title="Delete task">&times;</button>
  </form>
</div>"#,
            item_class = if completed { " completed" } else { "" },
            checked = if completed { " checked" } else { "" },
            toggle_title = if completed {
                "Mark as not done"
            } else {
                "Mark as done"
            },
            title = escape(&self.task.title),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(completed: bool) -> Task {
        Task {
            id: "t1".to_string(),
            title: "<script>".to_string(),
            completed,
            created_at: Utc::now(),
            user_id: "u1".to_string(),
        }
    }

    #[test]
    fn toggle_intent_flips_state() {
        let open = task(false);
        assert_eq!(
            TaskItemView::new(&open).toggle_intent(),
            TaskIntent::Toggle {
                id: "t1".to_string(),
                completed: true
            }
        );
        let done = task(true);
        assert_eq!(
            TaskItemView::new(&done).delete_intent(),
            TaskIntent::Delete {
                id: "t1".to_string()
            }
        );
    }

    #[test]
    fn renders_escaped_title_and_actions() {
        let done = task(true);
        let html = TaskItemView::new(&done).render();
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains(r#"action="/todos/t1/toggle""#));
        assert!(html.contains(r#"name="completed" value="false""#));
        assert!(html.contains(r#"action="/todos/t1/delete""#));
        assert!(html.contains("todo-item completed"));
    }
}
