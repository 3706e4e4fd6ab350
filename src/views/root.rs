use tokio::sync::mpsc;

use super::{escape, page, LoginView, SubmitOutcome, TaskIntent, TaskListView};
use crate::{
    auth::{AuthGateway, AuthSubscription},
    model::Session,
    tasks::{TaskError, TaskStore},
    Backend,
};

enum Screen {
    SignedOut(LoginView),
    SignedIn {
        session: Session,
        tasks: TaskListView,
    },
}

/// Top-level view of one browser tab.
///
/// Subscribes to the tab's auth state once, at construction. Every transition
/// replaces the whole screen: a fresh login form after sign-out, a fresh task
/// list (mounted on the next render) after sign-in.
pub struct RootView {
    gateway: AuthGateway,
    backend: Backend,
    screen: Screen,
    transitions: mpsc::UnboundedReceiver<Option<Session>>,
    subscription: Option<AuthSubscription>,
}

impl RootView {
    pub fn new(backend: Backend) -> Self {
        let gateway = AuthGateway::new(backend.auth.clone());
        let (tx, transitions) = mpsc::unbounded_channel();
        let subscription = gateway.subscribe(move |session| {
            let _ = tx.send(session.cloned());
        });

        Self {
            screen: Screen::SignedOut(LoginView::new(gateway.clone())),
            gateway,
            backend,
            transitions,
            subscription: Some(subscription),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.screen {
            Screen::SignedIn { session, .. } => Some(session),
            Screen::SignedOut(_) => None,
        }
    }

    fn apply_transitions(&mut self) {
        while let Ok(next) = self.transitions.try_recv() {
            let unchanged = match (&self.screen, &next) {
                (Screen::SignedOut(_), None) => true,
                (Screen::SignedIn { session, .. }, Some(next)) => session.user_id == next.user_id,
                _ => false,
            };
            if unchanged {
                continue;
            }

            self.screen = match next {
                Some(session) => {
                    let store = TaskStore::new(
                        self.backend.documents.clone(),
                        self.gateway.clone(),
                        self.backend.clock.clone(),
                    );
                    Screen::SignedIn {
                        session,
                        tasks: TaskListView::new(store),
                    }
                }
                None => Screen::SignedOut(LoginView::new(self.gateway.clone())),
            };
        }
    }

    pub async fn render(&mut self) -> String {
        self.apply_transitions();

        let body = match &mut self.screen {
            Screen::SignedOut(login) => login.render(),
            Screen::SignedIn { session, tasks } => {
                if !tasks.is_mounted() {
                    if let Err(err) = tasks.mount().await {
                        tracing::warn!(error = %err, "initial task load failed");
                    }
                }
                format!(
                    r#"<div class="header">
  <div class="user-info">{}</div>
  <form method="post" action="/logout">
    <button type="submit" class="sign-out-btn" id="signOutBtn">Sign Out</button>
  </form>
</div>
{}"#,
                    escape(session.label()),
                    tasks.render()
                )
            }
        };
        page(&body)
    }

    pub async fn submit_credentials(
        &mut self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> SubmitOutcome {
        self.apply_transitions();
        let outcome = match &mut self.screen {
            Screen::SignedOut(login) => login.submit(email, password, username).await,
            Screen::SignedIn { session, .. } => SubmitOutcome::Success(session.clone()),
        };
        self.apply_transitions();
        outcome
    }

    pub fn toggle_auth_mode(&mut self) {
        self.apply_transitions();
        if let Screen::SignedOut(login) = &mut self.screen {
            login.toggle_mode();
        }
    }

    pub async fn add_task(&mut self, title: &str) -> Result<(), TaskError> {
        self.task_list()?.add(title).await
    }

    pub async fn dispatch(&mut self, intent: TaskIntent) -> Result<(), TaskError> {
        self.task_list()?.dispatch(intent).await
    }

    /// Signs out; the subscription brings the login screen back.
    pub async fn sign_out(&mut self) {
        self.gateway.sign_out().await;
        self.apply_transitions();
    }

    fn task_list(&mut self) -> Result<&mut TaskListView, TaskError> {
        self.apply_transitions();
        match &mut self.screen {
            Screen::SignedIn { tasks, .. } => Ok(tasks),
            Screen::SignedOut(_) => Err(TaskError::Unauthenticated),
        }
    }
}

impl Drop for RootView {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}
