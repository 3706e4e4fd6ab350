use axum::{
    extract::Path,
    response::{Html, IntoResponse, Redirect},
    Extension, Form, Json,
};

use crate::{
    error::AppError,
    middleware::CurrentClient,
    schema::{CreateTodoSchema, CredentialsSchema, ToggleTodoSchema},
    tasks::TaskError,
    views::{SubmitOutcome, TaskIntent},
};

// Handler for the health checker route
pub async fn health_checker_handler() -> impl IntoResponse {
    const MESSAGE: &str = "Todo app with Rust, Axum, SQLX and Cognito";

    let json_response = serde_json::json!({
        "status": "success",
        "message": MESSAGE
    });

    Json(json_response)
}

// Renders whichever screen the tab is on
pub async fn index(Extension(CurrentClient(client)): Extension<CurrentClient>) -> Html<String> {
    let mut root = client.lock().await;
    Html(root.render().await)
}

pub async fn submit_credentials(
    Extension(CurrentClient(client)): Extension<CurrentClient>,
    Form(body): Form<CredentialsSchema>,
) -> Redirect {
    let mut root = client.lock().await;
    let outcome = root
        .submit_credentials(&body.email, &body.password, body.username.as_deref())
        .await;

    match outcome {
        SubmitOutcome::Success(session) => {
            tracing::debug!(user_id = %session.user_id, "credentials accepted");
        }
        SubmitOutcome::Rejected => {
            tracing::debug!("credentials rejected");
        }
        SubmitOutcome::Throttled { retry_in } => {
            tracing::warn!(retry_in_secs = retry_in.as_secs(), "sign-in throttled");
        }
    }

    Redirect::to("/")
}

pub async fn toggle_auth_mode(
    Extension(CurrentClient(client)): Extension<CurrentClient>,
) -> Redirect {
    client.lock().await.toggle_auth_mode();
    Redirect::to("/")
}

pub async fn logout(Extension(CurrentClient(client)): Extension<CurrentClient>) -> Redirect {
    client.lock().await.sign_out().await;
    Redirect::to("/")
}

pub async fn create_todo(
    Extension(CurrentClient(client)): Extension<CurrentClient>,
    Form(body): Form<CreateTodoSchema>,
) -> Result<Redirect, AppError> {
    let result = client.lock().await.add_task(&body.title).await;
    settle(result)
}

pub async fn toggle_todo(
    Path(id): Path<String>,
    Extension(CurrentClient(client)): Extension<CurrentClient>,
    Form(body): Form<ToggleTodoSchema>,
) -> Result<Redirect, AppError> {
    let intent = TaskIntent::Toggle {
        id,
        completed: body.completed,
    };
    let result = client.lock().await.dispatch(intent).await;
    settle(result)
}

pub async fn delete_todo(
    Path(id): Path<String>,
    Extension(CurrentClient(client)): Extension<CurrentClient>,
) -> Result<Redirect, AppError> {
    let result = client.lock().await.dispatch(TaskIntent::Delete { id }).await;
    settle(result)
}

// The task list already shows a notice for failed actions, so only a missing
// session becomes an error response.
fn settle(result: Result<(), TaskError>) -> Result<Redirect, AppError> {
    match result {
        Ok(()) => Ok(Redirect::to("/")),
        Err(TaskError::Unauthenticated) => Err(AppError::Unauthenticated),
        Err(err) => {
            tracing::warn!(error = %err, "todo action failed");
            Ok(Redirect::to("/"))
        }
    }
}
