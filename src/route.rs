use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::{handler::*, middleware::mw_client_session, AppState};

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let app = Router::new()
        .route("/", get(index))
        .route("/auth", post(submit_credentials))
        .route("/auth/mode", post(toggle_auth_mode))
        .route("/logout", post(logout))
        .route("/todos", post(create_todo))
        .route("/todos/:id/toggle", post(toggle_todo))
        .route("/todos/:id/delete", post(delete_todo))
        .route_layer(from_fn_with_state(app_state.clone(), mw_client_session))
        .route("/health", get(health_checker_handler))
        .with_state(app_state);
    app
}
