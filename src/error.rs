use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};

use crate::views::page;

/// Errors that escape a handler and become an HTTP error response.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Sign in to manage your tasks")]
    Unauthenticated,

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthenticated => {
                let body = page(&format!(
                    r#"<div class="container">
  <p>{}.</p>
  <a href="/">Back to sign in</a>
</div>"#,
                    AppError::Unauthenticated
                ));
                (StatusCode::UNAUTHORIZED, Html(body)).into_response()
            }
            AppError::Internal(message) => {
                tracing::error!(error = %message, "request failed");
                let error_response = serde_json::json!({
                    "status": "error",
                    "message": "An internal error occurred",
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_is_401() {
        let response = AppError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn internal_is_500() {
        let response = AppError::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
