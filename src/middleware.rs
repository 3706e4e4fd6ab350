use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{clients::ClientHandle, error::AppError, AppState};

pub const CLIENT_COOKIE: &str = "todo_client";

/// The calling tab's root view, inserted by [`mw_client_session`].
#[derive(Clone)]
pub struct CurrentClient(pub ClientHandle);

pub async fn mw_client_session<B>(
    State(state): State<Arc<AppState>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let client_id = request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .find_map(client_id_from_cookie);

    let client = state.clients.resolve(client_id);
    request
        .extensions_mut()
        .insert(CurrentClient(client.root.clone()));

    let mut response = next.run(request).await;

    if client.created {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            CLIENT_COOKIE, client.id
        );
        let cookie =
            HeaderValue::from_str(&cookie).map_err(|err| AppError::Internal(err.to_string()))?;
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }

    Ok(response)
}

fn client_id_from_cookie(header: &str) -> Option<Uuid> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CLIENT_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}
