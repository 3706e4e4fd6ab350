use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use tower::ServiceExt;

use axum_tasks_web_app::{
    auth::MemoryAuthProvider, route::create_router, store::MemoryDocumentStore,
    tasks::SystemClock, AppState, Backend,
};

fn app() -> Router {
    let backend = Backend {
        auth: Arc::new(MemoryAuthProvider::new()),
        documents: Arc::new(MemoryDocumentStore::new()),
        clock: Arc::new(SystemClock::default()),
    };
    create_router(Arc::new(AppState::new(backend, Duration::from_secs(3600))))
}

async fn get(app: &Router, cookie: Option<&str>) -> Response {
    let mut request = Request::builder().method("GET").uri("/");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post(app: &Router, uri: &str, cookie: Option<&str>, form: &str) -> Response {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::from(form.to_string())).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn client_cookie(response: &Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("new client gets a cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn page(app: &Router, cookie: &str) -> String {
    let response = get(app, Some(cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_text(response).await
}

fn assert_redirect_home(response: &Response) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
}

fn first_todo_id(html: &str) -> String {
    let start = html.find(r#"action="/todos/"#).expect("a todo row") + r#"action="/todos/"#.len();
    let rest = &html[start..];
    rest[..rest.find('/').unwrap()].to_string()
}

async fn signed_up(app: &Router) -> String {
    let cookie = client_cookie(&get(app, None).await);
    assert_redirect_home(&post(app, "/auth/mode", Some(&cookie), "").await);
    let response = post(
        app,
        "/auth",
        Some(&cookie),
        "email=ada%40example.com&password=secret123&username=ada",
    )
    .await;
    assert_redirect_home(&response);
    cookie
}

#[tokio::test]
async fn health_check_needs_no_client() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert!(body_text(response).await.contains("success"));
}

#[tokio::test]
async fn first_visit_shows_login_and_sets_cookie() {
    let app = app();
    let response = get(&app, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("todo_client="));
    assert!(cookie.contains("HttpOnly"));

    let html = body_text(response).await;
    assert!(html.contains("Sign In"));
    assert!(!html.contains("signOutBtn"));
}

#[tokio::test]
async fn full_task_lifecycle() {
    let app = app();
    let cookie = signed_up(&app).await;

    let html = page(&app, &cookie).await;
    assert!(html.contains("My Tasks"));
    assert!(html.contains(">ada<"));
    assert!(html.contains("No tasks yet"));

    assert_redirect_home(&post(&app, "/todos", Some(&cookie), "title=Buy+milk").await);
    let html = page(&app, &cookie).await;
    assert!(html.contains("Buy milk"));
    assert!(html.contains("1 total tasks"));
    assert!(html.contains("0 completed"));

    let id = first_todo_id(&html);
    let response = post(
        &app,
        &format!("/todos/{}/toggle", id),
        Some(&cookie),
        "completed=true",
    )
    .await;
    assert_redirect_home(&response);
    assert!(page(&app, &cookie).await.contains("1 completed"));

    let response = post(&app, &format!("/todos/{}/delete", id), Some(&cookie), "").await;
    assert_redirect_home(&response);
    let html = page(&app, &cookie).await;
    assert!(!html.contains("Buy milk"));
    assert!(html.contains("0 total tasks"));

    assert_redirect_home(&post(&app, "/logout", Some(&cookie), "").await);
    let html = page(&app, &cookie).await;
    assert!(html.contains("Sign In"));
    assert!(!html.contains("signOutBtn"));
}

#[tokio::test]
async fn task_actions_without_session_are_rejected() {
    let app = app();
    let response = post(&app, "/todos", None, "title=Sneaky").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let cookie = client_cookie(&get(&app, None).await);
    let response = post(&app, "/todos/abc/delete", Some(&cookie), "").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tabs_keep_separate_sessions() {
    let app = app();
    let signed_in = signed_up(&app).await;
    let other = client_cookie(&get(&app, None).await);

    assert!(page(&app, &signed_in).await.contains("My Tasks"));
    assert!(page(&app, &other).await.contains("Sign In"));
}

#[tokio::test]
async fn other_users_cannot_touch_a_todo() {
    let app = app();
    let ada = signed_up(&app).await;
    post(&app, "/todos", Some(&ada), "title=Private").await;
    let id = first_todo_id(&page(&app, &ada).await);

    let bob = client_cookie(&get(&app, None).await);
    post(&app, "/auth/mode", Some(&bob), "").await;
    post(
        &app,
        "/auth",
        Some(&bob),
        "email=bob%40example.com&password=secret123&username=bob",
    )
    .await;

    let response = post(&app, &format!("/todos/{}/delete", id), Some(&bob), "").await;
    assert_redirect_home(&response);
    assert!(page(&app, &bob).await.contains("Unauthorized"));
    assert!(page(&app, &ada).await.contains("Private"));
}

#[tokio::test]
async fn failed_sign_ins_are_reported_then_throttled() {
    let app = app();
    let cookie = signed_up(&app).await;
    post(&app, "/logout", Some(&cookie), "").await;

    let wrong = "email=ada%40example.com&password=nope123";
    post(&app, "/auth", Some(&cookie), wrong).await;
    assert!(page(&app, &cookie)
        .await
        .contains("Incorrect password. 2 attempts remaining."));

    post(&app, "/auth", Some(&cookie), wrong).await;
    post(&app, "/auth", Some(&cookie), wrong).await;

    let right = "email=ada%40example.com&password=secret123";
    post(&app, "/auth", Some(&cookie), right).await;
    let html = page(&app, &cookie).await;
    assert!(html.contains("Too many attempts"));
    assert!(html.contains("Sign In"));
}

#[tokio::test]
async fn unknown_email_suggests_sign_up() {
    let app = app();
    let cookie = client_cookie(&get(&app, None).await);
    post(
        &app,
        "/auth",
        Some(&cookie),
        "email=nobody%40example.com&password=secret123",
    )
    .await;
    assert!(page(&app, &cookie)
        .await
        .contains("No account found with this email"));
}
