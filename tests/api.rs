use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use taskgate::{
    api::{self, AppState},
    auth::{Principal, Role, TokenCodec},
    store::MemoryStore,
};
use tower::ServiceExt;

const SECRET: &str = "integration-secret-integration-secret";

struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

fn codec() -> Arc<TokenCodec> {
    Arc::new(TokenCodec::new(
        &SecretString::from(SECRET.to_string()),
        Duration::minutes(60),
    ))
}

fn app() -> Result<Router> {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), store, codec());
    api::app(state, &[])
}

async fn send(app: &Router, request: Request<Body>) -> Result<Response> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    Ok(Response {
        status,
        headers,
        body,
    })
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };
    Ok(request)
}

async fn register(app: &Router, username: &str, password: &str, role: &str) -> Result<Response> {
    let body = json!({ "username": username, "password": password, "role": role });
    send(app, request(Method::POST, "/register", None, Some(body))?).await
}

async fn login(app: &Router, username: &str, password: &str) -> Result<Response> {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={username}&password={password}")))?;
    send(app, request).await
}

/// Register and log in, returning the bearer token.
async fn token_for(app: &Router, username: &str, role: &str) -> Result<String> {
    let response = register(app, username, "password123", role).await?;
    assert_eq!(response.status, StatusCode::CREATED);

    let response = login(app, username, "password123").await?;
    assert_eq!(response.status, StatusCode::OK);
    Ok(response.body["access_token"]
        .as_str()
        .unwrap_or_default()
        .to_string())
}

async fn create_task(app: &Router, token: &str, name: &str) -> Result<i64> {
    let response = send(
        app,
        request(Method::POST, "/tasks", Some(token), Some(json!({ "name": name })))?,
    )
    .await?;
    assert_eq!(response.status, StatusCode::CREATED);
    Ok(response.body["id"].as_i64().unwrap_or_default())
}

fn detail(response: &Response) -> String {
    response.body["detail"].as_str().unwrap_or_default().to_lowercase()
}

#[tokio::test]
async fn root_and_health() -> Result<()> {
    let app = app()?;

    let response = send(&app, request(Method::GET, "/", None, None)?).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "message": "Welcome" }));

    let response = send(&app, request(Method::GET, "/health", None, None)?).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["database"], "ok");
    assert_eq!(response.body["name"], "taskgate");
    assert!(response.headers.contains_key("x-app"));

    let response = send(&app, request(Method::OPTIONS, "/health", None, None)?).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, Value::Null);
    Ok(())
}

#[tokio::test]
async fn request_id_is_generated_and_propagated() -> Result<()> {
    let app = app()?;

    let response = send(&app, request(Method::GET, "/", None, None)?).await?;
    assert!(response.headers.contains_key("x-request-id"));

    let request = Request::builder()
        .uri("/")
        .header("x-request-id", "req-123")
        .body(Body::empty())?;
    let response = send(&app, request).await?;
    assert_eq!(
        response.headers.get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-123")
    );
    Ok(())
}

#[tokio::test]
async fn register_returns_user_without_password() -> Result<()> {
    let app = app()?;

    let response = register(&app, "newuser", "password123", "user").await?;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["username"], "newuser");
    assert_eq!(response.body["role"], "user");
    assert!(response.body["id"].is_i64());
    assert!(response.body.get("password").is_none());
    assert!(response.body.get("password_hash").is_none());

    let body = json!({ "username": "defaultrole", "password": "password123" });
    let response = send(&app, request(Method::POST, "/register", None, Some(body))?).await?;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["role"], "user");
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_is_rejected() -> Result<()> {
    let app = app()?;

    register(&app, "alice", "password123", "user").await?;
    let response = register(&app, "alice", "otherpass", "admin").await?;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(detail(&response).contains("already registered"));
    Ok(())
}

#[tokio::test]
async fn registration_validation() -> Result<()> {
    let app = app()?;

    for (username, password, role) in [
        ("ab", "password123", "user"),
        ("bad name", "password123", "user"),
        ("valid_name", "12345", "user"),
        ("valid_name", "password123", "root"),
    ] {
        let response = register(&app, username, password, role).await?;
        assert_eq!(
            response.status,
            StatusCode::UNPROCESSABLE_ENTITY,
            "{username} / {role}"
        );
        assert!(!detail(&response).is_empty());
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn login_issues_bearer_token() -> Result<()> {
    let app = app()?;
    register(&app, "alice", "password123", "user").await?;

    let response = login(&app, "alice", "password123").await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["token_type"], "bearer");
    assert!(response.body["access_token"].is_string());
    Ok(())
}

#[tokio::test]
async fn login_failures_look_the_same() -> Result<()> {
    let app = app()?;
    register(&app, "alice", "password123", "user").await?;

    let wrong_password = login(&app, "alice", "wrongpass").await?;
    let unknown_user = login(&app, "nobody", "password123").await?;

    for response in [&wrong_password, &unknown_user] {
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert!(detail(response).contains("invalid credentials"));
        assert_eq!(
            response.headers.get(header::WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()),
            Some("Bearer")
        );
    }
    assert_eq!(wrong_password.body, unknown_user.body);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("username=alice"))?;
    let response = send(&app, request).await?;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn me_requires_a_valid_token() -> Result<()> {
    let app = app()?;
    let token = token_for(&app, "testuser", "user").await?;

    let response = send(&app, request(Method::GET, "/me", None, None)?).await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = send(&app, request(Method::GET, "/me", Some("garbage-token"), None)?).await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(detail(&response).contains("could not validate credentials"));

    let response = send(&app, request(Method::GET, "/me", Some(&token), None)?).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["username"], "testuser");
    assert_eq!(response.body["role"], "user");
    Ok(())
}

#[tokio::test]
async fn expired_token_is_reported() -> Result<()> {
    let app = app()?;
    let token = token_for(&app, "testuser", "user").await?;

    let me = send(&app, request(Method::GET, "/me", Some(&token), None)?).await?;
    let principal = Principal {
        id: me.body["id"].as_i64().unwrap_or_default(),
        username: "testuser".to_string(),
        role: Role::User,
    };
    let stale = codec().issue(&principal, Utc::now() - Duration::hours(2))?;

    let response = send(&app, request(Method::GET, "/me", Some(&stale), None)?).await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(detail(&response).contains("expired"));
    Ok(())
}

#[tokio::test]
async fn only_admins_list_users() -> Result<()> {
    let app = app()?;
    let user = token_for(&app, "testuser", "user").await?;
    let admin = token_for(&app, "adminuser", "admin").await?;

    let response = send(&app, request(Method::GET, "/users", Some(&user), None)?).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = send(&app, request(Method::GET, "/users", Some(&admin), None)?).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn create_task_defaults_and_validation() -> Result<()> {
    let app = app()?;
    let token = token_for(&app, "testuser", "user").await?;

    let response = send(
        &app,
        request(Method::POST, "/tasks", Some(&token), Some(json!({ "name": "New Task" })))?,
    )
    .await?;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["name"], "New Task");
    assert_eq!(response.body["status"], "pending");
    assert!(response.body["user_id"].is_i64());
    assert!(response.body["created_at"].is_string());

    let response = send(
        &app,
        request(Method::POST, "/tasks", None, Some(json!({ "name": "New Task" })))?,
    )
    .await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    for body in [
        json!({ "name": "Tsk" }),
        json!({ "name": "1 starts with digit" }),
        json!({ "name": "Valid name", "status": "done" }),
    ] {
        let response = send(&app, request(Method::POST, "/tasks", Some(&token), Some(body))?).await?;
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    }
    Ok(())
}

#[tokio::test]
async fn task_listing_respects_ownership() -> Result<()> {
    let app = app()?;
    let alice = token_for(&app, "alice", "user").await?;
    let bob = token_for(&app, "bob", "user").await?;
    let admin = token_for(&app, "adminuser", "admin").await?;

    create_task(&app, &alice, "Alice task").await?;
    create_task(&app, &bob, "Bob task one").await?;
    create_task(&app, &bob, "Bob task two").await?;

    let count = |response: &Response| response.body.as_array().map(Vec::len);

    let response = send(&app, request(Method::GET, "/tasks", Some(&alice), None)?).await?;
    assert_eq!(count(&response), Some(1));

    let response = send(&app, request(Method::GET, "/tasks", Some(&bob), None)?).await?;
    assert_eq!(count(&response), Some(2));

    let response = send(&app, request(Method::GET, "/tasks", Some(&admin), None)?).await?;
    assert_eq!(count(&response), Some(3));

    let response = send(&app, request(Method::GET, "/my-tasks", Some(&admin), None)?).await?;
    assert_eq!(count(&response), Some(0));
    Ok(())
}

#[tokio::test]
async fn task_access_is_owner_or_admin() -> Result<()> {
    let app = app()?;
    let owner = token_for(&app, "testuser", "user").await?;
    let other = token_for(&app, "otheruser", "user").await?;
    let admin = token_for(&app, "adminuser", "admin").await?;

    let id = create_task(&app, &owner, "Owned task").await?;
    let path = format!("/task/{id}");

    let response = send(&app, request(Method::GET, &path, Some(&owner), None)?).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], id);

    let response = send(&app, request(Method::GET, &path, Some(&other), None)?).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = send(&app, request(Method::GET, &path, Some(&admin), None)?).await?;
    assert_eq!(response.status, StatusCode::OK);

    let response = send(&app, request(Method::GET, "/task/99999", Some(&owner), None)?).await?;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(detail(&response).contains("not found"));

    let response = send(&app, request(Method::GET, "/task/abc", Some(&owner), None)?).await?;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn update_task() -> Result<()> {
    let app = app()?;
    let owner = token_for(&app, "testuser", "user").await?;
    let other = token_for(&app, "otheruser", "user").await?;
    let admin = token_for(&app, "adminuser", "admin").await?;

    let id = create_task(&app, &owner, "Owned task").await?;
    let path = format!("/task/{id}");

    let response = send(
        &app,
        request(Method::PUT, &path, Some(&owner), Some(json!({ "status": "completed" })))?,
    )
    .await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "completed");
    assert_eq!(response.body["name"], "Owned task");

    let response = send(&app, request(Method::PUT, &path, Some(&owner), Some(json!({})))?).await?;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(
        &app,
        request(Method::PUT, &path, Some(&other), Some(json!({ "status": "pending" })))?,
    )
    .await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = send(
        &app,
        request(
            Method::PUT,
            &path,
            Some(&admin),
            Some(json!({ "name": "Renamed by admin", "status": "in progress" })),
        )?,
    )
    .await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "Renamed by admin");
    assert_eq!(response.body["status"], "in progress");

    let response = send(
        &app,
        request(
            Method::PUT,
            "/task/99999",
            Some(&owner),
            Some(json!({ "status": "completed" })),
        )?,
    )
    .await?;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn delete_task() -> Result<()> {
    let app = app()?;
    let owner = token_for(&app, "testuser", "user").await?;
    let other = token_for(&app, "otheruser", "user").await?;

    let id = create_task(&app, &owner, "Owned task").await?;
    let path = format!("/task/{id}");

    let response = send(&app, request(Method::DELETE, &path, Some(&other), None)?).await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = send(&app, request(Method::DELETE, &path, Some(&owner), None)?).await?;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = send(&app, request(Method::GET, &path, Some(&owner), None)?).await?;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send(&app, request(Method::DELETE, "/task/99999", Some(&owner), None)?).await?;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn cors_origins_are_validated() {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), store, codec());
    assert!(api::app(state.clone(), &["https://app.example".to_string()]).is_ok());
    assert!(api::app(state, &["::not a url::".to_string()]).is_err());
}
