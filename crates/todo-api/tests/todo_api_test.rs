use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use domain::{NewTodo, Todo, TodoId, TodoPatch, UserId};
use infrastructure::{InMemoryTodoRepository, PersistenceError, TodoRepository};
use serde_json::{json, Value};
use todo_api::{app, AppState, IdentityCookie};
use tower::ServiceExt;

const COOKIE: &str = "todo_user_id";

fn router_with(repository: Arc<dyn TodoRepository>) -> Router {
    app(AppState::new(repository), IdentityCookie::new(COOKIE))
}

fn router() -> (Router, Arc<InMemoryTodoRepository>) {
    let repository = Arc::new(InMemoryTodoRepository::new());
    (router_with(repository.clone()), repository)
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Reply {
    /// 発行された識別 Cookie（`name=value` 部分）
    fn issued_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_string)
    }
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<&str>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    Reply {
        status,
        headers,
        body,
    }
}

async fn create(router: &Router, cookie: &str, body: Value) -> Value {
    let reply = send(
        router,
        Method::POST,
        "/api/v1/todos",
        Some(cookie),
        Some(&body.to_string()),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["todo"].clone()
}

#[tokio::test]
async fn test_health_is_ok() {
    let (router, _) = router();

    let reply = send(&router, Method::GET, "/health", None, None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.body,
        json!({ "status": "ok", "message": "Todo API is running" })
    );
}

#[tokio::test]
async fn test_identity_cookie_is_issued_once() {
    let (router, _) = router();

    let first = send(&router, Method::GET, "/api/v1/todos", None, None).await;
    assert_eq!(first.status, StatusCode::OK);
    let set_cookie = first
        .headers
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("todo_user_id="));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("Max-Age=86400"));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(!set_cookie.contains("Secure"));

    let cookie = first.issued_cookie().unwrap();
    let second = send(&router, Method::GET, "/api/v1/todos", Some(&cookie), None).await;
    assert_eq!(second.status, StatusCode::OK);
    assert!(second.headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_each_new_visitor_gets_a_distinct_identity() {
    let (router, _) = router();

    let a = send(&router, Method::GET, "/health", None, None).await;
    let b = send(&router, Method::GET, "/health", None, None).await;

    assert_ne!(a.issued_cookie().unwrap(), b.issued_cookie().unwrap());
}

#[tokio::test]
async fn test_empty_cookie_is_replaced() {
    let (router, _) = router();

    let reply = send(&router, Method::GET, "/api/v1/todos", Some("todo_user_id="), None).await;

    assert_eq!(reply.status, StatusCode::OK);
    let issued = reply.issued_cookie().unwrap();
    assert!(issued.len() > "todo_user_id=".len());
}

#[tokio::test]
async fn test_create_applies_defaults_and_owner() {
    let (router, _) = router();

    let reply = send(
        &router,
        Method::POST,
        "/api/v1/todos",
        Some("todo_user_id=alice"),
        Some(r#"{"title":"Buy milk"}"#),
    )
    .await;

    assert_eq!(reply.status, StatusCode::CREATED);
    let todo = &reply.body["todo"];
    assert_eq!(todo["title"], "Buy milk");
    assert_eq!(todo["description"], "");
    assert_eq!(todo["completed"], false);
    assert_eq!(todo["user_id"], "alice");
    assert_eq!(todo["created_at"], todo["updated_at"]);
    assert!(TodoId::parse(todo["id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_create_rejects_missing_or_empty_title() {
    let (router, repository) = router();

    for body in [r#"{"description":"x"}"#, r#"{"title":""}"#, r#"{"title":null}"#] {
        let reply = send(
            &router,
            Method::POST,
            "/api/v1/todos",
            Some("todo_user_id=alice"),
            Some(body),
        )
        .await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{body}");
        assert!(reply.body["error"].is_string());
    }
    assert!(repository.is_empty());
}

#[tokio::test]
async fn test_create_rejects_malformed_json() {
    let (router, repository) = router();

    let reply = send(
        &router,
        Method::POST,
        "/api/v1/todos",
        Some("todo_user_id=alice"),
        Some("{not json"),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.body["error"].is_string());
    assert!(repository.is_empty());
}

#[tokio::test]
async fn test_list_is_scoped_to_caller() {
    let (router, _) = router();
    create(&router, "todo_user_id=alice", json!({ "title": "A1" })).await;
    create(&router, "todo_user_id=alice", json!({ "title": "A2" })).await;
    create(&router, "todo_user_id=bob", json!({ "title": "B1" })).await;

    let alice = send(&router, Method::GET, "/api/v1/todos", Some("todo_user_id=alice"), None).await;
    let carol = send(&router, Method::GET, "/api/v1/todos", Some("todo_user_id=carol"), None).await;

    let titles: Vec<&str> = alice.body["todos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|todo| todo["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"A1") && titles.contains(&"A2"));
    assert_eq!(carol.body, json!({ "todos": [] }));
}

#[tokio::test]
async fn test_created_todo_appears_in_list() {
    let (router, _) = router();
    let todo = create(
        &router,
        "todo_user_id=alice",
        json!({ "title": "Write report", "description": "quarterly" }),
    )
    .await;

    let reply = send(&router, Method::GET, "/api/v1/todos", Some("todo_user_id=alice"), None).await;

    assert_eq!(reply.body["todos"], json!([todo]));
}

#[tokio::test]
async fn test_partial_update_keeps_other_fields() {
    let (router, _) = router();
    let todo = create(
        &router,
        "todo_user_id=alice",
        json!({ "title": "Buy milk", "description": "2L" }),
    )
    .await;
    let id = todo["id"].as_str().unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let reply = send(
        &router,
        Method::PUT,
        &format!("/api/v1/todos/{id}"),
        Some("todo_user_id=alice"),
        Some(r#"{"completed":true}"#),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    let updated = &reply.body["todo"];
    assert_eq!(updated["completed"], true);
    assert_eq!(updated["title"], "Buy milk");
    assert_eq!(updated["description"], "2L");
    assert_eq!(updated["created_at"], todo["created_at"]);

    let before: DateTime<Utc> = todo["updated_at"].as_str().unwrap().parse().unwrap();
    let after: DateTime<Utc> = updated["updated_at"].as_str().unwrap().parse().unwrap();
    assert!(after > before);
}

#[tokio::test]
async fn test_create_accepts_whitespace_title() {
    let (router, _) = router();

    let todo = create(&router, "todo_user_id=alice", json!({ "title": "   " })).await;

    assert_eq!(todo["title"], "   ");
}

#[tokio::test]
async fn test_update_applies_empty_title() {
    let (router, _) = router();
    let todo = create(&router, "todo_user_id=alice", json!({ "title": "Rename me" })).await;
    let id = todo["id"].as_str().unwrap();

    let reply = send(
        &router,
        Method::PUT,
        &format!("/api/v1/todos/{id}"),
        Some("todo_user_id=alice"),
        Some(r#"{"title":""}"#),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["todo"]["title"], "");
    assert_eq!(reply.body["todo"]["completed"], false);
}

#[tokio::test]
async fn test_other_identity_sees_not_found() {
    let (router, _) = router();
    let todo = create(&router, "todo_user_id=alice", json!({ "title": "Private" })).await;
    let uri = format!("/api/v1/todos/{}", todo["id"].as_str().unwrap());

    let update = send(&router, Method::PUT, &uri, Some("todo_user_id=bob"), Some(r#"{"completed":true}"#)).await;
    let delete = send(&router, Method::DELETE, &uri, Some("todo_user_id=bob"), None).await;

    assert_eq!(update.status, StatusCode::NOT_FOUND);
    assert_eq!(update.body, json!({ "error": "Todo not found" }));
    assert_eq!(delete.status, StatusCode::NOT_FOUND);

    let alice = send(&router, Method::GET, "/api/v1/todos", Some("todo_user_id=alice"), None).await;
    assert_eq!(alice.body["todos"][0]["completed"], false);
}

#[tokio::test]
async fn test_invalid_id_is_rejected_before_body() {
    let (router, _) = router();

    let update = send(
        &router,
        Method::PUT,
        "/api/v1/todos/not-a-ulid",
        Some("todo_user_id=alice"),
        Some("{broken"),
    )
    .await;
    let delete = send(
        &router,
        Method::DELETE,
        "/api/v1/todos/not-a-ulid",
        Some("todo_user_id=alice"),
        None,
    )
    .await;

    assert_eq!(update.status, StatusCode::BAD_REQUEST);
    assert_eq!(update.body, json!({ "error": "Invalid todo ID" }));
    assert_eq!(delete.status, StatusCode::BAD_REQUEST);
    assert_eq!(delete.body, json!({ "error": "Invalid todo ID" }));
}

#[tokio::test]
async fn test_unknown_well_formed_id_is_not_found() {
    let (router, _) = router();
    let uri = format!("/api/v1/todos/{}", TodoId::new());

    let reply = send(&router, Method::PUT, &uri, Some("todo_user_id=alice"), Some("{}")).await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_twice_returns_not_found() {
    let (router, repository) = router();
    let todo = create(&router, "todo_user_id=alice", json!({ "title": "Once" })).await;
    let uri = format!("/api/v1/todos/{}", todo["id"].as_str().unwrap());

    let first = send(&router, Method::DELETE, &uri, Some("todo_user_id=alice"), None).await;
    let second = send(&router, Method::DELETE, &uri, Some("todo_user_id=alice"), None).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body, json!({ "message": "Todo deleted successfully" }));
    assert_eq!(second.status, StatusCode::NOT_FOUND);
    assert!(repository.is_empty());
}

/// 応答しない永続化層
struct SlowRepository;

#[async_trait]
impl TodoRepository for SlowRepository {
    async fn find_by_owner(&self, _owner: &UserId) -> Result<Vec<Todo>, PersistenceError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }

    async fn insert(&self, _new_todo: NewTodo) -> Result<Todo, PersistenceError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(PersistenceError::Connection("unreachable".to_string()))
    }

    async fn update_owned(
        &self,
        _owner: &UserId,
        _id: &TodoId,
        _patch: &TodoPatch,
        _now: DateTime<Utc>,
    ) -> Result<Todo, PersistenceError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(PersistenceError::NotFound)
    }

    async fn delete_owned(&self, _owner: &UserId, _id: &TodoId) -> Result<(), PersistenceError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_persistence_times_out() {
    let router = router_with(Arc::new(SlowRepository));

    let list = send(&router, Method::GET, "/api/v1/todos", Some("todo_user_id=alice"), None).await;
    let create = send(
        &router,
        Method::POST,
        "/api/v1/todos",
        Some("todo_user_id=alice"),
        Some(r#"{"title":"x"}"#),
    )
    .await;

    assert_eq!(list.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(list.body, json!({ "error": "Failed to fetch todos" }));
    assert_eq!(create.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(create.body, json!({ "error": "Failed to create todo" }));
}

/// 常に失敗する永続化層
struct FailingRepository;

#[async_trait]
impl TodoRepository for FailingRepository {
    async fn find_by_owner(&self, _owner: &UserId) -> Result<Vec<Todo>, PersistenceError> {
        Err(PersistenceError::DynamoDb("secret table detail".to_string()))
    }

    async fn insert(&self, _new_todo: NewTodo) -> Result<Todo, PersistenceError> {
        Err(PersistenceError::Connection("secret host detail".to_string()))
    }

    async fn update_owned(
        &self,
        _owner: &UserId,
        _id: &TodoId,
        _patch: &TodoPatch,
        _now: DateTime<Utc>,
    ) -> Result<Todo, PersistenceError> {
        Err(PersistenceError::DynamoDb("secret".to_string()))
    }

    async fn delete_owned(&self, _owner: &UserId, _id: &TodoId) -> Result<(), PersistenceError> {
        Err(PersistenceError::DynamoDb("secret".to_string()))
    }
}

#[tokio::test]
async fn test_persistence_failures_are_generic() {
    let router = router_with(Arc::new(FailingRepository));
    let uri = format!("/api/v1/todos/{}", TodoId::new());

    let cases = [
        (Method::GET, "/api/v1/todos".to_string(), None, "Failed to fetch todos"),
        (Method::POST, "/api/v1/todos".to_string(), Some(r#"{"title":"x"}"#), "Failed to create todo"),
        (Method::PUT, uri.clone(), Some("{}"), "Failed to update todo"),
        (Method::DELETE, uri, None, "Failed to delete todo"),
    ];

    for (method, uri, body, message) in cases {
        let reply = send(&router, method, &uri, Some("todo_user_id=alice"), body).await;

        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.body, json!({ "error": message }));
    }
}

async fn preflight(router: &Router, origin: &str) -> HeaderMap {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/todos")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.headers().clone()
}

#[tokio::test]
async fn test_cors_preflight_for_allowed_origins() {
    let (router, _) = router();

    for origin in ["http://localhost:5173", "https://my-todo.azurewebsites.net"] {
        let headers = preflight(&router, origin).await;

        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], origin);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("PUT") && methods.contains("DELETE"));
    }
}

#[tokio::test]
async fn test_cors_preflight_for_unknown_origin() {
    let (router, _) = router();

    let headers = preflight(&router, "https://evil.example.com").await;

    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_cors_headers_on_regular_response() {
    let (router, _) = router();
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert!(response.headers().get(header::SET_COOKIE).is_some());
}
