use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{IdentityCookie, IdentityLayer};
use crate::state::AppState;

/// 明示的に許可するオリジン（ローカル開発用）
const ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:8080",
];

/// `https://<任意>.azurewebsites.net` を許可する
const WILDCARD_ORIGIN_SCHEME: &str = "https://";
const WILDCARD_ORIGIN_SUFFIX: &str = ".azurewebsites.net";

const CORS_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

/// ルータを構築して返します。
///
/// ```text
/// GET    /health
/// GET    /api/v1/todos
/// POST   /api/v1/todos
/// PUT    /api/v1/todos/:id
/// DELETE /api/v1/todos/:id
/// ```
pub fn app(state: AppState, cookie: IdentityCookie) -> Router {
    let api_v1 = Router::new()
        .route(
            "/todos",
            get(handlers::list_todos).post(handlers::create_todo),
        )
        .route(
            "/todos/:id",
            put(handlers::update_todo).delete(handlers::delete_todo),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_v1)
        .layer(IdentityLayer::new(cookie))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            |origin: &HeaderValue, _parts: &Parts| {
                origin.to_str().map(is_allowed_origin).unwrap_or(false)
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ORIGIN, CONTENT_LENGTH, CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE)
}

pub fn is_allowed_origin(origin: &str) -> bool {
    if ALLOWED_ORIGINS.contains(&origin) {
        return true;
    }

    origin
        .strip_prefix(WILDCARD_ORIGIN_SCHEME)
        .and_then(|host| host.strip_suffix(WILDCARD_ORIGIN_SUFFIX))
        .is_some_and(|sub| !sub.is_empty() && !sub.contains(['/', ':']))
}
