//! 匿名ユーザーごとの ToDo を扱う HTTP API（axum）
//!
//! 識別は Cookie で行い、永続化は `infrastructure::TodoRepository` に委譲します。

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use middleware::{CurrentUser, IdentityCookie, IdentityLayer};
pub use routes::{app, is_allowed_origin};
pub use server::serve;
pub use state::{AppState, REQUEST_TIMEOUT};
