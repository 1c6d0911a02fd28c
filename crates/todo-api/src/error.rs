use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use thiserror::Error;

/// ハンドラー境界のエラー。すべて `{"error": "..."}` の JSON で返す
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("User not authenticated")]
    Unauthenticated,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Todo not found")]
    NotFound,

    /// 内部の詳細は返さず、操作ごとの定型メッセージだけを返す
    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidTodoId(_) => ApiError::InvalidInput("Invalid todo ID".to_string()),
            DomainError::Validation(message) => ApiError::InvalidInput(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}
