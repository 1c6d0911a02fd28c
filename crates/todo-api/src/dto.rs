//! リクエスト/レスポンスの JSON 形状

use domain::Todo;
use serde::{Deserialize, Serialize};

/// POST /api/v1/todos リクエスト
/// title の必須チェックはドメイン側で行うため、ここでは `Option` で受ける
#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// PUT /api/v1/todos/{id} リクエスト（すべて任意）
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TodoResponse {
    pub todo: Todo,
}

#[derive(Debug, Serialize)]
pub struct TodoListResponse {
    pub todos: Vec<Todo>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    /// サービスの簡易ステータス
    pub status: &'static str,
    pub message: &'static str,
}
