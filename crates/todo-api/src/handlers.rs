use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::{NewTodo, TodoId, TodoPatch};
use tracing::info;

use crate::dto::{
    CreateTodoRequest, HealthBody, MessageResponse, TodoListResponse, TodoResponse,
    UpdateTodoRequest,
};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::{bounded, AppState};

/// ヘルスチェック。DB には触れない
pub async fn health() -> (StatusCode, Json<HealthBody>) {
    let body = HealthBody {
        status: "ok",
        message: "Todo API is running",
    };
    (StatusCode::OK, Json(body))
}

/// 呼び出し元の ToDo 一覧
pub async fn list_todos(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<TodoListResponse>, ApiError> {
    let todos = bounded(
        state.repository().find_by_owner(&user_id),
        "Failed to fetch todos",
    )
    .await?;

    Ok(Json(TodoListResponse { todos }))
}

pub async fn create_todo(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TodoResponse>), ApiError> {
    let Json(req) = payload?;
    let new_todo = NewTodo::new(user_id, req.title, req.description, Utc::now())?;

    let todo = bounded(
        state.repository().insert(new_todo),
        "Failed to create todo",
    )
    .await?;

    info!(todo_id = %todo.id, "ToDo を作成しました");
    Ok((StatusCode::CREATED, Json(TodoResponse { todo })))
}

/// 部分更新。識別子の検証を本文より先に行う
pub async fn update_todo(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Result<Json<TodoResponse>, ApiError> {
    let todo_id = TodoId::parse(&raw_id)?;
    let Json(req) = payload?;
    let patch = TodoPatch::new(req.title, req.description, req.completed);

    let todo = bounded(
        state
            .repository()
            .update_owned(&user_id, &todo_id, &patch, Utc::now()),
        "Failed to update todo",
    )
    .await?;

    info!(todo_id = %todo.id, "ToDo を更新しました");
    Ok(Json(TodoResponse { todo }))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let todo_id = TodoId::parse(&raw_id)?;

    bounded(
        state.repository().delete_owned(&user_id, &todo_id),
        "Failed to delete todo",
    )
    .await?;

    info!(todo_id = %todo_id, "ToDo を削除しました");
    Ok(Json(MessageResponse {
        message: "Todo deleted successfully",
    }))
}
