use crate::errors::DomainError;
use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ToDo の識別子（ULID 文字列）
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// クライアントから受け取った識別子を検証して取り込む
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        ulid::Ulid::from_string(raw)
            .map(|ulid| Self(ulid.to_string()))
            .map_err(|_| DomainError::InvalidTodoId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 永続化済みの ToDo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 作成前の ToDo（識別子は永続化層が採番する）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl NewTodo {
    /// タイトル必須チェックを行って作成入力を組み立てる
    pub fn new(
        user_id: UserId,
        title: Option<String>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let title = title.ok_or_else(|| DomainError::Validation("title is required".to_string()))?;
        validate_title(&title)?;

        Ok(Self {
            user_id,
            title,
            description: description.unwrap_or_default(),
            created_at: now,
        })
    }

    /// 採番済みの識別子を付与して `Todo` にする
    pub fn into_todo(self, id: TodoId) -> Todo {
        Todo {
            id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            completed: false,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// 部分更新。`None` のフィールドは変更しない。title は空文字も含めてそのまま反映する
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

impl TodoPatch {
    pub fn new(
        title: Option<String>,
        description: Option<String>,
        completed: Option<bool>,
    ) -> Self {
        Self {
            title,
            description,
            completed,
        }
    }

    /// 指定されたフィールドのみ反映し、`updated_at` は常に更新する
    pub fn apply_to(&self, todo: &mut Todo, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            todo.title = title.clone();
        }
        if let Some(description) = &self.description {
            todo.description = description.clone();
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        todo.updated_at = now;
    }
}

fn validate_title(title: &str) -> Result<(), DomainError> {
    if title.is_empty() {
        return Err(DomainError::Validation(
            "title cannot be empty".to_string(),
        ));
    }
    Ok(())
}
