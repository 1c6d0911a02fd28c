use crate::errors::PersistenceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{NewTodo, Todo, TodoId, TodoPatch, UserId};

/// ToDo コレクションへの操作。すべての読み書きは所有者でスコープされる
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// 所有者の ToDo を識別子（作成）順で全件返す。該当なしは空ベクタ
    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Todo>, PersistenceError>;

    /// 識別子を採番して保存し、保存された ToDo を返す
    async fn insert(&self, new_todo: NewTodo) -> Result<Todo, PersistenceError>;

    /// 識別子と所有者の両方が一致する ToDo に部分更新を適用する。
    /// 一致しなければ `PersistenceError::NotFound`
    async fn update_owned(
        &self,
        owner: &UserId,
        id: &TodoId,
        patch: &TodoPatch,
        now: DateTime<Utc>,
    ) -> Result<Todo, PersistenceError>;

    /// 識別子と所有者の両方が一致する ToDo を削除する。
    /// 削除件数 0 は `PersistenceError::NotFound`
    async fn delete_owned(&self, owner: &UserId, id: &TodoId) -> Result<(), PersistenceError>;
}
