use crate::errors::PersistenceError;
use crate::repositories::TodoRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{NewTodo, Todo, TodoId, TodoPatch, UserId};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// 簡易な InMemory 実装（開発/テスト用）。
/// (所有者, 識別子) 順の BTreeMap で DynamoDB のキー順序を再現する
#[derive(Default)]
pub struct InMemoryTodoRepository {
    todos: Mutex<BTreeMap<(UserId, TodoId), Todo>>,
}

impl InMemoryTodoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存件数（全所有者の合計）
    pub fn len(&self) -> usize {
        self.lock().map(|todos| todos.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<(UserId, TodoId), Todo>>, PersistenceError>
    {
        self.todos
            .lock()
            .map_err(|_| PersistenceError::Connection("in-memory store poisoned".to_string()))
    }
}

#[async_trait]
impl TodoRepository for InMemoryTodoRepository {
    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Todo>, PersistenceError> {
        let todos = self.lock()?;
        Ok(todos
            .iter()
            .filter(|((user_id, _), _)| user_id == owner)
            .map(|(_, todo)| todo.clone())
            .collect())
    }

    async fn insert(&self, new_todo: NewTodo) -> Result<Todo, PersistenceError> {
        let todo = new_todo.into_todo(TodoId::new());
        self.lock()?.insert(
            (todo.user_id.clone(), todo.id.clone()),
            todo.clone(),
        );
        Ok(todo)
    }

    async fn update_owned(
        &self,
        owner: &UserId,
        id: &TodoId,
        patch: &TodoPatch,
        now: DateTime<Utc>,
    ) -> Result<Todo, PersistenceError> {
        let mut todos = self.lock()?;
        let todo = todos
            .get_mut(&(owner.clone(), id.clone()))
            .ok_or(PersistenceError::NotFound)?;
        patch.apply_to(todo, now);
        Ok(todo.clone())
    }

    async fn delete_owned(&self, owner: &UserId, id: &TodoId) -> Result<(), PersistenceError> {
        self.lock()?
            .remove(&(owner.clone(), id.clone()))
            .map(|_| ())
            .ok_or(PersistenceError::NotFound)
    }
}
