use crate::errors::PersistenceError;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use domain::{Todo, TodoId, TodoPatch, UserId};
use std::collections::HashMap;

pub type Item = HashMap<String, AttributeValue>;

// 属性名（JSON 表現と揃える）
pub const ATTR_ID: &str = "id";
pub const ATTR_USER_ID: &str = "user_id";
pub const ATTR_TITLE: &str = "title";
pub const ATTR_DESCRIPTION: &str = "description";
pub const ATTR_COMPLETED: &str = "completed";
pub const ATTR_CREATED_AT: &str = "created_at";
pub const ATTR_UPDATED_AT: &str = "updated_at";

/// テーブルのキー。パーティションキーが所有者なので、キー指定だけで所有者スコープになる
pub fn todo_key(owner: &UserId, id: &TodoId) -> Item {
    HashMap::from([
        (
            ATTR_USER_ID.to_string(),
            AttributeValue::S(owner.as_str().to_string()),
        ),
        (ATTR_ID.to_string(), AttributeValue::S(id.as_str().to_string())),
    ])
}

pub fn todo_to_item(todo: &Todo) -> Item {
    let mut item = todo_key(&todo.user_id, &todo.id);
    item.insert(ATTR_TITLE.to_string(), AttributeValue::S(todo.title.clone()));
    item.insert(
        ATTR_DESCRIPTION.to_string(),
        AttributeValue::S(todo.description.clone()),
    );
    item.insert(
        ATTR_COMPLETED.to_string(),
        AttributeValue::Bool(todo.completed),
    );
    item.insert(
        ATTR_CREATED_AT.to_string(),
        AttributeValue::S(todo.created_at.to_rfc3339()),
    );
    item.insert(
        ATTR_UPDATED_AT.to_string(),
        AttributeValue::S(todo.updated_at.to_rfc3339()),
    );
    item
}

pub fn item_to_todo(item: &Item) -> Result<Todo, PersistenceError> {
    let id = TodoId::parse(string_attr(item, ATTR_ID)?)
        .map_err(|e| PersistenceError::CorruptedItem(e.to_string()))?;
    let user_id = UserId::from_string(string_attr(item, ATTR_USER_ID)?.to_string())
        .map_err(|e| PersistenceError::CorruptedItem(e.to_string()))?;

    Ok(Todo {
        id,
        user_id,
        title: string_attr(item, ATTR_TITLE)?.to_string(),
        // 説明は空文字で保存されていない古いアイテムも許容する
        description: item
            .get(ATTR_DESCRIPTION)
            .and_then(|v| v.as_s().ok())
            .cloned()
            .unwrap_or_default(),
        completed: item
            .get(ATTR_COMPLETED)
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        created_at: timestamp_attr(item, ATTR_CREATED_AT)?,
        updated_at: timestamp_attr(item, ATTR_UPDATED_AT)?,
    })
}

/// 部分更新用の UpdateExpression と式の属性名・値
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl UpdatePlan {
    /// パッチに含まれるフィールドと `updated_at` だけを SET する
    pub fn from_patch(patch: &TodoPatch, now: DateTime<Utc>) -> Self {
        let mut plan = UpdatePlan {
            expression: String::new(),
            names: HashMap::new(),
            values: HashMap::new(),
        };
        let mut assignments = Vec::new();

        let mut set = |attr: &str, value: AttributeValue| {
            let name = format!("#{attr}");
            let placeholder = format!(":{attr}");
            assignments.push(format!("{name} = {placeholder}"));
            plan.names.insert(name, attr.to_string());
            plan.values.insert(placeholder, value);
        };

        set(ATTR_UPDATED_AT, AttributeValue::S(now.to_rfc3339()));
        if let Some(title) = &patch.title {
            set(ATTR_TITLE, AttributeValue::S(title.clone()));
        }
        if let Some(description) = &patch.description {
            set(ATTR_DESCRIPTION, AttributeValue::S(description.clone()));
        }
        if let Some(completed) = patch.completed {
            set(ATTR_COMPLETED, AttributeValue::Bool(completed));
        }

        plan.expression = format!("SET {}", assignments.join(", "));
        plan
    }
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Result<&'a str, PersistenceError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(String::as_str)
        .ok_or_else(|| PersistenceError::CorruptedItem(format!("missing string attribute {name}")))
}

fn timestamp_attr(item: &Item, name: &str) -> Result<DateTime<Utc>, PersistenceError> {
    let raw = string_attr(item, name)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistenceError::CorruptedItem(format!("invalid {name}: {e}")))
}
