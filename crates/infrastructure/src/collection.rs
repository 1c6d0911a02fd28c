use crate::errors::PersistenceError;
use crate::models::{item_to_todo, todo_key, todo_to_item, Item, UpdatePlan, ATTR_ID, ATTR_USER_ID};
use crate::repositories::TodoRepository;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType, ReturnValue,
    ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use domain::{NewTodo, Todo, TodoId, TodoPatch, UserId};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

const TABLE_READY_POLL_INTERVAL: Duration = Duration::from_millis(500);
const TABLE_READY_MAX_POLLS: u32 = 60;

/// 1 テーブル = 1 コレクションのハンドル。
/// キーは (user_id, id) なので、所有者の一致はキー指定と条件式で保証される
#[derive(Clone)]
pub struct TodoCollection {
    client: Client,
    table_name: String,
}

impl TodoCollection {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// テーブルが無ければ作成し、ACTIVE になるまで待つ。
    /// ドキュメント DB のコレクションと同様に、初回利用時に暗黙的に用意する
    pub async fn ensure_exists(&self) -> Result<(), PersistenceError> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => {
                debug!(table = %self.table_name, "テーブルは既に存在します");
                return Ok(());
            }
            Err(SdkError::ServiceError(e)) if e.err().is_resource_not_found_exception() => {}
            Err(e) => return Err(PersistenceError::from_sdk(&e)),
        }

        info!(table = %self.table_name, "テーブルを作成します");
        let created = self
            .client
            .create_table()
            .table_name(&self.table_name)
            .billing_mode(BillingMode::PayPerRequest)
            .attribute_definitions(string_attribute(ATTR_USER_ID)?)
            .attribute_definitions(string_attribute(ATTR_ID)?)
            .key_schema(key_element(ATTR_USER_ID, KeyType::Hash)?)
            .key_schema(key_element(ATTR_ID, KeyType::Range)?)
            .send()
            .await;

        match created {
            Ok(_) => {}
            // 他プロセスが同時に作成した場合
            Err(SdkError::ServiceError(e)) if e.err().is_resource_in_use_exception() => {}
            Err(e) => return Err(PersistenceError::from_sdk(&e)),
        }

        self.wait_until_active().await
    }

    async fn wait_until_active(&self) -> Result<(), PersistenceError> {
        for attempt in 1..=TABLE_READY_MAX_POLLS {
            let output = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .map_err(|e| PersistenceError::from_sdk(&e))?;

            let status = output.table().and_then(|t| t.table_status());
            if status == Some(&TableStatus::Active) {
                info!(table = %self.table_name, "テーブルが利用可能になりました");
                return Ok(());
            }

            debug!(table = %self.table_name, attempt, ?status, "テーブルの作成完了を待機中");
            sleep(TABLE_READY_POLL_INTERVAL).await;
        }

        Err(PersistenceError::Connection(format!(
            "table {} did not become active",
            self.table_name
        )))
    }
}

#[async_trait]
impl TodoRepository for TodoCollection {
    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Todo>, PersistenceError> {
        let mut todos = Vec::new();
        let mut start_key: Option<Item> = None;

        // 1 MB 単位のページを継続キーが無くなるまで辿る
        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#user_id = :user_id")
                .expression_attribute_names("#user_id", ATTR_USER_ID)
                .expression_attribute_values(
                    ":user_id",
                    AttributeValue::S(owner.as_str().to_string()),
                )
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| PersistenceError::from_sdk(&e))?;

            for item in output.items.unwrap_or_default() {
                todos.push(item_to_todo(&item)?);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        debug!(table = %self.table_name, count = todos.len(), "ToDo 一覧を取得しました");
        Ok(todos)
    }

    async fn insert(&self, new_todo: NewTodo) -> Result<Todo, PersistenceError> {
        let todo = new_todo.into_todo(TodoId::new());

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(todo_to_item(&todo)))
            .condition_expression("attribute_not_exists(#id)")
            .expression_attribute_names("#id", ATTR_ID)
            .send()
            .await
            .map_err(|e| PersistenceError::from_sdk(&e))?;

        debug!(table = %self.table_name, todo_id = %todo.id, "ToDo を保存しました");
        Ok(todo)
    }

    async fn update_owned(
        &self,
        owner: &UserId,
        id: &TodoId,
        patch: &TodoPatch,
        now: DateTime<Utc>,
    ) -> Result<Todo, PersistenceError> {
        let plan = UpdatePlan::from_patch(patch, now);

        let mut names = plan.names;
        names.insert("#id".to_string(), ATTR_ID.to_string());

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(todo_key(owner, id)))
            .update_expression(plan.expression)
            .condition_expression("attribute_exists(#id)")
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(plan.values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(SdkError::ServiceError(e)) if e.err().is_conditional_check_failed_exception() => {
                return Err(PersistenceError::NotFound);
            }
            Err(e) => return Err(PersistenceError::from_sdk(&e)),
        };

        let item = output.attributes.ok_or_else(|| {
            PersistenceError::CorruptedItem("update returned no attributes".to_string())
        })?;
        item_to_todo(&item)
    }

    async fn delete_owned(&self, owner: &UserId, id: &TodoId) -> Result<(), PersistenceError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(todo_key(owner, id)))
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", ATTR_ID)
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(table = %self.table_name, todo_id = %id, "ToDo を削除しました");
                Ok(())
            }
            Err(SdkError::ServiceError(e)) if e.err().is_conditional_check_failed_exception() => {
                Err(PersistenceError::NotFound)
            }
            Err(e) => Err(PersistenceError::from_sdk(&e)),
        }
    }
}

fn string_attribute(name: &str) -> Result<AttributeDefinition, PersistenceError> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(|e| PersistenceError::DynamoDb(e.to_string()))
}

fn key_element(name: &str, key_type: KeyType) -> Result<KeySchemaElement, PersistenceError> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(|e| PersistenceError::DynamoDb(e.to_string()))
}
