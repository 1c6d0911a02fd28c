use crate::collection::TodoCollection;
use crate::errors::PersistenceError;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::Client;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

/// 起動時の疎通確認のタイムアウト
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const FALLBACK_REGION: &str = "ap-northeast-1";

/// ドキュメント DB（DynamoDB）への単一のハンドル。
/// プロセス起動時に一度だけ作り、状態として各ハンドラーへ渡す
#[derive(Clone)]
pub struct DynamoDbClient {
    client: Client,
    database_name: String,
}

impl DynamoDbClient {
    /// 接続文字列（エンドポイント URL）とデータベース名で接続し、疎通を確認する
    pub async fn connect(database_url: &str, database_name: &str) -> Result<Self, PersistenceError> {
        let region = RegionProviderChain::default_provider().or_else(FALLBACK_REGION);
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .endpoint_url(database_url)
            .load()
            .await;

        let db = Self::from_client(Client::new(&aws_config), database_name);
        db.ping().await?;

        info!(endpoint = %database_url, database = %database_name, "DynamoDB に接続しました");
        Ok(db)
    }

    pub fn from_client(client: Client, database_name: impl Into<String>) -> Self {
        Self {
            client,
            database_name: database_name.into(),
        }
    }

    /// 疎通確認（テーブル一覧を 1 件だけ取得する）
    pub async fn ping(&self) -> Result<(), PersistenceError> {
        timeout(CONNECT_TIMEOUT, self.client.list_tables().limit(1).send())
            .await
            .map_err(|_| PersistenceError::Connection("ping timed out".to_string()))?
            .map_err(|e| PersistenceError::Connection(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    /// 名前付きコレクションのハンドルを返す
    pub fn collection(&self, name: &str) -> TodoCollection {
        TodoCollection::new(self.client.clone(), table_name(&self.database_name, name))
    }
}

/// コレクションは `{database}-{collection}` という名前のテーブルに対応する
pub fn table_name(database_name: &str, collection_name: &str) -> String {
    format!("{database_name}-{collection_name}")
}
