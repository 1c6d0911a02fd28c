use crate::error::ApiError;
use infrastructure::{PersistenceError, TodoRepository};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::error;

/// 永続化呼び出し 1 回あたりの上限
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// アプリケーションの共有状態
#[derive(Clone)]
pub struct AppState {
    repository: Arc<dyn TodoRepository>,
}

impl AppState {
    pub fn new(repository: Arc<dyn TodoRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &dyn TodoRepository {
        self.repository.as_ref()
    }
}

/// 永続化呼び出しにタイムアウトを掛け、結果を `ApiError` に変換する。
/// 不一致は `NotFound`、それ以外の失敗は原因をログに残して `failure` を返す
pub(crate) async fn bounded<T, F>(operation: F, failure: &'static str) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, PersistenceError>>,
{
    match timeout(REQUEST_TIMEOUT, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(PersistenceError::NotFound)) => Err(ApiError::NotFound),
        Ok(Err(e)) => {
            error!(error = %e, "{failure}");
            Err(ApiError::Internal(failure))
        }
        Err(_) => {
            error!(timeout_secs = REQUEST_TIMEOUT.as_secs(), "{failure}: タイムアウト");
            Err(ApiError::Internal(failure))
        }
    }
}
