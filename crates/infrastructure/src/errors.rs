use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use std::fmt::Debug;
use thiserror::Error;

/// 永続化層のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// 条件（所有者・存在）に一致するドキュメントが無い
    #[error("Document not found")]
    NotFound,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    /// 保存済みアイテムを Todo に復元できない
    #[error("Corrupted item: {0}")]
    CorruptedItem(String),
}

impl PersistenceError {
    /// SDK エラーを原因チェーン込みの文字列にして包む
    pub(crate) fn from_sdk<E, R>(err: &SdkError<E, R>) -> Self
    where
        E: std::error::Error + 'static,
        R: Debug,
    {
        PersistenceError::DynamoDb(DisplayErrorContext(err).to_string())
    }
}
