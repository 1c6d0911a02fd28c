use std::env;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_COLLECTION_NAME: &str = "todos";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_COOKIE_NAME: &str = "todo_user_id";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("Invalid {key} value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// 環境変数から読み込むサービス設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// ドキュメント DB の接続先（DynamoDB エンドポイント URL）
    pub database_url: String,
    pub database_name: String,
    pub collection_name: String,
    pub port: u16,
    pub cookie_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意の参照関数から設定を組み立てる（テストではプロセス環境に触れない）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 空文字は未設定として扱う
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let database_name = get("DATABASE_NAME").ok_or(ConfigError::Missing("DATABASE_NAME"))?;

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: raw.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        let cookie_name = get("COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());
        if !is_cookie_token(&cookie_name) {
            return Err(ConfigError::Invalid {
                key: "COOKIE_NAME",
                value: cookie_name,
            });
        }

        Ok(Config {
            database_url,
            database_name,
            collection_name: get("COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            port,
            cookie_name,
        })
    }
}

/// Cookie 名は RFC 6265 の token（区切り文字・空白・制御文字を含まない ASCII）
fn is_cookie_token(name: &str) -> bool {
    const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={}";
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !SEPARATORS.contains(&b))
}

/// `.env` があれば読み込む。見つからない場合は `Ok(None)`
/// トレーシング初期化前に呼ぶため、ここではログを出さない
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
