//! todo-api バイナリのエントリポイント

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use infrastructure::DynamoDbClient;
use shared::{init_tracing, load_dotenv, Config};
use todo_api::{app, serve, AppState, IdentityCookie};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = load_dotenv();
    init_tracing().map_err(|e| anyhow::anyhow!(e))?;

    match dotenv {
        Ok(Some(path)) => info!(path = %path.display(), ".env を読み込みました"),
        Ok(None) => debug!(".env は見つかりませんでした"),
        Err(e) => warn!(error = %e, ".env の読み込みに失敗しました"),
    }

    if let Err(e) = run().await {
        error!(error = %format!("{e:#}"), "起動に失敗しました");
        return Err(e);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let client = DynamoDbClient::connect(&config.database_url, &config.database_name)
        .await
        .context("Failed to connect to database")?;

    let collection = client.collection(&config.collection_name);
    collection
        .ensure_exists()
        .await
        .context("Failed to prepare todo collection")?;
    info!(table = %collection.table_name(), "コレクションを準備しました");

    let state = AppState::new(Arc::new(collection));
    let router = app(state, IdentityCookie::new(config.cookie_name));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    serve(addr, router).await?;
    Ok(())
}
