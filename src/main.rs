mod app;
mod domain;
mod infra;
mod types;

use app::server;
use app::sync::{execute_sync, SyncConfig};
use infra::api::medium::{Pacing, ReqwestMediumApi};
use infra::storage::shard::ArchiveStore;

#[tokio::main]
async fn main() {
    // 環境変数を読み込み（.envファイルがあれば使用）
    let _ = dotenvy::dotenv();

    let command = std::env::args().nth(1).unwrap_or_else(|| "sync".to_string());

    match command.as_str() {
        "sync" => run_sync().await,
        "serve" => run_serve().await,
        other => {
            eprintln!("不明なコマンドです: {}", other);
            eprintln!("使い方: mediumvault [sync|serve]");
            std::process::exit(2);
        }
    }
}

// アーカイブ同期を1回実行する
async fn run_sync() {
    // 設定の検証はリモート呼び出しの前に行う
    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("設定エラー: {}", e);
            std::process::exit(1);
        }
    };

    let api = ReqwestMediumApi::new(config.api_key.clone());
    let store = ArchiveStore::new(config.archive_root.clone());

    match execute_sync(api, &store, &config.username, Pacing::default()).await {
        Ok(report) => println!("{}", report),
        Err(e) => {
            eprintln!("同期処理に失敗しました: {}", e);
            std::process::exit(1);
        }
    }
}

// 読み取りAPIサーバーを起動する
async fn run_serve() {
    let root = std::env::var("MEDIUM_ARCHIVE_ROOT").unwrap_or_else(|_| ".".to_string());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let store = ArchiveStore::new(root);
    if let Err(e) = server::serve(store, port).await {
        eprintln!("サーバーの起動に失敗しました: {}", e);
        std::process::exit(1);
    }
}
