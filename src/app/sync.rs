use crate::infra::api::medium::{ApiStats, MediumApi, MediumCatalog, Pacing};
use crate::infra::storage::shard::ArchiveStore;
use crate::types::{ConfigError, ConfigResult, SyncError, SyncResult};
use std::env;
use std::fmt;
use std::path::PathBuf;
use tokio::time::sleep;

/// 同期実行に必要な設定（環境変数から読み込み）
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_key: String,
    pub username: String,
    pub archive_root: PathBuf,
}

impl SyncConfig {
    /// # 概要
    /// 環境変数から設定を読み込む。
    ///
    /// `MEDIUM_API_KEY`と`MEDIUM_USERNAME`は必須で、欠けている場合は
    /// リモート呼び出しを行う前に設定エラーで中断する。
    /// `MEDIUM_ARCHIVE_ROOT`は任意（既定はカレントディレクトリ）。
    pub fn from_env() -> ConfigResult<Self> {
        let api_key = env::var("MEDIUM_API_KEY")
            .map_err(|_| ConfigError::missing_env_var("MEDIUM_API_KEY"))?;
        let username = env::var("MEDIUM_USERNAME")
            .map_err(|_| ConfigError::missing_env_var("MEDIUM_USERNAME"))?;

        if api_key.trim().is_empty() {
            return Err(ConfigError::invalid_value("MEDIUM_API_KEYが空です"));
        }
        if username.trim().is_empty() {
            return Err(ConfigError::invalid_value("MEDIUM_USERNAMEが空です"));
        }

        let archive_root = env::var("MEDIUM_ARCHIVE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        Ok(Self {
            api_key,
            username,
            archive_root,
        })
    }
}

/// 1回の同期実行の結果レポート
/// 実行終了時の表示にのみ使われ、永続化はされない
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// 新規保存した記事数
    pub saved: usize,
    /// 既存のためスキップした記事数
    pub skipped: usize,
    /// 種類別のAPI呼び出し回数
    pub stats: ApiStats,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== アーカイブ結果 ===")?;
        writeln!(f, "保存した記事: {}件", self.saved)?;
        writeln!(f, "スキップした記事（既存）: {}件", self.skipped)?;
        writeln!(f)?;
        writeln!(f, "=== API呼び出し回数 ===")?;
        writeln!(f, "合計: {}回", self.stats.total())?;
        writeln!(f, "  - ユーザーID取得: {}回", self.stats.get_user_id)?;
        writeln!(f, "  - 記事一覧取得: {}回", self.stats.get_article_list)?;
        writeln!(f, "  - 記事メタデータ取得: {}回", self.stats.get_article_info)?;
        write!(f, "  - 記事本文取得: {}回", self.stats.get_article_markdown)
    }
}

/// # 概要
/// 同期ワークフローのメイン実行関数（依存性を注入）。
///
/// ## 動作
/// 1. ユーザー名からユーザーIDを解決
/// 2. 記事ID一覧をページネーションで全件取得（0件なら異常として中断）
/// 3. 一覧順に、未保存の記事のみ取得してシャードに保存
///
/// ## エラー
/// 設定・ユーザー解決・空一覧のエラーは実行全体を中断する。
/// 記事単位の取得・保存エラーはログに残して次の記事に進む。
pub async fn execute_sync<A: MediumApi>(
    api: A,
    store: &ArchiveStore,
    username: &str,
    pacing: Pacing,
) -> SyncResult<SyncReport> {
    println!("=== Mediumアーカイブ同期を開始 ===");

    let mut catalog = MediumCatalog::new(api, pacing);

    // 段階1: ユーザーIDの解決と記事ID一覧の取得
    let user_id = catalog.resolve_user_id(username).await?;
    println!("ユーザーID: {}", user_id);

    let article_ids = catalog.list_all_article_ids(&user_id).await;
    if article_ids.is_empty() {
        return Err(SyncError::EmptyCatalog { user_id });
    }
    println!("処理対象: {}件", article_ids.len());

    // 段階2: 一覧順に取得・保存（既存はスキップ)
    let mut saved = 0;
    let mut skipped = 0;

    for article_id in &article_ids {
        // 存在チェックはリモート呼び出しの前に行う
        // 前回の実行が途中で終わっていても、新規記事の分しかAPIを消費しない
        if store.exists(article_id) {
            println!("既存のためスキップ: {}", article_id);
            skipped += 1;
            continue;
        }

        match catalog.fetch_article(article_id).await {
            Ok(article) => match store.save(&article) {
                Ok(shard) => {
                    let shard_name = shard.file_name().and_then(|n| n.to_str()).unwrap_or("?");
                    println!("保存しました: {} -> {}", article.title, shard_name);
                    saved += 1;
                    sleep(pacing.article_delay).await;
                }
                Err(e) => {
                    eprintln!("記事の保存に失敗: {} - {}", article_id, e);
                    sleep(pacing.error_backoff).await;
                }
            },
            Err(e) => {
                eprintln!("記事の取得に失敗: {} - {}", article_id, e);
                sleep(pacing.error_backoff).await;
            }
        }
    }

    let report = SyncReport {
        saved,
        skipped,
        stats: catalog.stats().clone(),
    };

    println!("=== Mediumアーカイブ同期完了 ===");
    Ok(report)
}
