use crate::app::cache::ArchiveCache;
use crate::domain::article::{Article, ArticleSummary};
use crate::infra::storage::shard::ArchiveStore;
use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

// 一覧エンドポイントの既定の1ページ件数
const DEFAULT_PAGE_LIMIT: i64 = 20;

/// 読み取りAPIのエラー
/// ステータスコードと `{"error": ...}` 形式のJSONボディに変換される
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// 不正なリクエストパラメータ (400)
    pub fn invalid_argument<M: Into<String>>(message: M) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// 記事が見つからない (404)
    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    /// 予期しない内部エラー (500)
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// 読み取りAPIハンドラーの共有状態
pub struct AppState {
    pub cache: ArchiveCache,
    pub store: ArchiveStore,
}

/// 一覧エンドポイントのページネーションパラメータ
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// 一覧エンドポイントのレスポンス
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePage {
    pub articles: Vec<ArticleSummary>,
    pub total: usize,
    pub has_more: bool,
}

// 一覧スナップショットからページレスポンスを組み立てる
// offsetが全体件数を超えていても空ページを返す（エラーにしない）
fn build_page(all: &[ArticleSummary], limit: usize, offset: usize) -> ArticlePage {
    let total = all.len();
    let start = offset.min(total);
    let end = offset.saturating_add(limit).min(total);

    ArticlePage {
        articles: all[start..end].to_vec(),
        total,
        has_more: offset.saturating_add(limit) < total,
    }
}

/// GET /articles - ページネーション付きの記事一覧（contentを除く）
async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ArticlePage>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = query.offset.unwrap_or(0);

    if limit < 0 || offset < 0 {
        return Err(ApiError::invalid_argument(
            "limitとoffsetは0以上で指定してください",
        ));
    }

    let all = state.cache.get_all();
    Ok(Json(build_page(&all, limit as usize, offset as usize)))
}

/// GET /articles/{id} - 全文込みの単一記事取得
/// contentはキャッシュに含まれないため、ストアを直接参照する
async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<String>,
) -> Result<Json<Article>, ApiError> {
    match state.store.find(&article_id) {
        Ok(Some(article)) => Ok(Json(article)),
        Ok(None) => Err(ApiError::not_found("Article not found")),
        Err(e) => {
            // 詳細はサーバー側のログにのみ残し、レスポンスには一般的なメッセージだけを返す
            eprintln!("記事の読み込みに失敗: {} - {}", article_id, e);
            Err(ApiError::internal("Failed to read article"))
        }
    }
}

/// 読み取りAPIのルーターを構築する
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/articles", get(list_articles))
        .route("/articles/{id}", get(get_article))
        .with_state(state)
}

/// # 概要
/// 読み取りAPIサーバーを起動する。
///
/// 一覧はTTL付きキャッシュ経由、単一記事はストア直接参照で提供される。
pub async fn serve(store: ArchiveStore, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        cache: ArchiveCache::new(store.clone()),
        store,
    });
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("アドレスのバインドに失敗: {}", addr))?;
    println!("読み取りAPIサーバーを起動しました: http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("サーバーの実行に失敗")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;
    use tempfile::TempDir;

    // テスト用の軽量記事を作成するヘルパー関数
    fn summary(id: &str) -> ArticleSummary {
        ArticleSummary {
            id: id.to_string(),
            title: format!("記事 {}", id),
            created_at: Utc::now(),
            tags: vec![],
            url: format!("https://medium.com/p/{}", id),
            word_count: None,
            reading_time: None,
        }
    }

    // 指定件数の記事をストアに保存してハンドラー用の状態を作るヘルパー関数
    fn seed_state(dir: &TempDir, count: usize) -> Arc<AppState> {
        let store = ArchiveStore::new(dir.path());
        let base = Utc::now();
        for i in 0..count {
            let article = Article {
                id: format!("a{}", i),
                title: format!("記事 {}", i),
                created_at: base - ChronoDuration::minutes(i as i64),
                tags: vec![],
                url: format!("https://medium.com/p/a{}", i),
                content: format!("本文 {}", i),
                word_count: None,
                reading_time: None,
            };
            store.save(&article).unwrap();
        }

        Arc::new(AppState {
            cache: ArchiveCache::with_ttl(store.clone(), Duration::ZERO),
            store,
        })
    }

    mod pagination_tests {
        use super::*;

        #[test]
        fn test_build_page_slices() {
            let all: Vec<ArticleSummary> = (0..5).map(|i| summary(&format!("a{}", i))).collect();

            // 先頭ページ
            let page = build_page(&all, 2, 0);
            assert_eq!(page.total, 5);
            assert_eq!(page.articles.len(), 2);
            assert_eq!(page.articles[0].id, "a0");
            assert!(page.has_more);

            // 中間ページ
            let page = build_page(&all, 2, 2);
            assert_eq!(page.articles[0].id, "a2");
            assert!(page.has_more);

            // 最終ページ（端数）
            let page = build_page(&all, 2, 4);
            assert_eq!(page.articles.len(), 1);
            assert!(!page.has_more, "最終ページでhasMoreが立っています");

            // ちょうど末尾で終わるページ
            let page = build_page(&all, 5, 0);
            assert_eq!(page.articles.len(), 5);
            assert!(!page.has_more);

            println!("✅ ページ分割テスト成功");
        }

        #[test]
        fn test_build_page_out_of_range() {
            let all: Vec<ArticleSummary> = (0..3).map(|i| summary(&format!("a{}", i))).collect();

            // offsetが全体件数を超えても空ページが返る
            let page = build_page(&all, 20, 10);
            assert_eq!(page.articles.len(), 0);
            assert_eq!(page.total, 3);
            assert!(!page.has_more);

            // limit 0も有効（件数確認用）
            let page = build_page(&all, 0, 0);
            assert_eq!(page.articles.len(), 0);
            assert_eq!(page.total, 3);
            assert!(page.has_more);

            // 空の一覧
            let page = build_page(&[], 20, 0);
            assert_eq!(page.total, 0);
            assert!(!page.has_more);

            println!("✅ 範囲外ページテスト成功");
        }
    }

    mod handler_tests {
        use super::*;
        use crate::app::sync::execute_sync;
        use crate::infra::api::medium::{MockMediumApi, Pacing};

        #[tokio::test]
        async fn test_sync_then_list_end_to_end() {
            let dir = TempDir::new().unwrap();
            let store = ArchiveStore::new(dir.path());

            // 同期で2件保存してから、読み取りAPIで一覧・全文を取得する
            let api = MockMediumApi::new("u1", vec![vec!["a", "b"]]);
            let report = execute_sync(api, &store, "testuser", Pacing::none())
                .await
                .unwrap();
            assert_eq!(report.saved, 2);

            let state = Arc::new(AppState {
                cache: ArchiveCache::with_ttl(store.clone(), Duration::ZERO),
                store,
            });

            let query = PageQuery {
                limit: Some(20),
                offset: Some(0),
            };
            let page = list_articles(State(Arc::clone(&state)), Query(query))
                .await
                .unwrap()
                .0;
            assert_eq!(page.total, 2);
            assert_eq!(page.articles.len(), 2);
            assert!(!page.has_more);

            let article = get_article(State(state), Path("a".to_string()))
                .await
                .unwrap()
                .0;
            assert!(article.content.contains("モック本文"), "全文が取得できません");

            println!("✅ 同期から読み取りまでの一気通貫テスト成功");
        }

        #[tokio::test]
        async fn test_list_articles_default_limit() {
            let dir = TempDir::new().unwrap();
            let state = seed_state(&dir, 25);

            let query = PageQuery {
                limit: None,
                offset: None,
            };
            let page = list_articles(State(state), Query(query)).await.unwrap().0;

            assert_eq!(page.articles.len(), 20, "既定のlimitは20件");
            assert_eq!(page.total, 25);
            assert!(page.has_more);

            println!("✅ 既定ページネーションテスト成功");
        }

        #[tokio::test]
        async fn test_list_articles_rejects_negative_params() {
            let dir = TempDir::new().unwrap();
            let state = seed_state(&dir, 3);

            let query = PageQuery {
                limit: Some(-1),
                offset: Some(0),
            };
            let error = list_articles(State(Arc::clone(&state)), Query(query))
                .await
                .unwrap_err();
            assert_eq!(error.status, StatusCode::BAD_REQUEST);

            let query = PageQuery {
                limit: Some(10),
                offset: Some(-5),
            };
            let error = list_articles(State(state), Query(query)).await.unwrap_err();
            assert_eq!(error.status, StatusCode::BAD_REQUEST);

            println!("✅ 負のパラメータ拒否テスト成功");
        }

        #[tokio::test]
        async fn test_list_articles_offset_beyond_total() {
            let dir = TempDir::new().unwrap();
            let state = seed_state(&dir, 2);

            let query = PageQuery {
                limit: Some(20),
                offset: Some(100),
            };
            let page = list_articles(State(state), Query(query)).await.unwrap().0;

            assert_eq!(page.articles.len(), 0);
            assert_eq!(page.total, 2);
            assert!(!page.has_more);

            println!("✅ 範囲外offsetハンドリングテスト成功");
        }

        #[tokio::test]
        async fn test_get_article_found() {
            let dir = TempDir::new().unwrap();
            let state = seed_state(&dir, 3);

            let article = get_article(State(state), Path("a1".to_string()))
                .await
                .unwrap()
                .0;

            assert_eq!(article.id, "a1");
            assert_eq!(article.content, "本文 1", "全文が含まれるべき");

            println!("✅ 単一記事取得テスト成功");
        }

        #[tokio::test]
        async fn test_get_article_not_found() {
            let dir = TempDir::new().unwrap();
            let state = seed_state(&dir, 1);

            let error = get_article(State(state), Path("missing".to_string()))
                .await
                .unwrap_err();
            assert_eq!(error.status, StatusCode::NOT_FOUND);

            println!("✅ 記事不在404テスト成功");
        }

        #[tokio::test]
        async fn test_get_article_corrupt_file_is_500() {
            let dir = TempDir::new().unwrap();
            let state = seed_state(&dir, 1);

            // 壊れた記事ファイルを直接作る
            let shard = state.store.writable_shard().unwrap();
            std::fs::write(shard.join("broken.json"), "{ 壊れたJSON").unwrap();

            let error = get_article(State(state), Path("broken".to_string()))
                .await
                .unwrap_err();
            assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);

            println!("✅ 読み込み失敗500テスト成功");
        }
    }
}
