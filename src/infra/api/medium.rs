//! Medium API クライアントモジュール
//!
//! このモジュールは、RapidAPI経由のMedium API（medium2）へのアクセスを提供し、
//! テスト時のモック化を容易にするトレイトベースのインターフェースを提供します。
//! ページネーション走査・リトライ・呼び出し回数の記録もここで行います。

use crate::domain::article::Article;
use crate::types::{SyncError, SyncResult};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;

/// Medium APIのベースURL（RapidAPI経由）
pub const MEDIUM_API_BASE_URL: &str = "https://medium2.p.rapidapi.com";

// RapidAPIのホストヘッダー値
const RAPIDAPI_HOST: &str = "medium2.p.rapidapi.com";

// 1リクエストあたりのタイムアウト（秒）
const REQUEST_TIMEOUT_SECS: u64 = 30;

// 同じカーソルに対する一覧取得のリトライ上限
const MAX_LIST_RETRIES: usize = 3;

/// 記事ID一覧エンドポイントの1ページ分のレスポンス
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleIdBatch {
    /// このページに含まれる記事ID
    #[serde(rename = "associated_articles", default)]
    pub ids: Vec<String>,
    /// 次ページのカーソルトークン（最終ページでは欠落または空文字）
    #[serde(default)]
    pub next: Option<String>,
}

/// 記事メタデータエンドポイントのレスポンス
/// 使用しないフィールド（claps等）はデシリアライズ時に無視される
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleInfo {
    pub title: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub url: String,
    #[serde(default)]
    pub word_count: Option<u32>,
    #[serde(default)]
    pub reading_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UserIdResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarkdownResponse {
    markdown: String,
}

/// Medium APIの抽象化トレイト
///
/// このトレイトは、実際のHTTP通信とモック実装の両方を
/// 統一的に扱えるようにするためのインターフェースです。
#[async_trait]
pub trait MediumApi {
    /// ユーザー名からユーザーIDを取得する。存在しないユーザーは`Ok(None)`
    async fn fetch_user_id(&self, username: &str) -> Result<Option<String>>;

    /// 記事ID一覧の1ページ分を取得する
    ///
    /// # Arguments
    /// * `user_id` - 対象ユーザーのID
    /// * `next` - 前ページが返したカーソルトークン（先頭ページはNone）
    async fn fetch_article_ids(&self, user_id: &str, next: Option<&str>)
        -> Result<ArticleIdBatch>;

    /// 記事のメタデータを取得する
    async fn fetch_article_info(&self, article_id: &str) -> Result<ArticleInfo>;

    /// 記事のmarkdown本文を取得する
    async fn fetch_article_markdown(&self, article_id: &str) -> Result<String>;
}

/// `reqwest` を使用した本番用のMedium APIクライアント実装
pub struct ReqwestMediumApi {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ReqwestMediumApi {
    /// 新しいAPIクライアントを作成
    pub fn new<K: Into<String>>(api_key: K) -> Self {
        Self::with_base_url(api_key, MEDIUM_API_BASE_URL)
    }

    /// ベースURLを指定してAPIクライアントを作成（httpmockを使うテスト用途）
    pub fn with_base_url<K: Into<String>, U: Into<String>>(api_key: K, base_url: U) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    // 認証ヘッダー付きのGETリクエストを組み立てる
    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", RAPIDAPI_HOST)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }
}

#[async_trait]
impl MediumApi for ReqwestMediumApi {
    async fn fetch_user_id(&self, username: &str) -> Result<Option<String>> {
        let response = self
            .get(&format!("/user/id_for/{}", username))
            .send()
            .await
            .context(format!("ユーザーIDリクエストの送信に失敗: {}", username))?
            .error_for_status()
            .context(format!("ユーザーIDリクエストが失敗: {}", username))?;

        let body: UserIdResponse = response
            .json()
            .await
            .context("ユーザーIDレスポンスの解析に失敗")?;
        Ok(body.id)
    }

    async fn fetch_article_ids(
        &self,
        user_id: &str,
        next: Option<&str>,
    ) -> Result<ArticleIdBatch> {
        let path = match next {
            Some(token) => format!("/user/{}/articles?next={}", user_id, token),
            None => format!("/user/{}/articles", user_id),
        };

        let response = self
            .get(&path)
            .send()
            .await
            .context(format!("記事一覧リクエストの送信に失敗: {}", path))?
            .error_for_status()
            .context(format!("記事一覧リクエストが失敗: {}", path))?;

        response
            .json()
            .await
            .context("記事一覧レスポンスの解析に失敗")
    }

    async fn fetch_article_info(&self, article_id: &str) -> Result<ArticleInfo> {
        let response = self
            .get(&format!("/article/{}", article_id))
            .send()
            .await
            .context(format!("記事メタデータリクエストの送信に失敗: {}", article_id))?
            .error_for_status()
            .context(format!("記事メタデータリクエストが失敗: {}", article_id))?;

        response
            .json()
            .await
            .context("記事メタデータレスポンスの解析に失敗")
    }

    async fn fetch_article_markdown(&self, article_id: &str) -> Result<String> {
        let response = self
            .get(&format!("/article/{}/markdown", article_id))
            .send()
            .await
            .context(format!("記事本文リクエストの送信に失敗: {}", article_id))?
            .error_for_status()
            .context(format!("記事本文リクエストが失敗: {}", article_id))?;

        let body: MarkdownResponse = response
            .json()
            .await
            .context("記事本文レスポンスの解析に失敗")?;
        Ok(body.markdown)
    }
}

/// テスト用のモックMedium APIクライアント
///
/// この実装はテスト時にDIされ、実際のHTTPリクエストを行わずに
/// 定義済みのレスポンスやエラーを返します。記事のメタデータと本文は
/// IDから機械的に生成されます。
pub struct MockMediumApi {
    /// 返すユーザーID（Noneで「ユーザーが存在しない」を再現）
    pub user_id: Option<String>,
    /// 記事ID一覧のページ（next トークンで連結済み）
    pub pages: Vec<ArticleIdBatch>,
    /// 取得が失敗するページ番号（0始まり）
    pub failing_pages: HashSet<usize>,
    /// 取得が失敗する記事ID
    pub failing_articles: HashSet<String>,
}

impl MockMediumApi {
    /// 指定したIDページを返すモッククライアントを作成
    /// ページ間のnextトークンは自動で連結される
    pub fn new(user_id: &str, id_pages: Vec<Vec<&str>>) -> Self {
        let total = id_pages.len();
        let pages = id_pages
            .into_iter()
            .enumerate()
            .map(|(i, ids)| ArticleIdBatch {
                ids: ids.into_iter().map(String::from).collect(),
                next: if i + 1 < total {
                    Some((i + 1).to_string())
                } else {
                    None
                },
            })
            .collect();

        Self {
            user_id: Some(user_id.to_string()),
            pages,
            failing_pages: HashSet::new(),
            failing_articles: HashSet::new(),
        }
    }

    /// ユーザーが存在しない状態のモッククライアントを作成
    pub fn new_missing_user() -> Self {
        Self {
            user_id: None,
            pages: Vec::new(),
            failing_pages: HashSet::new(),
            failing_articles: HashSet::new(),
        }
    }
}

#[async_trait]
impl MediumApi for MockMediumApi {
    async fn fetch_user_id(&self, _username: &str) -> Result<Option<String>> {
        Ok(self.user_id.clone())
    }

    async fn fetch_article_ids(
        &self,
        _user_id: &str,
        next: Option<&str>,
    ) -> Result<ArticleIdBatch> {
        let index: usize = match next {
            None => 0,
            Some(token) => token.parse().context("モックカーソルの解析に失敗")?,
        };

        if self.failing_pages.contains(&index) {
            return Err(anyhow!("モック一覧エラー: ページ{}", index));
        }

        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("存在しないモックページ: {}", index))
    }

    async fn fetch_article_info(&self, article_id: &str) -> Result<ArticleInfo> {
        if self.failing_articles.contains(article_id) {
            return Err(anyhow!("モックメタデータエラー: {}", article_id));
        }

        Ok(ArticleInfo {
            title: format!("モック記事 {}", article_id),
            published_at: Some("2025-01-15 10:00:00".to_string()),
            tags: vec!["mock".to_string()],
            url: format!("https://medium.com/p/{}", article_id),
            word_count: Some(100),
            reading_time: Some(1.5),
        })
    }

    async fn fetch_article_markdown(&self, article_id: &str) -> Result<String> {
        if self.failing_articles.contains(article_id) {
            return Err(anyhow!("モック本文エラー: {}", article_id));
        }
        Ok(format!("# {}\n\nモック本文です。", article_id))
    }
}

/// API呼び出し回数の記録（種類別）
/// プロセス開始以降リセットされず、実行レポートにそのまま使われる
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiStats {
    pub get_user_id: usize,
    pub get_article_list: usize,
    pub get_article_info: usize,
    pub get_article_markdown: usize,
}

impl ApiStats {
    /// 全種類の合計呼び出し回数
    pub fn total(&self) -> usize {
        self.get_user_id + self.get_article_list + self.get_article_info + self.get_article_markdown
    }
}

/// リモートAPIのレート制限を尊重するための待機設定
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// 一覧ページ間の待機
    pub page_delay: Duration,
    /// 記事取得間の待機
    pub article_delay: Duration,
    /// 失敗後の長めの待機
    pub error_backoff: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_secs(2),
            article_delay: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
        }
    }
}

impl Pacing {
    /// 待機なしの設定を作成（テスト用途）
    pub fn none() -> Self {
        Self {
            page_delay: Duration::ZERO,
            article_delay: Duration::ZERO,
            error_backoff: Duration::ZERO,
        }
    }
}

// 一覧ページネーションの進行状態
// 停止条件（カーソル枯渇・リトライ上限）をブールの組み合わせではなく1つの状態で表す
enum PageState {
    Continue(Option<String>),
    Exhausted,
    GaveUp,
}

/// # 概要
/// リモートのMedium APIをまとめて扱うカタログクライアント。
///
/// ## 動作
/// - ユーザーIDの解決
/// - 記事ID一覧のページネーション走査（リトライ・重複排除込み）
/// - 記事メタデータ + 本文の並行取得と合成
/// - 全呼び出しの種類別回数の記録
pub struct MediumCatalog<A: MediumApi> {
    api: A,
    pacing: Pacing,
    stats: ApiStats,
}

impl<A: MediumApi> MediumCatalog<A> {
    /// 新しいカタログクライアントを作成
    pub fn new(api: A, pacing: Pacing) -> Self {
        Self {
            api,
            pacing,
            stats: ApiStats::default(),
        }
    }

    /// これまでの呼び出し回数を取得
    pub fn stats(&self) -> &ApiStats {
        &self.stats
    }

    /// ユーザー名からユーザーIDを解決する。
    /// リモートがIDを返さない場合は`UserNotFound`で実行を中断させる。
    pub async fn resolve_user_id(&mut self, username: &str) -> SyncResult<String> {
        println!("ユーザーIDを取得中: {}", username);
        self.stats.get_user_id += 1;

        let id = self
            .api
            .fetch_user_id(username)
            .await
            .context(format!("ユーザーIDの取得に失敗: {}", username))?;

        match id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(SyncError::UserNotFound {
                username: username.to_string(),
            }),
        }
    }

    /// # 概要
    /// 記事ID一覧をページネーションを辿って全件取得する。
    ///
    /// ## 動作
    /// - カーソルが尽きるまでページを順に取得する
    /// - リモートが同じIDを複数ページで返しても、一覧順を保ったまま重複排除する
    /// - ページ取得に失敗した場合は同じカーソルをリトライし、上限に達したら
    ///   それまでに集めたIDを返す（部分的な一覧は正常な結果として扱う）
    pub async fn list_all_article_ids(&mut self, user_id: &str) -> Vec<String> {
        println!("記事ID一覧を取得中 (ユーザーID: {})", user_id);

        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut retries = 0;
        let mut state = PageState::Continue(None);

        while let PageState::Continue(cursor) = state {
            self.stats.get_article_list += 1;
            match self.api.fetch_article_ids(user_id, cursor.as_deref()).await {
                Ok(batch) => {
                    retries = 0;
                    println!(
                        "  {}件のIDを取得 (API呼び出し累計: {})",
                        batch.ids.len(),
                        self.stats.total()
                    );

                    for id in batch.ids {
                        if seen.insert(id.clone()) {
                            ids.push(id);
                        }
                    }

                    state = match batch.next.filter(|token| !token.is_empty()) {
                        Some(next) => {
                            sleep(self.pacing.page_delay).await;
                            PageState::Continue(Some(next))
                        }
                        None => PageState::Exhausted,
                    };
                }
                Err(e) => {
                    eprintln!("  一覧ページの取得に失敗: {}", e);
                    retries += 1;
                    if retries >= MAX_LIST_RETRIES {
                        state = PageState::GaveUp;
                    } else {
                        sleep(self.pacing.error_backoff).await;
                        state = PageState::Continue(cursor);
                    }
                }
            }
        }

        if let PageState::GaveUp = state {
            eprintln!(
                "リトライ上限に達したため、取得済みの{}件で一覧を打ち切ります",
                ids.len()
            );
        }

        println!("記事ID合計: {}件", ids.len());
        ids
    }

    /// # 概要
    /// 記事のメタデータと本文を並行取得し、1つのArticleに合成する。
    /// どちらかの取得に失敗した場合はエラーを返す（内部でのリトライは行わない）。
    pub async fn fetch_article(&mut self, article_id: &str) -> Result<Article> {
        self.stats.get_article_info += 1;
        self.stats.get_article_markdown += 1;

        let (info, markdown) = tokio::try_join!(
            self.api.fetch_article_info(article_id),
            self.api.fetch_article_markdown(article_id),
        )
        .with_context(|| format!("記事データの取得に失敗: {}", article_id))?;

        compose_article(article_id, info, markdown)
    }
}

// リモートのメタデータと本文から保存用のArticleを合成する
// published_atが欠落・解析不能な記事は保存しない（一覧のソートキーになるため）
fn compose_article(article_id: &str, info: ArticleInfo, markdown: String) -> Result<Article> {
    let published = info
        .published_at
        .as_deref()
        .ok_or_else(|| anyhow!("published_atがありません: {}", article_id))?;

    let created_at = dateparser::parse(published)
        .with_context(|| format!("published_atの解析に失敗: {}", published))?;

    Ok(Article {
        id: article_id.to_string(),
        title: info.title,
        created_at,
        tags: info.tags,
        url: info.url,
        content: markdown,
        word_count: info.word_count,
        reading_time: info.reading_time.map(|minutes| minutes.round() as u32),
    })
}
