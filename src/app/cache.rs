use crate::domain::article::ArticleSummary;
use crate::infra::storage::shard::ArchiveStore;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 一覧キャッシュの有効期間
pub const CACHE_TTL: Duration = Duration::from_secs(60);

// 計算済みのスナップショットとその計算時刻
struct Snapshot {
    articles: Arc<Vec<ArticleSummary>>,
    refreshed_at: Instant,
}

/// # 概要
/// 読み取り側の一覧キャッシュ。
///
/// 全シャードの記事メタデータ（contentを除く）を新しい順に並べた
/// スナップショットを1つだけ保持し、TTLが切れたときに全件再計算する。
/// 部分的な更新は行わない。同期実行からの明示的な無効化もない
/// （書き込みはTTL以内に一覧へ反映される）。
///
/// ## 並行性
/// 再計算は書き込みロックで直列化される。再計算中に到着した読み取りは
/// ロックの解放を待つ。作りかけのスナップショットが観測されることはない。
pub struct ArchiveCache {
    store: ArchiveStore,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl ArchiveCache {
    /// 既定のTTLでキャッシュを作成
    pub fn new(store: ArchiveStore) -> Self {
        Self::with_ttl(store, CACHE_TTL)
    }

    /// TTLを指定してキャッシュを作成
    pub fn with_ttl(store: ArchiveStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    /// 全記事のメタデータを新しい順で取得する。
    /// スナップショットが未計算またはTTL超過の場合のみ再計算する。
    pub fn get_all(&self) -> Arc<Vec<ArticleSummary>> {
        // 有効なスナップショットがあれば読み取りロックだけで返す
        {
            let guard = self.snapshot.read();
            if let Some(snap) = guard.as_ref() {
                if snap.refreshed_at.elapsed() < self.ttl {
                    return Arc::clone(&snap.articles);
                }
            }
        }

        self.refresh()
    }

    // スナップショットを全件再計算する（書き込みロックで直列化）
    fn refresh(&self) -> Arc<Vec<ArticleSummary>> {
        let mut guard = self.snapshot.write();

        // ロック待ちの間に他のリクエストが再計算を終えていれば、それをそのまま使う
        if let Some(snap) = guard.as_ref() {
            if snap.refreshed_at.elapsed() < self.ttl {
                return Arc::clone(&snap.articles);
            }
        }

        let mut articles: Vec<ArticleSummary> =
            self.store.iter_all().map(|a| a.to_summary()).collect();
        // 新しい順に並べる。同時刻の記事の順序は1回の計算内では安定
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let articles = Arc::new(articles);
        *guard = Some(Snapshot {
            articles: Arc::clone(&articles),
            refreshed_at: Instant::now(),
        });

        articles
    }
}
