use crate::types::ConfigError;
use thiserror::Error;

/// 同期実行全体を中断させるエラー型
/// 記事単位の取得・保存エラーはここには含めない（ログに残して処理を継続する）
#[derive(Error, Debug)]
pub enum SyncError {
    /// 設定エラー（リモート呼び出し前に中断）
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// ユーザーIDの解決に失敗
    #[error("ユーザーIDが見つかりません: {username}")]
    UserNotFound { username: String },

    /// 記事が1件も取得できなかった（正常な「空」ではなく異常として扱う）
    #[error("記事が1件も見つかりませんでした (ユーザーID: {user_id})")]
    EmptyCatalog { user_id: String },

    /// その他の実行時エラー
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 同期エラーのResult型エイリアス
pub type SyncResult<T> = std::result::Result<T, SyncError>;
