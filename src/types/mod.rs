//! 型定義モジュール
//!
//! アプリケーション全体で使用される共通的な型定義を管理します。
//! - 設定エラー型: 環境変数の前提条件チェック
//! - ストレージエラー型: シャードディレクトリのI/O
//! - 同期エラー型: 同期実行を中断させる致命的エラー

pub mod config;
pub mod infra;
pub mod sync;

// 便利な再エクスポート
pub use config::{ConfigError, ConfigResult};
pub use infra::{StorageError, StorageResult};
pub use sync::{SyncError, SyncResult};
