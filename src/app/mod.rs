//! アプリケーションモジュール
//!
//! 同期ワークフロー・一覧キャッシュ・読み取りAPIサーバーを提供します。

pub mod cache;
pub mod server;
pub mod sync;
