use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// アーカイブ記事エンティティ（1記事 = 1 JSONファイル）
// ディスク上の表現と読み取りAPIのレスポンスを兼ねるため、フィールド名はcamelCase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub url: String,
    pub content: String,
    pub word_count: Option<u32>,
    pub reading_time: Option<u32>,
}

// 一覧表示用の軽量記事エンティティ（contentを除外、それ以外は同一）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub url: String,
    pub word_count: Option<u32>,
    pub reading_time: Option<u32>,
}

impl Article {
    /// contentを除いた一覧用の軽量表現を作成
    pub fn to_summary(&self) -> ArticleSummary {
        ArticleSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            tags: self.tags.clone(),
            url: self.url.clone(),
            word_count: self.word_count,
            reading_time: self.reading_time,
        }
    }
}
