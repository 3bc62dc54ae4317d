use crate::domain::article::Article;
use crate::types::{StorageError, StorageResult};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// 1シャードに保存できる記事ファイルの上限数
pub const SHARD_CAPACITY: usize = 900;

// シャードディレクトリ名の接頭辞（連番は1始まり）
const SHARD_PREFIX: &str = "medium_archive_";

/// # 概要
/// シャード分割されたアーカイブの永続化ストア。
///
/// 記事は `medium_archive_{n}` ディレクトリに `{id}.json` として1記事1ファイルで
/// 保存される。各シャードは上限件数に達すると閉じられ、以降の書き込みは次の連番の
/// シャードに行われる。シャードの統合・再配置は行わない。
///
/// ## 不変条件
/// - 記事IDは全シャードを通して一意（重複チェックは保存前の`exists`で行う）
/// - シャード番号は1から連番で確保される（欠番なし）
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
    capacity: usize,
}

impl ArchiveStore {
    /// 既定のシャード容量でストアを作成
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self::with_capacity(root, SHARD_CAPACITY)
    }

    /// シャード容量を指定してストアを作成
    pub fn with_capacity<P: Into<PathBuf>>(root: P, capacity: usize) -> Self {
        Self {
            root: root.into(),
            capacity,
        }
    }

    // 指定番号のシャードディレクトリのパスを作成
    fn shard_path(&self, num: u32) -> PathBuf {
        self.root.join(format!("{}{}", SHARD_PREFIX, num))
    }

    // シャード内の記事ファイル数を数える
    fn count_articles(dir: &Path) -> StorageResult<usize> {
        let entries = fs::read_dir(dir)
            .map_err(|e| StorageError::file_system(dir.display().to_string(), e))?;

        let mut count = 0;
        for entry in entries {
            let entry =
                entry.map_err(|e| StorageError::file_system(dir.display().to_string(), e))?;
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }

    /// # 概要
    /// 書き込み可能な最小番号のシャードを返す。
    ///
    /// 既存シャードを番号順に走査し、空きのある最初のシャードを返す。
    /// 全て満杯（または1つも存在しない）の場合は新しいシャードを作成する。
    /// 満杯のシャードを返すことはない。
    pub fn writable_shard(&self) -> StorageResult<PathBuf> {
        let mut num = 1;
        loop {
            let dir = self.shard_path(num);

            if !dir.exists() {
                fs::create_dir_all(&dir)
                    .map_err(|e| StorageError::file_system(dir.display().to_string(), e))?;
                return Ok(dir);
            }

            if Self::count_articles(&dir)? < self.capacity {
                return Ok(dir);
            }

            num += 1;
        }
    }

    /// 指定IDの記事がいずれかのシャードに存在するかを確認する。
    /// シャードは連番で確保されるため、存在しない番号に達した時点で走査を打ち切る。
    pub fn exists(&self, article_id: &str) -> bool {
        let mut num = 1;
        loop {
            let dir = self.shard_path(num);
            if !dir.exists() {
                return false;
            }
            if dir.join(format!("{}.json", article_id)).exists() {
                return true;
            }
            num += 1;
        }
    }

    /// # 概要
    /// 記事を書き込み可能なシャードに保存する。
    ///
    /// 一時ファイルへ書き込んだ後にリネームすることで、部分的な書き込みが
    /// 記事ファイルとして観測されないようにする。保存先のシャードパスを返す。
    pub fn save(&self, article: &Article) -> StorageResult<PathBuf> {
        let shard = self.writable_shard()?;

        let json = serde_json::to_string_pretty(article).map_err(|e| {
            StorageError::serialization(format!("記事のシリアライズ: {}", article.id), e)
        })?;

        let tmp_path = shard.join(format!("{}.json.tmp", article.id));
        let final_path = shard.join(format!("{}.json", article.id));

        fs::write(&tmp_path, json)
            .map_err(|e| StorageError::file_system(tmp_path.display().to_string(), e))?;
        fs::rename(&tmp_path, &final_path)
            .map_err(|e| StorageError::file_system(final_path.display().to_string(), e))?;

        Ok(shard)
    }

    /// 指定IDの記事を全文込みで読み込む（単一記事取得用）。
    /// 見つからない場合は`Ok(None)`、ファイルが壊れている場合はエラーを返す。
    pub fn find(&self, article_id: &str) -> StorageResult<Option<Article>> {
        let mut num = 1;
        loop {
            let dir = self.shard_path(num);
            if !dir.exists() {
                return Ok(None);
            }

            let path = dir.join(format!("{}.json", article_id));
            if path.exists() {
                return read_article(&path).map(Some);
            }

            num += 1;
        }
    }

    // 現在存在するシャードディレクトリを番号順に列挙する
    fn shard_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        let mut num = 1;
        loop {
            let dir = self.shard_path(num);
            if !dir.exists() {
                return dirs;
            }
            dirs.push(dir);
            num += 1;
        }
    }

    /// 全シャードの全記事を遅延的に列挙するイテレータを作成する。
    /// 順序は未定義。壊れた記事ファイルは警告を出してスキップする（致命的にしない）。
    /// 再度呼び出すとディスクを再走査する。
    pub fn iter_all(&self) -> ArticleIter {
        ArticleIter {
            dirs: self.shard_dirs().into(),
            entries: None,
        }
    }
}

/// 全シャードを横断する記事イテレータ
pub struct ArticleIter {
    dirs: VecDeque<PathBuf>,
    entries: Option<fs::ReadDir>,
}

impl Iterator for ArticleIter {
    type Item = Article;

    fn next(&mut self) -> Option<Article> {
        loop {
            if let Some(entries) = self.entries.as_mut() {
                for entry in entries.by_ref() {
                    let Ok(entry) = entry else { continue };
                    let path = entry.path();
                    if !path.extension().is_some_and(|ext| ext == "json") {
                        continue;
                    }
                    match read_article(&path) {
                        Ok(article) => return Some(article),
                        Err(e) => {
                            eprintln!("警告: 記事ファイルをスキップします: {}", e);
                        }
                    }
                }
                self.entries = None;
            }

            let dir = self.dirs.pop_front()?;
            match fs::read_dir(&dir) {
                Ok(rd) => self.entries = Some(rd),
                Err(e) => {
                    eprintln!("警告: シャードの読み込みに失敗: {} - {}", dir.display(), e);
                }
            }
        }
    }
}

// 記事ファイルを1件読み込む
fn read_article(path: &Path) -> StorageResult<Article> {
    let file =
        File::open(path).map_err(|e| StorageError::file_system(path.display().to_string(), e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| StorageError::serialization(path.display().to_string(), e))
}
