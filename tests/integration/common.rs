use doc_ferry::store::{DocumentStore, Record, SqliteStore};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A SQLite store file inside a temporary directory
pub struct TempStore {
    _dir: TempDir,
    pub path: PathBuf,
}

impl TempStore {
    pub fn new(name: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        Self { _dir: dir, path }
    }

    pub fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    pub fn open(&self) -> SqliteStore {
        SqliteStore::open(&self.path).unwrap()
    }

    /// Writes `records` and makes them visible
    pub async fn seed(&self, records: &[Record]) {
        self.open().update(records).await.unwrap();
    }
}

/// `count` user records with sequential ids
pub fn users(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::new(format!("user-{:03}", i))
                .with_field("screen_name", format!("name{}", i))
                .with_field("followers", i as u64)
        })
        .collect()
}

pub async fn visible_count(path: &Path) -> u64 {
    SqliteStore::open(path)
        .unwrap()
        .query(&doc_ferry::Query::match_all(), 0, 1)
        .await
        .unwrap()
        .total_hits
}
