//! Key-value record store consumed by the coordinator.
//!
//! Records are JSON values grouped by [`Namespace`] and keyed by id. The
//! coordinator only needs `get`, `get_all` and `put`; conflicting writes to the
//! same key are last-write-wins.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::types::GameKind;

const FILE_FORMAT_VERSION: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Agents,
    ApiKeys,
    LastMove,
    Sessions(GameKind),
}

impl Namespace {
    pub const ALL: [Namespace; 6] = [
        Namespace::Agents,
        Namespace::ApiKeys,
        Namespace::LastMove,
        Namespace::Sessions(GameKind::Guessing),
        Namespace::Sessions(GameKind::Battleship),
        Namespace::Sessions(GameKind::Maze),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agents => "agents",
            Self::ApiKeys => "api_keys",
            Self::LastMove => "last_move",
            Self::Sessions(GameKind::Guessing) => "sessions.guessing",
            Self::Sessions(GameKind::Battleship) => "sessions.battleship",
            Self::Sessions(GameKind::Maze) => "sessions.maze",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ns| ns.as_str() == raw)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("store file {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported store file version {version} at {path}")]
    UnsupportedVersion { path: PathBuf, version: u8 },

    #[error("record {namespace}/{id} could not be (de)serialized: {source}")]
    Corrupt {
        namespace: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, namespace: Namespace, id: &str) -> Result<Option<Value>, StoreError>;

    async fn get_all(&self, namespace: Namespace) -> Result<Vec<Value>, StoreError>;

    async fn put(&self, namespace: Namespace, id: &str, record: Value) -> Result<(), StoreError>;
}

pub async fn fetch<T: DeserializeOwned>(
    store: &dyn RecordStore,
    namespace: Namespace,
    id: &str,
) -> Result<Option<T>, StoreError> {
    let Some(value) = store.get(namespace, id).await? else {
        return Ok(None);
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            namespace: namespace.as_str(),
            id: id.to_string(),
            source,
        })
}

/// Every record of a namespace. Records that no longer deserialize are
/// skipped with a warning so one bad entry cannot hide the rest.
pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn RecordStore,
    namespace: Namespace,
) -> Result<Vec<T>, StoreError> {
    let values = store.get_all(namespace).await?;
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value(value) {
            Ok(record) => out.push(record),
            Err(error) => {
                warn!(namespace = namespace.as_str(), %error, "skipping unreadable record");
            }
        }
    }
    Ok(out)
}

pub async fn persist<T: Serialize>(
    store: &dyn RecordStore,
    namespace: Namespace,
    id: &str,
    record: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(record).map_err(|source| StoreError::Corrupt {
        namespace: namespace.as_str(),
        id: id.to_string(),
        source,
    })?;
    store.put(namespace, id, value).await
}

type Tables = HashMap<Namespace, BTreeMap<String, Value>>;

/// Process-local store. Each instance is independent, so tests never share
/// state.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, namespace: Namespace, id: &str) -> Result<Option<Value>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.get(&namespace).and_then(|table| table.get(id)).cloned())
    }

    async fn get_all(&self, namespace: Namespace) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&namespace)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn put(&self, namespace: Namespace, id: &str, record: Value) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .entry(namespace)
            .or_default()
            .insert(id.to_string(), record);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u8,
    namespaces: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Store that keeps everything in memory and rewrites one JSON file on every
/// `put`.
pub struct FileStore {
    file_path: PathBuf,
    tables: RwLock<Tables>,
}

impl FileStore {
    pub async fn open(file_path: PathBuf) -> Result<Self, StoreError> {
        let tables = load_tables(&file_path).await?;
        Ok(Self {
            file_path,
            tables: RwLock::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    async fn save(&self, tables: &Tables) -> Result<(), StoreError> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StoreError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let payload = StoreFile {
            version: FILE_FORMAT_VERSION,
            namespaces: tables
                .iter()
                .map(|(ns, table)| (ns.as_str().to_string(), table.clone()))
                .collect(),
        };
        let text = serde_json::to_string_pretty(&payload).map_err(|source| StoreError::Parse {
            path: self.file_path.clone(),
            source,
        })?;
        tokio::fs::write(&self.file_path, text)
            .await
            .map_err(|source| StoreError::Io {
                path: self.file_path.clone(),
                source,
            })
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn get(&self, namespace: Namespace, id: &str) -> Result<Option<Value>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.get(&namespace).and_then(|table| table.get(id)).cloned())
    }

    async fn get_all(&self, namespace: Namespace) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&namespace)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn put(&self, namespace: Namespace, id: &str, record: Value) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        // Memory only takes the write once it is on disk.
        let mut next = tables.clone();
        next.entry(namespace)
            .or_default()
            .insert(id.to_string(), record);
        self.save(&next).await?;
        *tables = next;
        Ok(())
    }
}

async fn load_tables(path: &Path) -> Result<Tables, StoreError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "store file missing, starting empty");
            return Ok(Tables::new());
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let parsed: StoreFile = serde_json::from_str(&text).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if parsed.version != FILE_FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: parsed.version,
        });
    }

    let mut tables = Tables::new();
    for (raw_namespace, records) in parsed.namespaces {
        let Some(namespace) = Namespace::parse(&raw_namespace) else {
            warn!(namespace = %raw_namespace, path = %path.display(), "dropping unknown namespace");
            continue;
        };
        let table = tables.entry(namespace).or_default();
        for (id, record) in records {
            if !record.is_object() && !record.is_number() {
                warn!(namespace = %raw_namespace, %id, "dropping malformed record");
                continue;
            }
            table.insert(id, record);
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        let unique = format!(
            "{}-{}-{}",
            name,
            std::process::id(),
            rand::random::<u32>()
        );
        std::env::temp_dir().join(unique).join("arena.json")
    }

    #[tokio::test]
    async fn memory_store_round_trips_by_namespace() {
        let store = MemoryStore::new();
        store
            .put(Namespace::Agents, "a1", json!({"name": "Alice"}))
            .await
            .expect("put");
        store
            .put(Namespace::Sessions(GameKind::Maze), "a1", json!({"kind": "maze"}))
            .await
            .expect("put");

        let agent = store.get(Namespace::Agents, "a1").await.expect("get");
        assert_eq!(agent, Some(json!({"name": "Alice"})));
        assert_eq!(store.get(Namespace::ApiKeys, "a1").await.expect("get"), None);
        assert_eq!(store.get_all(Namespace::Agents).await.expect("all").len(), 1);
        assert!(store
            .get_all(Namespace::Sessions(GameKind::Guessing))
            .await
            .expect("all")
            .is_empty());
    }

    #[tokio::test]
    async fn put_overwrites_last_write_wins() {
        let store = MemoryStore::new();
        store.put(Namespace::LastMove, "a1", json!(1)).await.expect("put");
        store.put(Namespace::LastMove, "a1", json!(2)).await.expect("put");
        assert_eq!(store.get(Namespace::LastMove, "a1").await.expect("get"), Some(json!(2)));
    }

    #[tokio::test]
    async fn fetch_all_skips_records_of_the_wrong_shape() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Named {
            name: String,
        }

        let store = MemoryStore::new();
        store.put(Namespace::Agents, "ok", json!({"name": "Alice"})).await.expect("put");
        store.put(Namespace::Agents, "bad", json!({"nom": 3})).await.expect("put");

        let all: Vec<Named> = fetch_all(&store, Namespace::Agents).await.expect("fetch");
        assert_eq!(all, vec![Named { name: "Alice".to_string() }]);

        let single: Result<Option<Named>, _> = fetch(&store, Namespace::Agents, "bad").await;
        assert!(matches!(single, Err(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let path = temp_file("arena-store-reopen");
        {
            let store = FileStore::open(path.clone()).await.expect("open");
            store
                .put(Namespace::Agents, "a1", json!({"name": "Alice"}))
                .await
                .expect("put");
            store.put(Namespace::LastMove, "a1", json!(1234)).await.expect("put");
        }

        let reopened = FileStore::open(path.clone()).await.expect("reopen");
        assert_eq!(
            reopened.get(Namespace::Agents, "a1").await.expect("get"),
            Some(json!({"name": "Alice"}))
        );
        assert_eq!(
            reopened.get(Namespace::LastMove, "a1").await.expect("get"),
            Some(json!(1234))
        );

        let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[tokio::test]
    async fn file_store_drops_unknown_namespaces_and_malformed_records() {
        let path = temp_file("arena-store-partial");
        let parent = path.parent().expect("parent").to_path_buf();
        std::fs::create_dir_all(&parent).expect("create dir");
        let raw = r#"{
  "version": 1,
  "namespaces": {
    "agents": {
      "a1": { "name": "Alice" },
      "a2": "not a record"
    },
    "ghosts": {
      "g1": { "name": "Blinky" }
    }
  }
}"#;
        std::fs::write(&path, raw).expect("write file");

        let store = FileStore::open(path.clone()).await.expect("open");
        let agents = store.get_all(Namespace::Agents).await.expect("all");
        assert_eq!(agents, vec![json!({"name": "Alice"})]);

        let _ = std::fs::remove_dir_all(&parent);
    }

    #[tokio::test]
    async fn file_store_refuses_unknown_versions() {
        let path = temp_file("arena-store-version");
        let parent = path.parent().expect("parent").to_path_buf();
        std::fs::create_dir_all(&parent).expect("create dir");
        std::fs::write(&path, r#"{"version": 9, "namespaces": {}}"#).expect("write file");

        let result = FileStore::open(path.clone()).await;
        assert!(matches!(
            result,
            Err(StoreError::UnsupportedVersion { version: 9, .. })
        ));

        let _ = std::fs::remove_dir_all(&parent);
    }

    #[tokio::test]
    async fn file_store_forgets_a_write_that_never_reached_disk() {
        let path = temp_file("arena-store-failed-put");
        let parent = path.parent().expect("parent").to_path_buf();
        let store = FileStore::open(path.clone()).await.expect("open");
        store.put(Namespace::LastMove, "a1", json!(1)).await.expect("put");
        // A directory in place of the file makes every later save fail.
        std::fs::remove_file(&path).expect("remove file");
        std::fs::create_dir_all(&path).expect("block file path");

        let result = store
            .put(Namespace::Agents, "a1", json!({"name": "Alice"}))
            .await;
        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(store.get(Namespace::Agents, "a1").await.expect("get"), None);
        assert_eq!(
            store.get(Namespace::LastMove, "a1").await.expect("get"),
            Some(json!(1))
        );

        let _ = std::fs::remove_dir_all(&parent);
    }
}
