//! Persistent compiled rule list stores

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use rl_core::{CompiledRuleList, Identifier};

use crate::error::StoreError;

/// Async keyed store of compiled lists.
#[async_trait]
pub trait RuleListStore: Send + Sync {
    async fn lookup(&self, identifier: &Identifier) -> Result<Option<CompiledRuleList>, StoreError>;

    async fn insert(&self, list: &CompiledRuleList) -> Result<(), StoreError>;

    /// Returns whether a list was stored under `identifier`.
    async fn remove(&self, identifier: &Identifier) -> Result<bool, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    lists: RwLock<HashMap<Identifier, CompiledRuleList>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lists(lists: impl IntoIterator<Item = CompiledRuleList>) -> Self {
        let lists = lists
            .into_iter()
            .map(|list| (list.identifier().clone(), list))
            .collect();
        Self {
            lists: RwLock::new(lists),
        }
    }

    pub fn len(&self) -> usize {
        self.lists.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.read().is_empty()
    }

    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.lists.read().contains_key(identifier)
    }
}

#[async_trait]
impl RuleListStore for MemoryStore {
    async fn lookup(&self, identifier: &Identifier) -> Result<Option<CompiledRuleList>, StoreError> {
        Ok(self.lists.read().get(identifier).cloned())
    }

    async fn insert(&self, list: &CompiledRuleList) -> Result<(), StoreError> {
        self.lists.write().insert(list.identifier().clone(), list.clone());
        Ok(())
    }

    async fn remove(&self, identifier: &Identifier) -> Result<bool, StoreError> {
        Ok(self.lists.write().remove(identifier).is_some())
    }
}

const LIST_EXTENSION: &str = "rlc";

/// One compiled list file per identifier under a root directory.
///
/// Files are validated on every lookup; a file that fails validation is
/// reported as [`StoreError::Corrupt`].
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Use `root`, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, identifier: &Identifier) -> PathBuf {
        self.root
            .join(format!("{}.{}", escape_file_name(identifier.as_str()), LIST_EXTENSION))
    }
}

#[async_trait]
impl RuleListStore for DirectoryStore {
    async fn lookup(&self, identifier: &Identifier) -> Result<Option<CompiledRuleList>, StoreError> {
        let path = self.path_for(identifier);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        CompiledRuleList::from_bytes(identifier.clone(), bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                identifier: identifier.clone(),
                source,
            })
    }

    async fn insert(&self, list: &CompiledRuleList) -> Result<(), StoreError> {
        let path = self.path_for(list.identifier());
        let root = self.root.clone();
        let list = list.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_replacing(&root, &target, list.as_bytes()))
            .await
            .map_err(|e| StoreError::io(path, std::io::Error::new(ErrorKind::Other, e)))?
    }

    async fn remove(&self, identifier: &Identifier) -> Result<bool, StoreError> {
        let path = self.path_for(identifier);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

/// Write through a uniquely named temp file in `root`, then rename over
/// `path`. Concurrent writers of one identifier each get their own temp file;
/// the last rename wins.
fn write_replacing(root: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = tempfile::NamedTempFile::new_in(root).map_err(|e| StoreError::io(root, e))?;
    file.write_all(bytes).map_err(|e| StoreError::io(file.path(), e))?;
    file.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

/// Map an identifier onto a single path component.
///
/// ASCII letters, digits, `-`, `_` and non-leading `.` pass through; every
/// other byte becomes `%XX`, so the mapping is injective and never escapes
/// the directory.
pub(crate) fn escape_file_name(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len());
    for (i, byte) in identifier.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' || (byte == b'.' && i > 0);
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rl_compiler::{compile, CompileOptions};
    use rl_core::RawRuleSource;

    fn list(name: &str, text: &str) -> CompiledRuleList {
        let id = Identifier::new(name).unwrap();
        compile(&id, &RawRuleSource::from(text), &CompileOptions::default()).unwrap()
    }

    #[test]
    fn escapes_file_names() {
        assert_eq!(escape_file_name("easylist-v2.1"), "easylist-v2.1");
        assert_eq!(escape_file_name("../etc/passwd"), "%2E.%2Fetc%2Fpasswd");
        assert_eq!(escape_file_name("a b%"), "a%20b%25");
        assert_eq!(escape_file_name("é"), "%C3%A9");
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        let ads = list("ads", "||ads.com^");
        let id = ads.identifier().clone();

        assert!(store.lookup(&id).await.unwrap().is_none());
        store.insert(&ads).await.unwrap();
        let found = store.lookup(&id).await.unwrap().unwrap();
        assert!(found.ptr_eq(&ads));
        assert!(store.remove(&id).await.unwrap());
        assert!(!store.remove(&id).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn directory_store_persists_lists() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(dir.path().join("cache")).await.unwrap();
        let trackers = list("trackers/v2", "||tracker.net^\n/pixel.gif");

        store.insert(&trackers).await.unwrap();
        assert!(store.path_for(trackers.identifier()).is_file());

        let reopened = DirectoryStore::open(dir.path().join("cache")).await.unwrap();
        let found = reopened.lookup(trackers.identifier()).await.unwrap().unwrap();
        assert_eq!(found, trackers);
        assert_eq!(found.rule_count(), 2);

        assert!(reopened.remove(trackers.identifier()).await.unwrap());
        assert!(reopened.lookup(trackers.identifier()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_of_one_identifier_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(DirectoryStore::open(dir.path()).await.unwrap());
        let ads = list("ads", "||ads.com^\n||banners.com^");

        let mut writers = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            let ads = ads.clone();
            writers.spawn(async move { store.insert(&ads).await });
        }
        while let Some(joined) = writers.join_next().await {
            joined.unwrap().unwrap();
        }

        let found = store.lookup(ads.identifier()).await.unwrap().unwrap();
        assert_eq!(found, ads);
        // Only the list itself remains; no temp files left behind
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn directory_store_reports_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(dir.path()).await.unwrap();
        let id = Identifier::new("ads").unwrap();
        std::fs::write(store.path_for(&id), b"not a rule list").unwrap();

        let err = store.lookup(&id).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
