//! Raw rule source providers

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use rl_core::{Identifier, RawRuleSource};

use crate::store::escape_file_name;

/// Synchronous identifier to raw source lookup.
pub trait SourceProvider: Send + Sync {
    fn source_for(&self, identifier: &Identifier) -> Option<RawRuleSource>;
}

#[derive(Debug, Default)]
pub struct MemorySources {
    sources: RwLock<HashMap<Identifier, RawRuleSource>>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identifier: Identifier, source: impl Into<RawRuleSource>) {
        self.sources.write().insert(identifier, source.into());
    }

    pub fn remove(&self, identifier: &Identifier) -> Option<RawRuleSource> {
        self.sources.write().remove(identifier)
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}

impl SourceProvider for MemorySources {
    fn source_for(&self, identifier: &Identifier) -> Option<RawRuleSource> {
        self.sources.read().get(identifier).cloned()
    }
}

/// Reads `<root>/<identifier>.json`, falling back to `<root>/<identifier>.txt`.
#[derive(Debug, Clone)]
pub struct DirectorySources {
    root: PathBuf,
}

impl DirectorySources {
    pub const EXTENSIONS: [&'static str; 2] = ["json", "txt"];

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, identifier: &Identifier) -> impl Iterator<Item = PathBuf> + '_ {
        let stem = escape_file_name(identifier.as_str());
        Self::EXTENSIONS
            .into_iter()
            .map(move |ext| self.root.join(format!("{}.{}", stem, ext)))
    }
}

impl SourceProvider for DirectorySources {
    fn source_for(&self, identifier: &Identifier) -> Option<RawRuleSource> {
        for path in self.candidates(identifier) {
            match std::fs::read(&path) {
                Ok(bytes) => return Some(RawRuleSource::from(bytes)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    log::warn!("failed to read source {}: {}", path.display(), e);
                    return None;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> Identifier {
        Identifier::new(name).unwrap()
    }

    #[test]
    fn memory_sources() {
        let sources = MemorySources::new();
        sources.insert(id("ads"), "||ads.com^");
        assert_eq!(sources.source_for(&id("ads")).unwrap().as_bytes(), b"||ads.com^");
        assert!(sources.source_for(&id("other")).is_none());
        assert!(sources.remove(&id("ads")).is_some());
        assert!(sources.is_empty());
    }

    #[test]
    fn directory_prefers_json_over_txt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ads.json"), "[]").unwrap();
        std::fs::write(dir.path().join("ads.txt"), "||ads.com^").unwrap();
        std::fs::write(dir.path().join("hosts.txt"), "0.0.0.0 tracker.net").unwrap();

        let sources = DirectorySources::new(dir.path());
        assert_eq!(sources.source_for(&id("ads")).unwrap().as_bytes(), b"[]");
        assert_eq!(
            sources.source_for(&id("hosts")).unwrap().as_bytes(),
            b"0.0.0.0 tracker.net"
        );
        assert!(sources.source_for(&id("missing")).is_none());
    }

    #[test]
    fn directory_escapes_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("team%2Fads.txt"), "||ads.com^").unwrap();

        let sources = DirectorySources::new(dir.path());
        assert!(sources.source_for(&id("team/ads")).is_some());
        assert!(sources.source_for(&id("../ads")).is_none());
    }
}
