use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rl_compiler::{CompileOptions, DEFAULT_MAX_RULES};

use crate::error::ResolverError;

/// Resolver settings. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Insert freshly compiled lists into the store
    pub write_back: bool,
    /// Per-identifier deadline for lookup plus compile; unset waits forever
    pub identifier_timeout_ms: Option<u64>,
    /// Rule cap passed to the compiler
    pub max_rules: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            write_back: true,
            identifier_timeout_ms: None,
            max_rules: DEFAULT_MAX_RULES,
        }
    }
}

impl ResolverConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ResolverError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ResolverError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ResolverError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn identifier_timeout(&self) -> Option<Duration> {
        self.identifier_timeout_ms.map(Duration::from_millis)
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            max_rules: self.max_rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_use_defaults() {
        let config: ResolverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert!(config.write_back);
        assert_eq!(config.identifier_timeout(), None);
        assert_eq!(config.compile_options(), CompileOptions::default());
    }

    #[test]
    fn loads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"write_back": false, "identifier_timeout_ms": 250, "max_rules": 10}}"#).unwrap();

        let config = ResolverConfig::from_json_file(file.path()).unwrap();
        assert!(!config.write_back);
        assert_eq!(config.identifier_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.compile_options().max_rules, 10);
    }

    #[test]
    fn rejects_unknown_fields_and_missing_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"writeback": false}}"#).unwrap();
        assert!(matches!(
            ResolverConfig::from_json_file(file.path()),
            Err(ResolverError::ConfigParse { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ResolverConfig::from_json_file(dir.path().join("absent.json")),
            Err(ResolverError::ConfigIo { .. })
        ));
    }
}
