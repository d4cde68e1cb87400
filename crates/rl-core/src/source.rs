use std::sync::Arc;

use crate::hash::hash_source;

/// Raw rule definitions for one rule set, as handed out by a source provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRuleSource(Arc<[u8]>);

impl RawRuleSource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Murmur3 fingerprint stored in the compiled list header.
    pub fn fingerprint(&self) -> u32 {
        hash_source(&self.0)
    }
}

impl From<&str> for RawRuleSource {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl From<String> for RawRuleSource {
    fn from(text: String) -> Self {
        Self::new(text.into_bytes())
    }
}

impl From<Vec<u8>> for RawRuleSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}
