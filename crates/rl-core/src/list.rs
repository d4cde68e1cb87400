use std::fmt;
use std::sync::Arc;

use crate::compiled::{FormatError, RuleListView};
use crate::identifier::Identifier;

/// Handle to a compiled, engine-loadable rule list.
///
/// Cloning shares the underlying bytes. The bytes are validated once at
/// construction.
#[derive(Clone)]
pub struct CompiledRuleList {
    identifier: Identifier,
    bytes: Arc<[u8]>,
    rule_count: usize,
    source_hash: u32,
}

impl CompiledRuleList {
    pub fn from_bytes(identifier: Identifier, bytes: impl Into<Arc<[u8]>>) -> Result<Self, FormatError> {
        let bytes = bytes.into();
        let view = RuleListView::load(&bytes)?;
        let rule_count = view.rule_count();
        let source_hash = view.source_hash;
        Ok(Self {
            identifier,
            bytes,
            rule_count,
            source_hash,
        })
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    pub fn source_hash(&self) -> u32 {
        self.source_hash
    }

    pub fn view(&self) -> Result<RuleListView<'_>, FormatError> {
        RuleListView::load(&self.bytes)
    }

    /// True when both handles share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl PartialEq for CompiledRuleList {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier && self.bytes == other.bytes
    }
}

impl Eq for CompiledRuleList {}

impl fmt::Debug for CompiledRuleList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRuleList")
            .field("identifier", &self.identifier)
            .field("rules", &self.rule_count)
            .field("bytes", &self.bytes.len())
            .field("source_hash", &format_args!("{:#010x}", self.source_hash))
            .finish()
    }
}
