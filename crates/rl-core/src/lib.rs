//! rulelist Core Library
//!
//! Shared types for the rule list pipeline: rule set identifiers, raw rule
//! sources, and the compiled rule list handle together with its binary
//! format (RLC) and zero-copy loader.
//!
//! # Modules
//!
//! - `hash`: Murmur3 and CRC32 used by the compiled format
//! - `compiled`: RLC format constants and loader
//! - `types`: Rule actions, flags and masks
//! - `identifier`, `source`, `list`: pipeline value types

pub mod compiled;
pub mod hash;
pub mod identifier;
pub mod list;
pub mod source;
pub mod types;

pub use compiled::{FormatError, RuleListView, RuleRecord};
pub use hash::{hash64, hash_domain, Hash64};
pub use identifier::{Identifier, IdentifierError};
pub use list::CompiledRuleList;
pub use source::RawRuleSource;
pub use types::{LoadType, ResourceType, RuleAction, RuleFlags};
