//! rulelist Resolver
//!
//! Turns batches of rule set identifiers into compiled rule lists: cached
//! lists come from a [`RuleListStore`], misses are compiled from a
//! [`SourceProvider`] on a single serialized [`CompileQueue`], and the caller
//! gets every list that could be produced, exactly once.
//!
//! # Modules
//!
//! - `manager`: `BlockListManager`, the batch entry point
//! - `queue`, `operation`: serialized compile scheduling
//! - `store`, `sources`: collaborator traits and their memory/directory implementations
//! - `batch`: per-call accumulator and report
//! - `config`, `error`

pub mod batch;
pub mod compiler;
pub mod config;
pub mod error;
pub mod manager;
pub mod operation;
pub mod queue;
pub mod sources;
pub mod store;

pub use batch::{Outcome, Resolution, ResolutionBatch, ResolutionReport};
pub use compiler::{DefaultCompiler, RuleCompiler};
pub use config::ResolverConfig;
pub use error::{ResolverError, StoreError};
pub use manager::BlockListManager;
pub use operation::{CompileOperation, CompileResult, Completion, OperationState};
pub use queue::{CompileQueue, QueueStats};
pub use sources::{DirectorySources, MemorySources, SourceProvider};
pub use store::{DirectoryStore, MemoryStore, RuleListStore};
