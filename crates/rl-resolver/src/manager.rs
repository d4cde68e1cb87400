//! Cache-first resolution of rule list batches
//!
//! Every requested identifier gets its own branch in a [`JoinSet`]: a store
//! lookup, then on a miss a source lookup and a compile on the shared
//! [`CompileQueue`]. All branches are spawned before the batch starts
//! draining, and the batch is only handed back once the set is empty.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinSet;

use rl_core::{CompiledRuleList, Identifier};

use crate::batch::{Outcome, ResolutionBatch, ResolutionReport};
use crate::compiler::DefaultCompiler;
use crate::config::ResolverConfig;
use crate::error::ResolverError;
use crate::operation::CompileResult;
use crate::queue::CompileQueue;
use crate::sources::SourceProvider;
use crate::store::RuleListStore;

/// Resolves identifiers to compiled rule lists. Cheap to clone.
#[derive(Clone)]
pub struct BlockListManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn RuleListStore>,
    sources: Arc<dyn SourceProvider>,
    queue: Arc<CompileQueue>,
    config: ResolverConfig,
    handle: Handle,
}

impl BlockListManager {
    pub fn new(
        store: Arc<dyn RuleListStore>,
        sources: Arc<dyn SourceProvider>,
        queue: Arc<CompileQueue>,
        config: ResolverConfig,
    ) -> Self {
        let handle = queue.handle().clone();
        Self {
            inner: Arc::new(Inner {
                store,
                sources,
                queue,
                config,
                handle,
            }),
        }
    }

    /// Build a manager with its own queue running [`DefaultCompiler`] on the
    /// current runtime.
    pub fn with_default_compiler(
        store: Arc<dyn RuleListStore>,
        sources: Arc<dyn SourceProvider>,
        config: ResolverConfig,
    ) -> Result<Self, ResolverError> {
        let compiler = Arc::new(DefaultCompiler::new(config.compile_options()));
        let queue = Arc::new(CompileQueue::new(compiler)?);
        Ok(Self::new(store, sources, queue, config))
    }

    pub fn queue(&self) -> &Arc<CompileQueue> {
        &self.inner.queue
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.inner.config
    }

    /// Resolve `identifiers` in the background and call `callback` exactly once
    /// with every list that could be produced. Order is unspecified.
    pub fn resolve<I, F>(&self, identifiers: I, callback: F)
    where
        I: IntoIterator<Item = Identifier>,
        F: FnOnce(Vec<CompiledRuleList>) + Send + 'static,
    {
        let batch = ResolutionBatch::new(identifiers);
        let inner = self.inner.clone();
        self.inner.handle.spawn(async move {
            let (lists, _) = inner.run_batch(batch).await;
            callback(lists);
        });
    }

    pub async fn resolve_lists<I>(&self, identifiers: I) -> Vec<CompiledRuleList>
    where
        I: IntoIterator<Item = Identifier>,
    {
        self.resolve_with_report(identifiers).await.0
    }

    pub async fn resolve_with_report<I>(&self, identifiers: I) -> (Vec<CompiledRuleList>, ResolutionReport)
    where
        I: IntoIterator<Item = Identifier>,
    {
        self.inner.clone().run_batch(ResolutionBatch::new(identifiers)).await
    }
}

impl std::fmt::Debug for BlockListManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockListManager")
            .field("queue", &self.inner.queue)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Inner {
    async fn run_batch(self: Arc<Self>, mut batch: ResolutionBatch) -> (Vec<CompiledRuleList>, ResolutionReport) {
        let mut branches = JoinSet::new();
        for identifier in batch.identifiers().cloned().collect::<Vec<_>>() {
            let inner = self.clone();
            branches.spawn(async move { inner.resolve_identifier(identifier).await });
        }

        while let Some(joined) = branches.join_next().await {
            match joined {
                Ok(outcome) => {
                    batch.record(outcome);
                }
                Err(err) => log::warn!("resolution branch aborted: {}", err),
            }
        }
        // Only reachable when a branch panicked
        batch.fail_pending();

        let report = batch.report();
        log::info!(
            "resolved {}/{} rule lists ({} cached, {} compiled)",
            report.resolved(),
            report.requested,
            report.hits,
            report.compiled
        );
        log::debug!("batch report: {:?}", report);
        batch.finish()
    }

    async fn resolve_identifier(&self, identifier: Identifier) -> Outcome {
        let Some(limit) = self.config.identifier_timeout() else {
            return self.lookup_or_compile(identifier).await;
        };

        match tokio::time::timeout(limit, self.lookup_or_compile(identifier.clone())).await {
            Ok(outcome) => outcome,
            Err(_) => {
                log::warn!("{} timed out after {:?}, dropping it", identifier, limit);
                Outcome::timed_out(identifier)
            }
        }
    }

    async fn lookup_or_compile(&self, identifier: Identifier) -> Outcome {
        match self.store.lookup(&identifier).await {
            Ok(Some(list)) => {
                log::debug!("cache hit for {}", identifier);
                return Outcome::hit(identifier, list);
            }
            Ok(None) => log::debug!("cache miss for {}", identifier),
            Err(err) => log::warn!("store lookup for {} failed, treating as miss: {}", identifier, err),
        }

        let Some(source) = self.sources.source_for(&identifier) else {
            log::debug!("no source for {}", identifier);
            return Outcome::empty(identifier);
        };

        log::debug!("scheduling compile for {} ({} bytes)", identifier, source.len());
        let result = self.queue.submit(identifier.clone(), source).wait().await;

        match &result {
            CompileResult::Success(list) if self.config.write_back => {
                if let Err(err) = self.store.insert(list).await {
                    log::warn!("failed to store compiled {}: {}", identifier, err);
                }
            }
            CompileResult::Failure(reason) => log::warn!("compile of {} failed: {}", identifier, reason),
            CompileResult::Empty => log::debug!("compile of {} produced nothing", identifier),
            CompileResult::Success(_) => {}
        }

        Outcome::from_compile(identifier, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use rl_compiler::{CompileError, CompileOptions};
    use rl_core::RawRuleSource;
    use tokio::sync::oneshot;

    use crate::compiler::RuleCompiler;
    use crate::error::StoreError;
    use crate::sources::MemorySources;
    use crate::store::MemoryStore;

    fn id(name: &str) -> Identifier {
        Identifier::new(name).unwrap()
    }

    fn ids(names: &[&str]) -> Vec<Identifier> {
        names.iter().map(|name| id(name)).collect()
    }

    fn compiled(name: &str, text: &str) -> CompiledRuleList {
        rl_compiler::compile(&id(name), &RawRuleSource::from(text), &CompileOptions::default()).unwrap()
    }

    fn names(lists: &[CompiledRuleList]) -> Vec<String> {
        let mut names: Vec<_> = lists.iter().map(|l| l.identifier().to_string()).collect();
        names.sort();
        names
    }

    /// Counts compiles and tracks how many run at once.
    #[derive(Default)]
    struct CountingCompiler {
        calls: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RuleCompiler for CountingCompiler {
        fn compile(&self, identifier: &Identifier, source: &RawRuleSource) -> Result<CompiledRuleList, CompileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(10));
            self.active.fetch_sub(1, Ordering::SeqCst);
            rl_compiler::compile(identifier, source, &CompileOptions::default())
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        sources: Arc<MemorySources>,
        compiler: Arc<CountingCompiler>,
        manager: BlockListManager,
    }

    fn fixture(config: ResolverConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let sources = Arc::new(MemorySources::new());
        let compiler = Arc::new(CountingCompiler::default());
        let queue = Arc::new(CompileQueue::new(compiler.clone()).unwrap());
        let manager = BlockListManager::new(store.clone(), sources.clone(), queue, config);
        Fixture {
            store,
            sources,
            compiler,
            manager,
        }
    }

    fn compiles(fx: &Fixture) -> usize {
        fx.compiler.calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn empty_set_calls_back_once_with_nothing() {
        let fx = fixture(ResolverConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        let counter = calls.clone();
        fx.manager.resolve(Vec::new(), move |lists| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(lists);
        });

        assert!(rx.await.unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(compiles(&fx), 0);
    }

    #[tokio::test]
    async fn cache_hit_skips_compilation() {
        let fx = fixture(ResolverConfig::default());
        let ads = compiled("ads", "||ads.com^");
        fx.store.insert(&ads).await.unwrap();
        fx.sources.insert(id("ads"), "||other.com^");

        let lists = fx.manager.resolve_lists(ids(&["ads"])).await;
        assert_eq!(lists.len(), 1);
        assert!(lists[0].ptr_eq(&ads));
        assert_eq!(compiles(&fx), 0);
    }

    #[tokio::test]
    async fn miss_with_source_compiles_once() {
        let fx = fixture(ResolverConfig::default());
        fx.sources.insert(id("trackers"), "||tracker.net^");

        let (lists, report) = fx.manager.resolve_with_report(ids(&["trackers", "trackers"])).await;
        assert_eq!(names(&lists), vec!["trackers"]);
        assert_eq!(compiles(&fx), 1);
        assert_eq!(report.requested, 1);
        assert_eq!(report.compiled, 1);
        assert!(lists[0].view().unwrap().blocks_domain("cdn.tracker.net"));
    }

    #[tokio::test]
    async fn unknown_and_failing_identifiers_are_dropped() {
        let fx = fixture(ResolverConfig::default());
        fx.sources.insert(id("broken"), "[{\"trigger\": {}, \"action\": {\"type\": \"block\"}}]");

        let (lists, report) = fx.manager.resolve_with_report(ids(&["broken", "nowhere"])).await;
        assert!(lists.is_empty());
        assert_eq!(report.failed, 1);
        assert_eq!(report.empty, 1);
        assert_eq!(compiles(&fx), 1);
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn mixed_batch_resolves_hits_and_compiles() {
        let fx = fixture(ResolverConfig::default());
        fx.store.insert(&compiled("ads", "||ads.com^")).await.unwrap();
        fx.sources.insert(id("trackers"), "||tracker.net^");

        let (tx, rx) = oneshot::channel();
        fx.manager.resolve(ids(&["ads", "trackers", "unknown-id"]), move |lists| {
            let _ = tx.send(lists);
        });

        let lists = rx.await.unwrap();
        assert_eq!(names(&lists), vec!["ads", "trackers"]);
        assert_eq!(compiles(&fx), 1);
    }

    #[tokio::test]
    async fn compiled_lists_are_written_back() {
        let fx = fixture(ResolverConfig::default());
        fx.sources.insert(id("trackers"), "||tracker.net^");

        let first = fx.manager.resolve_lists(ids(&["trackers"])).await;
        assert!(fx.store.contains(&id("trackers")));

        let (second, report) = fx.manager.resolve_with_report(ids(&["trackers"])).await;
        assert_eq!(report.hits, 1);
        assert_eq!(compiles(&fx), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn repeated_calls_are_idempotent_without_write_back() {
        let fx = fixture(ResolverConfig {
            write_back: false,
            ..ResolverConfig::default()
        });
        fx.store.insert(&compiled("ads", "||ads.com^")).await.unwrap();
        fx.sources.insert(id("trackers"), "||tracker.net^");

        let request = ids(&["ads", "trackers", "unknown-id"]);
        let mut first = fx.manager.resolve_lists(request.clone()).await;
        let mut second = fx.manager.resolve_lists(request).await;
        first.sort_by(|a, b| a.identifier().cmp(b.identifier()));
        second.sort_by(|a, b| a.identifier().cmp(b.identifier()));

        assert_eq!(first, second);
        assert_eq!(compiles(&fx), 2);
        assert!(!fx.store.contains(&id("trackers")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_batches_share_one_compile_slot() {
        let fx = fixture(ResolverConfig {
            write_back: false,
            ..ResolverConfig::default()
        });
        for i in 0..6 {
            fx.sources.insert(id(&format!("list-{}", i)), format!("||host{}.com^", i));
        }

        let left = fx.manager.resolve_lists(ids(&["list-0", "list-1", "list-2", "list-3"]));
        let right = fx.manager.resolve_lists(ids(&["list-2", "list-3", "list-4", "list-5"]));
        let (left, right) = tokio::join!(left, right);

        assert_eq!(left.len(), 4);
        assert_eq!(right.len(), 4);
        assert_eq!(compiles(&fx), 8);
        assert_eq!(fx.compiler.peak.load(Ordering::SeqCst), 1);
        assert_eq!(fx.manager.queue().stats().succeeded, 8);
    }

    struct FailingStore;

    #[async_trait]
    impl RuleListStore for FailingStore {
        async fn lookup(&self, _: &Identifier) -> Result<Option<CompiledRuleList>, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn insert(&self, _: &CompiledRuleList) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn remove(&self, _: &Identifier) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn store_errors_fall_back_to_compiling() {
        let sources = Arc::new(MemorySources::new());
        sources.insert(id("ads"), "||ads.com^");
        let manager =
            BlockListManager::with_default_compiler(Arc::new(FailingStore), sources, ResolverConfig::default())
                .unwrap();

        let lists = manager.resolve_lists(ids(&["ads"])).await;
        assert_eq!(names(&lists), vec!["ads"]);
        assert_eq!(manager.queue().stats().succeeded, 1);
    }

    struct StallingStore;

    #[async_trait]
    impl RuleListStore for StallingStore {
        async fn lookup(&self, identifier: &Identifier) -> Result<Option<CompiledRuleList>, StoreError> {
            if identifier.as_str() == "slow" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(None)
        }

        async fn insert(&self, _: &CompiledRuleList) -> Result<(), StoreError> {
            Ok(())
        }

        async fn remove(&self, _: &Identifier) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn timeout_drops_stalled_identifiers() {
        let sources = Arc::new(MemorySources::new());
        sources.insert(id("slow"), "||slow.com^");
        sources.insert(id("fast"), "||fast.com^");
        let config = ResolverConfig {
            identifier_timeout_ms: Some(500),
            ..ResolverConfig::default()
        };
        let manager = BlockListManager::with_default_compiler(Arc::new(StallingStore), sources, config).unwrap();

        let (lists, report) = manager.resolve_with_report(ids(&["slow", "fast"])).await;
        assert_eq!(names(&lists), vec!["fast"]);
        assert_eq!(report.timed_out, 1);
        assert_eq!(report.compiled, 1);
    }

    #[tokio::test]
    async fn shut_down_queue_drops_misses() {
        let fx = fixture(ResolverConfig::default());
        fx.store.insert(&compiled("ads", "||ads.com^")).await.unwrap();
        fx.sources.insert(id("trackers"), "||tracker.net^");
        fx.manager.queue().shutdown();

        let (lists, report) = fx.manager.resolve_with_report(ids(&["ads", "trackers"])).await;
        assert_eq!(names(&lists), vec!["ads"]);
        assert_eq!(report.empty, 1);
        assert_eq!(compiles(&fx), 0);
    }
}
