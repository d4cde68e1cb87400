//! Serialized compile queue
//!
//! A single worker task pulls operations off an unbounded channel in
//! submission order and runs each on the blocking pool, awaiting it before
//! taking the next. At most one compile is in flight per queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use rl_core::{Identifier, RawRuleSource};

use crate::compiler::RuleCompiler;
use crate::error::ResolverError;
use crate::operation::{CompileOperation, CompileResult, Completion};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    executed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

struct Shared {
    compiler: Arc<dyn RuleCompiler>,
    shut_down: AtomicBool,
    counters: Counters,
}

impl Shared {
    fn cancel(&self, operation: CompileOperation) {
        log::debug!("compile of {} cancelled, queue is shut down", operation.identifier());
        self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        operation.cancel();
    }

    fn record(&self, result: &CompileResult) {
        let c = &self.counters;
        c.executed.fetch_add(1, Ordering::Relaxed);
        match result {
            CompileResult::Success(_) => c.succeeded.fetch_add(1, Ordering::Relaxed),
            CompileResult::Failure(_) => c.failed.fetch_add(1, Ordering::Relaxed),
            CompileResult::Empty => 0,
        };
    }
}

pub struct CompileQueue {
    shared: Arc<Shared>,
    sender: mpsc::UnboundedSender<CompileOperation>,
    handle: Handle,
}

impl CompileQueue {
    /// Start the worker on the current tokio runtime.
    pub fn new(compiler: Arc<dyn RuleCompiler>) -> Result<Self, ResolverError> {
        let handle = Handle::try_current().map_err(|_| ResolverError::NoRuntime)?;
        Ok(Self::with_handle(compiler, handle))
    }

    pub fn with_handle(compiler: Arc<dyn RuleCompiler>, handle: Handle) -> Self {
        let shared = Arc::new(Shared {
            compiler,
            shut_down: AtomicBool::new(false),
            counters: Counters::default(),
        });
        let (sender, receiver) = mpsc::unbounded_channel();
        handle.spawn(run_worker(shared.clone(), receiver));
        Self { shared, sender, handle }
    }

    /// Runtime the worker runs on.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn submit(&self, identifier: Identifier, source: RawRuleSource) -> Completion {
        let (operation, completion) = CompileOperation::new(identifier, source);
        self.enqueue(operation);
        completion
    }

    pub fn enqueue(&self, operation: CompileOperation) {
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        if self.is_shut_down() {
            self.shared.cancel(operation);
            return;
        }

        operation.mark_queued();
        if let Err(mpsc::error::SendError(operation)) = self.sender.send(operation) {
            // Worker is gone (runtime shutting down)
            self.shared.cancel(operation);
        }
    }

    /// Cancel everything still waiting and refuse new work. A compile that is
    /// already executing runs to completion.
    pub fn shutdown(&self) {
        if !self.shared.shut_down.swap(true, Ordering::SeqCst) {
            log::info!("compile queue shutting down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shut_down.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> QueueStats {
        let c = &self.shared.counters;
        QueueStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            executed: c.executed.load(Ordering::Relaxed),
            succeeded: c.succeeded.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
        }
    }
}

impl Drop for CompileQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CompileQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileQueue")
            .field("shut_down", &self.is_shut_down())
            .field("stats", &self.stats())
            .finish()
    }
}

async fn run_worker(shared: Arc<Shared>, mut receiver: mpsc::UnboundedReceiver<CompileOperation>) {
    while let Some(operation) = receiver.recv().await {
        if shared.shut_down.load(Ordering::SeqCst) {
            shared.cancel(operation);
            continue;
        }

        let identifier = operation.identifier().clone();
        let worker = shared.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let compiler = worker.compiler.clone();
            // Counted before the hook fires so a woken waiter sees current stats
            operation.execute_with(compiler.as_ref(), |result| worker.record(result))
        })
        .await;

        match joined {
            Ok(CompileResult::Success(list)) => {
                log::debug!("compiled {} ({} rules)", identifier, list.rule_count());
            }
            Ok(CompileResult::Failure(reason)) => {
                log::debug!("compile of {} failed: {}", identifier, reason);
            }
            Ok(CompileResult::Empty) => {}
            Err(err) => {
                // The operation was dropped with the task, which fired its hook
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("compile task for {} did not complete: {}", identifier, err);
            }
        }
    }
    log::debug!("compile queue worker stopped");
}
