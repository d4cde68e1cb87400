//! One unit of compile work and its completion hook

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use rl_core::{CompiledRuleList, Identifier, RawRuleSource};

use crate::compiler::RuleCompiler;

/// Outcome of compiling one rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileResult {
    Success(CompiledRuleList),
    /// Compiler rejected the source, or panicked
    Failure(String),
    /// Nothing to compile, or the operation was cancelled before it ran
    Empty,
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_list(self) -> Option<CompiledRuleList> {
        match self {
            Self::Success(list) => Some(list),
            Self::Failure(_) | Self::Empty => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Created,
    Queued,
    Executing,
    Finished,
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// Compiles one identifier's source and fires its hook exactly once.
///
/// Dropping an operation that never ran counts as cancellation.
pub struct CompileOperation {
    identifier: Identifier,
    source: RawRuleSource,
    state: Arc<Mutex<OperationState>>,
    hook: Option<oneshot::Sender<CompileResult>>,
}

impl CompileOperation {
    pub fn new(identifier: Identifier, source: RawRuleSource) -> (Self, Completion) {
        let (sender, receiver) = oneshot::channel();
        let state = Arc::new(Mutex::new(OperationState::Created));
        let operation = Self {
            identifier: identifier.clone(),
            source,
            state: state.clone(),
            hook: Some(sender),
        };
        let completion = Completion {
            identifier,
            state,
            receiver,
        };
        (operation, completion)
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn state(&self) -> OperationState {
        *self.state.lock()
    }

    /// created -> queued. Returns false if the operation already left `Created`.
    pub fn mark_queued(&self) -> bool {
        let mut state = self.state.lock();
        if *state != OperationState::Created {
            return false;
        }
        *state = OperationState::Queued;
        true
    }

    /// Run the compile on the current thread and fire the hook.
    pub fn execute(self, compiler: &dyn RuleCompiler) -> CompileResult {
        self.execute_with(compiler, |_| {})
    }

    /// Like [`execute`](Self::execute), but `before_hook` sees the result
    /// before the waiter is woken. Not called for an already-cancelled operation.
    pub fn execute_with<F>(mut self, compiler: &dyn RuleCompiler, before_hook: F) -> CompileResult
    where
        F: FnOnce(&CompileResult),
    {
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return CompileResult::Empty;
            }
            *state = OperationState::Executing;
        }

        let result = match catch_unwind(AssertUnwindSafe(|| compiler.compile(&self.identifier, &self.source))) {
            Ok(Ok(list)) => CompileResult::Success(list),
            Ok(Err(err)) => CompileResult::Failure(err.to_string()),
            Err(panic) => CompileResult::Failure(format!("compiler panicked: {}", panic_message(&*panic))),
        };

        before_hook(&result);
        self.complete(OperationState::Finished, result.clone());
        result
    }

    /// created|queued -> cancelled; the hook fires with `Empty`.
    pub fn cancel(mut self) {
        self.complete(OperationState::Cancelled, CompileResult::Empty);
    }

    fn complete(&mut self, terminal: OperationState, result: CompileResult) {
        let Some(hook) = self.hook.take() else {
            return;
        };
        *self.state.lock() = terminal;
        // The waiter may have given up (timeout); nothing to report then
        let _ = hook.send(result);
    }
}

impl Drop for CompileOperation {
    fn drop(&mut self) {
        self.complete(OperationState::Cancelled, CompileResult::Empty);
    }
}

impl std::fmt::Debug for CompileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileOperation")
            .field("identifier", &self.identifier)
            .field("source_bytes", &self.source.len())
            .field("state", &self.state())
            .finish()
    }
}

/// Caller's side of a [`CompileOperation`].
#[derive(Debug)]
pub struct Completion {
    identifier: Identifier,
    state: Arc<Mutex<OperationState>>,
    receiver: oneshot::Receiver<CompileResult>,
}

impl Completion {
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn state(&self) -> OperationState {
        *self.state.lock()
    }

    pub async fn wait(self) -> CompileResult {
        // The hook always fires before the sender drops, so this only
        // fails if the operation was leaked
        self.receiver
            .await
            .unwrap_or_else(|_| CompileResult::Failure("compile operation dropped without result".to_string()))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rl_compiler::CompileError;

    use crate::compiler::DefaultCompiler;

    fn operation(source: &str) -> (CompileOperation, Completion) {
        CompileOperation::new(Identifier::new("ads").unwrap(), RawRuleSource::from(source))
    }

    #[tokio::test]
    async fn execute_fires_hook_with_success() {
        let (op, completion) = operation("||ads.example.com^");
        assert_eq!(op.state(), OperationState::Created);
        assert!(op.mark_queued());
        assert!(!op.mark_queued());
        assert_eq!(completion.state(), OperationState::Queued);

        let returned = op.execute(&DefaultCompiler::default());
        assert_eq!(completion.state(), OperationState::Finished);

        let delivered = completion.wait().await;
        assert_eq!(delivered, returned);
        let list = delivered.into_list().unwrap();
        assert_eq!(list.identifier().as_str(), "ads");
        assert_eq!(list.rule_count(), 1);
    }

    #[tokio::test]
    async fn compiler_errors_become_failures() {
        let (op, completion) = operation("[{\"trigger\": {}}");
        op.execute(&DefaultCompiler::default());
        assert!(matches!(completion.wait().await, CompileResult::Failure(_)));
    }

    #[tokio::test]
    async fn compiler_panics_become_failures() {
        let panicking = |_: &Identifier, _: &RawRuleSource| -> Result<CompiledRuleList, CompileError> {
            panic!("boom");
        };
        let (op, completion) = operation("||a.com^");
        let result = op.execute(&panicking);
        match result {
            CompileResult::Failure(reason) => assert!(reason.contains("boom")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(completion.state(), OperationState::Finished);
        assert!(matches!(completion.wait().await, CompileResult::Failure(_)));
    }

    #[tokio::test]
    async fn cancel_fires_empty() {
        let (op, completion) = operation("||a.com^");
        op.mark_queued();
        op.cancel();
        assert_eq!(completion.state(), OperationState::Cancelled);
        assert_eq!(completion.wait().await, CompileResult::Empty);
    }

    #[tokio::test]
    async fn dropping_unrun_operation_cancels_it() {
        let (op, completion) = operation("||a.com^");
        drop(op);
        assert_eq!(completion.state(), OperationState::Cancelled);
        assert_eq!(completion.wait().await, CompileResult::Empty);
    }

    #[tokio::test]
    async fn before_hook_runs_ahead_of_the_waiter() {
        let seen = Arc::new(Mutex::new(None));
        let (op, completion) = operation("||a.com^");
        let recorded = seen.clone();
        op.execute_with(&DefaultCompiler::default(), move |result| {
            *recorded.lock() = Some(result.is_success());
        });
        assert!(completion.wait().await.is_success());
        assert_eq!(*seen.lock(), Some(true));
    }

    #[test]
    fn before_hook_skipped_for_cancelled_operation() {
        let (op, completion) = operation("||a.com^");
        *completion.state.lock() = OperationState::Cancelled;
        let mut called = false;
        assert_eq!(op.execute_with(&DefaultCompiler::default(), |_| called = true), CompileResult::Empty);
        assert!(!called);
    }

    #[test]
    fn execute_survives_dropped_waiter() {
        let (op, completion) = operation("||a.com^");
        drop(completion);
        assert!(op.execute(&DefaultCompiler::default()).is_success());
    }
}
