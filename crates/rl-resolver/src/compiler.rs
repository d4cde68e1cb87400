use rl_compiler::{CompileError, CompileOptions};
use rl_core::{CompiledRuleList, Identifier, RawRuleSource};

/// Turns a raw source into a compiled list. Runs on a blocking worker thread.
pub trait RuleCompiler: Send + Sync {
    fn compile(&self, identifier: &Identifier, source: &RawRuleSource) -> Result<CompiledRuleList, CompileError>;
}

impl<F> RuleCompiler for F
where
    F: Fn(&Identifier, &RawRuleSource) -> Result<CompiledRuleList, CompileError> + Send + Sync,
{
    fn compile(&self, identifier: &Identifier, source: &RawRuleSource) -> Result<CompiledRuleList, CompileError> {
        self(identifier, source)
    }
}

/// [`RuleCompiler`] backed by `rl_compiler::compile`.
#[derive(Debug, Clone, Default)]
pub struct DefaultCompiler {
    options: CompileOptions,
}

impl DefaultCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }
}

impl RuleCompiler for DefaultCompiler {
    fn compile(&self, identifier: &Identifier, source: &RawRuleSource) -> Result<CompiledRuleList, CompileError> {
        rl_compiler::compile(identifier, source, &self.options)
    }
}
