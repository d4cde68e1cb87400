//! rulelist Content Rule Compiler
//!
//! This crate compiles raw rule sources (JSON content rules or ABP text
//! filter lists) into the RLC compiled format.

pub mod builder;
pub mod error;
pub mod json;
pub mod optimizer;
pub mod parser;
pub mod rule;

pub use builder::build_list;
pub use error::CompileError;
pub use json::parse_content_rules;
pub use optimizer::{optimize_rules, OptimizeStats};
pub use parser::parse_filter_list;
pub use rule::ParsedRule;

use rl_core::{CompiledRuleList, Identifier, RawRuleSource};

/// Default cap on rules per list.
pub const DEFAULT_MAX_RULES: usize = 150_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub max_rules: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_rules: DEFAULT_MAX_RULES,
        }
    }
}

/// Source syntax, chosen by the first non-whitespace character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    FilterList,
}

impl SourceFormat {
    pub fn detect(text: &str) -> Self {
        if text.trim_start().starts_with('[') && !looks_like_abp_header(text) {
            Self::Json
        } else {
            Self::FilterList
        }
    }
}

// "[Adblock Plus 2.0]" opens many text lists
fn looks_like_abp_header(text: &str) -> bool {
    let first = text.trim_start();
    first.len() > 1 && first[1..].trim_start().starts_with(|c: char| c.is_ascii_alphabetic())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileStats {
    pub format: SourceFormat,
    pub parsed: usize,
    pub deduped: usize,
    pub rules: usize,
    pub block_domains: usize,
    pub bytes: usize,
}

/// Compile a raw source into a validated rule list.
pub fn compile(
    identifier: &Identifier,
    source: &RawRuleSource,
    options: &CompileOptions,
) -> Result<CompiledRuleList, CompileError> {
    compile_with_stats(identifier, source, options).map(|(list, _)| list)
}

pub fn compile_with_stats(
    identifier: &Identifier,
    source: &RawRuleSource,
    options: &CompileOptions,
) -> Result<(CompiledRuleList, CompileStats), CompileError> {
    let text = std::str::from_utf8(source.as_bytes())?;
    let format = SourceFormat::detect(text);

    let mut rules = match format {
        SourceFormat::Json => parse_content_rules(text)?,
        SourceFormat::FilterList => parse_filter_list(text),
    };
    let parsed = rules.len();

    let optimized = optimize_rules(&mut rules);
    if rules.len() > options.max_rules {
        return Err(CompileError::TooManyRules {
            count: rules.len(),
            limit: options.max_rules,
        });
    }
    check_field_limits(&rules)?;

    let bytes = build_list(&rules, source.fingerprint());
    let byte_len = bytes.len();
    let list = CompiledRuleList::from_bytes(identifier.clone(), bytes)?;
    let block_domains = list.view()?.block_domain_count();

    log::debug!(
        "compiled {}: {:?}, {} rules ({} duplicates dropped), {} bytes",
        identifier,
        format,
        list.rule_count(),
        optimized.deduped,
        byte_len
    );

    let stats = CompileStats {
        format,
        parsed,
        deduped: optimized.deduped,
        rules: list.rule_count(),
        block_domains,
        bytes: byte_len,
    };
    Ok((list, stats))
}

fn check_field_limits(rules: &[ParsedRule]) -> Result<(), CompileError> {
    let limit = u16::MAX as usize;
    for (index, rule) in rules.iter().enumerate() {
        if rule.url_filter.len() > limit {
            return Err(CompileError::InvalidRule {
                index,
                reason: format!("url-filter is {} bytes, limit is {}", rule.url_filter.len(), limit),
            });
        }
        if rule.selector.as_ref().map_or(false, |s| s.len() > limit) {
            return Err(CompileError::InvalidRule {
                index,
                reason: format!("selector exceeds {} bytes", limit),
            });
        }
        if rule.domains.len() > limit {
            return Err(CompileError::InvalidRule {
                index,
                reason: format!("{} constraint domains, limit is {}", rule.domains.len(), limit),
            });
        }
    }
    Ok(())
}
