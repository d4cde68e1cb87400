use rl_core::FormatError;

/// Reasons the compiler rejects a rule source.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Source is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Malformed rule JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rule {index}: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("Rule {index}: invalid url-filter: {error}")]
    InvalidUrlFilter { index: usize, error: regex::Error },

    #[error("Too many rules: {count} exceeds limit of {limit}")]
    TooManyRules { count: usize, limit: usize },

    #[error("Compiled output failed validation: {0}")]
    Format(#[from] FormatError),
}

impl CompileError {
    pub(crate) fn rule(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            index,
            reason: reason.into(),
        }
    }
}
