use rl_core::types::{LoadType, ResourceType, RuleAction, RuleFlags};

/// One rule after parsing, before it is laid out in the RULES section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedRule {
    pub action: RuleAction,
    pub flags: RuleFlags,
    /// Regular expression matched against the request URL
    pub url_filter: String,
    /// Only set for css-display-none
    pub selector: Option<String>,
    pub resource_types: ResourceType,
    pub load_types: LoadType,
    /// if-domain list, or unless-domain when `RuleFlags::UNLESS_DOMAIN` is set
    pub domains: Vec<String>,
    /// Host of a host-only block rule
    pub host: Option<String>,
}

impl ParsedRule {
    pub fn new(action: RuleAction, url_filter: impl Into<String>) -> Self {
        Self {
            action,
            flags: RuleFlags::empty(),
            url_filter: url_filter.into(),
            selector: None,
            resource_types: ResourceType::empty(),
            load_types: LoadType::empty(),
            domains: Vec::new(),
            host: None,
        }
    }

    /// Whether the rule belongs in the block-domain set.
    pub fn is_host_only_block(&self) -> bool {
        self.action == RuleAction::Block && self.flags.contains(RuleFlags::HOST_ONLY) && self.host.is_some()
    }
}

/// Regex matching any scheme followed by `host` or one of its subdomains.
pub fn host_anchor_filter(host: &str) -> String {
    format!("^[^:]+://+([^:/]+\\.)?{}", regex::escape(host))
}

/// ABP separator (`^`): anything but a letter, digit or `_-.%`, or the end.
pub const SEPARATOR_FILTER: &str = "([^a-zA-Z0-9_.%-]|$)";

/// Validate a url-filter the way the engine will compile it.
pub fn check_url_filter(filter: &str, case_sensitive: bool) -> Result<(), regex::Error> {
    regex::RegexBuilder::new(filter)
        .case_insensitive(!case_sensitive)
        .size_limit(1 << 20)
        .build()
        .map(|_| ())
}

/// Lowercase a domain and check it is plain ASCII.
pub fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_')
    {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}
