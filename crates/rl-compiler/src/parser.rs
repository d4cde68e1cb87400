//! Text filter lists (ABP syntax)
//!
//! Lines the engine cannot express are skipped rather than rejected, which is
//! how filter lists are meant to be consumed.

use std::net::IpAddr;

use rl_core::types::{LoadType, ResourceType, RuleAction, RuleFlags};

use crate::rule::{check_url_filter, host_anchor_filter, normalize_domain, ParsedRule, SEPARATOR_FILTER};

pub fn parse_filter_list(text: &str) -> Vec<ParsedRule> {
    let mut rules = Vec::new();
    let mut skipped = 0usize;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_comment_line(line) {
            continue;
        }

        match parse_line(line) {
            Some(rule) => rules.push(rule),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        log::debug!("filter list: {} rules parsed, {} lines skipped", rules.len(), skipped);
    }
    rules
}

fn parse_line(line: &str) -> Option<ParsedRule> {
    if line.contains("#@#") || line.contains("#?#") || line.contains("#$#") {
        return None;
    }
    if let Some(pos) = line.find("##") {
        return parse_cosmetic_rule(&line[..pos], &line[pos + 2..]);
    }

    let (action, line) = match line.strip_prefix("@@") {
        Some(rest) => (RuleAction::IgnorePreviousRules, rest.trim_start()),
        None => (RuleAction::Block, line),
    };

    let (pattern_part, options_text) = split_rule_options(line);
    let options = match options_text {
        Some(options_text) => parse_options(options_text)?,
        None => ParsedOptions::default(),
    };
    let pattern_str = pattern_part.trim();

    let mut rule = if let Some(host) = parse_host_anchor_rule(pattern_str) {
        let mut rule = ParsedRule::new(action, format!("{}{}", host_anchor_filter(&host), SEPARATOR_FILTER));
        if options_text.is_none() {
            rule.flags |= RuleFlags::HOST_ONLY;
        }
        rule.host = Some(host);
        rule
    } else if let Some(host) = parse_hosts_file_domain(pattern_str) {
        let mut rule = ParsedRule::new(action, format!("{}{}", host_anchor_filter(&host), SEPARATOR_FILTER));
        rule.flags |= RuleFlags::HOST_ONLY;
        rule.host = Some(host);
        rule
    } else if pattern_str.contains(char::is_whitespace) {
        return None;
    } else {
        ParsedRule::new(action, pattern_to_url_filter(pattern_str)?)
    };

    rule.flags |= RuleFlags::FROM_FILTER_LIST | options.flags;
    rule.resource_types = options.resource_types;
    rule.load_types = options.load_types;
    rule.domains = options.domains;

    check_url_filter(&rule.url_filter, rule.flags.contains(RuleFlags::CASE_SENSITIVE)).ok()?;
    Some(rule)
}

fn parse_cosmetic_rule(domains: &str, selector: &str) -> Option<ParsedRule> {
    let selector = selector.trim();
    if selector.is_empty() || selector.starts_with('+') || selector.starts_with('^') {
        return None;
    }

    let mut rule = ParsedRule::new(RuleAction::CssDisplayNone, ".*");
    rule.flags |= RuleFlags::FROM_FILTER_LIST;
    rule.selector = Some(selector.to_string());

    let domains = domains.trim();
    if !domains.is_empty() {
        let parsed = parse_domain_option(domains, ',')?;
        rule.domains = parsed.domains;
        if parsed.unless {
            rule.flags |= RuleFlags::UNLESS_DOMAIN;
        }
    }
    Some(rule)
}

#[derive(Default)]
struct ParsedOptions {
    flags: RuleFlags,
    resource_types: ResourceType,
    load_types: LoadType,
    domains: Vec<String>,
}

fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    let pos = match line.rfind('$') {
        Some(pos) => pos,
        None => return (line, None),
    };
    // "$" inside a /regex/ rule that has no options
    if line.len() > 2 && line.starts_with('/') && line.ends_with('/') {
        return (line, None);
    }
    (&line[..pos], Some(&line[pos + 1..]))
}

fn parse_options(text: &str) -> Option<ParsedOptions> {
    let mut options = ParsedOptions::default();
    let mut type_include = ResourceType::empty();
    let mut type_exclude = ResourceType::empty();

    for raw in text.trim().split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let raw_lower = raw.to_ascii_lowercase();
        let raw_lower = raw_lower.as_str();

        if raw_lower == "match-case" || raw_lower == "match_case" {
            options.flags |= RuleFlags::CASE_SENSITIVE;
            continue;
        }

        if raw_lower == "important" {
            continue;
        }

        if let Some(domain_value) = raw_lower.strip_prefix("domain=") {
            let parsed = parse_domain_option(domain_value, '|')?;
            if parsed.unless {
                options.flags |= RuleFlags::UNLESS_DOMAIN;
            }
            options.domains = parsed.domains;
            continue;
        }

        let (negated, name) = match raw_lower.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw_lower),
        };

        if let Some(mask) = resource_type_mask(name) {
            if negated {
                type_exclude |= mask;
            } else {
                type_include |= mask;
            }
            continue;
        }

        if let Some(mask) = party_mask(name, negated) {
            options.load_types |= mask;
            continue;
        }

        // Anything else ($redirect, $csp, $badfilter, ...) cannot be expressed
        return None;
    }

    options.resource_types = finalize_types(type_include, type_exclude)?;
    if options.load_types == LoadType::all() {
        options.load_types = LoadType::empty();
    }
    Some(options)
}

fn finalize_types(include: ResourceType, exclude: ResourceType) -> Option<ResourceType> {
    if include.is_empty() && exclude.is_empty() {
        return Some(ResourceType::empty());
    }
    let base = if include.is_empty() { ResourceType::all() } else { include };
    let mask = base - exclude;
    if mask.is_empty() {
        return None;
    }
    if mask == ResourceType::all() {
        return Some(ResourceType::empty());
    }
    Some(mask)
}

struct DomainOption {
    domains: Vec<String>,
    unless: bool,
}

/// Domain lists must be all-included or all-excluded; mixed lists are skipped.
fn parse_domain_option(value: &str, separator: char) -> Option<DomainOption> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for raw in value.split(separator) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        match raw.strip_prefix('~') {
            Some(rest) => exclude.push(normalize_domain(rest)?),
            None => include.push(normalize_domain(raw)?),
        }
    }

    match (include.is_empty(), exclude.is_empty()) {
        (false, true) => Some(DomainOption { domains: include, unless: false }),
        (true, false) => Some(DomainOption { domains: exclude, unless: true }),
        _ => None,
    }
}

fn resource_type_mask(name: &str) -> Option<ResourceType> {
    match name {
        "script" => Some(ResourceType::SCRIPT),
        "image" => Some(ResourceType::IMAGE),
        "stylesheet" => Some(ResourceType::STYLE_SHEET),
        "font" => Some(ResourceType::FONT),
        "media" => Some(ResourceType::MEDIA),
        "popup" => Some(ResourceType::POPUP),
        "document" | "subdocument" | "main_frame" => Some(ResourceType::DOCUMENT),
        "xmlhttprequest" | "xhr" | "websocket" | "ping" | "beacon" | "fetch" | "object" | "other" => {
            Some(ResourceType::RAW)
        }
        _ => None,
    }
}

fn party_mask(name: &str, negated: bool) -> Option<LoadType> {
    let (first, third) = (LoadType::FIRST_PARTY, LoadType::THIRD_PARTY);
    match (name, negated) {
        ("third-party" | "thirdparty" | "3p", false) | ("first-party" | "firstparty" | "1p", true) => Some(third),
        ("first-party" | "firstparty" | "1p", false) | ("third-party" | "thirdparty" | "3p", true) => Some(first),
        _ => None,
    }
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || (line.starts_with('#') && !line.starts_with("##"))
}

fn parse_host_anchor_rule(line: &str) -> Option<String> {
    let rest = line.strip_prefix("||")?;
    let rest = rest.strip_prefix('.').unwrap_or(rest);

    let mut end = rest.len();
    for (i, ch) in rest.char_indices() {
        if ch == '^' {
            end = i;
            break;
        }
        if ch == '/' || ch == '?' || ch == '#' || ch == ':' || ch == '*' || ch == '|' {
            return None;
        }
    }

    // Only "||host" or "||host^"
    if end != rest.len() && end + 1 != rest.len() {
        return None;
    }
    normalize_domain(&rest[..end])
}

fn parse_hosts_file_domain(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    let first = parts.next()?;
    let second = parts.next()?;

    if first.parse::<IpAddr>().is_ok() && second != "localhost" {
        return normalize_domain(second);
    }

    None
}

/// Translate an ABP pattern into a url-filter regex.
fn pattern_to_url_filter(pattern: &str) -> Option<String> {
    if pattern.is_empty() {
        return None;
    }

    if pattern.len() > 2 && pattern.starts_with('/') && pattern.ends_with('/') {
        return Some(pattern[1..pattern.len() - 1].to_string());
    }

    let (prefix, rest) = if let Some(rest) = pattern.strip_prefix("||") {
        ("^[^:]+://+([^:/]+\\.)?".to_string(), rest)
    } else if let Some(rest) = pattern.strip_prefix('|') {
        ("^".to_string(), rest)
    } else {
        (String::new(), pattern)
    };

    let (rest, right_anchor) = match rest.strip_suffix('|') {
        Some(rest) => (rest, true),
        None => (rest, false),
    };

    let body = rest.trim_matches('*');
    if body.is_empty() || body.chars().all(|c| c == '^') {
        return None;
    }

    let mut filter = prefix;
    let mut literal = String::new();
    for ch in rest.chars() {
        match ch {
            '*' | '^' => {
                filter.push_str(&regex::escape(&literal));
                literal.clear();
                filter.push_str(if ch == '*' { ".*" } else { SEPARATOR_FILTER });
            }
            _ => literal.push(ch),
        }
    }
    filter.push_str(&regex::escape(&literal));
    if right_anchor {
        filter.push('$');
    }

    Some(filter)
}
