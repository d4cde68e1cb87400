//! JSON content-rule lists
//!
//! A list is an array of `{"trigger": {...}, "action": {...}}` objects.
//! Unlike text filter lists, a single bad rule rejects the whole list.

use serde::Deserialize;

use rl_core::types::{LoadType, ResourceType, RuleAction, RuleFlags};

use crate::error::CompileError;
use crate::rule::{check_url_filter, normalize_domain, ParsedRule};

#[derive(Debug, Deserialize)]
struct JsonRule {
    trigger: JsonTrigger,
    action: JsonAction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JsonTrigger {
    url_filter: Option<String>,
    #[serde(default)]
    url_filter_is_case_sensitive: bool,
    if_domain: Option<Vec<String>>,
    unless_domain: Option<Vec<String>>,
    #[serde(default)]
    resource_type: Vec<String>,
    #[serde(default)]
    load_type: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JsonAction {
    #[serde(rename = "type")]
    kind: String,
    selector: Option<String>,
}

pub fn parse_content_rules(text: &str) -> Result<Vec<ParsedRule>, CompileError> {
    let raw: Vec<JsonRule> = serde_json::from_str(text)?;
    raw.into_iter()
        .enumerate()
        .map(|(index, rule)| convert_rule(index, rule))
        .collect()
}

fn convert_rule(index: usize, rule: JsonRule) -> Result<ParsedRule, CompileError> {
    let JsonRule { trigger, action } = rule;

    let url_filter = match trigger.url_filter {
        Some(filter) if !filter.is_empty() => filter,
        Some(_) => return Err(CompileError::rule(index, "url-filter is empty")),
        None => return Err(CompileError::rule(index, "missing url-filter")),
    };
    check_url_filter(&url_filter, trigger.url_filter_is_case_sensitive)
        .map_err(|error| CompileError::InvalidUrlFilter { index, error })?;

    let kind = parse_action(&action.kind)
        .ok_or_else(|| CompileError::rule(index, format!("unknown action type '{}'", action.kind)))?;

    let mut parsed = ParsedRule::new(kind, url_filter);
    if trigger.url_filter_is_case_sensitive {
        parsed.flags |= RuleFlags::CASE_SENSITIVE;
    }

    match (kind, action.selector) {
        (RuleAction::CssDisplayNone, Some(selector)) if !selector.trim().is_empty() => {
            parsed.selector = Some(selector);
        }
        (RuleAction::CssDisplayNone, _) => {
            return Err(CompileError::rule(index, "css-display-none requires a selector"));
        }
        _ => {}
    }

    for name in &trigger.resource_type {
        let mask = ResourceType::from_rule_name(name)
            .ok_or_else(|| CompileError::rule(index, format!("unknown resource-type '{}'", name)))?;
        parsed.resource_types |= mask;
    }

    for name in &trigger.load_type {
        let mask = LoadType::from_rule_name(name)
            .ok_or_else(|| CompileError::rule(index, format!("unknown load-type '{}'", name)))?;
        parsed.load_types |= mask;
    }

    let constrained = trigger.if_domain.is_some() || trigger.unless_domain.is_some();
    let (domains, unless) = match (trigger.if_domain, trigger.unless_domain) {
        (Some(_), Some(_)) => {
            return Err(CompileError::rule(index, "if-domain and unless-domain are exclusive"));
        }
        (Some(list), None) => (list, false),
        (None, Some(list)) => (list, true),
        (None, None) => (Vec::new(), false),
    };
    if unless {
        parsed.flags |= RuleFlags::UNLESS_DOMAIN;
    }
    if constrained {
        parsed.domains = normalize_domain_list(index, &domains)?;
    }

    Ok(parsed)
}

fn parse_action(kind: &str) -> Option<RuleAction> {
    match kind {
        "block" => Some(RuleAction::Block),
        "block-cookies" => Some(RuleAction::BlockCookies),
        "css-display-none" => Some(RuleAction::CssDisplayNone),
        "ignore-previous-rules" => Some(RuleAction::IgnorePreviousRules),
        "make-https" => Some(RuleAction::MakeHttps),
        _ => None,
    }
}

fn normalize_domain_list(index: usize, domains: &[String]) -> Result<Vec<String>, CompileError> {
    if domains.is_empty() {
        return Err(CompileError::rule(index, "domain list is empty"));
    }
    domains
        .iter()
        .map(|raw| {
            // "*example.com" also covers subdomains; the loader matches parents anyway
            let name = raw.strip_prefix('*').unwrap_or(raw);
            normalize_domain(name)
                .ok_or_else(|| CompileError::rule(index, format!("invalid domain '{}'", raw)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_block_and_css_rules() {
        let rules = parse_content_rules(
            r#"[
                {"trigger": {"url-filter": "ads\\.js", "resource-type": ["script"], "load-type": ["third-party"]},
                 "action": {"type": "block"}},
                {"trigger": {"url-filter": ".*", "if-domain": ["*Example.com"]},
                 "action": {"type": "css-display-none", "selector": ".banner"}}
            ]"#,
        )
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].action, RuleAction::Block);
        assert_eq!(rules[0].resource_types, ResourceType::SCRIPT);
        assert_eq!(rules[0].load_types, LoadType::THIRD_PARTY);
        assert_eq!(rules[1].action, RuleAction::CssDisplayNone);
        assert_eq!(rules[1].selector.as_deref(), Some(".banner"));
        assert_eq!(rules[1].domains, vec!["example.com".to_string()]);
    }

    #[test]
    fn unless_domain_sets_flag() {
        let rules = parse_content_rules(
            r#"[{"trigger": {"url-filter": "track", "unless-domain": ["news.org"]},
                 "action": {"type": "block-cookies"}}]"#,
        )
        .unwrap();
        assert!(rules[0].flags.contains(RuleFlags::UNLESS_DOMAIN));
        assert_eq!(rules[0].domains, vec!["news.org".to_string()]);
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(parse_content_rules("[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(parse_content_rules("[{"), Err(CompileError::Json(_))));
        assert!(matches!(parse_content_rules("{}"), Err(CompileError::Json(_))));
    }

    #[test]
    fn rejects_unknown_action() {
        let err = parse_content_rules(
            r#"[{"trigger": {"url-filter": "x"}, "action": {"type": "explode"}}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidRule { index: 0, .. }));
    }

    #[test]
    fn rejects_missing_selector_and_filter() {
        let err = parse_content_rules(
            r#"[{"trigger": {"url-filter": "x"}, "action": {"type": "block"}},
                {"trigger": {"url-filter": "x"}, "action": {"type": "css-display-none"}}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidRule { index: 1, .. }));

        let err = parse_content_rules(r#"[{"trigger": {}, "action": {"type": "block"}}]"#).unwrap_err();
        assert!(matches!(err, CompileError::InvalidRule { index: 0, .. }));
    }

    #[test]
    fn rejects_conflicting_domain_lists() {
        let err = parse_content_rules(
            r#"[{"trigger": {"url-filter": "x", "if-domain": ["a.com"], "unless-domain": ["b.com"]},
                 "action": {"type": "block"}}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidRule { .. }));
    }

    #[test]
    fn rejects_invalid_regex() {
        let err = parse_content_rules(
            r#"[{"trigger": {"url-filter": "ads[" }, "action": {"type": "block"}}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidUrlFilter { index: 0, .. }));
    }
}
