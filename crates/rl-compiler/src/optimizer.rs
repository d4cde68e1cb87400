use std::collections::HashSet;

use rl_core::types::RuleAction;

use crate::rule::ParsedRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
}

/// Drop exact duplicate rules.
///
/// An ignore-previous-rules rule only cancels rules before it, so a duplicate
/// after one is kept: it re-applies what the exception cancelled.
pub fn optimize_rules(rules: &mut Vec<ParsedRule>) -> OptimizeStats {
    let before = rules.len();
    let mut seen: HashSet<ParsedRule> = HashSet::new();
    let mut deduped = 0usize;

    rules.retain(|rule| {
        if rule.action == RuleAction::IgnorePreviousRules {
            seen.clear();
            return true;
        }
        if seen.contains(rule) {
            deduped += 1;
            false
        } else {
            seen.insert(rule.clone());
            true
        }
    });

    OptimizeStats {
        before,
        after: rules.len(),
        deduped,
    }
}
