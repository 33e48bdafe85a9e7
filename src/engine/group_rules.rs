//! Group rule matching.
//!
//! Patterns are compiled when a rule is created, so matching a hostname
//! against stored rules cannot fail.

use super::OrderedSet;
use crate::db::{GroupId, GroupRule, RulePattern};

/// Unanchored regex search of `pattern` in `hostname`
pub fn matches(pattern: &RulePattern, hostname: &str) -> bool {
    pattern.is_match(hostname)
}

/// Groups whose rules match `hostname`, once each, in rule order
pub fn matching_groups<'a>(
    rules: impl IntoIterator<Item = &'a GroupRule>,
    hostname: &str,
) -> Vec<GroupId> {
    rules
        .into_iter()
        .filter(|rule| matches(&rule.rule, hostname))
        .map(|rule| rule.group_id)
        .collect::<OrderedSet<_>>()
        .into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::GroupRuleId;

    fn rule(id: i64, group: i64, pattern: &str) -> GroupRule {
        GroupRule {
            id: GroupRuleId(id),
            group_id: GroupId(group),
            rule: RulePattern::new(pattern).unwrap(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_matches() {
        let pattern = RulePattern::new("^web[0-9]+.foobar.com").unwrap();
        assert!(matches(&pattern, "web10.foobar.com"));
        assert!(!matches(&pattern, "web-test.foobar.com"));

        // search, not full match
        let pattern = RulePattern::new("db").unwrap();
        assert!(matches(&pattern, "prod-db-01"));
    }

    #[test]
    fn test_matching_groups_dedups_in_rule_order() {
        let rules = vec![
            rule(1, 20, "^web"),
            rule(2, 10, "foobar"),
            rule(3, 20, "[0-9]"),
            rule(4, 30, "^db"),
        ];

        assert_eq!(
            matching_groups(&rules, "web1.foobar.com"),
            vec![GroupId(20), GroupId(10)]
        );
        assert!(matching_groups(&rules, "mail.example.org").is_empty());
    }
}
