//! Group and group rule models.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;

use super::common::{GroupId, GroupRuleId};

/// A named set of hosts. Membership is kept by the inventory, not on the group row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Hostname pattern that enrolls matching hosts into its group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GroupRule {
    pub id: GroupRuleId,
    pub group_id: GroupId,
    #[sqlx(try_from = "String")]
    pub rule: RulePattern,
    pub created_at: String,
    pub updated_at: String,
}

/// A compiled group rule regex.
///
/// Only constructible from a pattern that compiles, so matching never fails.
#[derive(Debug, Clone)]
pub struct RulePattern(Regex);

impl RulePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    /// Unanchored search: the pattern may match anywhere in `hostname`
    pub fn is_match(&self, hostname: &str) -> bool {
        self.0.is_match(hostname)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for RulePattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for RulePattern {}

impl std::fmt::Display for RulePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for RulePattern {
    type Error = regex::Error;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Self::new(&pattern)
    }
}

impl Serialize for RulePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RulePattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        Self::new(&pattern).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_pattern_rejects_invalid_regex() {
        assert!(RulePattern::new("^web[0-9+.foobar.com").is_err());
        assert!(RulePattern::new("^web[0-9]+.foobar.com").is_ok());
    }

    #[test]
    fn test_rule_pattern_serde() {
        let pattern = RulePattern::new("^db[0-9]+").unwrap();
        let json = serde_json::to_string(&pattern).unwrap();
        assert_eq!(json, "\"^db[0-9]+\"");

        let back: RulePattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pattern);

        assert!(serde_json::from_str::<RulePattern>("\"(unclosed\"").is_err());
    }
}
