//! SSH account models.
//!
//! An account is bound to exactly one scope object: an environment, a host
//! or a group. The binding is stored as an `(obj_name, obj_id)` column pair
//! and decoded into [`Scope`].

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};

use super::common::{AccountAvailableId, AccountId, EnvironmentId, GroupId, HostId, KeyId, KeyringId};

/// Kind of object an account can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Environment,
    Host,
    Group,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 3] = [ScopeKind::Environment, ScopeKind::Group, ScopeKind::Host];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Environment => "environment",
            ScopeKind::Host => "host",
            ScopeKind::Group => "group",
        }
    }

    /// Capitalised form used in user facing messages
    pub fn label(&self) -> &'static str {
        match self {
            ScopeKind::Environment => "Environment",
            ScopeKind::Host => "Host",
            ScopeKind::Group => "Group",
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScopeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "environment" => Ok(ScopeKind::Environment),
            "host" => Ok(ScopeKind::Host),
            "group" => Ok(ScopeKind::Group),
            _ => Err(format!("Unknown scope kind: {}", s)),
        }
    }
}

/// The object an account is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Scope {
    Environment(EnvironmentId),
    Host(HostId),
    Group(GroupId),
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Environment(_) => ScopeKind::Environment,
            Scope::Host(_) => ScopeKind::Host,
            Scope::Group(_) => ScopeKind::Group,
        }
    }

    /// The id column value as stored in `obj_id`
    pub fn raw_id(&self) -> i64 {
        match self {
            Scope::Environment(id) => id.0,
            Scope::Host(id) => id.0,
            Scope::Group(id) => id.0,
        }
    }

    pub fn from_parts(kind: ScopeKind, id: i64) -> Self {
        match kind {
            ScopeKind::Environment => Scope::Environment(EnvironmentId(id)),
            ScopeKind::Host => Scope::Host(HostId(id)),
            ScopeKind::Group => Scope::Group(GroupId(id)),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.raw_id())
    }
}

/// An SSH login account and the keys it trusts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshAccount {
    pub id: AccountId,
    pub name: String,
    pub scope: Scope,
    /// Directly referenced keys in reference order
    #[serde(default)]
    pub keys: Vec<KeyId>,
    /// Referenced keyrings in reference order
    #[serde(default)]
    pub keyrings: Vec<KeyringId>,
    pub created_at: String,
    pub updated_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for SshAccount {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let obj_name: String = row.try_get("obj_name")?;
        let kind: ScopeKind = obj_name.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
            index: "obj_name".to_string(),
            source: e.into(),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            scope: Scope::from_parts(kind, row.try_get("obj_id")?),
            keys: Vec::new(),
            keyrings: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Account name offered for autocompletion; has no effect on resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SshAccountAvailable {
    pub id: AccountAvailableId,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_kind_parse() {
        assert_eq!("host".parse::<ScopeKind>().unwrap(), ScopeKind::Host);
        assert_eq!("group".parse::<ScopeKind>().unwrap(), ScopeKind::Group);
        assert_eq!(
            "environment".parse::<ScopeKind>().unwrap(),
            ScopeKind::Environment
        );
        assert!("Host".parse::<ScopeKind>().is_err());
        assert!("project".parse::<ScopeKind>().is_err());
    }

    #[test]
    fn test_scope_parts_roundtrip() {
        let scope = Scope::from_parts(ScopeKind::Group, 9);
        assert_eq!(scope, Scope::Group(GroupId(9)));
        assert_eq!(scope.kind(), ScopeKind::Group);
        assert_eq!(scope.raw_id(), 9);
        assert_eq!(scope.to_string(), "group:9");
    }

    #[test]
    fn test_scope_serializes_tagged() {
        let json = serde_json::to_value(Scope::Host(HostId(3))).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "host", "id": 3}));
    }
}
