//! Common types and utilities shared across models.

use serde::{Deserialize, Serialize};

/// Declares an integer primary-key newtype stored as a SQLite `INTEGER`.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Primary key of an [`SshKey`](super::SshKey)
    KeyId
);
entity_id!(
    /// Primary key of an [`SshKeyring`](super::SshKeyring)
    KeyringId
);
entity_id!(
    /// Primary key of an [`Environment`](super::Environment)
    EnvironmentId
);
entity_id!(
    /// Primary key of a [`Host`](super::Host)
    HostId
);
entity_id!(
    /// Primary key of a [`Group`](super::Group)
    GroupId
);
entity_id!(
    /// Primary key of a [`GroupRule`](super::GroupRule)
    GroupRuleId
);
entity_id!(
    /// Primary key of an [`SshAccount`](super::SshAccount)
    AccountId
);
entity_id!(
    /// Primary key of an [`SshAccountAvailable`](super::SshAccountAvailable)
    AccountAvailableId
);

/// Current time formatted the way every `created_at`/`updated_at` column stores it
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&HostId(42)).unwrap();
        assert_eq!(json, "42");

        let id: KeyId = serde_json::from_str("7").unwrap();
        assert_eq!(id, KeyId(7));
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let ts = timestamp();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
