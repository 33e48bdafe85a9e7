//! In-memory relational model of keys, topology and account bindings.
//!
//! [`Inventory`] owns every entity and exposes the store operations:
//! - key store (`keys.rs`): keys, keyrings, keyring contents
//! - topology store (`topology.rs`): environments, hosts, groups, group rules
//! - account binding store (`accounts.rs`): accounts, their scopes and key references
//!
//! Mutations take `&mut self`, validate everything up front and only then
//! apply their changes, so a returned error means nothing changed. Readers
//! that need isolation from writers share an `Arc<Inventory>` snapshot and
//! writers publish a modified clone.

mod accounts;
mod error;
mod keys;
mod topology;
pub mod validation;

#[cfg(test)]
pub(crate) mod fixtures;

pub use accounts::ScopeObject;
pub use error::{InventoryError, InventoryResult};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::{
    AccountAvailableId, AccountId, Environment, EnvironmentId, Group, GroupId, GroupRule,
    GroupRuleId, Host, HostId, KeyId, KeyringId, Scope, SshAccount, SshAccountAvailable, SshKey,
    SshKeyring,
};

/// A host's membership in a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: GroupId,
    pub host_id: HostId,
}

/// Flat, serializable dump of an inventory.
///
/// Used to persist the inventory and to rebuild it on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub keys: Vec<SshKey>,
    pub keyrings: Vec<SshKeyring>,
    pub environments: Vec<Environment>,
    pub hosts: Vec<Host>,
    pub groups: Vec<Group>,
    pub group_rules: Vec<GroupRule>,
    /// Group memberships in enrollment order
    pub memberships: Vec<Membership>,
    pub accounts: Vec<SshAccount>,
    pub accounts_available: Vec<SshAccountAvailable>,
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    next_id: i64,
    keys: BTreeMap<KeyId, SshKey>,
    keyrings: BTreeMap<KeyringId, SshKeyring>,
    environments: BTreeMap<EnvironmentId, Environment>,
    hosts: BTreeMap<HostId, Host>,
    groups: BTreeMap<GroupId, Group>,
    group_rules: BTreeMap<GroupRuleId, GroupRule>,
    memberships: Vec<Membership>,
    accounts: BTreeMap<AccountId, SshAccount>,
    accounts_available: BTreeMap<AccountAvailableId, SshAccountAvailable>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an inventory from a snapshot, checking every cross reference.
    pub fn from_snapshot(snapshot: Snapshot) -> InventoryResult<Self> {
        let mut inv = Inventory::new();

        for key in snapshot.keys {
            inv.keys.insert(key.id, key);
        }
        for ring in snapshot.keyrings {
            if let Some(missing) = ring.keys.iter().find(|k| !inv.keys.contains_key(*k)) {
                return Err(InventoryError::not_found("ssh key", *missing));
            }
            inv.keyrings.insert(ring.id, ring);
        }
        for env in snapshot.environments {
            inv.environments.insert(env.id, env);
        }
        for host in snapshot.hosts {
            if !inv.environments.contains_key(&host.environment_id) {
                return Err(InventoryError::not_found("environment", host.environment_id));
            }
            inv.hosts.insert(host.id, host);
        }
        for group in snapshot.groups {
            inv.groups.insert(group.id, group);
        }
        for rule in snapshot.group_rules {
            if !inv.groups.contains_key(&rule.group_id) {
                return Err(InventoryError::not_found("group", rule.group_id));
            }
            inv.group_rules.insert(rule.id, rule);
        }
        for membership in snapshot.memberships {
            if !inv.groups.contains_key(&membership.group_id) {
                return Err(InventoryError::not_found("group", membership.group_id));
            }
            if !inv.hosts.contains_key(&membership.host_id) {
                return Err(InventoryError::not_found("host", membership.host_id));
            }
            if !inv.memberships.contains(&membership) {
                inv.memberships.push(membership);
            }
        }
        for account in snapshot.accounts {
            inv.resolve_scope(&account.scope)?;
            if let Some(missing) = account.keys.iter().find(|k| !inv.keys.contains_key(*k)) {
                return Err(InventoryError::not_found("ssh key", *missing));
            }
            if let Some(missing) = account
                .keyrings
                .iter()
                .find(|r| !inv.keyrings.contains_key(*r))
            {
                return Err(InventoryError::not_found("ssh keyring", *missing));
            }
            inv.accounts.insert(account.id, account);
        }
        for available in snapshot.accounts_available {
            inv.accounts_available.insert(available.id, available);
        }

        inv.next_id = inv.max_id();
        Ok(inv)
    }

    /// Dump every entity, ordered by id
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            keys: self.keys.values().cloned().collect(),
            keyrings: self.keyrings.values().cloned().collect(),
            environments: self.environments.values().cloned().collect(),
            hosts: self.hosts.values().cloned().collect(),
            groups: self.groups.values().cloned().collect(),
            group_rules: self.group_rules.values().cloned().collect(),
            memberships: self.memberships.clone(),
            accounts: self.accounts.values().cloned().collect(),
            accounts_available: self.accounts_available.values().cloned().collect(),
        }
    }

    fn max_id(&self) -> i64 {
        [
            self.keys.keys().next_back().map(|id| id.0),
            self.keyrings.keys().next_back().map(|id| id.0),
            self.environments.keys().next_back().map(|id| id.0),
            self.hosts.keys().next_back().map(|id| id.0),
            self.groups.keys().next_back().map(|id| id.0),
            self.group_rules.keys().next_back().map(|id| id.0),
            self.accounts.keys().next_back().map(|id| id.0),
            self.accounts_available.keys().next_back().map(|id| id.0),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0)
    }

    /// Ids are unique across all entity kinds
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    pub fn key(&self, id: KeyId) -> Option<&SshKey> {
        self.keys.get(&id)
    }

    pub fn key_by_name(&self, name: &str) -> Option<&SshKey> {
        self.keys.values().find(|k| k.name == name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SshKey> {
        self.keys.values()
    }

    pub fn keyring(&self, id: KeyringId) -> Option<&SshKeyring> {
        self.keyrings.get(&id)
    }

    pub fn keyring_by_name(&self, name: &str) -> Option<&SshKeyring> {
        self.keyrings.values().find(|r| r.name == name)
    }

    pub fn keyrings(&self) -> impl Iterator<Item = &SshKeyring> {
        self.keyrings.values()
    }

    pub fn environment(&self, id: EnvironmentId) -> Option<&Environment> {
        self.environments.get(&id)
    }

    pub fn environment_by_name(&self, name: &str) -> Option<&Environment> {
        self.environments.values().find(|e| e.name == name)
    }

    pub fn environments(&self) -> impl Iterator<Item = &Environment> {
        self.environments.values()
    }

    pub fn host(&self, id: HostId) -> Option<&Host> {
        self.hosts.get(&id)
    }

    pub fn host_by_name(&self, name: &str) -> Option<&Host> {
        self.hosts.values().find(|h| h.name == name)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups.values().find(|g| g.name == name)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn group_rules(&self) -> impl Iterator<Item = &GroupRule> {
        self.group_rules.values()
    }

    pub fn account(&self, id: AccountId) -> Option<&SshAccount> {
        self.accounts.get(&id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &SshAccount> {
        self.accounts.values()
    }

    /// Groups of a host in the order the host was enrolled into them
    pub fn host_groups(&self, host_id: HostId) -> impl Iterator<Item = GroupId> + '_ {
        self.memberships
            .iter()
            .filter(move |m| m.host_id == host_id)
            .map(|m| m.group_id)
    }

    /// Members of a group in enrollment order
    pub fn group_hosts(&self, group_id: GroupId) -> impl Iterator<Item = HostId> + '_ {
        self.memberships
            .iter()
            .filter(move |m| m.group_id == group_id)
            .map(|m| m.host_id)
    }

    pub fn is_member(&self, group_id: GroupId, host_id: HostId) -> bool {
        self.memberships
            .iter()
            .any(|m| m.group_id == group_id && m.host_id == host_id)
    }

    /// Sorted key names, for autocompletion
    pub fn key_names(&self) -> Vec<String> {
        sorted_names(self.keys.values().map(|k| k.name.as_str()))
    }

    /// Sorted keyring names, for autocompletion
    pub fn keyring_names(&self) -> Vec<String> {
        sorted_names(self.keyrings.values().map(|r| r.name.as_str()))
    }

    /// Sorted available account names, for autocompletion
    pub fn account_available_names(&self) -> Vec<String> {
        sorted_names(self.accounts_available.values().map(|a| a.name.as_str()))
    }

    /// Accounts bound to exactly this scope object
    pub fn accounts_for_scope(&self, scope: Scope) -> impl Iterator<Item = &SshAccount> {
        self.accounts.values().filter(move |a| a.scope == scope)
    }
}

fn sorted_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = names.map(str::to_string).collect();
    names.sort();
    names
}

/// Map a field validator result into an inventory validation error
fn check(field: &'static str, result: Result<(), String>) -> InventoryResult<()> {
    result.map_err(|message| InventoryError::Validation { field, message })
}
