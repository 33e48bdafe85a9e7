//! Account-to-key resolution.
//!
//! For a host, the accounts bound to the host itself, to its environment and
//! to each of its groups are merged by account name. Scopes are visited in
//! that order (groups in membership order) and each account contributes its
//! direct keys followed by the keys of its keyrings. A key granted through
//! several paths appears once, at the position of its first source.

use std::collections::BTreeMap;

use super::OrderedSet;
use crate::db::{HostId, KeyId, Scope, SshAccount, SshKey};
use crate::inventory::{Inventory, InventoryError, InventoryResult};

/// Keys referenced by one account: direct keys, then keyring keys
pub fn account_key_ids(inv: &Inventory, account: &SshAccount) -> Vec<KeyId> {
    let mut ids = account.keys.clone();
    for ring in account.keyrings.iter().filter_map(|id| inv.keyring(*id)) {
        ids.extend(ring.keys.iter().copied());
    }
    ids
}

/// Scope objects that contribute accounts to a host, in merge order
pub fn host_scopes(inv: &Inventory, host_id: HostId) -> InventoryResult<Vec<Scope>> {
    let host = inv
        .host(host_id)
        .ok_or_else(|| InventoryError::not_found("host", host_id))?;

    let mut scopes = vec![Scope::Host(host_id), Scope::Environment(host.environment_id)];
    scopes.extend(inv.host_groups(host_id).map(Scope::Group));
    Ok(scopes)
}

/// Account name to ordered, duplicate free keys for a host.
///
/// A host without accounts yields an empty map. An account without keys is
/// present with an empty list.
pub fn resolve(inv: &Inventory, host_id: HostId) -> InventoryResult<BTreeMap<String, Vec<&SshKey>>> {
    let mut merged: BTreeMap<String, OrderedSet<KeyId>> = BTreeMap::new();

    for scope in host_scopes(inv, host_id)? {
        for account in inv.accounts_for_scope(scope) {
            merged
                .entry(account.name.clone())
                .or_default()
                .extend(account_key_ids(inv, account));
        }
    }

    Ok(merged
        .into_iter()
        .map(|(name, ids)| {
            let keys = ids.into_iter().filter_map(|id| inv.key(id)).collect();
            (name, keys)
        })
        .collect())
}

/// [`resolve`] with every key rendered as an `authorized_keys` entry
pub fn authorized_keys(inv: &Inventory, host_id: HostId) -> InventoryResult<BTreeMap<String, Vec<String>>> {
    Ok(resolve(inv, host_id)?
        .into_iter()
        .map(|(name, keys)| (name, keys.into_iter().map(SshKey::entry).collect()))
        .collect())
}
