//! Key audit ("which key opens what") and inventory counts.

use serde::Serialize;
use std::collections::HashMap;

use super::key_access::select_hosts;
use super::resolver::resolve;
use crate::db::KeyId;
use crate::inventory::{Inventory, InventoryResult};

/// One login a key grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub host: String,
    pub account: String,
}

/// Every login granted to one key
#[derive(Debug, Clone, Serialize)]
pub struct KeyAccessReport {
    pub key: String,
    /// First 30 characters of the key material
    pub sshkey: String,
    /// Grants sorted by host, then account
    pub grants: Vec<Grant>,
}

/// Resolve every host and invert the result per key.
///
/// Keys that grant nothing are listed with no grants. Reports are sorted by key name.
pub fn key_access_report(inv: &Inventory) -> InventoryResult<Vec<KeyAccessReport>> {
    let mut grants: HashMap<KeyId, Vec<Grant>> = HashMap::new();

    for host in select_hosts(inv, None) {
        for (account, keys) in resolve(inv, host.id)? {
            for key in keys {
                grants.entry(key.id).or_default().push(Grant {
                    host: host.name.clone(),
                    account: account.clone(),
                });
            }
        }
    }

    let mut reports: Vec<KeyAccessReport> = inv
        .keys()
        .map(|key| KeyAccessReport {
            key: key.name.clone(),
            sshkey: key.short().to_string(),
            grants: grants.remove(&key.id).unwrap_or_default(),
        })
        .collect();
    reports.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(reports)
}

/// Entity counts for the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventoryStats {
    pub accounts: usize,
    pub environments: usize,
    pub hosts: usize,
    pub groups: usize,
    pub keys: usize,
    pub keyrings: usize,
}

pub fn stats(inv: &Inventory) -> InventoryStats {
    InventoryStats {
        accounts: inv.accounts().count(),
        environments: inv.environments().count(),
        hosts: inv.hosts().count(),
        groups: inv.groups().count(),
        keys: inv.keys().count(),
        keyrings: inv.keyrings().count(),
    }
}
