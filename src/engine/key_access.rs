//! Host selection and the key export document.

use serde::Serialize;
use std::collections::BTreeMap;

use super::resolver::authorized_keys;
use crate::db::{Host, ScopeKind};
use crate::inventory::{Inventory, InventoryError, InventoryResult};

/// Restricts an export to the hosts of one environment, one group or a single host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFilter {
    pub kind: ScopeKind,
    pub value: String,
}

impl HostFilter {
    /// Build a filter from the raw request parameters.
    ///
    /// An absent filter type means no filter. A present one, even empty, must be
    /// one of `environment`, `group` or `host` and requires a value.
    pub fn parse(filter_type: Option<&str>, filter_value: Option<&str>) -> InventoryResult<Option<Self>> {
        let filter_type = match filter_type {
            Some(filter_type) => filter_type.trim(),
            None => return Ok(None),
        };

        let kind: ScopeKind = filter_type.parse().map_err(|_| {
            InventoryError::InvalidFilter(format!("filter type not allowed: {}", filter_type))
        })?;

        let value = filter_value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| InventoryError::InvalidFilter("please add filter value".to_string()))?;

        Ok(Some(HostFilter {
            kind,
            value: value.to_string(),
        }))
    }

    fn accepts(&self, inv: &Inventory, host: &Host) -> bool {
        match self.kind {
            ScopeKind::Host => host.name == self.value,
            ScopeKind::Environment => inv
                .environment(host.environment_id)
                .is_some_and(|env| env.name == self.value),
            ScopeKind::Group => inv
                .group_by_name(&self.value)
                .is_some_and(|group| inv.is_member(group.id, host.id)),
        }
    }
}

/// Hosts passing `filter`, sorted by name. Unknown names select nothing.
pub fn select_hosts<'a>(inv: &'a Inventory, filter: Option<&HostFilter>) -> Vec<&'a Host> {
    let mut hosts: Vec<&Host> = inv
        .hosts()
        .filter(|host| filter.map_or(true, |f| f.accepts(inv, host)))
        .collect();
    hosts.sort_by(|a, b| a.name.cmp(&b.name));
    hosts
}

/// Export entry for one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostKeys {
    pub ip: Option<String>,
    pub environment: String,
    pub accounts: BTreeMap<String, Vec<String>>,
}

/// Hostname to address, environment and resolved accounts for every selected host
pub fn export(inv: &Inventory, filter: Option<&HostFilter>) -> InventoryResult<BTreeMap<String, HostKeys>> {
    let mut document = BTreeMap::new();

    for host in select_hosts(inv, filter) {
        let environment = inv
            .environment(host.environment_id)
            .ok_or_else(|| InventoryError::not_found("environment", host.environment_id))?;

        document.insert(
            host.name.clone(),
            HostKeys {
                ip: host.ipaddress.clone(),
                environment: environment.name.clone(),
                accounts: authorized_keys(inv, host.id)?,
            },
        );
    }

    tracing::debug!(hosts = document.len(), "Exported host keys");
    Ok(document)
}
