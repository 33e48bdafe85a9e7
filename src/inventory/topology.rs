//! Topology store: environments, hosts, groups and group rules.

use tracing::{debug, info};

use super::validation::{
    validate_environment_name, validate_group_name, validate_group_rule, validate_host_name,
    validate_ip_address,
};
use super::{check, Inventory, InventoryError, InventoryResult, Membership};
use crate::db::{
    timestamp, Environment, EnvironmentId, Group, GroupId, GroupRule, GroupRuleId, Host, HostId,
    Scope,
};
use crate::engine::group_rules;

impl Inventory {
    // -------------------------------------------------------------------------
    // Environments
    // -------------------------------------------------------------------------

    pub fn create_environment(&mut self, name: &str) -> InventoryResult<EnvironmentId> {
        let name = name.trim();
        self.check_environment_name(None, name)?;

        let id = EnvironmentId(self.allocate_id());
        let now = timestamp();
        self.environments.insert(
            id,
            Environment {
                id,
                name: name.to_string(),
                created_at: now.clone(),
                updated_at: now,
            },
        );
        info!(environment = %name, "Created environment");
        Ok(id)
    }

    pub fn rename_environment(&mut self, id: EnvironmentId, name: &str) -> InventoryResult<()> {
        if !self.environments.contains_key(&id) {
            return Err(InventoryError::not_found("environment", id));
        }
        let name = name.trim();
        self.check_environment_name(Some(id), name)?;

        if let Some(env) = self.environments.get_mut(&id) {
            env.name = name.to_string();
            env.updated_at = timestamp();
        }
        Ok(())
    }

    /// Delete an environment and the accounts bound to it.
    ///
    /// Fails with [`InventoryError::DeleteInUse`] while any host belongs to
    /// the environment; nothing is deleted in that case.
    pub fn delete_environment(&mut self, id: EnvironmentId) -> InventoryResult<()> {
        let env = self
            .environments
            .get(&id)
            .ok_or_else(|| InventoryError::not_found("environment", id))?;

        let hosts = self.hosts_in_environment(id);
        if hosts > 0 {
            return Err(InventoryError::DeleteInUse {
                environment: env.name.clone(),
                hosts,
            });
        }

        let removed = self.delete_accounts_for_scope(Scope::Environment(id));
        if let Some(env) = self.environments.remove(&id) {
            info!(environment = %env.name, accounts = removed, "Deleted environment");
        }
        Ok(())
    }

    pub fn hosts_in_environment(&self, id: EnvironmentId) -> usize {
        self.hosts
            .values()
            .filter(|h| h.environment_id == id)
            .count()
    }

    fn check_environment_name(&self, id: Option<EnvironmentId>, name: &str) -> InventoryResult<()> {
        check("name", validate_environment_name(name))?;
        if self
            .environments
            .values()
            .any(|e| e.name == name && Some(e.id) != id)
        {
            return Err(InventoryError::validation(
                "name",
                "Environment with this name already exists.",
            ));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Hosts
    // -------------------------------------------------------------------------

    /// Add a host and enroll it into every group whose rule matches its name
    pub fn create_host(
        &mut self,
        name: &str,
        ipaddress: Option<&str>,
        environment_id: EnvironmentId,
    ) -> InventoryResult<HostId> {
        let name = name.trim();
        let ipaddress = normalize_ip(ipaddress);
        self.check_host(None, name, ipaddress, environment_id)?;

        let id = HostId(self.allocate_id());
        let now = timestamp();
        self.hosts.insert(
            id,
            Host {
                id,
                name: name.to_string(),
                ipaddress: ipaddress.map(str::to_string),
                environment_id,
                created_at: now.clone(),
                updated_at: now,
            },
        );
        info!(host = %name, "Created host");

        self.match_rules_and_assign(id)?;
        Ok(id)
    }

    /// Save new values for a host, then re-run group rule matching.
    ///
    /// Existing group memberships are kept even if the new name no longer matches.
    pub fn update_host(
        &mut self,
        id: HostId,
        name: &str,
        ipaddress: Option<&str>,
        environment_id: EnvironmentId,
    ) -> InventoryResult<()> {
        if !self.hosts.contains_key(&id) {
            return Err(InventoryError::not_found("host", id));
        }
        let name = name.trim();
        let ipaddress = normalize_ip(ipaddress);
        self.check_host(Some(id), name, ipaddress, environment_id)?;

        if let Some(host) = self.hosts.get_mut(&id) {
            host.name = name.to_string();
            host.ipaddress = ipaddress.map(str::to_string);
            host.environment_id = environment_id;
            host.updated_at = timestamp();
        }

        self.match_rules_and_assign(id)?;
        Ok(())
    }

    /// Delete a host, the accounts bound to it and its group memberships
    pub fn delete_host(&mut self, id: HostId) -> InventoryResult<()> {
        if !self.hosts.contains_key(&id) {
            return Err(InventoryError::not_found("host", id));
        }

        let removed = self.delete_accounts_for_scope(Scope::Host(id));
        self.memberships.retain(|m| m.host_id != id);
        if let Some(host) = self.hosts.remove(&id) {
            info!(host = %host.name, accounts = removed, "Deleted host");
        }
        Ok(())
    }

    fn check_host(
        &self,
        id: Option<HostId>,
        name: &str,
        ipaddress: Option<&str>,
        environment_id: EnvironmentId,
    ) -> InventoryResult<()> {
        check("name", validate_host_name(name))?;
        check("ipaddress", validate_ip_address(ipaddress))?;
        if !self.environments.contains_key(&environment_id) {
            return Err(InventoryError::validation(
                "environment",
                format!("Environment {} does not exist", environment_id),
            ));
        }
        if self
            .hosts
            .values()
            .any(|h| h.name == name && Some(h.id) != id)
        {
            return Err(InventoryError::validation(
                "name",
                "Host with this Host Name already exists.",
            ));
        }
        Ok(())
    }

    /// Enroll a host into every group with a rule matching its name.
    ///
    /// Returns the groups the host was newly added to. Hosts that are already
    /// members stay enrolled once.
    pub fn match_rules_and_assign(&mut self, host_id: HostId) -> InventoryResult<Vec<GroupId>> {
        let host = self
            .hosts
            .get(&host_id)
            .ok_or_else(|| InventoryError::not_found("host", host_id))?;

        let matched = group_rules::matching_groups(self.group_rules.values(), &host.name);
        let host_name = host.name.clone();

        let mut enrolled = Vec::new();
        for group_id in matched {
            if self.add_membership(group_id, host_id) {
                debug!(host = %host_name, group_id = %group_id, "Group rule matched");
                enrolled.push(group_id);
            }
        }
        if !enrolled.is_empty() {
            info!(host = %host_name, groups = enrolled.len(), "Enrolled host into groups");
        }
        Ok(enrolled)
    }

    fn add_membership(&mut self, group_id: GroupId, host_id: HostId) -> bool {
        if self.is_member(group_id, host_id) {
            return false;
        }
        self.memberships.push(Membership { group_id, host_id });
        true
    }

    // -------------------------------------------------------------------------
    // Groups and rules
    // -------------------------------------------------------------------------

    pub fn create_group(&mut self, name: &str) -> InventoryResult<GroupId> {
        let name = name.trim();
        self.check_group_name(None, name)?;

        let id = GroupId(self.allocate_id());
        let now = timestamp();
        self.groups.insert(
            id,
            Group {
                id,
                name: name.to_string(),
                created_at: now.clone(),
                updated_at: now,
            },
        );
        info!(group = %name, "Created group");
        Ok(id)
    }

    pub fn rename_group(&mut self, id: GroupId, name: &str) -> InventoryResult<()> {
        if !self.groups.contains_key(&id) {
            return Err(InventoryError::not_found("group", id));
        }
        let name = name.trim();
        self.check_group_name(Some(id), name)?;

        if let Some(group) = self.groups.get_mut(&id) {
            group.name = name.to_string();
            group.updated_at = timestamp();
        }
        Ok(())
    }

    /// Delete a group together with its accounts, rules and memberships
    pub fn delete_group(&mut self, id: GroupId) -> InventoryResult<()> {
        if !self.groups.contains_key(&id) {
            return Err(InventoryError::not_found("group", id));
        }

        let removed = self.delete_accounts_for_scope(Scope::Group(id));
        self.group_rules.retain(|_, rule| rule.group_id != id);
        self.memberships.retain(|m| m.group_id != id);
        if let Some(group) = self.groups.remove(&id) {
            info!(group = %group.name, accounts = removed, "Deleted group");
        }
        Ok(())
    }

    fn check_group_name(&self, id: Option<GroupId>, name: &str) -> InventoryResult<()> {
        check("name", validate_group_name(name))?;
        if self
            .groups
            .values()
            .any(|g| g.name == name && Some(g.id) != id)
        {
            return Err(InventoryError::validation(
                "name",
                "Group with this Group Name already exists.",
            ));
        }
        Ok(())
    }

    /// Add a rule to a group. The pattern must compile.
    ///
    /// Existing hosts are not re-evaluated; rules apply when a host is saved.
    pub fn create_group_rule(&mut self, group_id: GroupId, rule: &str) -> InventoryResult<GroupRuleId> {
        if !self.groups.contains_key(&group_id) {
            return Err(InventoryError::validation(
                "group",
                format!("Group {} does not exist", group_id),
            ));
        }
        let pattern = validate_group_rule(rule.trim())
            .map_err(|message| InventoryError::Validation { field: "rule", message })?;

        let id = GroupRuleId(self.allocate_id());
        let now = timestamp();
        info!(group_id = %group_id, rule = %pattern, "Created group rule");
        self.group_rules.insert(
            id,
            GroupRule {
                id,
                group_id,
                rule: pattern,
                created_at: now.clone(),
                updated_at: now,
            },
        );
        Ok(id)
    }

    pub fn delete_group_rule(&mut self, id: GroupRuleId) -> InventoryResult<()> {
        self.group_rules
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| InventoryError::not_found("group rule", id))
    }

    /// Manually add a host to a group. Returns `false` if it already was a member.
    pub fn add_host_to_group(&mut self, group_id: GroupId, host_id: HostId) -> InventoryResult<bool> {
        if !self.groups.contains_key(&group_id) {
            return Err(InventoryError::not_found("group", group_id));
        }
        if !self.hosts.contains_key(&host_id) {
            return Err(InventoryError::not_found("host", host_id));
        }
        Ok(self.add_membership(group_id, host_id))
    }

    /// Remove a host from a group. Returns `false` if it was not a member.
    pub fn remove_host_from_group(&mut self, group_id: GroupId, host_id: HostId) -> bool {
        let before = self.memberships.len();
        self.memberships
            .retain(|m| !(m.group_id == group_id && m.host_id == host_id));
        self.memberships.len() != before
    }
}

/// Blank IP addresses count as absent
fn normalize_ip(ip: Option<&str>) -> Option<&str> {
    ip.map(str::trim).filter(|ip| !ip.is_empty())
}
