//! Account binding store: SSH accounts, their scope and key references.

use tracing::{debug, info};

use super::validation::validate_account_name;
use super::{check, Inventory, InventoryError, InventoryResult};
use crate::db::{
    timestamp, AccountAvailableId, AccountId, Environment, Group, Host, KeyringId, Scope,
    SshAccount, SshAccountAvailable,
};

/// The entity an account's [`Scope`] points at
#[derive(Debug, Clone, Copy)]
pub enum ScopeObject<'a> {
    Environment(&'a Environment),
    Host(&'a Host),
    Group(&'a Group),
}

impl ScopeObject<'_> {
    pub fn name(&self) -> &str {
        match self {
            ScopeObject::Environment(env) => &env.name,
            ScopeObject::Host(host) => &host.name,
            ScopeObject::Group(group) => &group.name,
        }
    }
}

impl Inventory {
    /// Look up the object a scope refers to
    pub fn resolve_scope(&self, scope: &Scope) -> InventoryResult<ScopeObject<'_>> {
        let object = match scope {
            Scope::Environment(id) => self.environments.get(id).map(ScopeObject::Environment),
            Scope::Host(id) => self.hosts.get(id).map(ScopeObject::Host),
            Scope::Group(id) => self.groups.get(id).map(ScopeObject::Group),
        };
        object.ok_or(InventoryError::ParentNotFound(scope.kind()))
    }

    /// Bind a new account to a scope object
    pub fn create_account(&mut self, name: &str, scope: Scope) -> InventoryResult<AccountId> {
        let name = name.trim();
        self.check_account(None, name, scope)?;

        let id = AccountId(self.allocate_id());
        let now = timestamp();
        self.accounts.insert(
            id,
            SshAccount {
                id,
                name: name.to_string(),
                scope,
                keys: Vec::new(),
                keyrings: Vec::new(),
                created_at: now.clone(),
                updated_at: now,
            },
        );
        info!(account = %name, scope = %scope, "Created SSH account");
        Ok(id)
    }

    /// Rename an account or move it to another scope object
    pub fn update_account(&mut self, id: AccountId, name: &str, scope: Scope) -> InventoryResult<()> {
        if !self.accounts.contains_key(&id) {
            return Err(InventoryError::not_found("ssh account", id));
        }
        let name = name.trim();
        self.check_account(Some(id), name, scope)?;

        if let Some(account) = self.accounts.get_mut(&id) {
            account.name = name.to_string();
            account.scope = scope;
            account.updated_at = timestamp();
        }
        Ok(())
    }

    pub fn delete_account(&mut self, id: AccountId) -> InventoryResult<()> {
        let account = self
            .accounts
            .remove(&id)
            .ok_or_else(|| InventoryError::not_found("ssh account", id))?;
        info!(account = %account.name, scope = %account.scope, "Deleted SSH account");
        Ok(())
    }

    /// Remove every account bound to `scope`, returning how many were removed
    pub(super) fn delete_accounts_for_scope(&mut self, scope: Scope) -> usize {
        let before = self.accounts.len();
        self.accounts.retain(|_, account| account.scope != scope);
        before - self.accounts.len()
    }

    fn check_account(&self, id: Option<AccountId>, name: &str, scope: Scope) -> InventoryResult<()> {
        check("name", validate_account_name(name))?;
        self.resolve_scope(&scope)?;
        if self
            .accounts
            .values()
            .any(|a| a.name == name && a.scope == scope && Some(a.id) != id)
        {
            return Err(InventoryError::validation(
                "name",
                format!("SSH account {} already exists for {}", name, scope),
            ));
        }
        Ok(())
    }

    /// Replace the direct keys of an account, skipping unknown names
    pub fn replace_keys<S: AsRef<str>>(&mut self, id: AccountId, key_names: &[S]) -> InventoryResult<()> {
        if !self.accounts.contains_key(&id) {
            return Err(InventoryError::not_found("ssh account", id));
        }
        let keys = self.lookup_keys(key_names);

        if let Some(account) = self.accounts.get_mut(&id) {
            account.keys = keys;
            account.updated_at = timestamp();
        }
        Ok(())
    }

    /// Replace the keyrings of an account, skipping unknown names
    pub fn replace_keyrings<S: AsRef<str>>(
        &mut self,
        id: AccountId,
        keyring_names: &[S],
    ) -> InventoryResult<()> {
        if !self.accounts.contains_key(&id) {
            return Err(InventoryError::not_found("ssh account", id));
        }

        let mut keyrings: Vec<KeyringId> = Vec::with_capacity(keyring_names.len());
        for name in keyring_names {
            let name = name.as_ref().trim();
            match self.keyring_by_name(name) {
                Some(ring) if !keyrings.contains(&ring.id) => keyrings.push(ring.id),
                Some(_) => {}
                None => debug!(keyring = %name, "Skipping unknown SSH keyring name"),
            }
        }

        if let Some(account) = self.accounts.get_mut(&id) {
            account.keyrings = keyrings;
            account.updated_at = timestamp();
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Available account names
    // -------------------------------------------------------------------------

    pub fn create_account_available(&mut self, name: &str) -> InventoryResult<AccountAvailableId> {
        let name = name.trim();
        check("name", validate_account_name(name))?;
        if self.account_available_exists(name) {
            return Err(InventoryError::validation(
                "name",
                "Ssh account available with this account name already exists.",
            ));
        }

        let id = AccountAvailableId(self.allocate_id());
        self.accounts_available.insert(
            id,
            SshAccountAvailable {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    pub fn delete_account_available(&mut self, id: AccountAvailableId) -> InventoryResult<()> {
        self.accounts_available
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| InventoryError::not_found("available account", id))
    }

    pub fn account_available_exists(&self, name: &str) -> bool {
        self.accounts_available.values().any(|a| a.name == name)
    }
}
