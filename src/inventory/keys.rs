//! Key store: SSH keys, keyrings and keyring contents.

use tracing::{debug, info};

use super::validation::{validate_key_name, validate_ssh_public_key};
use super::{check, Inventory, InventoryError, InventoryResult};
use crate::db::{timestamp, KeyId, KeyringId, SshKey, SshKeyring};

impl Inventory {
    /// Add a new key. Name and material are trimmed before validation.
    pub fn create_key(&mut self, name: &str, material: &str) -> InventoryResult<KeyId> {
        let name = name.trim();
        let material = material.trim();
        self.check_key(None, name, material)?;

        let id = KeyId(self.allocate_id());
        let now = timestamp();
        self.keys.insert(
            id,
            SshKey {
                id,
                name: name.to_string(),
                material: material.to_string(),
                created_at: now.clone(),
                updated_at: now,
            },
        );
        info!(key = %name, "Created SSH key");
        Ok(id)
    }

    /// Replace name and material of an existing key
    pub fn update_key(&mut self, id: KeyId, name: &str, material: &str) -> InventoryResult<()> {
        if !self.keys.contains_key(&id) {
            return Err(InventoryError::not_found("ssh key", id));
        }
        let name = name.trim();
        let material = material.trim();
        self.check_key(Some(id), name, material)?;

        if let Some(key) = self.keys.get_mut(&id) {
            key.name = name.to_string();
            key.material = material.to_string();
            key.updated_at = timestamp();
        }
        Ok(())
    }

    /// Delete a key and drop every keyring and account reference to it
    pub fn delete_key(&mut self, id: KeyId) -> InventoryResult<()> {
        let key = self
            .keys
            .remove(&id)
            .ok_or_else(|| InventoryError::not_found("ssh key", id))?;

        for ring in self.keyrings.values_mut() {
            ring.keys.retain(|k| *k != id);
        }
        for account in self.accounts.values_mut() {
            account.keys.retain(|k| *k != id);
        }
        info!(key = %key.name, "Deleted SSH key");
        Ok(())
    }

    fn check_key(&self, id: Option<KeyId>, name: &str, material: &str) -> InventoryResult<()> {
        check("name", validate_key_name(name))?;
        check("sshkey", validate_ssh_public_key(material))?;
        if self
            .keys
            .values()
            .any(|k| k.name == name && Some(k.id) != id)
        {
            return Err(InventoryError::validation(
                "name",
                "SSH Key with this name already exists.",
            ));
        }
        Ok(())
    }

    pub fn create_keyring(&mut self, name: &str) -> InventoryResult<KeyringId> {
        let name = name.trim();
        self.check_keyring_name(None, name)?;

        let id = KeyringId(self.allocate_id());
        let now = timestamp();
        self.keyrings.insert(
            id,
            SshKeyring {
                id,
                name: name.to_string(),
                keys: Vec::new(),
                created_at: now.clone(),
                updated_at: now,
            },
        );
        info!(keyring = %name, "Created SSH keyring");
        Ok(id)
    }

    pub fn rename_keyring(&mut self, id: KeyringId, name: &str) -> InventoryResult<()> {
        if !self.keyrings.contains_key(&id) {
            return Err(InventoryError::not_found("ssh keyring", id));
        }
        let name = name.trim();
        self.check_keyring_name(Some(id), name)?;

        if let Some(ring) = self.keyrings.get_mut(&id) {
            ring.name = name.to_string();
            ring.updated_at = timestamp();
        }
        Ok(())
    }

    /// Delete a keyring and detach it from every account
    pub fn delete_keyring(&mut self, id: KeyringId) -> InventoryResult<()> {
        let ring = self
            .keyrings
            .remove(&id)
            .ok_or_else(|| InventoryError::not_found("ssh keyring", id))?;

        for account in self.accounts.values_mut() {
            account.keyrings.retain(|r| *r != id);
        }
        info!(keyring = %ring.name, "Deleted SSH keyring");
        Ok(())
    }

    fn check_keyring_name(&self, id: Option<KeyringId>, name: &str) -> InventoryResult<()> {
        check("name", validate_key_name(name))?;
        if self
            .keyrings
            .values()
            .any(|r| r.name == name && Some(r.id) != id)
        {
            return Err(InventoryError::validation(
                "name",
                "SSH Keyring with this name already exists.",
            ));
        }
        Ok(())
    }

    /// Replace the keys of a keyring with the named keys, in the given order.
    ///
    /// Names that do not match a key are skipped without error; repeated
    /// names are added once.
    pub fn replace_keyring_contents<S: AsRef<str>>(
        &mut self,
        id: KeyringId,
        key_names: &[S],
    ) -> InventoryResult<()> {
        if !self.keyrings.contains_key(&id) {
            return Err(InventoryError::not_found("ssh keyring", id));
        }
        let keys = self.lookup_keys(key_names);

        if let Some(ring) = self.keyrings.get_mut(&id) {
            ring.keys = keys;
            ring.updated_at = timestamp();
        }
        Ok(())
    }

    /// Resolve key names to ids, skipping unknown and repeated names
    pub(super) fn lookup_keys<S: AsRef<str>>(&self, key_names: &[S]) -> Vec<KeyId> {
        let mut ids = Vec::with_capacity(key_names.len());
        for name in key_names {
            let name = name.as_ref().trim();
            match self.key_by_name(name) {
                Some(key) if !ids.contains(&key.id) => ids.push(key.id),
                Some(_) => {}
                None => debug!(key = %name, "Skipping unknown SSH key name"),
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{inventory_with_host, KEY_A, KEY_B, KEY_C};
    use super::*;
    use crate::db::Scope;

    #[test]
    fn test_create_key_trims_input() {
        let mut inv = Inventory::new();
        let id = inv
            .create_key("  Foo Bar ", &format!("  {}\n", KEY_A))
            .unwrap();

        let key = inv.key(id).unwrap();
        assert_eq!(key.name, "Foo Bar");
        assert_eq!(key.material, KEY_A);
        assert_eq!(key.entry(), format!("{} Foo Bar", KEY_A));
    }

    #[test]
    fn test_create_key_rejects_invalid_input() {
        let mut inv = Inventory::new();

        let err = inv.create_key("fsdf#+fds", KEY_A).unwrap_err();
        assert!(matches!(err, InventoryError::Validation { field: "name", .. }));

        let err = inv.create_key("Alice", "ssh-foo AAAA alice").unwrap_err();
        assert!(matches!(err, InventoryError::Validation { field: "sshkey", .. }));

        let multi = format!("{}\n{}", KEY_A, KEY_B);
        assert!(inv.create_key("Alice", &multi).is_err());

        assert_eq!(inv.keys().count(), 0);
    }

    #[test]
    fn test_key_names_are_unique() {
        let mut inv = Inventory::new();
        inv.create_key("Alice", KEY_A).unwrap();
        let err = inv.create_key("Alice", KEY_B).unwrap_err();
        assert!(matches!(err, InventoryError::Validation { field: "name", .. }));
    }

    #[test]
    fn test_update_key() {
        let mut inv = Inventory::new();
        let alice = inv.create_key("Alice", KEY_A).unwrap();
        inv.create_key("Bob", KEY_B).unwrap();

        inv.update_key(alice, "Alice Old", KEY_C).unwrap();
        assert_eq!(inv.key(alice).unwrap().material, KEY_C);

        // renaming onto another key's name fails and changes nothing
        assert!(inv.update_key(alice, "Bob", KEY_A).is_err());
        assert_eq!(inv.key(alice).unwrap().name, "Alice Old");

        // keeping its own name is fine
        inv.update_key(alice, "Alice Old", KEY_A).unwrap();

        assert_eq!(
            inv.update_key(KeyId(999), "Nobody", KEY_A).unwrap_err(),
            InventoryError::not_found("ssh key", KeyId(999))
        );
    }

    #[test]
    fn test_replace_keyring_contents_skips_unknown_names() {
        let mut inv = Inventory::new();
        let a = inv.create_key("Alice", KEY_A).unwrap();
        let b = inv.create_key("Bob", KEY_B).unwrap();
        let ring = inv.create_keyring("Web Devs").unwrap();

        inv.replace_keyring_contents(ring, &["Bob", "Nobody", "Alice", "Bob"])
            .unwrap();
        assert_eq!(inv.keyring(ring).unwrap().keys, vec![b, a]);
    }

    #[test]
    fn test_replace_keyring_contents_is_idempotent() {
        let mut inv = Inventory::new();
        inv.create_key("Alice", KEY_A).unwrap();
        inv.create_key("Bob", KEY_B).unwrap();
        let ring = inv.create_keyring("Web Devs").unwrap();

        inv.replace_keyring_contents(ring, &["Alice", "Bob"]).unwrap();
        let once = inv.keyring(ring).unwrap().keys.clone();
        inv.replace_keyring_contents(ring, &["Alice", "Bob"]).unwrap();
        assert_eq!(inv.keyring(ring).unwrap().keys, once);

        // replacing clears the previous membership
        inv.replace_keyring_contents(ring, &["Bob"]).unwrap();
        assert_eq!(inv.keyring(ring).unwrap().keys.len(), 1);
        inv.replace_keyring_contents::<&str>(ring, &[]).unwrap();
        assert!(inv.keyring(ring).unwrap().keys.is_empty());
    }

    #[test]
    fn test_keyring_names() {
        let mut inv = Inventory::new();
        inv.create_keyring("All Web Devs").unwrap();
        assert!(inv.create_keyring("All Web Devs").is_err());
        assert!(inv.create_keyring("fsdf#+fdsf").is_err());

        let ring = inv.create_keyring("Ops").unwrap();
        inv.rename_keyring(ring, "Operations").unwrap();
        assert_eq!(inv.keyring_names(), vec!["All Web Devs", "Operations"]);
    }

    #[test]
    fn test_delete_key_removes_references() {
        let (mut inv, _prod, web1) = inventory_with_host();
        let a = inv.key_by_name("Key A").unwrap().id;
        let ring = inv.create_keyring("Everyone").unwrap();
        inv.replace_keyring_contents(ring, &["Key A", "Key B"]).unwrap();
        let acc = inv.create_account("deploy", Scope::Host(web1)).unwrap();
        inv.replace_keys(acc, &["Key A", "Key C"]).unwrap();

        inv.delete_key(a).unwrap();

        assert!(inv.key(a).is_none());
        assert!(!inv.keyring(ring).unwrap().keys.contains(&a));
        assert!(!inv.account(acc).unwrap().keys.contains(&a));
        assert_eq!(inv.account(acc).unwrap().keys.len(), 1);
    }

    #[test]
    fn test_delete_keyring_detaches_accounts() {
        let (mut inv, prod, _web1) = inventory_with_host();
        let ring = inv.create_keyring("Everyone").unwrap();
        let acc = inv
            .create_account("root", Scope::Environment(prod))
            .unwrap();
        inv.replace_keyrings(acc, &["Everyone"]).unwrap();

        inv.delete_keyring(ring).unwrap();
        assert!(inv.account(acc).unwrap().keyrings.is_empty());
        assert!(inv.delete_keyring(ring).is_err());
    }
}
