//! Snapshot persistence of an [`Inventory`].
//!
//! The inventory is the source of truth while the process runs. Saving
//! rewrites every table inside one transaction; loading reads them back and
//! rebuilds the inventory, re-checking every reference. Writers that start
//! from the stored state go through [`update_inventory`], which holds the
//! database write lock from the load until the save commits.

use anyhow::{Context, Result};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::{debug, info};

use super::models::{
    AccountId, Environment, Group, GroupId, GroupRule, Host, HostId, KeyId, KeyringId, SshAccount,
    SshAccountAvailable, SshKey, SshKeyring,
};
use super::DbPool;
use crate::inventory::{Inventory, Membership, Snapshot};

/// Tables in delete order: referencing tables first
const TABLES: [&str; 12] = [
    "ssh_account_keyrings",
    "ssh_account_keys",
    "ssh_accounts",
    "ssh_accounts_available",
    "group_rules",
    "group_hosts",
    "host_groups",
    "hosts",
    "environments",
    "ssh_keyring_keys",
    "ssh_keyrings",
    "ssh_keys",
];

/// Read the whole inventory from the database
pub async fn load_inventory(pool: &DbPool) -> Result<Inventory> {
    // one read transaction, so every table comes from the same state
    let mut tx = pool.begin().await?;
    let inventory = read_inventory(&mut *tx).await?;
    tx.commit().await?;
    Ok(inventory)
}

/// Replace the stored inventory with `inventory`, atomically.
///
/// Overwrites whatever is stored; use [`update_inventory`] to change the stored state.
pub async fn save_inventory(pool: &DbPool, inventory: &Inventory) -> Result<()> {
    let snapshot = inventory.snapshot();
    let mut tx = pool.begin().await?;
    write_snapshot(&mut *tx, &snapshot).await?;
    tx.commit().await.context("Failed to commit inventory")?;
    Ok(())
}

/// Load the stored inventory, apply `apply` to it and save the result, as one
/// `BEGIN IMMEDIATE` transaction.
///
/// Concurrent updates are serialized by SQLite's write lock, so none of them
/// is lost. Nothing is written when `apply` fails or leaves the inventory unchanged.
pub async fn update_inventory<T, F>(pool: &DbPool, apply: F) -> Result<T>
where
    F: FnOnce(&mut Inventory) -> Result<T>,
{
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .context("Failed to lock the inventory for writing")?;

    let result = apply_locked(&mut *conn, apply).await;
    let finish = if result.is_ok() { "COMMIT" } else { "ROLLBACK" };
    if let Err(e) = sqlx::query(finish).execute(&mut *conn).await {
        if result.is_ok() {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
        }
        return Err(e).context("Failed to finish inventory update");
    }
    result
}

async fn apply_locked<T, F>(conn: &mut SqliteConnection, apply: F) -> Result<T>
where
    F: FnOnce(&mut Inventory) -> Result<T>,
{
    let mut inventory = read_inventory(conn).await?;
    let before = inventory.snapshot();
    let value = apply(&mut inventory)?;

    let after = inventory.snapshot();
    if after != before {
        write_snapshot(conn, &after).await?;
    } else {
        debug!("Inventory unchanged, nothing to save");
    }
    Ok(value)
}

async fn read_inventory(conn: &mut SqliteConnection) -> Result<Inventory> {
    let keys: Vec<SshKey> = sqlx::query_as(
        "SELECT id, name, sshkey, created_at, updated_at FROM ssh_keys ORDER BY id"
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut keyrings: Vec<SshKeyring> = sqlx::query_as(
        "SELECT id, name, created_at, updated_at FROM ssh_keyrings ORDER BY id"
    )
    .fetch_all(&mut *conn)
    .await?;
    let keyring_keys: Vec<(KeyringId, KeyId)> = sqlx::query_as(
        "SELECT keyring_id, key_id FROM ssh_keyring_keys ORDER BY keyring_id, position"
    )
    .fetch_all(&mut *conn)
    .await?;
    let mut by_keyring = group_pairs(keyring_keys);
    for ring in &mut keyrings {
        ring.keys = by_keyring.remove(&ring.id).unwrap_or_default();
    }

    let environments: Vec<Environment> = sqlx::query_as(
        "SELECT id, name, created_at, updated_at FROM environments ORDER BY id"
    )
    .fetch_all(&mut *conn)
    .await?;

    let hosts: Vec<Host> = sqlx::query_as(
        "SELECT id, name, ipaddress, environment_id, created_at, updated_at FROM hosts ORDER BY id"
    )
    .fetch_all(&mut *conn)
    .await?;

    let groups: Vec<Group> = sqlx::query_as(
        "SELECT id, name, created_at, updated_at FROM host_groups ORDER BY id"
    )
    .fetch_all(&mut *conn)
    .await?;

    let group_rules: Vec<GroupRule> = sqlx::query_as(
        "SELECT id, group_id, rule, created_at, updated_at FROM group_rules ORDER BY id"
    )
    .fetch_all(&mut *conn)
    .await?;

    let memberships: Vec<(GroupId, HostId)> = sqlx::query_as(
        "SELECT group_id, host_id FROM group_hosts ORDER BY position"
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut accounts: Vec<SshAccount> = sqlx::query_as(
        "SELECT id, name, obj_name, obj_id, created_at, updated_at FROM ssh_accounts ORDER BY id"
    )
    .fetch_all(&mut *conn)
    .await?;
    let account_keys: Vec<(AccountId, KeyId)> = sqlx::query_as(
        "SELECT account_id, key_id FROM ssh_account_keys ORDER BY account_id, position"
    )
    .fetch_all(&mut *conn)
    .await?;
    let account_keyrings: Vec<(AccountId, KeyringId)> = sqlx::query_as(
        "SELECT account_id, keyring_id FROM ssh_account_keyrings ORDER BY account_id, position"
    )
    .fetch_all(&mut *conn)
    .await?;
    let mut keys_by_account = group_pairs(account_keys);
    let mut keyrings_by_account = group_pairs(account_keyrings);
    for account in &mut accounts {
        account.keys = keys_by_account.remove(&account.id).unwrap_or_default();
        account.keyrings = keyrings_by_account.remove(&account.id).unwrap_or_default();
    }

    let accounts_available: Vec<SshAccountAvailable> = sqlx::query_as(
        "SELECT id, name FROM ssh_accounts_available ORDER BY id"
    )
    .fetch_all(&mut *conn)
    .await?;

    let snapshot = Snapshot {
        keys,
        keyrings,
        environments,
        hosts,
        groups,
        group_rules,
        memberships: memberships
            .into_iter()
            .map(|(group_id, host_id)| Membership { group_id, host_id })
            .collect(),
        accounts,
        accounts_available,
    };

    let inventory = Inventory::from_snapshot(snapshot).context("Stored inventory is inconsistent")?;
    info!(
        keys = inventory.keys().count(),
        hosts = inventory.hosts().count(),
        accounts = inventory.accounts().count(),
        "Loaded inventory"
    );
    Ok(inventory)
}

async fn write_snapshot(conn: &mut SqliteConnection, snapshot: &Snapshot) -> Result<()> {
    for table in TABLES {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *conn)
            .await?;
    }

    insert_keys(conn, snapshot).await?;
    insert_topology(conn, snapshot).await?;
    insert_accounts(conn, snapshot).await?;

    info!(
        keys = snapshot.keys.len(),
        hosts = snapshot.hosts.len(),
        accounts = snapshot.accounts.len(),
        "Saved inventory"
    );
    Ok(())
}

async fn insert_keys(conn: &mut SqliteConnection, snapshot: &Snapshot) -> Result<()> {
    for key in &snapshot.keys {
        sqlx::query(
            "INSERT INTO ssh_keys (id, name, sshkey, created_at, updated_at) VALUES (?, ?, ?, ?, ?)"
        )
        .bind(key.id)
        .bind(&key.name)
        .bind(&key.material)
        .bind(&key.created_at)
        .bind(&key.updated_at)
        .execute(&mut *conn)
        .await?;
    }

    for ring in &snapshot.keyrings {
        sqlx::query(
            "INSERT INTO ssh_keyrings (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)"
        )
        .bind(ring.id)
        .bind(&ring.name)
        .bind(&ring.created_at)
        .bind(&ring.updated_at)
        .execute(&mut *conn)
        .await?;

        for (position, key_id) in ring.keys.iter().enumerate() {
            sqlx::query(
                "INSERT INTO ssh_keyring_keys (keyring_id, key_id, position) VALUES (?, ?, ?)"
            )
            .bind(ring.id)
            .bind(*key_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

async fn insert_topology(conn: &mut SqliteConnection, snapshot: &Snapshot) -> Result<()> {
    for env in &snapshot.environments {
        sqlx::query(
            "INSERT INTO environments (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)"
        )
        .bind(env.id)
        .bind(&env.name)
        .bind(&env.created_at)
        .bind(&env.updated_at)
        .execute(&mut *conn)
        .await?;
    }

    for host in &snapshot.hosts {
        sqlx::query(
            r#"
            INSERT INTO hosts (id, name, ipaddress, environment_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(host.id)
        .bind(&host.name)
        .bind(host.ipaddress.as_deref())
        .bind(host.environment_id)
        .bind(&host.created_at)
        .bind(&host.updated_at)
        .execute(&mut *conn)
        .await?;
    }

    for group in &snapshot.groups {
        sqlx::query(
            "INSERT INTO host_groups (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)"
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.created_at)
        .bind(&group.updated_at)
        .execute(&mut *conn)
        .await?;
    }

    for rule in &snapshot.group_rules {
        sqlx::query(
            "INSERT INTO group_rules (id, group_id, rule, created_at, updated_at) VALUES (?, ?, ?, ?, ?)"
        )
        .bind(rule.id)
        .bind(rule.group_id)
        .bind(rule.rule.as_str())
        .bind(&rule.created_at)
        .bind(&rule.updated_at)
        .execute(&mut *conn)
        .await?;
    }

    for (position, membership) in snapshot.memberships.iter().enumerate() {
        sqlx::query("INSERT INTO group_hosts (group_id, host_id, position) VALUES (?, ?, ?)")
            .bind(membership.group_id)
            .bind(membership.host_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_accounts(conn: &mut SqliteConnection, snapshot: &Snapshot) -> Result<()> {
    for account in &snapshot.accounts {
        sqlx::query(
            r#"
            INSERT INTO ssh_accounts (id, name, obj_name, obj_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(account.scope.kind().as_str())
        .bind(account.scope.raw_id())
        .bind(&account.created_at)
        .bind(&account.updated_at)
        .execute(&mut *conn)
        .await?;

        for (position, key_id) in account.keys.iter().enumerate() {
            sqlx::query(
                "INSERT INTO ssh_account_keys (account_id, key_id, position) VALUES (?, ?, ?)"
            )
            .bind(account.id)
            .bind(*key_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
        }

        for (position, keyring_id) in account.keyrings.iter().enumerate() {
            sqlx::query(
                "INSERT INTO ssh_account_keyrings (account_id, keyring_id, position) VALUES (?, ?, ?)"
            )
            .bind(account.id)
            .bind(*keyring_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
        }
    }

    for available in &snapshot.accounts_available {
        sqlx::query("INSERT INTO ssh_accounts_available (id, name) VALUES (?, ?)")
            .bind(available.id)
            .bind(&available.name)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Collect `(owner, member)` rows, already in position order, per owner
fn group_pairs<O, M>(rows: Vec<(O, M)>) -> HashMap<O, Vec<M>>
where
    O: Eq + std::hash::Hash,
{
    let mut grouped: HashMap<O, Vec<M>> = HashMap::new();
    for (owner, member) in rows {
        grouped.entry(owner).or_default().push(member);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory, Scope};
    use crate::engine::authorized_keys;
    use crate::inventory::fixtures::{inventory_with_host, KEY_A, KEY_B};

    fn populated() -> Inventory {
        let (mut inv, prod, web1) = inventory_with_host();
        let ring = inv.create_keyring("Deployers").unwrap();
        inv.replace_keyring_contents(ring, &["Key C", "Key A"]).unwrap();

        let group = inv.create_group("Webservers").unwrap();
        inv.create_group_rule(group, "^web").unwrap();
        let other = inv.create_group("Monitored").unwrap();
        inv.add_host_to_group(other, web1).unwrap();
        inv.create_host("web2", None, prod).unwrap();
        inv.add_host_to_group(group, web1).unwrap();

        let acc = inv.create_account("deploy", Scope::Host(web1)).unwrap();
        inv.replace_keys(acc, &["Key B", "Key A"]).unwrap();
        inv.replace_keyrings(acc, &["Deployers"]).unwrap();
        inv.create_account("root", Scope::Group(group)).unwrap();
        inv.create_account_available("www-data").unwrap();
        inv
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let pool = init_memory().await.unwrap();
        let inv = populated();

        save_inventory(&pool, &inv).await.unwrap();
        let loaded = load_inventory(&pool).await.unwrap();

        assert_eq!(loaded.snapshot(), inv.snapshot());
        let web1 = loaded.host_by_name("web1").unwrap().id;
        assert_eq!(
            authorized_keys(&loaded, web1).unwrap(),
            authorized_keys(&inv, web1).unwrap()
        );
    }

    #[tokio::test]
    async fn test_save_replaces_previous_contents() {
        let pool = init_memory().await.unwrap();
        save_inventory(&pool, &populated()).await.unwrap();

        let mut smaller = Inventory::new();
        smaller.create_key("Only Key", KEY_A).unwrap();
        save_inventory(&pool, &smaller).await.unwrap();

        let loaded = load_inventory(&pool).await.unwrap();
        assert_eq!(loaded.key_names(), vec!["Only Key"]);
        assert_eq!(loaded.hosts().count(), 0);
        assert_eq!(loaded.accounts().count(), 0);
    }

    #[tokio::test]
    async fn test_update_inventory_keeps_concurrent_writes() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::db::init(dir.path()).await.unwrap();

        let add_alice = update_inventory(&pool, |inv| {
            inv.create_key("Alice", KEY_A)?;
            Ok(())
        });
        let add_bobby = update_inventory(&pool, |inv| {
            inv.create_key("Bobby", KEY_B)?;
            Ok(())
        });
        let (alice, bobby) = tokio::join!(add_alice, add_bobby);
        alice.unwrap();
        bobby.unwrap();

        let mut names = load_inventory(&pool).await.unwrap().key_names();
        names.sort();
        assert_eq!(names, vec!["Alice", "Bobby"]);
    }

    #[tokio::test]
    async fn test_update_inventory_rolls_back_on_error() {
        let pool = init_memory().await.unwrap();
        let inv = populated();
        save_inventory(&pool, &inv).await.unwrap();

        let result: Result<()> = update_inventory(&pool, |inv| {
            inv.create_key("Later Key", KEY_B)?;
            anyhow::bail!("import failed")
        })
        .await;
        assert!(result.is_err());

        let loaded = load_inventory(&pool).await.unwrap();
        assert_eq!(loaded.snapshot(), inv.snapshot());

        // the connection is usable again after the rollback
        let count = update_inventory(&pool, |inv| Ok(inv.keys().count())).await.unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_load_empty_database() {
        let pool = init_memory().await.unwrap();
        let loaded = load_inventory(&pool).await.unwrap();
        assert_eq!(loaded.snapshot(), Snapshot::default());
    }
}
