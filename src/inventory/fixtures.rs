//! Shared test data.

use super::Inventory;
use crate::db::{EnvironmentId, HostId};

pub const KEY_A: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQDIsM1Grbm alice@laptop";
pub const KEY_B: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQCxqV9Rzz bob@laptop";
pub const KEY_C: &str = "ecdsa-sha2-nistp256 AAAAE2VjZHNhLXNoYTItbmlzdHAyNTYAAAAI carol@desk";

/// Keys `A`, `B`, `C`, environment `prod` and host `web1` in it
pub fn inventory_with_host() -> (Inventory, EnvironmentId, HostId) {
    let mut inv = Inventory::new();
    inv.create_key("Key A", KEY_A).unwrap();
    inv.create_key("Key B", KEY_B).unwrap();
    inv.create_key("Key C", KEY_C).unwrap();
    let prod = inv.create_environment("prod").unwrap();
    let web1 = inv.create_host("web1", Some("10.0.0.1"), prod).unwrap();
    (inv, prod, web1)
}
