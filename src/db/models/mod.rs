//! Database models split into domain-specific modules.

pub mod account;
pub mod common;
pub mod environment;
pub mod group;
pub mod host;
pub mod ssh_key;

pub use account::*;
pub use common::*;
pub use environment::*;
pub use group::*;
pub use host::*;
pub use ssh_key::*;
