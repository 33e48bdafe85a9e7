//! Resolution engine.
//!
//! Pure, synchronous queries over an [`Inventory`](crate::inventory::Inventory)
//! snapshot: group rule matching, per-host key resolution, the filtered key
//! export and the key audit.

mod audit;
pub mod group_rules;
mod key_access;
mod ordered_set;
mod resolver;

pub use audit::*;
pub use key_access::*;
pub use ordered_set::OrderedSet;
pub use resolver::*;
