use thiserror::Error;

use crate::db::ScopeKind;

/// Errors raised by inventory mutations and queries.
///
/// A failing call never leaves the inventory partially modified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("parent {} not found", .0.label())]
    ParentNotFound(ScopeKind),

    #[error("Can not delete environment {environment}: {hosts} host(s) still use it")]
    DeleteInUse { environment: String, hosts: usize },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

impl InventoryError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        InventoryError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        InventoryError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;
