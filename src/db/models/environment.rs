//! Environment model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::EnvironmentId;

/// A deployment environment (`production`, `staging`, ...). Every host belongs to exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Environment {
    pub id: EnvironmentId,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}
