//! Host model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::{EnvironmentId, HostId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    pub ipaddress: Option<String>,
    pub environment_id: EnvironmentId,
    pub created_at: String,
    pub updated_at: String,
}
