// src/models/role.rs

use serde::Deserialize;
use uuid::Uuid;

pub const ADMIN: &str = "admin";

/// A 'user_roles' row joined with its 'roles' label, e.g. 'admin' or 'learner'.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRoleLabel {
    pub role_id: Uuid,
    /// `None` only if the joined role row is missing.
    #[serde(rename = "role.type")]
    pub role_type: Option<String>,
}
