// src/models/user.rs

use serde::Deserialize;
use uuid::Uuid;

/// The `id, name` projection of the 'users' table used when ranking users.
/// Users are read-only from this service's point of view.
#[derive(Debug, Clone, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
}
