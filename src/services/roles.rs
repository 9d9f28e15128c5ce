// src/services/roles.rs

use uuid::Uuid;

use crate::{
    error::AppError,
    models::role::UserRoleLabel,
    services::query::find_all,
    store::{Direction, Entity, Gateway, Query},
};

/// Role assignments of a user in assignment order, via `user_roles` joined to `roles`.
///
/// Fails with `NotFound` when the user has no roles at all.
pub async fn get_roles(store: &dyn Gateway, user_id: Uuid) -> Result<Vec<UserRoleLabel>, AppError> {
    let query = Query::new()
        .select(["role_id"])
        .eq("user_id", user_id.to_string())
        .include(Entity::Roles, &["type"])
        .order_by("created_at", Direction::Asc);

    let rows: Vec<UserRoleLabel> = find_all(store, Entity::UserRoles, &query).await?;
    if rows.is_empty() {
        return Err(AppError::NotFound("User roles not found".to_string()));
    }

    Ok(rows)
}

/// True if any of the user's roles is in `candidates`.
pub async fn has_any_role(
    store: &dyn Gateway,
    user_id: Uuid,
    candidates: &[&str],
) -> Result<bool, AppError> {
    let roles = get_roles(store, user_id).await?;
    Ok(roles
        .iter()
        .filter_map(|r| r.role_type.as_deref())
        .any(|r| candidates.contains(&r)))
}

/// Just the role labels.
pub async fn roles_array(store: &dyn Gateway, user_id: Uuid) -> Result<Vec<String>, AppError> {
    let roles = get_roles(store, user_id).await?;
    Ok(roles.into_iter().filter_map(|r| r.role_type).collect())
}
