// src/handlers/roles.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{
    error::AppError, services::roles::roles_array, store::SharedGateway,
    utils::identity::CurrentUser,
};

/// Role labels of the logged-in user.
pub async fn get_my_roles(
    State(store): State<SharedGateway>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let roles = roles_array(store.as_ref(), user.id).await?;
    Ok(Json(roles))
}
