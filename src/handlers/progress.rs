// src/handlers/progress.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    services::progress::{ProgressScope, compute_progress},
    store::SharedGateway,
    utils::identity::CurrentUser,
};

/// Progress of the logged-in user in one language.
///
/// Returns a (one-element) ranked list of `{id, name, language_percentage, proficiency_level}`.
pub async fn get_user_progress(
    State(store): State<SharedGateway>,
    Extension(user): Extension<CurrentUser>,
    Path(language_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let progress =
        compute_progress(store.as_ref(), language_id, &ProgressScope::User(user.id)).await?;
    Ok(Json(progress))
}

/// Every active user ranked by their progress in one language.
pub async fn get_language_leaderboard(
    State(store): State<SharedGateway>,
    Path(language_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let progress = compute_progress(store.as_ref(), language_id, &ProgressScope::AllActive).await?;
    Ok(Json(progress))
}
