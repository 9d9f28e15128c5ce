// src/handlers/results.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::result::SubmitResultRequest,
    services::{exercises::is_exercise_unavailable, results::upsert_result},
    store::SharedGateway,
    utils::identity::CurrentUser,
};

/// Records the marks the logged-in user obtained on an exercise.
///
/// * Rejects inactive or deleted exercises with 404.
/// * Resubmitting replaces the previous marks.
pub async fn submit_result(
    State(store): State<SharedGateway>,
    Extension(user): Extension<CurrentUser>,
    Path(exercise_id): Path<Uuid>,
    Json(req): Json<SubmitResultRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if is_exercise_unavailable(store.as_ref(), exercise_id).await? {
        return Err(AppError::NotFound(
            "Exercise not found or not active".to_string(),
        ));
    }

    upsert_result(store.as_ref(), user.id, exercise_id, req.obtained_marks).await?;

    Ok(Json(serde_json::json!({
        "exercise_id": exercise_id,
        "obtained_marks": req.obtained_marks,
        "message": "Result saved successfully"
    })))
}
