// src/handlers/exercises.rs

use axum::{
    Json,
    extract::{Path, Query as QueryParams, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        exercise::{ExercisePatch, ExerciseView, exercise_attributes},
        question::{Question, QuestionPatch},
    },
    services::{
        exercises::{
            can_activate_exercise, get_exercise, recompute_total_marks, update_exercise,
            update_question,
        },
        query::{find_and_count_all, find_one},
    },
    store::{Direction, Entity, Query, SharedGateway, StoreTransaction, TxMode},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

/// Lists the live exercises of a language, paginated.
pub async fn list_language_exercises(
    State(store): State<SharedGateway>,
    Path(language_id): Path<Uuid>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut query = Query::new()
        .select(exercise_attributes())
        .eq("language_id", language_id.to_string())
        .eq("deleted", false)
        .order_by("name", Direction::Asc)
        .limit(params.limit.unwrap_or(20).min(100));
    if let Some(offset) = params.offset {
        query = query.offset(offset);
    }

    let (count, rows): (i64, Vec<ExerciseView>) =
        find_and_count_all(store.as_ref(), Entity::Exercises, &query).await?;

    Ok(Json(serde_json::json!({
        "count": count,
        "rows": rows,
    })))
}

pub async fn get_exercise_details(
    State(store): State<SharedGateway>,
    Path(exercise_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(get_exercise(store.as_ref(), exercise_id).await?))
}

/// Updates an exercise.
/// Admin only. Activating requires questions and a non-zero weightage.
pub async fn update_exercise_details(
    State(store): State<SharedGateway>,
    Path(exercise_id): Path<Uuid>,
    Json(mut body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    // weightage may arrive as a number or a numeric string; null counts as absent
    let weightage = body.get("exercise_weightage").filter(|v| !v.is_null()).cloned();
    if let Some(Value::String(s)) = &weightage {
        let parsed: f64 = s
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest("exercise_weightage must be a number".to_string()))?;
        body["exercise_weightage"] = Value::from(parsed);
    }
    let patch: ExercisePatch = serde_json::from_value(body)?;

    let current = get_exercise(store.as_ref(), exercise_id).await?;

    if patch.activated == Some(true) {
        let weightage = weightage.unwrap_or_else(|| Value::from(current.exercise_weightage));
        can_activate_exercise(store.as_ref(), exercise_id, &weightage).await?;
    }

    let mut tx = store.begin(TxMode::Immediate).await?;
    update_exercise(store.as_ref(), exercise_id, &patch, Some(&mut tx)).await?;
    tx.commit().await?;

    Ok(Json(get_exercise(store.as_ref(), exercise_id).await?))
}

/// Updates a question, then refreshes its exercise's total marks.
/// Admin only.
pub async fn update_question_details(
    State(store): State<SharedGateway>,
    Path(question_id): Path<Uuid>,
    Json(patch): Json<QuestionPatch>,
) -> Result<impl IntoResponse, AppError> {
    let question: Question = find_one(
        store.as_ref(),
        Entity::Questions,
        &Query::new().eq("id", question_id.to_string()),
    )
    .await?
    .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    let mut tx = store.begin(TxMode::Immediate).await?;
    update_question(store.as_ref(), question_id, &patch, Some(&mut tx)).await?;
    tx.commit().await?;

    let total_marks = recompute_total_marks(store.as_ref(), question.exercise_id).await?;

    Ok(Json(serde_json::json!({
        "question_id": question_id,
        "exercise_id": question.exercise_id,
        "total_marks": total_marks,
    })))
}

/// Recomputes an exercise's total marks from its questions.
/// Admin only.
pub async fn refresh_total_marks(
    State(store): State<SharedGateway>,
    Path(exercise_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    get_exercise(store.as_ref(), exercise_id).await?;
    let total_marks = recompute_total_marks(store.as_ref(), exercise_id).await?;

    Ok(Json(serde_json::json!({
        "exercise_id": exercise_id,
        "total_marks": total_marks,
    })))
}
