// src/services/exercises.rs

use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        encode,
        exercise::{ExercisePatch, ExerciseView, exercise_attributes},
        question::QuestionPatch,
    },
    services::query::find_one,
    store::{Condition, Entity, Gateway, Op, Query, StoreTransaction, TxMode, Writer},
};

/// An open transaction a caller can thread through several updates.
pub type Tx = Box<dyn StoreTransaction>;

fn by_id(id: Uuid) -> Vec<Condition> {
    vec![Condition::new("id", Op::Eq, id.to_string())]
}

fn live_questions(exercise_id: Uuid) -> Query {
    Query::new()
        .eq("exercise_id", exercise_id.to_string())
        .eq("activated", true)
        .eq("deleted", false)
}

/// Returns `true` when the exercise is missing, inactive or deleted.
/// Used as a guard: `if is_exercise_unavailable(..) { reject }`.
pub async fn is_exercise_unavailable(store: &dyn Gateway, exercise_id: Uuid) -> Result<bool, AppError> {
    let query = Query::new()
        .select(["id"])
        .eq("id", exercise_id.to_string())
        .eq("activated", true)
        .eq("deleted", false);

    Ok(store.find_one(Entity::Exercises, &query).await?.is_none())
}

/// Loads one exercise in its client-facing shape.
pub async fn get_exercise(store: &dyn Gateway, exercise_id: Uuid) -> Result<ExerciseView, AppError> {
    let query = Query::new()
        .select(exercise_attributes())
        .eq("id", exercise_id.to_string());

    find_one(store, Entity::Exercises, &query)
        .await?
        .ok_or_else(|| AppError::NotFound("Exercise not found".to_string()))
}

/// Applies a partial update to an exercise, inside `tx` when given.
pub async fn update_exercise(
    store: &dyn Gateway,
    exercise_id: Uuid,
    patch: &ExercisePatch,
    tx: Option<&mut Tx>,
) -> Result<bool, AppError> {
    patch.validate()?;
    let fields = encode(patch)?;

    let affected = match tx {
        Some(tx) => tx.update(Entity::Exercises, &fields, &by_id(exercise_id)).await,
        None => store.update(Entity::Exercises, &fields, &by_id(exercise_id)).await,
    }
    .map_err(|e| {
        tracing::error!("Failed to update exercise {}: {}", exercise_id, e);
        AppError::from(e)
    })?;

    tracing::info!(%exercise_id, affected, "exercise updated");
    Ok(true)
}

/// Applies a partial update to a question, inside `tx` when given.
pub async fn update_question(
    store: &dyn Gateway,
    question_id: Uuid,
    patch: &QuestionPatch,
    tx: Option<&mut Tx>,
) -> Result<bool, AppError> {
    patch.validate()?;
    let fields = encode(patch)?;

    let affected = match tx {
        Some(tx) => tx.update(Entity::Questions, &fields, &by_id(question_id)).await,
        None => store.update(Entity::Questions, &fields, &by_id(question_id)).await,
    }
    .map_err(|e| {
        tracing::error!("Failed to update question {}: {}", question_id, e);
        AppError::from(e)
    })?;

    tracing::info!(%question_id, affected, "question updated");
    Ok(true)
}

/// Loose zero check: matches `0`, `0.0` and the string `"0"`.
fn is_zero_weightage(weightage: &Value) -> bool {
    match weightage {
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s == "0",
        _ => false,
    }
}

/// Checks an exercise may be activated with the given weightage.
///
/// * `NoQuestions` if it has no active, non-deleted question.
/// * `ZeroWeightage` if `weightage` is zero.
pub async fn can_activate_exercise(
    store: &dyn Gateway,
    exercise_id: Uuid,
    weightage: &Value,
) -> Result<bool, AppError> {
    let questions = store
        .count(Entity::Questions, &live_questions(exercise_id))
        .await?;

    if questions == 0 {
        tracing::warn!(%exercise_id, "activation rejected: no questions");
        return Err(AppError::NoQuestions);
    }
    if is_zero_weightage(weightage) {
        tracing::warn!(%exercise_id, "activation rejected: zero weightage");
        return Err(AppError::ZeroWeightage);
    }
    Ok(true)
}

/// Sum of the integer marks of the exercise's active, non-deleted questions.
pub async fn exercise_total_marks(store: &dyn Gateway, exercise_id: Uuid) -> Result<i64, AppError> {
    let total = store
        .sum(Entity::Questions, "marks", &live_questions(exercise_id))
        .await?;
    Ok(total.unwrap_or(0))
}

/// Recomputes and stores an exercise's `total_marks`. Returns the new total.
pub async fn recompute_total_marks(store: &dyn Gateway, exercise_id: Uuid) -> Result<i64, AppError> {
    let total = exercise_total_marks(store, exercise_id).await?;

    let mut tx = store.begin(TxMode::Deferred).await?;
    let fields = encode(&json!({ "total_marks": total }))?;
    tx.update(Entity::Exercises, &fields, &by_id(exercise_id))
        .await?;
    tx.commit().await?;

    tracing::info!(%exercise_id, total, "exercise total marks recomputed");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_weightage_accepts_number_or_string() {
        assert!(is_zero_weightage(&json!(0)));
        assert!(is_zero_weightage(&json!(0.0)));
        assert!(is_zero_weightage(&json!("0")));
        assert!(!is_zero_weightage(&json!("10")));
        assert!(!is_zero_weightage(&json!(25)));
        assert!(!is_zero_weightage(&Value::Null));
    }
}
