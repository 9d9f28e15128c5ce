// src/services/results.rs

use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::encode,
    store::{Condition, Entity, Gateway, Op, Query, StoreTransaction, TxMode, Writer},
};

/// Creates or updates the single result row of `(user_id, exercise_id)`.
///
/// The lookup happens first; the write runs in a deferred-constraint transaction.
/// Concurrent first submissions for the same pair can both take the create
/// path; which one survives is up to the database's constraints.
pub async fn upsert_result(
    store: &dyn Gateway,
    user_id: Uuid,
    exercise_id: Uuid,
    obtained_marks: f64,
) -> Result<bool, AppError> {
    let lookup = Query::new()
        .select(["id"])
        .eq("exercise_id", exercise_id.to_string())
        .eq("user_id", user_id.to_string());
    let existing = store.find_one(Entity::Results, &lookup).await?;

    let mut tx = store.begin(TxMode::Deferred).await?;

    match existing {
        Some(_) => {
            let conditions = [
                Condition::new("exercise_id", Op::Eq, exercise_id.to_string()),
                Condition::new("user_id", Op::Eq, user_id.to_string()),
            ];
            let patch = encode(&json!({ "obtained_marks": obtained_marks }))?;
            tx.update(Entity::Results, &patch, &conditions)
                .await
                .inspect_err(|e| tracing::error!("Failed to update result: {}", e))?;
            tracing::info!(%user_id, %exercise_id, obtained_marks, "result updated");
        }
        None => {
            let fields = encode(&json!({
                "obtained_marks": obtained_marks,
                "exercise_id": exercise_id,
                "user_id": user_id,
            }))?;
            let created = tx
                .create(Entity::Results, &fields)
                .await
                .inspect_err(|e| tracing::error!("Failed to create result: {}", e))?;

            let has_id = created
                .get("id")
                .and_then(|v| v.as_str())
                .is_some_and(|id| id.parse::<Uuid>().is_ok());
            if !has_id {
                return Err(AppError::ResultCreate);
            }
            tracing::info!(%user_id, %exercise_id, obtained_marks, "result created");
        }
    }

    tx.commit().await?;
    Ok(true)
}
