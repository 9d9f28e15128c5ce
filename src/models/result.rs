// src/models/result.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Represents the 'results' table in the database.
/// At most one row exists per (user, exercise) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseResult {
    pub id: Uuid,
    pub user_id: Uuid,
    pub exercise_id: Uuid,
    pub obtained_marks: f64,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for submitting the marks a user obtained on an exercise.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitResultRequest {
    #[validate(range(min = 0.0, message = "Obtained marks cannot be negative."))]
    pub obtained_marks: f64,
}
