// src/models/question.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub exercise_id: Uuid,
    pub question: Option<String>,

    /// Stored as text, summed as an integer.
    pub marks: String,

    pub activated: bool,
    pub deleted: bool,
}

/// DTO for a partial question update.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct QuestionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 2000, message = "Question text must be between 1 and 2000 characters."))]
    pub question: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = validate_marks))]
    pub marks: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

fn validate_marks(marks: &str) -> Result<(), validator::ValidationError> {
    // summed as a 32-bit integer
    match marks.trim().parse::<i32>() {
        Ok(m) if m >= 0 => Ok(()),
        _ => Err(validator::ValidationError::new("marks_not_a_number")
            .with_message("Marks must be a non-negative whole number.".into())),
    }
}
