// src/models/exercise.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::store::Attribute;

/// The standard projection of an exercise returned to clients.
pub fn exercise_attributes() -> Vec<Attribute> {
    vec![
        Attribute::aliased("id", "exercise_id"),
        Attribute::aliased("name", "exercise_name"),
        "total_marks".into(),
        "exercise_weightage".into(),
        "activated".into(),
        "deleted".into(),
    ]
}

/// Row shape of [`exercise_attributes`].
///
/// `total_marks` caches the sum of the marks of the exercise's active,
/// non-deleted questions; `exercise_weightage` is the share of the
/// language's overall score the exercise is worth, in percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseView {
    pub exercise_id: Uuid,
    pub exercise_name: String,
    #[serde(default)]
    pub total_marks: i64,
    #[serde(default)]
    pub exercise_weightage: f64,
    pub activated: bool,
    pub deleted: bool,
}

/// The columns progress scoring needs from an exercise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExerciseWeighting {
    pub exercise_id: Uuid,
    #[serde(default)]
    pub total_marks: f64,
    #[serde(default)]
    pub exercise_weightage: f64,
}

/// DTO for a partial exercise update. Absent fields are left untouched.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct ExercisePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255, message = "Exercise name must be between 1 and 255 characters."))]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 100.0, message = "Exercise weightage must be between 0 and 100."))]
    pub exercise_weightage: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "Total marks cannot be negative."))]
    pub total_marks: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}
