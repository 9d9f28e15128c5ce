// src/models/progress.rs

use serde::Serialize;
use uuid::Uuid;

/// Four-tier label derived from a weighted percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProficiencyLevel {
    Beginner,
    Intermediate,
    Advanced,
    Fluent,
}

/// One ranked row of a language progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProgress {
    pub id: Uuid,
    pub name: String,
    pub language_percentage: f64,
    pub proficiency_level: ProficiencyLevel,
}
