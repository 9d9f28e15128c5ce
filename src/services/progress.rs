// src/services/progress.rs

//! Language progress: weighted percentage per user and its proficiency tier.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        exercise::ExerciseWeighting,
        progress::{ProficiencyLevel, UserProgress},
        result::ExerciseResult,
        user::UserSummary,
    },
    services::query::find_all,
    store::{Attribute, Entity, Gateway, Op, Query},
};

/// Which users a progress report covers.
#[derive(Debug, Clone)]
pub enum ProgressScope {
    /// A single user, e.g. the logged-in one.
    User(Uuid),
    Users(Vec<Uuid>),
    /// Every active, non-deleted user.
    AllActive,
}

/// What one result adds to the language percentage.
///
/// Results for exercises outside the language add nothing, and so do
/// exercises whose total marks are zero.
pub fn contribution(obtained_marks: f64, exercise: Option<&ExerciseWeighting>) -> f64 {
    match exercise {
        Some(e) if e.total_marks != 0.0 => {
            let value = (obtained_marks / e.total_marks) * e.exercise_weightage;
            if value.is_finite() { value } else { 0.0 }
        }
        _ => 0.0,
    }
}

/// Sum of the weighted contributions of `results`.
pub fn language_percentage(
    results: &[ExerciseResult],
    exercises: &HashMap<Uuid, ExerciseWeighting>,
) -> f64 {
    results
        .iter()
        .map(|r| contribution(r.obtained_marks, exercises.get(&r.exercise_id)))
        .sum()
}

/// Tier of a percentage. Anything outside `0..=100` is Beginner; inside,
/// the fractional part is dropped before comparing, so 90.99 is Advanced
/// and 91.0 is Fluent.
pub fn proficiency_level(percentage: f64) -> ProficiencyLevel {
    if !(0.0..=100.0).contains(&percentage) {
        return ProficiencyLevel::Beginner;
    }
    match percentage.trunc() {
        p if (91.0..=100.0).contains(&p) => ProficiencyLevel::Fluent,
        p if (71.0..=90.0).contains(&p) => ProficiencyLevel::Advanced,
        p if (41.0..=70.0).contains(&p) => ProficiencyLevel::Intermediate,
        _ => ProficiencyLevel::Beginner,
    }
}

/// Orders rows by percentage, highest first. Equal percentages keep their input order.
pub fn rank(mut rows: Vec<UserProgress>) -> Vec<UserProgress> {
    rows.sort_by(|a, b| {
        b.language_percentage
            .partial_cmp(&a.language_percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows
}

async fn load_users(store: &dyn Gateway, scope: &ProgressScope) -> Result<Vec<UserSummary>, AppError> {
    let query = Query::new().select(["id", "name"]);
    let query = match scope {
        ProgressScope::User(id) => query.eq("id", id.to_string()),
        ProgressScope::Users(ids) => query.filter(
            "id",
            Op::In,
            ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        ),
        ProgressScope::AllActive => query,
    }
    .eq("activated", true)
    .eq("deleted", false);

    find_all(store, Entity::Users, &query).await
}

/// Builds the progress report of `language_id` for the users in `scope`.
///
/// Any failed lookup aborts the whole report.
pub async fn compute_progress(
    store: &dyn Gateway,
    language_id: Uuid,
    scope: &ProgressScope,
) -> Result<Vec<UserProgress>, AppError> {
    let exercise_query = Query::new()
        .select([
            Attribute::aliased("id", "exercise_id"),
            "total_marks".into(),
            "exercise_weightage".into(),
        ])
        .eq("language_id", language_id.to_string());
    let exercises: Vec<ExerciseWeighting> =
        find_all(store, Entity::Exercises, &exercise_query).await?;
    let exercises: HashMap<Uuid, ExerciseWeighting> = exercises
        .into_iter()
        .map(|e| (e.exercise_id, e))
        .collect();

    let users = load_users(store, scope).await?;

    let mut rows = Vec::with_capacity(users.len());
    for user in users {
        let result_query = Query::new()
            .select(["id", "user_id", "exercise_id", "obtained_marks"])
            .eq("user_id", user.id.to_string());
        let results: Vec<ExerciseResult> = find_all(store, Entity::Results, &result_query).await?;

        let percentage = language_percentage(&results, &exercises);
        rows.push(UserProgress {
            id: user.id,
            name: user.name,
            language_percentage: percentage,
            proficiency_level: proficiency_level(percentage),
        });
    }

    tracing::debug!(%language_id, users = rows.len(), exercises = exercises.len(), "progress computed");
    Ok(rank(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weighting(total_marks: f64, exercise_weightage: f64) -> ExerciseWeighting {
        ExerciseWeighting {
            exercise_id: Uuid::new_v4(),
            total_marks,
            exercise_weightage,
        }
    }

    fn result_for(exercise_id: Uuid, obtained_marks: f64) -> ExerciseResult {
        ExerciseResult {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            exercise_id,
            obtained_marks,
            updated_at: None,
        }
    }

    fn row(name: &str, pct: f64) -> UserProgress {
        UserProgress {
            id: Uuid::new_v4(),
            name: name.to_string(),
            language_percentage: pct,
            proficiency_level: proficiency_level(pct),
        }
    }

    #[test]
    fn weighted_contribution() {
        let e = weighting(50.0, 20.0);
        assert_eq!(contribution(25.0, Some(&e)), 10.0);
    }

    #[test]
    fn unknown_exercise_contributes_nothing() {
        assert_eq!(contribution(25.0, None), 0.0);
    }

    #[test]
    fn zero_total_marks_contributes_nothing() {
        let e = weighting(0.0, 30.0);
        assert_eq!(contribution(5.0, Some(&e)), 0.0);
        assert_eq!(contribution(0.0, Some(&e)), 0.0);
    }

    #[test]
    fn percentage_sums_matching_results_only() {
        let a = weighting(50.0, 20.0);
        let b = weighting(10.0, 80.0);
        let results = vec![
            result_for(a.exercise_id, 25.0),
            result_for(b.exercise_id, 10.0),
            result_for(Uuid::new_v4(), 99.0),
        ];
        let exercises: HashMap<_, _> = [a, b].into_iter().map(|e| (e.exercise_id, e)).collect();

        assert_eq!(language_percentage(&results, &exercises), 90.0);
        assert_eq!(language_percentage(&[], &exercises), 0.0);
    }

    #[test]
    fn classification_boundaries() {
        use ProficiencyLevel::*;
        let cases = [
            (0.0, Beginner),
            (40.0, Beginner),
            (40.99, Beginner),
            (41.0, Intermediate),
            (70.0, Intermediate),
            (71.0, Advanced),
            (90.0, Advanced),
            (90.999, Advanced),
            (91.0, Fluent),
            (100.0, Fluent),
        ];
        for (pct, level) in cases {
            assert_eq!(proficiency_level(pct), level, "percentage {pct}");
        }
    }

    #[test]
    fn out_of_range_falls_back_to_beginner() {
        assert_eq!(proficiency_level(-5.0), ProficiencyLevel::Beginner);
        assert_eq!(proficiency_level(-0.5), ProficiencyLevel::Beginner);
        assert_eq!(proficiency_level(100.5), ProficiencyLevel::Beginner);
        assert_eq!(proficiency_level(101.0), ProficiencyLevel::Beginner);
        assert_eq!(proficiency_level(f64::NAN), ProficiencyLevel::Beginner);
        assert_eq!(proficiency_level(f64::INFINITY), ProficiencyLevel::Beginner);
    }

    #[test]
    fn rank_is_descending_and_stable() {
        let ranked = rank(vec![row("a", 30.0), row("b", 90.0), row("c", 90.0), row("d", 10.0)]);
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["b", "c", "a", "d"]);
    }
}
