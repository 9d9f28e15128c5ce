// tests/progress_tests.rs

mod common;

use common::*;
use lingo_backend::{
    error::AppError,
    models::progress::ProficiencyLevel,
    services::{
        progress::{ProgressScope, compute_progress},
        results::upsert_result,
        roles::{get_roles, has_any_role, roles_array},
    },
    store::{Entity, Gateway, MemoryStore, Query},
};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn single_user_progress_is_weighted() {
    let store = MemoryStore::new();
    let language = Uuid::new_v4();
    let ana = user(&store, "Ana").await;

    let grammar = exercise(&store, language, 50, 20.0).await;
    let vocab = exercise(&store, language, 10, 80.0).await;
    result(&store, ana, grammar, 25.0).await;
    result(&store, ana, vocab, 9.0).await;

    let progress = compute_progress(&store, language, &ProgressScope::User(ana))
        .await
        .unwrap();

    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].name, "Ana");
    // 25/50*20 + 9/10*80
    assert!((progress[0].language_percentage - 82.0).abs() < 1e-9);
    assert_eq!(progress[0].proficiency_level, ProficiencyLevel::Advanced);
}

#[tokio::test]
async fn results_outside_the_language_count_as_zero() {
    let store = MemoryStore::new();
    let spanish = Uuid::new_v4();
    let french = Uuid::new_v4();
    let ana = user(&store, "Ana").await;

    let es = exercise(&store, spanish, 10, 50.0).await;
    let fr = exercise(&store, french, 10, 50.0).await;
    result(&store, ana, es, 10.0).await;
    result(&store, ana, fr, 10.0).await;

    let progress = compute_progress(&store, spanish, &ProgressScope::User(ana))
        .await
        .unwrap();

    assert_eq!(progress[0].language_percentage, 50.0);
    assert_eq!(progress[0].proficiency_level, ProficiencyLevel::Intermediate);
}

#[tokio::test]
async fn user_without_results_is_a_beginner_at_zero() {
    let store = MemoryStore::new();
    let language = Uuid::new_v4();
    let ana = user(&store, "Ana").await;
    exercise(&store, language, 10, 100.0).await;

    let progress = compute_progress(&store, language, &ProgressScope::User(ana))
        .await
        .unwrap();

    assert_eq!(progress[0].language_percentage, 0.0);
    assert_eq!(progress[0].proficiency_level, ProficiencyLevel::Beginner);
}

#[tokio::test]
async fn inactive_or_deleted_users_are_skipped() {
    let store = MemoryStore::new();
    let language = Uuid::new_v4();
    let gone = insert(
        &store,
        Entity::Users,
        json!({ "name": "Gone", "deleted": true }),
    )
    .await;

    let progress = compute_progress(&store, language, &ProgressScope::User(gone))
        .await
        .unwrap();
    assert!(progress.is_empty());
}

#[tokio::test]
async fn leaderboard_is_sorted_with_stable_ties() {
    let store = MemoryStore::new();
    let language = Uuid::new_v4();
    let ex = exercise(&store, language, 100, 100.0).await;

    let mut ids = Vec::new();
    for (name, marks) in [("a", 30.0), ("b", 90.0), ("c", 90.0), ("d", 10.0)] {
        let id = user(&store, name).await;
        result(&store, id, ex, marks).await;
        ids.push(id);
    }

    let progress = compute_progress(&store, language, &ProgressScope::Users(ids))
        .await
        .unwrap();
    let names: Vec<&str> = progress.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["b", "c", "a", "d"]);

    let all = compute_progress(&store, language, &ProgressScope::AllActive)
        .await
        .unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn zero_total_marks_does_not_poison_the_percentage() {
    let store = MemoryStore::new();
    let language = Uuid::new_v4();
    let ana = user(&store, "Ana").await;
    let empty = exercise(&store, language, 0, 40.0).await;
    let full = exercise(&store, language, 10, 60.0).await;
    result(&store, ana, empty, 5.0).await;
    result(&store, ana, full, 10.0).await;

    let progress = compute_progress(&store, language, &ProgressScope::User(ana))
        .await
        .unwrap();
    assert_eq!(progress[0].language_percentage, 60.0);
}

#[tokio::test]
async fn upsert_keeps_one_row_with_latest_marks() {
    let store = MemoryStore::new();
    let ana = user(&store, "Ana").await;
    let ex = exercise(&store, Uuid::new_v4(), 20, 50.0).await;

    assert!(upsert_result(&store, ana, ex, 12.0).await.unwrap());
    assert!(upsert_result(&store, ana, ex, 17.0).await.unwrap());

    let query = Query::new()
        .eq("user_id", ana.to_string())
        .eq("exercise_id", ex.to_string());
    let rows = store.find_all(Entity::Results, &query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["obtained_marks"], json!(17.0));
}

#[tokio::test]
async fn upsert_for_unknown_exercise_is_a_persistence_error() {
    let store = MemoryStore::new();
    let ana = user(&store, "Ana").await;

    let err = upsert_result(&store, ana, Uuid::new_v4(), 3.0)
        .await
        .unwrap_err();

    match err {
        AppError::Persistence { message, .. } => {
            assert_eq!(message, "Foreign key constraint error")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.count(Entity::Results, &Query::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn role_checks() {
    let store = MemoryStore::new();
    let admin = role(&store, "admin").await;
    let learner = role(&store, "learner").await;
    let ana = user(&store, "Ana").await;
    let ben = user(&store, "Ben").await;
    grant(&store, ana, learner).await;
    grant(&store, ana, admin).await;
    grant(&store, ben, learner).await;

    assert_eq!(roles_array(&store, ana).await.unwrap(), ["learner", "admin"]);
    assert_eq!(get_roles(&store, ana).await.unwrap()[1].role_id, admin);
    assert!(has_any_role(&store, ana, &["admin"]).await.unwrap());
    assert!(!has_any_role(&store, ben, &["admin"]).await.unwrap());
    assert!(has_any_role(&store, ben, &["admin", "learner"]).await.unwrap());
}

#[tokio::test]
async fn no_roles_is_not_found_even_for_empty_candidates() {
    let store = MemoryStore::new();
    let ana = user(&store, "Ana").await;

    assert!(matches!(
        has_any_role(&store, ana, &[]).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(get_roles(&store, ana).await, Err(AppError::NotFound(_))));
}
