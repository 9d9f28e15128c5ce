// tests/exercise_tests.rs

mod common;

use common::*;
use lingo_backend::{
    error::AppError,
    models::{
        exercise::{ExercisePatch, ExerciseView, exercise_attributes},
        question::QuestionPatch,
        role::ADMIN,
    },
    services::{
        exercises::{
            can_activate_exercise, exercise_total_marks, get_exercise, is_exercise_unavailable,
            recompute_total_marks, update_exercise, update_question,
        },
        query::{QueryMode, QueryOutput, find_and_count_all, query, query_by_name},
    },
    store::{Entity, Gateway, MemoryStore, Query, StoreTransaction, TxMode},
};
use serde_json::json;
use uuid::Uuid;

async fn load(store: &MemoryStore, id: Uuid) -> ExerciseView {
    get_exercise(store, id).await.expect("exercise exists")
}

#[tokio::test]
async fn total_marks_sums_live_questions_only() {
    let store = MemoryStore::new();
    let ex = exercise(&store, Uuid::new_v4(), 0, 50.0).await;
    question(&store, ex, "4").await;
    question(&store, ex, " 6 ").await;
    insert(
        &store,
        Entity::Questions,
        json!({ "exercise_id": ex, "marks": "100", "deleted": true }),
    )
    .await;
    insert(
        &store,
        Entity::Questions,
        json!({ "exercise_id": ex, "marks": "50", "activated": false }),
    )
    .await;

    assert_eq!(recompute_total_marks(&store, ex).await.unwrap(), 10);
    assert_eq!(load(&store, ex).await.total_marks, 10);
}

#[tokio::test]
async fn total_marks_is_zero_without_questions() {
    let store = MemoryStore::new();
    let ex = exercise(&store, Uuid::new_v4(), 35, 50.0).await;

    assert_eq!(exercise_total_marks(&store, ex).await.unwrap(), 0);
    recompute_total_marks(&store, ex).await.unwrap();
    assert_eq!(load(&store, ex).await.total_marks, 0);
}

#[tokio::test]
async fn unavailable_means_missing_inactive_or_deleted() {
    let store = MemoryStore::new();
    let language = Uuid::new_v4();
    let live = exercise(&store, language, 10, 10.0).await;
    let draft = insert(
        &store,
        Entity::Exercises,
        json!({ "name": "Draft", "language_id": language }),
    )
    .await;

    assert!(!is_exercise_unavailable(&store, live).await.unwrap());
    assert!(is_exercise_unavailable(&store, draft).await.unwrap());
    assert!(is_exercise_unavailable(&store, Uuid::new_v4()).await.unwrap());

    let patch = ExercisePatch {
        deleted: Some(true),
        ..Default::default()
    };
    update_exercise(&store, live, &patch, None).await.unwrap();
    assert!(is_exercise_unavailable(&store, live).await.unwrap());
}

#[tokio::test]
async fn activation_needs_questions_then_weightage() {
    let store = MemoryStore::new();
    let ex = exercise(&store, Uuid::new_v4(), 0, 0.0).await;

    assert!(matches!(
        can_activate_exercise(&store, ex, &json!(25)).await,
        Err(AppError::NoQuestions)
    ));

    question(&store, ex, "5").await;
    assert!(matches!(
        can_activate_exercise(&store, ex, &json!("0")).await,
        Err(AppError::ZeroWeightage)
    ));
    assert!(matches!(
        can_activate_exercise(&store, ex, &json!(0)).await,
        Err(AppError::ZeroWeightage)
    ));
    assert!(can_activate_exercise(&store, ex, &json!(25)).await.unwrap());
}

#[tokio::test]
async fn update_exercise_inside_caller_transaction() {
    let store = MemoryStore::new();
    let ex = exercise(&store, Uuid::new_v4(), 0, 10.0).await;

    let mut tx = store.begin(TxMode::Immediate).await.unwrap();
    let patch = ExercisePatch {
        name: Some("Past tense".to_string()),
        exercise_weightage: Some(30.0),
        ..Default::default()
    };
    update_exercise(&store, ex, &patch, Some(&mut tx)).await.unwrap();

    // not visible before commit
    assert_ne!(load(&store, ex).await.exercise_name, "Past tense");
    tx.commit().await.unwrap();

    let stored = load(&store, ex).await;
    assert_eq!(stored.exercise_name, "Past tense");
    assert_eq!(stored.exercise_weightage, 30.0);
}

#[tokio::test]
async fn invalid_patches_report_every_field() {
    let store = MemoryStore::new();
    let ex = exercise(&store, Uuid::new_v4(), 0, 10.0).await;

    let patch = ExercisePatch {
        name: Some(String::new()),
        exercise_weightage: Some(140.0),
        ..Default::default()
    };
    let err = update_exercise(&store, ex, &patch, None).await.unwrap_err();

    match err {
        AppError::Persistence { message, .. } => assert_eq!(
            message,
            "Exercise weightage must be between 0 and 100., Exercise name must be between 1 and 255 characters."
        ),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn question_updates_feed_total_marks() {
    let store = MemoryStore::new();
    let ex = exercise(&store, Uuid::new_v4(), 0, 10.0).await;
    let q = question(&store, ex, "2").await;

    let patch = QuestionPatch {
        marks: Some("7".to_string()),
        ..Default::default()
    };
    assert!(update_question(&store, q, &patch, None).await.unwrap());
    assert_eq!(recompute_total_marks(&store, ex).await.unwrap(), 7);

    let bad = QuestionPatch {
        marks: Some("seven".to_string()),
        ..Default::default()
    };
    let err = update_question(&store, q, &bad, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Marks must be a non-negative whole number.");

    // marks are summed as 32-bit integers
    let huge = QuestionPatch {
        marks: Some("9223372036854775807".to_string()),
        ..Default::default()
    };
    let err = update_question(&store, q, &huge, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Marks must be a non-negative whole number.");
    assert_eq!(recompute_total_marks(&store, ex).await.unwrap(), 7);
}

#[tokio::test]
async fn query_helper_dispatches_by_mode() {
    let store = MemoryStore::new();
    let language = Uuid::new_v4();
    for _ in 0..3 {
        exercise(&store, language, 10, 10.0).await;
    }
    let filter = Query::new().eq("language_id", language.to_string());

    let all = query(&store, Entity::Exercises, QueryMode::FindAll, &filter)
        .await
        .unwrap();
    assert_eq!(all.into_rows().len(), 3);

    let counted = query_by_name(&store, Entity::Exercises, "findAndCountAll", &filter.clone().limit(2))
        .await
        .unwrap();
    match counted {
        QueryOutput::Counted { count, rows } => {
            assert_eq!(count, 3);
            assert_eq!(rows.len(), 2);
        }
        other => panic!("unexpected output: {other:?}"),
    }

    let none = query(
        &store,
        Entity::Exercises,
        QueryMode::FindOne,
        &Query::new().eq("language_id", Uuid::new_v4().to_string()),
    )
    .await
    .unwrap();
    assert_eq!(none, QueryOutput::One(None));

    let err = query_by_name(&store, Entity::Exercises, "findByPk", &filter)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "findByPk method is not available.");
}

#[tokio::test]
async fn exercise_view_uses_aliased_columns() {
    let store = MemoryStore::new();
    let language = Uuid::new_v4();
    let ex = exercise(&store, language, 12, 40.0).await;

    let view = get_exercise(&store, ex).await.unwrap();
    assert_eq!(view.exercise_id, ex);
    assert_eq!(view.total_marks, 12);

    let (count, rows): (i64, Vec<ExerciseView>) = find_and_count_all(
        &store,
        Entity::Exercises,
        &Query::new()
            .select(exercise_attributes())
            .eq("language_id", language.to_string()),
    )
    .await
    .unwrap();
    assert_eq!(count, 1);
    assert_eq!(rows[0].exercise_weightage, 40.0);

    assert!(matches!(
        get_exercise(&store, Uuid::new_v4()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn seeded_rows_take_column_defaults() {
    let store = MemoryStore::new();
    let ana = user(&store, "Ana").await;
    role(&store, ADMIN).await;

    let stored = store
        .find_one(Entity::Users, &Query::new().eq("id", ana.to_string()))
        .await
        .unwrap()
        .expect("user exists");
    assert_eq!(stored["activated"], true);
    assert_eq!(stored["deleted"], false);
    assert!(stored["created_at"].is_string());

    let roles = store.find_all(Entity::Roles, &Query::new()).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0]["type"], ADMIN);

    let draft = insert(
        &store,
        Entity::Exercises,
        json!({ "name": "Draft", "language_id": Uuid::new_v4() }),
    )
    .await;
    let draft = load(&store, draft).await;
    assert!(!draft.activated);
    assert_eq!(draft.total_marks, 0);
    assert_eq!(draft.exercise_weightage, 0.0);
}
