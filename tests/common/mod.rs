// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use lingo_backend::{
    routes,
    state::AppState,
    store::{Entity, Gateway, MemoryStore, Record},
};
use serde_json::{Value, json};
use uuid::Uuid;

pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("fixture must be an object")
}

pub async fn insert(store: &MemoryStore, entity: Entity, value: Value) -> Uuid {
    let row = store
        .create(entity, &record(value))
        .await
        .expect("failed to seed row");
    row["id"].as_str().unwrap().parse().unwrap()
}

pub async fn user(store: &MemoryStore, name: &str) -> Uuid {
    insert(store, Entity::Users, json!({ "name": name })).await
}

pub async fn role(store: &MemoryStore, label: &str) -> Uuid {
    insert(store, Entity::Roles, json!({ "type": label })).await
}

pub async fn grant(store: &MemoryStore, user_id: Uuid, role_id: Uuid) {
    insert(
        store,
        Entity::UserRoles,
        json!({ "user_id": user_id, "role_id": role_id }),
    )
    .await;
}

pub async fn exercise(store: &MemoryStore, language_id: Uuid, total_marks: i64, weightage: f64) -> Uuid {
    insert(
        store,
        Entity::Exercises,
        json!({
            "name": format!("Exercise {}", &Uuid::new_v4().to_string()[..8]),
            "language_id": language_id,
            "total_marks": total_marks,
            "exercise_weightage": weightage,
            "activated": true,
        }),
    )
    .await
}

pub async fn question(store: &MemoryStore, exercise_id: Uuid, marks: &str) -> Uuid {
    insert(
        store,
        Entity::Questions,
        json!({ "exercise_id": exercise_id, "marks": marks, "question": "Translate 'hello'" }),
    )
    .await
}

pub async fn result(store: &MemoryStore, user_id: Uuid, exercise_id: Uuid, obtained_marks: f64) {
    insert(
        store,
        Entity::Results,
        json!({ "user_id": user_id, "exercise_id": exercise_id, "obtained_marks": obtained_marks }),
    )
    .await;
}

/// Spawns the app over `store` on a random port.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
pub async fn spawn_app(store: MemoryStore) -> String {
    let state = AppState {
        store: Arc::new(store),
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}
