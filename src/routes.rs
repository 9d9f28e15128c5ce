// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{exercises, progress, results, roles},
    state::AppState,
    utils::identity::{LOGGED_IN_USER_HEADER, admin_middleware, identity_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (languages, exercises, questions, users).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store handle).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static(LOGGED_IN_USER_HEADER),
        ]);

    let language_routes = Router::new()
        .route("/{id}/exercises", get(exercises::list_language_exercises))
        .route("/{id}/leaderboard", get(progress::get_language_leaderboard))
        // Caller-scoped routes
        .merge(
            Router::new()
                .route("/{id}/progress", get(progress::get_user_progress))
                .layer(middleware::from_fn(identity_middleware)),
        );

    let exercise_routes = Router::new()
        .route("/{id}", get(exercises::get_exercise_details))
        .merge(
            Router::new()
                .route("/{id}/result", post(results::submit_result))
                .layer(middleware::from_fn(identity_middleware)),
        )
        .merge(
            Router::new()
                .route("/{id}", put(exercises::update_exercise_details))
                .route("/{id}/total-marks", post(exercises::refresh_total_marks))
                // Identity first, then Admin check
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    admin_middleware,
                ))
                .layer(middleware::from_fn(identity_middleware)),
        );

    let question_routes = Router::new()
        .route("/{id}", put(exercises::update_question_details))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_middleware,
        ))
        .layer(middleware::from_fn(identity_middleware));

    let user_routes = Router::new()
        .route("/me/roles", get(roles::get_my_roles))
        .layer(middleware::from_fn(identity_middleware));

    Router::new()
        .nest("/api/languages", language_routes)
        .nest("/api/exercises", exercise_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/users", user_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
