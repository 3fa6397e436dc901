// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{catalog, submission},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public routes: test listing, public test view, leaderboard.
/// * Learner routes (bearer token): submit, own result.
/// * Admin routes (bearer token + admin role): create/delete tests, rescore.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let test_routes = Router::new()
        .route("/", get(catalog::list_tests))
        .route("/{id}", get(catalog::get_test))
        .route("/{id}/leaderboard", get(submission::get_leaderboard))
        // Protected learner routes
        .merge(
            Router::new()
                .route("/{id}/submit", post(submission::submit_test))
                .route("/{id}/result", get(submission::get_my_result))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let admin_routes = Router::new()
        .route("/tests", post(catalog::create_test))
        .route("/tests/{id}", delete(catalog::delete_test))
        .route("/tests/{id}/rescore", post(submission::rescore_test))
        // Auth first, then Admin check (layers run outside in)
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/tests", test_routes)
        .nest("/api/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
