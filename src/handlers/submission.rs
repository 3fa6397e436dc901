// src/handlers/submission.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    config::{Config, LEADERBOARD_LIMIT},
    error::AppError,
    models::submission::{RescoreRequest, SubmitTestRequest},
    services::grading,
    store::Store,
    utils::jwt::Claims,
};

/// Submits the caller's answers for a test.
///
/// * Grades against the stored answer key (mode from the request, else the server default).
/// * Stores the result, replacing the caller's previous attempt.
/// * Returns the score together with per-question verdicts.
pub async fn submit_test(
    State(store): State<Arc<dyn Store>>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
    Json(req): Json<SubmitTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mode = req.answer_mode.unwrap_or(config.answer_mode);
    let response = grading::submit(store.as_ref(), test_id, &claims.sub, req.answers, mode).await?;
    Ok(Json(response))
}

/// Returns the caller's stored result for a test.
pub async fn get_my_result(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let record = grading::result_for(store.as_ref(), test_id, &claims.sub).await?;
    Ok(Json(record))
}

/// Retrieves the top scores of a test.
pub async fn get_leaderboard(
    State(store): State<Arc<dyn Store>>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if store.get_test(test_id).await?.is_none() {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    let entries = store.leaderboard(test_id, LEADERBOARD_LIMIT).await?;
    Ok(Json(entries))
}

/// Recomputes every stored result of a test.
/// Admin only. An empty body rescores each record in its stored mode.
pub async fn rescore_test(
    State(store): State<Arc<dyn Store>>,
    Path(test_id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req: RescoreRequest = if body.is_empty() {
        RescoreRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let report = grading::rescore_test(store.as_ref(), test_id, &req).await?;
    Ok(Json(report))
}
