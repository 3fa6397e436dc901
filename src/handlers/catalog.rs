// src/handlers/catalog.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::test::{CreateTestRequest, NewTest, PublicTest, TestSummary},
    store::Store,
    utils::html::sanitize_test,
};

/// Lists all tests with their question counts.
pub async fn list_tests(
    State(store): State<Arc<dyn Store>>,
) -> Result<impl IntoResponse, AppError> {
    let tests = store.list_tests().await?;
    let summaries: Vec<TestSummary> = tests.iter().map(TestSummary::from).collect();
    Ok(Json(summaries))
}

/// Returns a test as a learner sees it, without the answer key.
pub async fn get_test(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let test = store
        .get_test(id)
        .await?
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    Ok(Json(PublicTest::from(test)))
}

/// Creates a new test.
/// Admin only.
pub async fn create_test(
    State(store): State<Arc<dyn Store>>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = sanitize_test(payload);
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let question_count = payload.questions.len();
    let id = store.create_test(NewTest::from(payload)).await?;
    tracing::info!("Created test {} with {} questions", id, question_count);

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Deletes a test and every stored result for it.
/// Admin only.
pub async fn delete_test(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_test(id).await? {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    tracing::info!("Deleted test {}", id);
    Ok(StatusCode::NO_CONTENT)
}
