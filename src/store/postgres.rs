// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};

use crate::{
    error::AppError,
    models::{
        submission::{LeaderboardEntry, SubmissionRecord},
        test::{NewTest, Test},
    },
    store::Store,
};

/// PostgreSQL-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_tests(&self) -> Result<Vec<Test>, AppError> {
        let tests = sqlx::query_as::<_, Test>(
            r#"
            SELECT id, title, description, passing_score, questions, created_at
            FROM tests
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list tests: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(tests)
    }

    async fn get_test(&self, id: i64) -> Result<Option<Test>, AppError> {
        let test = sqlx::query_as::<_, Test>(
            r#"
            SELECT id, title, description, passing_score, questions, created_at
            FROM tests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(test)
    }

    async fn create_test(&self, test: NewTest) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tests (title, description, passing_score, questions)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&test.title)
        .bind(&test.description)
        .bind(test.passing_score)
        .bind(Json(&test.questions))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create test: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(id)
    }

    async fn delete_test(&self, id: i64) -> Result<bool, AppError> {
        // Submissions go with the test via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM tests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_submission(&self, record: &SubmissionRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO submissions (
                test_id, user_id, answers, answer_mode,
                total_questions, correct_answers, score, passed,
                submitted_at, rescored_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (test_id, user_id) DO UPDATE SET
                answers = EXCLUDED.answers,
                answer_mode = EXCLUDED.answer_mode,
                total_questions = EXCLUDED.total_questions,
                correct_answers = EXCLUDED.correct_answers,
                score = EXCLUDED.score,
                passed = EXCLUDED.passed,
                submitted_at = EXCLUDED.submitted_at,
                rescored_at = EXCLUDED.rescored_at
            "#,
        )
        .bind(record.test_id)
        .bind(&record.user_id)
        .bind(&record.answers)
        .bind(&record.answer_mode)
        .bind(record.total_questions)
        .bind(record.correct_answers)
        .bind(record.score)
        .bind(record.passed)
        .bind(record.submitted_at)
        .bind(record.rescored_at)
        .execute(&self.pool)
        .await
        .map_err(|e| submission_write_error(record.test_id, e))?;

        Ok(())
    }

    async fn replace_submission_if_current(
        &self,
        record: &SubmissionRecord,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE submissions SET
                answers = $3,
                answer_mode = $4,
                total_questions = $5,
                correct_answers = $6,
                score = $7,
                passed = $8,
                rescored_at = $9
            WHERE test_id = $1 AND user_id = $2 AND submitted_at = $10
            "#,
        )
        .bind(record.test_id)
        .bind(&record.user_id)
        .bind(&record.answers)
        .bind(&record.answer_mode)
        .bind(record.total_questions)
        .bind(record.correct_answers)
        .bind(record.score)
        .bind(record.passed)
        .bind(record.rescored_at)
        .bind(record.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| submission_write_error(record.test_id, e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_submission(
        &self,
        test_id: i64,
        user_id: &str,
    ) -> Result<Option<SubmissionRecord>, AppError> {
        let record = sqlx::query_as::<_, SubmissionRecord>(
            r#"
            SELECT
                test_id, user_id, answers, answer_mode,
                total_questions, correct_answers, score, passed,
                submitted_at, rescored_at
            FROM submissions
            WHERE test_id = $1 AND user_id = $2
            "#,
        )
        .bind(test_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_submissions(&self, test_id: i64) -> Result<Vec<SubmissionRecord>, AppError> {
        let records = sqlx::query_as::<_, SubmissionRecord>(
            r#"
            SELECT
                test_id, user_id, answers, answer_mode,
                total_questions, correct_answers, score, passed,
                submitted_at, rescored_at
            FROM submissions
            WHERE test_id = $1
            ORDER BY submitted_at ASC, user_id ASC
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn leaderboard(
        &self,
        test_id: i64,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT user_id, score, correct_answers, submitted_at
            FROM submissions
            WHERE test_id = $1
            ORDER BY score DESC, submitted_at ASC, user_id ASC
            LIMIT $2
            "#,
        )
        .bind(test_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch leaderboard: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(entries)
    }
}

/// A write racing a test deletion trips the foreign key; report it as the
/// missing test, like the in-memory store does.
fn submission_write_error(test_id: i64, err: sqlx::Error) -> AppError {
    if err
        .as_database_error()
        .is_some_and(|db_err| db_err.is_foreign_key_violation())
    {
        return AppError::NotFound(format!("Test {} not found", test_id));
    }
    tracing::error!("Failed to write submission: {:?}", err);
    AppError::InternalServerError(err.to_string())
}
