// src/store/mod.rs

//! Persistence seam for tests and submission records.
//!
//! The scorer never touches a store; handlers and the grading service do.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        submission::{LeaderboardEntry, SubmissionRecord},
        test::{NewTest, Test},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// All tests, newest first.
    async fn list_tests(&self) -> Result<Vec<Test>, AppError>;

    async fn get_test(&self, id: i64) -> Result<Option<Test>, AppError>;

    /// Inserts a test and returns its id.
    async fn create_test(&self, test: NewTest) -> Result<i64, AppError>;

    /// Deletes a test and its submission records. `false` if it did not exist.
    async fn delete_test(&self, id: i64) -> Result<bool, AppError>;

    /// Inserts or replaces the record for `(test_id, user_id)`.
    async fn upsert_submission(&self, record: &SubmissionRecord) -> Result<(), AppError>;

    /// Overwrites the stored record only while it still carries
    /// `record.submitted_at`. `false` if the learner resubmitted, or the
    /// record was removed, after it was read.
    async fn replace_submission_if_current(
        &self,
        record: &SubmissionRecord,
    ) -> Result<bool, AppError>;

    async fn get_submission(
        &self,
        test_id: i64,
        user_id: &str,
    ) -> Result<Option<SubmissionRecord>, AppError>;

    async fn list_submissions(&self, test_id: i64) -> Result<Vec<SubmissionRecord>, AppError>;

    /// Highest scores first; ties go to the earlier submission, then by user id.
    async fn leaderboard(&self, test_id: i64, limit: i64)
    -> Result<Vec<LeaderboardEntry>, AppError>;
}
