// src/models/submission.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::{
    error::ScoreError,
    scoring::{AnswerMode, Grading, ScoreResult},
};

/// Represents the 'submissions' table in the database.
/// One row per (test, learner); a new attempt or a rescore overwrites it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub test_id: i64,
    pub user_id: String,

    /// Raw answers keyed by question id.
    pub answers: Json<HashMap<String, String>>,

    /// 'id' or 'text'; how `answers` must be read.
    pub answer_mode: String,

    pub total_questions: i64,
    pub correct_answers: i64,
    pub score: i64,
    pub passed: bool,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub rescored_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl SubmissionRecord {
    pub fn new(
        test_id: i64,
        user_id: String,
        answers: HashMap<String, String>,
        mode: AnswerMode,
        result: &ScoreResult,
    ) -> Self {
        let mut record = Self {
            test_id,
            user_id,
            answers: Json(answers),
            answer_mode: mode.to_string(),
            total_questions: 0,
            correct_answers: 0,
            score: 0,
            passed: false,
            submitted_at: chrono::Utc::now(),
            rescored_at: None,
        };
        record.apply(result);
        record
    }

    /// Parses the stored answer mode.
    pub fn mode(&self) -> Result<AnswerMode, ScoreError> {
        self.answer_mode
            .parse::<AnswerMode>()
            .map_err(ScoreError::InvalidInput)
    }

    /// Overwrites the stored result fields.
    pub fn apply(&mut self, result: &ScoreResult) {
        self.total_questions = result.total_questions as i64;
        self.correct_answers = result.correct_answers as i64;
        self.score = i64::from(result.score);
        self.passed = result.passed;
    }

    pub fn result(&self) -> ScoreResult {
        ScoreResult {
            total_questions: self.total_questions as usize,
            correct_answers: self.correct_answers as usize,
            score: self.score as u32,
            passed: self.passed,
        }
    }
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTestRequest {
    /// Key: question id. Value: the learner's raw answer.
    pub answers: HashMap<String, String>,

    /// Falls back to the server's configured mode.
    pub answer_mode: Option<AnswerMode>,
}

/// DTO returned after a submission is graded.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTestResponse {
    pub test_id: i64,
    pub answer_mode: AnswerMode,
    #[serde(flatten)]
    pub grading: Grading,
}

/// DTO for the repair operation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescoreRequest {
    /// Reads every record in this mode instead of its stored one.
    pub answer_mode: Option<AnswerMode>,

    /// Rewrites text-mode answers to option ids after rescoring.
    #[serde(default)]
    pub migrate: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescoreFailure {
    pub user_id: String,
    pub error: String,
}

/// Outcome of a repair run over one test.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescoreReport {
    pub rescored: usize,
    /// Records whose score or verdict differs from what was stored.
    pub changed: usize,
    pub failures: Vec<RescoreFailure>,
}

/// Aggregated struct for displaying a test leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub score: i64,
    pub correct_answers: i64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

impl From<&SubmissionRecord> for LeaderboardEntry {
    fn from(record: &SubmissionRecord) -> Self {
        Self {
            user_id: record.user_id.clone(),
            score: record.score,
            correct_answers: record.correct_answers,
            submitted_at: record.submitted_at,
        }
    }
}
