// src/services/grading.rs

//! Submission workflows: grade-and-store, fetch, and the repair pass that
//! recomputes stored results.

use std::collections::HashMap;

use sqlx::types::Json;

use crate::{
    error::{AppError, ScoreError},
    models::{
        submission::{RescoreFailure, RescoreReport, RescoreRequest, SubmissionRecord, SubmitTestResponse},
        test::Test,
    },
    scoring::{self, AnswerMode},
    store::Store,
};

async fn load_test(store: &dyn Store, test_id: i64) -> Result<Test, AppError> {
    store
        .get_test(test_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Test {} not found", test_id)))
}

/// Grades a learner's answers and stores the result, replacing any earlier attempt.
///
/// Scorer errors abort the submission; nothing is stored.
pub async fn submit(
    store: &dyn Store,
    test_id: i64,
    user_id: &str,
    answers: HashMap<String, String>,
    mode: AnswerMode,
) -> Result<SubmitTestResponse, AppError> {
    let test = load_test(store, test_id).await?;

    let grading = scoring::grade(&test.questions, &answers, test.passing_score, mode).map_err(|e| {
        tracing::warn!("Test {} could not be graded for {}: {}", test_id, user_id, e);
        e
    })?;

    let record = SubmissionRecord::new(test_id, user_id.to_string(), answers, mode, &grading.result);
    store.upsert_submission(&record).await?;

    tracing::info!(
        test_id,
        user_id,
        mode = %mode,
        score = grading.result.score,
        passed = grading.result.passed,
        "Submission graded"
    );

    Ok(SubmitTestResponse {
        test_id,
        answer_mode: mode,
        grading,
    })
}

/// Returns the stored record of one learner.
pub async fn result_for(
    store: &dyn Store,
    test_id: i64,
    user_id: &str,
) -> Result<SubmissionRecord, AppError> {
    store
        .get_submission(test_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No submission for this test".to_string()))
}

/// Recomputes and overwrites every stored result of a test.
///
/// Records the scorer rejects, records whose write fails, and records the
/// learner resubmitted while the pass ran are left as stored and reported;
/// the rest are rewritten.
pub async fn rescore_test(
    store: &dyn Store,
    test_id: i64,
    req: &RescoreRequest,
) -> Result<RescoreReport, AppError> {
    let test = load_test(store, test_id).await?;
    let records = store.list_submissions(test_id).await?;

    let mut report = RescoreReport::default();
    for mut record in records {
        let changed = match rescore_record(&test, &mut record, req) {
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!("Skipping rescore of {} on test {}: {}", record.user_id, test_id, e);
                report.failures.push(RescoreFailure {
                    user_id: record.user_id,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let failure = match store.replace_submission_if_current(&record).await {
            Ok(true) => None,
            Ok(false) => Some("submission changed during rescore; left as is".to_string()),
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => {
                report.rescored += 1;
                if changed {
                    report.changed += 1;
                }
            }
            Some(error) => {
                tracing::warn!("Rescore of {} on test {} not saved: {}", record.user_id, test_id, error);
                report.failures.push(RescoreFailure {
                    user_id: record.user_id,
                    error,
                });
            }
        }
    }

    tracing::info!(
        test_id,
        rescored = report.rescored,
        changed = report.changed,
        failed = report.failures.len(),
        "Rescore finished"
    );

    Ok(report)
}

/// Rescores one record in place. Returns whether its result changed.
///
/// With `migrate`, text answers are rewritten to option ids only when the id
/// form grades the same; otherwise the record stays in text mode.
fn rescore_record(
    test: &Test,
    record: &mut SubmissionRecord,
    req: &RescoreRequest,
) -> Result<bool, ScoreError> {
    let mode = match req.answer_mode {
        Some(mode) => mode,
        None => record.mode()?,
    };

    let result = scoring::score(&test.questions, &record.answers, test.passing_score, mode)?;
    let changed = record.result() != result;

    record.apply(&result);
    record.answer_mode = mode.to_string();

    if req.migrate && mode == AnswerMode::Text {
        let migrated = scoring::migrate_text_answers(&test.questions, &record.answers);
        let regraded = scoring::score(&test.questions, &migrated, test.passing_score, AnswerMode::Id)?;
        if regraded == result {
            record.answers = Json(migrated);
            record.answer_mode = AnswerMode::Id.to_string();
        }
    }

    record.rescored_at = Some(chrono::Utc::now());
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        models::{
            submission::LeaderboardEntry,
            test::{NewTest, Question, QuestionOption},
        },
        store::MemoryStore,
    };

    /// Delegates to a `MemoryStore`, with two hooks: a record written right
    /// after submissions are listed, and a learner whose writes fail.
    #[derive(Default)]
    struct HookedStore {
        inner: MemoryStore,
        write_after_list: Mutex<Option<SubmissionRecord>>,
        failing_user: Option<String>,
    }

    #[async_trait]
    impl Store for HookedStore {
        async fn list_tests(&self) -> Result<Vec<Test>, AppError> {
            self.inner.list_tests().await
        }

        async fn get_test(&self, id: i64) -> Result<Option<Test>, AppError> {
            self.inner.get_test(id).await
        }

        async fn create_test(&self, test: NewTest) -> Result<i64, AppError> {
            self.inner.create_test(test).await
        }

        async fn delete_test(&self, id: i64) -> Result<bool, AppError> {
            self.inner.delete_test(id).await
        }

        async fn upsert_submission(&self, record: &SubmissionRecord) -> Result<(), AppError> {
            self.inner.upsert_submission(record).await
        }

        async fn replace_submission_if_current(
            &self,
            record: &SubmissionRecord,
        ) -> Result<bool, AppError> {
            if self.failing_user.as_deref() == Some(record.user_id.as_str()) {
                return Err(AppError::InternalServerError("connection reset".to_string()));
            }
            self.inner.replace_submission_if_current(record).await
        }

        async fn get_submission(
            &self,
            test_id: i64,
            user_id: &str,
        ) -> Result<Option<SubmissionRecord>, AppError> {
            self.inner.get_submission(test_id, user_id).await
        }

        async fn list_submissions(&self, test_id: i64) -> Result<Vec<SubmissionRecord>, AppError> {
            let records = self.inner.list_submissions(test_id).await?;
            let pending = self.write_after_list.lock().unwrap().take();
            if let Some(record) = pending {
                self.inner.upsert_submission(&record).await?;
            }
            Ok(records)
        }

        async fn leaderboard(
            &self,
            test_id: i64,
            limit: i64,
        ) -> Result<Vec<LeaderboardEntry>, AppError> {
            self.inner.leaderboard(test_id, limit).await
        }
    }

    fn colour_test() -> NewTest {
        NewTest {
            title: "Colours".to_string(),
            description: None,
            passing_score: Some(50),
            questions: vec![
                Question {
                    id: "sky".to_string(),
                    question_type: "multiple-choice".to_string(),
                    content: "Colour of the sky?".to_string(),
                    correct_answer: "Blue".to_string(),
                    options: vec![QuestionOption::new("o1", "Red"), QuestionOption::new("o2", "Blue")],
                    marks: Some(2),
                },
                Question {
                    id: "legs".to_string(),
                    question_type: "integer".to_string(),
                    content: "Legs on a spider?".to_string(),
                    correct_answer: "8".to_string(),
                    options: Vec::new(),
                    marks: None,
                },
            ],
        }
    }

    fn answers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_submit_stores_result() {
        let store = MemoryStore::new();
        let id = store.create_test(colour_test()).await.unwrap();

        let resp = submit(&store, id, "alice", answers(&[("sky", "o2")]), AnswerMode::Id)
            .await
            .unwrap();
        assert_eq!(resp.grading.result.score, 50);
        assert!(resp.grading.result.passed);

        let stored = result_for(&store, id, "alice").await.unwrap();
        assert_eq!(stored.score, 50);
        assert_eq!(stored.answer_mode, "id");
    }

    #[tokio::test]
    async fn test_submit_unknown_test() {
        let store = MemoryStore::new();
        let err = submit(&store, 42, "alice", HashMap::new(), AnswerMode::Id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_submit_unsupported_type_stores_nothing() {
        let store = MemoryStore::new();
        let mut test = colour_test();
        test.questions[1].question_type = "essay".to_string();
        let id = store.create_test(test).await.unwrap();

        let err = submit(&store, id, "alice", HashMap::new(), AnswerMode::Id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unprocessable(msg) if msg.contains("legs")));
        assert!(store.get_submission(id, "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rescore_repairs_legacy_text_records() {
        let store = MemoryStore::new();
        let id = store.create_test(colour_test()).await.unwrap();

        // A legacy client sent option text but the record was graded as ids.
        submit(&store, id, "bob", answers(&[("sky", "Blue"), ("legs", "8")]), AnswerMode::Id)
            .await
            .unwrap();
        assert_eq!(result_for(&store, id, "bob").await.unwrap().score, 50);

        let req = RescoreRequest {
            answer_mode: Some(AnswerMode::Text),
            migrate: true,
        };
        let report = rescore_test(&store, id, &req).await.unwrap();
        assert_eq!(report.rescored, 1);
        assert_eq!(report.changed, 1);
        assert!(report.failures.is_empty());

        let repaired = result_for(&store, id, "bob").await.unwrap();
        assert_eq!(repaired.score, 100);
        assert!(repaired.rescored_at.is_some());
        assert_eq!(repaired.answer_mode, "id");
        assert_eq!(repaired.answers.get("sky").map(String::as_str), Some("o2"));

        // Once migrated the record is stable under its stored mode.
        let again = rescore_test(&store, id, &RescoreRequest::default()).await.unwrap();
        assert_eq!(again.rescored, 1);
        assert_eq!(again.changed, 0);
        assert_eq!(result_for(&store, id, "bob").await.unwrap().score, 100);
    }

    #[tokio::test]
    async fn test_rescore_reports_bad_records() {
        let store = MemoryStore::new();
        let id = store.create_test(colour_test()).await.unwrap();
        submit(&store, id, "carol", answers(&[("legs", "8")]), AnswerMode::Id)
            .await
            .unwrap();

        let mut record = store.get_submission(id, "carol").await.unwrap().unwrap();
        record.answer_mode = "label".to_string();
        store.upsert_submission(&record).await.unwrap();

        let report = rescore_test(&store, id, &RescoreRequest::default()).await.unwrap();
        assert_eq!(report.rescored, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id, "carol");
    }

    #[tokio::test]
    async fn test_rescore_drops_unmatched_text_and_stays_stable() {
        let store = MemoryStore::new();
        let id = store.create_test(colour_test()).await.unwrap();

        // Stored as text, but the client really sent the option id.
        submit(&store, id, "dave", answers(&[("sky", "o2"), ("legs", "8")]), AnswerMode::Text)
            .await
            .unwrap();
        assert_eq!(result_for(&store, id, "dave").await.unwrap().score, 50);

        let migrate = RescoreRequest {
            answer_mode: None,
            migrate: true,
        };
        let report = rescore_test(&store, id, &migrate).await.unwrap();
        assert_eq!(report.rescored, 1);
        assert_eq!(report.changed, 0);

        let migrated = result_for(&store, id, "dave").await.unwrap();
        assert_eq!(migrated.answer_mode, "id");
        assert!(!migrated.answers.contains_key("sky"));
        assert_eq!(migrated.score, 50);

        let again = rescore_test(&store, id, &RescoreRequest::default()).await.unwrap();
        assert_eq!(again.changed, 0);
        assert_eq!(result_for(&store, id, "dave").await.unwrap().score, 50);
    }

    #[tokio::test]
    async fn test_rescore_keeps_text_form_when_ids_would_grade_differently() {
        let store = MemoryStore::new();
        let mut test = colour_test();
        // Legacy key: the correct text is not among the options.
        test.questions[0].correct_answer = "Purple".to_string();
        let id = store.create_test(test).await.unwrap();

        submit(&store, id, "erin", answers(&[("sky", "Purple")]), AnswerMode::Text)
            .await
            .unwrap();
        assert_eq!(result_for(&store, id, "erin").await.unwrap().score, 50);

        let migrate = RescoreRequest {
            answer_mode: None,
            migrate: true,
        };
        rescore_test(&store, id, &migrate).await.unwrap();

        let kept = result_for(&store, id, "erin").await.unwrap();
        assert_eq!(kept.answer_mode, "text");
        assert_eq!(kept.answers.get("sky").map(String::as_str), Some("Purple"));

        let again = rescore_test(&store, id, &RescoreRequest::default()).await.unwrap();
        assert_eq!(again.changed, 0);
        assert_eq!(result_for(&store, id, "erin").await.unwrap().score, 50);
    }

    #[tokio::test]
    async fn test_rescore_keeps_newer_submission() {
        let store = HookedStore::default();
        let id = store.create_test(colour_test()).await.unwrap();

        submit(&store, id, "alice", answers(&[("legs", "1")]), AnswerMode::Id)
            .await
            .unwrap();
        let first = result_for(&store, id, "alice").await.unwrap();
        assert_eq!(first.score, 0);

        let test = store.get_test(id).await.unwrap().unwrap();
        let newer_answers = answers(&[("sky", "o2"), ("legs", "8")]);
        let result = scoring::score(&test.questions, &newer_answers, test.passing_score, AnswerMode::Id).unwrap();
        let mut newer = SubmissionRecord::new(id, "alice".to_string(), newer_answers, AnswerMode::Id, &result);
        newer.submitted_at = first.submitted_at + chrono::Duration::seconds(1);
        *store.write_after_list.lock().unwrap() = Some(newer);

        let report = rescore_test(&store, id, &RescoreRequest::default()).await.unwrap();
        assert_eq!(report.rescored, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id, "alice");

        let stored = result_for(&store, id, "alice").await.unwrap();
        assert_eq!(stored.score, 100);
        assert_eq!(stored.answers.get("legs").map(String::as_str), Some("8"));
        assert!(stored.rescored_at.is_none());
    }

    #[tokio::test]
    async fn test_rescore_continues_past_failed_write() {
        let store = HookedStore {
            failing_user: Some("bob".to_string()),
            ..HookedStore::default()
        };
        let id = store.create_test(colour_test()).await.unwrap();
        for user in ["alice", "bob", "carol"] {
            submit(&store, id, user, answers(&[("legs", "8")]), AnswerMode::Id)
                .await
                .unwrap();
        }

        let report = rescore_test(&store, id, &RescoreRequest::default()).await.unwrap();
        assert_eq!(report.rescored, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id, "bob");
        assert!(report.failures[0].error.contains("connection reset"));

        for user in ["alice", "carol"] {
            assert!(result_for(&store, id, user).await.unwrap().rescored_at.is_some());
        }
        assert!(result_for(&store, id, "bob").await.unwrap().rescored_at.is_none());
    }
}
