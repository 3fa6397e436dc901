// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sqlx::types::Json;
use tokio::sync::RwLock;

use crate::{
    error::AppError,
    models::{
        submission::{LeaderboardEntry, SubmissionRecord},
        test::{NewTest, Test},
    },
    store::Store,
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    tests: BTreeMap<i64, Test>,
    submissions: HashMap<(i64, String), SubmissionRecord>,
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_tests(&self) -> Result<Vec<Test>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.tests.values().rev().cloned().collect())
    }

    async fn get_test(&self, id: i64) -> Result<Option<Test>, AppError> {
        Ok(self.inner.read().await.tests.get(&id).cloned())
    }

    async fn create_test(&self, test: NewTest) -> Result<i64, AppError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.tests.insert(
            id,
            Test {
                id,
                title: test.title,
                description: test.description,
                passing_score: test.passing_score,
                questions: Json(test.questions),
                created_at: chrono::Utc::now(),
            },
        );
        Ok(id)
    }

    async fn delete_test(&self, id: i64) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let existed = inner.tests.remove(&id).is_some();
        inner.submissions.retain(|(test_id, _), _| *test_id != id);
        Ok(existed)
    }

    async fn upsert_submission(&self, record: &SubmissionRecord) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if !inner.tests.contains_key(&record.test_id) {
            return Err(AppError::NotFound(format!("Test {} not found", record.test_id)));
        }
        inner
            .submissions
            .insert((record.test_id, record.user_id.clone()), record.clone());
        Ok(())
    }

    async fn replace_submission_if_current(
        &self,
        record: &SubmissionRecord,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        match inner
            .submissions
            .get_mut(&(record.test_id, record.user_id.clone()))
        {
            Some(stored) if stored.submitted_at == record.submitted_at => {
                *stored = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_submission(
        &self,
        test_id: i64,
        user_id: &str,
    ) -> Result<Option<SubmissionRecord>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .submissions
            .get(&(test_id, user_id.to_string()))
            .cloned())
    }

    async fn list_submissions(&self, test_id: i64) -> Result<Vec<SubmissionRecord>, AppError> {
        let inner = self.inner.read().await;
        let mut records: Vec<SubmissionRecord> = inner
            .submissions
            .values()
            .filter(|r| r.test_id == test_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(records)
    }

    async fn leaderboard(
        &self,
        test_id: i64,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        let mut records = self.list_submissions(test_id).await?;
        // Stable sort keeps the submitted_at order among equal scores.
        records.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(records
            .iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(LeaderboardEntry::from)
            .collect())
    }
}
