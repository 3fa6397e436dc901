// src/scoring/mod.rs

//! Answer scoring.
//!
//! Compares a learner's submitted answers against a test's answer key and
//! produces a `ScoreResult`. Everything here is a pure function of its
//! arguments: no I/O, no clock, no shared state.

pub mod normalize;

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::ScoreError, models::test::Question};

/// The question kinds the scorer knows how to judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Integer,
}

impl QuestionKind {
    /// Parses the stored type tag. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "multiple-choice" => Some(Self::MultipleChoice),
            "true-false" => Some(Self::TrueFalse),
            "short-answer" => Some(Self::ShortAnswer),
            "integer" => Some(Self::Integer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple-choice",
            Self::TrueFalse => "true-false",
            Self::ShortAnswer => "short-answer",
            Self::Integer => "integer",
        }
    }
}

/// How submitted multiple-choice and true/false values are read.
///
/// `Id` is the canonical contract: the learner submits an option id and the
/// scorer resolves the correct option's id from its text. `Text` reads the
/// submitted value as option text and exists for records captured before ids
/// were submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    #[default]
    Id,
    Text,
}

impl AnswerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerMode::Id => "id",
            AnswerMode::Text => "text",
        }
    }
}

impl fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(AnswerMode::Id),
            "text" => Ok(AnswerMode::Text),
            other => Err(format!("unknown answer mode '{}'", other)),
        }
    }
}

/// Aggregate outcome of grading one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub total_questions: usize,
    pub correct_answers: usize,
    /// Rounded percentage, 0..=100.
    pub score: u32,
    pub passed: bool,
}

/// Verdict for a single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    pub question_id: String,
    pub answered: bool,
    pub correct: bool,
}

/// A `ScoreResult` together with the per-question verdicts, in test order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grading {
    #[serde(flatten)]
    pub result: ScoreResult,
    pub outcomes: Vec<QuestionOutcome>,
}

/// Scores a submission. See [`grade`] for the rules.
pub fn score(
    questions: &[Question],
    submission: &HashMap<String, String>,
    passing_threshold: Option<i64>,
    mode: AnswerMode,
) -> Result<ScoreResult, ScoreError> {
    grade(questions, submission, passing_threshold, mode).map(|g| g.result)
}

/// Grades a submission question by question.
///
/// * An empty question list or a threshold outside 0..=100 is `InvalidInput`.
/// * Every question type is checked before anything is judged, so an
///   unrecognized type fails the whole call even when it was left unanswered.
/// * A question whose id is absent from `submission` is incorrect.
pub fn grade(
    questions: &[Question],
    submission: &HashMap<String, String>,
    passing_threshold: Option<i64>,
    mode: AnswerMode,
) -> Result<Grading, ScoreError> {
    if questions.is_empty() {
        return Err(ScoreError::InvalidInput(
            "test has no questions".to_string(),
        ));
    }

    let threshold = passing_threshold.unwrap_or(0);
    if !(0..=100).contains(&threshold) {
        return Err(ScoreError::InvalidInput(format!(
            "passing threshold {} is outside 0..=100",
            threshold
        )));
    }

    let kinds = questions
        .iter()
        .map(|q| {
            QuestionKind::parse(&q.question_type).ok_or_else(|| {
                ScoreError::UnsupportedQuestionType {
                    question_id: q.id.clone(),
                    question_type: q.question_type.clone(),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut outcomes = Vec::with_capacity(questions.len());
    let mut correct_count = 0;

    for (question, kind) in questions.iter().zip(kinds) {
        let submitted = submission.get(&question.id);
        let correct = submitted.is_some_and(|value| is_correct(question, kind, value, mode));
        if correct {
            correct_count += 1;
        }
        outcomes.push(QuestionOutcome {
            question_id: question.id.clone(),
            answered: submitted.is_some(),
            correct,
        });
    }

    let score = percentage(correct_count, questions.len());

    Ok(Grading {
        result: ScoreResult {
            total_questions: questions.len(),
            correct_answers: correct_count,
            score,
            passed: i64::from(score) >= threshold,
        },
        outcomes,
    })
}

/// Judges one submitted value against a question's answer key.
fn is_correct(question: &Question, kind: QuestionKind, submitted: &str, mode: AnswerMode) -> bool {
    match kind {
        QuestionKind::MultipleChoice | QuestionKind::TrueFalse => match mode {
            AnswerMode::Text => submitted == question.correct_answer,
            AnswerMode::Id => normalize::correct_option_id(question) == Some(submitted),
        },
        QuestionKind::ShortAnswer => {
            normalize::fold_short_answer(submitted)
                == normalize::fold_short_answer(&question.correct_answer)
        }
        QuestionKind::Integer => {
            match (
                normalize::parse_integer(submitted),
                normalize::parse_integer(&question.correct_answer),
            ) {
                (Some(given), Some(expected)) => given == expected,
                _ => false,
            }
        }
    }
}

/// `round(100 * correct / total)` with halves rounded up, in integer arithmetic.
/// `total` must be non-zero.
pub fn percentage(correct: usize, total: usize) -> u32 {
    let pct = (200 * correct + total) / (2 * total);
    pct as u32
}

/// Rewrites a text-mode answer map into the canonical id form.
///
/// For questions that carry options, a submitted option text is replaced by
/// the id of the first option with that text; text that names no option is
/// dropped, since it was wrong in text mode and could collide with an option
/// id. Answers to option-less questions are kept verbatim. Keys that are not
/// question ids of this test are dropped.
///
/// The migrated map grades the same in id mode as the original does in text
/// mode, except when a question's correct answer names none of its options.
pub fn migrate_text_answers(
    questions: &[Question],
    answers: &HashMap<String, String>,
) -> HashMap<String, String> {
    questions
        .iter()
        .filter_map(|q| {
            let value = answers.get(&q.id)?;
            let migrated = match QuestionKind::parse(&q.question_type) {
                Some(QuestionKind::MultipleChoice | QuestionKind::TrueFalse)
                    if !q.options.is_empty() =>
                {
                    normalize::option_id_for_text(q, value)?.to_string()
                }
                _ => value.clone(),
            };
            Some((q.id.clone(), migrated))
        })
        .collect()
}
