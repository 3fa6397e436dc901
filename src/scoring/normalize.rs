// src/scoring/normalize.rs

//! Answer normalization used by the scorer.

use crate::models::test::Question;

/// Folds a short answer for comparison: surrounding whitespace removed, lower-cased.
/// Inner whitespace and punctuation are kept as typed.
pub fn fold_short_answer(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Parses a base-10 integer answer.
///
/// Surrounding whitespace and a single leading sign are accepted.
/// Anything else (including overflow) is `None`, which never matches.
pub fn parse_integer(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// Resolves the canonical id of the correct option.
///
/// The stored `correct_answer` holds the option *text*. A question without
/// options (true/false) has no separate id space, so its answer is its own id.
/// Returns `None` when options exist but none carries the correct text.
pub fn correct_option_id(question: &Question) -> Option<&str> {
    if question.options.is_empty() {
        return Some(question.correct_answer.as_str());
    }

    question
        .options
        .iter()
        .find(|opt| opt.text == question.correct_answer)
        .map(|opt| opt.id.as_str())
}

/// Maps a submitted option text to the id of the first option with that text.
pub fn option_id_for_text<'a>(question: &'a Question, text: &str) -> Option<&'a str> {
    question
        .options
        .iter()
        .find(|opt| opt.text == text)
        .map(|opt| opt.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test::QuestionOption;

    fn choice(correct: &str) -> Question {
        Question {
            id: "q1".to_string(),
            question_type: "multiple-choice".to_string(),
            content: "Capital of France?".to_string(),
            correct_answer: correct.to_string(),
            options: vec![
                QuestionOption::new("a", "Paris"),
                QuestionOption::new("b", "Lyon"),
                QuestionOption::new("c", "Paris"),
            ],
            marks: None,
        }
    }

    #[test]
    fn test_fold_short_answer() {
        assert_eq!(fold_short_answer(" Paris "), "paris");
        assert_eq!(fold_short_answer("PARIS"), "paris");
        assert_eq!(fold_short_answer("New  York"), "new  york");
        assert_eq!(fold_short_answer("paris."), "paris.");
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("7"), Some(7));
        assert_eq!(parse_integer("007"), Some(7));
        assert_eq!(parse_integer("  42\n"), Some(42));
        assert_eq!(parse_integer("-3"), Some(-3));
        assert_eq!(parse_integer("+3"), Some(3));
        assert_eq!(parse_integer("abc"), None);
        assert_eq!(parse_integer("12abc"), None);
        assert_eq!(parse_integer("1.5"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("99999999999999999999"), None);
    }

    #[test]
    fn test_correct_option_id_takes_first_match() {
        let q = choice("Paris");
        assert_eq!(correct_option_id(&q), Some("a"));
    }

    #[test]
    fn test_correct_option_id_missing_text() {
        let q = choice("Marseille");
        assert_eq!(correct_option_id(&q), None);
    }

    #[test]
    fn test_correct_option_id_without_options() {
        let mut q = choice("true");
        q.options.clear();
        assert_eq!(correct_option_id(&q), Some("true"));
    }

    #[test]
    fn test_option_id_for_text() {
        let q = choice("Paris");
        assert_eq!(option_id_for_text(&q, "Lyon"), Some("b"));
        assert_eq!(option_id_for_text(&q, "lyon"), None);
    }
}
