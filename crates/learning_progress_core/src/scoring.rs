//! crates/learning_progress_core/src/scoring.rs
//!
//! Grades quiz submissions and applies the best-score rule to an attempt record.

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::{QuestionFeedback, QuizAttemptRecord, QuizQuestion};
use crate::ports::{PortError, PortResult};

/// Outcome of comparing a submission against the answer keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
    pub total: usize,
    pub correct: usize,
    pub score_percent: i32,
    pub feedback: Vec<QuestionFeedback>,
}

/// Grades `answers` (question id -> option letter) against `questions`.
///
/// Every question must be answered with one of its own option letters, compared
/// case-insensitively. Answers for questions outside the set are rejected.
pub fn grade(questions: &[QuizQuestion], answers: &HashMap<Uuid, String>) -> PortResult<Grade> {
    if questions.is_empty() {
        return Err(PortError::NotFound("No questions for this quiz".to_string()));
    }

    if let Some(unknown) = answers
        .keys()
        .find(|id| !questions.iter().any(|q| q.id == **id))
    {
        return Err(PortError::Validation(format!(
            "Answer given for unknown question {}",
            unknown
        )));
    }

    let mut feedback = Vec::with_capacity(questions.len());
    for question in questions {
        let raw = answers.get(&question.id).ok_or_else(|| {
            PortError::Validation(format!("Missing answer for question {}", question.id))
        })?;
        let submitted = parse_letter(raw).ok_or_else(|| {
            PortError::Validation(format!(
                "Answer '{}' for question {} is not a single option letter",
                raw, question.id
            ))
        })?;
        if !question.has_option(submitted) {
            return Err(PortError::Validation(format!(
                "Option '{}' does not exist for question {}",
                submitted, question.id
            )));
        }

        let correct = submitted == question.correct_option.to_ascii_uppercase();
        feedback.push(QuestionFeedback {
            question_id: question.id,
            submitted,
            correct,
            explanation: (!correct).then(|| question.explanation.clone()),
        });
    }

    let total = questions.len();
    let correct = feedback.iter().filter(|f| f.correct).count();
    Ok(Grade {
        total,
        correct,
        score_percent: score_percent(correct, total),
        feedback,
    })
}

/// `floor(correct / total * 100)`, 0 for an empty quiz.
pub fn score_percent(correct: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    ((correct * 100) / total) as i32
}

/// Applies a graded attempt to the learner's record for that quiz and returns the
/// XP the attempt is worth. Only an improvement over the best score pays, and only
/// the difference to what the quiz already paid out.
pub fn apply_attempt(
    record: &mut QuizAttemptRecord,
    correct: usize,
    total: usize,
    xp_per_correct_answer: i64,
) -> i64 {
    let correct = i32::try_from(correct).unwrap_or(i32::MAX);
    record.total_questions = i32::try_from(total).unwrap_or(i32::MAX);
    if correct <= record.best_score {
        return 0;
    }

    let earned = i64::from(correct) * xp_per_correct_answer;
    let delta = (earned - record.max_xp_earned).max(0);
    record.best_score = correct;
    record.max_xp_earned = record.max_xp_earned.max(earned);
    delta
}

fn parse_letter(raw: &str) -> Option<char> {
    let mut chars = raw.trim().chars();
    let letter = chars.next()?;
    if chars.next().is_some() || !letter.is_ascii_alphabetic() {
        return None;
    }
    Some(letter.to_ascii_uppercase())
}
