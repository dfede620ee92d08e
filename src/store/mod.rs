//! Answer history and shown-permutation records.
//!
//! The bot only talks to [`Store`]; the backend is picked at start-up and passed
//! in explicitly.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use crate::error::Result;
use crate::quiz::selector::AnswerStatus;
use crate::quiz::shuffle::Permutation;
use crate::quiz::{Letter, Question};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEvent {
    pub user_id: String,
    pub question_id: String,
    pub correct: bool,
    pub submitted: Letter,
    pub topic: String,
    pub subtopic: String,
}

impl AnswerEvent {
    /// Filed under the question's own topic and subtopic, whatever the chat is
    /// practicing now.
    pub fn for_question(user_id: &str, question: &Question, submitted: Letter, correct: bool) -> Self {
        Self {
            user_id: user_id.to_string(),
            question_id: question.id.clone(),
            correct,
            submitted,
            topic: question.topic.clone(),
            subtopic: question.subtopic.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownRecord {
    pub user_id: String,
    pub question_id: String,
    pub message_id: i32,
    pub permutation: Permutation,
    pub displayed_correct: Option<Letter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub correct: u64,
    pub incorrect: u64,
}

impl Tally {
    pub fn new(correct: u64, total: u64) -> Self {
        Self {
            correct,
            incorrect: total.saturating_sub(correct),
        }
    }

    pub fn total(&self) -> u64 {
        self.correct + self.incorrect
    }

    /// Share of correct answers in percent, unrounded.
    pub fn percent(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct as f64 / total as f64 * 100.0,
        }
    }

    fn add(&mut self, correct: bool) {
        if correct {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicTally {
    pub topic: String,
    /// `None` for per-topic rows.
    pub subtopic: Option<String>,
    pub tally: Tally,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserBreakdown {
    pub by_topic: Vec<TopicTally>,
    pub by_subtopic: Vec<TopicTally>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserScore {
    pub user_id: String,
    pub tally: Tally,
}

pub trait Store: Send + Sync {
    fn record_answer(&self, event: &AnswerEvent) -> Result<()>;

    fn overall(&self, user_id: &str) -> Result<Tally>;

    /// Per (topic, subtopic), busiest first.
    fn topic_breakdown(&self, user_id: &str, limit: usize) -> Result<Vec<TopicTally>>;

    fn user_breakdown(&self, user_id: &str) -> Result<UserBreakdown>;

    /// Users ordered by number of answers, all of them when `limit` is `None`.
    fn users_overall(&self, limit: Option<usize>) -> Result<Vec<UserScore>>;

    /// Only attempted questions appear; absence means never attempted.
    fn question_statuses(&self, user_id: &str) -> Result<HashMap<String, AnswerStatus>>;

    fn record_shown(&self, record: &ShownRecord) -> Result<()>;

    /// Displayed correct letter recorded for this exact message, latest first.
    fn shown_correct(&self, user_id: &str, question_id: &str, message_id: i32) -> Result<Option<Letter>>;

    /// Most recent order shown to the user for the question, on any message.
    fn last_permutation(&self, user_id: &str, question_id: &str) -> Result<Option<Permutation>>;

    /// Drops every answer and shown record of the user.
    fn reset_user(&self, user_id: &str) -> Result<()>;
}

/// Sort order shared by the backends: busiest first, then by name.
fn sort_topic_tallies(rows: &mut [TopicTally]) {
    rows.sort_by(|a, b| {
        b.tally
            .total()
            .cmp(&a.tally.total())
            .then_with(|| a.topic.cmp(&b.topic))
            .then_with(|| a.subtopic.cmp(&b.subtopic))
    });
}

fn sort_user_scores(rows: &mut [UserScore]) {
    rows.sort_by(|a, b| {
        b.tally
            .total()
            .cmp(&a.tally.total())
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_event_uses_the_question_topic() {
        let question = Question {
            id: "1".to_string(),
            topic: "Cardio".to_string(),
            subtopic: "Valves".to_string(),
            prompt: String::new(),
            options: vec![(Letter::A, "x".to_string()), (Letter::B, "y".to_string())],
            correct: Some(Letter::A),
            explanation: None,
        };
        let event = AnswerEvent::for_question("u", &question, Letter::B, false);
        assert_eq!(event.topic, "Cardio");
        assert_eq!(event.subtopic, "Valves");
        assert_eq!(event.question_id, "1");
        assert!(!event.correct);
    }

    #[test]
    fn percent_is_unrounded() {
        let tally = Tally::new(1, 3);
        assert_eq!(tally.incorrect, 2);
        assert!((tally.percent() - 100.0 / 3.0).abs() < 1e-12);
        assert_eq!(Tally::default().percent(), 0.0);
    }
}
