use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Error, Result};

/// What a user has done with a single question so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnswerStatus {
    #[default]
    Unattempted,
    IncorrectOnly,
    CorrectAtLeastOnce,
}

impl AnswerStatus {
    /// Any correct attempt wins over every incorrect one.
    pub fn from_best_attempt(any_correct: bool) -> Self {
        if any_correct {
            AnswerStatus::CorrectAtLeastOnce
        } else {
            AnswerStatus::IncorrectOnly
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub correct: usize,
    pub incorrect: usize,
    pub unattempted: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.correct + self.incorrect + self.unattempted
    }
}

fn status_of(statuses: &HashMap<String, AnswerStatus>, id: &str) -> AnswerStatus {
    statuses.get(id).copied().unwrap_or_default()
}

pub fn count_statuses(ids: &[String], statuses: &HashMap<String, AnswerStatus>) -> StatusCounts {
    let mut counts = StatusCounts::default();
    let mut seen = HashSet::new();
    for id in ids.iter().filter(|id| seen.insert(*id)) {
        match status_of(statuses, id) {
            AnswerStatus::Unattempted => counts.unattempted += 1,
            AnswerStatus::IncorrectOnly => counts.incorrect += 1,
            AnswerStatus::CorrectAtLeastOnce => counts.correct += 1,
        }
    }
    counts
}

/// Builds the question queue for one topic/subtopic.
///
/// Questions never attempted come first, then the ones only ever answered wrong,
/// then the ones answered right at least once. Each group is shuffled on its own.
/// A `limit` of zero is treated as one.
pub fn choose_questions<R: Rng + ?Sized>(
    candidates: &[String],
    statuses: &HashMap<String, AnswerStatus>,
    limit: usize,
    rng: &mut R,
) -> Result<Vec<String>> {
    if candidates.is_empty() {
        return Err(Error::NoQuestionsAvailable);
    }

    let mut never = Vec::new();
    let mut wrong = Vec::new();
    let mut right = Vec::new();
    let mut seen = HashSet::new();
    for id in candidates.iter().filter(|id| seen.insert(*id)) {
        match status_of(statuses, id) {
            AnswerStatus::Unattempted => never.push(id.clone()),
            AnswerStatus::IncorrectOnly => wrong.push(id.clone()),
            AnswerStatus::CorrectAtLeastOnce => right.push(id.clone()),
        }
    }

    never.shuffle(rng);
    wrong.shuffle(rng);
    right.shuffle(rng);

    let mut chosen = never;
    chosen.append(&mut wrong);
    chosen.append(&mut right);
    chosen.truncate(limit.max(1));
    Ok(chosen)
}

/// Menu badge: white up to half right, yellow above half, check mark when done.
pub fn progress_icon(correct: usize, total: usize) -> &'static str {
    if total == 0 {
        return "⚪";
    }
    if correct >= total {
        return "✅";
    }
    if correct * 2 > total {
        return "🟡";
    }
    "⚪"
}
