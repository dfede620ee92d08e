use log::warn;

use crate::error::{Error, Result};
use crate::quiz::catalog::Catalog;
use crate::quiz::session::Session;
use crate::quiz::Letter;
use crate::store::Store;

/// Where the expected letter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The shown-permutation record persisted when the question was sent.
    Shown,
    /// The chat's session, which remembers the last question it sent.
    Session,
    /// The unshuffled answer from the question bank. Only right if no shuffle happened.
    Original,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Judgement {
    pub correct: bool,
    pub expected: Letter,
    pub source: Source,
}

/// Decides whether `submitted` is the right displayed letter for the message the
/// user pressed a button on.
pub fn judge(
    store: &dyn Store,
    catalog: &Catalog,
    user_id: &str,
    question_id: &str,
    message_id: i32,
    submitted: Letter,
    session: Option<&Session>,
) -> Result<Judgement> {
    let question = catalog.require(question_id)?;

    let persisted = match store.shown_correct(user_id, &question.id, message_id) {
        Ok(letter) => letter,
        Err(err) => {
            warn!(
                "Could not look up shown permutation for user {} question {}: {}",
                user_id, question.id, err
            );
            None
        }
    };

    let (expected, source) = if let Some(letter) = persisted {
        (letter, Source::Shown)
    } else if let Some(letter) = session
        .and_then(|s| s.current_for(&question.id, message_id))
        .and_then(|shown| shown.displayed_correct)
    {
        (letter, Source::Session)
    } else if let Some(letter) = question.correct {
        warn!(
            "No shown permutation for user {} question {} message {}; comparing against the unshuffled answer",
            user_id, question.id, message_id
        );
        (letter, Source::Original)
    } else {
        return Err(Error::QuestionNotFound(question.id.clone()));
    };

    Ok(Judgement {
        correct: submitted == expected,
        expected,
        source,
    })
}
