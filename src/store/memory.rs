use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::quiz::catalog::normalize_id;
use crate::quiz::selector::AnswerStatus;
use crate::quiz::shuffle::Permutation;
use crate::quiz::Letter;
use crate::store::{
    sort_topic_tallies, sort_user_scores, AnswerEvent, ShownRecord, Store, Tally, TopicTally,
    UserBreakdown, UserScore,
};

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Records>,
}

#[derive(Debug, Default)]
struct Records {
    answers: Vec<AnswerEvent>,
    shown: Vec<ShownRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, Records>> {
        self.inner
            .lock()
            .map_err(|_| Error::PersistenceUnavailable("memory store lock poisoned".to_string()))
    }

    fn tallies_by<K, F>(&self, user_id: &str, key: F) -> Result<BTreeMap<K, Tally>>
    where
        K: Ord,
        F: Fn(&AnswerEvent) -> K,
    {
        let records = self.records()?;
        let mut out: BTreeMap<K, Tally> = BTreeMap::new();
        for event in records.answers.iter().filter(|e| e.user_id == user_id) {
            out.entry(key(event)).or_default().add(event.correct);
        }
        Ok(out)
    }
}

impl Store for MemoryStore {
    fn record_answer(&self, event: &AnswerEvent) -> Result<()> {
        let mut event = event.clone();
        event.question_id = normalize_id(&event.question_id).unwrap_or_default();
        self.records()?.answers.push(event);
        Ok(())
    }

    fn overall(&self, user_id: &str) -> Result<Tally> {
        Ok(self
            .tallies_by(user_id, |_| ())?
            .remove(&())
            .unwrap_or_default())
    }

    fn topic_breakdown(&self, user_id: &str, limit: usize) -> Result<Vec<TopicTally>> {
        let mut rows = self.user_breakdown(user_id)?.by_subtopic;
        rows.truncate(limit);
        Ok(rows)
    }

    fn user_breakdown(&self, user_id: &str) -> Result<UserBreakdown> {
        let mut by_topic: Vec<TopicTally> = self
            .tallies_by(user_id, |e| e.topic.clone())?
            .into_iter()
            .map(|(topic, tally)| TopicTally {
                topic,
                subtopic: None,
                tally,
            })
            .collect();
        let mut by_subtopic: Vec<TopicTally> = self
            .tallies_by(user_id, |e| (e.topic.clone(), e.subtopic.clone()))?
            .into_iter()
            .map(|((topic, subtopic), tally)| TopicTally {
                topic,
                subtopic: Some(subtopic),
                tally,
            })
            .collect();
        sort_topic_tallies(&mut by_topic);
        sort_topic_tallies(&mut by_subtopic);
        Ok(UserBreakdown {
            by_topic,
            by_subtopic,
        })
    }

    fn users_overall(&self, limit: Option<usize>) -> Result<Vec<UserScore>> {
        let records = self.records()?;
        let mut per_user: HashMap<&str, Tally> = HashMap::new();
        for event in &records.answers {
            per_user.entry(event.user_id.as_str()).or_default().add(event.correct);
        }
        let mut rows: Vec<UserScore> = per_user
            .into_iter()
            .map(|(user_id, tally)| UserScore {
                user_id: user_id.to_string(),
                tally,
            })
            .collect();
        sort_user_scores(&mut rows);
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn question_statuses(&self, user_id: &str) -> Result<HashMap<String, AnswerStatus>> {
        let records = self.records()?;
        let mut best: HashMap<String, bool> = HashMap::new();
        for event in records.answers.iter().filter(|e| e.user_id == user_id) {
            if event.question_id.is_empty() {
                continue;
            }
            *best.entry(event.question_id.clone()).or_default() |= event.correct;
        }
        Ok(best
            .into_iter()
            .map(|(id, any_correct)| (id, AnswerStatus::from_best_attempt(any_correct)))
            .collect())
    }

    fn record_shown(&self, record: &ShownRecord) -> Result<()> {
        let mut record = record.clone();
        record.question_id = normalize_id(&record.question_id).unwrap_or_default();
        self.records()?.shown.push(record);
        Ok(())
    }

    fn shown_correct(&self, user_id: &str, question_id: &str, message_id: i32) -> Result<Option<Letter>> {
        let question_id = normalize_id(question_id).unwrap_or_default();
        Ok(self
            .records()?
            .shown
            .iter()
            .rev()
            .find(|r| r.user_id == user_id && r.question_id == question_id && r.message_id == message_id)
            .and_then(|r| r.displayed_correct))
    }

    fn last_permutation(&self, user_id: &str, question_id: &str) -> Result<Option<Permutation>> {
        let question_id = normalize_id(question_id).unwrap_or_default();
        Ok(self
            .records()?
            .shown
            .iter()
            .rev()
            .find(|r| r.user_id == user_id && r.question_id == question_id)
            .map(|r| r.permutation.clone()))
    }

    fn reset_user(&self, user_id: &str) -> Result<()> {
        let mut records = self.records()?;
        records.answers.retain(|e| e.user_id != user_id);
        records.shown.retain(|r| r.user_id != user_id);
        Ok(())
    }
}
