use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::quiz::catalog::normalize_id;
use crate::quiz::selector::AnswerStatus;
use crate::quiz::shuffle::Permutation;
use crate::quiz::Letter;
use crate::store::{AnswerEvent, ShownRecord, Store, Tally, TopicTally, UserBreakdown, UserScore};

/// Raw answer and shown events in SQLite; every aggregate is computed on read.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        info!("Opening answer database at {}", path.as_ref().display());
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::PersistenceUnavailable("database lock poisoned".to_string()))
    }

    fn grouped(&self, sql: &str, user_id: &str, with_subtopic: bool) -> Result<Vec<TopicTally>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id], |row| {
            let topic: String = row.get("topic")?;
            let subtopic = if with_subtopic {
                Some(row.get::<_, String>("subtopic")?)
            } else {
                None
            };
            let correct: i64 = row.get("correct")?;
            let total: i64 = row.get("total")?;
            Ok(TopicTally {
                topic,
                subtopic,
                tally: Tally::new(correct as u64, total as u64),
            })
        })?;
        let tallies = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tallies)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS answers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            correct INTEGER NOT NULL,
            submitted TEXT NOT NULL,
            topic TEXT NOT NULL DEFAULT '',
            subtopic TEXT NOT NULL DEFAULT '',
            answered_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_answers_user ON answers(user_id);
        CREATE INDEX IF NOT EXISTS idx_answers_user_question ON answers(user_id, question_id);

        CREATE TABLE IF NOT EXISTS shown (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            message_id INTEGER NOT NULL,
            displayed_correct TEXT,
            permutation TEXT NOT NULL,
            shown_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_shown_user_question_message ON shown(user_id, question_id, message_id);
        ",
    )?;
    Ok(())
}

fn canonical(question_id: &str) -> String {
    normalize_id(question_id).unwrap_or_default()
}

impl Store for SqliteStore {
    fn record_answer(&self, event: &AnswerEvent) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO answers (user_id, question_id, correct, submitted, topic, subtopic)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.user_id,
                canonical(&event.question_id),
                event.correct,
                event.submitted.to_string(),
                event.topic.trim(),
                event.subtopic.trim(),
            ],
        )?;
        debug!(
            "Recorded answer of user {} to question {} (correct: {})",
            event.user_id, event.question_id, event.correct
        );
        Ok(())
    }

    fn overall(&self, user_id: &str) -> Result<Tally> {
        let (correct, total): (i64, i64) = self.conn()?.query_row(
            "SELECT COALESCE(SUM(correct), 0), COUNT(*) FROM answers WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(Tally::new(correct as u64, total as u64))
    }

    fn topic_breakdown(&self, user_id: &str, limit: usize) -> Result<Vec<TopicTally>> {
        let mut rows = self.grouped(
            "SELECT topic, subtopic, COALESCE(SUM(correct), 0) AS correct, COUNT(*) AS total
             FROM answers WHERE user_id = ?1
             GROUP BY topic, subtopic
             ORDER BY total DESC, topic ASC, subtopic ASC",
            user_id,
            true,
        )?;
        rows.truncate(limit);
        Ok(rows)
    }

    fn user_breakdown(&self, user_id: &str) -> Result<UserBreakdown> {
        let by_topic = self.grouped(
            "SELECT topic, COALESCE(SUM(correct), 0) AS correct, COUNT(*) AS total
             FROM answers WHERE user_id = ?1
             GROUP BY topic
             ORDER BY total DESC, topic ASC",
            user_id,
            false,
        )?;
        let by_subtopic = self.topic_breakdown(user_id, usize::MAX)?;
        Ok(UserBreakdown {
            by_topic,
            by_subtopic,
        })
    }

    fn users_overall(&self, limit: Option<usize>) -> Result<Vec<UserScore>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, COALESCE(SUM(correct), 0), COUNT(*) AS total
             FROM answers
             GROUP BY user_id
             ORDER BY total DESC, user_id ASC
             LIMIT ?1",
        )?;
        // SQLite treats a negative LIMIT as no limit.
        let limit = limit.map(|l| l.min(i64::MAX as usize) as i64).unwrap_or(-1);
        let rows = stmt.query_map(params![limit], |row| {
            let user_id: String = row.get(0)?;
            let correct: i64 = row.get(1)?;
            let total: i64 = row.get(2)?;
            Ok(UserScore {
                user_id,
                tally: Tally::new(correct as u64, total as u64),
            })
        })?;
        let scores = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(scores)
    }

    fn question_statuses(&self, user_id: &str) -> Result<HashMap<String, AnswerStatus>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT question_id, MAX(correct) FROM answers WHERE user_id = ?1 GROUP BY question_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut statuses = HashMap::new();
        for row in rows {
            let (question_id, best) = row?;
            if let Some(id) = normalize_id(&question_id) {
                let status = AnswerStatus::from_best_attempt(best == 1);
                // Rows stored before normalization may alias; a correct one wins.
                let entry = statuses.entry(id).or_insert(status);
                if status == AnswerStatus::CorrectAtLeastOnce {
                    *entry = status;
                }
            }
        }
        Ok(statuses)
    }

    fn record_shown(&self, record: &ShownRecord) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO shown (user_id, question_id, message_id, displayed_correct, permutation)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.user_id,
                canonical(&record.question_id),
                record.message_id,
                record.displayed_correct.map(|l| l.to_string()),
                record.permutation.encode(),
            ],
        )?;
        Ok(())
    }

    fn shown_correct(&self, user_id: &str, question_id: &str, message_id: i32) -> Result<Option<Letter>> {
        let letter: Option<Option<String>> = self
            .conn()?
            .query_row(
                "SELECT displayed_correct FROM shown
                 WHERE user_id = ?1 AND question_id = ?2 AND message_id = ?3
                 ORDER BY id DESC LIMIT 1",
                params![user_id, canonical(question_id), message_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(letter.flatten().as_deref().and_then(Letter::parse))
    }

    fn last_permutation(&self, user_id: &str, question_id: &str) -> Result<Option<Permutation>> {
        let encoded: Option<String> = self
            .conn()?
            .query_row(
                "SELECT permutation FROM shown
                 WHERE user_id = ?1 AND question_id = ?2
                 ORDER BY id DESC LIMIT 1",
                params![user_id, canonical(question_id)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(encoded.as_deref().and_then(Permutation::parse))
    }

    fn reset_user(&self, user_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM answers WHERE user_id = ?1", params![user_id])?;
        conn.execute("DELETE FROM shown WHERE user_id = ?1", params![user_id])?;
        info!("Reset statistics of user {}", user_id);
        Ok(())
    }
}
