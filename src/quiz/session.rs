use crate::quiz::shuffle::Permutation;
use crate::quiz::Letter;

/// The question most recently sent to the chat.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Shown {
    pub question_id: String,
    pub message_id: i32,
    pub permutation: Permutation,
    pub displayed_correct: Option<Letter>,
}

/// Question queue for the topic/subtopic currently being practiced in a chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub topic: String,
    pub subtopic: String,
    pub queue: Vec<String>,
    pub cursor: usize,
    pub current: Option<Shown>,
}

impl Session {
    pub fn new(topic: String, subtopic: String, queue: Vec<String>) -> Self {
        Self {
            topic,
            subtopic,
            queue,
            cursor: 0,
            current: None,
        }
    }

    /// Takes the next question ID and moves the cursor past it.
    pub fn next_question(&mut self) -> Option<String> {
        let id = self.queue.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(id)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.queue.len()
    }

    /// 1-based number of the question last taken from the queue.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn current_for(&self, question_id: &str, message_id: i32) -> Option<&Shown> {
        self.current
            .as_ref()
            .filter(|shown| shown.question_id == question_id && shown.message_id == message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_the_queue_once() {
        let mut session = Session::new(
            "T".to_string(),
            "S".to_string(),
            vec!["1".to_string(), "2".to_string()],
        );
        assert!(!session.is_exhausted());
        assert_eq!(session.next_question().as_deref(), Some("1"));
        assert_eq!(session.position(), 1);
        assert_eq!(session.next_question().as_deref(), Some("2"));
        assert!(session.is_exhausted());
        assert_eq!(session.next_question(), None);
        assert_eq!(session.position(), 2);
    }

    #[test]
    fn current_matches_question_and_message() {
        let mut session = Session::new("T".to_string(), "S".to_string(), vec!["1".to_string()]);
        session.current = Some(Shown {
            question_id: "1".to_string(),
            message_id: 10,
            permutation: Permutation::parse("BA").unwrap(),
            displayed_correct: Some(Letter::B),
        });
        assert!(session.current_for("1", 10).is_some());
        assert!(session.current_for("1", 11).is_none());
        assert!(session.current_for("2", 10).is_none());
    }
}
