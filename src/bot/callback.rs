use crate::quiz::Letter;

/// Payload carried by inline buttons.
///
/// Topics and subtopics travel as indices into the catalog's sorted lists so the
/// data stays within Telegram's 64-byte callback limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Topic(usize),
    Subtopic(usize, usize),
    Answer { question_id: String, letter: Letter },
    Next,
    Reset(bool),
}

impl Action {
    pub fn parse(data: &str) -> Option<Self> {
        // Question IDs may contain the separator; the letter is always last.
        if let Some(rest) = data.strip_prefix("A|") {
            let (question_id, letter) = rest.rsplit_once('|')?;
            if question_id.is_empty() {
                return None;
            }
            return Some(Action::Answer {
                question_id: question_id.to_string(),
                letter: Letter::parse(letter)?,
            });
        }

        let mut parts = data.split('|');
        let action = match (parts.next()?, parts.next(), parts.next()) {
            ("T", Some(topic), None) => Action::Topic(topic.parse().ok()?),
            ("S", Some(topic), Some(subtopic)) => {
                Action::Subtopic(topic.parse().ok()?, subtopic.parse().ok()?)
            }
            ("N", None, None) => Action::Next,
            ("R", Some(decision), None) => match decision.to_ascii_lowercase().as_str() {
                "yes" => Action::Reset(true),
                "no" => Action::Reset(false),
                _ => return None,
            },
            _ => return None,
        };
        match parts.next() {
            Some(_) => None,
            None => Some(action),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Action::Topic(topic) => format!("T|{}", topic),
            Action::Subtopic(topic, subtopic) => format!("S|{}|{}", topic, subtopic),
            Action::Answer {
                question_id,
                letter,
            } => format!("A|{}|{}", question_id, letter),
            Action::Next => "N".to_string(),
            Action::Reset(true) => "R|yes".to_string(),
            Action::Reset(false) => "R|no".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::catalog::MAX_ID_LEN;

    #[test]
    fn parses_every_action() {
        assert_eq!(Action::parse("T|3"), Some(Action::Topic(3)));
        assert_eq!(Action::parse("S|3|0"), Some(Action::Subtopic(3, 0)));
        assert_eq!(
            Action::parse("A|12|c"),
            Some(Action::Answer {
                question_id: "12".to_string(),
                letter: Letter::C
            })
        );
        assert_eq!(Action::parse("N"), Some(Action::Next));
        assert_eq!(Action::parse("R|YES"), Some(Action::Reset(true)));
        assert_eq!(Action::parse("R|no"), Some(Action::Reset(false)));
    }

    #[test]
    fn rejects_malformed_data() {
        for data in ["", "T", "T|x", "S|1", "A||B", "A|12|Z", "N|1", "R|maybe", "T|1|2", "X|1"] {
            assert_eq!(Action::parse(data), None, "{:?}", data);
        }
    }

    #[test]
    fn encoded_answer_fits_telegram_limit() {
        let action = Action::Answer {
            question_id: "123456".to_string(),
            letter: Letter::E,
        };
        assert_eq!(action.encode(), "A|123456|E");
        assert_eq!(Action::parse(&action.encode()), Some(action));

        let longest = Action::Answer {
            question_id: "9".repeat(MAX_ID_LEN),
            letter: Letter::E,
        };
        assert!(longest.encode().len() <= 64);
    }

    #[test]
    fn answer_ids_may_contain_the_separator() {
        let action = Action::Answer {
            question_id: "Q|7".to_string(),
            letter: Letter::A,
        };
        assert_eq!(action.encode(), "A|Q|7|A");
        assert_eq!(Action::parse("A|Q|7|A"), Some(action));
        assert_eq!(Action::parse("A|Q|7|Z"), None);
    }
}
