pub mod catalog;
pub mod selector;
pub mod session;
pub mod shuffle;
pub mod validator;

use std::fmt;

/// Label of an answer option, both as stored in the question bank and as shown
/// on the buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
    E,
}

impl Letter {
    pub const ALL: [Letter; 5] = [Letter::A, Letter::B, Letter::C, Letter::D, Letter::E];

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            'E' => Some(Letter::E),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Letter::A => 'A',
            Letter::B => 'B',
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Accepts exactly one letter, surrounding whitespace ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c),
            _ => None,
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub id: String,
    pub topic: String,
    pub subtopic: String,
    pub prompt: String,
    /// Only options with non-empty text, in label order.
    pub options: Vec<(Letter, String)>,
    pub correct: Option<Letter>,
    pub explanation: Option<String>,
}

impl Question {
    pub fn labels(&self) -> Vec<Letter> {
        self.options.iter().map(|(letter, _)| *letter).collect()
    }

    pub fn option_text(&self, letter: Letter) -> Option<&str> {
        self.options
            .iter()
            .find(|(l, _)| *l == letter)
            .map(|(_, text)| text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_parsing() {
        assert_eq!(Letter::parse(" c "), Some(Letter::C));
        assert_eq!(Letter::parse("e"), Some(Letter::E));
        assert_eq!(Letter::parse("F"), None);
        assert_eq!(Letter::parse("AB"), None);
        assert_eq!(Letter::parse(""), None);
        assert_eq!(Letter::from_index(3), Some(Letter::D));
        assert_eq!(Letter::D.index(), 3);
        assert_eq!(Letter::B.to_string(), "B");
    }
}
