use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use log::{debug, info, warn};
use regex::Regex;

use crate::error::{Error, Result};
use crate::quiz::{Letter, Question};

/// Accepted header spellings per field. The question bank is usually exported
/// from a Portuguese spreadsheet, so both variants are recognized.
const ID_HEADERS: &[&str] = &["id"];
const TOPIC_HEADERS: &[&str] = &["topic", "tema"];
const SUBTOPIC_HEADERS: &[&str] = &["subtopic", "subtema"];
const PROMPT_HEADERS: &[&str] = &["prompt", "question", "enunciado", "pergunta"];
const CORRECT_HEADERS: &[&str] = &["correct answer", "correct", "resposta correta"];
const EXPLANATION_HEADERS: &[&str] = &["explanation", "explicação", "explicacao"];

/// Option columns that must exist in the header row; `E` is optional.
const REQUIRED_OPTIONS: [Letter; 4] = [Letter::A, Letter::B, Letter::C, Letter::D];

/// Canonical form of a question ID.
///
/// Spreadsheet exports turn integer IDs into floats ("12.0"), so integer-valued
/// numbers collapse to their integer rendering. Empty and NaN-like cells have no ID.
pub fn normalize_id(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("none") {
        return None;
    }

    if let Ok(value) = s.parse::<i64>() {
        return Some(value.to_string());
    }
    if s.contains('.') && s.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+') {
        if let Ok(value) = s.parse::<f64>() {
            if value.fract() == 0.0 && value.abs() <= MAX_EXACT_FLOAT_ID {
                return Some((value as i64).to_string());
            }
        }
    }

    Some(s.to_string())
}

/// Largest integer an `f64` still holds exactly (2^53).
const MAX_EXACT_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

/// Longest ID whose answer button data (`A|<id>|<letter>`) fits in Telegram's
/// 64-byte callback limit.
pub const MAX_ID_LEN: usize = 60;

/// Pulls the answer letter out of a free-text cell such as "Letra B" or "c)".
///
/// A letter after a marker word ("Letra", "Option", ...) or before a closing
/// parenthesis wins; otherwise the last standalone letter is taken, so
/// "A resposta é C" reads as C.
pub fn extract_letter(raw: &str) -> Option<Letter> {
    static MARKED: OnceLock<Regex> = OnceLock::new();
    static STANDALONE: OnceLock<Regex> = OnceLock::new();
    let marked = MARKED.get_or_init(|| {
        Regex::new(
            r"\b(?:LETRA|LETTER|OPÇÃO|OPCAO|OPTION|ALTERNATIVA|ANSWER)\s*:?\s*\(?([A-E])\b|\b([A-E])\)",
        )
        .expect("valid marked letter pattern")
    });
    let standalone =
        STANDALONE.get_or_init(|| Regex::new(r"\b([A-E])\b").expect("valid letter pattern"));

    let upper = raw.trim().to_uppercase();
    let found = match marked.captures(&upper) {
        Some(caps) => caps.get(1).or_else(|| caps.get(2)),
        None => standalone
            .captures_iter(&upper)
            .last()
            .and_then(|caps| caps.get(1)),
    };
    found
        .and_then(|m| m.as_str().chars().next())
        .and_then(Letter::from_char)
}

#[derive(Debug, Default)]
pub struct Catalog {
    questions: HashMap<String, Question>,
    by_topic: BTreeMap<String, Vec<String>>,
    by_subtopic: BTreeMap<(String, String), Vec<String>>,
}

struct Columns {
    id: usize,
    topic: usize,
    subtopic: usize,
    prompt: Option<usize>,
    options: Vec<(Letter, usize)>,
    correct: Option<usize>,
    explanation: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));
        let require = |aliases: &[&str]| {
            find(aliases).ok_or_else(|| Error::MissingColumn(aliases[0].to_string()))
        };

        let mut options = Vec::new();
        for letter in Letter::ALL {
            let aliases = [
                format!("option {}", letter).to_lowercase(),
                format!("opção {}", letter).to_lowercase(),
                format!("opcao {}", letter).to_lowercase(),
            ];
            match names.iter().position(|n| aliases.contains(n)) {
                Some(idx) => options.push((letter, idx)),
                None if REQUIRED_OPTIONS.contains(&letter) => {
                    return Err(Error::MissingColumn(format!("option {}", letter)));
                }
                None => {}
            }
        }

        let columns = Self {
            id: require(ID_HEADERS)?,
            topic: require(TOPIC_HEADERS)?,
            subtopic: require(SUBTOPIC_HEADERS)?,
            prompt: find(PROMPT_HEADERS),
            options,
            correct: find(CORRECT_HEADERS),
            explanation: find(EXPLANATION_HEADERS),
        };
        if columns.correct.is_none() {
            warn!("Question bank has no correct-answer column; every answer will be unverifiable");
        }
        Ok(columns)
    }
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading question bank from {}", path.display());
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = Columns::resolve(reader.headers()?)?;
        let mut catalog = Catalog::default();

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let cell = |idx: usize| record.get(idx).unwrap_or("").trim();

            let id = match normalize_id(cell(columns.id)) {
                Some(id) => id,
                None => {
                    warn!("Skipping row {}: empty question ID", row + 2);
                    continue;
                }
            };
            if id.len() > MAX_ID_LEN {
                warn!(
                    "Skipping row {}: question ID longer than {} bytes",
                    row + 2,
                    MAX_ID_LEN
                );
                continue;
            }
            if catalog.questions.contains_key(&id) {
                warn!("Skipping row {}: duplicate question ID {}", row + 2, id);
                continue;
            }

            let options = columns
                .options
                .iter()
                .filter_map(|(letter, idx)| {
                    let text = cell(*idx);
                    (!text.is_empty()).then(|| (*letter, text.to_string()))
                })
                .collect();

            let question = Question {
                id: id.clone(),
                topic: cell(columns.topic).to_string(),
                subtopic: cell(columns.subtopic).to_string(),
                prompt: columns.prompt.map(|idx| cell(idx).to_string()).unwrap_or_default(),
                options,
                correct: columns.correct.and_then(|idx| extract_letter(cell(idx))),
                explanation: columns
                    .explanation
                    .map(|idx| cell(idx).to_string())
                    .filter(|text| !text.is_empty()),
            };
            if question.correct.is_none() {
                debug!("Question {} has no parseable correct answer", id);
            }
            catalog.insert(question);
        }

        info!(
            "Question bank loaded: {} questions in {} topics",
            catalog.len(),
            catalog.by_topic.len()
        );
        Ok(catalog)
    }

    fn insert(&mut self, question: Question) {
        self.by_topic
            .entry(question.topic.clone())
            .or_default()
            .push(question.id.clone());
        self.by_subtopic
            .entry((question.topic.clone(), question.subtopic.clone()))
            .or_default()
            .push(question.id.clone());
        self.questions.insert(question.id.clone(), question);
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        normalize_id(id).and_then(|id| self.questions.get(&id))
    }

    pub fn require(&self, id: &str) -> Result<&Question> {
        self.get(id)
            .ok_or_else(|| Error::QuestionNotFound(id.trim().to_string()))
    }

    /// Topics in sorted order.
    pub fn topics(&self) -> Vec<&str> {
        self.by_topic.keys().map(String::as_str).collect()
    }

    /// Subtopics of `topic` in sorted order.
    pub fn subtopics(&self, topic: &str) -> Vec<&str> {
        self.by_subtopic
            .keys()
            .filter(|(t, _)| t == topic)
            .map(|(_, s)| s.as_str())
            .collect()
    }

    pub fn topic_ids(&self, topic: &str) -> &[String] {
        self.by_topic.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn subtopic_ids(&self, topic: &str, subtopic: &str) -> &[String] {
        self.by_subtopic
            .get(&(topic.to_string(), subtopic.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
