use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::quiz::{Letter, Question};

/// Upper bound on redraws when a fresh order collides with the previous one.
pub const MAX_SHUFFLE_ATTEMPTS: usize = 12;

/// On-screen order of the options.
///
/// Position `i` is displayed as `Letter::ALL[i]` and holds the option's original
/// letter, so `"CAB"` shows original C under A, original A under B and original B
/// under C.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Permutation(Vec<Letter>);

impl Permutation {
    /// Fails on empty input, unknown letters, repeats, or more letters than labels.
    pub fn new(originals: Vec<Letter>) -> Option<Self> {
        if originals.is_empty() || originals.len() > Letter::ALL.len() {
            return None;
        }
        let mut sorted = originals.clone();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != originals.len() {
            return None;
        }
        Some(Self(originals))
    }

    pub fn identity(labels: &[Letter]) -> Option<Self> {
        Self::new(labels.to_vec())
    }

    pub fn parse(encoded: &str) -> Option<Self> {
        let letters = encoded
            .trim()
            .chars()
            .map(Letter::from_char)
            .collect::<Option<Vec<_>>>()?;
        Self::new(letters)
    }

    pub fn encode(&self) -> String {
        self.0.iter().map(|l| l.as_char()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Original letters in displayed order.
    pub fn originals(&self) -> &[Letter] {
        &self.0
    }

    /// Where the option originally labelled `original` ends up on screen.
    pub fn displayed_for(&self, original: Letter) -> Option<Letter> {
        self.0
            .iter()
            .position(|l| *l == original)
            .and_then(Letter::from_index)
    }

    /// Which original option sits under the displayed label.
    pub fn original_for(&self, displayed: Letter) -> Option<Letter> {
        self.0.get(displayed.index()).copied()
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Draws a new option order for `labels`, never equal to `previous` unless
/// there is only one label.
///
/// After `MAX_SHUFFLE_ATTEMPTS` colliding draws the first two positions of the
/// last draw are swapped.
pub fn generate<R: Rng + ?Sized>(
    labels: &[Letter],
    previous: Option<&Permutation>,
    rng: &mut R,
) -> Option<Permutation> {
    let mut order = labels.to_vec();
    for _ in 0..MAX_SHUFFLE_ATTEMPTS {
        order.shuffle(rng);
        let drawn = Permutation::new(order.clone())?;
        if previous != Some(&drawn) {
            return Some(drawn);
        }
    }
    if order.len() >= 2 {
        order.swap(0, 1);
    }
    Permutation::new(order)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub permutation: Permutation,
    /// `None` when the question's correct answer could not be parsed.
    pub displayed_correct: Option<Letter>,
    /// Displayed label and text, in displayed order.
    pub options: Vec<(Letter, String)>,
}

/// Shuffles the options of `question` for one showing.
///
/// Returns `None` for a question without options.
pub fn present<R: Rng + ?Sized>(
    question: &Question,
    previous: Option<&Permutation>,
    rng: &mut R,
) -> Option<Presentation> {
    let permutation = generate(&question.labels(), previous, rng)?;
    let displayed_correct = question
        .correct
        .and_then(|original| permutation.displayed_for(original));

    let options = permutation
        .originals()
        .iter()
        .enumerate()
        .filter_map(|(position, original)| {
            let displayed = Letter::from_index(position)?;
            let text = question.option_text(*original)?;
            Some((displayed, text.to_string()))
        })
        .collect();

    Some(Presentation {
        permutation,
        displayed_correct,
        options,
    })
}
