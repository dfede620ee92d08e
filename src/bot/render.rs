use std::collections::HashMap;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html::escape;

use crate::bot::callback::Action;
use crate::quiz::catalog::Catalog;
use crate::quiz::selector::{count_statuses, progress_icon, AnswerStatus};
use crate::quiz::shuffle::Presentation;
use crate::quiz::validator::Judgement;
use crate::store::{Tally, TopicTally, UserBreakdown, UserScore};

pub const QUIZ_FINISHED: &str = "✅ Quiz finished. Use /start to pick another topic.";
pub const NO_QUESTIONS: &str = "No questions in this subtopic.";
pub const UNKNOWN_TOPIC: &str = "This menu is out of date. Use /start again.";
pub const QUESTION_NOT_FOUND: &str = "Question not found.";
pub const RESET_CANCELLED: &str = "✅ Cancelled. Your statistics were not touched.";
pub const RESET_DONE: &str = "🧹 Statistics cleared. Use /start to begin again.";
pub const STATS_UNAVAILABLE: &str = "Statistics are unavailable right now. Please try again later.";
pub const INVALID_OPTION: &str = "Invalid option.";

const BUTTONS_PER_ROW: usize = 2;
const DETAIL_TOPIC_ROWS: usize = 30;
const DETAIL_SUBTOPIC_ROWS: usize = 50;

fn menu_rows(buttons: Vec<InlineKeyboardButton>) -> Vec<Vec<InlineKeyboardButton>> {
    buttons
        .chunks(BUTTONS_PER_ROW)
        .map(|row| row.to_vec())
        .collect()
}

fn menu_label(name: &str, ids: &[String], statuses: &HashMap<String, AnswerStatus>) -> String {
    let counts = count_statuses(ids, statuses);
    let total = counts.total();
    format!(
        "{} {} ({}/{})",
        progress_icon(counts.correct, total),
        name,
        counts.correct,
        total
    )
}

pub fn topics_menu(
    catalog: &Catalog,
    statuses: &HashMap<String, AnswerStatus>,
) -> (String, InlineKeyboardMarkup) {
    let buttons = catalog
        .topics()
        .into_iter()
        .enumerate()
        .map(|(index, topic)| {
            InlineKeyboardButton::callback(
                menu_label(topic, catalog.topic_ids(topic), statuses),
                Action::Topic(index).encode(),
            )
        })
        .collect();
    (
        "📚 <b>Choose a topic:</b>".to_string(),
        InlineKeyboardMarkup::new(menu_rows(buttons)),
    )
}

/// `None` when `topic_index` does not name a topic any more.
pub fn subtopics_menu(
    catalog: &Catalog,
    topic_index: usize,
    statuses: &HashMap<String, AnswerStatus>,
) -> Option<(String, InlineKeyboardMarkup)> {
    let topic = *catalog.topics().get(topic_index)?;
    let buttons = catalog
        .subtopics(topic)
        .into_iter()
        .enumerate()
        .map(|(index, subtopic)| {
            InlineKeyboardButton::callback(
                menu_label(subtopic, catalog.subtopic_ids(topic, subtopic), statuses),
                Action::Subtopic(topic_index, index).encode(),
            )
        })
        .collect();
    Some((
        format!("📌 <b>Topic:</b> {}\n\nChoose a <b>subtopic:</b>", escape(topic)),
        InlineKeyboardMarkup::new(menu_rows(buttons)),
    ))
}

pub fn question_message(
    position: usize,
    total: usize,
    question_id: &str,
    prompt: &str,
    shown: &Presentation,
) -> (String, InlineKeyboardMarkup) {
    let mut text = format!(
        "<b>{}/{}</b> · ID {}\n\n{}\n",
        position,
        total,
        escape(question_id),
        escape(prompt)
    );
    let mut keyboard = Vec::new();
    for (letter, option) in &shown.options {
        text.push_str(&format!("\n<b>{})</b> {}", letter, escape(option)));
        keyboard.push(vec![InlineKeyboardButton::callback(
            letter.to_string(),
            Action::Answer {
                question_id: question_id.to_string(),
                letter: *letter,
            }
            .encode(),
        )]);
    }
    (text, InlineKeyboardMarkup::new(keyboard))
}

pub fn verdict_message(judgement: &Judgement, explanation: Option<&str>) -> (String, InlineKeyboardMarkup) {
    let header = if judgement.correct {
        "✅ <b>Correct!</b>".to_string()
    } else {
        format!("❌ <b>Wrong.</b> Correct: <b>{}</b>", judgement.expected)
    };
    let text = format!(
        "{}\n\n📘 <b>Explanation:</b>\n{}",
        header,
        explanation.map(escape).unwrap_or_else(|| "—".to_string())
    );
    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "➡️ Next question",
        Action::Next.encode(),
    )]]);
    (text, keyboard)
}

fn tally_line(label: &str, tally: &Tally) -> String {
    format!(
        "• {} → {} (✅{} ❌{}) | <b>{:.1}%</b>",
        label,
        tally.total(),
        tally.correct,
        tally.incorrect,
        tally.percent()
    )
}

fn topic_label(row: &TopicTally) -> String {
    match &row.subtopic {
        Some(subtopic) => format!("<b>{}</b> / <i>{}</i>", escape(&row.topic), escape(subtopic)),
        None => format!("<b>{}</b>", escape(&row.topic)),
    }
}

fn push_rows<'a>(lines: &mut Vec<String>, rows: impl Iterator<Item = &'a TopicTally>) {
    let before = lines.len();
    lines.extend(rows.map(|row| tally_line(&topic_label(row), &row.tally)));
    if lines.len() == before {
        lines.push("—".to_string());
    }
}

pub fn progress_message(overall: &Tally, breakdown: &[TopicTally]) -> String {
    let mut lines = vec![
        "📊 <b>Overall progress</b>".to_string(),
        String::new(),
        format!("Answered: <b>{}</b>", overall.total()),
        format!("✅ Correct: <b>{}</b>", overall.correct),
        format!("❌ Wrong: <b>{}</b>", overall.incorrect),
        format!("🎯 Accuracy: <b>{:.1}%</b>", overall.percent()),
        String::new(),
        "📌 <b>By topic/subtopic (busiest first):</b>".to_string(),
    ];
    push_rows(&mut lines, breakdown.iter());
    lines.join("\n")
}

pub fn ranking_message(users: &[UserScore]) -> String {
    let mut lines = vec!["🏆 <b>Ranking (by answers)</b>".to_string(), String::new()];
    if users.is_empty() {
        lines.push("—".to_string());
    }
    for (rank, user) in users.iter().enumerate() {
        lines.push(format!(
            "{:02}) <code>{}</code> → {} (✅{} ❌{}) | <b>{:.1}%</b>",
            rank + 1,
            escape(&user.user_id),
            user.tally.total(),
            user.tally.correct,
            user.tally.incorrect,
            user.tally.percent()
        ));
    }
    lines.push(String::new());
    lines.push("Details: <code>/score &lt;user_id&gt;</code>".to_string());
    lines.join("\n")
}

pub fn user_detail_message(user_id: &str, breakdown: &UserBreakdown) -> String {
    let mut lines = vec![
        format!("🏁 <b>Detailed score</b> · user <code>{}</code>", escape(user_id)),
        String::new(),
        "📌 <b>By topic:</b>".to_string(),
    ];
    push_rows(&mut lines, breakdown.by_topic.iter().take(DETAIL_TOPIC_ROWS));
    lines.push(String::new());
    lines.push("📌 <b>By topic/subtopic:</b>".to_string());
    push_rows(&mut lines, breakdown.by_subtopic.iter().take(DETAIL_SUBTOPIC_ROWS));
    lines.join("\n")
}

pub fn reset_confirmation() -> (String, InlineKeyboardMarkup) {
    (
        "⚠️ <b>Warning:</b> this deletes all of your statistics.\n\nConfirm?".to_string(),
        InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback("✅ YES, clear", Action::Reset(true).encode()),
            InlineKeyboardButton::callback("❌ NO", Action::Reset(false).encode()),
        ]]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::shuffle::Permutation;
    use crate::quiz::validator::Source;
    use crate::quiz::Letter;
    use teloxide::types::InlineKeyboardButtonKind;

    const BANK: &str = "\
ID,Topic,Subtopic,Prompt,Option A,Option B,Option C,Option D,Correct Answer
1,Cardio,Valves,q1,a,b,c,d,A
2,Cardio,Valves,q2,a,b,c,d,A
3,Cardio,Rhythm,q3,a,b,c,d,A
4,Lungs,Asthma,q4,a,b,c,d,A
5,Neuro,Stroke,q5,a,b,c,d,A
";

    fn callback_data(button: &InlineKeyboardButton) -> &str {
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => data,
            other => panic!("unexpected button kind {:?}", other),
        }
    }

    #[test]
    fn topic_menu_shows_progress_two_per_row() {
        let catalog = Catalog::from_reader(BANK.as_bytes()).unwrap();
        let statuses: HashMap<String, AnswerStatus> = [
            ("1".to_string(), AnswerStatus::CorrectAtLeastOnce),
            ("2".to_string(), AnswerStatus::CorrectAtLeastOnce),
            ("3".to_string(), AnswerStatus::IncorrectOnly),
        ]
        .into_iter()
        .collect();

        let (_, markup) = topics_menu(&catalog, &statuses);
        let rows = &markup.inline_keyboard;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0][0].text, "🟡 Cardio (2/3)");
        assert_eq!(callback_data(&rows[0][0]), "T|0");
        assert_eq!(rows[1][0].text, "⚪ Neuro (0/1)");
    }

    #[test]
    fn subtopic_menu_uses_indices() {
        let catalog = Catalog::from_reader(BANK.as_bytes()).unwrap();
        let (text, markup) = subtopics_menu(&catalog, 0, &HashMap::new()).unwrap();
        assert!(text.contains("Cardio"));
        assert_eq!(markup.inline_keyboard[0][0].text, "⚪ Rhythm (0/1)");
        assert_eq!(callback_data(&markup.inline_keyboard[0][1]), "S|0|1");
        assert!(subtopics_menu(&catalog, 9, &HashMap::new()).is_none());
    }

    #[test]
    fn question_buttons_carry_displayed_letters() {
        let shown = Presentation {
            permutation: Permutation::parse("BA").unwrap(),
            displayed_correct: Some(Letter::B),
            options: vec![(Letter::A, "<two>".to_string()), (Letter::B, "one".to_string())],
        };
        let (text, markup) = question_message(1, 3, "12", "Pick", &shown);
        assert!(text.starts_with("<b>1/3</b> · ID 12"));
        assert!(text.contains("<b>A)</b> &lt;two&gt;"));
        assert_eq!(callback_data(&markup.inline_keyboard[1][0]), "A|12|B");
    }

    #[test]
    fn verdict_reports_expected_letter() {
        let judgement = Judgement {
            correct: false,
            expected: Letter::C,
            source: Source::Shown,
        };
        let (text, markup) = verdict_message(&judgement, None);
        assert!(text.contains("Correct: <b>C</b>"));
        assert!(text.ends_with("—"));
        assert_eq!(callback_data(&markup.inline_keyboard[0][0]), "N");
    }

    #[test]
    fn progress_rounds_only_for_display() {
        let text = progress_message(&Tally::new(1, 3), &[]);
        assert!(text.contains("33.3%"));
        assert!(text.ends_with("—"));
    }
}
