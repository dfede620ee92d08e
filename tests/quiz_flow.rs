use std::collections::HashMap;

use quizbot::quiz::catalog::Catalog;
use quizbot::quiz::selector::{choose_questions, count_statuses, AnswerStatus};
use quizbot::quiz::session::{Session, Shown};
use quizbot::quiz::shuffle::{present, Permutation};
use quizbot::quiz::validator::{judge, Source};
use quizbot::quiz::Letter;
use quizbot::store::sqlite::SqliteStore;
use quizbot::store::{AnswerEvent, ShownRecord, Store};
use rand::rngs::StdRng;
use rand::SeedableRng;

const BANK: &str = "\
ID,Tema,Subtema,Enunciado,Opção A,Opção B,Opção C,Opção D,Resposta Correta,Explicação
1.0,Cardio,Valves,Which valve?,Mitral,Aortic,Tricuspid,Pulmonary,Letra A,Left side.
2,Cardio,Valves,Murmur?,Systolic,Diastolic,Both,None,b),
3,Cardio,Valves,Sound?,S1,S2,S3,S4,C,
4,Cardio,Rhythm,Rate?,Slow,Fast,Normal,Irregular,D,
12,Lungs,Asthma,First line?,Steroid,Beta agonist,Antibiotic,,B,Short acting first.
";

fn catalog() -> Catalog {
    Catalog::from_reader(BANK.as_bytes()).unwrap()
}

fn store() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

fn answer(store: &dyn Store, user: &str, question_id: &str, correct: bool) {
    store
        .record_answer(&AnswerEvent {
            user_id: user.to_string(),
            question_id: question_id.to_string(),
            correct,
            submitted: Letter::A,
            topic: "Cardio".to_string(),
            subtopic: "Valves".to_string(),
        })
        .unwrap();
}

fn show(store: &dyn Store, catalog: &Catalog, user: &str, question_id: &str, message_id: i32, permutation: &str) {
    let question = catalog.require(question_id).unwrap();
    let permutation = Permutation::parse(permutation).unwrap();
    let displayed_correct = question.correct.and_then(|c| permutation.displayed_for(c));
    store
        .record_shown(&ShownRecord {
            user_id: user.to_string(),
            question_id: question.id.clone(),
            message_id,
            permutation,
            displayed_correct,
        })
        .unwrap();
}

#[test]
fn spreadsheet_ids_are_normalized() {
    let catalog = catalog();
    assert_eq!(catalog.len(), 5);
    assert_eq!(catalog.require("1").unwrap().id, "1");
    assert_eq!(catalog.require("01").unwrap().id, "1");
    assert_eq!(catalog.require("12.0").unwrap().correct, Some(Letter::B));
    assert_eq!(catalog.require("2").unwrap().correct, Some(Letter::B));
}

#[test]
fn fresh_user_gets_every_question_of_the_subtopic() {
    let catalog = catalog();
    let store = store();
    let statuses = store.question_statuses("new").unwrap();
    let candidates = catalog.subtopic_ids("Cardio", "Valves");

    let counts = count_statuses(candidates, &statuses);
    assert_eq!((counts.correct, counts.incorrect, counts.unattempted), (0, 0, 3));

    let mut rng = StdRng::seed_from_u64(3);
    let mut chosen = choose_questions(candidates, &statuses, 20, &mut rng).unwrap();
    chosen.sort();
    assert_eq!(chosen, vec!["1", "2", "3"]);
}

#[test]
fn queue_prefers_unattempted_then_wrong_then_right() {
    let catalog = catalog();
    let store = store();
    answer(&store, "u", "1", true);
    answer(&store, "u", "2", false);
    answer(&store, "u", "2", false);

    let statuses = store.question_statuses("u").unwrap();
    assert_eq!(statuses["1"], AnswerStatus::CorrectAtLeastOnce);
    assert_eq!(statuses["2"], AnswerStatus::IncorrectOnly);
    assert!(!statuses.contains_key("3"));

    let candidates = catalog.subtopic_ids("Cardio", "Valves");
    for seed in 0..10 {
        let mut rng = StdRng::seed_from_u64(seed);
        let chosen = choose_questions(candidates, &statuses, 20, &mut rng).unwrap();
        assert_eq!(chosen, vec!["3", "2", "1"]);

        let mut rng = StdRng::seed_from_u64(seed);
        let chosen = choose_questions(candidates, &statuses, 2, &mut rng).unwrap();
        assert_eq!(chosen, vec!["3", "2"]);
    }
}

#[test]
fn reshown_question_changes_order() {
    let catalog = catalog();
    let store = store();
    let question = catalog.require("1").unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    for message_id in 1..30 {
        let previous = store.last_permutation("u", &question.id).unwrap();
        let shown = present(question, previous.as_ref(), &mut rng).unwrap();
        if let Some(previous) = &previous {
            assert_ne!(&shown.permutation, previous);
        }

        let expected = shown.displayed_correct.unwrap();
        assert_eq!(shown.permutation.original_for(expected), Some(Letter::A));
        assert_eq!(shown.options[expected.index()].1, "Mitral");

        store
            .record_shown(&ShownRecord {
                user_id: "u".to_string(),
                question_id: question.id.clone(),
                message_id,
                permutation: shown.permutation,
                displayed_correct: shown.displayed_correct,
            })
            .unwrap();
    }
}

#[test]
fn answers_are_judged_against_the_shown_order() {
    let catalog = catalog();
    let store = store();
    show(&store, &catalog, "u", "12", 501, "CAB");

    let verdict = |letter| judge(&store, &catalog, "u", "12", 501, letter, None).unwrap();
    assert!(verdict(Letter::C).correct);
    assert_eq!(verdict(Letter::C).source, Source::Shown);
    assert!(!verdict(Letter::A).correct);
    assert!(!verdict(Letter::B).correct);
    assert_eq!(verdict(Letter::A).expected, Letter::C);
}

#[test]
fn older_message_keeps_its_own_order() {
    let catalog = catalog();
    let store = store();
    show(&store, &catalog, "u", "12", 501, "CAB");
    show(&store, &catalog, "u", "12", 502, "BCA");

    assert!(judge(&store, &catalog, "u", "12", 501, Letter::C, None).unwrap().correct);
    assert!(judge(&store, &catalog, "u", "12", 502, Letter::A, None).unwrap().correct);
    assert_eq!(
        store.last_permutation("u", "12").unwrap(),
        Permutation::parse("BCA")
    );
}

#[test]
fn session_covers_missing_shown_record() {
    let catalog = catalog();
    let store = store();
    let mut session = Session::new("Lungs".into(), "Asthma".into(), vec!["12".into()]);
    session.current = Some(Shown {
        question_id: "12".to_string(),
        message_id: 77,
        permutation: Permutation::parse("CAB").unwrap(),
        displayed_correct: Some(Letter::C),
    });

    let judgement = judge(&store, &catalog, "u", "12", 77, Letter::C, Some(&session)).unwrap();
    assert!(judgement.correct);
    assert_eq!(judgement.source, Source::Session);

    let judgement = judge(&store, &catalog, "u", "12", 78, Letter::B, Some(&session)).unwrap();
    assert!(judgement.correct);
    assert_eq!(judgement.source, Source::Original);
}

#[test]
fn late_answer_counts_under_its_own_subtopic() {
    let catalog = catalog();
    let store = store();
    show(&store, &catalog, "u", "1", 10, "BAC");
    let session = Session::new("Lungs".into(), "Asthma".into(), vec!["12".into()]);

    let question = catalog.require("1").unwrap();
    let judgement = judge(&store, &catalog, "u", "1", 10, Letter::B, Some(&session)).unwrap();
    assert!(judgement.correct);
    store
        .record_answer(&AnswerEvent::for_question("u", question, Letter::B, judgement.correct))
        .unwrap();

    let rows = store.topic_breakdown("u", 20).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].topic, "Cardio");
    assert_eq!(rows[0].subtopic.as_deref(), Some("Valves"));
}

#[test]
fn reset_wipes_only_that_user() {
    let catalog = catalog();
    let store = store();
    answer(&store, "u", "1", true);
    answer(&store, "v", "1", false);
    show(&store, &catalog, "u", "12", 501, "CAB");

    store.reset_user("u").unwrap();

    assert_eq!(store.overall("u").unwrap().total(), 0);
    assert!(store.question_statuses("u").unwrap().is_empty());
    assert_eq!(store.last_permutation("u", "12").unwrap(), None);
    assert_eq!(store.overall("v").unwrap().total(), 1);

    let statuses: HashMap<String, AnswerStatus> = store.question_statuses("u").unwrap();
    let counts = count_statuses(catalog.subtopic_ids("Cardio", "Valves"), &statuses);
    assert_eq!(counts.unattempted, 3);
}
