use std::{collections::HashMap, error::Error, net::SocketAddr, sync::Arc};

use dotenv::dotenv;
use log::{debug, error, info, warn};
use quizbot::{
    bot::{callback::Action, render},
    config::{Config, StorageBackend},
    quiz::{
        catalog::Catalog,
        selector::{choose_questions, AnswerStatus},
        session::{Session, Shown},
        shuffle::{present, Permutation},
        validator::judge,
        Letter,
    },
    store::{memory::MemoryStore, sqlite::SqliteStore, AnswerEvent, ShownRecord, Store},
};
use teloxide::{
    dispatching::{
        dialogue::{self, serializer::Json, ErasedStorage, SqliteStorage, Storage},
        UpdateHandler,
    },
    prelude::*,
    types::{ChatId, ParseMode},
    update_listeners::webhooks,
    utils::command::BotCommands,
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;
type DialogueStorage = Arc<ErasedStorage<State>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Idle,
    Quiz(Session),
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "pick a topic and a subtopic")]
    Start,
    #[command(description = "show your progress by topic/subtopic")]
    Progress,
    #[command(description = "ranking of all users, or /score <user_id> for details")]
    Score(String),
    #[command(description = "clear your statistics (asks first)")]
    Reset,
}

/// Everything the handlers share. The catalog is read-only after start-up.
struct App {
    catalog: Catalog,
    store: Box<dyn Store>,
    quiz_limit: usize,
}

impl App {
    fn statuses(&self, user_id: &str) -> HashMap<String, AnswerStatus> {
        self.store.question_statuses(user_id).unwrap_or_else(|err| {
            warn!("Could not load answer statuses of user {}: {}", user_id, err);
            HashMap::new()
        })
    }

    fn last_permutation(&self, user_id: &str, question_id: &str) -> Option<Permutation> {
        self.store
            .last_permutation(user_id, question_id)
            .unwrap_or_else(|err| {
                warn!(
                    "Could not load last permutation of user {} question {}: {}",
                    user_id, question_id, err
                );
                None
            })
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();

    if let Err(err) = run().await {
        error!("Fatal: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Config::from_env()?;
    info!("Starting quiz bot...");

    let catalog = Catalog::load(&config.questions_path)?;
    if catalog.is_empty() {
        warn!("The question bank at {} has no questions", config.questions_path.display());
    } else {
        info!("Loaded {} questions", catalog.len());
    }

    let store: Box<dyn Store> = match config.storage_backend {
        StorageBackend::Sqlite => Box::new(SqliteStore::open(&config.database_path)?),
        StorageBackend::Memory => {
            warn!("Using the in-memory store; statistics are lost on restart");
            Box::new(MemoryStore::new())
        }
    };

    info!("Opening dialogue storage at {}", config.dialogue_db_path);
    let storage: DialogueStorage = SqliteStorage::open(&config.dialogue_db_path, Json)
        .await?
        .erase();

    let app = Arc::new(App {
        catalog,
        store,
        quiz_limit: config.quiz_limit,
    });

    let bot = Bot::new(config.bot_token.clone());
    bot.set_my_commands(Command::bot_commands()).await?;

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![storage, app])
        .enable_ctrlc_handler()
        .build();

    match &config.webhook {
        Some(webhook) => {
            let address = SocketAddr::from(([0, 0, 0, 0], webhook.port));
            let url: url::Url = webhook.full_url().parse()?;
            info!("Listening for webhook updates on {} ({})", address, url);
            let listener = webhooks::axum(bot, webhooks::Options::new(address, url)).await?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            info!("Polling for updates");
            dispatcher.dispatch().await;
        }
    }
    Ok(())
}

fn schema() -> UpdateHandler<Box<dyn Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(start))
        .branch(case![Command::Progress].endpoint(progress))
        .branch(case![Command::Score(user_id)].endpoint(score))
        .branch(case![Command::Reset].endpoint(reset));

    let message_handler = Update::filter_message().branch(command_handler);
    let callback_handler = Update::filter_callback_query().endpoint(callback);

    dialogue::enter::<Update, ErasedStorage<State>, State, _>()
        .branch(message_handler)
        .branch(callback_handler)
}

fn sender_id(msg: &Message) -> String {
    match msg.from() {
        Some(user) => user.id.0.to_string(),
        None => msg.chat.id.0.to_string(),
    }
}

async fn start(bot: Bot, app: Arc<App>, msg: Message) -> HandlerResult {
    let statuses = app.statuses(&sender_id(&msg));
    let (text, keyboard) = render::topics_menu(&app.catalog, &statuses);
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn progress(bot: Bot, app: Arc<App>, msg: Message) -> HandlerResult {
    let user_id = sender_id(&msg);
    let report = app
        .store
        .overall(&user_id)
        .and_then(|overall| Ok((overall, app.store.topic_breakdown(&user_id, 20)?)));

    let text = match report {
        Ok((overall, breakdown)) => render::progress_message(&overall, &breakdown),
        Err(err) => {
            warn!("Could not build progress of user {}: {}", user_id, err);
            render::STATS_UNAVAILABLE.to_string()
        }
    };
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn score(bot: Bot, app: Arc<App>, msg: Message, user_id: String) -> HandlerResult {
    let user_id = user_id.trim();
    let text = if user_id.is_empty() {
        app.store
            .users_overall(Some(20))
            .map(|users| render::ranking_message(&users))
    } else {
        app.store
            .user_breakdown(user_id)
            .map(|breakdown| render::user_detail_message(user_id, &breakdown))
    };

    let text = text.unwrap_or_else(|err| {
        warn!("Could not build score report: {}", err);
        render::STATS_UNAVAILABLE.to_string()
    });
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn reset(bot: Bot, msg: Message) -> HandlerResult {
    let (text, keyboard) = render::reset_confirmation();
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn alert(bot: &Bot, q: &CallbackQuery, text: &str) -> HandlerResult {
    bot.answer_callback_query(q.id.clone())
        .text(text)
        .show_alert(true)
        .await?;
    Ok(())
}

async fn callback(bot: Bot, app: Arc<App>, dialogue: QuizDialogue, q: CallbackQuery) -> HandlerResult {
    let action = match q.data.as_deref().and_then(Action::parse) {
        Some(action) => action,
        None => return alert(&bot, &q, render::INVALID_OPTION).await,
    };
    let message = match q.message.clone() {
        Some(message) => message,
        None => return alert(&bot, &q, render::UNKNOWN_TOPIC).await,
    };
    let user_id = q.from.id.0.to_string();
    debug!("Callback from user {}: {:?}", user_id, action);

    match action {
        Action::Topic(topic_index) => {
            let statuses = app.statuses(&user_id);
            match render::subtopics_menu(&app.catalog, topic_index, &statuses) {
                Some((text, keyboard)) => {
                    bot.answer_callback_query(q.id.clone()).await?;
                    bot.edit_message_text(message.chat.id, message.id, text)
                        .parse_mode(ParseMode::Html)
                        .reply_markup(keyboard)
                        .await?;
                }
                None => alert(&bot, &q, render::UNKNOWN_TOPIC).await?,
            }
        }
        Action::Subtopic(topic_index, subtopic_index) => {
            start_quiz(&bot, &app, &dialogue, &q, message.chat.id, &user_id, topic_index, subtopic_index).await?;
        }
        Action::Answer {
            question_id,
            letter,
        } => {
            receive_answer(&bot, &app, &dialogue, &q, &message, &user_id, &question_id, letter).await?;
        }
        Action::Next => {
            bot.answer_callback_query(q.id.clone()).await?;
            // The keyboard may already be gone; nothing to do then.
            let _ = bot.edit_message_reply_markup(message.chat.id, message.id).await;
            match dialogue.get().await? {
                Some(State::Quiz(session)) => {
                    send_next(&bot, &app, &dialogue, message.chat.id, &user_id, session).await?;
                }
                _ => {
                    bot.send_message(message.chat.id, render::QUIZ_FINISHED).await?;
                }
            }
        }
        Action::Reset(confirmed) => {
            bot.answer_callback_query(q.id.clone()).await?;
            let _ = bot.edit_message_reply_markup(message.chat.id, message.id).await;
            if !confirmed {
                bot.send_message(message.chat.id, render::RESET_CANCELLED).await?;
                return Ok(());
            }
            let text = match app.store.reset_user(&user_id) {
                Ok(()) => render::RESET_DONE,
                Err(err) => {
                    warn!("Could not reset statistics of user {}: {}", user_id, err);
                    render::STATS_UNAVAILABLE
                }
            };
            dialogue.update(State::Idle).await?;
            bot.send_message(message.chat.id, text).await?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn start_quiz(
    bot: &Bot,
    app: &App,
    dialogue: &QuizDialogue,
    q: &CallbackQuery,
    chat_id: ChatId,
    user_id: &str,
    topic_index: usize,
    subtopic_index: usize,
) -> HandlerResult {
    let selected = app.catalog.topics().get(topic_index).and_then(|topic| {
        app.catalog
            .subtopics(topic)
            .get(subtopic_index)
            .map(|subtopic| (topic.to_string(), subtopic.to_string()))
    });
    let (topic, subtopic) = match selected {
        Some(pair) => pair,
        None => return alert(bot, q, render::UNKNOWN_TOPIC).await,
    };

    let statuses = app.statuses(user_id);
    let candidates = app.catalog.subtopic_ids(&topic, &subtopic);
    let chosen = choose_questions(candidates, &statuses, app.quiz_limit, &mut rand::thread_rng());
    let queue = match chosen {
        Ok(queue) => queue,
        Err(quizbot::Error::NoQuestionsAvailable) => {
            return alert(bot, q, render::NO_QUESTIONS).await;
        }
        Err(err) => return Err(err.into()),
    };

    bot.answer_callback_query(q.id.clone()).await?;
    info!(
        "User {} started {} / {} with {} questions",
        user_id,
        topic,
        subtopic,
        queue.len()
    );
    let session = Session::new(topic, subtopic, queue);
    send_next(bot, app, dialogue, chat_id, user_id, session).await
}

/// Sends the next question of the session, or closes the session when the queue
/// is used up. Questions missing from the catalog are skipped.
async fn send_next(
    bot: &Bot,
    app: &App,
    dialogue: &QuizDialogue,
    chat_id: ChatId,
    user_id: &str,
    mut session: Session,
) -> HandlerResult {
    loop {
        let question_id = match session.next_question() {
            Some(id) => id,
            None => {
                bot.send_message(chat_id, render::QUIZ_FINISHED).await?;
                dialogue.update(State::Idle).await?;
                return Ok(());
            }
        };
        let question = match app.catalog.get(&question_id) {
            Some(question) => question,
            None => {
                warn!("Skipping question {}: not in the question bank", question_id);
                continue;
            }
        };

        let previous = app.last_permutation(user_id, &question.id);
        let shown = match present(question, previous.as_ref(), &mut rand::thread_rng()) {
            Some(shown) => shown,
            None => {
                warn!("Skipping question {}: it has no options", question.id);
                continue;
            }
        };

        let (text, keyboard) = render::question_message(
            session.position(),
            session.len(),
            &question.id,
            &question.prompt,
            &shown,
        );
        let sent = bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .await?;

        // The permutation is stored before the answer buttons exist.
        let record = ShownRecord {
            user_id: user_id.to_string(),
            question_id: question.id.clone(),
            message_id: sent.id.0,
            permutation: shown.permutation.clone(),
            displayed_correct: shown.displayed_correct,
        };
        if let Err(err) = app.store.record_shown(&record) {
            warn!(
                "Could not record shown permutation for user {} question {}: {}",
                user_id, question.id, err
            );
        }

        session.current = Some(Shown {
            question_id: question.id.clone(),
            message_id: sent.id.0,
            permutation: shown.permutation,
            displayed_correct: shown.displayed_correct,
        });
        dialogue.update(State::Quiz(session)).await?;

        bot.edit_message_reply_markup(chat_id, sent.id)
            .reply_markup(keyboard)
            .await?;
        return Ok(());
    }
}

#[allow(clippy::too_many_arguments)]
async fn receive_answer(
    bot: &Bot,
    app: &App,
    dialogue: &QuizDialogue,
    q: &CallbackQuery,
    message: &Message,
    user_id: &str,
    question_id: &str,
    letter: Letter,
) -> HandlerResult {
    let session = match dialogue.get().await {
        Ok(Some(State::Quiz(session))) => Some(session),
        Ok(_) => None,
        Err(err) => {
            warn!("Could not read the dialogue of chat {}: {}", message.chat.id.0, err);
            None
        }
    };

    let judgement = match judge(
        app.store.as_ref(),
        &app.catalog,
        user_id,
        question_id,
        message.id.0,
        letter,
        session.as_ref(),
    ) {
        Ok(judgement) => judgement,
        Err(quizbot::Error::QuestionNotFound(id)) => {
            warn!("Answer for unknown question {} from user {}", id, user_id);
            return alert(bot, q, render::QUESTION_NOT_FOUND).await;
        }
        Err(err) => return Err(err.into()),
    };
    bot.answer_callback_query(q.id.clone()).await?;

    let question = app.catalog.require(question_id)?;
    let event = AnswerEvent::for_question(user_id, question, letter, judgement.correct);
    if let Err(err) = app.store.record_answer(&event) {
        warn!("Could not record answer of user {}: {}", user_id, err);
    }
    debug!(
        "User {} answered {} on question {}: {:?}",
        user_id, letter, question.id, judgement
    );

    let _ = bot.edit_message_reply_markup(message.chat.id, message.id).await;

    let (text, keyboard) = render::verdict_message(&judgement, question.explanation.as_deref());
    bot.send_message(message.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}
