pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing column in question bank: {0}")]
    MissingColumn(String),

    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    #[error("No questions available")]
    NoQuestionsAvailable,

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::PersistenceUnavailable(err.to_string())
    }
}
