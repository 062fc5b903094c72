use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid state: expected {expected}, found {actual}")]
    InvalidState { expected: &'static str, actual: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Text engine failure: {0}")]
    Engine(String),

    #[error("Query could not be parsed: {0}")]
    QueryParse(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn invalid_state(expected: &'static str, actual: impl ToString) -> Self {
        Self::InvalidState { expected, actual: actual.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
