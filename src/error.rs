use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("document at {0} is not a JSON object")]
    InvalidDocument(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("invalid value for {key}: {value:?}")]
    InvalidParam { key: String, value: String },

    #[error("AI error: {0}")]
    Llm(String),

    #[error("{0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn invalid_param(key: &str, value: &str) -> Self {
        AppError::InvalidParam {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}
