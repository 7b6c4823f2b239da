use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TutorError {
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Structured output could not be parsed: {raw}")]
    StructuredParse { raw: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TutorError>;
