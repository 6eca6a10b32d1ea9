use thiserror::Error;

#[derive(Error, Debug)]
pub enum CIMinutesError {
    #[error("API request to '{path}' failed: {status} - {body}")]
    Api {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CIMinutesError>;
