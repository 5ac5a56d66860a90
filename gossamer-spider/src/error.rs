use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpiderError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector {0}")]
    Selector(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpiderError>;
