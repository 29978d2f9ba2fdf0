use reqwest::StatusCode;
use thiserror::Error;

/// Failure retrieving the raw CSV text from a source URL.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("GET {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url} returned non-success status {status}")]
    Status { url: String, status: StatusCode },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Request { url, .. } | FetchError::Status { url, .. } => url,
        }
    }
}

/// The text could not be interpreted as delimited rows.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("CSV text has no header row")]
    Empty,

    #[error("CSV decode error at line {line}: {message}")]
    Malformed { line: u64, message: String },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML deserialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Fetch and parse failures are the ones a user can fix by re-running.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Fetch(_) | PipelineError::Parse(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
