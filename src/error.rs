use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Startup and configuration failures. Any of these stops the process before it serves.
#[derive(Debug, Error)]
pub enum Error {
    #[error("vocabulary has no dimensions")]
    EmptyVocabulary,

    #[error("vocabulary attribute '{attribute}' lists '{value}' more than once")]
    DuplicateValue { attribute: String, value: String },

    #[error("no catalog item has more than {threshold} known features")]
    EmptyCatalog { threshold: f32 },

    #[error("catalog source is malformed: {0}")]
    MalformedCatalog(String),

    #[error("query encoder has {encoder} dimensions but the catalog has {catalog}")]
    DimensionMismatch { encoder: usize, catalog: usize },

    #[error("failed to read '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}'")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of an external collaborator (weather, trivia, translation, sentiment).
///
/// Callers never surface these to the user; they substitute a fixed fallback.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("unexpected response: {0}")]
    Malformed(String),
}
