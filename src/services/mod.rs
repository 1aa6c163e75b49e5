//! External collaborators the assistant talks to.
//!
//! Each one sits behind a small async trait so the router only sees text in and
//! text out. Failures come back as [`ServiceError`]; the caller decides on the
//! fallback message.

mod sentiment;
mod translate;
mod trivia;
mod weather;

pub use sentiment::LexiconSentiment;
pub use translate::GoogleTranslator;
pub use trivia::CatFacts;
pub use weather::OpenWeather;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Sentiment, ServiceError>;
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Forecast for the place mentioned in `location_text`, `horizon` days ahead.
    async fn forecast(&self, location_text: &str, horizon: usize) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait TriviaProvider: Send + Sync {
    async fn fact(&self) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: &str) -> Result<String, ServiceError>;
}

/// Builds the shared HTTP client for the collaborator clients.
pub fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, ServiceError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Turns a non-success status into an error, keeping the body for the log.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Malformed(format!("status {}: {}", status, body)))
}
