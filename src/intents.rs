//! Intent detection.
//!
//! The set of intents is closed. Each [`Intent`] carries its default trigger
//! phrases and the way its answer is produced; [`IntentDetectors`] holds the
//! normalized triggers and the collaborators the answers need.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::ServiceError;
use crate::preprocess::TextNormalizer;
use crate::services::{TriviaProvider, WeatherProvider};

pub const GREETING: &str = "Привет!";
pub const FAREWELL: &str = "Пока!";
pub const PRODUCT_PROMPT: &str =
    "Какое пиво ты ищешь? Опиши его: стиль, вкус, крепость, страну...";
pub const WEATHER_FALLBACK: &str = "Не получилось узнать погоду, попробуй позже.";
pub const TRIVIA_FALLBACK: &str = "Факты про кошек кончились :(";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Greeting,
    Farewell,
    Weather,
    Trivia,
    Product,
}

impl Intent {
    /// All intents in response priority order.
    pub const ALL: [Intent; 5] = [
        Intent::Greeting,
        Intent::Farewell,
        Intent::Weather,
        Intent::Trivia,
        Intent::Product,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Farewell => "farewell",
            Intent::Weather => "weather",
            Intent::Trivia => "trivia",
            Intent::Product => "product",
        }
    }

    pub fn from_name(name: &str) -> Option<Intent> {
        Intent::ALL.into_iter().find(|intent| intent.name() == name)
    }

    pub fn default_triggers(&self) -> &'static [&'static str] {
        match self {
            Intent::Greeting => &[
                "привет",
                "здарова",
                "здравствуй",
                "добрый вечер",
                "добрый день",
                "доброе утро",
            ],
            Intent::Farewell => &["пока", "до встречи", "до свидания", "досвидания", "прощай"],
            Intent::Weather => &["погода", "прогноз"],
            Intent::Trivia => &["факт", "кошка", "котик", "котэ"],
            Intent::Product => &["пиво", "пивко", "пивас"],
        }
    }
}

/// Outcome of testing one intent against a message.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub triggered: bool,
    pub response: Option<String>,
}

/// One word of a trigger phrase, in lemmatized form.
#[derive(Debug, Clone, PartialEq)]
enum Pattern {
    // lemmatization cut an ending off; only a token with the same lemma matches
    Token(String),
    // the word is its own lemma; it may occur inside a longer token
    Within(String),
}

impl Pattern {
    fn new(word: &str, normalizer: &TextNormalizer) -> Option<Self> {
        let lemma = normalizer.lemma(word);
        if lemma.is_empty() {
            None
        } else if lemma.chars().count() < word.chars().count() {
            Some(Pattern::Token(lemma))
        } else {
            Some(Pattern::Within(lemma))
        }
    }

    fn matches(&self, token: &str) -> bool {
        match self {
            Pattern::Token(lemma) => token == lemma.as_str(),
            Pattern::Within(lemma) => token.contains(lemma.as_str()),
        }
    }
}

struct Detector {
    intent: Intent,
    // one entry per phrase, one pattern per word
    triggers: Vec<Vec<Pattern>>,
}

impl Detector {
    fn new<S: AsRef<str>>(intent: Intent, phrases: &[S], normalizer: &TextNormalizer) -> Self {
        let triggers = phrases
            .iter()
            .map(|phrase| {
                normalizer
                    .words(phrase.as_ref())
                    .iter()
                    .filter_map(|word| Pattern::new(word, normalizer))
                    .collect::<Vec<_>>()
            })
            .filter(|patterns| !patterns.is_empty())
            .collect();
        Self { intent, triggers }
    }

    /// A phrase matches a run of consecutive message tokens, word by word.
    fn matches(&self, tokens: &[String]) -> bool {
        self.triggers.iter().any(|patterns| {
            tokens.windows(patterns.len()).any(|run| {
                run.iter()
                    .zip(patterns)
                    .all(|(token, pattern)| pattern.matches(token))
            })
        })
    }
}

/// The fixed set of detectors plus what their responses depend on.
pub struct IntentDetectors {
    normalizer: TextNormalizer,
    detectors: Vec<Detector>,
    weather: Arc<dyn WeatherProvider>,
    trivia: Arc<dyn TriviaProvider>,
    timeout: Duration,
    forecast_days: usize,
}

impl IntentDetectors {
    pub fn new(
        normalizer: TextNormalizer,
        weather: Arc<dyn WeatherProvider>,
        trivia: Arc<dyn TriviaProvider>,
    ) -> Self {
        let detectors = Intent::ALL
            .iter()
            .map(|&intent| Detector::new(intent, intent.default_triggers(), &normalizer))
            .collect();
        Self {
            normalizer,
            detectors,
            weather,
            trivia,
            timeout: Duration::from_secs(5),
            forecast_days: 3,
        }
    }

    /// Replaces the trigger phrases of the named intents. Unknown names are ignored.
    pub fn with_triggers(mut self, overrides: &HashMap<String, Vec<String>>) -> Self {
        for (name, phrases) in overrides {
            match Intent::from_name(name) {
                Some(intent) => {
                    let detector = Detector::new(intent, phrases.as_slice(), &self.normalizer);
                    if let Some(slot) = self.detectors.iter_mut().find(|d| d.intent == intent) {
                        *slot = detector;
                    }
                }
                None => log::warn!("Ignoring triggers for unknown intent '{}'", name),
            }
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_forecast_days(mut self, days: usize) -> Self {
        self.forecast_days = days;
        self
    }

    /// Intents whose triggers occur in the message, in priority order.
    pub fn triggered(&self, message: &str) -> Vec<Intent> {
        let tokens = self.normalizer.normalize(message);
        let found: Vec<Intent> = self
            .detectors
            .iter()
            .filter(|d| d.matches(&tokens))
            .map(|d| d.intent)
            .collect();
        log::debug!("{:?} triggered {:?}", tokens, found);
        found
    }

    /// Tests a single intent and, when it fires, produces its response.
    pub async fn detect(&self, intent: Intent, message: &str) -> Detection {
        let tokens = self.normalizer.normalize(message);
        let triggered = self
            .detectors
            .iter()
            .any(|d| d.intent == intent && d.matches(&tokens));
        let response = if triggered {
            Some(self.respond(intent, message).await)
        } else {
            None
        };
        Detection {
            triggered,
            response,
        }
    }

    /// Response text for `intent`. Collaborator failures become fixed fallbacks.
    pub async fn respond(&self, intent: Intent, message: &str) -> String {
        match intent {
            Intent::Greeting => GREETING.to_string(),
            Intent::Farewell => FAREWELL.to_string(),
            Intent::Product => PRODUCT_PROMPT.to_string(),
            Intent::Weather => {
                let forecast = self.weather.forecast(message, self.forecast_days);
                self.with_fallback(intent, forecast, WEATHER_FALLBACK).await
            }
            Intent::Trivia => {
                let fact = self.trivia.fact();
                self.with_fallback(intent, fact, TRIVIA_FALLBACK).await
            }
        }
    }

    async fn with_fallback<F>(&self, intent: Intent, call: F, fallback: &str) -> String
    where
        F: Future<Output = Result<String, ServiceError>>,
    {
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(self.timeout)),
        };
        match outcome {
            Ok(text) => text,
            Err(e) => {
                log::warn!("{} service unavailable: {}", intent.name(), e);
                fallback.to_string()
            }
        }
    }
}
