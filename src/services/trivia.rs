use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{check_status, Translator, TriviaProvider};
use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
struct FactResponse {
    fact: String,
}

/// Cat facts from catfact.ninja, translated into the chat language.
pub struct CatFacts {
    base_url: String,
    language: String,
    http: Client,
    translator: Arc<dyn Translator>,
}

impl CatFacts {
    pub fn new(
        base_url: impl Into<String>,
        language: impl Into<String>,
        http: Client,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            language: language.into(),
            http,
            translator,
        }
    }
}

#[async_trait]
impl TriviaProvider for CatFacts {
    async fn fact(&self) -> Result<String, ServiceError> {
        let url = format!("{}/fact", self.base_url);
        let response = self.http.get(&url).send().await?;
        let FactResponse { fact } = check_status(response).await?.json().await?;

        match self.translator.translate(&fact, &self.language).await {
            Ok(translated) => Ok(translated),
            Err(e) => {
                log::warn!("Translation failed, sending the fact untranslated: {}", e);
                Ok(fact)
            }
        }
    }
}
