//! Builds the running assistant out of [`Settings`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::conversation::{Conversations, Router};
use crate::intents::IntentDetectors;
use crate::matcher::{Matcher, QueryEncoder};
use crate::model::{CatalogBuilder, Vocabulary};
use crate::preprocess::{SnowballLemmatizer, TextNormalizer};
use crate::services::{
    http_client, CatFacts, GoogleTranslator, LexiconSentiment, OpenWeather, TriviaProvider,
    WeatherProvider,
};
use crate::settings::Settings;

/// Everything the HTTP layer shares between workers.
#[derive(Clone)]
pub struct Components {
    pub conversations: Arc<Conversations>,
    pub matcher: Arc<Matcher>,
}

/// Loads the vocabulary and catalog and wires the collaborators.
///
/// Fails on any configuration error: an unreadable or empty vocabulary, a malformed
/// catalog or one with no informative items, or a missing sentiment lexicon when the
/// gate is enabled.
pub fn init(settings: &Settings) -> anyhow::Result<Components> {
    let normalizer = TextNormalizer::new(Arc::new(SnowballLemmatizer::russian()));

    let vocabulary = Vocabulary::load_from_file(&settings.data.vocabulary_file)
        .context("loading vocabulary")?;
    log::info!("Vocabulary: {} dimensions", vocabulary.dimension());

    let catalog = CatalogBuilder::new(&vocabulary)
        .threshold(settings.logic.information_threshold)
        .load_from_file(&settings.data.catalog_file)
        .context("building catalog")?;
    log::info!("Catalog: {} items", catalog.len());

    let encoder = QueryEncoder::new(&vocabulary, normalizer.clone());
    let matcher = Arc::new(Matcher::new(Arc::new(catalog), encoder)?);

    let timeout = Duration::from_secs(settings.services.timeout_secs);
    let (weather, trivia) = collaborators(settings, timeout)?;
    let detectors = IntentDetectors::new(normalizer.clone(), weather, trivia)
        .with_triggers(&settings.triggers)
        .with_timeout(timeout)
        .with_forecast_days(settings.logic.forecast_days);

    let mut router =
        Router::new(detectors, Arc::clone(&matcher)).with_suggestions(settings.logic.suggestions);
    if settings.logic.sentiment_gate {
        let path = settings
            .data
            .sentiment_lexicon
            .as_ref()
            .context("sentiment_gate is on but data.sentiment_lexicon is not set")?;
        let classifier = LexiconSentiment::load_from_file(path, normalizer)
            .context("loading sentiment lexicon")?;
        router = router.with_sentiment(Arc::new(classifier), timeout);
    }

    Ok(Components {
        conversations: Arc::new(Conversations::new(router)),
        matcher,
    })
}

fn collaborators(
    settings: &Settings,
    timeout: Duration,
) -> anyhow::Result<(Arc<dyn WeatherProvider>, Arc<dyn TriviaProvider>)> {
    let services = &settings.services;
    let http = http_client(timeout).context("building HTTP client")?;

    if services.weather_token.is_empty() {
        log::warn!("services.weather_token is empty; weather requests will fail");
    }
    let weather = OpenWeather::new(
        services.weather_url.as_str(),
        services.weather_token.as_str(),
        services.default_city.as_str(),
        http.clone(),
    );

    let translator = Arc::new(GoogleTranslator::new(services.translate_url.as_str(), http.clone()));
    let trivia = CatFacts::new(
        services.trivia_url.as_str(),
        services.language.as_str(),
        http,
        translator,
    );

    Ok((Arc::new(weather), Arc::new(trivia)))
}
