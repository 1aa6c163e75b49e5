use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::{Sentiment, SentimentClassifier};
use crate::error::ServiceError;
use crate::model::read_json;
use crate::preprocess::TextNormalizer;

#[derive(Deserialize)]
struct LexiconData {
    emotions: HashMap<String, Vec<String>>,
}

/// Word-list classifier: counts positive and negative lemmas in the message.
pub struct LexiconSentiment {
    normalizer: TextNormalizer,
    positive: HashSet<String>,
    negative: HashSet<String>,
}

impl LexiconSentiment {
    pub fn new<P, N>(normalizer: TextNormalizer, positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        let lemmas = |words: Vec<String>| -> HashSet<String> {
            words
                .iter()
                .flat_map(|word| normalizer.normalize(word))
                .collect()
        };
        let positive = lemmas(positive.into_iter().map(|w| w.as_ref().to_string()).collect());
        let negative = lemmas(negative.into_iter().map(|w| w.as_ref().to_string()).collect());
        Self {
            normalizer,
            positive,
            negative,
        }
    }

    /// Loads `{"emotions": {"positive": [...], "negative": [...]}}`.
    pub fn load_from_file<P: AsRef<Path>>(path: P, normalizer: TextNormalizer) -> crate::error::Result<Self> {
        let mut data: LexiconData = read_json(path.as_ref())?;
        let positive = data.emotions.remove("positive").unwrap_or_default();
        let negative = data.emotions.remove("negative").unwrap_or_default();
        log::info!(
            "Sentiment lexicon loaded: {} positive, {} negative words",
            positive.len(),
            negative.len()
        );
        Ok(Self::new(normalizer, positive, negative))
    }

    fn label(&self, text: &str) -> Sentiment {
        let (mut positive, mut negative) = (0usize, 0usize);
        for token in self.normalizer.normalize(text) {
            if self.negative.contains(&token) {
                negative += 1;
            } else if self.positive.contains(&token) {
                positive += 1;
            }
        }
        match negative.cmp(&positive) {
            std::cmp::Ordering::Greater => Sentiment::Negative,
            std::cmp::Ordering::Less => Sentiment::Positive,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}

#[async_trait]
impl SentimentClassifier for LexiconSentiment {
    async fn classify(&self, text: &str) -> Result<Sentiment, ServiceError> {
        Ok(self.label(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::SnowballLemmatizer;
    use std::io::Write;
    use std::sync::Arc;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::new(Arc::new(SnowballLemmatizer::russian()))
    }

    #[tokio::test]
    async fn counts_lexicon_hits() {
        let classifier = LexiconSentiment::new(normalizer(), ["отличный", "спасибо"], ["дурак", "тупой"]);
        assert_eq!(classifier.classify("ты тупой дурак").await.unwrap(), Sentiment::Negative);
        assert_eq!(classifier.classify("спасибо, отличный бот").await.unwrap(), Sentiment::Positive);
        assert_eq!(classifier.classify("хочу пиво").await.unwrap(), Sentiment::Neutral);
        assert_eq!(classifier.classify("").await.unwrap(), Sentiment::Neutral);
    }

    #[tokio::test]
    async fn inflected_forms_match() {
        let classifier = LexiconSentiment::new(normalizer(), Vec::<String>::new(), ["дурак"]);
        assert_eq!(classifier.classify("какие дураки").await.unwrap(), Sentiment::Negative);
    }

    #[test]
    fn loads_lexicon_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"emotions": {{"negative": ["дурак"], "positive": ["спасибо"], "joy": ["ура"]}}}}"#
        )
        .unwrap();
        let classifier = LexiconSentiment::load_from_file(file.path(), normalizer()).unwrap();
        assert_eq!(classifier.label("дурак"), Sentiment::Negative);
        assert_eq!(classifier.label("ура"), Sentiment::Neutral);
    }

    #[test]
    fn broken_lexicon_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"emotions\": [").unwrap();
        let err = LexiconSentiment::load_from_file(file.path(), normalizer()).err().unwrap();
        assert!(matches!(err, crate::Error::Json { ref path, .. } if path == file.path()));
    }
}
