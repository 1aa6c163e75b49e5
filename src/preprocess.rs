//! Text normalization shared by the intent detectors and the query encoder.
//!
//! Free text goes in, an ordered list of base-form tokens comes out. The
//! linguistic part sits behind [`Lemmatizer`] so the normalizer can be built
//! once at startup and handed to every component that needs it.

use std::sync::Arc;

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};

/// Reduces a single lower-case word to its base form.
pub trait Lemmatizer: Send + Sync {
    fn lemma(&self, word: &str) -> String;
}

/// Snowball stemmer used as a lemmatizer.
pub struct SnowballLemmatizer {
    stemmer: Stemmer,
}

impl SnowballLemmatizer {
    pub fn russian() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::Russian),
        }
    }
}

impl Lemmatizer for SnowballLemmatizer {
    fn lemma(&self, word: &str) -> String {
        self.stemmer.stem(word).into_owned()
    }
}

/// Leaves words untouched.
pub struct IdentityLemmatizer;

impl Lemmatizer for IdentityLemmatizer {
    fn lemma(&self, word: &str) -> String {
        word.to_string()
    }
}

#[derive(Clone)]
pub struct TextNormalizer {
    lemmatizer: Arc<dyn Lemmatizer>,
    word: Regex,
}

impl TextNormalizer {
    pub fn new(lemmatizer: Arc<dyn Lemmatizer>) -> Self {
        Self {
            lemmatizer,
            word: Regex::new(r"[\p{L}\p{N}]+").expect("word pattern is valid"),
        }
    }

    /// Splits `text` into words, dropping punctuation, and lemmatizes each one.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        self.words(text)
            .iter()
            .map(|word| self.lemma(word))
            .filter(|lemma| !lemma.is_empty())
            .collect()
    }

    /// Lower-case surface words of `text`, before lemmatization.
    pub fn words(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase().replace('ё', "е");
        self.word
            .find_iter(&lower)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    pub fn lemma(&self, word: &str) -> String {
        self.lemmatizer.lemma(word)
    }
}

impl std::fmt::Debug for TextNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextNormalizer").finish_non_exhaustive()
    }
}
