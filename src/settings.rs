//! Typed view of `Config.toml`, overridable with `PIVO__SECTION__KEY` variables.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::model::INFORMATION_THRESHOLD;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub data: DataSettings,
    pub server: ServerSettings,
    #[serde(default)]
    pub logic: LogicSettings,
    #[serde(default)]
    pub services: ServiceSettings,
    #[serde(default)]
    pub vocabulary: VocabularySettings,
    /// Trigger phrases per intent name, replacing the built-in ones.
    #[serde(default)]
    pub triggers: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataSettings {
    pub vocabulary_file: PathBuf,
    pub catalog_file: PathBuf,
    pub image_dir: Option<PathBuf>,
    pub sentiment_lexicon: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogicSettings {
    pub suggestions: usize,
    pub information_threshold: f32,
    pub forecast_days: usize,
    pub sentiment_gate: bool,
    pub session_idle_secs: u64,
}

impl Default for LogicSettings {
    fn default() -> Self {
        Self {
            suggestions: 3,
            information_threshold: INFORMATION_THRESHOLD,
            forecast_days: 3,
            sentiment_gate: false,
            session_idle_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub timeout_secs: u64,
    pub weather_url: String,
    pub weather_token: String,
    pub default_city: String,
    pub trivia_url: String,
    pub translate_url: String,
    pub language: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            weather_url: "https://api.openweathermap.org".to_string(),
            weather_token: String::new(),
            default_city: "Москва".to_string(),
            trivia_url: "https://catfact.ninja".to_string(),
            translate_url: "https://translate.googleapis.com".to_string(),
            language: "ru".to_string(),
        }
    }
}

/// Inputs of the offline `build-vocab` tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VocabularySettings {
    pub attributes: Vec<String>,
    pub min_count: usize,
}

impl Default for VocabularySettings {
    fn default() -> Self {
        Self {
            attributes: Vec::new(),
            min_count: 2,
        }
    }
}

impl Settings {
    /// Loads `<name>.toml` (or any format `config` recognizes) plus environment overrides.
    pub fn load(name: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(name))
            .add_source(
                config::Environment::with_prefix("PIVO")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
