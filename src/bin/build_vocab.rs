//! Derives the vocabulary file from the catalog source.
//!
//! Usage: `build-vocab [CONFIG]`, where `CONFIG` names the settings file (default `Config`).
//! Writes to `data.vocabulary_file` the values of `vocabulary.attributes` that occur in
//! at least `vocabulary.min_count` catalog records.

use anyhow::{bail, Context, Result};

use pivo_bot::model::{load_records, Vocabulary};
use pivo_bot::settings::Settings;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = std::env::args().nth(1).unwrap_or_else(|| "Config".to_string());
    let settings = Settings::load(&config)?;
    let attributes = &settings.vocabulary.attributes;
    if attributes.is_empty() {
        bail!("vocabulary.attributes is empty in '{}'", config);
    }

    let records = load_records(&settings.data.catalog_file)?;
    log::info!(
        "Read {} records from {}",
        records.len(),
        settings.data.catalog_file.display()
    );
    let vocabulary = Vocabulary::derive(records.values(), attributes, settings.vocabulary.min_count)?;
    for (attribute, values) in vocabulary.attributes() {
        log::info!("{}: {} values", attribute, values.len());
    }

    let output = &settings.data.vocabulary_file;
    std::fs::write(output, vocabulary.to_json_pretty()?)
        .with_context(|| format!("writing {}", output.display()))?;
    log::info!("Vocabulary with {} dimensions written to {}", vocabulary.dimension(), output.display());
    Ok(())
}
