//! Feature space and catalog.
//!
//! The [`Vocabulary`] fixes the order of every vector dimension. Catalog items are
//! encoded once against it at startup and never change afterwards.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use indexmap::IndexMap;
use ndarray::Array1;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Items with at most this many known features are too under-specified to recommend.
pub const INFORMATION_THRESHOLD: f32 = 15.0;

/// Ordered attribute dimensions and their permitted values.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    attributes: IndexMap<String, Vec<String>>,
    // attribute -> lower-case value -> dimension
    index: HashMap<String, HashMap<String, usize>>,
    dimension: usize,
}

impl Vocabulary {
    pub fn new(attributes: IndexMap<String, Vec<String>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(attributes.len());
        let mut dimension = 0;
        for (attribute, values) in &attributes {
            let mut positions = HashMap::with_capacity(values.len());
            for value in values {
                if positions.insert(value.to_lowercase(), dimension).is_some() {
                    return Err(Error::DuplicateValue {
                        attribute: attribute.clone(),
                        value: value.clone(),
                    });
                }
                dimension += 1;
            }
            index.insert(attribute.clone(), positions);
        }
        if dimension == 0 {
            return Err(Error::EmptyVocabulary);
        }
        Ok(Self {
            attributes,
            index,
            dimension,
        })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let attributes = read_json(path.as_ref())?;
        Self::new(attributes)
    }

    /// Total number of dimensions, the sum of per-attribute value counts.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.attributes
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Value labels in dimension order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.attributes.values().flatten().map(String::as_str)
    }

    pub fn dimension_of(&self, attribute: &str, value: &str) -> Option<usize> {
        self.index
            .get(attribute)?
            .get(&value.to_lowercase())
            .copied()
    }

    /// Derives a vocabulary from raw catalog records.
    ///
    /// Keeps, for each requested attribute, the values seen in at least `min_count`
    /// records, most frequent first and alphabetical among equals.
    pub fn derive<'a, I>(records: I, attributes: &[String], min_count: usize) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut counts: Vec<HashMap<String, usize>> = vec![HashMap::new(); attributes.len()];
        for record in records {
            for (attribute, counter) in attributes.iter().zip(counts.iter_mut()) {
                let seen: HashSet<String> = record
                    .get(attribute)
                    .map(attribute_values)
                    .unwrap_or_default()
                    .into_iter()
                    .collect();
                for value in seen {
                    *counter.entry(value).or_insert(0) += 1;
                }
            }
        }

        let mut derived = IndexMap::with_capacity(attributes.len());
        for (attribute, counter) in attributes.iter().zip(counts) {
            let mut values: Vec<(String, usize)> = counter
                .into_iter()
                .filter(|(_, count)| *count >= min_count.max(1))
                .collect();
            values.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            derived.insert(
                attribute.clone(),
                values.into_iter().map(|(value, _)| value).collect(),
            );
        }
        Self::new(derived)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.attributes)
    }
}

/// A recommendable item with its indicator vector over the vocabulary.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub image: String,
    #[serde(skip)]
    pub features: Array1<f32>,
}

/// Items that passed the information threshold, in source order.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    dimension: usize,
}

impl Catalog {
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&CatalogItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Turns raw attribute records into a [`Catalog`].
pub struct CatalogBuilder<'a> {
    vocabulary: &'a Vocabulary,
    threshold: f32,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self {
            vocabulary,
            threshold: INFORMATION_THRESHOLD,
        }
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Indicator vector of `record`. Values the vocabulary does not know are ignored.
    pub fn featurize(&self, record: &Value) -> Array1<f32> {
        let mut features = Array1::zeros(self.vocabulary.dimension());
        for (attribute, _) in self.vocabulary.attributes() {
            let Some(values) = record.get(attribute) else {
                continue;
            };
            for value in attribute_values(values) {
                if let Some(dim) = self.vocabulary.dimension_of(attribute, &value) {
                    features[dim] = 1.0;
                }
            }
        }
        features
    }

    pub fn build<I>(&self, records: I) -> Result<Catalog>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut items = Vec::new();
        let mut skipped = 0usize;
        let mut sparse = 0usize;

        for (id, record) in records {
            let Some(image) = record.get("img").and_then(Value::as_str) else {
                log::warn!("Skipping catalog record '{}': no image reference", id);
                skipped += 1;
                continue;
            };
            let features = self.featurize(&record);
            if features.sum() <= self.threshold {
                sparse += 1;
                continue;
            }
            let name = record
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| id.replace('-', " "));
            items.push(CatalogItem {
                image: image.to_string(),
                id,
                name,
                features,
            });
        }

        log::info!(
            "Catalog built: {} items kept, {} too sparse, {} skipped",
            items.len(),
            sparse,
            skipped
        );
        if items.is_empty() {
            return Err(Error::EmptyCatalog {
                threshold: self.threshold,
            });
        }
        Ok(Catalog {
            items,
            dimension: self.vocabulary.dimension(),
        })
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Catalog> {
        let records = load_records(path)?;
        self.build(records)
    }
}

/// Reads the catalog source: a JSON object keyed by item identifier, order preserved.
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<IndexMap<String, Value>> {
    let path = path.as_ref();
    let content = read_file(path)?;
    let source: Value = parse_json(path, &content)?;
    if !source.is_object() {
        return Err(Error::MalformedCatalog(format!(
            "expected an object keyed by item id in '{}', found {}",
            path.display(),
            json_kind(&source)
        )));
    }
    // Parsed again into an IndexMap: serde_json's own map does not keep key order.
    parse_json(path, &content)
}

/// Lower-cased values of one record attribute: a list, a lone string or nothing.
fn attribute_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.to_lowercase()],
        Value::Array(values) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_lowercase)
            .collect(),
        _ => Vec::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Reads and parses a JSON file, naming the path in any error.
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_file(path)?;
    parse_json(path, &content)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::{record, records, vocabulary};
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn dimensions_follow_declaration_order() {
        let vocabulary = vocabulary();
        assert_eq!(vocabulary.dimension(), 24);
        assert_eq!(vocabulary.dimension_of("taste", "t0"), Some(0));
        assert_eq!(vocabulary.dimension_of("style", "lager"), Some(20));
        assert_eq!(vocabulary.dimension_of("style", "PORTER"), Some(23));
        assert_eq!(vocabulary.dimension_of("style", "bock"), None);
        assert_eq!(vocabulary.labels().nth(21), Some("stout"));
    }

    #[test]
    fn empty_vocabulary_is_rejected() {
        let mut attributes = IndexMap::new();
        attributes.insert("style".to_string(), Vec::new());
        assert!(matches!(
            Vocabulary::new(attributes),
            Err(Error::EmptyVocabulary)
        ));
    }

    #[test]
    fn repeated_value_is_rejected() {
        let mut attributes = IndexMap::new();
        attributes.insert("style".to_string(), vec!["Lager".into(), "lager".into()]);
        assert!(matches!(
            Vocabulary::new(attributes),
            Err(Error::DuplicateValue { .. })
        ));
    }

    #[test]
    fn vocabulary_file_keeps_key_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"style": ["стаут", "лагер"], "country": ["бельгия"]}}"#).unwrap();

        let vocabulary = Vocabulary::load_from_file(file.path()).unwrap();
        let names: Vec<&str> = vocabulary.attributes().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["style", "country"]);
        assert_eq!(vocabulary.dimension_of("country", "Бельгия"), Some(2));
    }

    #[test]
    fn every_item_has_vocabulary_dimension() {
        let vocabulary = vocabulary();
        let catalog = CatalogBuilder::new(&vocabulary).build(records()).unwrap();
        assert_eq!(catalog.len(), 4);
        for item in catalog.items() {
            assert_eq!(item.features.len(), vocabulary.dimension());
        }
    }

    #[test]
    fn unknown_values_are_ignored() {
        let vocabulary = vocabulary();
        let builder = CatalogBuilder::new(&vocabulary);
        let features = builder.featurize(&json!({
            "taste": ["t1", "smoky"],
            "style": "Stout",
            "country": ["belgium"],
        }));
        assert_eq!(features.sum(), 2.0);
        assert_eq!(features[1], 1.0);
        assert_eq!(features[21], 1.0);
    }

    #[test]
    fn sparse_records_are_dropped() {
        let vocabulary = vocabulary();
        let mut input = records();
        // exactly 15 known features is not enough
        input.push(("Sparse".to_string(), record(15, &[])));
        input.push(("Borderline".to_string(), record(15, &["ale"])));

        let catalog = CatalogBuilder::new(&vocabulary).build(input).unwrap();
        let ids: Vec<&str> = catalog.items().iter().map(|i| i.id.as_str()).collect();
        assert!(!ids.contains(&"Sparse"));
        assert!(ids.contains(&"Borderline"));
    }

    #[test]
    fn records_without_image_are_skipped() {
        let vocabulary = vocabulary();
        let mut input = records();
        input.push((
            "No-Image".to_string(),
            json!({ "taste": ["t0", "t1"], "style": ["ale"] }),
        ));
        input.push(("Not-An-Object".to_string(), json!(["t0"])));

        let catalog = CatalogBuilder::new(&vocabulary).build(input).unwrap();
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn display_name_comes_from_identifier() {
        let vocabulary = vocabulary();
        let mut named = record(16, &["ale"]);
        named["name"] = json!("Fuller's London Pride");
        let catalog = CatalogBuilder::new(&vocabulary)
            .build(vec![
                ("Zhiguli-Lager".to_string(), record(16, &["lager"])),
                ("london-pride".to_string(), named),
            ])
            .unwrap();
        assert_eq!(catalog.items()[0].name, "Zhiguli Lager");
        assert_eq!(catalog.items()[1].name, "Fuller's London Pride");
    }

    #[test]
    fn rebuilding_gives_the_same_catalog() {
        let vocabulary = vocabulary();
        let builder = CatalogBuilder::new(&vocabulary);
        let first = builder.build(records()).unwrap();
        let second = builder.build(records()).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.items().iter().zip(second.items()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.features, b.features);
        }
    }

    #[test]
    fn all_sparse_catalog_is_fatal() {
        let vocabulary = vocabulary();
        let result = CatalogBuilder::new(&vocabulary).build(vec![("Sparse".to_string(), record(3, &["ale"]))]);
        assert!(matches!(result, Err(Error::EmptyCatalog { .. })));
    }

    #[test]
    fn catalog_source_must_be_an_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"img": "a.png"}}]"#).unwrap();
        assert!(matches!(
            load_records(file.path()),
            Err(Error::MalformedCatalog(_))
        ));
    }

    #[test]
    fn derived_vocabulary_orders_by_frequency() {
        let records = vec![
            json!({ "style": ["Stout", "Porter"], "country": "Ireland" }),
            json!({ "style": ["stout"], "country": null }),
            json!({ "style": ["Ale", "ale"] }),
            json!({ "style": ["porter"] }),
        ];
        let attributes = vec!["style".to_string(), "country".to_string()];

        let vocabulary = Vocabulary::derive(&records, &attributes, 2).unwrap();
        let styles: Vec<&str> = vocabulary.labels().collect();
        assert_eq!(styles, vec!["porter", "stout"]);

        let vocabulary = Vocabulary::derive(&records, &attributes, 1).unwrap();
        assert_eq!(vocabulary.dimension(), 4);
        assert_eq!(vocabulary.dimension_of("country", "ireland"), Some(3));
    }
}
