//! Content-based recommendation: query encoding and nearest-neighbour selection.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use ndarray::{Array1, ArrayView1};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Catalog, Vocabulary};
use crate::preprocess::TextNormalizer;

/// Encodes free text as a soft vector over the vocabulary dimensions.
#[derive(Debug, Clone)]
pub struct QueryEncoder {
    normalizer: TextNormalizer,
    // one lemma set per vocabulary dimension, same order
    lemmas: Vec<HashSet<String>>,
}

impl QueryEncoder {
    pub fn new(vocabulary: &Vocabulary, normalizer: TextNormalizer) -> Self {
        let lemmas = vocabulary
            .labels()
            .map(|label| normalizer.normalize(label).into_iter().collect())
            .collect();
        Self { normalizer, lemmas }
    }

    pub fn dimension(&self) -> usize {
        self.lemmas.len()
    }

    /// Scores each dimension by how many query tokens echo its label lemmas.
    ///
    /// The score is the number of matching (token, lemma) pairs divided by the size of
    /// the lemma set, clipped to `[0, 1]`. A label without lemmas always scores 0.
    pub fn encode(&self, text: &str) -> Array1<f32> {
        let tokens = self.normalizer.normalize(text);
        self.lemmas
            .iter()
            .map(|lemmas| {
                if lemmas.is_empty() {
                    return 0.0;
                }
                let hits = tokens.iter().filter(|t| lemmas.contains(t.as_str())).count();
                (hits as f32 / lemmas.len() as f32).clamp(0.0, 1.0)
            })
            .collect()
    }
}

/// One recommended item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub name: String,
    pub image: String,
    pub distance: f32,
}

/// Finds the catalog items closest to a query.
#[derive(Debug)]
pub struct Matcher {
    catalog: Arc<Catalog>,
    encoder: QueryEncoder,
}

impl Matcher {
    pub const DEFAULT_K: usize = 3;

    pub fn new(catalog: Arc<Catalog>, encoder: QueryEncoder) -> Result<Self> {
        if encoder.dimension() != catalog.dimension() {
            return Err(Error::DimensionMismatch {
                encoder: encoder.dimension(),
                catalog: catalog.dimension(),
            });
        }
        Ok(Self { catalog, encoder })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn encoder(&self) -> &QueryEncoder {
        &self.encoder
    }

    /// Indices and distances of the `k` items nearest to `query`, closest first.
    ///
    /// Equal distances are ordered by catalog position. Asking for more items than
    /// the catalog holds returns the whole catalog. A query of the wrong length
    /// matches nothing.
    pub fn nearest(&self, query: ArrayView1<f32>, k: usize) -> Vec<(usize, f32)> {
        if query.len() != self.catalog.dimension() {
            log::warn!(
                "Query has {} dimensions, catalog has {}",
                query.len(),
                self.catalog.dimension()
            );
            return Vec::new();
        }
        let mut scored: Vec<(usize, f32)> = self
            .catalog
            .items()
            .iter()
            .enumerate()
            .map(|(i, item)| (i, squared_euclidean_distance(&item.features.view(), &query)))
            .collect();

        if k < scored.len() {
            if k > 0 {
                scored.select_nth_unstable_by(k - 1, by_distance);
            }
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_distance);
        scored
    }

    pub fn suggest(&self, text: &str, k: usize) -> Vec<Suggestion> {
        let query = self.encoder.encode(text);
        self.nearest(query.view(), k)
            .into_iter()
            .filter_map(|(i, distance)| {
                self.catalog.get(i).map(|item| Suggestion {
                    name: item.name.clone(),
                    image: item.image.clone(),
                    distance,
                })
            })
            .collect()
    }
}

fn by_distance(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

fn squared_euclidean_distance(a: &ArrayView1<f32>, b: &ArrayView1<f32>) -> f32 {
    (a - b).mapv(|x| x.powi(2)).sum()
}
