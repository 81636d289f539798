use rayon::prelude::*;
use std::time::Instant;

use crate::config::{DistanceMethod, PairingConfig};
use crate::core::forest::UnsupervisedForest;
use crate::core::pca::{DimensionalityReducer, Pca};
use crate::error::Result;
use crate::models::{AttributeTable, DistanceMatrix};

/// A strategy producing receiver x donor attribute dissimilarities
///
/// Implementations must never need donor-donor or receiver-receiver entries
/// in their output; the returned matrix has receiver rows and donor columns.
pub trait AttributeDistance {
    fn method(&self) -> DistanceMethod;

    fn compute(&self, table: &AttributeTable) -> Result<DistanceMatrix>;
}

/// Weighted, range-normalised L1 distance over principal component scores
#[derive(Debug, Clone, Default)]
pub struct GowerDistance<R = Pca> {
    reducer: R,
}

impl<R: DimensionalityReducer> GowerDistance<R> {
    pub fn new(reducer: R) -> Self {
        Self { reducer }
    }
}

impl<R: DimensionalityReducer> AttributeDistance for GowerDistance<R> {
    fn method(&self) -> DistanceMethod {
        DistanceMethod::Gower
    }

    fn compute(&self, table: &AttributeTable) -> Result<DistanceMatrix> {
        let projection = self.reducer.project(&table.value_rows())?;
        let n_donors = table.donors.len();
        let (donor_scores, receiver_scores) = projection.scores.split_at(n_donors);
        let ranges = component_ranges(&projection.scores, projection.n_components());

        // One column per donor against every receiver
        let columns: Vec<Vec<f64>> = donor_scores
            .par_iter()
            .map(|donor| {
                receiver_scores
                    .iter()
                    .map(|receiver| gower_distance(donor, receiver, &ranges, &projection.weights))
                    .collect()
            })
            .collect();

        DistanceMatrix::from_columns(table.receiver_ids(), table.donor_ids(), columns)
    }
}

/// Max minus min of each component over all rows
pub fn component_ranges(scores: &[Vec<f64>], n_components: usize) -> Vec<f64> {
    (0..n_components)
        .map(|c| {
            let (lo, hi) = scores.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s[c]), hi.max(s[c]))
            });
            if hi >= lo { hi - lo } else { 0.0 }
        })
        .collect()
}

/// `sum_c |a_c - b_c| / range_c * weight_c`, skipping zero-range components
#[inline]
pub fn gower_distance(a: &[f64], b: &[f64], ranges: &[f64], weights: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .zip(ranges.iter().zip(weights))
        .filter(|(_, (range, _))| **range > 0.0)
        .map(|((x, y), (range, weight))| (x - y).abs() / range * weight)
        .sum()
}

/// Leaf-sharing dissimilarity from an unsupervised random forest
///
/// Works on the raw attributes; no projection is applied.
#[derive(Debug, Clone)]
pub struct ForestDistance {
    forest: UnsupervisedForest,
}

impl ForestDistance {
    pub fn new(forest: UnsupervisedForest) -> Self {
        Self { forest }
    }
}

impl AttributeDistance for ForestDistance {
    fn method(&self) -> DistanceMethod {
        DistanceMethod::Urf
    }

    fn compute(&self, table: &AttributeTable) -> Result<DistanceMatrix> {
        let full = self.forest.distance(&table.value_rows())?;
        let n_donors = table.donors.len();

        // Receiver rows x donor columns of the full pairwise matrix
        let columns: Vec<Vec<f64>> = (0..n_donors)
            .map(|d| full[n_donors..].iter().map(|row| row[d]).collect())
            .collect();

        DistanceMatrix::from_columns(table.receiver_ids(), table.donor_ids(), columns)
    }
}

/// Computes one sub-round's attribute distance matrix with the configured strategy
pub struct AttributeDistanceEngine {
    strategy: Box<dyn AttributeDistance>,
}

impl AttributeDistanceEngine {
    pub fn new(strategy: Box<dyn AttributeDistance>) -> Self {
        Self { strategy }
    }

    pub fn from_config(config: &PairingConfig) -> Self {
        let strategy: Box<dyn AttributeDistance> = match config.method {
            DistanceMethod::Gower => Box::new(GowerDistance::new(Pca::default())),
            DistanceMethod::Urf => Box::new(ForestDistance::new(
                UnsupervisedForest::new(config.search.n_trees, config.search.max_depth)
                    .with_seed(config.search.seed)
                    .with_jobs(config.search.n_jobs),
            )),
        };
        Self::new(strategy)
    }

    pub fn method(&self) -> DistanceMethod {
        self.strategy.method()
    }

    /// Receiver x donor matrix for `table`; empty if either side is empty
    pub fn compute(&self, table: &AttributeTable) -> Result<DistanceMatrix> {
        if table.donors.is_empty() || table.receivers.is_empty() {
            return DistanceMatrix::new(table.receiver_ids(), table.donor_ids(), Vec::new());
        }

        let started = Instant::now();
        let matrix = self.strategy.compute(table)?;
        let (receivers, donors) = matrix.shape();
        tracing::info!(
            method = %self.method(),
            receivers,
            donors,
            attributes = table.attributes.len(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "attribute distance computed"
        );
        Ok(matrix)
    }
}
