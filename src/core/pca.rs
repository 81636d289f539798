use nalgebra::{DMatrix, SymmetricEigen};

use crate::error::{PairingError, Result};

/// Component scores and per-component importance weights
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// One row per input row, one column per component
    pub scores: Vec<Vec<f64>>,
    /// Weight of each component; sums to 1 when non-empty
    pub weights: Vec<f64>,
}

impl Projection {
    pub fn n_components(&self) -> usize {
        self.weights.len()
    }
}

/// Projects attribute columns onto orthogonal components
pub trait DimensionalityReducer {
    fn project(&self, rows: &[Vec<f64>]) -> Result<Projection>;
}

/// Principal component analysis on standardised columns
///
/// Components are ordered by explained variance. Components whose variance is
/// at most `min_variance_ratio` of the total are dropped, and the weight of a
/// kept component is its share of the kept variance.
#[derive(Debug, Clone, Copy)]
pub struct Pca {
    pub min_variance_ratio: f64,
}

impl Default for Pca {
    fn default() -> Self {
        Self {
            min_variance_ratio: 1e-10,
        }
    }
}

impl DimensionalityReducer for Pca {
    fn project(&self, rows: &[Vec<f64>]) -> Result<Projection> {
        let n = rows.len();
        let p = rows.first().map(|r| r.len()).unwrap_or(0);
        if n == 0 || p == 0 {
            return Err(PairingError::Degenerate(format!(
                "cannot project a {}x{} attribute table",
                n, p
            )));
        }
        if rows.iter().any(|r| r.len() != p || r.iter().any(|v| !v.is_finite())) {
            return Err(PairingError::Degenerate(
                "attribute table is ragged or has non-finite values".to_string(),
            ));
        }

        let z = standardise(rows, p);

        let denom = if n > 1 { (n - 1) as f64 } else { 1.0 };
        let cov = DMatrix::from_fn(p, p, |a, b| {
            z.iter().map(|row| row[a] * row[b]).sum::<f64>() / denom
        });
        let eigen = SymmetricEigen::new(cov);

        let mut order: Vec<usize> = (0..p).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        let total: f64 = eigen.eigenvalues.iter().filter(|v| **v > 0.0).sum();
        if total <= 0.0 {
            return Ok(Projection {
                scores: vec![Vec::new(); n],
                weights: Vec::new(),
            });
        }

        let kept: Vec<usize> = order
            .into_iter()
            .filter(|&k| eigen.eigenvalues[k] > self.min_variance_ratio * total)
            .collect();
        let kept_total: f64 = kept.iter().map(|&k| eigen.eigenvalues[k]).sum();
        let weights = kept
            .iter()
            .map(|&k| eigen.eigenvalues[k] / kept_total)
            .collect();

        let scores = z
            .iter()
            .map(|row| {
                kept.iter()
                    .map(|&k| {
                        let vector = eigen.eigenvectors.column(k);
                        row.iter().zip(vector.iter()).map(|(x, w)| x * w).sum::<f64>()
                    })
                    .collect()
            })
            .collect();

        Ok(Projection { scores, weights })
    }
}

/// z-scores per column; constant columns become zero
fn standardise(rows: &[Vec<f64>], p: usize) -> Vec<Vec<f64>> {
    let n = rows.len() as f64;
    let mut means = vec![0.0; p];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v / n;
        }
    }
    let mut stds = vec![0.0; p];
    for row in rows {
        for j in 0..p {
            stds[j] += (row[j] - means[j]).powi(2);
        }
    }
    let denom = if rows.len() > 1 { n - 1.0 } else { 1.0 };
    for (s, m) in stds.iter_mut().zip(&means) {
        *s = (*s / denom).sqrt();
        if *s <= 1e-12 * (1.0 + m.abs()) {
            *s = 0.0;
        }
    }

    rows.iter()
        .map(|row| {
            (0..p)
                .map(|j| if stds[j] > 0.0 { (row[j] - means[j]) / stds[j] } else { 0.0 })
                .collect()
        })
        .collect()
}
