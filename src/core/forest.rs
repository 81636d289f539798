use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::{PairingError, Result};

/// Unsupervised random forest producing pairwise dissimilarities
///
/// Each tree learns to separate the observed rows from a synthetic sample
/// drawn from the per-column marginals. Two rows are similar when they keep
/// landing in the same leaf; the dissimilarity is one minus the fraction of
/// trees in which they share a leaf.
#[derive(Debug, Clone, Copy)]
pub struct UnsupervisedForest {
    pub n_trees: usize,
    pub max_depth: usize,
    pub seed: u64,
    /// Worker threads; zero or negative uses every core
    pub n_jobs: i64,
}

impl UnsupervisedForest {
    pub fn new(n_trees: usize, max_depth: usize) -> Self {
        Self {
            n_trees,
            max_depth,
            seed: 0,
            n_jobs: 1,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_jobs(mut self, n_jobs: i64) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    /// Full n x n dissimilarity matrix over `rows`
    ///
    /// The result does not depend on `n_jobs`: every tree draws from its own
    /// generator seeded by `seed` and the tree index.
    pub fn distance(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let n = rows.len();
        let p = rows.first().map(|r| r.len()).unwrap_or(0);
        if n == 0 || p == 0 || self.n_trees == 0 {
            return Err(PairingError::Degenerate(format!(
                "cannot grow {} trees on a {}x{} attribute table",
                self.n_trees, n, p
            )));
        }
        if rows.iter().any(|r| r.len() != p || r.iter().any(|v| !v.is_finite())) {
            return Err(PairingError::Degenerate(
                "attribute table is ragged or has non-finite values".to_string(),
            ));
        }

        let threads = if self.n_jobs > 0 { self.n_jobs as usize } else { 0 };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| PairingError::Degenerate(format!("thread pool: {}", e)))?;

        let leaves: Vec<Vec<usize>> = pool.install(|| {
            (0..self.n_trees)
                .into_par_iter()
                .map(|t| {
                    let mut rng = StdRng::seed_from_u64(tree_seed(self.seed, t));
                    let tree = Tree::fit(rows, self.max_depth, &mut rng);
                    rows.iter().map(|r| tree.leaf_of(r)).collect()
                })
                .collect()
        });

        let mut shared = vec![vec![0usize; n]; n];
        for tree_leaves in &leaves {
            for i in 0..n {
                for j in i..n {
                    if tree_leaves[i] == tree_leaves[j] {
                        shared[i][j] += 1;
                    }
                }
            }
        }

        let trees = self.n_trees as f64;
        let mut dist = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let d = 1.0 - shared[i][j] as f64 / trees;
                dist[i][j] = d;
                dist[j][i] = d;
            }
        }
        Ok(dist)
    }
}

fn tree_seed(seed: u64, tree: usize) -> u64 {
    seed ^ (tree as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[derive(Debug, Clone)]
enum Node {
    Leaf,
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Grow one real-vs-synthetic classification tree on a bootstrap sample
    fn fit(rows: &[Vec<f64>], max_depth: usize, rng: &mut StdRng) -> Self {
        let n = rows.len();
        let p = rows[0].len();

        let mut data: Vec<Vec<f64>> = rows.to_vec();
        let mut labels = vec![true; n];
        for _ in 0..n {
            let synthetic = (0..p).map(|j| rows[rng.gen_range(0..n)][j]).collect();
            data.push(synthetic);
            labels.push(false);
        }

        let indices: Vec<usize> = (0..data.len()).map(|_| rng.gen_range(0..data.len())).collect();

        let mut tree = Tree { nodes: Vec::new() };
        tree.grow(&data, &labels, indices, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        data: &[Vec<f64>],
        labels: &[bool],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf);

        let positives = indices.iter().filter(|&&i| labels[i]).count();
        if depth >= max_depth || indices.len() < 2 || positives == 0 || positives == indices.len() {
            return id;
        }

        let p = data[0].len();
        let mtry = ((p as f64).sqrt().ceil() as usize).clamp(1, p);
        let features = sample(&mut *rng, p, mtry).into_vec();

        let Some((feature, threshold)) = best_split(data, labels, &indices, &features) else {
            return id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| data[i][feature] <= threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return id;
        }

        let left = self.grow(data, labels, left_idx, depth + 1, max_depth, rng);
        let right = self.grow(data, labels, right_idx, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn leaf_of(&self, row: &[f64]) -> usize {
        let mut id = 0;
        while let Node::Split {
            feature,
            threshold,
            left,
            right,
        } = &self.nodes[id]
        {
            id = if row[*feature] <= *threshold { *left } else { *right };
        }
        id
    }
}

/// Lowest weighted Gini impurity split among `features`
fn best_split(
    data: &[Vec<f64>],
    labels: &[bool],
    indices: &[usize],
    features: &[usize],
) -> Option<(usize, f64)> {
    let total = indices.len() as f64;
    let total_pos = indices.iter().filter(|&&i| labels[i]).count() as f64;
    let parent = gini(total_pos, total);

    let mut best: Option<(usize, f64, f64)> = None;
    for &feature in features {
        let mut values: Vec<(f64, bool)> = indices
            .iter()
            .map(|&i| (data[i][feature], labels[i]))
            .collect();
        values.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_pos = 0.0;
        for k in 1..values.len() {
            if values[k - 1].1 {
                left_pos += 1.0;
            }
            if values[k - 1].0 >= values[k].0 {
                continue;
            }
            let left_n = k as f64;
            let right_n = total - left_n;
            let impurity = (left_n * gini(left_pos, left_n)
                + right_n * gini(total_pos - left_pos, right_n))
                / total;
            if impurity < parent && best.map_or(true, |(_, _, b)| impurity < b) {
                let threshold = values[k - 1].0 + (values[k].0 - values[k - 1].0) / 2.0;
                best = Some((feature, threshold, impurity));
            }
        }
    }
    best.map(|(f, t, _)| (f, t))
}

#[inline]
fn gini(pos: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    let q = pos / n;
    1.0 - q * q - (1.0 - q) * (1.0 - q)
}
