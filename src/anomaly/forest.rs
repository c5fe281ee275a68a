//! Isolation forest.
//!
//! Anomalies take fewer random splits to isolate, so their average path
//! length from the root is shorter than that of points in dense regions.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// A node in an isolation tree. Children always have larger indices than
/// their parent; the root is node 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(data: &Array2<f64>, rows: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(data, rows, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        data: &Array2<f64>,
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: rows.len() });

        if depth >= max_depth || rows.len() <= 1 {
            return id;
        }

        // Only features that still vary within this node can split it.
        let candidates: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|feature| {
                let (min, max) = rows.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &r| {
                        let v = data[[r, feature]];
                        (lo.min(v), hi.max(v))
                    },
                );
                (max > min).then_some((feature, min, max))
            })
            .collect();

        if candidates.is_empty() {
            return id;
        }

        let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(min..max);

        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| data[[r, feature]] < threshold);

        if left.is_empty() || right.is_empty() {
            return id;
        }

        let left = self.grow(data, left, depth + 1, max_depth, rng);
        let right = self.grow(data, right, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    /// Depth at which `sample` lands, plus the expected remaining depth of
    /// the leaf's unsplit population.
    fn path_length(&self, sample: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        let mut depth = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1;
                }
            }
        }
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("node {} splits on feature {} of {}", idx, feature, n_features));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {} has non-finite threshold", idx));
                }
                for child in [left, right] {
                    if *child <= idx || *child >= self.nodes.len() {
                        return Err(format!("node {} has invalid child {}", idx, child));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Average path length of an unsuccessful binary search tree lookup over
/// `n` points; normalizes path lengths across sample sizes.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Ensemble of isolation trees fit on random sub-samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sub_sample: usize,
    n_features: usize,
}

impl IsolationForest {
    /// Grow `n_estimators` trees, each on `min(max_samples, rows)` rows drawn
    /// without replacement. Identical inputs and seed give identical forests.
    pub fn fit(data: &Array2<f64>, n_estimators: usize, max_samples: usize, seed: u64) -> Self {
        let n_rows = data.nrows();
        let sub_sample = max_samples.min(n_rows);
        let max_depth = (sub_sample.max(2) as f64).log2().ceil() as usize;

        let mut rng = StdRng::seed_from_u64(seed);
        let trees = (0..n_estimators)
            .map(|_| {
                let rows = index::sample(&mut rng, n_rows, sub_sample).into_vec();
                IsolationTree::build(data, rows, max_depth, &mut rng)
            })
            .collect();

        Self {
            trees,
            sub_sample,
            n_features: data.ncols(),
        }
    }

    /// Negated anomaly score in `[-1, 0]`: lower means easier to isolate.
    pub fn score_samples(&self, data: &Array2<f64>) -> Vec<f64> {
        let norm = average_path_length(self.sub_sample);
        data.rows()
            .into_iter()
            .map(|row| {
                let mean_depth = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(row))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                if norm > 0.0 {
                    -(2.0_f64.powf(-mean_depth / norm))
                } else {
                    -0.5
                }
            })
            .collect()
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn sub_sample(&self) -> usize {
        self.sub_sample
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Structural checks for a forest read back from disk.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.sub_sample < 2 {
            return Err(format!("sub-sample size {} is too small", self.sub_sample));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| format!("tree {}: {}", idx, e))?;
        }
        Ok(())
    }
}
