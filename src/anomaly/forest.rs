//! Isolation forest fitted over standardized window matrices.

use crate::config::ForestConfig;
use crate::error::{EngineError, Result};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const EULER_GAMMA: f32 = 0.577_215_7;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        value: f32,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        count: usize,
    },
}

/// Ensemble of random isolation trees. `anomaly_score` is the classic
/// `2^(-E[h(x)] / c(psi))` normalization in (0, 1], higher is more unusual;
/// `decision_function` shifts it by the training contamination quantile so
/// negative values mark outliers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<Node>,
    psi: usize,
    offset: f32,
}

impl IsolationForest {
    /// Fit on a row-per-sample matrix. Rejects windows that cannot support a
    /// split: fewer than two rows, zero columns, or no column with variance.
    pub fn fit(data: &Array2<f32>, config: &ForestConfig) -> Result<Self> {
        let rows = data.nrows();
        let cols = data.ncols();
        if rows < 2 || cols == 0 || !has_varying_column(data) {
            return Err(EngineError::DegenerateFit(cols));
        }

        let psi = config.max_samples.min(rows).max(2);
        let max_depth = (psi as f32).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut trees = Vec::with_capacity(config.n_estimators);
        for _ in 0..config.n_estimators {
            let sample = rand::seq::index::sample(&mut rng, rows, psi).into_vec();
            trees.push(build_tree(data, &sample, 0, max_depth, &mut rng));
        }

        let mut forest = IsolationForest {
            trees,
            psi,
            offset: 0.0,
        };
        let mut train_scores: Vec<f32> = (0..rows)
            .map(|i| forest.anomaly_score(&data.row(i).to_vec()))
            .collect();
        train_scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let q = ((1.0 - config.contamination) * (rows - 1) as f64).round() as usize;
        forest.offset = train_scores[q.min(rows - 1)];
        Ok(forest)
    }

    /// Normalized anomaly score for one vector.
    pub fn anomaly_score(&self, x: &[f32]) -> f32 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let mean_path = self
            .trees
            .iter()
            .map(|t| path_length(t, x, 0))
            .sum::<f32>()
            / self.trees.len() as f32;
        let norm = average_path_length(self.psi);
        if norm <= 0.0 {
            return 0.5;
        }
        2f32.powf(-mean_path / norm)
    }

    /// Signed decision value: positive inside the training mass, negative
    /// past the contamination quantile.
    pub fn decision_function(&self, x: &[f32]) -> f32 {
        self.offset - self.anomaly_score(x)
    }
}

fn has_varying_column(data: &Array2<f32>) -> bool {
    data.axis_iter(Axis(1)).any(|col| {
        let mut iter = col.iter();
        match iter.next() {
            Some(first) => iter.any(|v| v != first),
            None => false,
        }
    })
}

fn build_tree(
    data: &Array2<f32>,
    idx: &[usize],
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= max_depth || idx.len() <= 1 {
        return Node::Leaf { count: idx.len() };
    }

    // Split on a column that still varies inside this partition.
    let candidates: Vec<(usize, f32, f32)> = (0..data.ncols())
        .filter_map(|j| {
            let mut lo = f32::INFINITY;
            let mut hi = f32::NEG_INFINITY;
            for &i in idx {
                let v = data[[i, j]];
                lo = lo.min(v);
                hi = hi.max(v);
            }
            (hi > lo).then_some((j, lo, hi))
        })
        .collect();
    if candidates.is_empty() {
        return Node::Leaf { count: idx.len() };
    }
    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let value = rng.gen_range(lo..hi);

    let (left, right): (Vec<usize>, Vec<usize>) =
        idx.iter().copied().partition(|&i| data[[i, feature]] < value);
    Node::Split {
        feature,
        value,
        left: Box::new(build_tree(data, &left, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(data, &right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, x: &[f32], depth: usize) -> f32 {
    match node {
        Node::Leaf { count } => depth as f32 + average_path_length(*count),
        Node::Split {
            feature,
            value,
            left,
            right,
        } => {
            let v = x.get(*feature).copied().unwrap_or(0.0);
            if v < *value {
                path_length(left, x, depth + 1)
            } else {
                path_length(right, x, depth + 1)
            }
        }
    }
}

/// Expected unsuccessful-search path length in a binary tree over `n`
/// samples; the normalizer from the isolation forest formulation.
fn average_path_length(n: usize) -> f32 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f32;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
