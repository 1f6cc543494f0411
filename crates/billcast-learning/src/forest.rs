//! Bagged regression trees.
//!
//! Each tree is grown on a bootstrap sample of the training rows, choosing at
//! every node the split that most reduces the summed squared error of the
//! target. The forest prediction is the mean of the tree predictions.
//!
//! Trees are fitted and evaluated in parallel with rayon. Every tree draws
//! from its own RNG seeded with `seed + tree_index`, so the fitted forest does
//! not depend on thread scheduling.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LearningError, Result};

/// Smallest reduction in squared error that justifies a split.
const MIN_IMPURITY_DECREASE: f64 = 1e-12;

/// Tree-growing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; `None` tries all of them.
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

/// A single regression tree stored as a flat node arena. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on `samples` (row indices into `x`, repeats allowed).
    ///
    /// `samples` must not be empty.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        samples: &[usize],
        params: &ForestParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack = vec![(0usize, samples.to_vec(), 0usize)];

        while let Some((id, rows, depth)) = stack.pop() {
            let value = mean_of(y, &rows);
            let can_split = rows.len() >= params.min_samples_split
                && rows.len() >= 2 * params.min_samples_leaf.max(1)
                && params.max_depth.is_none_or(|max| depth < max)
                && !is_pure(y, &rows);

            let split = if can_split {
                best_split(x, y, &rows, params, rng)
            } else {
                None
            };

            let Some(split) = split else {
                nodes[id] = Node::Leaf { value };
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .into_iter()
                .partition(|&r| x[[r, split.feature]] <= split.threshold);

            let left = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });
            let right = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });

            nodes[id] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            stack.push((right, right_rows, depth + 1));
            stack.push((left, left_rows, depth + 1));
        }

        Self { nodes }
    }

    /// Predict a single row. The row must have at least as many values as the
    /// tree was fitted with.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Length of the longest root-to-leaf path, in edges.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            match &self.nodes[id] {
                Node::Leaf { .. } => deepest = deepest.max(depth),
                Node::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }
        deepest
    }
}

/// An ensemble of regression trees fitted on bootstrap samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fit a forest on a dense feature matrix.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidConfig`] when `n_trees` is zero
    /// - [`LearningError::InvalidData`] when `x` and `y` disagree on the row
    ///   count or hold non-finite values
    /// - [`LearningError::TrainingFailed`] when there are no rows or no features
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: &ForestParams) -> Result<Self> {
        let (n_rows, n_features) = x.dim();

        if params.n_trees == 0 {
            return Err(LearningError::InvalidConfig(
                "n_trees must be at least 1".to_string(),
            ));
        }
        if n_rows == 0 {
            return Err(LearningError::TrainingFailed(
                "no training rows".to_string(),
            ));
        }
        if n_features == 0 {
            return Err(LearningError::TrainingFailed(
                "no feature columns".to_string(),
            ));
        }
        if y.len() != n_rows {
            return Err(LearningError::InvalidData(format!(
                "{} feature rows but {} target values",
                n_rows,
                y.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(LearningError::InvalidData(
                "training data contains non-finite values".to_string(),
            ));
        }

        let trees: Vec<RegressionTree> = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let sample: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
                RegressionTree::fit(x.view(), y.view(), &sample, params, &mut rng)
            })
            .collect();

        debug!(
            trees = trees.len(),
            rows = n_rows,
            features = n_features,
            "Fitted random forest"
        );

        Ok(Self { trees, n_features })
    }

    /// Predict every row of `x`.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(LearningError::InferenceError(format!(
                "expected {} feature columns, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.predict_row(x.row(i)))
            .collect();

        Ok(Array1::from(predictions))
    }

    /// Mean of the tree predictions for one row.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

fn mean_of(y: ArrayView1<'_, f64>, rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len() as f64
}

fn is_pure(y: ArrayView1<'_, f64>, rows: &[usize]) -> bool {
    match rows.first() {
        Some(&first) => rows.iter().all(|&r| y[r] == y[first]),
        None => true,
    }
}

/// Exhaustive search for the variance-reducing split with the lowest summed
/// squared error. Thresholds sit midway between adjacent distinct values.
fn best_split(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    rows: &[usize],
    params: &ForestParams,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let n_features = x.ncols();
    let features: Vec<usize> = match params.max_features {
        Some(k) if k < n_features => {
            let mut picked = index::sample(rng, n_features, k).into_vec();
            picked.sort_unstable();
            picked
        }
        _ => (0..n_features).collect(),
    };

    let n = rows.len();
    let min_leaf = params.min_samples_leaf.max(1);
    let total_sum: f64 = rows.iter().map(|&r| y[r]).sum();
    let total_sq: f64 = rows.iter().map(|&r| y[r] * y[r]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;

    let mut best: Option<SplitCandidate> = None;
    let mut order = rows.to_vec();

    for feature in features {
        order.copy_from_slice(rows);
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for i in 0..n - 1 {
            let yi = y[order[i]];
            left_sum += yi;
            left_sq += yi * yi;

            let left_n = i + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }

            let lo = x[[order[i], feature]];
            let hi = x[[order[i + 1], feature]];
            if lo >= hi {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n as f64)
                + (right_sq - right_sum * right_sum / right_n as f64);

            if best.as_ref().is_none_or(|b| sse < b.sse) {
                let mid = lo / 2.0 + hi / 2.0;
                let threshold = if mid > lo && mid < hi { mid } else { lo };
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    sse,
                });
            }
        }
    }

    best.filter(|b| parent_sse - b.sse > MIN_IMPURITY_DECREASE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let ys: Vec<f64> = xs.iter().map(|&v| if v < 5.0 { 10.0 } else { 20.0 }).collect();
        let x = Array2::from_shape_vec((20, 1), xs).unwrap();
        (x, Array1::from(ys))
    }

    fn params(n_trees: usize) -> ForestParams {
        ForestParams {
            n_trees,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_single_tree_fits_step() {
        let (x, y) = step_data();
        let samples: Vec<usize> = (0..20).collect();
        let mut rng = StdRng::seed_from_u64(0);

        let tree = RegressionTree::fit(x.view(), y.view(), &samples, &params(1), &mut rng);

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(array![1.0].view()), 10.0);
        assert_eq!(tree.predict_row(array![9.0].view()), 20.0);
        // threshold sits between 4.5 and 5.0
        assert_eq!(tree.predict_row(array![4.75].view()), 10.0);
        assert_eq!(tree.predict_row(array![4.8].view()), 20.0);
    }

    #[test]
    fn test_constant_target_gives_single_leaf() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = array![7.0, 7.0, 7.0, 7.0];
        let mut rng = StdRng::seed_from_u64(0);

        let tree = RegressionTree::fit(x.view(), y.view(), &[0, 1, 2, 3], &params(1), &mut rng);

        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_row(array![100.0].view()), 7.0);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let x = Array2::from_shape_vec((8, 1), (0..8).map(|i| i as f64).collect()).unwrap();
        let y = Array1::from((0..8).map(|i| (i * i) as f64).collect::<Vec<_>>());
        let samples: Vec<usize> = (0..8).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let limited = ForestParams {
            max_depth: Some(2),
            ..params(1)
        };

        let tree = RegressionTree::fit(x.view(), y.view(), &samples, &limited, &mut rng);

        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn test_min_samples_leaf_blocks_small_children() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = array![0.0, 0.0, 0.0, 100.0];
        let mut rng = StdRng::seed_from_u64(0);
        let strict = ForestParams {
            min_samples_leaf: 2,
            ..params(1)
        };

        let tree = RegressionTree::fit(x.view(), y.view(), &[0, 1, 2, 3], &strict, &mut rng);

        // the only legal split is 2 | 2
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict_row(array![4.0].view()), 50.0);
    }

    #[test]
    fn test_forest_predicts_step() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(&x, &y, &params(25)).unwrap();

        let query = Array2::from_shape_vec((2, 1), vec![1.0, 9.0]).unwrap();
        let predictions = forest.predict(&query).unwrap();

        assert_eq!(forest.n_trees(), 25);
        assert!((predictions[0] - 10.0).abs() < 0.5);
        assert!((predictions[1] - 20.0).abs() < 0.5);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = step_data();
        let first = RandomForest::fit(&x, &y, &params(10)).unwrap();
        let second = RandomForest::fit(&x, &y, &params(10)).unwrap();
        assert_eq!(first, second);

        let other_seed = ForestParams {
            seed: 7,
            ..params(10)
        };
        let third = RandomForest::fit(&x, &y, &other_seed).unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn test_forest_rejects_bad_input() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert!(matches!(
            RandomForest::fit(&x, &y, &params(3)),
            Err(LearningError::TrainingFailed(_))
        ));

        let x = Array2::from_shape_vec((2, 1), vec![1.0, f64::NAN]).unwrap();
        let y = array![1.0, 2.0];
        assert!(matches!(
            RandomForest::fit(&x, &y, &params(3)),
            Err(LearningError::InvalidData(_))
        ));

        let x = Array2::from_shape_vec((2, 1), vec![1.0, 2.0]).unwrap();
        let y = array![1.0];
        assert!(matches!(
            RandomForest::fit(&x, &y, &params(3)),
            Err(LearningError::InvalidData(_))
        ));
    }

    #[test]
    fn test_predict_checks_width() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(&x, &y, &params(3)).unwrap();
        let wide = Array2::<f64>::zeros((1, 2));
        assert!(matches!(
            forest.predict(&wide),
            Err(LearningError::InferenceError(_))
        ));
    }

    #[test]
    fn test_max_features_subset_still_fits() {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from((0..30).map(|i| i as f64).collect::<Vec<_>>());
        let subset = ForestParams {
            max_features: Some(1),
            ..params(5)
        };

        let forest = RandomForest::fit(&x, &y, &subset).unwrap();
        let predictions = forest.predict(&x).unwrap();

        assert_eq!(predictions.len(), 30);
        assert!(predictions.iter().all(|p| (0.0..=29.0).contains(p)));
    }
}
