//! Regression Tree - CART with squared-error splits
//!
//! Shared building block of both ensemble members. Nodes live in a flat
//! vector so a fitted tree serializes as plain data.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; all features when >= feature count
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    /// Fit on `rows` of `x`; `y` is indexed by row number, like `x`
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[f64],
        rows: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let mut rows = rows.to_vec();
        if rows.is_empty() {
            tree.nodes.push(TreeNode::Leaf { value: 0.0 });
        } else {
            tree.grow(x, y, &mut rows, 0, params, rng);
        }
        tree
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split { feature, threshold, left, right }) => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    fn grow(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: &[f64],
        rows: &mut [usize],
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let idx = self.nodes.len();
        let n = rows.len() as f64;
        let sum: f64 = rows.iter().map(|&r| y[r]).sum();
        let sum_sq: f64 = rows.iter().map(|&r| y[r] * y[r]).sum();
        let mean = sum / n;
        self.nodes.push(TreeNode::Leaf { value: mean });

        let too_small = rows.len() < params.min_samples_split.max(2)
            || rows.len() < 2 * params.min_samples_leaf.max(1);
        if depth >= params.max_depth || too_small {
            return idx;
        }

        let parent_sse = sum_sq - sum * sum / n;
        if parent_sse <= f64::EPSILON {
            return idx;
        }

        let split = match best_split(x, y, rows, params, rng, parent_sse) {
            Some(s) => s,
            None => return idx,
        };

        // Partition in place: left block first
        let mut mid = 0;
        for i in 0..rows.len() {
            if x[[rows[i], split.feature]] <= split.threshold {
                rows.swap(i, mid);
                mid += 1;
            }
        }
        if mid == 0 || mid == rows.len() {
            return idx;
        }

        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left = self.grow(x, y, left_rows, depth + 1, params, rng);
        let right = self.grow(x, y, right_rows, depth + 1, params, rng);
        self.nodes[idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }
}

fn best_split(
    x: ArrayView2<'_, f64>,
    y: &[f64],
    rows: &[usize],
    params: &TreeParams,
    rng: &mut StdRng,
    parent_sse: f64,
) -> Option<SplitCandidate> {
    let n_features = x.ncols();
    let features: Vec<usize> = if params.max_features >= n_features {
        (0..n_features).collect()
    } else {
        rand::seq::index::sample(rng, n_features, params.max_features.max(1)).into_vec()
    };

    let min_leaf = params.min_samples_leaf.max(1);
    let n = rows.len();
    let total_sum: f64 = rows.iter().map(|&r| y[r]).sum();
    let total_sq: f64 = rows.iter().map(|&r| y[r] * y[r]).sum();

    let mut best: Option<SplitCandidate> = None;
    let mut order = rows.to_vec();

    for &f in &features {
        order.sort_by(|&a, &b| x[[a, f]].total_cmp(&x[[b, f]]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for i in 0..n - 1 {
            let yi = y[order[i]];
            left_sum += yi;
            left_sq += yi * yi;

            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let here = x[[order[i], f]];
            let next = x[[order[i + 1], f]];
            if here == next {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left as f64)
                + (right_sq - right_sum * right_sum / n_right as f64);

            if best.as_ref().map_or(true, |b| sse < b.sse) {
                best = Some(SplitCandidate {
                    feature: f,
                    threshold: here + (next - here) / 2.0,
                    sse,
                });
            }
        }
    }

    best.filter(|b| b.sse < parent_sse - 1e-12)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::SeedableRng;

    fn params(depth: usize) -> TreeParams {
        TreeParams {
            max_depth: depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        }
    }

    #[test]
    fn test_fits_step_function_exactly() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [0.0, 0.0, 0.0, 100.0, 100.0, 100.0];
        let rows: Vec<usize> = (0..6).collect();
        let mut rng = StdRng::seed_from_u64(0);

        let tree = RegressionTree::fit(x.view(), &y, &rows, &params(3), &mut rng);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict_row(array![2.5].view()), 0.0);
        assert_eq!(tree.predict_row(array![9.0].view()), 100.0);
    }

    #[test]
    fn test_depth_zero_predicts_mean() {
        let x = array![[1.0], [2.0]];
        let y = [10.0, 30.0];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(x.view(), &y, &[0, 1], &params(0), &mut rng);
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict_row(array![5.0].view()), 20.0);
    }

    #[test]
    fn test_constant_feature_never_splits() {
        let x = Array2::from_elem((10, 1), 4.0);
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let rows: Vec<usize> = (0..10).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(x.view(), &y, &rows, &params(5), &mut rng);
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = [0.0, 0.0, 0.0, 100.0];
        let p = TreeParams { min_samples_leaf: 2, ..params(3) };
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(x.view(), &y, &[0, 1, 2, 3], &p, &mut rng);
        // The only legal split is 2|2
        assert_eq!(tree.predict_row(array![4.0].view()), 50.0);
    }
}
