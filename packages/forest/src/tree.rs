//! A single CART regression tree.
//!
//! Nodes are stored in a flat vector with children referenced by index. A
//! split sends rows with `feature <= threshold` left.

use serde::{Deserialize, Serialize};

/// Splits that reduce the sum of squared errors by less than this are
/// ignored.
const MIN_GAIN: f64 = 1e-12;

/// Growth limits for one tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
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

/// A fitted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grows a tree over the rows named by `indices`.
    ///
    /// `columns` is column-major: `columns[feature][row]`. Returns the tree
    /// together with its unnormalized per-feature impurity decrease.
    pub(crate) fn fit(
        columns: &[Vec<f64>],
        targets: &[f64],
        mut indices: Vec<usize>,
        params: TreeParams,
    ) -> (Self, Vec<f64>) {
        let mut builder = Builder {
            columns,
            targets,
            params,
            nodes: Vec::new(),
            importances: vec![0.0; columns.len()],
        };
        builder.build(&mut indices, 0);

        (
            Self {
                nodes: builder.nodes,
            },
            builder.importances,
        )
    }

    /// Predicts one row. Missing columns route right.
    #[must_use]
    pub fn predict(&self, features: &[f64]) -> f64 {
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
                    let goes_left = features.get(*feature).is_some_and(|v| v <= threshold);
                    id = if goes_left { *left } else { *right };
                }
            }
        }
    }

    /// Number of nodes, leaves included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path in edges.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, id: usize) -> usize {
        match &self.nodes[id] {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => {
                1 + self.depth_from(*left).max(self.depth_from(*right))
            }
        }
    }

    /// Whether the tree has a root, every leaf is finite, and every child
    /// index points forward and inside the node vector. Children always
    /// follow their parent, so this also rules out cycles. Used to reject
    /// corrupt persisted models.
    pub(crate) fn is_well_formed(&self) -> bool {
        let len = self.nodes.len();
        len > 0
            && self.nodes.iter().enumerate().all(|(id, node)| match node {
                Node::Leaf { value } => value.is_finite(),
                Node::Split {
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let children = id + 1..len;
                    threshold.is_finite() && children.contains(left) && children.contains(right)
                }
            })
    }

    /// Largest feature index any split reads.
    pub(crate) fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Builder<'a> {
    columns: &'a [Vec<f64>],
    targets: &'a [f64],
    params: TreeParams,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl Builder<'_> {
    #[allow(clippy::cast_precision_loss)]
    fn build(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });

        let (sum, sum_sq) = indices.iter().fold((0.0, 0.0), |(s, sq), &i| {
            let y = self.targets[i];
            (s + y, sq + y * y)
        });
        let mean = sum / indices.len() as f64;

        let splittable = indices.len() >= self.params.min_samples_split
            && indices.len() >= 2 * self.params.min_samples_leaf
            && self.params.max_depth.is_none_or(|max| depth < max);

        if let Some(split) = splittable
            .then(|| self.best_split(indices, sum, sum_sq))
            .flatten()
        {
            let column = &self.columns[split.feature];
            let mut mid = 0;
            for k in 0..indices.len() {
                if column[indices[k]] <= split.threshold {
                    indices.swap(mid, k);
                    mid += 1;
                }
            }

            self.importances[split.feature] += split.gain;

            let (left_rows, right_rows) = indices.split_at_mut(mid);
            let left = self.build(left_rows, depth + 1);
            let right = self.build(right_rows, depth + 1);
            self.nodes[id] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
        } else {
            self.nodes[id] = Node::Leaf { value: mean };
        }

        id
    }

    /// Exhaustive search over every feature and every boundary between
    /// distinct sorted values. Ties keep the earliest candidate.
    #[allow(clippy::cast_precision_loss)]
    fn best_split(&self, indices: &[usize], sum: f64, sum_sq: f64) -> Option<Split> {
        let n = indices.len();
        let parent_sse = sum_sq - sum * sum / n as f64;
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut order = indices.to_vec();
        let mut best: Option<Split> = None;

        for (feature, column) in self.columns.iter().enumerate() {
            order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..n - 1 {
                let y = self.targets[order[pos]];
                left_sum += y;
                left_sq += y * y;

                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let here = column[order[pos]];
                let next = column[order[pos + 1]];
                if here >= next {
                    continue;
                }

                let right_sum = sum - left_sum;
                let right_sq = sum_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_n as f64)
                    + (right_sq - right_sum * right_sum / right_n as f64);
                let gain = parent_sse - sse;

                if gain > best.map_or(MIN_GAIN, |b| b.gain) {
                    best = Some(Split {
                        feature,
                        threshold: midpoint(here, next),
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// Halfway between two distinct values, never rounding up onto `high`.
fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    if mid >= high { low } else { mid }
}
