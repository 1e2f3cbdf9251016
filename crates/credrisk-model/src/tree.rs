//! Gradient-boosted tree ensembles.
//!
//! Trees are stored as flat node arrays with children after their parent, the
//! layout XGBoost writes. Every node carries its cover (the training weight
//! that reached it), which TreeSHAP uses as the background distribution.

use crate::error::{ModelError, Result};
use crate::model::{Contributions, CreditModel};
use crate::shap;
use ndarray::{Array1, ArrayView1};

/// Relative slack allowed between a split's cover and its children's.
///
/// XGBoost stores hessian sums as `f32`.
const COVER_TOLERANCE: f64 = 1e-4;

/// One node of a regression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Internal split: go left iff `row[feature] < threshold`
    Split {
        /// Feature index
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Direction for missing (NaN) values
        default_left: bool,
        /// Left child index
        left: usize,
        /// Right child index
        right: usize,
        /// Training weight that reached this node
        cover: f64,
    },
    /// Terminal node
    Leaf {
        /// Margin added by this tree
        value: f64,
        /// Training weight that reached this node
        cover: f64,
    },
}

impl Node {
    /// Training weight that reached this node
    pub const fn cover(&self) -> f64 {
        match self {
            Self::Split { cover, .. } | Self::Leaf { cover, .. } => *cover,
        }
    }
}

/// A single regression tree
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    expected_value: f64,
    depth: usize,
}

impl Tree {
    /// Build a tree from nodes in parent-before-child order; node 0 is the root.
    ///
    /// Every node below the root has exactly one parent, and a split's cover
    /// equals the sum of its children's.
    pub fn new(nodes: Vec<Node>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(ModelError::InvalidModel("tree has no nodes".to_string()));
        }

        let mut parent: Vec<Option<usize>> = vec![None; nodes.len()];

        for (i, node) in nodes.iter().enumerate() {
            let cover = node.cover();
            if !(cover.is_finite() && cover > 0.0) {
                return Err(ModelError::InvalidModel(format!(
                    "node {i} has non-positive cover {cover}"
                )));
            }

            match node {
                Node::Split {
                    left,
                    right,
                    threshold,
                    ..
                } => {
                    for child in [*left, *right] {
                        if child <= i || child >= nodes.len() {
                            return Err(ModelError::InvalidModel(format!(
                                "node {i} has out-of-range child {child}"
                            )));
                        }
                        if let Some(other) = parent[child] {
                            return Err(ModelError::InvalidModel(format!(
                                "node {child} is a child of both node {other} and node {i}"
                            )));
                        }
                        parent[child] = Some(i);
                    }

                    let children = nodes[*left].cover() + nodes[*right].cover();
                    if (children - cover).abs() > COVER_TOLERANCE * cover {
                        return Err(ModelError::InvalidModel(format!(
                            "node {i} has cover {cover} but its children sum to {children}"
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(ModelError::InvalidModel(format!(
                            "node {i} has a NaN split threshold"
                        )));
                    }
                }
                Node::Leaf { value, .. } => {
                    if !value.is_finite() {
                        return Err(ModelError::InvalidModel(format!(
                            "leaf {i} has non-finite value {value}"
                        )));
                    }
                }
            }
        }

        let mut tree = Self {
            nodes,
            expected_value: 0.0,
            depth: 0,
        };
        tree.expected_value = tree.subtree_expectation(0);
        tree.depth = tree.subtree_depth(0);
        Ok(tree)
    }

    /// Nodes in storage order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node by index
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Number of split levels on the longest root-to-leaf path
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Largest feature index used by a split
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }

    /// Cover-weighted mean leaf value
    pub const fn expected_value(&self) -> f64 {
        self.expected_value
    }

    /// `(hot, cold)` children at a split: the one `row` follows and the other.
    /// Features beyond the row count as missing.
    pub(crate) fn branch(&self, index: usize, row: ArrayView1<'_, f64>) -> Option<(usize, usize)> {
        match self.nodes[index] {
            Node::Split {
                feature,
                threshold,
                default_left,
                left,
                right,
                ..
            } => {
                let x = row.get(feature).copied().unwrap_or(f64::NAN);
                let go_left = if x.is_nan() { default_left } else { x < threshold };
                Some(if go_left { (left, right) } else { (right, left) })
            }
            Node::Leaf { .. } => None,
        }
    }

    /// Leaf value reached by `row`
    pub fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Leaf { value, .. } => return value,
                Node::Split { .. } => {
                    if let Some((hot, _)) = self.branch(index, row) {
                        index = hot;
                    }
                }
            }
        }
    }

    fn subtree_expectation(&self, index: usize) -> f64 {
        match self.nodes[index] {
            Node::Leaf { value, .. } => value,
            Node::Split {
                left, right, cover, ..
            } => {
                let l = &self.nodes[left];
                let r = &self.nodes[right];
                (l.cover() * self.subtree_expectation(left)
                    + r.cover() * self.subtree_expectation(right))
                    / cover
            }
        }
    }

    fn subtree_depth(&self, index: usize) -> usize {
        match self.nodes[index] {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => {
                1 + self.subtree_depth(left).max(self.subtree_depth(right))
            }
        }
    }
}

/// Additive ensemble of regression trees for binary classification
///
/// margin = base_margin + Σ tree(x)
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    name: String,
    feature_names: Vec<String>,
    base_margin: f64,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    /// Create an ensemble; every split must reference a declared feature.
    pub fn new(
        name: impl Into<String>,
        feature_names: Vec<String>,
        base_margin: f64,
        trees: Vec<Tree>,
    ) -> Result<Self> {
        if !base_margin.is_finite() {
            return Err(ModelError::InvalidModel(format!(
                "non-finite base margin {base_margin}"
            )));
        }
        for (i, tree) in trees.iter().enumerate() {
            if let Some(feature) = tree.max_feature() {
                if feature >= feature_names.len() {
                    return Err(ModelError::InvalidModel(format!(
                        "tree {i} splits on feature {feature} but the model declares {}",
                        feature_names.len()
                    )));
                }
            }
        }

        Ok(Self {
            name: name.into(),
            feature_names,
            base_margin,
            trees,
        })
    }

    /// Trees in the ensemble
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Margin before any tree is applied
    pub const fn base_margin(&self) -> f64 {
        self.base_margin
    }

    /// Expected margin under the cover distribution
    pub fn expected_margin(&self) -> f64 {
        self.base_margin + self.trees.iter().map(Tree::expected_value).sum::<f64>()
    }
}

impl CreditModel for TreeEnsemble {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn margin(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    fn contributions(&self, row: ArrayView1<'_, f64>) -> Contributions {
        let mut phi = vec![0.0; self.feature_names.len()];
        for tree in &self.trees {
            shap::tree_shap(tree, row, &mut phi);
        }
        Contributions::new(self.expected_margin(), Array1::from(phi))
    }
}
