//! TreeSHAP
//!
//! Exact Shapley values of a single tree in polynomial time (Lundberg et al.,
//! "Consistent Individualized Feature Attribution for Tree Ensembles",
//! Algorithm 2). The value of a coalition S is the path-dependent expectation
//! of the tree: splits on features in S follow the row, all other splits are
//! averaged by child cover.
//!
//! For a row x and tree f:
//!
//! E[f] + Σ φ_i(x) = f(x)
//!
//! where E[f] is [`Tree::expected_value`].

use crate::tree::{Node, Tree};
use ndarray::ArrayView1;

/// One entry of the unique feature path from the root to the current node
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// Split feature; `None` only for the root sentinel
    feature: Option<usize>,
    /// Fraction of zero paths (feature not in S) flowing through this split
    zero_fraction: f64,
    /// Fraction of one paths (feature in S) flowing through this split
    one_fraction: f64,
    /// Proportion of subsets of a given cardinality
    weight: f64,
}

/// Add the Shapley values of `tree` at `row` to `phi`.
///
/// `phi` is indexed by feature and must cover every split feature.
pub fn tree_shap(tree: &Tree, row: ArrayView1<'_, f64>, phi: &mut [f64]) {
    let path = Vec::with_capacity(tree.depth() + 2);
    recurse(tree, row, phi, 0, path, 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    row: ArrayView1<'_, f64>,
    phi: &mut [f64],
    index: usize,
    mut path: Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    extend(&mut path, zero_fraction, one_fraction, feature);

    match *tree.node(index) {
        Node::Leaf { value, .. } => {
            for i in 1..path.len() {
                let element = path[i];
                if let Some(f) = element.feature {
                    let w = unwound_sum(&path, i);
                    phi[f] += w * (element.one_fraction - element.zero_fraction) * value;
                }
            }
        }
        Node::Split {
            feature: split,
            cover,
            ..
        } => {
            let Some((hot, cold)) = tree.branch(index, row) else {
                return;
            };

            // A feature already on the path is unwound and re-entered here
            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            if let Some(k) = (1..path.len()).find(|&k| path[k].feature == Some(split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind(&mut path, k);
            }

            let hot_zero = incoming_zero * tree.node(hot).cover() / cover;
            let cold_zero = incoming_zero * tree.node(cold).cover() / cover;

            recurse(
                tree,
                row,
                phi,
                hot,
                path.clone(),
                hot_zero,
                incoming_one,
                Some(split),
            );
            recurse(tree, row, phi, cold, path, cold_zero, 0.0, Some(split));
        }
    }
}

fn extend(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let d = depth as f64;
    for i in (0..depth).rev() {
        let w = path[i].weight;
        path[i + 1].weight += one_fraction * w * (i as f64 + 1.0) / (d + 1.0);
        path[i].weight = zero_fraction * w * (d - i as f64) / (d + 1.0);
    }
}

fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let d = depth as f64;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[index];

    let mut next_one = path[depth].weight;
    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let w = path[i].weight;
            path[i].weight = next_one * (d + 1.0) / ((i as f64 + 1.0) * one_fraction);
            next_one = w - path[i].weight * zero_fraction * (d - i as f64) / (d + 1.0);
        } else {
            path[i].weight = path[i].weight * (d + 1.0) / (zero_fraction * (d - i as f64));
        }
    }

    // Weights stay in place; feature and fractions shift left over the removed entry
    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total weight the path would have with element `index` unwound
fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let d = depth as f64;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[index];

    let mut total = 0.0;
    if one_fraction != 0.0 {
        let mut next_one = path[depth].weight;
        for i in (0..depth).rev() {
            let tmp = next_one * (d + 1.0) / ((i as f64 + 1.0) * one_fraction);
            total += tmp;
            next_one = path[i].weight - tmp * zero_fraction * (d - i as f64) / (d + 1.0);
        }
    } else {
        for i in (0..depth).rev() {
            total += path[i].weight / zero_fraction * (d + 1.0) / (d - i as f64);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::stump;
    use approx::assert_relative_eq;
    use ndarray::{Array1, array};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn shap_values(tree: &Tree, row: &Array1<f64>, n_features: usize) -> Vec<f64> {
        let mut phi = vec![0.0; n_features];
        tree_shap(tree, row.view(), &mut phi);
        phi
    }

    /// Path-dependent value of coalition `mask`: splits on features in the
    /// coalition follow the row, others average children by cover.
    fn coalition_value(tree: &Tree, index: usize, row: &Array1<f64>, mask: u32) -> f64 {
        match *tree.node(index) {
            Node::Leaf { value, .. } => value,
            Node::Split {
                feature,
                left,
                right,
                cover,
                ..
            } => {
                if mask & (1 << feature) != 0 {
                    let (hot, _) = tree.branch(index, row.view()).unwrap();
                    coalition_value(tree, hot, row, mask)
                } else {
                    (tree.node(left).cover() * coalition_value(tree, left, row, mask)
                        + tree.node(right).cover() * coalition_value(tree, right, row, mask))
                        / cover
                }
            }
        }
    }

    /// Shapley values by enumerating every coalition.
    fn brute_force(tree: &Tree, row: &Array1<f64>, n_features: usize) -> Vec<f64> {
        let factorial = |n: usize| (1..=n).map(|k| k as f64).product::<f64>();
        let m = n_features;
        (0..m)
            .map(|i| {
                (0..1_u32 << m)
                    .filter(|s| s & (1 << i) == 0)
                    .map(|s| {
                        let size = s.count_ones() as usize;
                        let weight = factorial(size) * factorial(m - size - 1) / factorial(m);
                        weight
                            * (coalition_value(tree, 0, row, s | (1 << i))
                                - coalition_value(tree, 0, row, s))
                    })
                    .sum()
            })
            .collect()
    }

    /// Random complete tree of the given depth over `n_features` features.
    fn random_tree(rng: &mut StdRng, depth: usize, n_features: usize) -> Tree {
        let n_nodes = (1 << (depth + 1)) - 1;
        let first_leaf = (1 << depth) - 1;
        let mut covers = vec![0.0; n_nodes];
        for cover in covers.iter_mut().skip(first_leaf) {
            *cover = rng.gen_range(1.0..50.0);
        }
        for i in (0..first_leaf).rev() {
            covers[i] = covers[2 * i + 1] + covers[2 * i + 2];
        }

        let nodes = (0..n_nodes)
            .map(|i| {
                if i >= first_leaf {
                    Node::Leaf {
                        value: rng.gen_range(-1.0..1.0),
                        cover: covers[i],
                    }
                } else {
                    Node::Split {
                        feature: rng.gen_range(0..n_features),
                        threshold: rng.gen_range(0.0..1.0),
                        default_left: rng.gen_bool(0.5),
                        left: 2 * i + 1,
                        right: 2 * i + 2,
                        cover: covers[i],
                    }
                }
            })
            .collect();
        Tree::new(nodes).unwrap()
    }

    #[test]
    fn test_stump_values() {
        let tree = stump();

        let phi = shap_values(&tree, &array![1.0], 1);
        assert_relative_eq!(phi[0], 1.5, epsilon = 1e-12);

        let phi = shap_values(&tree, &array![0.0], 1);
        assert_relative_eq!(phi[0], -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_unused_feature_gets_nothing() {
        let tree = stump();
        let phi = shap_values(&tree, &array![1.0, 123.0, -4.0], 3);
        assert_eq!(phi[1], 0.0);
        assert_eq!(phi[2], 0.0);
    }

    #[test]
    fn test_additivity_on_random_trees() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let depth = rng.gen_range(1..=5);
            let tree = random_tree(&mut rng, depth, 4);
            let row: Array1<f64> = (0..4).map(|_| rng.gen_range(0.0..1.0)).collect();

            let phi = shap_values(&tree, &row, 4);
            let total = tree.expected_value() + phi.iter().sum::<f64>();
            assert_relative_eq!(total, tree.predict(row.view()), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_matches_brute_force_shapley() {
        // Repeated features along a path exercise the unwind step
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..30 {
            let tree = random_tree(&mut rng, 4, 3);
            let row: Array1<f64> = (0..3).map(|_| rng.gen_range(0.0..1.0)).collect();

            let fast = shap_values(&tree, &row, 3);
            let exact = brute_force(&tree, &row, 3);
            for (a, b) in fast.iter().zip(&exact) {
                assert_relative_eq!(*a, *b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_missing_value_follows_default() {
        let tree = stump();
        let phi = shap_values(&tree, &array![f64::NAN], 1);
        assert_relative_eq!(phi[0], -0.5, epsilon = 1e-12);
    }
}
