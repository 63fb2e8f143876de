//! Shallow regression tree
//!
//! Greedy variance-reduction splits on midpoints between distinct feature
//! values. Growth stops at `max_depth`, when a split would leave fewer
//! than `min_samples_leaf` samples on a side, or when no split lowers the
//! squared error.

use super::features::{FeatureVector, FEATURE_COUNT};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    pub fn fit(x: &[FeatureVector], y: &[f64], max_depth: usize, min_samples_leaf: usize) -> Self {
        let indices: Vec<usize> = (0..x.len()).collect();
        let root = grow(x, y, &indices, max_depth, min_samples_leaf.max(1));
        Self { root }
    }

    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split { feature, threshold, left, right } => {
                    node = if features[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }

    pub fn leaf_count(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf(_) => 1,
                Node::Split { left, right, .. } => walk(left) + walk(right),
            }
        }
        walk(&self.root)
    }
}

fn mean(y: &[f64], idx: &[usize]) -> f64 {
    if idx.is_empty() {
        return 0.0;
    }
    idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64
}

fn sse(y: &[f64], idx: &[usize]) -> f64 {
    let m = mean(y, idx);
    idx.iter().map(|&i| (y[i] - m).powi(2)).sum()
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    error: f64,
}

fn grow(x: &[FeatureVector], y: &[f64], idx: &[usize], depth: usize, min_leaf: usize) -> Node {
    let leaf = Node::Leaf(mean(y, idx));
    if depth == 0 || idx.len() < 2 * min_leaf {
        return leaf;
    }

    let parent_error = sse(y, idx);
    let mut best: Option<BestSplit> = None;

    for feature in 0..FEATURE_COUNT {
        let mut values: Vec<f64> = idx.iter().map(|&i| x[i][feature]).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let (left, right): (Vec<usize>, Vec<usize>) =
                idx.iter().partition(|&&i| x[i][feature] <= threshold);
            if left.len() < min_leaf || right.len() < min_leaf {
                continue;
            }
            let error = sse(y, &left) + sse(y, &right);
            if best.as_ref().map_or(true, |b| error < b.error) {
                best = Some(BestSplit { feature, threshold, error });
            }
        }
    }

    match best {
        Some(split) if split.error + 1e-12 < parent_error => {
            let (left, right): (Vec<usize>, Vec<usize>) =
                idx.iter().partition(|&&i| x[i][split.feature] <= split.threshold);
            Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: Box::new(grow(x, y, &left, depth - 1, min_leaf)),
                right: Box::new(grow(x, y, &right, depth - 1, min_leaf)),
            }
        }
        _ => leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pue: f64, cpu: f64) -> FeatureVector {
        [pue, cpu, 50.0, 22.0, 0.0]
    }

    #[test]
    fn test_step_function_split() {
        let x = vec![row(1.2, 10.0), row(1.3, 10.0), row(1.9, 10.0), row(2.0, 10.0)];
        let y = vec![5.0, 5.0, 30.0, 30.0];
        let tree = RegressionTree::fit(&x, &y, 3, 1);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&row(1.25, 10.0)), 5.0);
        assert_eq!(tree.predict(&row(2.5, 10.0)), 30.0);
    }

    #[test]
    fn test_depth_limit_respected() {
        let x: Vec<FeatureVector> = (0..32).map(|i| row(1.0 + i as f64 * 0.05, i as f64)).collect();
        let y: Vec<f64> = (0..32).map(|i| (i * i) as f64).collect();
        let tree = RegressionTree::fit(&x, &y, 2, 1);
        assert!(tree.depth() <= 2);
        assert!(tree.leaf_count() <= 4);
    }

    #[test]
    fn test_min_leaf_prevents_split() {
        let x = vec![row(1.2, 10.0), row(2.0, 10.0), row(2.1, 10.0)];
        let y = vec![1.0, 9.0, 9.0];
        let tree = RegressionTree::fit(&x, &y, 3, 2);
        assert_eq!(tree.leaf_count(), 1);
        assert!((tree.predict(&row(1.2, 10.0)) - 19.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_target_stays_leaf() {
        let x = vec![row(1.2, 10.0), row(1.5, 20.0), row(1.8, 30.0)];
        let y = vec![12.0; 3];
        let tree = RegressionTree::fit(&x, &y, 3, 1);
        assert_eq!(tree.leaf_count(), 1);
    }
}
