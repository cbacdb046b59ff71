use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::data_handling::{Alphabet, Instance, InstanceList};
use crate::error::{ClassifyError, Result};
use crate::models::classifier_trait::{Classifier, ClassifierModel, ClassifierTrainer};
use crate::models::utils::{check_dim, entropy, normalize_in_place, require_labeled};

/// Binary tree splitting on feature presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        counts: Vec<f64>,
    },
    Split {
        feature: usize,
        counts: Vec<f64>,
        present: Box<TreeNode>,
        absent: Box<TreeNode>,
    },
}

impl TreeNode {
    fn counts(&self) -> &[f64] {
        match self {
            TreeNode::Leaf { counts } | TreeNode::Split { counts, .. } => counts.as_slice(),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split {
                present, absent, ..
            } => 1 + present.depth().max(absent.depth()),
        }
    }

    pub fn num_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split {
                present, absent, ..
            } => present.num_leaves() + absent.num_leaves(),
        }
    }

    fn check_shape(&self, num_labels: usize, num_features: usize) -> Result<()> {
        check_dim("tree node counts", self.counts().len(), num_labels)?;
        if let TreeNode::Split {
            feature,
            present,
            absent,
            ..
        } = self
        {
            if *feature >= num_features {
                return Err(ClassifyError::InvalidModel(format!(
                    "tree splits on feature {} of {}",
                    feature, num_features
                )));
            }
            present.check_shape(num_labels, num_features)?;
            absent.check_shape(num_labels, num_features)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeModel {
    feature_alphabet: Alphabet,
    label_alphabet: Alphabet,
    root: TreeNode,
}

impl DecisionTreeModel {
    pub fn root(&self) -> &TreeNode {
        &self.root
    }
}

impl ClassifierModel for DecisionTreeModel {
    fn feature_alphabet(&self) -> &Alphabet {
        &self.feature_alphabet
    }

    fn label_alphabet(&self) -> &Alphabet {
        &self.label_alphabet
    }

    fn label_scores(&self, features: &[(usize, f64)]) -> Vec<f64> {
        let mut node = &self.root;
        while let TreeNode::Split {
            feature,
            present,
            absent,
            ..
        } = node
        {
            node = if has_feature(features, *feature) {
                present.as_ref()
            } else {
                absent.as_ref()
            };
        }
        let mut scores = node.counts().to_vec();
        normalize_in_place(&mut scores);
        scores
    }

    fn check_shape(&self) -> Result<()> {
        self.root
            .check_shape(self.label_alphabet.len(), self.feature_alphabet.len())
    }

    fn name(&self) -> &str {
        "DecisionTree"
    }
}

fn has_feature(features: &[(usize, f64)], feature: usize) -> bool {
    features
        .binary_search_by_key(&feature, |&(f, _)| f)
        .map(|i| features[i].1 > 0.0)
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SplitCriterion {
    InformationGain,
    GainRatio,
}

struct TreeGrower<'a> {
    instances: Vec<(&'a Instance, usize)>,
    num_labels: usize,
    max_depth: usize,
    min_leaf: usize,
    min_info_gain: f64,
    criterion: SplitCriterion,
}

impl<'a> TreeGrower<'a> {
    fn new(data: &'a InstanceList, criterion: SplitCriterion) -> Self {
        TreeGrower {
            instances: data
                .labeled()
                .filter_map(|i| i.label.map(|l| (i, l)))
                .collect(),
            num_labels: data.num_labels(),
            max_depth: 0,
            min_leaf: 1,
            min_info_gain: 0.0,
            criterion,
        }
    }

    fn label_counts(&self, members: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.num_labels];
        for &m in members {
            counts[self.instances[m].1] += 1.0;
        }
        counts
    }

    /// Best (score, gain, feature), ties broken on the lowest feature index.
    fn best_split(&self, members: &[usize], parent_entropy: f64) -> Option<(f64, f64, usize)> {
        let candidates: BTreeSet<usize> = members
            .iter()
            .flat_map(|&m| self.instances[m].0.features.iter())
            .filter(|&&(_, v)| v > 0.0)
            .map(|&(f, _)| f)
            .collect();
        let candidates: Vec<usize> = candidates.into_iter().collect();
        let total = members.len() as f64;

        candidates
            .par_iter()
            .filter_map(|&feature| {
                let mut present = vec![0.0; self.num_labels];
                let mut absent = vec![0.0; self.num_labels];
                for &m in members {
                    let (instance, label) = self.instances[m];
                    if has_feature(&instance.features, feature) {
                        present[label] += 1.0;
                    } else {
                        absent[label] += 1.0;
                    }
                }
                let n_present: f64 = present.iter().sum();
                let n_absent = total - n_present;
                if n_present < self.min_leaf as f64 || n_absent < self.min_leaf as f64 {
                    return None;
                }
                let gain = parent_entropy
                    - (n_present / total) * entropy(&present)
                    - (n_absent / total) * entropy(&absent);
                let score = match self.criterion {
                    SplitCriterion::InformationGain => gain,
                    SplitCriterion::GainRatio => {
                        let split_info = entropy(&[n_present, n_absent]);
                        if split_info <= 0.0 {
                            return None;
                        }
                        gain / split_info
                    }
                };
                Some((score, gain, feature))
            })
            .reduce_with(|a, b| {
                if a.0 > b.0 || (a.0 == b.0 && a.2 < b.2) {
                    a
                } else {
                    b
                }
            })
    }

    fn grow(&self, members: Vec<usize>, depth: usize) -> TreeNode {
        let counts = self.label_counts(&members);
        let parent_entropy = entropy(&counts);
        if depth >= self.max_depth
            || parent_entropy <= 0.0
            || members.len() < 2 * self.min_leaf
        {
            return TreeNode::Leaf { counts };
        }

        match self.best_split(&members, parent_entropy) {
            Some((_, gain, feature)) if gain > self.min_info_gain => {
                let (present, absent): (Vec<usize>, Vec<usize>) = members
                    .into_iter()
                    .partition(|&m| has_feature(&self.instances[m].0.features, feature));
                log::trace!(
                    "split on feature {} at depth {} (gain {:.4}, {}/{})",
                    feature,
                    depth,
                    gain,
                    present.len(),
                    absent.len()
                );
                TreeNode::Split {
                    feature,
                    counts,
                    present: Box::new(self.grow(present, depth + 1)),
                    absent: Box::new(self.grow(absent, depth + 1)),
                }
            }
            _ => TreeNode::Leaf { counts },
        }
    }

    fn grow_root(&self) -> TreeNode {
        self.grow((0..self.instances.len()).collect(), 0)
    }
}

fn into_classifier(data: &InstanceList, root: TreeNode) -> Classifier {
    Classifier::DecisionTree(DecisionTreeModel {
        feature_alphabet: data.data_alphabet().clone(),
        label_alphabet: data.target_alphabet().clone(),
        root,
    })
}

/// Decision tree using information gain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeTrainer {
    max_depth: usize,
    min_info_gain: f64,
}

impl DecisionTreeTrainer {
    pub fn new(max_depth: usize, min_info_gain: f64) -> Self {
        DecisionTreeTrainer {
            max_depth,
            min_info_gain,
        }
    }
}

impl ClassifierTrainer for DecisionTreeTrainer {
    fn train(&mut self, data: &InstanceList) -> Result<Classifier> {
        require_labeled(data, self.name())?;
        let mut grower = TreeGrower::new(data, SplitCriterion::InformationGain);
        grower.max_depth = self.max_depth;
        grower.min_info_gain = self.min_info_gain;
        let root = grower.grow_root();
        log::debug!(
            "DecisionTree grown: depth {}, {} leaves",
            root.depth(),
            root.num_leaves()
        );
        Ok(into_classifier(data, root))
    }

    fn name(&self) -> &str {
        "DecisionTree"
    }
}

/// C4.5-style tree: gain-ratio splits, minimum leaf size and pessimistic-error pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct C45Trainer {
    max_depth: usize,
    min_leaf_instances: usize,
    min_info_gain: f64,
    confidence_factor: f64,
}

impl C45Trainer {
    pub fn new(
        max_depth: usize,
        min_leaf_instances: usize,
        min_info_gain: f64,
        confidence_factor: f64,
    ) -> Self {
        C45Trainer {
            max_depth,
            min_leaf_instances,
            min_info_gain,
            confidence_factor,
        }
    }
}

/// Upper confidence bound on the number of errors among `n` instances with `errors` observed.
fn estimated_errors(errors: f64, n: f64, z: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    let f = errors / n;
    let z2 = z * z;
    let upper = (f + z2 / (2.0 * n) + z * (f / n - f * f / n + z2 / (4.0 * n * n)).max(0.0).sqrt())
        / (1.0 + z2 / n);
    upper * n
}

fn leaf_errors(counts: &[f64], z: f64) -> f64 {
    let n: f64 = counts.iter().sum();
    let majority = counts.iter().cloned().fold(0.0, f64::max);
    estimated_errors(n - majority, n, z)
}

/// Collapses subtrees whose pessimistic error is no better than a single leaf.
/// Returns the pruned node and its estimated error.
fn prune(node: TreeNode, z: f64) -> (TreeNode, f64) {
    match node {
        TreeNode::Leaf { counts } => {
            let err = leaf_errors(&counts, z);
            (TreeNode::Leaf { counts }, err)
        }
        TreeNode::Split {
            feature,
            counts,
            present,
            absent,
        } => {
            let (present, present_err) = prune(*present, z);
            let (absent, absent_err) = prune(*absent, z);
            let subtree_err = present_err + absent_err;
            let as_leaf = leaf_errors(&counts, z);
            if as_leaf <= subtree_err + 0.1 {
                (TreeNode::Leaf { counts }, as_leaf)
            } else {
                (
                    TreeNode::Split {
                        feature,
                        counts,
                        present: Box::new(present),
                        absent: Box::new(absent),
                    },
                    subtree_err,
                )
            }
        }
    }
}

impl ClassifierTrainer for C45Trainer {
    fn train(&mut self, data: &InstanceList) -> Result<Classifier> {
        require_labeled(data, self.name())?;
        if !(self.confidence_factor > 0.0 && self.confidence_factor <= 0.5) {
            return Err(ClassifyError::TrainingFailed(format!(
                "C45 confidence factor must be in (0, 0.5], got {}",
                self.confidence_factor
            )));
        }
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| ClassifyError::TrainingFailed(e.to_string()))?;
        let z = normal.inverse_cdf(1.0 - self.confidence_factor);

        let mut grower = TreeGrower::new(data, SplitCriterion::GainRatio);
        grower.max_depth = self.max_depth;
        grower.min_leaf = self.min_leaf_instances.max(1);
        grower.min_info_gain = self.min_info_gain;
        let grown = grower.grow_root();
        let leaves_before = grown.num_leaves();
        let (root, err) = prune(grown, z);
        log::debug!(
            "C45 grown with {} leaves, {} after pruning (estimated errors {:.2})",
            leaves_before,
            root.num_leaves(),
            err
        );
        Ok(into_classifier(data, root))
    }

    fn name(&self) -> &str {
        "C45"
    }
}
