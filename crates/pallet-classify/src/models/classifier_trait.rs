use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data_handling::{Alphabet, Instance, InstanceList};
use crate::error::{ClassifyError, Result};
use crate::models::decision_tree::DecisionTreeModel;
use crate::models::maxent::MaxEntModel;
use crate::models::naive_bayes::NaiveBayesModel;
use crate::models::utils::check_alphabet;
use crate::models::winnow::BalancedWinnowModel;

/// Contract shared by every trained model family.
///
/// Scores are computed over features already indexed in the model's own
/// feature alphabet; `Classifier` handles the name lookup.
pub trait ClassifierModel {
    fn feature_alphabet(&self) -> &Alphabet;

    fn label_alphabet(&self) -> &Alphabet;

    /// Probability-like scores per label, summing to one.
    fn label_scores(&self, features: &[(usize, f64)]) -> Vec<f64>;

    /// Checks that every table is sized by the two alphabets.
    ///
    /// Trained models always pass; decoded ones may not.
    fn check_shape(&self) -> Result<()>;

    /// Model family shown by `inspect`.
    fn name(&self) -> &str {
        "classifier"
    }
}

/// A training procedure supplied from outside the registry.
///
/// Such trainers can be trained and identified (as unassigned) but not
/// persisted, since their internal state is unknown to the encoder.
pub trait ClassifierTrainer: fmt::Debug + Send {
    fn train(&mut self, data: &InstanceList) -> Result<Classifier>;

    fn train_incremental(&mut self, _data: &InstanceList) -> Result<Classifier> {
        Err(ClassifyError::TrainingFailed(format!(
            "{} cannot be trained incrementally",
            self.name()
        )))
    }

    fn name(&self) -> &str {
        "external trainer"
    }
}

/// The trained model produced by a training strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Classifier {
    NaiveBayes(NaiveBayesModel),
    MaxEnt(MaxEntModel),
    DecisionTree(DecisionTreeModel),
    BalancedWinnow(BalancedWinnowModel),
}

impl Classifier {
    fn model(&self) -> &dyn ClassifierModel {
        match self {
            Classifier::NaiveBayes(m) => m,
            Classifier::MaxEnt(m) => m,
            Classifier::DecisionTree(m) => m,
            Classifier::BalancedWinnow(m) => m,
        }
    }

    pub fn name(&self) -> &str {
        self.model().name()
    }

    /// Fails with `InvalidModel` when the model could not score safely.
    pub fn validate(&self) -> Result<()> {
        let model = self.model();
        check_alphabet("feature", model.feature_alphabet())?;
        check_alphabet("label", model.label_alphabet())?;
        model.check_shape()
    }

    pub fn labels(&self) -> &[String] {
        self.model().label_alphabet().entries()
    }

    pub fn num_features(&self) -> usize {
        self.model().feature_alphabet().len()
    }

    /// Ranks labels for named feature values. Features the model never saw are ignored.
    pub fn classify_features<'a, I>(&self, features: I) -> Labeling
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let model = self.model();
        let alphabet = model.feature_alphabet();
        let mut indexed: Vec<(usize, f64)> = features
            .into_iter()
            .filter_map(|(name, v)| alphabet.lookup(name).map(|i| (i, v)))
            .collect();
        indexed.sort_by_key(|&(i, _)| i);
        indexed.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                earlier.1 += later.1;
                true
            } else {
                false
            }
        });
        let scores = model.label_scores(&indexed);
        Labeling::new(model.label_alphabet(), &scores)
    }

    pub fn classify(&self, list: &InstanceList, instance: &Instance) -> Labeling {
        self.classify_features(list.named_features(instance))
    }

    /// Fraction of labeled instances whose best label matches; `None` without labeled data.
    pub fn accuracy(&self, list: &InstanceList) -> Option<f64> {
        let mut total = 0usize;
        let mut correct = 0usize;
        for instance in list.labeled() {
            total += 1;
            let labeling = self.classify(list, instance);
            if labeling.best_label().is_some() && labeling.best_label() == list.label_name(instance)
            {
                correct += 1;
            }
        }
        if total == 0 {
            None
        } else {
            Some(correct as f64 / total as f64)
        }
    }
}

/// Labels ranked by descending score.
#[derive(Debug, Clone, PartialEq)]
pub struct Labeling {
    ranked: Vec<(String, f64)>,
}

impl Labeling {
    fn new(labels: &Alphabet, scores: &[f64]) -> Self {
        let mut ranked: Vec<(String, f64)> = labels
            .entries()
            .iter()
            .cloned()
            .zip(scores.iter().cloned())
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Labeling { ranked }
    }

    pub fn best_label(&self) -> Option<&str> {
        self.ranked.first().map(|(l, _)| l.as_str())
    }

    pub fn best_value(&self) -> Option<f64> {
        self.ranked.first().map(|(_, v)| *v)
    }

    pub fn value_of(&self, label: &str) -> Option<f64> {
        self.ranked.iter().find(|(l, _)| l == label).map(|(_, v)| *v)
    }

    pub fn ranked(&self) -> &[(String, f64)] {
        &self.ranked
    }
}
