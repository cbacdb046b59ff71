use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data_handling::{Alphabet, Instance, InstanceList};
use crate::error::{ClassifyError, Result};
use crate::models::classifier_trait::{Classifier, ClassifierModel, ClassifierTrainer};
use crate::models::utils::{
    check_alphabet, check_dim, remap_features, require_labeled, softmax_in_place,
};

/// Multinomial Naive Bayes model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayesModel {
    feature_alphabet: Alphabet,
    label_alphabet: Alphabet,
    log_priors: Vec<f64>,
    /// `[label, feature]` log p(feature | label)
    log_likelihoods: Array2<f64>,
}

impl NaiveBayesModel {
    pub fn log_priors(&self) -> &[f64] {
        &self.log_priors
    }
}

impl ClassifierModel for NaiveBayesModel {
    fn feature_alphabet(&self) -> &Alphabet {
        &self.feature_alphabet
    }

    fn label_alphabet(&self) -> &Alphabet {
        &self.label_alphabet
    }

    fn label_scores(&self, features: &[(usize, f64)]) -> Vec<f64> {
        let mut scores = self.log_priors.clone();
        for (label, score) in scores.iter_mut().enumerate() {
            for &(f, v) in features {
                if f < self.log_likelihoods.ncols() {
                    *score += v * self.log_likelihoods[[label, f]];
                }
            }
        }
        softmax_in_place(&mut scores);
        scores
    }

    fn check_shape(&self) -> Result<()> {
        let labels = self.label_alphabet.len();
        check_dim("NaiveBayes priors", self.log_priors.len(), labels)?;
        check_dim("NaiveBayes likelihood rows", self.log_likelihoods.nrows(), labels)?;
        check_dim(
            "NaiveBayes likelihood columns",
            self.log_likelihoods.ncols(),
            self.feature_alphabet.len(),
        )
    }

    fn name(&self) -> &str {
        "NaiveBayes"
    }
}

/// Naive Bayes trainer that keeps its sufficient statistics between calls,
/// so later datasets can be folded in with `train_incremental`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayesTrainer {
    alpha: f64,
    feature_alphabet: Alphabet,
    label_alphabet: Alphabet,
    /// `[label][feature]` weighted term counts
    feature_counts: Vec<Vec<f64>>,
    label_counts: Vec<f64>,
}

impl NaiveBayesTrainer {
    pub fn new(alpha: f64) -> Self {
        NaiveBayesTrainer {
            alpha,
            feature_alphabet: Alphabet::new(),
            label_alphabet: Alphabet::new(),
            feature_counts: Vec::new(),
            label_counts: Vec::new(),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Number of (weighted) labeled instances absorbed so far.
    pub fn observed_instances(&self) -> f64 {
        self.label_counts.iter().sum()
    }

    /// Checks the retained counts against the alphabets before they are updated.
    pub fn validate(&self) -> Result<()> {
        check_alphabet("NaiveBayes trainer feature", &self.feature_alphabet)?;
        check_alphabet("NaiveBayes trainer label", &self.label_alphabet)?;
        let labels = self.label_alphabet.len();
        let features = self.feature_alphabet.len();
        check_dim("NaiveBayes label counts", self.label_counts.len(), labels)?;
        check_dim("NaiveBayes feature count rows", self.feature_counts.len(), labels)?;
        for row in &self.feature_counts {
            check_dim("NaiveBayes feature count row", row.len(), features)?;
        }
        Ok(())
    }

    fn check_alpha(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return Err(ClassifyError::TrainingFailed(format!(
                "NaiveBayes smoothing must be positive, got {}",
                self.alpha
            )));
        }
        Ok(())
    }

    /// Drops all statistics and adopts the dataset's alphabets.
    pub(crate) fn reset_from(&mut self, list: &InstanceList) {
        self.feature_alphabet = list.data_alphabet().clone();
        self.label_alphabet = list.target_alphabet().clone();
        self.feature_counts.clear();
        self.label_counts.clear();
        self.grow();
    }

    fn grow(&mut self) {
        let num_labels = self.label_alphabet.len();
        let num_features = self.feature_alphabet.len();
        self.label_counts.resize(num_labels, 0.0);
        self.feature_counts.resize_with(num_labels, Vec::new);
        for row in self.feature_counts.iter_mut() {
            row.resize(num_features, 0.0);
        }
    }

    /// Adds `weight` copies of an instance; indices must already be in this trainer's alphabets.
    pub(crate) fn observe(&mut self, features: &[(usize, f64)], label: usize, weight: f64) {
        self.label_counts[label] += weight;
        let row = &mut self.feature_counts[label];
        for &(f, v) in features {
            row[f] += weight * v;
        }
    }

    /// Folds every labeled instance of `list` into the counts, growing the alphabets as needed.
    pub(crate) fn accumulate(&mut self, list: &InstanceList) -> usize {
        let mut observations: Vec<(Vec<(usize, f64)>, usize)> = Vec::with_capacity(list.len());
        for instance in list.labeled() {
            let label = match list.label_name(instance) {
                Some(name) => self.label_alphabet.lookup_or_insert(name),
                None => continue,
            };
            let features = remap_features(&mut self.feature_alphabet, list, instance);
            observations.push((features, label));
        }
        self.grow();
        for (features, label) in &observations {
            self.observe(features, *label, 1.0);
        }
        observations.len()
    }

    /// The model implied by the counts observed so far.
    pub fn estimate(&self) -> NaiveBayesModel {
        let num_labels = self.label_alphabet.len();
        let num_features = self.feature_alphabet.len();
        let alpha = self.alpha;

        let total: f64 = self.label_counts.iter().sum();
        let log_priors = self
            .label_counts
            .iter()
            .map(|c| ((c + alpha) / (total + alpha * num_labels as f64)).ln())
            .collect();

        let mut log_likelihoods = Array2::zeros((num_labels, num_features));
        for (label, row) in self.feature_counts.iter().enumerate() {
            let denom = row.iter().sum::<f64>() + alpha * num_features as f64;
            for (f, count) in row.iter().enumerate() {
                log_likelihoods[[label, f]] = ((count + alpha) / denom).ln();
            }
        }

        NaiveBayesModel {
            feature_alphabet: self.feature_alphabet.clone(),
            label_alphabet: self.label_alphabet.clone(),
            log_priors,
            log_likelihoods,
        }
    }
}

impl ClassifierTrainer for NaiveBayesTrainer {
    fn train(&mut self, data: &InstanceList) -> Result<Classifier> {
        self.check_alpha()?;
        require_labeled(data, self.name())?;
        self.reset_from(data);
        let added = self.accumulate(data);
        log::debug!("NaiveBayes trained on {} instances", added);
        Ok(Classifier::NaiveBayes(self.estimate()))
    }

    fn train_incremental(&mut self, data: &InstanceList) -> Result<Classifier> {
        self.check_alpha()?;
        require_labeled(data, self.name())?;
        let before = self.observed_instances();
        let added = self.accumulate(data);
        log::debug!(
            "NaiveBayes updated with {} instances ({} previously observed)",
            added,
            before
        );
        Ok(Classifier::NaiveBayes(self.estimate()))
    }

    fn name(&self) -> &str {
        "NaiveBayes"
    }
}

/// Semi-supervised Naive Bayes: starts from the labeled instances, then
/// re-estimates with the unlabeled ones weighted by their posteriors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayesEmTrainer {
    alpha: f64,
    em_iterations: usize,
    unlabeled_weight: f64,
}

impl NaiveBayesEmTrainer {
    pub fn new(alpha: f64, em_iterations: usize, unlabeled_weight: f64) -> Self {
        NaiveBayesEmTrainer {
            alpha,
            em_iterations,
            unlabeled_weight,
        }
    }
}

impl ClassifierTrainer for NaiveBayesEmTrainer {
    fn train(&mut self, data: &InstanceList) -> Result<Classifier> {
        if data.num_labeled() == 0 || data.num_labels() == 0 {
            return Err(ClassifyError::TrainingFailed(
                "NaiveBayesEM needs at least one labeled instance".to_string(),
            ));
        }
        let mut base = NaiveBayesTrainer::new(self.alpha);
        base.check_alpha()?;
        base.reset_from(data);
        base.accumulate(data);
        let mut model = base.estimate();

        let unlabeled: Vec<&Instance> = data.unlabeled().collect();
        if unlabeled.is_empty() {
            log::debug!("NaiveBayesEM found no unlabeled instances; plain NaiveBayes estimate used");
        }

        for iteration in 0..self.em_iterations {
            if unlabeled.is_empty() {
                break;
            }
            let mut expanded = base.clone();
            for instance in &unlabeled {
                let posterior = model.label_scores(&instance.features);
                for (label, p) in posterior.iter().enumerate() {
                    expanded.observe(&instance.features, label, p * self.unlabeled_weight);
                }
            }
            let next = expanded.estimate();
            let shift = next
                .log_priors
                .iter()
                .zip(model.log_priors.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            model = next;
            log::trace!("NaiveBayesEM iteration {}: prior shift {:.3e}", iteration, shift);
            if shift < 1e-9 {
                break;
            }
        }

        Ok(Classifier::NaiveBayes(model))
    }

    fn name(&self) -> &str {
        "NaiveBayesEM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather() -> InstanceList {
        let mut list = InstanceList::new();
        list.push_text("d1", Some("sunny"), "bright sun warm");
        list.push_text("d2", Some("sunny"), "sun warm clear sky");
        list.push_text("d3", Some("rainy"), "rain cloud cold");
        list.push_text("d4", Some("rainy"), "cloud wet rain");
        list
    }

    #[test]
    fn test_naive_bayes_fits_training_data() {
        let data = weather();
        let mut trainer = NaiveBayesTrainer::new(1.0);
        let classifier = trainer.train(&data).unwrap();
        assert_eq!(classifier.accuracy(&data), Some(1.0));

        let labeling = classifier.classify_features(vec![("rain", 1.0), ("wet", 1.0)]);
        assert_eq!(labeling.best_label(), Some("rainy"));
        let total: f64 = labeling.ranked().iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_incremental_grows_alphabets() {
        let mut trainer = NaiveBayesTrainer::new(1.0);
        trainer.train(&weather()).unwrap();
        assert_eq!(trainer.observed_instances(), 4.0);

        let mut more = InstanceList::new();
        more.push_text("d5", Some("snowy"), "snow cold white");
        let classifier = trainer.train_incremental(&more).unwrap();

        assert_eq!(trainer.observed_instances(), 5.0);
        assert_eq!(classifier.labels(), &["sunny", "rainy", "snowy"]);
        let labeling = classifier.classify_features(vec![("snow", 2.0), ("white", 1.0)]);
        assert_eq!(labeling.best_label(), Some("snowy"));
    }

    #[test]
    fn test_train_resets_statistics() {
        let mut trainer = NaiveBayesTrainer::new(1.0);
        trainer.train(&weather()).unwrap();
        trainer.train(&weather()).unwrap();
        assert_eq!(trainer.observed_instances(), 4.0);
    }

    #[test]
    fn test_rejects_non_positive_alpha() {
        let mut trainer = NaiveBayesTrainer::new(0.0);
        assert!(matches!(
            trainer.train(&weather()),
            Err(ClassifyError::TrainingFailed(_))
        ));
    }

    #[test]
    fn test_validate_catches_short_tables() {
        let mut trainer = NaiveBayesTrainer::new(1.0);
        let classifier = trainer.train(&weather()).unwrap();
        assert!(classifier.validate().is_ok());
        assert!(trainer.validate().is_ok());

        let model: NaiveBayesModel = serde_json::from_value(serde_json::json!({
            "feature_alphabet": ["sun", "rain"],
            "label_alphabet": ["sunny", "rainy"],
            "log_priors": [-0.7],
            "log_likelihoods": {"v": 1, "dim": [2, 2], "data": [-0.7, -0.7, -0.7, -0.7]}
        }))
        .unwrap();
        assert!(matches!(
            Classifier::NaiveBayes(model).validate(),
            Err(ClassifyError::InvalidModel(_))
        ));

        let stale: NaiveBayesTrainer = serde_json::from_value(serde_json::json!({
            "alpha": 1.0,
            "feature_alphabet": ["sun", "rain"],
            "label_alphabet": ["sunny"],
            "feature_counts": [[1.0]],
            "label_counts": [1.0]
        }))
        .unwrap();
        assert!(matches!(stale.validate(), Err(ClassifyError::InvalidModel(_))));
    }

    #[test]
    fn test_em_uses_unlabeled_data() {
        let mut data = weather();
        data.push_text("u1", None, "sun bright");
        data.push_text("u2", None, "rain wet cloud");
        let mut em = NaiveBayesEmTrainer::new(1.0, 5, 0.5);
        let classifier = em.train(&data).unwrap();
        assert_eq!(classifier.accuracy(&data), Some(1.0));

        let mut plain = NaiveBayesTrainer::new(1.0);
        let baseline = plain.train(&data).unwrap();
        assert_ne!(classifier, baseline);
    }
}
