use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data_handling::{Alphabet, InstanceList};
use crate::error::{ClassifyError, Result};
use crate::models::classifier_trait::{Classifier, ClassifierModel, ClassifierTrainer};
use crate::models::utils::{argmax, check_dim, normalize_in_place, require_labeled};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancedWinnowModel {
    feature_alphabet: Alphabet,
    label_alphabet: Alphabet,
    /// `[label, feature]` multiplicative weights, always positive
    weights: Array2<f64>,
}

fn l1_normalized(features: &[(usize, f64)]) -> Vec<(usize, f64)> {
    let total: f64 = features.iter().map(|&(_, v)| v.abs()).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    features.iter().map(|&(f, v)| (f, v / total)).collect()
}

fn winnow_scores(weights: &Array2<f64>, features: &[(usize, f64)]) -> Vec<f64> {
    (0..weights.nrows())
        .map(|label| {
            features
                .iter()
                .filter(|&&(f, _)| f < weights.ncols())
                .map(|&(f, v)| v * weights[[label, f]])
                .sum()
        })
        .collect()
}

impl ClassifierModel for BalancedWinnowModel {
    fn feature_alphabet(&self) -> &Alphabet {
        &self.feature_alphabet
    }

    fn label_alphabet(&self) -> &Alphabet {
        &self.label_alphabet
    }

    fn label_scores(&self, features: &[(usize, f64)]) -> Vec<f64> {
        let mut scores = winnow_scores(&self.weights, &l1_normalized(features));
        normalize_in_place(&mut scores);
        scores
    }

    fn check_shape(&self) -> Result<()> {
        check_dim(
            "BalancedWinnow weight rows",
            self.weights.nrows(),
            self.label_alphabet.len(),
        )?;
        check_dim(
            "BalancedWinnow weight columns",
            self.weights.ncols(),
            self.feature_alphabet.len(),
        )
    }

    fn name(&self) -> &str {
        "BalancedWinnow"
    }
}

/// Mistake-driven multiplicative updates: on an error the true label's
/// active weights are promoted and the predicted label's demoted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancedWinnowTrainer {
    epsilon: f64,
    max_iterations: usize,
    seed: u64,
}

impl BalancedWinnowTrainer {
    pub fn new(epsilon: f64, max_iterations: usize, seed: u64) -> Self {
        BalancedWinnowTrainer {
            epsilon,
            max_iterations,
            seed,
        }
    }
}

impl ClassifierTrainer for BalancedWinnowTrainer {
    fn train(&mut self, data: &InstanceList) -> Result<Classifier> {
        require_labeled(data, self.name())?;
        if !(self.epsilon > 0.0 && self.epsilon < 1.0) {
            return Err(ClassifyError::TrainingFailed(format!(
                "BalancedWinnow epsilon must be in (0, 1), got {}",
                self.epsilon
            )));
        }

        let examples: Vec<(Vec<(usize, f64)>, usize)> = data
            .labeled()
            .filter_map(|i| i.label.map(|l| (l1_normalized(&i.features), l)))
            .collect();
        let promote = 1.0 + self.epsilon;
        let demote = 1.0 - self.epsilon;

        let mut weights = Array2::from_elem((data.num_labels(), data.num_features()), 1.0);
        let mut order: Vec<usize> = (0..examples.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);

        for epoch in 0..self.max_iterations {
            order.shuffle(&mut rng);
            let mut mistakes = 0usize;
            for &idx in &order {
                let (features, label) = &examples[idx];
                let scores = winnow_scores(&weights, features);
                let predicted = match argmax(&scores) {
                    Some(p) => p,
                    None => continue,
                };
                if predicted == *label {
                    continue;
                }
                mistakes += 1;
                for &(f, _) in features {
                    weights[[*label, f]] *= promote;
                    weights[[predicted, f]] *= demote;
                }
            }
            log::trace!("BalancedWinnow epoch {}: {} mistakes", epoch, mistakes);
            if mistakes == 0 {
                break;
            }
        }

        Ok(Classifier::BalancedWinnow(BalancedWinnowModel {
            feature_alphabet: data.data_alphabet().clone(),
            label_alphabet: data.target_alphabet().clone(),
            weights,
        }))
    }

    fn name(&self) -> &str {
        "BalancedWinnow"
    }
}
