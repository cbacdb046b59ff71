//! Maximum-entropy (multinomial logistic) trainers.
//!
//! All four variants produce the same `MaxEntModel`: a `[label, feature + 1]`
//! weight matrix whose last column is the bias. They differ only in the
//! objective maximised by the shared gradient-ascent loop.
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data_handling::{Alphabet, Instance, InstanceList};
use crate::error::{ClassifyError, Result};
use crate::models::classifier_trait::{Classifier, ClassifierModel, ClassifierTrainer};
use crate::models::utils::{check_dim, log_sum_exp, require_labeled, softmax_in_place};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxEntModel {
    feature_alphabet: Alphabet,
    label_alphabet: Alphabet,
    weights: Array2<f64>,
}

impl MaxEntModel {
    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }
}

impl ClassifierModel for MaxEntModel {
    fn feature_alphabet(&self) -> &Alphabet {
        &self.feature_alphabet
    }

    fn label_alphabet(&self) -> &Alphabet {
        &self.label_alphabet
    }

    fn label_scores(&self, features: &[(usize, f64)]) -> Vec<f64> {
        let mut scores = raw_scores(&self.weights, features);
        softmax_in_place(&mut scores);
        scores
    }

    fn check_shape(&self) -> Result<()> {
        check_dim("MaxEnt weight rows", self.weights.nrows(), self.label_alphabet.len())?;
        // the extra column is the bias
        check_dim(
            "MaxEnt weight columns",
            self.weights.ncols(),
            self.feature_alphabet.len() + 1,
        )
    }

    fn name(&self) -> &str {
        "MaxEnt"
    }
}

fn raw_scores(weights: &Array2<f64>, features: &[(usize, f64)]) -> Vec<f64> {
    let bias = weights.ncols() - 1;
    (0..weights.nrows())
        .map(|label| {
            features
                .iter()
                .filter(|&&(f, _)| f < bias)
                .fold(weights[[label, bias]], |acc, &(f, v)| acc + v * weights[[label, f]])
        })
        .collect()
}

fn add_scaled(grad: &mut Array2<f64>, label: usize, features: &[(usize, f64)], coef: f64) {
    let bias = grad.ncols() - 1;
    for &(f, v) in features {
        if f < bias {
            grad[[label, f]] += coef * v;
        }
    }
    grad[[label, bias]] += coef;
}

/// Adds the Gaussian log-prior and its gradient, scaled by `1 / n`.
fn gaussian_prior(weights: &Array2<f64>, grad: &mut Array2<f64>, variance: f64, n: f64) -> f64 {
    let scale = 1.0 / (variance * n);
    grad.scaled_add(-scale, weights);
    -0.5 * scale * weights.iter().map(|w| w * w).sum::<f64>()
}

/// Hyperbolic log-prior `-(slope / sharpness) * ln cosh(sharpness * w)`, scaled by `1 / n`.
fn hyperbolic_prior(
    weights: &Array2<f64>,
    grad: &mut Array2<f64>,
    slope: f64,
    sharpness: f64,
    n: f64,
) -> f64 {
    let mut value = 0.0;
    for (w, g) in weights.iter().zip(grad.iter_mut()) {
        let x = (sharpness * w).abs();
        let ln_cosh = x + (-2.0 * x).exp().ln_1p() - std::f64::consts::LN_2;
        value -= slope / sharpness * ln_cosh / n;
        *g -= slope * (sharpness * w).tanh() / n;
    }
    value
}

/// Gradient ascent with step halving whenever the objective drops.
fn ascend<F>(weights: &mut Array2<f64>, iterations: usize, learning_rate: f64, mut evaluate: F) -> f64
where
    F: FnMut(&Array2<f64>) -> (f64, Array2<f64>),
{
    let mut step = learning_rate;
    let (mut value, mut grad) = evaluate(&*weights);
    for iteration in 0..iterations {
        let candidate = &*weights + &(&grad * step);
        let (next_value, next_grad) = evaluate(&candidate);
        if next_value.is_finite() && next_value >= value {
            let improvement = next_value - value;
            *weights = candidate;
            value = next_value;
            grad = next_grad;
            log::trace!("iteration {}: objective {:.6}", iteration, value);
            if improvement < 1e-10 {
                break;
            }
        } else {
            step *= 0.5;
            if step < 1e-10 {
                break;
            }
        }
    }
    value
}

fn check_optimizer(iterations: usize, learning_rate: f64, trainer: &str) -> Result<()> {
    if iterations == 0 || !(learning_rate > 0.0 && learning_rate.is_finite()) {
        return Err(ClassifyError::TrainingFailed(format!(
            "{} needs positive iterations and learning rate",
            trainer
        )));
    }
    Ok(())
}

fn check_variance(variance: f64, trainer: &str) -> Result<()> {
    if !(variance > 0.0 && variance.is_finite()) {
        return Err(ClassifyError::TrainingFailed(format!(
            "{} needs a positive prior variance, got {}",
            trainer, variance
        )));
    }
    Ok(())
}

fn labeled_pairs(data: &InstanceList) -> Vec<(&Instance, usize)> {
    data.labeled()
        .filter_map(|i| i.label.map(|l| (i, l)))
        .collect()
}

fn fresh_weights(data: &InstanceList) -> Array2<f64> {
    Array2::zeros((data.num_labels(), data.num_features() + 1))
}

fn into_classifier(data: &InstanceList, weights: Array2<f64>) -> Classifier {
    Classifier::MaxEnt(MaxEntModel {
        feature_alphabet: data.data_alphabet().clone(),
        label_alphabet: data.target_alphabet().clone(),
        weights,
    })
}

/// Conditional log-likelihood of the labeled pairs and its gradient, both scaled by `1 / n`.
fn conditional_likelihood(
    weights: &Array2<f64>,
    grad: &mut Array2<f64>,
    pairs: &[(&Instance, usize)],
) -> f64 {
    let n = pairs.len() as f64;
    let mut value = 0.0;
    for &(instance, label) in pairs {
        let mut probs = raw_scores(weights, &instance.features);
        softmax_in_place(&mut probs);
        value += probs[label].max(f64::MIN_POSITIVE).ln() / n;
        for (l, p) in probs.iter().enumerate() {
            let target = if l == label { 1.0 } else { 0.0 };
            add_scaled(grad, l, &instance.features, (target - p) / n);
        }
    }
    value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxEntTrainer {
    gaussian_prior_variance: f64,
    iterations: usize,
    learning_rate: f64,
}

impl MaxEntTrainer {
    pub fn new(gaussian_prior_variance: f64, iterations: usize, learning_rate: f64) -> Self {
        MaxEntTrainer {
            gaussian_prior_variance,
            iterations,
            learning_rate,
        }
    }
}

impl ClassifierTrainer for MaxEntTrainer {
    fn train(&mut self, data: &InstanceList) -> Result<Classifier> {
        require_labeled(data, self.name())?;
        check_optimizer(self.iterations, self.learning_rate, self.name())?;
        check_variance(self.gaussian_prior_variance, self.name())?;

        let pairs = labeled_pairs(data);
        let n = pairs.len() as f64;
        let variance = self.gaussian_prior_variance;
        let mut weights = fresh_weights(data);
        let value = ascend(&mut weights, self.iterations, self.learning_rate, |w| {
            let mut grad = Array2::zeros(w.raw_dim());
            let value = conditional_likelihood(w, &mut grad, &pairs)
                + gaussian_prior(w, &mut grad, variance, n);
            (value, grad)
        });
        log::debug!("MaxEnt converged to objective {:.6}", value);
        Ok(into_classifier(data, weights))
    }

    fn name(&self) -> &str {
        "MaxEnt"
    }
}

/// Ranks the true label above every competitor with a pairwise logistic loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankMaxEntTrainer {
    gaussian_prior_variance: f64,
    iterations: usize,
    learning_rate: f64,
}

impl RankMaxEntTrainer {
    pub fn new(gaussian_prior_variance: f64, iterations: usize, learning_rate: f64) -> Self {
        RankMaxEntTrainer {
            gaussian_prior_variance,
            iterations,
            learning_rate,
        }
    }
}

impl ClassifierTrainer for RankMaxEntTrainer {
    fn train(&mut self, data: &InstanceList) -> Result<Classifier> {
        require_labeled(data, self.name())?;
        check_optimizer(self.iterations, self.learning_rate, self.name())?;
        check_variance(self.gaussian_prior_variance, self.name())?;

        let pairs = labeled_pairs(data);
        let n = pairs.len() as f64;
        let comparisons = (pairs.len() * data.num_labels().saturating_sub(1)).max(1) as f64;
        let variance = self.gaussian_prior_variance;
        let mut weights = fresh_weights(data);
        let value = ascend(&mut weights, self.iterations, self.learning_rate, |w| {
            let mut grad = Array2::zeros(w.raw_dim());
            let mut value = 0.0;
            for &(instance, label) in &pairs {
                let scores = raw_scores(w, &instance.features);
                for (other, score) in scores.iter().enumerate() {
                    if other == label {
                        continue;
                    }
                    let margin = scores[label] - score;
                    // ln sigmoid(margin) = -ln(1 + e^-margin)
                    value -= log_sum_exp(&[0.0, -margin]) / comparisons;
                    let slack = 1.0 / (1.0 + margin.exp());
                    add_scaled(&mut grad, label, &instance.features, slack / comparisons);
                    add_scaled(&mut grad, other, &instance.features, -slack / comparisons);
                }
            }
            value += gaussian_prior(w, &mut grad, variance, n);
            (value, grad)
        });
        log::debug!("RankMaxEnt converged to objective {:.6}", value);
        Ok(into_classifier(data, weights))
    }

    fn name(&self) -> &str {
        "RankMaxEnt"
    }
}

/// Generalized-expectation training.
///
/// Label distributions observed for frequent features on the labeled
/// instances become targets; the model's expected label distribution over
/// every instance (labeled or not) carrying the feature is fitted to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxEntGeTrainer {
    gaussian_prior_variance: f64,
    iterations: usize,
    learning_rate: f64,
    min_feature_count: usize,
}

struct Constraint {
    feature: usize,
    target: Vec<f64>,
    instances: Vec<usize>,
}

impl MaxEntGeTrainer {
    pub fn new(
        gaussian_prior_variance: f64,
        iterations: usize,
        learning_rate: f64,
        min_feature_count: usize,
    ) -> Self {
        MaxEntGeTrainer {
            gaussian_prior_variance,
            iterations,
            learning_rate,
            min_feature_count,
        }
    }

    fn constraints(&self, data: &InstanceList) -> Vec<Constraint> {
        let num_labels = data.num_labels();
        let mut label_counts = vec![vec![0.0; num_labels]; data.num_features()];
        let mut carriers: Vec<Vec<usize>> = vec![Vec::new(); data.num_features()];
        for (idx, instance) in data.instances().iter().enumerate() {
            for &(f, _) in &instance.features {
                carriers[f].push(idx);
                if let Some(label) = instance.label {
                    label_counts[f][label] += 1.0;
                }
            }
        }

        label_counts
            .into_iter()
            .zip(carriers)
            .enumerate()
            .filter_map(|(feature, (counts, instances))| {
                let total: f64 = counts.iter().sum();
                if total < self.min_feature_count.max(1) as f64 {
                    return None;
                }
                // light smoothing keeps log m_f(y) finite for unseen labels
                let smoothing = 0.01;
                let denom = total + smoothing * num_labels as f64;
                let target = counts.iter().map(|c| (c + smoothing) / denom).collect();
                Some(Constraint {
                    feature,
                    target,
                    instances,
                })
            })
            .collect()
    }
}

impl ClassifierTrainer for MaxEntGeTrainer {
    fn train(&mut self, data: &InstanceList) -> Result<Classifier> {
        if data.num_labeled() == 0 || data.num_labels() == 0 {
            return Err(ClassifyError::TrainingFailed(
                "MaxEntGE needs labeled instances to derive constraints".to_string(),
            ));
        }
        check_optimizer(self.iterations, self.learning_rate, self.name())?;
        check_variance(self.gaussian_prior_variance, self.name())?;

        let constraints = self.constraints(data);
        if constraints.is_empty() {
            return Err(ClassifyError::TrainingFailed(format!(
                "MaxEntGE found no feature occurring at least {} times",
                self.min_feature_count
            )));
        }
        log::debug!("MaxEntGE uses {} feature constraints", constraints.len());

        let instances = data.instances();
        let num_labels = data.num_labels();
        let n = constraints.len() as f64;
        let variance = self.gaussian_prior_variance;
        let mut weights = fresh_weights(data);
        let value = ascend(&mut weights, self.iterations, self.learning_rate, |w| {
            let posteriors: Vec<Vec<f64>> = instances
                .iter()
                .map(|i| {
                    let mut p = raw_scores(w, &i.features);
                    softmax_in_place(&mut p);
                    p
                })
                .collect();

            // per-instance coefficient c_y = sum_f t_f(y) / (m_f(y) |I_f|)
            let mut coefficients = vec![vec![0.0; num_labels]; instances.len()];
            let mut value = 0.0;
            for constraint in &constraints {
                let size = constraint.instances.len() as f64;
                let mut expectation = vec![0.0; num_labels];
                for &idx in &constraint.instances {
                    for (y, p) in posteriors[idx].iter().enumerate() {
                        expectation[y] += p / size;
                    }
                }
                for y in 0..num_labels {
                    let m = expectation[y].max(f64::MIN_POSITIVE);
                    value += constraint.target[y] * m.ln() / n;
                    for &idx in &constraint.instances {
                        coefficients[idx][y] += constraint.target[y] / (m * size * n);
                    }
                }
                log::trace!("constraint on feature {} fitted", constraint.feature);
            }

            let mut grad = Array2::zeros(w.raw_dim());
            for ((instance, probs), coef) in instances.iter().zip(&posteriors).zip(&coefficients) {
                let mean: f64 = probs.iter().zip(coef).map(|(p, c)| p * c).sum();
                for (l, p) in probs.iter().enumerate() {
                    let g = p * (coef[l] - mean);
                    if g != 0.0 {
                        add_scaled(&mut grad, l, &instance.features, g);
                    }
                }
            }
            value += gaussian_prior(w, &mut grad, variance, n);
            (value, grad)
        });
        log::debug!("MaxEntGE converged to objective {:.6}", value);
        Ok(into_classifier(data, weights))
    }

    fn name(&self) -> &str {
        "MaxEntGE"
    }
}

/// Multi-conditional MaxEnt: conditional likelihood plus a weighted
/// generative term log p(features | label), under a hyperbolic prior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McMaxEntTrainer {
    iterations: usize,
    learning_rate: f64,
    generative_weight: f64,
    hyperbolic_slope: f64,
    hyperbolic_sharpness: f64,
}

impl McMaxEntTrainer {
    pub fn new(
        iterations: usize,
        learning_rate: f64,
        generative_weight: f64,
        hyperbolic_slope: f64,
        hyperbolic_sharpness: f64,
    ) -> Self {
        McMaxEntTrainer {
            iterations,
            learning_rate,
            generative_weight,
            hyperbolic_slope,
            hyperbolic_sharpness,
        }
    }
}

impl ClassifierTrainer for McMaxEntTrainer {
    fn train(&mut self, data: &InstanceList) -> Result<Classifier> {
        require_labeled(data, self.name())?;
        check_optimizer(self.iterations, self.learning_rate, self.name())?;
        if !(self.hyperbolic_sharpness > 0.0) || self.hyperbolic_slope < 0.0 {
            return Err(ClassifyError::TrainingFailed(
                "MCMaxEnt needs a positive hyperbolic sharpness and non-negative slope".to_string(),
            ));
        }

        let pairs = labeled_pairs(data);
        let n = pairs.len() as f64;
        let num_features = data.num_features();

        let mut feature_totals = Array2::<f64>::zeros((data.num_labels(), num_features));
        for &(instance, label) in &pairs {
            for &(f, v) in &instance.features {
                feature_totals[[label, f]] += v;
            }
        }
        let label_totals: Vec<f64> = feature_totals.rows().into_iter().map(|r| r.sum()).collect();

        let gen_weight = self.generative_weight;
        let (slope, sharpness) = (self.hyperbolic_slope, self.hyperbolic_sharpness);
        let mut weights = fresh_weights(data);
        let value = ascend(&mut weights, self.iterations, self.learning_rate, |w| {
            let mut grad = Array2::zeros(w.raw_dim());
            let mut value = conditional_likelihood(w, &mut grad, &pairs);

            if gen_weight > 0.0 && num_features > 0 {
                for (label, &total) in label_totals.iter().enumerate() {
                    if total <= 0.0 {
                        continue;
                    }
                    let mut feature_probs: Vec<f64> =
                        (0..num_features).map(|f| w[[label, f]]).collect();
                    let lse = log_sum_exp(&feature_probs);
                    softmax_in_place(&mut feature_probs);
                    for (f, p) in feature_probs.iter().enumerate() {
                        let count = feature_totals[[label, f]];
                        value += gen_weight * count * w[[label, f]] / n;
                        grad[[label, f]] += gen_weight * (count - total * p) / n;
                    }
                    value -= gen_weight * total * lse / n;
                }
            }

            value += hyperbolic_prior(w, &mut grad, slope, sharpness, n);
            (value, grad)
        });
        log::debug!("MCMaxEnt converged to objective {:.6}", value);
        Ok(into_classifier(data, weights))
    }

    fn name(&self) -> &str {
        "MCMaxEnt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> InstanceList {
        let mut list = InstanceList::new();
        list.push_text("a1", Some("finance"), "stock market shares price");
        list.push_text("a2", Some("finance"), "bank interest market rate");
        list.push_text("a3", Some("finance"), "shares price bank");
        list.push_text("b1", Some("sport"), "match goal team player");
        list.push_text("b2", Some("sport"), "team coach goal win");
        list.push_text("b3", Some("sport"), "player match win");
        list
    }

    #[test]
    fn test_maxent_separates_topics() {
        let data = topics();
        let mut trainer = MaxEntTrainer::new(1.0, 200, 0.5);
        let classifier = trainer.train(&data).unwrap();
        assert_eq!(classifier.accuracy(&data), Some(1.0));
        let labeling = classifier.classify_features(vec![("goal", 1.0), ("team", 1.0)]);
        assert_eq!(labeling.best_label(), Some("sport"));
    }

    #[test]
    fn test_weights_without_bias_column_are_invalid() {
        let classifier = MaxEntTrainer::new(1.0, 20, 0.5).train(&topics()).unwrap();
        assert!(classifier.validate().is_ok());

        let model: MaxEntModel = serde_json::from_value(serde_json::json!({
            "feature_alphabet": ["goal"],
            "label_alphabet": ["sport", "politics"],
            "weights": {"v": 1, "dim": [2, 0], "data": []}
        }))
        .unwrap();
        let err = Classifier::MaxEnt(model).validate().unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidModel(_)));
        assert!(err.to_string().contains("MaxEnt weight columns"));
    }

    #[test]
    fn test_rank_maxent_separates_topics() {
        let data = topics();
        let mut trainer = RankMaxEntTrainer::new(1.0, 200, 0.5);
        let classifier = trainer.train(&data).unwrap();
        assert_eq!(classifier.accuracy(&data), Some(1.0));
    }

    #[test]
    fn test_mc_maxent_separates_topics() {
        let data = topics();
        let mut trainer = McMaxEntTrainer::new(200, 0.5, 0.1, 0.2, 10.0);
        let classifier = trainer.train(&data).unwrap();
        assert_eq!(classifier.accuracy(&data), Some(1.0));
    }

    #[test]
    fn test_maxent_ge_uses_constraints() {
        let mut data = topics();
        data.push_text("u1", None, "market price shares");
        data.push_text("u2", None, "goal match");
        let mut trainer = MaxEntGeTrainer::new(10.0, 200, 0.5, 2);
        let classifier = trainer.train(&data).unwrap();
        let labeling = classifier.classify_features(vec![("market", 1.0), ("bank", 1.0)]);
        assert_eq!(labeling.best_label(), Some("finance"));
    }

    #[test]
    fn test_maxent_ge_without_constraints_fails() {
        let mut data = InstanceList::new();
        data.push_text("a", Some("x"), "alpha");
        data.push_text("b", Some("y"), "beta");
        let mut trainer = MaxEntGeTrainer::new(1.0, 10, 0.5, 5);
        assert!(matches!(
            trainer.train(&data),
            Err(ClassifyError::TrainingFailed(_))
        ));
    }

    #[test]
    fn test_invalid_optimizer_settings() {
        let mut trainer = MaxEntTrainer::new(1.0, 0, 0.5);
        assert!(trainer.train(&topics()).is_err());
        let mut trainer = MaxEntTrainer::new(-1.0, 10, 0.5);
        assert!(trainer.train(&topics()).is_err());
    }
}
