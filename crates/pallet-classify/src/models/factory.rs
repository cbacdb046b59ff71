use std::convert::TryFrom;

use crate::config::{AlgorithmId, AlgorithmParams};
use crate::error::{ClassifyError, Result};
use crate::models::decision_tree::{C45Trainer, DecisionTreeTrainer};
use crate::models::maxent::{MaxEntGeTrainer, MaxEntTrainer, McMaxEntTrainer, RankMaxEntTrainer};
use crate::models::naive_bayes::{NaiveBayesEmTrainer, NaiveBayesTrainer};
use crate::models::strategy::TrainingStrategy;
use crate::models::winnow::BalancedWinnowTrainer;

/// Maps algorithm identifiers to fresh training strategies and back.
///
/// `construct` is strict and rejects anything that is not a real algorithm.
/// `identify` never fails on a live strategy: instances it does not know
/// (external trainers) are reported as `Unassigned`.
#[derive(Debug, Clone, Default)]
pub struct AlgorithmRegistry {
    params: AlgorithmParams,
}

impl AlgorithmRegistry {
    pub fn new(params: AlgorithmParams) -> Self {
        AlgorithmRegistry { params }
    }

    pub fn params(&self) -> &AlgorithmParams {
        &self.params
    }

    /// Build an untrained strategy for `algorithm`.
    pub fn construct(&self, algorithm: AlgorithmId) -> Result<TrainingStrategy> {
        build_strategy(algorithm, &self.params)
    }

    /// Build an untrained strategy from a raw algorithm code.
    pub fn construct_code(&self, code: u8) -> Result<TrainingStrategy> {
        self.construct(AlgorithmId::try_from(code)?)
    }

    /// Recover the identifier of a live strategy.
    pub fn identify(strategy: Option<&TrainingStrategy>) -> Result<AlgorithmId> {
        strategy
            .map(TrainingStrategy::algorithm)
            .ok_or(ClassifyError::NullStrategy)
    }
}

/// Build a training strategy from an identifier and hyper-parameters.
pub fn build_strategy(algorithm: AlgorithmId, p: &AlgorithmParams) -> Result<TrainingStrategy> {
    let strategy = match algorithm {
        AlgorithmId::NaiveBayes => TrainingStrategy::NaiveBayes(NaiveBayesTrainer::new(p.alpha)),
        AlgorithmId::MaxEnt => TrainingStrategy::MaxEnt(MaxEntTrainer::new(
            p.gaussian_prior_variance,
            p.iterations,
            p.learning_rate,
        )),
        AlgorithmId::DecisionTree => {
            TrainingStrategy::DecisionTree(DecisionTreeTrainer::new(p.max_depth, p.min_info_gain))
        }
        AlgorithmId::C45 => TrainingStrategy::C45(C45Trainer::new(
            p.max_depth,
            p.min_leaf_instances,
            p.min_info_gain,
            p.confidence_factor,
        )),
        AlgorithmId::BalancedWinnow => TrainingStrategy::BalancedWinnow(
            BalancedWinnowTrainer::new(p.epsilon, p.max_iterations, p.seed),
        ),
        AlgorithmId::RankMaxEnt => TrainingStrategy::RankMaxEnt(RankMaxEntTrainer::new(
            p.gaussian_prior_variance,
            p.iterations,
            p.learning_rate,
        )),
        AlgorithmId::NaiveBayesEm => TrainingStrategy::NaiveBayesEm(NaiveBayesEmTrainer::new(
            p.alpha,
            p.em_iterations,
            p.unlabeled_weight,
        )),
        AlgorithmId::MaxEntGe => TrainingStrategy::MaxEntGe(MaxEntGeTrainer::new(
            p.gaussian_prior_variance,
            p.iterations,
            p.learning_rate,
            p.ge_min_feature_count,
        )),
        AlgorithmId::McMaxEnt => TrainingStrategy::McMaxEnt(McMaxEntTrainer::new(
            p.iterations,
            p.learning_rate,
            p.generative_weight,
            p.hyperbolic_slope,
            p.hyperbolic_sharpness,
        )),
        AlgorithmId::Unassigned => {
            return Err(ClassifyError::UnknownAlgorithm(algorithm.to_string()));
        }
    };
    log::debug!("Constructed {} training strategy", algorithm);
    Ok(strategy)
}
