use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::AlgorithmId;
use crate::data_handling::InstanceList;
use crate::error::{ClassifyError, Result};
use crate::models::classifier_trait::{Classifier, ClassifierTrainer};
use crate::models::decision_tree::{C45Trainer, DecisionTreeTrainer};
use crate::models::maxent::{MaxEntGeTrainer, MaxEntTrainer, McMaxEntTrainer, RankMaxEntTrainer};
use crate::models::naive_bayes::{NaiveBayesEmTrainer, NaiveBayesTrainer};
use crate::models::winnow::BalancedWinnowTrainer;

/// Handle to a strategy that incremental training mutates in place.
///
/// Containers produced from the same lineage share one handle; the lock
/// serializes concurrent updates but callers should still avoid them.
pub type SharedStrategy = Arc<Mutex<TrainingStrategy>>;

/// A training strategy; the variant is the algorithm tag.
#[derive(Debug, Serialize, Deserialize)]
pub enum TrainingStrategy {
    NaiveBayes(NaiveBayesTrainer),
    MaxEnt(MaxEntTrainer),
    DecisionTree(DecisionTreeTrainer),
    C45(C45Trainer),
    BalancedWinnow(BalancedWinnowTrainer),
    RankMaxEnt(RankMaxEntTrainer),
    NaiveBayesEm(NaiveBayesEmTrainer),
    MaxEntGe(MaxEntGeTrainer),
    McMaxEnt(McMaxEntTrainer),
    /// Created outside the registry; trainable but neither identifiable nor persistable.
    #[serde(skip)]
    External(Box<dyn ClassifierTrainer>),
}

impl TrainingStrategy {
    pub fn external<T: ClassifierTrainer + 'static>(trainer: T) -> Self {
        TrainingStrategy::External(Box::new(trainer))
    }

    pub fn algorithm(&self) -> AlgorithmId {
        match self {
            TrainingStrategy::NaiveBayes(_) => AlgorithmId::NaiveBayes,
            TrainingStrategy::MaxEnt(_) => AlgorithmId::MaxEnt,
            TrainingStrategy::DecisionTree(_) => AlgorithmId::DecisionTree,
            TrainingStrategy::C45(_) => AlgorithmId::C45,
            TrainingStrategy::BalancedWinnow(_) => AlgorithmId::BalancedWinnow,
            TrainingStrategy::RankMaxEnt(_) => AlgorithmId::RankMaxEnt,
            TrainingStrategy::NaiveBayesEm(_) => AlgorithmId::NaiveBayesEm,
            TrainingStrategy::MaxEntGe(_) => AlgorithmId::MaxEntGe,
            TrainingStrategy::McMaxEnt(_) => AlgorithmId::McMaxEnt,
            TrainingStrategy::External(_) => AlgorithmId::Unassigned,
        }
    }

    pub fn is_serializable(&self) -> bool {
        !matches!(self, TrainingStrategy::External(_))
    }

    fn trainer(&self) -> &dyn ClassifierTrainer {
        match self {
            TrainingStrategy::NaiveBayes(t) => t,
            TrainingStrategy::MaxEnt(t) => t,
            TrainingStrategy::DecisionTree(t) => t,
            TrainingStrategy::C45(t) => t,
            TrainingStrategy::BalancedWinnow(t) => t,
            TrainingStrategy::RankMaxEnt(t) => t,
            TrainingStrategy::NaiveBayesEm(t) => t,
            TrainingStrategy::MaxEntGe(t) => t,
            TrainingStrategy::McMaxEnt(t) => t,
            TrainingStrategy::External(t) => t.as_ref(),
        }
    }

    fn trainer_mut(&mut self) -> &mut dyn ClassifierTrainer {
        match self {
            TrainingStrategy::NaiveBayes(t) => t,
            TrainingStrategy::MaxEnt(t) => t,
            TrainingStrategy::DecisionTree(t) => t,
            TrainingStrategy::C45(t) => t,
            TrainingStrategy::BalancedWinnow(t) => t,
            TrainingStrategy::RankMaxEnt(t) => t,
            TrainingStrategy::NaiveBayesEm(t) => t,
            TrainingStrategy::MaxEntGe(t) => t,
            TrainingStrategy::McMaxEnt(t) => t,
            TrainingStrategy::External(t) => t.as_mut(),
        }
    }

    pub fn name(&self) -> &str {
        self.trainer().name()
    }

    pub fn train(&mut self, data: &InstanceList) -> Result<Classifier> {
        self.trainer_mut().train(data)
    }

    /// Folds `data` into an already trained strategy. Only NaiveBayes (and
    /// external trainers that implement it) can do this.
    pub fn train_incremental(&mut self, data: &InstanceList) -> Result<Classifier> {
        match self {
            TrainingStrategy::NaiveBayes(t) => t.train_incremental(data),
            TrainingStrategy::External(t) => t.train_incremental(data),
            other => Err(ClassifyError::IncrementalUnsupported(other.algorithm())),
        }
    }

    /// Checks retained training state and that `classifier` is the model family this strategy trains.
    pub fn validate(&self, classifier: &Classifier) -> Result<()> {
        let matches_family = match (self, classifier) {
            (TrainingStrategy::NaiveBayes(_), Classifier::NaiveBayes(_))
            | (TrainingStrategy::NaiveBayesEm(_), Classifier::NaiveBayes(_))
            | (TrainingStrategy::MaxEnt(_), Classifier::MaxEnt(_))
            | (TrainingStrategy::RankMaxEnt(_), Classifier::MaxEnt(_))
            | (TrainingStrategy::MaxEntGe(_), Classifier::MaxEnt(_))
            | (TrainingStrategy::McMaxEnt(_), Classifier::MaxEnt(_))
            | (TrainingStrategy::DecisionTree(_), Classifier::DecisionTree(_))
            | (TrainingStrategy::C45(_), Classifier::DecisionTree(_))
            | (TrainingStrategy::BalancedWinnow(_), Classifier::BalancedWinnow(_))
            | (TrainingStrategy::External(_), _) => true,
            _ => false,
        };
        if !matches_family {
            return Err(ClassifyError::InvalidModel(format!(
                "{} cannot have produced a {} model",
                self.name(),
                classifier.name()
            )));
        }
        if let TrainingStrategy::NaiveBayes(t) = self {
            t.validate()?;
        }
        classifier.validate()
    }

    pub fn into_shared(self) -> SharedStrategy {
        Arc::new(Mutex::new(self))
    }
}
