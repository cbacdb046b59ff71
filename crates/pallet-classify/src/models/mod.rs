pub mod decision_tree;
pub mod maxent;
pub mod naive_bayes;
pub mod utils;
pub mod winnow;

pub mod classifier_trait;
pub mod factory;
pub mod strategy;

pub use classifier_trait::{Classifier, ClassifierModel, ClassifierTrainer, Labeling};
pub use factory::AlgorithmRegistry;
pub use strategy::{SharedStrategy, TrainingStrategy};
