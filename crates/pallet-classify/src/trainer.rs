//! One-shot and incremental training.
//!
//! Every successful call yields a `ModelContainer` pairing the strategy that
//! did the work with the model it produced. Failed calls never touch
//! containers handed out earlier.
use std::sync::{Arc, MutexGuard};
use std::time::Instant;

use crate::config::AlgorithmId;
use crate::data_handling::InstanceList;
use crate::error::{ClassifyError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::factory::AlgorithmRegistry;
use crate::models::strategy::{SharedStrategy, TrainingStrategy};

/// A trained model together with the strategy that produced it.
///
/// Both halves are set at construction and never replaced.
#[derive(Debug, Clone)]
pub struct ModelContainer {
    strategy: SharedStrategy,
    classifier: Arc<Classifier>,
}

impl ModelContainer {
    pub fn new(strategy: SharedStrategy, classifier: Classifier) -> Self {
        ModelContainer {
            strategy,
            classifier: Arc::new(classifier),
        }
    }

    /// Assembles a container from optional halves, rejecting a missing one.
    pub fn from_parts(
        strategy: Option<SharedStrategy>,
        classifier: Option<Classifier>,
    ) -> Result<Self> {
        let strategy = strategy.ok_or(ClassifyError::MissingStrategy)?;
        let classifier = classifier.ok_or(ClassifyError::MissingModel)?;
        Ok(Self::new(strategy, classifier))
    }

    pub fn strategy(&self) -> &SharedStrategy {
        &self.strategy
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Identifier of the strategy held by this container.
    pub fn algorithm(&self) -> Result<AlgorithmId> {
        let strategy = lock_strategy(&self.strategy)?;
        AlgorithmRegistry::identify(Some(&*strategy))
    }
}

pub(crate) fn lock_strategy(strategy: &SharedStrategy) -> Result<MutexGuard<'_, TrainingStrategy>> {
    strategy
        .lock()
        .map_err(|_| ClassifyError::TrainingFailed("training strategy lock poisoned".to_string()))
}

/// Drives the registry and the strategies.
#[derive(Debug, Clone, Default)]
pub struct TrainingCoordinator {
    registry: AlgorithmRegistry,
}

impl TrainingCoordinator {
    pub fn new(registry: AlgorithmRegistry) -> Self {
        TrainingCoordinator { registry }
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    /// Builds a strategy for `algorithm` and trains it on `dataset`.
    pub fn train(
        &self,
        dataset: Option<&InstanceList>,
        algorithm: AlgorithmId,
    ) -> Result<ModelContainer> {
        let dataset = dataset.ok_or(ClassifyError::MissingDataset)?;

        let mut strategy = self
            .registry
            .construct(algorithm)
            .map_err(|e| ClassifyError::TrainingFailed(e.to_string()))?;

        log::info!(
            "Training {} on {} instances",
            algorithm,
            dataset.len()
        );
        dataset.log_summary();
        let start_time = Instant::now();

        let classifier = strategy.train(dataset).map_err(into_training_failure)?;

        log::info!("{} trained in {:?}", algorithm, start_time.elapsed());
        Ok(ModelContainer::new(strategy.into_shared(), classifier))
    }

    /// Updates an already trained strategy with `dataset`.
    ///
    /// The returned container shares `strategy` with every earlier container
    /// of the same lineage; only NaiveBayes strategies are accepted.
    pub fn train_incremental(
        &self,
        strategy: Option<&SharedStrategy>,
        dataset: Option<&InstanceList>,
    ) -> Result<ModelContainer> {
        let shared = strategy.ok_or(ClassifyError::MissingStrategy)?;
        let dataset = dataset.ok_or(ClassifyError::MissingDataset)?;

        let mut guard = lock_strategy(shared)?;
        let algorithm = AlgorithmRegistry::identify(Some(&*guard))?;
        if !algorithm.supports_incremental() {
            return Err(ClassifyError::IncrementalUnsupported(algorithm));
        }

        log::info!(
            "Incrementally training {} with {} instances",
            algorithm,
            dataset.len()
        );
        dataset.log_summary();
        let start_time = Instant::now();

        let classifier = guard
            .train_incremental(dataset)
            .map_err(into_training_failure)?;
        drop(guard);

        log::info!("{} updated in {:?}", algorithm, start_time.elapsed());
        Ok(ModelContainer::new(Arc::clone(shared), classifier))
    }
}

fn into_training_failure(err: ClassifyError) -> ClassifyError {
    match err {
        ClassifyError::TrainingFailed(_) | ClassifyError::IncrementalUnsupported(_) => err,
        other => ClassifyError::TrainingFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_requires_both_halves() {
        let strategy = AlgorithmRegistry::default()
            .construct(AlgorithmId::NaiveBayes)
            .unwrap()
            .into_shared();
        assert!(matches!(
            ModelContainer::from_parts(Some(strategy), None),
            Err(ClassifyError::MissingModel)
        ));

        let mut data = InstanceList::new();
        data.push_text("a", Some("x"), "one");
        let mut nb = AlgorithmRegistry::default()
            .construct(AlgorithmId::NaiveBayes)
            .unwrap();
        let classifier = nb.train(&data).unwrap();
        assert!(matches!(
            ModelContainer::from_parts(None, Some(classifier)),
            Err(ClassifyError::MissingStrategy)
        ));
    }

    #[test]
    fn test_poisoned_strategy_is_training_failure() {
        let strategy = AlgorithmRegistry::default()
            .construct(AlgorithmId::NaiveBayes)
            .unwrap()
            .into_shared();
        let held = Arc::clone(&strategy);
        let _ = std::thread::spawn(move || {
            let _guard = held.lock().unwrap();
            panic!("worker died holding the strategy");
        })
        .join();
        assert!(strategy.is_poisoned());

        assert!(matches!(
            lock_strategy(&strategy),
            Err(ClassifyError::TrainingFailed(_))
        ));
        let mut data = InstanceList::new();
        data.push_text("a", Some("x"), "one");
        assert!(matches!(
            TrainingCoordinator::default().train_incremental(Some(&strategy), Some(&data)),
            Err(ClassifyError::TrainingFailed(_))
        ));
    }

    #[test]
    fn test_unassigned_is_training_failure() {
        let mut data = InstanceList::new();
        data.push_text("a", Some("x"), "one");
        let coordinator = TrainingCoordinator::default();
        assert!(matches!(
            coordinator.train(Some(&data), AlgorithmId::Unassigned),
            Err(ClassifyError::TrainingFailed(_))
        ));
    }
}
