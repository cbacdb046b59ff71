mod common;

use std::sync::Arc;

use pallet_classify::models::ClassifierTrainer;
use pallet_classify::{
    AlgorithmId, AlgorithmRegistry, Classifier, ClassifyError, InstanceList, ModelContainer,
    TrainingCoordinator, TrainingStrategy,
};

#[test]
fn test_missing_dataset_for_every_algorithm() {
    let coordinator = TrainingCoordinator::default();
    for id in AlgorithmId::ALL {
        assert!(matches!(
            coordinator.train(None, id),
            Err(ClassifyError::MissingDataset)
        ));
    }
    assert!(matches!(
        coordinator.train(None, AlgorithmId::Unassigned),
        Err(ClassifyError::MissingDataset)
    ));
}

#[test]
fn test_every_algorithm_trains() {
    let data = common::mail();
    let coordinator = TrainingCoordinator::default();
    for id in AlgorithmId::ALL {
        let container = coordinator.train(Some(&data), id).unwrap();
        assert_eq!(container.algorithm().unwrap(), id);
        assert_eq!(container.classifier().labels(), &["spam", "ham"]);
        let accuracy = container.classifier().accuracy(&data).unwrap();
        assert!(accuracy >= 0.5, "{} accuracy {}", id, accuracy);
    }
}

#[test]
fn test_unlabeled_only_dataset_fails() {
    let mut data = InstanceList::new();
    data.push_text("u1", None, "nothing to learn from");
    let result = TrainingCoordinator::default().train(Some(&data), AlgorithmId::MaxEnt);
    assert!(matches!(result, Err(ClassifyError::TrainingFailed(_))));
}

#[test]
fn test_incremental_requires_inputs() {
    let coordinator = TrainingCoordinator::default();
    let data = common::mail();
    assert!(matches!(
        coordinator.train_incremental(None, Some(&data)),
        Err(ClassifyError::MissingStrategy)
    ));

    let strategy = AlgorithmRegistry::default()
        .construct(AlgorithmId::NaiveBayes)
        .unwrap()
        .into_shared();
    assert!(matches!(
        coordinator.train_incremental(Some(&strategy), None),
        Err(ClassifyError::MissingDataset)
    ));
}

#[test]
fn test_incremental_rejected_for_maxent() {
    let strategy = AlgorithmRegistry::default()
        .construct(AlgorithmId::MaxEnt)
        .unwrap()
        .into_shared();
    let result =
        TrainingCoordinator::default().train_incremental(Some(&strategy), Some(&common::mail()));
    assert!(matches!(
        result,
        Err(ClassifyError::IncrementalUnsupported(AlgorithmId::MaxEnt))
    ));
}

#[test]
fn test_incremental_rejected_for_every_other_algorithm() {
    let coordinator = TrainingCoordinator::default();
    let data = common::mail();
    for id in AlgorithmId::ALL.iter().copied().filter(|id| !id.supports_incremental()) {
        let container = coordinator.train(Some(&data), id).unwrap();
        assert!(matches!(
            coordinator.train_incremental(Some(container.strategy()), Some(&data)),
            Err(ClassifyError::IncrementalUnsupported(found)) if found == id
        ));
    }
}

#[test]
fn test_incremental_on_fresh_naive_bayes() {
    let strategy = AlgorithmRegistry::default()
        .construct(AlgorithmId::NaiveBayes)
        .unwrap()
        .into_shared();
    let prior = match &*strategy.lock().unwrap() {
        TrainingStrategy::NaiveBayes(trainer) => Classifier::NaiveBayes(trainer.estimate()),
        other => panic!("unexpected strategy {}", other.name()),
    };
    assert!(prior.labels().is_empty());

    let container = TrainingCoordinator::default()
        .train_incremental(Some(&strategy), Some(&common::mail()))
        .unwrap();
    assert!(Arc::ptr_eq(container.strategy(), &strategy));
    assert_eq!(container.classifier().labels(), &["spam", "ham"]);
    assert_ne!(container.classifier(), &prior);
}

#[test]
fn test_incremental_keeps_lineage_and_changes_model() {
    let coordinator = TrainingCoordinator::default();
    let a = coordinator
        .train(Some(&common::mail()), AlgorithmId::NaiveBayes)
        .unwrap();
    let b = coordinator
        .train_incremental(Some(a.strategy()), Some(&common::mail_followup()))
        .unwrap();

    assert!(Arc::ptr_eq(a.strategy(), b.strategy()));
    assert_ne!(a.classifier(), b.classifier());
    assert_eq!(a.classifier().labels(), &["spam", "ham"]);
    assert_eq!(b.classifier().labels(), &["spam", "ham", "news"]);

    let labeling = b
        .classifier()
        .classify_features([("headlines", 1.0), ("digest", 1.0)]);
    assert_eq!(labeling.best_label(), Some("news"));
    // the earlier model is untouched
    assert_eq!(a.classifier().classify_features([("headlines", 1.0)]).ranked().len(), 2);
}

#[derive(Debug, Default)]
struct Failing;

impl ClassifierTrainer for Failing {
    fn train(&mut self, _data: &InstanceList) -> pallet_classify::Result<Classifier> {
        Err(ClassifyError::InvalidDataset("refused".to_string()))
    }
}

#[test]
fn test_external_trainer_cannot_update() {
    let strategy = TrainingStrategy::external(Failing).into_shared();
    let result =
        TrainingCoordinator::default().train_incremental(Some(&strategy), Some(&common::mail()));
    assert!(matches!(
        result,
        Err(ClassifyError::IncrementalUnsupported(AlgorithmId::Unassigned))
    ));
}

#[test]
fn test_container_requires_both_parts() {
    assert!(matches!(
        ModelContainer::from_parts(None, None),
        Err(ClassifyError::MissingStrategy)
    ));
}
