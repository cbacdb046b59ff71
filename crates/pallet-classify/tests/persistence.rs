mod common;

use std::sync::Arc;

use pallet_classify::graph::{vocab, Document, DocumentFormat, Literal, NamedNode};
use pallet_classify::models::ClassifierTrainer;
use pallet_classify::{
    AlgorithmId, AlgorithmRegistry, Classifier, ClassifyError, InstanceList, ModelContainer,
    ModelPersistence, StatementSelection, TrainingCoordinator, TrainingStrategy,
};

fn has_value() -> NamedNode {
    NamedNode::new(vocab::OWL_HAS_VALUE).unwrap()
}

fn store(container: &ModelContainer, subject: &str) -> String {
    let mut document = Document::new();
    ModelPersistence::default()
        .to_statement(&mut document, container, subject)
        .unwrap();
    document.render(DocumentFormat::NTriples)
}

#[test]
fn test_round_trip_preserves_bytes_for_every_algorithm() {
    let data = common::mail();
    let coordinator = TrainingCoordinator::default();
    let persistence = ModelPersistence::default();
    for id in AlgorithmId::ALL {
        let container = coordinator.train(Some(&data), id).unwrap();
        let original = persistence.serialize(&container).unwrap();

        let text = store(&container, "urn:test");
        let restored = persistence
            .from_document(&text, DocumentFormat::NTriples)
            .unwrap();

        assert_eq!(persistence.serialize(&restored).unwrap(), original, "{}", id);
        assert_eq!(restored.algorithm().unwrap(), id);
        assert_eq!(restored.classifier(), container.classifier());
    }
}

#[test]
fn test_statement_shape() {
    let container = TrainingCoordinator::default()
        .train(Some(&common::mail()), AlgorithmId::NaiveBayes)
        .unwrap();
    let mut document = Document::new();
    let statement = ModelPersistence::default()
        .to_statement(&mut document, &container, "urn:test")
        .unwrap();

    assert_eq!(document.len(), 1);
    assert_eq!(statement.predicate, has_value());
    assert_eq!(statement.subject.to_string(), "<urn:test>");
    let literal = statement.object.as_literal().unwrap();
    assert_eq!(literal.datatype(), vocab::XSD_HEX_BINARY);
    assert_eq!(
        literal.as_bytes().unwrap(),
        ModelPersistence::default().serialize(&container).unwrap()
    );
}

#[test]
fn test_no_model_statement() {
    let text = "<urn:test> <http://purl.org/dc/terms/title> \"a model\" .\n";
    let result = ModelPersistence::default().from_document(text, DocumentFormat::NTriples);
    assert!(matches!(result, Err(ClassifyError::NoModelStatement)));

    let result = ModelPersistence::default().from_document("", DocumentFormat::NTriples);
    assert!(matches!(result, Err(ClassifyError::NoModelStatement)));
}

#[test]
fn test_garbage_bytes() {
    let mut document = Document::new();
    document.create_literal_statement(
        NamedNode::new("urn:test").unwrap(),
        has_value(),
        Literal::typed_bytes(b"definitely not a model"),
    );
    let text = document.render(DocumentFormat::NTriples);
    let result = ModelPersistence::default().from_document(&text, DocumentFormat::NTriples);
    assert!(matches!(result, Err(ClassifyError::DeserializationFailed(_))));
}

#[test]
fn test_base64_model_literal_is_accepted() {
    use base64::Engine as _;

    let container = TrainingCoordinator::default()
        .train(Some(&common::mail()), AlgorithmId::NaiveBayes)
        .unwrap();
    let bytes = ModelPersistence::default().serialize(&container).unwrap();
    let text = format!(
        "<urn:test> <{}> \"{}\"^^<{}> .\n",
        vocab::OWL_HAS_VALUE,
        base64::engine::general_purpose::STANDARD.encode(&bytes),
        vocab::XSD_BASE64_BINARY
    );
    let restored = ModelPersistence::default()
        .from_document(&text, DocumentFormat::NTriples)
        .unwrap();
    assert_eq!(restored.classifier(), container.classifier());
}

#[test]
fn test_non_binary_object() {
    let text = format!("<urn:test> <{}> \"plain text\" .\n", vocab::OWL_HAS_VALUE);
    let result = ModelPersistence::default().from_document(&text, DocumentFormat::NTriples);
    assert!(matches!(result, Err(ClassifyError::DeserializationFailed(_))));
}

#[test]
fn test_unparsable_document() {
    let result = ModelPersistence::default()
        .from_document("<urn:test> <urn:p> \"unterminated", DocumentFormat::NTriples);
    assert!(matches!(result, Err(ClassifyError::CorruptDocument(_))));
}

#[test]
fn test_statement_selection() {
    let coordinator = TrainingCoordinator::default();
    let first = coordinator
        .train(Some(&common::mail()), AlgorithmId::NaiveBayes)
        .unwrap();
    let second = coordinator
        .train(Some(&common::mail()), AlgorithmId::DecisionTree)
        .unwrap();

    let mut document = Document::new();
    let persistence = ModelPersistence::default();
    persistence
        .to_statement(&mut document, &first, "urn:model:first")
        .unwrap();
    persistence
        .to_statement(&mut document, &second, "urn:model:second")
        .unwrap();
    let text = document.render(DocumentFormat::NTriples);

    let restored = ModelPersistence::new(StatementSelection::First)
        .from_document(&text, DocumentFormat::NTriples)
        .unwrap();
    assert_eq!(restored.algorithm().unwrap(), AlgorithmId::NaiveBayes);

    let strict = ModelPersistence::new(StatementSelection::ExactlyOne)
        .from_document(&text, DocumentFormat::NTriples);
    assert!(matches!(strict, Err(ClassifyError::AmbiguousModelStatement(2))));
}

#[derive(Debug)]
struct Opaque;

impl ClassifierTrainer for Opaque {
    fn train(&mut self, data: &InstanceList) -> pallet_classify::Result<Classifier> {
        AlgorithmRegistry::default()
            .construct(AlgorithmId::NaiveBayes)?
            .train(data)
    }
}

#[test]
fn test_external_strategy_is_unserializable() {
    let mut strategy = TrainingStrategy::external(Opaque);
    let classifier = strategy.train(&common::mail()).unwrap();
    let container = ModelContainer::new(strategy.into_shared(), classifier);
    let persistence = ModelPersistence::default();

    assert!(matches!(
        persistence.serialize(&container),
        Err(ClassifyError::UnserializableModel(_))
    ));
    let mut document = Document::new();
    assert!(matches!(
        persistence.to_statement(&mut document, &container, "urn:test"),
        Err(ClassifyError::SerializationFailed(_))
    ));
    assert!(document.is_empty());
}

#[test]
fn test_incremental_lineage_survives_storage() {
    let coordinator = TrainingCoordinator::default();
    let persistence = ModelPersistence::default();

    let a = coordinator
        .train(Some(&common::mail()), AlgorithmId::NaiveBayes)
        .unwrap();
    let b = coordinator
        .train_incremental(Some(a.strategy()), Some(&common::mail_followup()))
        .unwrap();
    assert!(Arc::ptr_eq(a.strategy(), b.strategy()));
    assert_ne!(a.classifier(), b.classifier());

    let text = store(&b, "urn:test");
    let restored = persistence
        .from_document(&text, DocumentFormat::NTriples)
        .unwrap();
    assert_eq!(
        AlgorithmRegistry::identify(Some(&*restored.strategy().lock().unwrap())).unwrap(),
        AlgorithmId::NaiveBayes
    );

    // the restored strategy keeps its counts and can keep learning
    let mut more = InstanceList::new();
    more.push_text("m10", Some("news"), "digest digest digest");
    let c = coordinator
        .train_incremental(Some(restored.strategy()), Some(&more))
        .unwrap();
    assert_eq!(c.classifier().labels(), &["spam", "ham", "news"]);
    assert!(!Arc::ptr_eq(c.strategy(), b.strategy()));
}

#[test]
fn test_annotations_do_not_hide_model() {
    let container = TrainingCoordinator::default()
        .train(Some(&common::mail()), AlgorithmId::C45)
        .unwrap();
    let persistence = ModelPersistence::new(StatementSelection::ExactlyOne);
    let mut document = Document::new();
    persistence
        .annotate(&mut document, &container, "urn:model:tree")
        .unwrap();
    persistence
        .to_statement(&mut document, &container, "urn:model:tree")
        .unwrap();
    let text = document.render(DocumentFormat::NTriples);
    assert!(text.contains(vocab::PALLET_ALGORITHM));
    assert!(text.contains("\"C45\""));

    let restored = persistence
        .from_document(&text, "nt".parse().unwrap())
        .unwrap();
    assert_eq!(restored.algorithm().unwrap(), AlgorithmId::C45);
}
