//! Storing trained models as opaque literals inside graph documents.
//!
//! A container is encoded as
//!
//! ```text
//! b"PLLT" | version: u16 LE | algorithm tag: u8 | bincode { strategy, classifier }
//! ```
//!
//! and written as the `xsd:hexBinary` object of a single
//! `(subject, owl:hasValue, literal)` statement.
use std::convert::TryFrom;

use bincode::Options;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AlgorithmId;
use crate::error::{ClassifyError, Result};
use crate::graph::{vocab, Document, DocumentFormat, Literal, NamedNode, Statement};
use crate::models::classifier_trait::Classifier;
use crate::models::strategy::TrainingStrategy;
use crate::trainer::{lock_strategy, ModelContainer};

pub const MAGIC: &[u8; 4] = b"PLLT";
pub const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 7;

#[derive(Serialize)]
struct PayloadRef<'a> {
    strategy: &'a TrainingStrategy,
    classifier: &'a Classifier,
}

#[derive(Deserialize)]
struct Payload {
    strategy: TrainingStrategy,
    classifier: Classifier,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Which `owl:hasValue` statement a document lookup accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementSelection {
    /// The first one in document order; later ones are ignored.
    #[default]
    First,
    /// Exactly one must exist.
    ExactlyOne,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelPersistence {
    selection: StatementSelection,
}

impl ModelPersistence {
    pub fn new(selection: StatementSelection) -> Self {
        ModelPersistence { selection }
    }

    pub fn selection(&self) -> StatementSelection {
        self.selection
    }

    /// Encodes the strategy and model of `container`.
    pub fn serialize(&self, container: &ModelContainer) -> Result<Vec<u8>> {
        let strategy = lock_strategy(container.strategy())
            .map_err(|e| ClassifyError::SerializationFailed(e.to_string()))?;
        if !strategy.is_serializable() {
            return Err(ClassifyError::UnserializableModel(format!(
                "strategy '{}' has no stable encoding",
                strategy.name()
            )));
        }

        let payload = PayloadRef {
            strategy: &*strategy,
            classifier: container.classifier(),
        };
        let body = codec()
            .serialize(&payload)
            .map_err(|e| ClassifyError::SerializationFailed(e.to_string()))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.push(strategy.algorithm().code());
        bytes.extend_from_slice(&body);
        log::debug!(
            "Serialized {} model into {} bytes",
            strategy.algorithm(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Decodes bytes produced by `serialize` into a fresh container.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<ModelContainer> {
        let fail = |msg: String| ClassifyError::DeserializationFailed(msg);

        if bytes.len() < HEADER_LEN {
            return Err(fail(format!("{} bytes is too short for a model", bytes.len())));
        }
        if &bytes[..4] != MAGIC {
            return Err(fail("missing model header".to_string()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(fail(format!("unsupported format version {}", version)));
        }
        let tag = AlgorithmId::try_from(bytes[6]).map_err(|e| fail(e.to_string()))?;

        let payload: Payload = codec()
            .deserialize(&bytes[HEADER_LEN..])
            .map_err(|e| fail(e.to_string()))?;
        let found = payload.strategy.algorithm();
        if found != tag {
            return Err(fail(format!(
                "header announces {} but payload holds {}",
                tag, found
            )));
        }
        payload
            .strategy
            .validate(&payload.classifier)
            .map_err(|e| fail(e.to_string()))?;

        log::debug!("Deserialized {} model from {} bytes", tag, bytes.len());
        Ok(ModelContainer::new(
            payload.strategy.into_shared(),
            payload.classifier,
        ))
    }

    /// Adds `(subject_uri, owl:hasValue, model bytes)` to `document`.
    pub fn to_statement(
        &self,
        document: &mut Document,
        container: &ModelContainer,
        subject_uri: &str,
    ) -> Result<Statement> {
        let bytes = self.serialize(container).map_err(|e| match e {
            ClassifyError::SerializationFailed(_) => e,
            other => ClassifyError::SerializationFailed(other.to_string()),
        })?;
        let subject = document
            .create_resource(subject_uri)
            .map_err(|e| ClassifyError::SerializationFailed(e.to_string()))?;
        let literal = document.create_typed_literal(&bytes);
        Ok(document.create_literal_statement(subject, has_value(), literal))
    }

    /// Parses `text` and restores the model it holds.
    pub fn from_document(&self, text: &str, format: DocumentFormat) -> Result<ModelContainer> {
        let document = Document::read(text, format)?;
        self.from_graph(&document)
    }

    /// Restores the model held by an already parsed document.
    pub fn from_graph(&self, document: &Document) -> Result<ModelContainer> {
        let predicate = has_value();
        let candidates: Vec<&Statement> = document
            .list_statements(None, Some(&predicate), None)
            .collect();

        let statement = match (candidates.first(), candidates.len()) {
            (None, _) => return Err(ClassifyError::NoModelStatement),
            (Some(first), 1) => *first,
            (Some(_), n) if self.selection == StatementSelection::ExactlyOne => {
                return Err(ClassifyError::AmbiguousModelStatement(n));
            }
            (Some(first), n) => {
                log::warn!(
                    "Document holds {} model statements, using the one for {}",
                    n,
                    first.subject
                );
                *first
            }
        };

        let bytes = statement
            .object
            .as_literal()
            .and_then(Literal::as_bytes)
            .ok_or_else(|| {
                ClassifyError::DeserializationFailed(format!(
                    "object of {} is not a binary literal",
                    statement.subject
                ))
            })?;
        self.deserialize(&bytes)
    }

    /// Writes descriptive triples about `container` next to its model statement.
    pub fn annotate(
        &self,
        document: &mut Document,
        container: &ModelContainer,
        subject_uri: &str,
    ) -> Result<()> {
        self.annotate_at(document, container, subject_uri, Utc::now())
    }

    pub fn annotate_at(
        &self,
        document: &mut Document,
        container: &ModelContainer,
        subject_uri: &str,
        created: DateTime<Utc>,
    ) -> Result<()> {
        let subject = document
            .create_resource(subject_uri)
            .map_err(|e| ClassifyError::SerializationFailed(e.to_string()))?;
        let algorithm = container.algorithm()?;

        document.create_literal_statement(
            subject.clone(),
            NamedNode::new_unchecked(vocab::PALLET_ALGORITHM),
            Literal::new_simple(algorithm.name()),
        );
        document.create_literal_statement(
            subject.clone(),
            NamedNode::new_unchecked(vocab::PALLET_LABEL_COUNT),
            Literal::new_typed(
                container.classifier().labels().len().to_string(),
                NamedNode::new_unchecked(vocab::XSD_INTEGER),
            ),
        );
        document.create_literal_statement(
            subject,
            NamedNode::new_unchecked(vocab::DCTERMS_CREATED),
            Literal::new_typed(
                created.to_rfc3339_opts(SecondsFormat::Secs, true),
                NamedNode::new_unchecked(vocab::XSD_DATE_TIME),
            ),
        );
        Ok(())
    }
}

fn has_value() -> NamedNode {
    NamedNode::new_unchecked(vocab::OWL_HAS_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::InstanceList;
    use crate::models::factory::AlgorithmRegistry;
    use crate::trainer::TrainingCoordinator;

    fn trained(algorithm: AlgorithmId) -> ModelContainer {
        let mut data = InstanceList::new();
        data.push_text("a", Some("spam"), "win cash now");
        data.push_text("b", Some("ham"), "lunch at noon");
        TrainingCoordinator::default()
            .train(Some(&data), algorithm)
            .unwrap()
    }

    #[test]
    fn test_header_layout() {
        let container = trained(AlgorithmId::NaiveBayes);
        let bytes = ModelPersistence::default().serialize(&container).unwrap();
        assert_eq!(&bytes[..4], b"PLLT");
        assert_eq!(&bytes[4..6], &[1, 0]);
        assert_eq!(bytes[6], AlgorithmId::NaiveBayes.code());
    }

    #[test]
    fn test_header_tag_mismatch_is_rejected() {
        let container = trained(AlgorithmId::NaiveBayes);
        let persistence = ModelPersistence::default();
        let mut bytes = persistence.serialize(&container).unwrap();
        bytes[6] = AlgorithmId::MaxEnt.code();
        assert!(matches!(
            persistence.deserialize(&bytes),
            Err(ClassifyError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        let container = trained(AlgorithmId::DecisionTree);
        let persistence = ModelPersistence::default();
        let mut bytes = persistence.serialize(&container).unwrap();
        bytes[4] = 9;
        assert!(matches!(
            persistence.deserialize(&bytes),
            Err(ClassifyError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let container = trained(AlgorithmId::MaxEnt);
        let persistence = ModelPersistence::default();
        let bytes = persistence.serialize(&container).unwrap();
        assert!(persistence.deserialize(&bytes[..bytes.len() - 3]).is_err());
        assert!(persistence.deserialize(&bytes[..5]).is_err());
    }

    fn bias_free_maxent() -> Classifier {
        serde_json::from_value(serde_json::json!({"MaxEnt": {
            "feature_alphabet": ["cash"],
            "label_alphabet": ["spam", "ham"],
            "weights": {"v": 1, "dim": [2, 0], "data": []}
        }}))
        .unwrap()
    }

    #[test]
    fn test_inconsistent_shapes_are_rejected() {
        let persistence = ModelPersistence::default();
        let strategy = AlgorithmRegistry::default()
            .construct(AlgorithmId::MaxEnt)
            .unwrap()
            .into_shared();
        let container = ModelContainer::new(strategy, bias_free_maxent());
        let bytes = persistence.serialize(&container).unwrap();

        let err = persistence.deserialize(&bytes).unwrap_err();
        assert!(matches!(err, ClassifyError::DeserializationFailed(_)));
        assert!(err.to_string().contains("MaxEnt weight columns"));

        let mut doc = Document::new();
        persistence
            .to_statement(&mut doc, &container, "urn:model:broken")
            .unwrap();
        assert!(matches!(
            persistence.from_graph(&doc),
            Err(ClassifyError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_model_family_must_match_strategy() {
        let persistence = ModelPersistence::default();
        let good = trained(AlgorithmId::MaxEnt);
        let strategy = AlgorithmRegistry::default()
            .construct(AlgorithmId::NaiveBayes)
            .unwrap()
            .into_shared();
        let mixed = ModelContainer::new(strategy, good.classifier().clone());
        let bytes = persistence.serialize(&mixed).unwrap();
        assert!(matches!(
            persistence.deserialize(&bytes),
            Err(ClassifyError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_annotations_stay_off_has_value() {
        let container = trained(AlgorithmId::NaiveBayes);
        let persistence = ModelPersistence::default();
        let mut doc = Document::new();
        persistence
            .to_statement(&mut doc, &container, "urn:model:1")
            .unwrap();
        let created = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        persistence
            .annotate_at(&mut doc, &container, "urn:model:1", created)
            .unwrap();

        assert_eq!(doc.len(), 4);
        let rendered = doc.render(DocumentFormat::NTriples);
        assert!(rendered.contains("\"NaiveBayes\""));
        assert!(rendered.contains("\"2\"^^<http://www.w3.org/2001/XMLSchema#integer>"));
        assert!(rendered.contains("\"2024-03-01T12:00:00Z\""));
        assert!(persistence.from_graph(&doc).is_ok());
    }
}
