//! pallet-classify: text classifier training with pluggable algorithms.
//!
//! The crate maps algorithm identifiers to training strategies, trains them
//! once or incrementally (NaiveBayes), and stores the resulting models as a
//! single opaque literal in a graph document so they can be catalogued next
//! to descriptive metadata.
//!
//! ```no_run
//! use pallet_classify::{AlgorithmId, InstanceList, ModelPersistence, TrainingCoordinator};
//! use pallet_classify::graph::{Document, DocumentFormat};
//!
//! let mut data = InstanceList::new();
//! data.push_text("m1", Some("spam"), "cheap pills now");
//! data.push_text("m2", Some("ham"), "see you at lunch");
//!
//! let container = TrainingCoordinator::default().train(Some(&data), AlgorithmId::NaiveBayes)?;
//! let mut document = Document::new();
//! ModelPersistence::default().to_statement(&mut document, &container, "urn:model:mail")?;
//! let text = document.render(DocumentFormat::NTriples);
//! # Ok::<(), pallet_classify::ClassifyError>(())
//! ```
pub mod config;
pub mod data_handling;
pub mod error;
pub mod graph;
pub mod models;
pub mod persistence;
pub mod trainer;

pub use config::{AlgorithmId, AlgorithmParams};
pub use data_handling::{read_labeled_text, InstanceList};
pub use error::{ClassifyError, Result};
pub use models::{AlgorithmRegistry, Classifier, SharedStrategy, TrainingStrategy};
pub use persistence::{ModelPersistence, StatementSelection};
pub use trainer::{ModelContainer, TrainingCoordinator};
