//! The `train`, `update`, `inspect` and `classify` subcommands.
//!
//! Each command returns the text it would print so it can be tested without
//! spawning the binary.
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use pallet_classify::graph::{vocab, Document, DocumentFormat, Subject};
use pallet_classify::{
    read_labeled_text, AlgorithmId, AlgorithmParams, AlgorithmRegistry, ModelContainer,
    ModelPersistence, StatementSelection, TrainingCoordinator,
};

use crate::util::{read_document, validate_tsv_or_csv_file};

/// Predicates rewritten whenever a stored model is replaced.
const MODEL_PREDICATES: [&str; 4] = [
    vocab::OWL_HAS_VALUE,
    vocab::PALLET_ALGORITHM,
    vocab::PALLET_LABEL_COUNT,
    vocab::DCTERMS_CREATED,
];

#[derive(Debug, Clone)]
pub struct TrainArgs {
    pub data: PathBuf,
    pub algorithm: AlgorithmId,
    pub subject: String,
    pub params: AlgorithmParams,
}

fn persistence() -> ModelPersistence {
    ModelPersistence::new(StatementSelection::ExactlyOne)
}

fn store(mut document: Document, container: &ModelContainer, subject: &str) -> Result<String> {
    let persistence = persistence();
    persistence.annotate(&mut document, container, subject)?;
    persistence
        .to_statement(&mut document, container, subject)
        .context("Failed to store the trained model")?;
    Ok(document.render(DocumentFormat::NTriples))
}

/// Train a fresh model and render the document that stores it.
pub fn run_train(args: &TrainArgs) -> Result<String> {
    validate_tsv_or_csv_file(&args.data)?;
    let data = read_labeled_text(&args.data)
        .with_context(|| format!("Failed to load training data: {}", args.data.display()))?;

    let coordinator = TrainingCoordinator::new(AlgorithmRegistry::new(args.params.clone()));
    let container = coordinator
        .train(Some(&data), args.algorithm)
        .with_context(|| format!("Failed to train {}", args.algorithm))?;

    if let Some(accuracy) = container.classifier().accuracy(&data) {
        log::info!("Training accuracy: {:.3}", accuracy);
    }
    store(Document::new(), &container, &args.subject)
}

/// Update the model stored in `model_path` with more data and render the new document.
///
/// Statements unrelated to the model are carried over unchanged.
pub fn run_update(model_path: &Path, data_path: &Path) -> Result<String> {
    let (_, document) = read_document(model_path)?;
    let container = persistence()
        .from_graph(&document)
        .with_context(|| format!("No usable model in {}", model_path.display()))?;
    let subject = model_subject(&document)?;

    validate_tsv_or_csv_file(data_path)?;
    let data = read_labeled_text(data_path)
        .with_context(|| format!("Failed to load training data: {}", data_path.display()))?;

    let updated = TrainingCoordinator::default()
        .train_incremental(Some(container.strategy()), Some(&data))
        .context("Incremental training failed")?;

    let mut carried = Document::new();
    for statement in document.statements() {
        let replaced = statement.subject == Subject::NamedNode(subject.clone())
            && MODEL_PREDICATES.contains(&statement.predicate.as_str());
        if !replaced {
            carried.add(statement.clone());
        }
    }
    store(carried, &updated, subject.as_str())
}

/// Describe the model stored in `model_path`.
pub fn run_inspect(model_path: &Path) -> Result<String> {
    let (text, _) = read_document(model_path)?;
    let container = persistence()
        .from_document(&text, DocumentFormat::NTriples)
        .with_context(|| format!("No usable model in {}", model_path.display()))?;
    let classifier = container.classifier();

    let mut out = String::new();
    writeln!(out, "algorithm: {}", container.algorithm()?)?;
    writeln!(out, "model: {}", classifier.name())?;
    writeln!(out, "labels: {}", classifier.labels().join(", "))?;
    writeln!(out, "features: {}", classifier.num_features())?;
    Ok(out)
}

/// Classify every row of `data_path` with the stored model.
///
/// Prints `name<TAB>label<TAB>score` per row, then the accuracy over labeled rows.
pub fn run_classify(model_path: &Path, data_path: &Path) -> Result<String> {
    let (text, _) = read_document(model_path)?;
    let container = persistence()
        .from_document(&text, DocumentFormat::NTriples)
        .with_context(|| format!("No usable model in {}", model_path.display()))?;
    validate_tsv_or_csv_file(data_path)?;
    let data = read_labeled_text(data_path)
        .with_context(|| format!("Failed to load data: {}", data_path.display()))?;
    let classifier = container.classifier();

    let mut out = String::new();
    for instance in data.iter() {
        let labeling = classifier.classify(&data, instance);
        writeln!(
            out,
            "{}\t{}\t{:.4}",
            instance.name,
            labeling.best_label().unwrap_or("-"),
            labeling.best_value().unwrap_or(0.0)
        )?;
    }
    if let Some(accuracy) = classifier.accuracy(&data) {
        writeln!(out, "accuracy\t{:.4}", accuracy)?;
    }
    Ok(out)
}

fn model_subject(document: &Document) -> Result<pallet_classify::graph::NamedNode> {
    let predicate = document.create_resource(vocab::OWL_HAS_VALUE)?;
    let statement = document
        .list_statements(None, Some(&predicate), None)
        .next()
        .context("Document holds no model statement")?;
    match &statement.subject {
        Subject::NamedNode(node) => Ok(node.clone()),
        Subject::BlankNode(node) => {
            anyhow::bail!("Model subject {} must be an IRI to be updated", node)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SPAM: &str = "label\ttext\n\
        spam\twin cash prize now\n\
        spam\tcheap pills win big\n\
        ham\tmeeting moved to noon\n\
        ham\tlunch at noon with the team\n";

    const NEWS: &str = "label\ttext\n\
        news\tweekly digest headlines\n\
        news\theadlines from the weekly digest\n";

    fn train_args(dir: &Path) -> TrainArgs {
        let data = dir.join("train.tsv");
        fs::write(&data, SPAM).unwrap();
        TrainArgs {
            data,
            algorithm: AlgorithmId::NaiveBayes,
            subject: "urn:model:mail".to_string(),
            params: AlgorithmParams::default(),
        }
    }

    #[test]
    fn test_train_then_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let rendered = run_train(&train_args(dir.path())).unwrap();
        assert!(rendered.contains(vocab::OWL_HAS_VALUE));

        let model = dir.path().join("model.nt");
        fs::write(&model, rendered).unwrap();
        let summary = run_inspect(&model).unwrap();
        assert!(summary.contains("algorithm: NaiveBayes"));
        assert!(summary.contains("labels: spam, ham"));
    }

    #[test]
    fn test_update_replaces_model_and_keeps_other_triples() {
        let dir = tempfile::tempdir().unwrap();
        let mut rendered = run_train(&train_args(dir.path())).unwrap();
        rendered.push_str("<urn:model:mail> <http://purl.org/dc/terms/title> \"mail filter\" .\n");
        let model = dir.path().join("model.nt");
        fs::write(&model, rendered).unwrap();

        let news = dir.path().join("news.tsv");
        fs::write(&news, NEWS).unwrap();
        let updated = run_update(&model, &news).unwrap();

        assert_eq!(updated.matches(vocab::OWL_HAS_VALUE).count(), 1);
        assert_eq!(updated.matches(vocab::PALLET_ALGORITHM).count(), 1);
        assert!(updated.contains("\"mail filter\""));

        fs::write(&model, updated).unwrap();
        assert!(run_inspect(&model).unwrap().contains("labels: spam, ham, news"));
    }

    #[test]
    fn test_update_rejects_maxent() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = train_args(dir.path());
        args.algorithm = AlgorithmId::MaxEnt;
        let model = dir.path().join("model.nt");
        fs::write(&model, run_train(&args).unwrap()).unwrap();

        let err = run_update(&model, &args.data).unwrap_err();
        assert!(format!("{:#}", err).contains("does not support incremental training"));
    }

    #[test]
    fn test_classify_reports_accuracy() {
        let dir = tempfile::tempdir().unwrap();
        let args = train_args(dir.path());
        let model = dir.path().join("model.nt");
        fs::write(&model, run_train(&args).unwrap()).unwrap();

        let out = run_classify(&model, &args.data).unwrap();
        assert_eq!(out.lines().count(), 5);
        assert!(out.lines().last().unwrap().starts_with("accuracy\t"));
        assert!(out.starts_with("row_1\tspam\t"));
    }
}
