//! A small in-memory graph document of subject-predicate-object statements.
//!
//! Models are stored as typed literals inside such documents, which are read
//! and written as N-Triples.
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub mod ntriples;
pub mod term;
pub mod vocab;

pub use term::{BlankNode, Literal, NamedNode, Statement, Subject, Term};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Invalid IRI: {0:?}")]
    InvalidIri(String),

    #[error("Invalid blank node label: {0:?}")]
    InvalidBlankNode(String),

    #[error("Unsupported document format: {0}")]
    UnknownFormat(String),
}

/// Serialization formats understood by `Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    NTriples,
}

impl FromStr for DocumentFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N-TRIPLE" | "N-TRIPLES" | "NTRIPLES" | "NT" => Ok(DocumentFormat::NTriples),
            _ => Err(GraphError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::NTriples => f.write_str("N-TRIPLES"),
        }
    }
}

/// Statements in insertion order, without duplicates.
#[derive(Debug, Clone, Default)]
pub struct Document {
    statements: Vec<Statement>,
    seen: HashSet<Statement>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(text: &str, format: DocumentFormat) -> Result<Self, GraphError> {
        let statements = match format {
            DocumentFormat::NTriples => ntriples::parse(text)?,
        };
        let mut document = Document::new();
        for statement in statements {
            document.add(statement);
        }
        log::debug!("Read {} statements", document.len());
        Ok(document)
    }

    pub fn render(&self, format: DocumentFormat) -> String {
        match format {
            DocumentFormat::NTriples => ntriples::render(&self.statements),
        }
    }

    /// Adds `statement`; returns false when it was already present.
    pub fn add(&mut self, statement: Statement) -> bool {
        if self.seen.contains(&statement) {
            return false;
        }
        self.seen.insert(statement.clone());
        self.statements.push(statement);
        true
    }

    pub fn create_resource(&self, iri: &str) -> Result<NamedNode, GraphError> {
        NamedNode::new(iri)
    }

    pub fn create_typed_literal(&self, bytes: &[u8]) -> Literal {
        Literal::typed_bytes(bytes)
    }

    /// Creates and adds `(subject, predicate, literal)`, returning the statement.
    pub fn create_literal_statement(
        &mut self,
        subject: NamedNode,
        predicate: NamedNode,
        literal: Literal,
    ) -> Statement {
        let statement = Statement::new(subject, predicate, literal);
        self.add(statement.clone());
        statement
    }

    /// Statements matching every given component, in document order.
    pub fn list_statements<'a>(
        &'a self,
        subject: Option<&'a Subject>,
        predicate: Option<&'a NamedNode>,
        object: Option<&'a Term>,
    ) -> impl Iterator<Item = &'a Statement> + 'a {
        self.statements.iter().filter(move |s| {
            subject.map_or(true, |x| &s.subject == x)
                && predicate.map_or(true, |x| &s.predicate == x)
                && object.map_or(true, |x| &s.object == x)
        })
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
