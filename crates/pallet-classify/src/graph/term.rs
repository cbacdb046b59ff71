use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::vocab;
use super::GraphError;

/// An IRI. Only the characters N-Triples forbids inside `<...>` are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedNode {
    iri: String,
}

impl NamedNode {
    pub fn new(iri: impl Into<String>) -> Result<Self, GraphError> {
        let iri = iri.into();
        if iri.is_empty()
            || iri
                .chars()
                .any(|c| c <= ' ' || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\'))
        {
            return Err(GraphError::InvalidIri(iri));
        }
        Ok(NamedNode { iri })
    }

    /// Wraps an IRI known to be valid, such as a vocabulary constant.
    pub(crate) fn new_unchecked(iri: &str) -> Self {
        NamedNode {
            iri: iri.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.iri
    }
}

impl fmt::Display for NamedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.iri)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlankNode {
    id: String,
}

impl BlankNode {
    pub fn new(id: impl Into<String>) -> Result<Self, GraphError> {
        let id = id.into();
        let valid = !id.is_empty()
            && !id.ends_with('.')
            && id
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(GraphError::InvalidBlankNode(id));
        }
        Ok(BlankNode { id })
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum LiteralKind {
    Simple,
    LanguageTagged(String),
    Typed(NamedNode),
}

/// A lexical value with an optional language tag or datatype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    value: String,
    kind: LiteralKind,
}

impl Literal {
    pub fn new_simple(value: impl Into<String>) -> Self {
        Literal {
            value: value.into(),
            kind: LiteralKind::Simple,
        }
    }

    pub fn new_language_tagged(value: impl Into<String>, language: impl Into<String>) -> Self {
        Literal {
            value: value.into(),
            kind: LiteralKind::LanguageTagged(language.into().to_ascii_lowercase()),
        }
    }

    pub fn new_typed(value: impl Into<String>, datatype: NamedNode) -> Self {
        let value = value.into();
        // xsd:string is the implicit datatype of simple literals
        if datatype.as_str() == vocab::XSD_STRING {
            return Literal::new_simple(value);
        }
        Literal {
            value,
            kind: LiteralKind::Typed(datatype),
        }
    }

    /// An `xsd:hexBinary` literal holding `bytes`.
    pub fn typed_bytes(bytes: &[u8]) -> Self {
        Literal::new_typed(
            hex::encode_upper(bytes),
            NamedNode::new_unchecked(vocab::XSD_HEX_BINARY),
        )
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn language(&self) -> Option<&str> {
        match &self.kind {
            LiteralKind::LanguageTagged(lang) => Some(lang),
            _ => None,
        }
    }

    pub fn datatype(&self) -> &str {
        match &self.kind {
            LiteralKind::Simple => vocab::XSD_STRING,
            LiteralKind::LanguageTagged(_) => vocab::RDF_LANG_STRING,
            LiteralKind::Typed(dt) => dt.as_str(),
        }
    }

    /// Decodes the bytes of an `xsd:hexBinary` or `xsd:base64Binary` literal.
    ///
    /// Returns `None` for any other datatype or for a malformed lexical form.
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        let value = self.value.trim();
        match self.datatype() {
            vocab::XSD_HEX_BINARY => hex::decode(value).ok(),
            vocab::XSD_BASE64_BINARY => {
                let compact: String = value.split_whitespace().collect();
                STANDARD.decode(compact).ok()
            }
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for c in self.value.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                c => write!(f, "{}", c)?,
            }
        }
        f.write_str("\"")?;
        match &self.kind {
            LiteralKind::Simple => Ok(()),
            LiteralKind::LanguageTagged(lang) => write!(f, "@{}", lang),
            LiteralKind::Typed(dt) => write!(f, "^^{}", dt),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    NamedNode(NamedNode),
    BlankNode(BlankNode),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::NamedNode(n) => n.fmt(f),
            Subject::BlankNode(b) => b.fmt(f),
        }
    }
}

impl From<NamedNode> for Subject {
    fn from(node: NamedNode) -> Self {
        Subject::NamedNode(node)
    }
}

impl From<BlankNode> for Subject {
    fn from(node: BlankNode) -> Self {
        Subject::BlankNode(node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    NamedNode(NamedNode),
    BlankNode(BlankNode),
    Literal(Literal),
}

impl Term {
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::NamedNode(n) => n.fmt(f),
            Term::BlankNode(b) => b.fmt(f),
            Term::Literal(l) => l.fmt(f),
        }
    }
}

impl From<NamedNode> for Term {
    fn from(node: NamedNode) -> Self {
        Term::NamedNode(node)
    }
}

impl From<BlankNode> for Term {
    fn from(node: BlankNode) -> Self {
        Term::BlankNode(node)
    }
}

impl From<Literal> for Term {
    fn from(literal: Literal) -> Self {
        Term::Literal(literal)
    }
}

impl From<Subject> for Term {
    fn from(subject: Subject) -> Self {
        match subject {
            Subject::NamedNode(n) => Term::NamedNode(n),
            Subject::BlankNode(b) => Term::BlankNode(b),
        }
    }
}

/// A subject-predicate-object triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    pub subject: Subject,
    pub predicate: NamedNode,
    pub object: Term,
}

impl Statement {
    pub fn new(
        subject: impl Into<Subject>,
        predicate: NamedNode,
        object: impl Into<Term>,
    ) -> Self {
        Statement {
            subject: subject.into(),
            predicate,
            object: object.into(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}
