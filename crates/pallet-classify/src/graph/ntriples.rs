//! Line-oriented N-Triples reader and writer.
use std::iter::Peekable;
use std::str::Chars;

use super::term::{BlankNode, Literal, NamedNode, Statement, Subject, Term};
use super::GraphError;

/// Parses every statement of `text`, in order.
pub fn parse(text: &str) -> Result<Vec<Statement>, GraphError> {
    let mut statements = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let mut parser = LineParser {
            chars: line.chars().peekable(),
            line: idx + 1,
        };
        if let Some(statement) = parser.statement()? {
            statements.push(statement);
        }
    }
    Ok(statements)
}

/// Renders statements one per line, each terminated by a newline.
pub fn render<'a, I>(statements: I) -> String
where
    I: IntoIterator<Item = &'a Statement>,
{
    let mut out = String::new();
    for statement in statements {
        out.push_str(&statement.to_string());
        out.push('\n');
    }
    out
}

struct LineParser<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> LineParser<'a> {
    fn error(&self, message: impl Into<String>) -> GraphError {
        GraphError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some(' ') | Some('\t')) {
            self.chars.next();
        }
    }

    fn at_end_or_comment(&mut self) -> bool {
        self.skip_whitespace();
        matches!(self.chars.peek(), None | Some('#'))
    }

    fn expect(&mut self, expected: char) -> Result<(), GraphError> {
        match self.chars.next() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of line", expected))),
        }
    }

    fn statement(&mut self) -> Result<Option<Statement>, GraphError> {
        if self.at_end_or_comment() {
            return Ok(None);
        }
        let subject = match self.chars.peek() {
            Some('<') => Subject::NamedNode(self.iri()?),
            Some('_') => Subject::BlankNode(self.blank_node()?),
            _ => return Err(self.error("expected IRI or blank node as subject")),
        };
        self.skip_whitespace();
        let predicate = match self.chars.peek() {
            Some('<') => self.iri()?,
            _ => return Err(self.error("expected IRI as predicate")),
        };
        self.skip_whitespace();
        let object = match self.chars.peek() {
            Some('<') => Term::NamedNode(self.iri()?),
            Some('_') => Term::BlankNode(self.blank_node()?),
            Some('"') => Term::Literal(self.literal()?),
            _ => return Err(self.error("expected IRI, blank node or literal as object")),
        };
        self.skip_whitespace();
        self.expect('.')?;
        if !self.at_end_or_comment() {
            return Err(self.error("unexpected content after '.'"));
        }
        Ok(Some(Statement {
            subject,
            predicate,
            object,
        }))
    }

    fn iri(&mut self) -> Result<NamedNode, GraphError> {
        self.expect('<')?;
        let mut iri = String::new();
        loop {
            match self.chars.next() {
                Some('>') => break,
                Some('\\') => iri.push(self.unicode_escape()?),
                Some(c) => iri.push(c),
                None => return Err(self.error("unterminated IRI")),
            }
        }
        NamedNode::new(iri).map_err(|e| self.error(e.to_string()))
    }

    fn blank_node(&mut self) -> Result<BlankNode, GraphError> {
        self.expect('_')?;
        self.expect(':')?;
        let mut id = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                id.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        // a trailing '.' terminates the statement, not the label
        let mut trailing_dot = false;
        if id.ends_with('.') {
            id.pop();
            trailing_dot = true;
        }
        let node = BlankNode::new(id).map_err(|e| self.error(e.to_string()))?;
        if trailing_dot {
            return Err(self.error("blank node label must be followed by whitespace"));
        }
        Ok(node)
    }

    fn literal(&mut self) -> Result<Literal, GraphError> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some('"') => break,
                Some('\\') => value.push(self.string_escape()?),
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated literal")),
            }
        }
        match self.chars.peek() {
            Some('@') => {
                self.chars.next();
                let mut lang = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '-' {
                        lang.push(c);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                if lang.is_empty() {
                    return Err(self.error("empty language tag"));
                }
                Ok(Literal::new_language_tagged(value, lang))
            }
            Some('^') => {
                self.chars.next();
                self.expect('^')?;
                let datatype = self.iri()?;
                Ok(Literal::new_typed(value, datatype))
            }
            _ => Ok(Literal::new_simple(value)),
        }
    }

    fn string_escape(&mut self) -> Result<char, GraphError> {
        match self.chars.next() {
            Some('t') => Ok('\t'),
            Some('b') => Ok('\u{8}'),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('f') => Ok('\u{c}'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('\\') => Ok('\\'),
            Some('u') => self.hex_char(4),
            Some('U') => self.hex_char(8),
            Some(c) => Err(self.error(format!("invalid escape '\\{}'", c))),
            None => Err(self.error("unterminated escape")),
        }
    }

    fn unicode_escape(&mut self) -> Result<char, GraphError> {
        match self.chars.next() {
            Some('u') => self.hex_char(4),
            Some('U') => self.hex_char(8),
            _ => Err(self.error("only \\u and \\U escapes are allowed in IRIs")),
        }
    }

    fn hex_char(&mut self, digits: usize) -> Result<char, GraphError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .chars
                .next()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid hexadecimal escape"))?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| self.error(format!("invalid code point U+{:X}", code)))
    }
}
