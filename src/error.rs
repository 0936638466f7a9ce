//! Error taxonomy: creation-time (`GrammarError`) vs parse-time (`ParseError`).
//!
//! Creation errors halt grammar preparation (`Parser::prepare`) and are not
//! recoverable. Parse errors are either recorded into the parser's error log
//! (recoverable lexical/syntactic mismatches, semantic callback errors) or,
//! for a handful of catastrophic cases (I/O failure, limits), abort the parse
//! outright.

use thiserror::Error;

/// An error raised while building or preparing a grammar.
///
/// These are always fatal: a grammar that fails to prepare cannot be used to
/// parse anything.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("invalid parser: {0}")]
    InvalidParser(String),

    #[error("invalid token pattern {name:?}: {detail}")]
    InvalidToken { name: String, detail: String },

    #[error("invalid production {name:?}: {detail}")]
    InvalidProduction { name: String, detail: String },

    #[error("infinite loop detected while computing look-ahead for {name:?}")]
    InfiniteLoop { name: String },

    #[error("inherent ambiguity in {name:?}: {detail}")]
    InherentAmbiguity { name: String, detail: String },
}

/// A source position, 1-indexed in both fields (matches `ReaderBuffer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An error encountered while tokenizing or parsing a single input.
///
/// Most variants carry a [`Position`] so callers can report the offending
/// line/column without re-walking the input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{0} at {1}")]
    Internal(String, Position),

    #[error("I/O error: {0} at {1}")]
    Io(String, Position),

    #[error("unexpected end of file at {0}")]
    UnexpectedEof(Position),

    #[error("unexpected character {image:?} at {position}")]
    UnexpectedChar { image: String, position: Position },

    #[error("unexpected token {image:?} at {position}, expected {}", join_expected(expected))]
    UnexpectedToken {
        image: String,
        expected: Vec<String>,
        position: Position,
    },

    #[error("invalid token at {position}: {message}")]
    InvalidToken { message: String, position: Position },

    #[error("semantic error at {position}: {message}")]
    Analysis { message: String, position: Position },

    #[error("token limit reached at {0}")]
    TokenLimitExceeded(Position),

    #[error("recursion limit reached at {0}")]
    RecursionLimitExceeded(Position),
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::Internal(_, p)
            | ParseError::Io(_, p)
            | ParseError::UnexpectedEof(p)
            | ParseError::UnexpectedChar { position: p, .. }
            | ParseError::UnexpectedToken { position: p, .. }
            | ParseError::InvalidToken { position: p, .. }
            | ParseError::Analysis { position: p, .. }
            | ParseError::TokenLimitExceeded(p)
            | ParseError::RecursionLimitExceeded(p) => *p,
        }
    }

    /// Whether the driver can log this error and resynchronize, or must
    /// abort the parse outright. I/O failure, hitting a configured limit,
    /// and running out of input mid-production are all unrecoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ParseError::UnexpectedChar { .. }
                | ParseError::UnexpectedToken { .. }
                | ParseError::InvalidToken { .. }
                | ParseError::Analysis { .. }
        )
    }
}

/// Joins a list of expected-token descriptions with commas and a trailing
/// "or", e.g. `a, b or c`. Matches the human-readable format required by
/// spec §7.
fn join_expected(expected: &[String]) -> String {
    match expected.len() {
        0 => "nothing".to_string(),
        1 => expected[0].clone(),
        n => {
            let _ = n;
            let (last, rest) = expected.split_last().unwrap();
            format!("{} or {}", rest.join(", "), last)
        }
    }
}

/// The aggregated result of a parse: every recoverable error recorded during
/// a single `Parser::parse` call, in the order encountered.
///
/// A non-empty log is returned by `Parser::parse` instead of a tree; an empty
/// log means the parse succeeded (spec §7).
#[derive(Debug, Error, Clone, PartialEq, Eq, Default)]
#[error("parse failed with {} error(s)", .0.len())]
pub struct ParserLog(pub Vec<ParseError>);

impl ParserLog {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.0
    }

    pub fn push(&mut self, error: ParseError) {
        self.0.push(error);
    }
}

impl IntoIterator for ParserLog {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
