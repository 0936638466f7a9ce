//! Token patterns (lexical rules) and the tokens they produce.

use crate::error::Position;

/// Stable identifier for a token pattern, unique across a grammar.
pub type PatternId = u32;

/// Whether a [`TokenPattern`] is matched by a fixed string or a regular
/// expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    String,
    RegExp,
}

/// A declarative description of one lexical rule.
///
/// Built once via the grammar construction API (§6) and never mutated after
/// `Parser::prepare`.
#[derive(Debug, Clone)]
pub struct TokenPattern {
    id: PatternId,
    name: String,
    kind: PatternKind,
    pattern: String,
    ignore_case: bool,
    error: bool,
    error_message: Option<String>,
    ignore: bool,
    ignore_message: Option<String>,
    debug_info: Option<String>,
}

impl TokenPattern {
    pub fn new(
        id: PatternId,
        name: impl Into<String>,
        kind: PatternKind,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            pattern: pattern.into(),
            ignore_case: false,
            error: false,
            error_message: None,
            ignore: false,
            ignore_message: None,
            debug_info: None,
        }
    }

    pub fn id(&self) -> PatternId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    /// Marks this pattern as an error token: a lexical match that should be
    /// surfaced to the caller as `ParseError::InvalidToken` rather than
    /// returned as an ordinary token.
    pub fn with_error(mut self, message: Option<String>) -> Self {
        self.error = true;
        self.error_message = message;
        self
    }

    /// Marks this pattern as ignored: matched tokens are dropped (but still
    /// linked into the token stream when list-linking is enabled).
    pub fn with_ignore(mut self, message: Option<String>) -> Self {
        self.ignore = true;
        self.ignore_message = message;
        self
    }

    pub fn with_debug_info(mut self, info: impl Into<String>) -> Self {
        self.debug_info = Some(info.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_ignore(&self) -> bool {
        self.ignore
    }

    pub fn ignore_message(&self) -> Option<&str> {
        self.ignore_message.as_deref()
    }

    pub fn debug_info(&self) -> Option<&str> {
        self.debug_info.as_deref()
    }
}

/// The running "current best match" during a tokenizer scan: tracks the
/// longest match seen so far, with ties broken toward the lowest pattern id
/// (spec invariant 1, first-declared wins).
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenMatch {
    pattern_id: Option<PatternId>,
    length: usize,
}

impl TokenMatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a candidate match of `length` characters for pattern `id`.
    /// Replaces the current best match only if `length` is strictly
    /// greater, or equal with a lower id.
    pub fn offer(&mut self, id: PatternId, length: usize) {
        let better = match self.pattern_id {
            None => true,
            Some(current_id) => length > self.length || (length == self.length && id < current_id),
        };
        if better {
            self.pattern_id = Some(id);
            self.length = length;
        }
    }

    pub fn pattern_id(&self) -> Option<PatternId> {
        self.pattern_id
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_match(&self) -> bool {
        self.pattern_id.is_some()
    }
}

/// Index of a [`Token`] within a [`crate::tokenizer::TokenStream`]'s
/// doubly-linked chain.
pub type TokenIndex = usize;

/// A single emitted token: the matched pattern, the exact text it matched,
/// and its source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pattern_id: PatternId,
    image: String,
    start: Position,
    end: Position,
    prev: Option<TokenIndex>,
    next: Option<TokenIndex>,
}

impl Token {
    pub fn new(pattern_id: PatternId, image: String, start: Position) -> Self {
        let end = end_position(start, &image);
        Self {
            pattern_id,
            image,
            start,
            end,
            prev: None,
            next: None,
        }
    }

    pub fn pattern_id(&self) -> PatternId {
        self.pattern_id
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn prev(&self) -> Option<TokenIndex> {
        self.prev
    }

    pub fn next(&self) -> Option<TokenIndex> {
        self.next
    }

    pub(crate) fn set_prev(&mut self, prev: Option<TokenIndex>) {
        self.prev = prev;
    }

    pub(crate) fn set_next(&mut self, next: Option<TokenIndex>) {
        self.next = next;
    }
}

/// Derives `end` from `start` and `image`, per the data model invariant that
/// `end_*` is always derived rather than stored independently.
fn end_position(start: Position, image: &str) -> Position {
    let mut line = start.line;
    let mut column = start.column;
    for c in image.chars() {
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    Position::new(line, column)
}
