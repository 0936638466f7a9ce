//! `ParserConfig`: the handful of knobs a caller can set before `parse()`,
//! gathered into one struct via chainable setters so `Parser::new` doesn't
//! need a growing list of constructor arguments.

/// Chosen to stay well clear of the native stack limit for a debug build;
/// a release build tolerates a good deal more. Callers parsing deliberately
/// deep grammars (or deliberately adversarial input) should raise this.
pub const DEFAULT_RECURSION_LIMIT: usize = 500;

/// Generous enough that no ordinary grammar trips it; exists to bound
/// pathological inputs (e.g. an `ignore`-flagged pattern that matches the
/// empty string and loops forever emitting zero-width tokens).
pub const DEFAULT_TOKEN_LIMIT: usize = 1_000_000;

/// How far the look-ahead analyzer will grow `k` while chasing a conflict
/// before giving up and reporting whatever ambiguity remains. Every
/// grammar this crate's own tests exercise resolves well under this; a
/// grammar that doesn't is almost certainly ambiguous rather than merely
/// needing a larger cap.
pub const DEFAULT_MAX_LOOK_AHEAD: usize = 8;

/// Configuration for one [`crate::Parser`] instance.
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    pub(crate) recursion_limit: usize,
    pub(crate) token_limit: usize,
    pub(crate) max_look_ahead: usize,
    pub(crate) link_tokens: bool,
}

impl ParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many nested production calls the recursive-descent driver may
    /// make before aborting with `RecursionLimitExceeded`.
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// How many tokens (including ignored ones) the tokenizer may emit in
    /// one parse before aborting with `TokenLimitExceeded`.
    pub fn token_limit(mut self, limit: usize) -> Self {
        self.token_limit = limit;
        self
    }

    /// Enables persistent token-list linking (spec §4.6): every token,
    /// ignored ones included, is threaded into a doubly linked chain a
    /// caller can walk to recover comments/whitespace around a token.
    pub fn link_tokens(mut self, enabled: bool) -> Self {
        self.link_tokens = enabled;
        self
    }

    /// How far the analyzer may grow `k` before reporting an unresolved
    /// conflict as `InherentAmbiguity`.
    pub fn max_look_ahead(mut self, max_k: usize) -> Self {
        self.max_look_ahead = max_k;
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            token_limit: DEFAULT_TOKEN_LIMIT,
            max_look_ahead: DEFAULT_MAX_LOOK_AHEAD,
            link_tokens: false,
        }
    }
}
