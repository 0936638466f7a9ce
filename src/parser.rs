//! The top-level [`Parser`]: the grammar-construction API (spec §6) and the
//! run API that ties a prepared grammar to an input source.

use crate::config::ParserConfig;
use crate::driver::{Callback, DefaultCallback, RecursiveDescentDriver};
use crate::error::{GrammarError, ParserLog};
use crate::grammar::{Analysis, Grammar, ProductionId, ProductionPattern};
use crate::reader::CharSource;
use crate::token::{PatternId, TokenPattern};
use crate::tokenizer::{TokenStream, Tokenizer};
use crate::tree::Tree;

/// A grammar being assembled, then prepared and run against any number of
/// inputs.
///
/// Construction (`add_pattern`/`add_production`) and running (`parse`) are
/// deliberately kept separate by `prepare`: look-ahead analysis is the
/// expensive step, and a grammar built once is meant to parse many inputs
/// without repeating it.
///
/// ```
/// use lltk::{Alternative, Element, Parser, ParserConfig, PatternKind, Production, TokenPattern};
///
/// let mut parser = Parser::new(ParserConfig::new());
/// parser.add_pattern(TokenPattern::new(1, "NUM", PatternKind::RegExp, "[0-9]+"));
/// parser.add_pattern(TokenPattern::new(2, "PLUS", PatternKind::String, "+"));
/// parser.add_pattern(
///     TokenPattern::new(3, "WS", PatternKind::RegExp, r"\s+").with_ignore(None),
/// );
/// let mut sum = Production::new(0, "sum");
/// sum.add_alternative(Alternative::new(vec![
///     Element::token(1),
///     Element::token(2),
///     Element::token(1),
/// ]));
/// parser.add_production(sum);
/// parser.prepare().unwrap();
///
/// let tree = parser.parse("1 + 2").unwrap();
/// assert!(tree.root().is_some());
/// ```
pub struct Parser {
    grammar: Grammar,
    patterns: Vec<TokenPattern>,
    config: ParserConfig,
    analysis: Option<Analysis>,
}

/// Re-exported as `Production` for the grammar construction API; same type
/// as [`crate::grammar::ProductionPattern`], just a friendlier name for
/// callers who never touch the grammar module directly.
pub type Production = ProductionPattern;

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            grammar: Grammar::new(),
            patterns: Vec::new(),
            config,
            analysis: None,
        }
    }

    /// Registers one token pattern. Order matters only as a tie-breaker
    /// between equal-length matches (spec invariant 1): declare the more
    /// specific pattern first.
    pub fn add_pattern(&mut self, pattern: TokenPattern) -> &mut Self {
        self.patterns.push(pattern);
        self.analysis = None;
        self
    }

    /// Registers one production. The first production added becomes the
    /// start production unless [`Parser::set_start`] says otherwise.
    pub fn add_production(&mut self, production: ProductionPattern) -> &mut Self {
        self.grammar.add_production(production);
        self.analysis = None;
        self
    }

    pub fn set_start(&mut self, id: ProductionId) -> &mut Self {
        self.grammar.set_start(id);
        self.analysis = None;
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Runs the look-ahead analyzer over the current grammar. Must succeed
    /// before [`Parser::parse`] — calling `parse` beforehand panics.
    pub fn prepare(&mut self) -> Result<(), GrammarError> {
        self.analysis = Some(self.grammar.analyze(self.config.max_look_ahead)?);
        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        self.analysis.is_some()
    }

    /// Parses `input` from scratch, building the tree with the default
    /// (no-op) callback.
    pub fn parse(&self, input: &str) -> Result<Tree, ParserLog> {
        let mut callback = DefaultCallback;
        self.parse_with(input, &mut callback)
    }

    /// Parses `input`, invoking `callback` at every node boundary (spec
    /// §4.9's analyzer hook).
    pub fn parse_with(&self, input: &str, callback: &mut dyn Callback) -> Result<Tree, ParserLog> {
        self.parse_source(crate::reader::StrSource::new(input), callback)
    }

    /// Parses from an arbitrary [`CharSource`], e.g. a [`crate::reader::Utf8Source`]
    /// wrapping a `Read`.
    pub fn parse_source<S: CharSource>(
        &self,
        source: S,
        callback: &mut dyn Callback,
    ) -> Result<Tree, ParserLog> {
        let analysis = self
            .analysis
            .as_ref()
            .expect("Parser::prepare must succeed before Parser::parse");
        let tokenizer = Tokenizer::new(source, self.patterns.clone())
            .expect("token patterns already validated by Parser::prepare")
            .with_token_list(self.config.link_tokens);
        RecursiveDescentDriver::new(&self.grammar, analysis, tokenizer, &self.config, callback).run()
    }

    /// Parses `input` exactly as [`Parser::parse`] does, but also threads
    /// every token (ignored ones included) into the returned [`LinkedParse`]'s
    /// [`TokenStream`] (spec §4.6), regardless of [`ParserConfig::link_tokens`]
    /// — calling this method is itself the opt-in.
    pub fn parse_linked(&self, input: &str) -> Result<LinkedParse, ParserLog> {
        let mut callback = DefaultCallback;
        self.parse_source_linked(crate::reader::StrSource::new(input), &mut callback)
    }

    /// The [`Parser::parse_source`] counterpart to [`Parser::parse_linked`].
    pub fn parse_source_linked<S: CharSource>(
        &self,
        source: S,
        callback: &mut dyn Callback,
    ) -> Result<LinkedParse, ParserLog> {
        let analysis = self
            .analysis
            .as_ref()
            .expect("Parser::prepare must succeed before Parser::parse");
        let tokenizer = Tokenizer::new(source, self.patterns.clone())
            .expect("token patterns already validated by Parser::prepare")
            .with_token_list(true);
        let (tree, tokens) =
            RecursiveDescentDriver::new(&self.grammar, analysis, tokenizer, &self.config, callback)
                .run_linked()?;
        Ok(LinkedParse {
            tree,
            tokens: tokens.expect("with_token_list(true) always yields a stream"),
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn pattern(&self, id: PatternId) -> Option<&TokenPattern> {
        self.patterns.iter().find(|p| p.id() == id)
    }
}

/// A convenience pairing of a [`Parser`] with the [`TokenStream`] it most
/// recently linked, returned by [`Parser::parse_linked`]/
/// [`Parser::parse_source_linked`] for callers that need to walk ignored
/// tokens (comments, whitespace) around a node.
///
/// `Parser` itself stays stateless between parses (each call builds its own
/// `Tokenizer`, and with it its own `TokenStream`), so this exists purely to
/// hand the stream back to a caller that asked for one; the plain
/// `Parser::parse` family does not return it, keeping the common, unlinked
/// path free of an unused token list.
pub struct LinkedParse {
    pub tree: Tree,
    pub tokens: TokenStream,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Alternative, Element};
    use crate::token::PatternKind;

    fn pat(id: PatternId, name: &str, kind: PatternKind, pattern: &str) -> TokenPattern {
        TokenPattern::new(id, name, kind, pattern)
    }

    fn sum_parser() -> Parser {
        let mut parser = Parser::new(ParserConfig::new());
        parser.add_pattern(pat(1, "NUM", PatternKind::RegExp, r"[0-9]+"));
        parser.add_pattern(pat(2, "PLUS", PatternKind::String, "+"));
        parser.add_pattern(pat(3, "WS", PatternKind::RegExp, r"\s+").with_ignore(None));
        let mut sum = Production::new(0, "sum");
        sum.add_alternative(Alternative::new(vec![
            Element::token(1),
            Element::token(2),
            Element::token(1),
        ]));
        parser.add_production(sum);
        parser
    }

    #[test]
    fn prepare_then_parse_builds_a_tree() {
        let mut parser = sum_parser();
        parser.prepare().unwrap();
        let tree = parser.parse("1 + 2").unwrap();
        assert_eq!(tree.node(tree.root().unwrap()).children().len(), 3);
    }

    #[test]
    fn editing_the_grammar_after_prepare_invalidates_the_analysis() {
        let mut parser = sum_parser();
        parser.prepare().unwrap();
        assert!(parser.is_prepared());
        parser.add_pattern(pat(4, "MINUS", PatternKind::String, "-"));
        assert!(!parser.is_prepared());
    }

    #[test]
    #[should_panic(expected = "Parser::prepare")]
    fn parsing_before_prepare_panics() {
        let parser = sum_parser();
        let _ = parser.parse("1 + 2");
    }

    #[test]
    fn parse_linked_threads_ignored_tokens_into_the_token_stream() {
        let mut parser = sum_parser();
        parser.prepare().unwrap();
        let linked = parser.parse_linked("1 + 2").unwrap();
        assert_eq!(linked.tree.node(linked.tree.root().unwrap()).children().len(), 3);
        // NUM, WS, PLUS, WS, NUM: the whitespace the plain `parse` path
        // discards is still present here.
        assert_eq!(linked.tokens.len(), 5);
        assert_eq!(linked.tokens.get(1).image(), " ");
    }

    #[test]
    fn invalid_grammar_is_rejected_at_prepare() {
        let mut parser = Parser::new(ParserConfig::new());
        parser.add_pattern(pat(1, "A", PatternKind::String, "a"));
        let mut start = Production::new(0, "start");
        start.add_alternative(Alternative::new(vec![Element::production(0)]));
        parser.add_production(start);
        assert!(parser.prepare().is_err());
    }
}
