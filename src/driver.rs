//! `RecursiveDescentDriver`: walks a `Grammar` + `Analysis` against a
//! `Tokenizer`, building a `Tree` one production call at a time and
//! recovering from errors in panic mode rather than aborting on the first
//! mismatch.
//!
//! Look-ahead decisions never consume a token speculatively: every
//! alternative and every repeatable element is checked against its
//! precomputed `LookAheadSet` using only tokens already buffered, and a
//! token is only ever popped once the driver has committed to consuming it.

use crate::config::ParserConfig;
use crate::error::{ParseError, ParserLog, Position};
use crate::grammar::{Analysis, Element, ElementKind, Grammar, LookAheadSet, ProductionId, ProductionPattern};
use crate::limit::LimitTracker;
use crate::reader::CharSource;
use crate::token::{PatternId, Token};
use crate::tokenizer::{TokenStream, Tokenizer};
use crate::tree::{NodeId, Tree};
use std::collections::{BTreeSet, VecDeque};

/// How many clean tokens the driver must consume after an error before it
/// will record another one for the same production. Without this a single
/// bad token can produce a cascade of near-duplicate diagnostics as the
/// driver keeps retrying and failing at the same position.
const RECOVERY_COOLDOWN: i32 = 3;

/// Hooks a caller can use to observe tree construction as it happens, or to
/// reject a subtree on semantic grounds.
///
/// The default, no-op implementation is what `Parser::parse` uses when the
/// caller supplies none: the tree is always built verbatim regardless of
/// whether a callback is installed, so these hooks are purely observational
/// (and, via `exit`, an extra place to raise a semantic error) rather than a
/// way to change what gets built.
pub trait Callback {
    /// Called once a production's node exists, before any of its children
    /// are parsed. Synthetic productions have no node of their own and this
    /// is not called for them.
    fn enter(&mut self, _node: NodeId, _tree: &Tree) {}

    /// Called once every element of a production's chosen alternative has
    /// been parsed. Returning `Err` records an `Analysis` error at the
    /// current position without entering panic-mode recovery — the subtree
    /// itself is left exactly as built.
    fn exit(&mut self, _node: NodeId, _tree: &mut Tree) -> Result<(), String> {
        Ok(())
    }

    /// Called whenever a node (token or production) is attached under
    /// `parent`. For a child produced by a synthetic production, `parent` is
    /// the nearest non-synthetic ancestor, since the synthetic production
    /// contributes no node of its own.
    fn child(&mut self, _parent: NodeId, _child: NodeId, _tree: &Tree) {}
}

/// The callback used when a caller installs none: observes nothing.
#[derive(Debug, Default)]
pub struct DefaultCallback;

impl Callback for DefaultCallback {}

/// Internal signal that the parse cannot continue (hit a limit, ran out of
/// input, or an I/O error): the error has already been recorded in the log,
/// this just unwinds the recursive descent.
struct Abort;

type DriverResult<T> = Result<T, Abort>;

fn sequence_matches(set: &LookAheadSet, ids: &[PatternId]) -> bool {
    set.sequences().any(|seq| ids.starts_with(seq.ids()))
}

/// Drives one parse of a single input against a grammar's `Analysis`.
///
/// Constructed fresh for every `Parser::parse` call; does not outlive it.
pub struct RecursiveDescentDriver<'g, S> {
    grammar: &'g Grammar,
    analysis: &'g Analysis,
    tokenizer: Tokenizer<S>,
    pending: VecDeque<Token>,
    tree: Tree,
    errors: ParserLog,
    recursion: LimitTracker,
    tokens: LimitTracker,
    recovery: i32,
    last_position: Position,
    callback: &'g mut dyn Callback,
}

impl<'g, S: CharSource> RecursiveDescentDriver<'g, S> {
    pub fn new(
        grammar: &'g Grammar,
        analysis: &'g Analysis,
        tokenizer: Tokenizer<S>,
        config: &ParserConfig,
        callback: &'g mut dyn Callback,
    ) -> Self {
        let last_position = tokenizer.position();
        Self {
            grammar,
            analysis,
            tokenizer,
            pending: VecDeque::new(),
            tree: Tree::new(),
            errors: ParserLog::default(),
            recursion: LimitTracker::new(config.recursion_limit),
            tokens: LimitTracker::new(config.token_limit),
            recovery: -1,
            last_position,
            callback,
        }
    }

    /// Parses a full input from the start production, returning the tree on
    /// success or the accumulated error log otherwise. A non-empty log is
    /// always an error even when the recursive descent itself "completed" —
    /// recoverable errors leave a degraded but non-empty tree behind that
    /// this deliberately discards in favor of the log (spec §7).
    pub fn run(mut self) -> Result<Tree, ParserLog> {
        self.run_to_completion();
        if self.errors.is_empty() {
            Ok(self.tree)
        } else {
            Err(self.errors)
        }
    }

    /// Like [`RecursiveDescentDriver::run`], but also hands back whatever
    /// token list the tokenizer accumulated — only ever `Some` when the
    /// tokenizer was built with [`Tokenizer::with_token_list`] enabled.
    pub fn run_linked(mut self) -> Result<(Tree, Option<TokenStream>), ParserLog> {
        self.run_to_completion();
        let stream = self.tokenizer.into_token_stream();
        if self.errors.is_empty() {
            Ok((self.tree, stream))
        } else {
            Err(self.errors)
        }
    }

    fn run_to_completion(&mut self) {
        let start = self
            .grammar
            .start()
            .expect("validated at Parser::prepare");
        let _ = self.parse_production(start, None);
    }

    fn fatal<T>(&mut self, error: ParseError) -> DriverResult<T> {
        self.errors.push(error);
        Err(Abort)
    }

    /// Records a recoverable error (subject to the cooldown, so a run of
    /// mismatches at the same spot is reported once) without consuming
    /// anything — used for errors the tokenizer has already resynchronized
    /// past on its own.
    fn record_recoverable(&mut self, error: ParseError) {
        if self.recovery <= 0 {
            self.errors.push(error);
        }
        self.recovery = RECOVERY_COOLDOWN;
    }

    /// Records a recoverable syntax error and skips one token to
    /// resynchronize, per the panic-mode scheme (spec §4.9, §7).
    fn note_error(&mut self, error: ParseError) -> DriverResult<()> {
        let position = error.position();
        if self.recovery <= 0 {
            self.errors.push(error);
        }
        self.recovery = RECOVERY_COOLDOWN;
        match self.pop()? {
            Some(_) => Ok(()),
            None => self.fatal(ParseError::UnexpectedEof(position)),
        }
    }

    fn on_token_consumed(&mut self) {
        if self.recovery >= 0 {
            self.recovery -= 1;
        }
    }

    fn callbacks_suppressed(&self) -> bool {
        self.recovery >= 0
    }

    /// Tops up `pending` to at least `n` tokens (fewer only at end of
    /// input), transparently resynchronizing past any recoverable lexical
    /// error the tokenizer raises along the way.
    fn fill(&mut self, n: usize) -> DriverResult<()> {
        while self.pending.len() < n {
            match self.tokenizer.next_token() {
                Ok(Some(token)) => {
                    self.tokens.consume();
                    self.last_position = token.end();
                    if self.tokens.limited() {
                        return self.fatal(ParseError::TokenLimitExceeded(token.start()));
                    }
                    self.pending.push_back(token);
                }
                Ok(None) => break,
                Err(e) if e.is_recoverable() => self.record_recoverable(e),
                Err(e) => return self.fatal(e),
            }
        }
        Ok(())
    }

    fn peek_ids(&mut self, k: usize) -> DriverResult<Vec<PatternId>> {
        self.fill(k.max(1))?;
        Ok(self.pending.iter().take(k.max(1)).map(Token::pattern_id).collect())
    }

    fn pop(&mut self) -> DriverResult<Option<Token>> {
        self.fill(1)?;
        Ok(self.pending.pop_front())
    }

    fn pattern_name(&self, id: PatternId) -> String {
        self.tokenizer.pattern(id).name().to_string()
    }

    fn invoke_child(&mut self, parent: Option<NodeId>, child: NodeId) {
        if self.callbacks_suppressed() {
            return;
        }
        if let Some(parent) = parent {
            self.callback.child(parent, child, &self.tree);
        }
    }

    fn expect_token(&mut self, id: PatternId) -> DriverResult<Token> {
        loop {
            let ids = self.peek_ids(1)?;
            match ids.first() {
                Some(&pid) if pid == id => {
                    let token = self.pop()?.expect("just peeked");
                    self.on_token_consumed();
                    return Ok(token);
                }
                Some(_) => {
                    let token = self.pending.front().expect("peeked above");
                    let error = ParseError::UnexpectedToken {
                        image: token.image().to_string(),
                        expected: vec![self.pattern_name(id)],
                        position: token.start(),
                    };
                    self.note_error(error)?;
                }
                None => {
                    return self.fatal(ParseError::UnexpectedEof(self.last_position));
                }
            }
        }
    }

    /// The union of every alternative's next-token set, for the
    /// "expected one of ..." half of an `UnexpectedToken` raised at a
    /// production boundary.
    fn expected_tokens(&self, production: ProductionId) -> Vec<String> {
        let mut ids = BTreeSet::new();
        if let Some(sets) = self.analysis.look_aheads(production) {
            for set in sets {
                ids.extend(set.next_set());
            }
        }
        ids.into_iter().map(|id| self.pattern_name(id)).collect()
    }

    fn select_alternative(&mut self, production: ProductionId, alt_count: usize) -> DriverResult<usize> {
        let default = self.analysis.default_alternative(production);
        loop {
            let k = (0..alt_count)
                .filter_map(|i| self.analysis.look_ahead(production, i))
                .map(LookAheadSet::k)
                .max()
                .unwrap_or(1)
                .max(1);
            let ids = self.peek_ids(k)?;
            for i in 0..alt_count {
                if Some(i) == default {
                    continue;
                }
                let la = self
                    .analysis
                    .look_ahead(production, i)
                    .expect("look-ahead computed for every alternative");
                if sequence_matches(la, &ids) {
                    return Ok(i);
                }
            }
            if let Some(d) = default {
                return Ok(d);
            }
            let (image, position) = match self.pending.front() {
                Some(token) => (token.image().to_string(), token.start()),
                None => return self.fatal(ParseError::UnexpectedEof(self.last_position)),
            };
            let error = ParseError::UnexpectedToken {
                image,
                expected: self.expected_tokens(production),
                position,
            };
            self.note_error(error)?;
        }
    }

    fn parse_production(&mut self, id: ProductionId, parent: Option<NodeId>) -> DriverResult<Option<NodeId>> {
        self.recursion.consume();
        if self.recursion.limited() {
            self.recursion.release();
            return self.fatal(ParseError::RecursionLimitExceeded(self.last_position));
        }
        let grammar = self.grammar;
        let production = grammar
            .production(id)
            .expect("production id validated at Parser::prepare");
        let result = self.parse_production_body(production, parent);
        self.recursion.release();
        result
    }

    fn parse_production_body(
        &mut self,
        production: &'g ProductionPattern,
        parent: Option<NodeId>,
    ) -> DriverResult<Option<NodeId>> {
        let alt_idx = self.select_alternative(production.id(), production.alternatives().len())?;
        let synthetic = production.is_synthetic();
        let own_node = if synthetic {
            None
        } else {
            Some(
                self.tree
                    .add_production(parent, production.id(), production.name(), alt_idx),
            )
        };
        let attach_point = own_node.or(parent);

        if let Some(node) = own_node {
            if !self.callbacks_suppressed() {
                self.callback.enter(node, &self.tree);
            }
        }

        let alternative = &production.alternatives()[alt_idx];
        for (elem_idx, element) in alternative.elements().iter().enumerate() {
            self.parse_element(production.id(), alt_idx, elem_idx, element, attach_point)?;
        }

        if let Some(node) = own_node {
            if !self.callbacks_suppressed() {
                if let Err(message) = self.callback.exit(node, &mut self.tree) {
                    self.errors.push(ParseError::Analysis {
                        message,
                        position: self.last_position,
                    });
                }
            }
        }

        Ok(own_node)
    }

    fn parse_element(
        &mut self,
        production: ProductionId,
        alt_idx: usize,
        elem_idx: usize,
        element: &Element,
        parent: Option<NodeId>,
    ) -> DriverResult<()> {
        let mut count: u32 = 0;
        loop {
            if let Some(max) = element.max() {
                if count >= max {
                    break;
                }
            }
            if count >= element.min() {
                match self.analysis.element_look_ahead((production, alt_idx, elem_idx)) {
                    Some(continuation) => {
                        let k = continuation.k().max(1);
                        let ids = self.peek_ids(k)?;
                        if !sequence_matches(continuation, &ids) {
                            break;
                        }
                    }
                    None => break,
                }
            }
            match element.kind() {
                ElementKind::Token(pattern_id) => {
                    let token = self.expect_token(pattern_id)?;
                    let node = self.tree.add_token(parent, token);
                    self.invoke_child(parent, node);
                }
                ElementKind::Production(prod_id) => {
                    if let Some(child) = self.parse_production(prod_id, parent)? {
                        self.invoke_child(parent, child);
                    }
                }
            }
            count += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Alternative, Grammar, ProductionPattern};
    use crate::reader::StrSource;
    use crate::token::{PatternKind, TokenPattern};

    fn pat(id: PatternId, name: &str, kind: PatternKind, pattern: &str) -> TokenPattern {
        TokenPattern::new(id, name, kind, pattern)
    }

    fn run(grammar: &Grammar, patterns: Vec<TokenPattern>, input: &str) -> Result<Tree, ParserLog> {
        let analysis = grammar.analyze(4).unwrap();
        let tokenizer = Tokenizer::new(StrSource::new(input), patterns).unwrap();
        let config = ParserConfig::default();
        let mut callback = DefaultCallback;
        RecursiveDescentDriver::new(grammar, &analysis, tokenizer, &config, &mut callback).run()
    }

    /// start -> NUM PLUS NUM
    fn arithmetic_grammar() -> (Grammar, Vec<TokenPattern>) {
        let mut start = ProductionPattern::new(0, "start");
        start.add_alternative(Alternative::new(vec![
            Element::token(1),
            Element::token(2),
            Element::token(1),
        ]));
        let mut grammar = Grammar::new();
        grammar.add_production(start);
        let patterns = vec![
            pat(1, "NUM", PatternKind::RegExp, r"[0-9]+"),
            pat(2, "PLUS", PatternKind::String, "+"),
            pat(3, "WS", PatternKind::RegExp, r"\s+").with_ignore(None),
        ];
        (grammar, patterns)
    }

    #[test]
    fn well_formed_input_parses_into_expected_tree_shape() {
        let (grammar, patterns) = arithmetic_grammar();
        let tree = run(&grammar, patterns, "1 + 2").unwrap();
        let root = tree.node(tree.root().unwrap());
        assert_eq!(root.children().len(), 3);
    }

    #[test]
    fn missing_token_raises_one_recorded_error() {
        let (grammar, patterns) = arithmetic_grammar();
        let log = run(&grammar, patterns, "1 2").unwrap_err();
        assert_eq!(log.len(), 1);
        match &log.errors()[0] {
            ParseError::UnexpectedToken { image, .. } => assert_eq!(image, "2"),
            other => panic!("expected UnexpectedToken, got {other:?}"),
        }
    }

    #[test]
    fn recovery_cooldown_suppresses_cascading_errors_at_same_position() {
        // start -> A B, with neither A nor B able to match the stray input,
        // forcing the driver to skip several tokens in a row before B's
        // expect_token finally succeeds.
        let mut a = ProductionPattern::new(1, "A");
        a.add_alternative(Alternative::new(vec![Element::token(1)]));
        let mut start = ProductionPattern::new(0, "start");
        start.add_alternative(Alternative::new(vec![Element::production(1), Element::token(2)]));
        let mut grammar = Grammar::new();
        grammar.add_production(start);
        grammar.add_production(a);
        let patterns = vec![
            pat(1, "A_TOK", PatternKind::String, "a"),
            pat(2, "B_TOK", PatternKind::String, "b"),
            pat(3, "JUNK", PatternKind::RegExp, r"[xyz]"),
            pat(4, "WS", PatternKind::RegExp, r"\s+").with_ignore(None),
        ];
        let log = run(&grammar, patterns, "a x y z b").unwrap_err();
        assert_eq!(log.len(), 1, "repeated junk at the same spot should be reported once");
    }

    #[test]
    fn end_of_input_mid_production_is_unexpected_eof() {
        let (grammar, patterns) = arithmetic_grammar();
        let log = run(&grammar, patterns, "1 +").unwrap_err();
        assert!(matches!(log.errors()[0], ParseError::UnexpectedEof(_)));
    }

    #[test]
    fn recursion_limit_aborts_deeply_nested_parses() {
        // expr -> LPAREN expr RPAREN | NUM
        let mut expr = ProductionPattern::new(0, "expr");
        expr.add_alternative(Alternative::new(vec![
            Element::token(1),
            Element::production(0),
            Element::token(2),
        ]));
        expr.add_alternative(Alternative::new(vec![Element::token(3)]));
        let mut grammar = Grammar::new();
        grammar.add_production(expr);
        let patterns = vec![
            pat(1, "LPAREN", PatternKind::String, "("),
            pat(2, "RPAREN", PatternKind::String, ")"),
            pat(3, "NUM", PatternKind::RegExp, r"[0-9]+"),
        ];
        let analysis = grammar.analyze(2).unwrap();
        let input = "(".repeat(10);
        let tokenizer = Tokenizer::new(StrSource::new(&input), patterns).unwrap();
        let config = ParserConfig::default().recursion_limit(5);
        let mut callback = DefaultCallback;
        let log = RecursiveDescentDriver::new(&grammar, &analysis, tokenizer, &config, &mut callback)
            .run()
            .unwrap_err();
        assert!(matches!(log.errors()[0], ParseError::RecursionLimitExceeded(_)));
    }

    #[test]
    fn synthetic_production_does_not_create_its_own_node() {
        // start -> group NUM, group -> PLUS (synthetic: flattened into start)
        let mut group = ProductionPattern::new(1, "group");
        group.add_alternative(Alternative::new(vec![Element::token(2)]));
        group.set_synthetic(true);
        let mut start = ProductionPattern::new(0, "start");
        start.add_alternative(Alternative::new(vec![Element::production(1), Element::token(1)]));
        let mut grammar = Grammar::new();
        grammar.add_production(start);
        grammar.add_production(group);
        let patterns = vec![
            pat(1, "NUM", PatternKind::RegExp, r"[0-9]+"),
            pat(2, "PLUS", PatternKind::String, "+"),
        ];
        let tree = run(&grammar, patterns, "+1").unwrap();
        let root = tree.node(tree.root().unwrap());
        // both the PLUS (from the synthetic `group`) and the NUM attach
        // directly under `start`, not under a node for `group`.
        assert_eq!(root.children().len(), 2);
        assert!(tree.node(root.children()[0]).is_token());
    }
}
