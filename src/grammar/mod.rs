//! Grammar model: productions, alternatives, elements, and the look-ahead
//! algebra and analyzer built on top of them.

pub mod analyzer;
pub mod lookahead;
pub mod pattern;

pub use analyzer::{Analysis, LookAheadAnalyzer};
pub use lookahead::{LookAheadSet, Sequence};
pub use pattern::{Alternative, Element, ElementKind, ProductionId, ProductionPattern};

use crate::error::GrammarError;
use std::collections::HashMap;

/// The production side of a grammar: every `ProductionPattern`, keyed by
/// id, plus which one is the start production.
#[derive(Debug, Default)]
pub struct Grammar {
    productions: HashMap<ProductionId, ProductionPattern>,
    start: Option<ProductionId>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_production(&mut self, production: ProductionPattern) {
        if self.start.is_none() {
            self.start = Some(production.id());
        }
        self.productions.insert(production.id(), production);
    }

    pub fn set_start(&mut self, id: ProductionId) {
        self.start = Some(id);
    }

    pub fn start(&self) -> Option<ProductionId> {
        self.start
    }

    pub fn production(&self, id: ProductionId) -> Option<&ProductionPattern> {
        self.productions.get(&id)
    }

    pub fn productions(&self) -> impl Iterator<Item = &ProductionPattern> {
        self.productions.values()
    }

    /// Runs the look-ahead analyzer over this grammar, growing `k` up to
    /// `max_k`.
    pub fn analyze(&self, max_k: usize) -> Result<Analysis, GrammarError> {
        let start = self.start.ok_or_else(|| {
            GrammarError::InvalidParser("grammar has no start production".to_string())
        })?;
        LookAheadAnalyzer::new(&self.productions, max_k).analyze(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_without_start_is_an_error() {
        let grammar = Grammar::new();
        let err = grammar.analyze(2).unwrap_err();
        assert_eq!(
            err,
            GrammarError::InvalidParser("grammar has no start production".to_string())
        );
    }

    #[test]
    fn first_added_production_becomes_start_by_default() {
        let mut grammar = Grammar::new();
        let mut start = ProductionPattern::new(5, "start");
        start.add_alternative(Alternative::new(vec![Element::token(1)]));
        grammar.add_production(start);
        assert_eq!(grammar.start(), Some(5));
        assert!(grammar.analyze(1).is_ok());
    }
}
