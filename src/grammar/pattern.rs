//! Grammar-level types: productions, their alternatives, and the elements
//! (token or production references) that make them up.

use crate::token::PatternId;

/// Stable identifier for a production, unique across a grammar.
pub type ProductionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Token(PatternId),
    Production(ProductionId),
}

/// One element of an alternative: a token or production reference, with a
/// repetition count. `?` is `{0,1}`, `*` is `{0,}`, `+` is `{1,}`; a bare
/// reference defaults to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    kind: ElementKind,
    min: u32,
    max: Option<u32>,
}

impl Element {
    pub fn token(id: PatternId) -> Self {
        Self {
            kind: ElementKind::Token(id),
            min: 1,
            max: Some(1),
        }
    }

    pub fn production(id: ProductionId) -> Self {
        Self {
            kind: ElementKind::Production(id),
            min: 1,
            max: Some(1),
        }
    }

    pub fn optional(mut self) -> Self {
        self.min = 0;
        self.max = Some(1);
        self
    }

    pub fn repeated(mut self) -> Self {
        self.min = 0;
        self.max = None;
        self
    }

    pub fn at_least_one(mut self) -> Self {
        self.min = 1;
        self.max = None;
        self
    }

    pub fn with_count(mut self, min: u32, max: Option<u32>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> Option<u32> {
        self.max
    }

    pub fn is_optional(&self) -> bool {
        self.min == 0
    }

    pub fn is_repeating(&self) -> bool {
        self.max != Some(1)
    }
}

/// A single right-hand side of a production: an ordered sequence of
/// elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Alternative {
    elements: Vec<Element>,
}

impl Alternative {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends one more element, for callers building an alternative
    /// incrementally (the grammar construction API in spec §6).
    pub fn add_element(&mut self, element: Element) -> &mut Self {
        self.elements.push(element);
        self
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// A named non-terminal: one or more alternatives, any one of which may be
/// chosen at parse time based on look-ahead.
#[derive(Debug, Clone)]
pub struct ProductionPattern {
    id: ProductionId,
    name: String,
    alternatives: Vec<Alternative>,
    default_alternative: Option<usize>,
    synthetic: bool,
}

impl ProductionPattern {
    pub fn new(id: ProductionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            alternatives: Vec::new(),
            default_alternative: None,
            synthetic: false,
        }
    }

    /// Marks this production as synthetic: a higher layer (e.g. a
    /// grammar-file front-end desugaring `(...)` groups) inserted it, and it
    /// should not create its own node in the parse tree — its children are
    /// flattened into whichever production referenced it.
    pub fn set_synthetic(&mut self, synthetic: bool) {
        self.synthetic = synthetic;
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn add_alternative(&mut self, alternative: Alternative) -> usize {
        self.alternatives.push(alternative);
        self.alternatives.len() - 1
    }

    pub fn id(&self) -> ProductionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    /// Marks `index` as the alternative the driver should pick when more
    /// than one alternative's look-ahead set matches the actual input.
    /// Without this, such a conflict is a fatal `InherentAmbiguity` at
    /// grammar preparation time.
    pub fn set_default_alternative(&mut self, index: usize) {
        self.default_alternative = Some(index);
    }

    pub fn default_alternative(&self) -> Option<usize> {
        self.default_alternative
    }
}
