#![doc = include_str!("../README.md")]

mod config;
mod dfa;
mod driver;
mod error;
mod grammar;
mod limit;
mod nfa;
mod parser;
mod reader;
mod regex;
mod token;
mod tokenizer;
mod tree;

pub use crate::config::{ParserConfig, DEFAULT_MAX_LOOK_AHEAD, DEFAULT_RECURSION_LIMIT, DEFAULT_TOKEN_LIMIT};
pub use crate::driver::{Callback, DefaultCallback, RecursiveDescentDriver};
pub use crate::error::{GrammarError, ParseError, ParserLog, Position};
pub use crate::grammar::{
    Alternative, Analysis, Element, ElementKind, Grammar, LookAheadAnalyzer, LookAheadSet,
    ProductionId, ProductionPattern, Sequence,
};
pub use crate::limit::LimitTracker;
pub use crate::parser::{LinkedParse, Parser, Production};
pub use crate::reader::{CharSource, StrSource, Utf8Source};
pub use crate::token::{PatternId, PatternKind, Token, TokenIndex, TokenMatch, TokenPattern};
pub use crate::tokenizer::{TokenStream, Tokenizer};
pub use crate::tree::{Node, NodeId, NodeValue, Tree};
