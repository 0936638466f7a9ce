//! The `Tokenizer`: turns a `ReaderBuffer` into a stream of `Token`s by
//! running `StringDfa` and `TokenNfa` side by side at every position and
//! keeping the longer (ties: lower pattern id) of the two matches.

use crate::dfa::StringDfa;
use crate::error::{GrammarError, ParseError, Position};
use crate::nfa::{NfaBuilder, TokenNfa};
use crate::reader::{CharSource, ReaderBuffer};
use crate::regex::compile_with_case;
use crate::token::{PatternId, PatternKind, Token, TokenIndex, TokenMatch, TokenPattern};
use std::collections::HashMap;

/// The persistent, append-only record of every token produced by a
/// `Tokenizer` since construction (or the last `reset`), including ignored
/// ones. Lets a caller walk back to, say, the comment attached just before a
/// given token even though the parser itself never sees ignored tokens.
#[derive(Debug, Default)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    fn push(&mut self, mut token: Token) -> TokenIndex {
        let idx = self.tokens.len();
        if idx > 0 {
            self.tokens[idx - 1].set_next(Some(idx));
            token.set_prev(Some(idx - 1));
        }
        self.tokens.push(token);
        idx
    }

    pub fn get(&self, index: TokenIndex) -> &Token {
        &self.tokens[index]
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Composes a `StringDfa` (fixed strings) and a `TokenNfa` (regular
/// expressions) into a single scanner.
pub struct Tokenizer<S> {
    reader: ReaderBuffer<S>,
    patterns: Vec<TokenPattern>,
    pattern_index: HashMap<PatternId, usize>,
    dfa: StringDfa,
    nfa: TokenNfa,
    stream: Option<TokenStream>,
}

impl<S: CharSource> Tokenizer<S> {
    /// Compiles `patterns` into a `StringDfa` + `TokenNfa` pair and binds
    /// them to `source`. Fails only if a `RegExp` pattern does not parse.
    pub fn new(source: S, patterns: Vec<TokenPattern>) -> Result<Self, GrammarError> {
        let mut dfa = StringDfa::new();
        let mut nfa = TokenNfa::new();
        let mut pattern_index = HashMap::with_capacity(patterns.len());
        for (idx, pattern) in patterns.iter().enumerate() {
            pattern_index.insert(pattern.id(), idx);
            match pattern.kind() {
                PatternKind::String => {
                    dfa.add_match(pattern.pattern(), pattern.ignore_case(), pattern.id())
                }
                PatternKind::RegExp => {
                    let mut builder = NfaBuilder::default();
                    let (start, end) =
                        compile_with_case(pattern.pattern(), pattern.ignore_case(), &mut builder)
                            .map_err(|e| GrammarError::InvalidToken {
                                name: pattern.name().to_string(),
                                detail: e.to_string(),
                            })?;
                    nfa.merge_fragment(builder, start, end, pattern.id());
                }
            }
        }
        Ok(Self {
            reader: ReaderBuffer::new(source),
            patterns,
            pattern_index,
            dfa,
            nfa,
            stream: None,
        })
    }

    /// Enables persistent token-list linking: every token produced, ignored
    /// ones included, is recorded in a `TokenStream` reachable via
    /// `token_stream`.
    pub fn with_token_list(mut self, enabled: bool) -> Self {
        self.stream = if enabled {
            Some(TokenStream::default())
        } else {
            None
        };
        self
    }

    pub fn token_stream(&self) -> Option<&TokenStream> {
        self.stream.as_ref()
    }

    /// Consumes the tokenizer, handing back whatever token list it
    /// accumulated (`None` unless [`Tokenizer::with_token_list`] was
    /// enabled).
    pub fn into_token_stream(self) -> Option<TokenStream> {
        self.stream
    }

    /// Rebinds this tokenizer to a new source, discarding all buffered input
    /// and any linked token list.
    pub fn reset(&mut self, source: S) {
        self.reader.reset(source);
        if let Some(stream) = self.stream.as_mut() {
            *stream = TokenStream::default();
        }
    }

    /// Returns the next non-ignored token, or `Ok(None)` at end of input.
    ///
    /// Ignored tokens (whitespace, comments, ...) are consumed silently
    /// in-between, still recorded to the token list if linking is enabled.
    /// A pattern marked as an error token surfaces as `ParseError::InvalidToken`
    /// instead of ever being returned.
    pub fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        loop {
            if let Some(message) = self.reader.take_io_error() {
                return Err(ParseError::Io(message, self.reader.position()));
            }
            let start = self.reader.position();
            if self.reader.peek(0).is_none() {
                return Ok(None);
            }

            let mut best = TokenMatch::new();
            if let Some((id, len)) = self.dfa.longest_match(|o| self.reader.peek(o)) {
                best.offer(id, len);
            }
            if let Some((id, len)) = self.nfa.longest_match(|o| self.reader.peek(o)) {
                best.offer(id, len);
            }
            if let Some(message) = self.reader.take_io_error() {
                return Err(ParseError::Io(message, start));
            }

            let Some(pattern_id) = best.pattern_id() else {
                let image = self.reader.read(1);
                return Err(ParseError::UnexpectedChar {
                    image,
                    position: start,
                });
            };
            let image = self.reader.read(best.length());
            let pattern = self.pattern(pattern_id);
            let is_error = pattern.is_error();
            let is_ignore = pattern.is_ignore();
            let error_message = pattern.error_message().map(str::to_string);

            if is_error {
                return Err(ParseError::InvalidToken {
                    message: error_message
                        .unwrap_or_else(|| format!("invalid token: {}", pattern.name())),
                    position: start,
                });
            }

            let token = Token::new(pattern_id, image, start);
            if let Some(stream) = self.stream.as_mut() {
                stream.push(token.clone());
            }
            if is_ignore {
                continue;
            }
            return Ok(Some(token));
        }
    }

    pub fn pattern(&self, id: PatternId) -> &TokenPattern {
        &self.patterns[self.pattern_index[&id]]
    }

    /// The reader's current position, for errors raised when no token is
    /// available to carry one (e.g. end of input).
    pub fn position(&self) -> Position {
        self.reader.position()
    }

    pub fn patterns(&self) -> &[TokenPattern] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::StrSource;

    fn tokenizer(input: &str, patterns: Vec<TokenPattern>) -> Tokenizer<StrSource<'_>> {
        Tokenizer::new(StrSource::new(input), patterns).unwrap()
    }

    fn pat(id: PatternId, name: &str, kind: PatternKind, pattern: &str) -> TokenPattern {
        TokenPattern::new(id, name, kind, pattern)
    }

    #[test]
    fn skips_ignored_whitespace_between_tokens() {
        let patterns = vec![
            pat(1, "WS", PatternKind::RegExp, r"\s+").with_ignore(None),
            pat(2, "IDENT", PatternKind::RegExp, r"[a-zA-Z]+"),
        ];
        let mut tz = tokenizer("  foo   bar", patterns);
        let a = tz.next_token().unwrap().unwrap();
        assert_eq!(a.image(), "foo");
        let b = tz.next_token().unwrap().unwrap();
        assert_eq!(b.image(), "bar");
        assert!(tz.next_token().unwrap().is_none());
    }

    #[test]
    fn longest_match_wins_between_dfa_and_nfa() {
        let patterns = vec![
            pat(1, "IF", PatternKind::String, "if"),
            pat(2, "IDENT", PatternKind::RegExp, r"[a-zA-Z]+"),
        ];
        let mut tz = tokenizer("iffy", patterns);
        let tok = tz.next_token().unwrap().unwrap();
        assert_eq!(tok.image(), "iffy");
        assert_eq!(tok.pattern_id(), 2);
    }

    #[test]
    fn error_pattern_surfaces_as_invalid_token() {
        let patterns = vec![
            pat(1, "IDENT", PatternKind::RegExp, r"[a-zA-Z]+"),
            pat(2, "STRAY", PatternKind::RegExp, r"@").with_error(Some("stray char".into())),
        ];
        let mut tz = tokenizer("a@b", patterns);
        assert_eq!(tz.next_token().unwrap().unwrap().image(), "a");
        let err = tz.next_token().unwrap_err();
        assert_eq!(err.to_string(), "invalid token at 1:2: stray char");
    }

    #[test]
    fn unmatched_character_is_unexpected_char() {
        let patterns = vec![pat(1, "IDENT", PatternKind::RegExp, r"[a-zA-Z]+")];
        let mut tz = tokenizer("a#b", patterns);
        assert_eq!(tz.next_token().unwrap().unwrap().image(), "a");
        let err = tz.next_token().unwrap_err();
        match err {
            ParseError::UnexpectedChar { image, .. } => assert_eq!(image, "#"),
            other => panic!("expected UnexpectedChar, got {other:?}"),
        }
    }

    #[test]
    fn ignored_tokens_are_linked_when_enabled() {
        let patterns = vec![
            pat(1, "WS", PatternKind::RegExp, r"\s+").with_ignore(None),
            pat(2, "IDENT", PatternKind::RegExp, r"[a-zA-Z]+"),
        ];
        let mut tz = Tokenizer::new(StrSource::new("a b"), patterns)
            .unwrap()
            .with_token_list(true);
        tz.next_token().unwrap();
        tz.next_token().unwrap();
        let stream = tz.token_stream().unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.get(0).image(), "a");
        assert_eq!(stream.get(1).image(), " ");
        assert_eq!(stream.get(2).image(), "b");
    }
}
