//! Compiles the small regular-expression dialect used by `RegExp` token
//! patterns into NFA fragments (Thompson construction).
//!
//! Supported: alternation `|`, concatenation, grouping `(...)`, character
//! classes `[...]`/`[^...]` with ranges and the `\d \D \s \S \w \W` class
//! escapes, the single-character escapes `\t \n \r \f \a \e`, the numeric
//! escapes `\0ooo` (octal), `\xHH` and `\uHHHH`, `.`, and the quantifiers
//! `? * +` plus the counted forms `{n} {n,} {n,m}`. Only `{0,1}` (optional),
//! `{0,}` (star), `{1,}` (plus), and the degenerate identities `{1,1}` and
//! `{0,0}` compile; every other counted repetition — `a{2}`, `a{2,}`,
//! `a{2,4}` — is rejected with `InvalidRepeatCount` rather than expanded,
//! since this dialect's automaton has no counter construct to build them
//! with.
//!
//! Anchors (`^ $`) and lazy/possessive quantifier suffixes (`*? +? ?? *+ ++
//! ?+`) are rejected: this dialect only ever matches greedily from the
//! current position, so there is nothing for them to mean.

use crate::nfa::{NfaBuilder, StateId, Transition};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexErrorKind {
    UnexpectedChar(char),
    UnterminatedPattern,
    UnsupportedEscape(char),
    UnsupportedSpecial(char),
    InvalidRepeatCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegexError {
    pub kind: RegexErrorKind,
    /// Character offset into the pattern where the error was detected.
    pub offset: usize,
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RegexErrorKind::UnexpectedChar(c) => {
                write!(f, "unexpected '{c}' at offset {}", self.offset)
            }
            RegexErrorKind::UnterminatedPattern => {
                write!(f, "unterminated pattern at offset {}", self.offset)
            }
            RegexErrorKind::UnsupportedEscape(c) => {
                write!(f, "unsupported escape '\\{c}' at offset {}", self.offset)
            }
            RegexErrorKind::UnsupportedSpecial(c) => {
                write!(
                    f,
                    "unsupported construct '{c}' at offset {} (anchors and lazy/possessive quantifiers are not supported)",
                    self.offset
                )
            }
            RegexErrorKind::InvalidRepeatCount => {
                write!(f, "invalid repeat count at offset {}", self.offset)
            }
        }
    }
}

impl std::error::Error for RegexError {}

#[derive(Debug, Clone)]
enum Node {
    Empty,
    Char(char),
    Dot,
    Class {
        negated: bool,
        chars: Vec<char>,
        ranges: Vec<(char, char)>,
    },
    Concat(Vec<Node>),
    Alt(Vec<Node>),
    Star(Box<Node>),
    Plus(Box<Node>),
    Opt(Box<Node>),
}

enum ClassAtom {
    Char(char),
    Shortcut(Vec<char>, Vec<(char, char)>, bool),
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(pattern: &'a str) -> Self {
        Self {
            chars: pattern.chars().peekable(),
            pos: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn err(&self, kind: RegexErrorKind) -> RegexError {
        RegexError {
            kind,
            offset: self.pos,
        }
    }

    fn parse_pattern(&mut self) -> Result<Node, RegexError> {
        let node = self.parse_alt()?;
        if let Some(c) = self.peek() {
            return Err(self.err(RegexErrorKind::UnexpectedChar(c)));
        }
        Ok(node)
    }

    fn parse_alt(&mut self) -> Result<Node, RegexError> {
        let mut branches = vec![self.parse_concat()?];
        while self.peek() == Some('|') {
            self.bump();
            branches.push(self.parse_concat()?);
        }
        Ok(if branches.len() == 1 {
            branches.pop().unwrap()
        } else {
            Node::Alt(branches)
        })
    }

    fn parse_concat(&mut self) -> Result<Node, RegexError> {
        let mut nodes = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            nodes.push(self.parse_repeat()?);
        }
        Ok(match nodes.len() {
            0 => Node::Empty,
            1 => nodes.pop().unwrap(),
            _ => Node::Concat(nodes),
        })
    }

    fn parse_repeat(&mut self) -> Result<Node, RegexError> {
        let atom = self.parse_atom()?;
        let node = match self.peek() {
            Some('?') => {
                self.bump();
                self.reject_lazy_possessive()?;
                Node::Opt(Box::new(atom))
            }
            Some('*') => {
                self.bump();
                self.reject_lazy_possessive()?;
                Node::Star(Box::new(atom))
            }
            Some('+') => {
                self.bump();
                self.reject_lazy_possessive()?;
                Node::Plus(Box::new(atom))
            }
            Some('{') => {
                self.bump();
                let (min, max) = self.parse_repeat_count()?;
                self.reject_lazy_possessive()?;
                self.expand_repeat(atom, min, max)?
            }
            _ => atom,
        };
        Ok(node)
    }

    fn reject_lazy_possessive(&mut self) -> Result<(), RegexError> {
        if matches!(self.peek(), Some('?') | Some('+')) {
            let c = self.peek().unwrap();
            return Err(self.err(RegexErrorKind::UnsupportedSpecial(c)));
        }
        Ok(())
    }

    fn parse_repeat_count(&mut self) -> Result<(u32, Option<u32>), RegexError> {
        let min = self.parse_number()?;
        let max = match self.peek() {
            Some(',') => {
                self.bump();
                if self.peek() == Some('}') {
                    None
                } else {
                    Some(self.parse_number()?)
                }
            }
            _ => Some(min),
        };
        match self.bump() {
            Some('}') => {}
            _ => return Err(self.err(RegexErrorKind::UnterminatedPattern)),
        }
        if let Some(max) = max {
            if max < min {
                return Err(self.err(RegexErrorKind::InvalidRepeatCount));
            }
        }
        Ok((min, max))
    }

    fn parse_number(&mut self) -> Result<u32, RegexError> {
        let mut digits = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            digits.push(self.bump().unwrap());
        }
        if digits.is_empty() {
            return Err(self.err(RegexErrorKind::InvalidRepeatCount));
        }
        digits
            .parse()
            .map_err(|_| self.err(RegexErrorKind::InvalidRepeatCount))
    }

    fn parse_atom(&mut self) -> Result<Node, RegexError> {
        match self.bump() {
            None => Err(self.err(RegexErrorKind::UnterminatedPattern)),
            Some('(') => {
                let inner = self.parse_alt()?;
                match self.bump() {
                    Some(')') => Ok(inner),
                    _ => Err(self.err(RegexErrorKind::UnterminatedPattern)),
                }
            }
            Some('[') => self.parse_class(),
            Some('.') => Ok(Node::Dot),
            Some(c @ ('^' | '$')) => Err(self.err(RegexErrorKind::UnsupportedSpecial(c))),
            Some('\\') => {
                let c = self
                    .bump()
                    .ok_or_else(|| self.err(RegexErrorKind::UnterminatedPattern))?;
                self.parse_escape_body(c)
            }
            Some(c @ ('?' | '*' | '+' | '{' | '|' | ')')) => {
                Err(self.err(RegexErrorKind::UnexpectedChar(c)))
            }
            Some(c) => Ok(Node::Char(c)),
        }
    }

    fn parse_class(&mut self) -> Result<Node, RegexError> {
        let negated = if self.peek() == Some('^') {
            self.bump();
            true
        } else {
            false
        };
        let mut chars = Vec::new();
        let mut ranges = Vec::new();
        let mut first = true;
        loop {
            match self.peek() {
                None => return Err(self.err(RegexErrorKind::UnterminatedPattern)),
                Some(']') if !first => {
                    self.bump();
                    break;
                }
                _ => {}
            }
            first = false;
            match self.class_atom()? {
                ClassAtom::Char(lo) => {
                    if self.peek() == Some('-') {
                        let saved_chars = self.chars.clone();
                        let saved_pos = self.pos;
                        self.bump();
                        if self.peek() == Some(']') {
                            self.chars = saved_chars;
                            self.pos = saved_pos;
                            chars.push(lo);
                        } else {
                            match self.class_atom()? {
                                ClassAtom::Char(hi) => ranges.push((lo, hi)),
                                ClassAtom::Shortcut(..) => {
                                    return Err(self.err(RegexErrorKind::UnexpectedChar('-')))
                                }
                            }
                        }
                    } else {
                        chars.push(lo);
                    }
                }
                ClassAtom::Shortcut(mut sc_chars, mut sc_ranges, negated_shortcut) => {
                    if negated_shortcut {
                        return Err(self.err(RegexErrorKind::UnsupportedEscape('^')));
                    }
                    chars.append(&mut sc_chars);
                    ranges.append(&mut sc_ranges);
                }
            }
        }
        Ok(Node::Class {
            negated,
            chars,
            ranges,
        })
    }

    fn class_atom(&mut self) -> Result<ClassAtom, RegexError> {
        match self.bump() {
            None => Err(self.err(RegexErrorKind::UnterminatedPattern)),
            Some('\\') => {
                let c = self
                    .bump()
                    .ok_or_else(|| self.err(RegexErrorKind::UnterminatedPattern))?;
                match self.parse_escape_body(c)? {
                    Node::Class {
                        negated,
                        chars,
                        ranges,
                    } => Ok(ClassAtom::Shortcut(chars, ranges, negated)),
                    Node::Char(lit) => Ok(ClassAtom::Char(lit)),
                    _ => unreachable!("parse_escape_body only ever returns Char or Class"),
                }
            }
            Some(c) => Ok(ClassAtom::Char(c)),
        }
    }

    /// Dispatches the character immediately after a `\` to either a numeric
    /// escape (`\0ooo`, `\xHH`, `\uHHHH`), read here because it consumes
    /// further characters, or the single-character/class-shortcut table in
    /// [`escape_atom`].
    fn parse_escape_body(&mut self, c: char) -> Result<Node, RegexError> {
        match c {
            'x' => {
                let v = self.hex_digits(2)?;
                self.char_node_from(v)
            }
            'u' => {
                let v = self.hex_digits(4)?;
                self.char_node_from(v)
            }
            '0' => {
                let v = self.octal_digits();
                self.char_node_from(v)
            }
            other => escape_atom(other).map_err(|kind| self.err(kind)),
        }
    }

    fn hex_digits(&mut self, n: usize) -> Result<u32, RegexError> {
        let mut v = 0u32;
        for _ in 0..n {
            let c = self
                .bump()
                .ok_or_else(|| self.err(RegexErrorKind::UnterminatedPattern))?;
            let d = c
                .to_digit(16)
                .ok_or_else(|| self.err(RegexErrorKind::UnsupportedEscape(c)))?;
            v = v * 16 + d;
        }
        Ok(v)
    }

    /// Up to three further octal digits after the leading `0` (so `\0ooo`
    /// covers `0o0000`..`0o0777`, i.e. a full byte's worth of code points
    /// and then some).
    fn octal_digits(&mut self) -> u32 {
        let mut v = 0u32;
        for _ in 0..3 {
            match self.peek() {
                Some(d) if ('0'..='7').contains(&d) => {
                    v = v * 8 + d.to_digit(8).unwrap();
                    self.bump();
                }
                _ => break,
            }
        }
        v
    }

    fn char_node_from(&self, code_point: u32) -> Result<Node, RegexError> {
        char::from_u32(code_point)
            .map(Node::Char)
            .ok_or_else(|| self.err(RegexErrorKind::UnsupportedEscape('x')))
    }

    /// Only the three native shapes — `{0,1}` (optional), `{0,}` (star),
    /// `{1,}` (plus) — and the degenerate identities `{1,1}` (same as the
    /// bare atom) and `{0,0}` (matches only the empty string) are compiled.
    /// Every other counted repetition (`{n}`, `{n,}` for `n>1`, `{n,m}`) is
    /// rejected per spec §4.4 rather than expanded, since this dialect's
    /// automaton has no counter construct to build them with.
    fn expand_repeat(&self, atom: Node, min: u32, max: Option<u32>) -> Result<Node, RegexError> {
        Ok(match (min, max) {
            (0, Some(1)) => Node::Opt(Box::new(atom)),
            (0, None) => Node::Star(Box::new(atom)),
            (1, None) => Node::Plus(Box::new(atom)),
            (1, Some(1)) => atom,
            (0, Some(0)) => Node::Empty,
            _ => return Err(self.err(RegexErrorKind::InvalidRepeatCount)),
        })
    }
}

fn escape_atom(c: char) -> Result<Node, RegexErrorKind> {
    const WHITESPACE: [char; 6] = [' ', '\t', '\n', '\r', '\u{0B}', '\u{0C}'];
    Ok(match c {
        'd' => Node::Class {
            negated: false,
            chars: vec![],
            ranges: vec![('0', '9')],
        },
        'D' => Node::Class {
            negated: true,
            chars: vec![],
            ranges: vec![('0', '9')],
        },
        's' => Node::Class {
            negated: false,
            chars: WHITESPACE.to_vec(),
            ranges: vec![],
        },
        'S' => Node::Class {
            negated: true,
            chars: WHITESPACE.to_vec(),
            ranges: vec![],
        },
        'w' => Node::Class {
            negated: false,
            chars: vec!['_'],
            ranges: vec![('a', 'z'), ('A', 'Z'), ('0', '9')],
        },
        'W' => Node::Class {
            negated: true,
            chars: vec!['_'],
            ranges: vec![('a', 'z'), ('A', 'Z'), ('0', '9')],
        },
        'n' => Node::Char('\n'),
        't' => Node::Char('\t'),
        'r' => Node::Char('\r'),
        'f' => Node::Char('\u{0C}'),
        'a' => Node::Char('\u{07}'),
        'e' => Node::Char('\u{1B}'),
        '\\' | '.' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '*' | '+' | '?' | '^' | '$'
        | '-' => Node::Char(c),
        other => return Err(RegexErrorKind::UnsupportedEscape(other)),
    })
}

fn build(node: &Node, ignore_case: bool, b: &mut NfaBuilder) -> (StateId, StateId) {
    match node {
        Node::Empty => {
            let s = b.new_state();
            (s, s)
        }
        Node::Char(c) => {
            let s = b.new_state();
            let e = b.new_state();
            b.add_edge(s, Transition::Char { ch: *c, ignore_case }, e);
            (s, e)
        }
        Node::Dot => {
            let s = b.new_state();
            let e = b.new_state();
            b.add_edge(s, Transition::Dot, e);
            (s, e)
        }
        Node::Class {
            negated,
            chars,
            ranges,
        } => {
            let s = b.new_state();
            let e = b.new_state();
            b.add_edge(
                s,
                Transition::CharClass {
                    negated: *negated,
                    ignore_case,
                    chars: chars.clone(),
                    ranges: ranges.clone(),
                },
                e,
            );
            (s, e)
        }
        Node::Concat(nodes) => {
            if nodes.is_empty() {
                let s = b.new_state();
                return (s, s);
            }
            let mut iter = nodes.iter();
            let (start, mut prev_end) = build(iter.next().unwrap(), ignore_case, b);
            for n in iter {
                let (s, e) = build(n, ignore_case, b);
                b.add_edge(prev_end, Transition::Epsilon, s);
                prev_end = e;
            }
            (start, prev_end)
        }
        Node::Alt(branches) => {
            let start = b.new_state();
            let end = b.new_state();
            for br in branches {
                let (s, e) = build(br, ignore_case, b);
                b.add_edge(start, Transition::Epsilon, s);
                b.add_edge(e, Transition::Epsilon, end);
            }
            (start, end)
        }
        Node::Star(inner) => {
            let start = b.new_state();
            let end = b.new_state();
            let (s, e) = build(inner, ignore_case, b);
            b.add_edge(start, Transition::Epsilon, s);
            b.add_edge(start, Transition::Epsilon, end);
            b.add_edge(e, Transition::Epsilon, s);
            b.add_edge(e, Transition::Epsilon, end);
            (start, end)
        }
        Node::Plus(inner) => {
            let (s, e) = build(inner, ignore_case, b);
            let end = b.new_state();
            b.add_edge(e, Transition::Epsilon, s);
            b.add_edge(e, Transition::Epsilon, end);
            (s, end)
        }
        Node::Opt(inner) => {
            let start = b.new_state();
            let end = b.new_state();
            let (s, e) = build(inner, ignore_case, b);
            b.add_edge(start, Transition::Epsilon, s);
            b.add_edge(start, Transition::Epsilon, end);
            b.add_edge(e, Transition::Epsilon, end);
            (start, end)
        }
    }
}

/// Parses and compiles `pattern`, emitting its states into `builder` and
/// returning the fragment's start and end state.
pub(crate) fn compile_into(
    pattern: &str,
    builder: &mut NfaBuilder,
) -> Result<(StateId, StateId), RegexError> {
    compile_with_case(pattern, false, builder)
}

/// As [`compile_into`], but folds every literal character and class member
/// to lower case at match time when `ignore_case` is set.
pub(crate) fn compile_with_case(
    pattern: &str,
    ignore_case: bool,
    builder: &mut NfaBuilder,
) -> Result<(StateId, StateId), RegexError> {
    let ast = Parser::new(pattern).parse_pattern()?;
    Ok(build(&ast, ignore_case, builder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::{NfaBuilder, TokenNfa};

    fn match_len(pattern: &str, input: &str) -> Option<usize> {
        let mut builder = NfaBuilder::default();
        let (start, end) = compile_into(pattern, &mut builder).unwrap();
        let mut nfa = TokenNfa::new();
        nfa.merge_fragment(builder, start, end, 0);
        nfa.longest_match(|offset| input[offset..].chars().next())
            .map(|(_, len)| len)
    }

    #[test]
    fn literal_concatenation() {
        assert_eq!(match_len("abc", "abcd"), Some(3));
    }

    #[test]
    fn alternation_picks_longest_branch() {
        assert_eq!(match_len("a|ab", "abz"), Some(2));
    }

    #[test]
    fn star_matches_zero_or_more() {
        assert_eq!(match_len("a*b", "aaab"), Some(4));
        assert_eq!(match_len("a*b", "b"), Some(1));
    }

    #[test]
    fn plus_requires_at_least_one() {
        assert_eq!(match_len("a+", "b"), None);
        assert_eq!(match_len("a+", "aab"), Some(2));
    }

    #[test]
    fn native_repeat_shapes_compile() {
        assert_eq!(match_len("a{0,1}", "aab"), Some(1));
        assert_eq!(match_len("a{0,}", "aab"), Some(2));
        assert_eq!(match_len("a{1,}", "aab"), Some(2));
        assert_eq!(match_len("a{1,1}", "aab"), Some(1));
    }

    #[test]
    fn other_counted_repeats_are_rejected() {
        let mut builder = NfaBuilder::default();
        let err = compile_into("a{2,3}", &mut builder).unwrap_err();
        assert_eq!(err.kind, RegexErrorKind::InvalidRepeatCount);
        let mut builder = NfaBuilder::default();
        let err = compile_into("a{2}", &mut builder).unwrap_err();
        assert_eq!(err.kind, RegexErrorKind::InvalidRepeatCount);
        let mut builder = NfaBuilder::default();
        let err = compile_into("a{2,}", &mut builder).unwrap_err();
        assert_eq!(err.kind, RegexErrorKind::InvalidRepeatCount);
    }

    #[test]
    fn character_class_with_range_and_negation() {
        assert_eq!(match_len("[a-c]+", "cba!"), Some(3));
        assert_eq!(match_len("[^a-c]+", "xyzabc"), Some(3));
    }

    #[test]
    fn digit_escape_shortcut() {
        assert_eq!(match_len(r"\d+", "1234x"), Some(4));
    }

    #[test]
    fn single_char_escapes() {
        assert_eq!(match_len(r"\f", "\u{0C}x"), Some(1));
        assert_eq!(match_len(r"\a", "\u{07}x"), Some(1));
        assert_eq!(match_len(r"\e", "\u{1B}x"), Some(1));
    }

    #[test]
    fn hex_escape() {
        assert_eq!(match_len(r"\x41+", "AAAb"), Some(3));
    }

    #[test]
    fn unicode_escape() {
        assert_eq!(match_len(r"\u0041+", "AAAb"), Some(3));
    }

    #[test]
    fn octal_escape() {
        // \0101 is 'A' (0o101 == 65)
        assert_eq!(match_len(r"\0101+", "AAAb"), Some(3));
    }

    #[test]
    fn anchors_are_rejected() {
        let mut builder = NfaBuilder::default();
        let err = compile_into("^abc$", &mut builder).unwrap_err();
        assert_eq!(err.kind, RegexErrorKind::UnsupportedSpecial('^'));
    }

    #[test]
    fn lazy_quantifier_is_rejected() {
        let mut builder = NfaBuilder::default();
        let err = compile_into("a*?", &mut builder).unwrap_err();
        assert_eq!(err.kind, RegexErrorKind::UnsupportedSpecial('?'));
    }

    #[test]
    fn unterminated_group_is_an_error() {
        let mut builder = NfaBuilder::default();
        let err = compile_into("(ab", &mut builder).unwrap_err();
        assert_eq!(err.kind, RegexErrorKind::UnterminatedPattern);
    }

    #[test]
    fn invalid_repeat_count_is_rejected() {
        let mut builder = NfaBuilder::default();
        let err = compile_into("a{3,1}", &mut builder).unwrap_err();
        assert_eq!(err.kind, RegexErrorKind::InvalidRepeatCount);
    }
}
