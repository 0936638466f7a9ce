//! `StringDFA`: a deterministic automaton over a set of fixed-string token
//! patterns, merged into a single trie so that overlapping prefixes (e.g.
//! `"if"` and `"iff"`) share states.
//!
//! Design note (resolved open question): a single merged automaton can hold
//! both case-sensitive and case-insensitive strings. Rather than fold the
//! whole automaton to one case policy, every state keeps two transition
//! tables — exact-case and folded-case. Each table is itself split into a
//! 128-entry ASCII array (the fast path from spec §4.2) and a sorted tree
//! for the rest. A state where both tables have a successor for the same
//! input character is not a contradiction — it means a case-sensitive and a
//! case-insensitive string diverge only by case from that point on — so
//! matching walks a small frontier of live states rather than a single
//! deterministic one, taking both successors and keeping the best accept
//! seen across the whole frontier.

use crate::token::PatternId;
use std::collections::BTreeMap;

type StateId = usize;

#[derive(Default)]
struct DfaState {
    exact_ascii: [Option<StateId>; 128],
    exact_other: BTreeMap<char, StateId>,
    folded_ascii: [Option<StateId>; 128],
    folded_other: BTreeMap<char, StateId>,
    accept: Option<PatternId>,
}

impl DfaState {
    fn new() -> Self {
        Self {
            exact_ascii: [None; 128],
            exact_other: BTreeMap::new(),
            folded_ascii: [None; 128],
            folded_other: BTreeMap::new(),
            accept: None,
        }
    }
}

/// A deterministic finite automaton recognizing a set of fixed strings.
pub struct StringDfa {
    states: Vec<DfaState>,
}

impl StringDfa {
    pub fn new() -> Self {
        Self {
            states: vec![DfaState::new()],
        }
    }

    /// Extends the automaton with `string`, to be recognized as `pattern`.
    /// When `ignore_case` is set, the string is matched case-insensitively
    /// at every position.
    pub fn add_match(&mut self, string: &str, ignore_case: bool, pattern: PatternId) {
        let mut state = 0usize;
        for c in string.chars() {
            state = if ignore_case {
                let folded = lowercase_one(c);
                self.transition_or_create(state, folded, true)
            } else {
                self.transition_or_create(state, c, false)
            };
        }
        let accept = &mut self.states[state].accept;
        *accept = Some(match *accept {
            Some(existing) => existing.min(pattern),
            None => pattern,
        });
    }

    fn transition_or_create(&mut self, state: StateId, c: char, folded: bool) -> StateId {
        if let Some(next) = self.lookup(state, c, folded) {
            return next;
        }
        let next = self.states.len();
        self.states.push(DfaState::new());
        self.set_transition(state, c, folded, next);
        next
    }

    fn lookup(&self, state: StateId, c: char, folded: bool) -> Option<StateId> {
        let st = &self.states[state];
        if c.is_ascii() {
            let table = if folded { &st.folded_ascii } else { &st.exact_ascii };
            table[c as usize]
        } else {
            let table = if folded { &st.folded_other } else { &st.exact_other };
            table.get(&c).copied()
        }
    }

    fn set_transition(&mut self, state: StateId, c: char, folded: bool, next: StateId) {
        let st = &mut self.states[state];
        if c.is_ascii() {
            let table = if folded {
                &mut st.folded_ascii
            } else {
                &mut st.exact_ascii
            };
            table[c as usize] = Some(next);
        } else {
            let table = if folded {
                &mut st.folded_other
            } else {
                &mut st.exact_other
            };
            table.insert(c, next);
        }
    }

    /// Walks the automaton against `peek(0), peek(1), ...` without
    /// consuming input. Returns the pattern id and length of the deepest
    /// accepting state reached, or `None` if no prefix of the input is
    /// recognized.
    ///
    /// A single merged automaton can hold both a case-sensitive and a
    /// case-insensitive string that share a prefix differing only by case
    /// (e.g. `"On"` exact and `"on"` folded): at such a state the exact and
    /// folded tables lead to two *different* successor states, both live.
    /// So this tracks a frontier of states rather than one `state`, the
    /// same way `TokenNfa::longest_match` tracks a worklist — a DFA per
    /// case policy, explored together.
    pub fn longest_match(&self, mut peek: impl FnMut(usize) -> Option<char>) -> Option<(PatternId, usize)> {
        let mut frontier = vec![0usize];
        let mut next_frontier = Vec::new();
        let mut offset = 0usize;
        let mut best = self.best_accept(&frontier).map(|id| (id, 0));
        loop {
            let Some(c) = peek(offset) else { break };
            next_frontier.clear();
            for &state in &frontier {
                if let Some(s) = self.lookup(state, c, false) {
                    if !next_frontier.contains(&s) {
                        next_frontier.push(s);
                    }
                }
                let folded = lowercase_one(c);
                if let Some(s) = self.lookup(state, folded, true) {
                    if !next_frontier.contains(&s) {
                        next_frontier.push(s);
                    }
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            offset += 1;
            if let Some(id) = self.best_accept(&next_frontier) {
                best = Some((id, offset));
            }
            std::mem::swap(&mut frontier, &mut next_frontier);
        }
        best
    }

    fn best_accept(&self, states: &[StateId]) -> Option<PatternId> {
        states.iter().filter_map(|&s| self.states[s].accept).min()
    }
}

impl Default for StringDfa {
    fn default() -> Self {
        Self::new()
    }
}

fn lowercase_one(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peek_fn(s: &str) -> impl Fn(usize) -> Option<char> + '_ {
        move |offset| s[offset..].chars().next()
    }

    #[test]
    fn longest_match_wins_over_prefix() {
        let mut dfa = StringDfa::new();
        dfa.add_match("if", false, 1);
        dfa.add_match("iffy", false, 2);
        let peek = |offset: usize| "iffy rest".chars().nth(offset);
        assert_eq!(dfa.longest_match(peek), Some((2, 4)));
        let peek = |offset: usize| "if rest".chars().nth(offset);
        assert_eq!(dfa.longest_match(peek), Some((1, 2)));
    }

    #[test]
    fn tie_breaks_to_lowest_id() {
        let mut dfa = StringDfa::new();
        dfa.add_match("if", false, 5);
        dfa.add_match("if", false, 1);
        let peek = peek_fn("if");
        assert_eq!(dfa.longest_match(peek), Some((1, 2)));
    }

    #[test]
    fn ignore_case_matches_any_case() {
        let mut dfa = StringDfa::new();
        dfa.add_match("IF", true, 1);
        let peek = peek_fn("if");
        assert_eq!(dfa.longest_match(peek), Some((1, 2)));
        let peek = peek_fn("If");
        assert_eq!(dfa.longest_match(peek), Some((1, 2)));
    }

    #[test]
    fn mixed_case_sensitivity_in_same_automaton() {
        let mut dfa = StringDfa::new();
        dfa.add_match("On", false, 1); // case-sensitive
        dfa.add_match("on", true, 2); // case-insensitive
        assert_eq!(dfa.longest_match(peek_fn("On")), Some((1, 2)));
        assert_eq!(dfa.longest_match(peek_fn("ON")), Some((2, 2)));
    }

    #[test]
    fn no_match_returns_none() {
        let mut dfa = StringDfa::new();
        dfa.add_match("abc", false, 1);
        assert_eq!(dfa.longest_match(peek_fn("xyz")), None);
    }
}
