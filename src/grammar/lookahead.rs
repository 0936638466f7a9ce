//! `LookAheadSet`: the set of up-to-`k` token sequences that can appear at
//! a decision point, plus the algebra the analyzer needs to grow and
//! compare them (`union`, `intersect`, `remove_all`, `combine`, `overlaps`,
//! `filter`, `next_set`, `create_repetitive`).

use crate::token::PatternId;
use std::collections::BTreeSet;

/// A single, possibly partial (shorter than the owning set's `k`), sequence
/// of lookahead tokens, tagged with whether it is known to correspond to an
/// unbounded repetition.
///
/// Equality and ordering deliberately ignore `repetitive` (spec §4.7,
/// §9): two sequences with the same token ids are the same sequence for
/// set-membership purposes, but `repetitive` still travels with whichever
/// copy is kept, via [`Sequence::merge_flag`].
#[derive(Debug, Clone, Eq)]
pub struct Sequence {
    ids: Vec<PatternId>,
    pub repetitive: bool,
}

impl Sequence {
    pub fn new(ids: Vec<PatternId>) -> Self {
        Self {
            ids,
            repetitive: false,
        }
    }

    pub fn repetitive(ids: Vec<PatternId>) -> Self {
        Self {
            ids,
            repetitive: true,
        }
    }

    pub fn ids(&self) -> &[PatternId] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    fn truncated(mut self, k: usize) -> Self {
        self.ids.truncate(k);
        self
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Ord for Sequence {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ids.cmp(&other.ids)
    }
}

impl PartialOrd for Sequence {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl From<Vec<PatternId>> for Sequence {
    fn from(ids: Vec<PatternId>) -> Self {
        Sequence::new(ids)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookAheadSet {
    k: usize,
    sequences: BTreeSet<Sequence>,
}

impl LookAheadSet {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            sequences: BTreeSet::new(),
        }
    }

    /// A set containing only the empty sequence: "nothing more is needed to
    /// decide". Seeds the start production's follow set (end of input) and
    /// the fold used to build up an alternative's look-ahead left to right.
    pub fn epsilon(k: usize) -> Self {
        let mut set = Self::new(k);
        set.sequences.insert(Sequence::new(Vec::new()));
        set
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn insert(&mut self, seq: impl Into<Sequence>) {
        self.insert_seq(seq.into());
    }

    fn insert_seq(&mut self, seq: Sequence) {
        let seq = seq.truncated(self.k);
        // A sequence already present keeps `repetitive = true` if either
        // the new or the existing copy says so (spec §4.7: "intersection
        // preserves repetitive=true if either operand has it" — the same
        // rule applies to any insert/merge).
        if seq.repetitive {
            if let Some(existing) = self.sequences.take(&seq) {
                self.sequences.insert(Sequence {
                    repetitive: true,
                    ..existing
                });
                return;
            }
        }
        if !self.sequences.contains(&seq) {
            self.sequences.insert(seq);
        }
    }

    pub fn contains_epsilon(&self) -> bool {
        self.sequences.contains(&Sequence::new(Vec::new()))
    }

    /// Merges `other`'s sequences into `self`, returning whether anything
    /// new was added — used to detect a fixed point during analysis.
    pub fn union(&mut self, other: &LookAheadSet) -> bool {
        let before = self.sequences.len();
        let mut flag_upgraded = false;
        for seq in &other.sequences {
            if seq.repetitive {
                if let Some(existing) = self.sequences.get(seq) {
                    if !existing.repetitive {
                        flag_upgraded = true;
                    }
                }
            }
            self.insert_seq(seq.clone());
        }
        self.sequences.len() != before || flag_upgraded
    }

    /// The sequences present in both `self` and `other` (by id-equality);
    /// a sequence in the result is repetitive if either operand's copy was.
    pub fn intersect(&self, other: &LookAheadSet) -> LookAheadSet {
        let mut result = LookAheadSet::new(self.k.min(other.k));
        for seq in &self.sequences {
            if let Some(matching) = other.sequences.get(seq) {
                let repetitive = seq.repetitive || matching.repetitive;
                result.insert_seq(Sequence {
                    ids: seq.ids.clone(),
                    repetitive,
                });
            }
        }
        result
    }

    /// `self` with every sequence appearing in `other` removed.
    pub fn remove_all(&self, other: &LookAheadSet) -> LookAheadSet {
        LookAheadSet {
            k: self.k,
            sequences: self
                .sequences
                .iter()
                .filter(|s| !other.sequences.contains(*s))
                .cloned()
                .collect(),
        }
    }

    /// True if any sequence in this set is flagged repetitive.
    pub fn has_repetitive(&self) -> bool {
        self.sequences.iter().any(|s| s.repetitive)
    }

    /// The sequential composition of `self` followed by `other`, truncated
    /// to `k`. A sequence in `self` already at length `k` is left alone
    /// (nothing more can be observed within the look-ahead budget); a
    /// sequence shorter than `k` is extended by every sequence in `other`.
    /// This is how an element's look-ahead picks up the look-ahead of
    /// whatever follows it.
    ///
    /// Resolved open question (spec §9): when `self` is empty, `combine`
    /// returns `other` verbatim, at `other`'s own `max_length` — not
    /// `self`'s. Preserving this (rather than "fixing" it to always use
    /// `self.k`) affects how fast look-ahead growth converges.
    pub fn combine(&self, other: &LookAheadSet) -> LookAheadSet {
        if self.sequences.is_empty() {
            return other.clone();
        }
        let mut result = LookAheadSet::new(self.k);
        for seq in &self.sequences {
            if seq.len() >= self.k || other.sequences.is_empty() {
                result.insert_seq(seq.clone());
                continue;
            }
            for tail in &other.sequences {
                let mut ids = seq.ids().to_vec();
                ids.extend(tail.ids().iter().copied());
                ids.truncate(self.k);
                result.insert_seq(Sequence {
                    ids,
                    repetitive: seq.repetitive || tail.repetitive,
                });
            }
        }
        result
    }

    /// True if `self` and `other` share a sequence, or one's sequence is a
    /// prefix of the other's — either is a genuine ambiguity at this `k`,
    /// since the driver cannot tell which alternative it is looking at from
    /// the tokens available.
    pub fn overlaps(&self, other: &LookAheadSet) -> bool {
        self.sequences.iter().any(|a| {
            other
                .sequences
                .iter()
                .any(|b| a.ids().starts_with(b.ids()) || b.ids().starts_with(a.ids()))
        })
    }

    /// The sequences responsible for an [`overlaps`](Self::overlaps)
    /// conflict between `self` and `other`: for every pair where one is a
    /// prefix of the other, the shorter (the one actually reached first),
    /// tagged repetitive if either side was. Empty iff the two sets don't
    /// overlap at all.
    pub fn conflict_witnesses(&self, other: &LookAheadSet) -> LookAheadSet {
        let mut result = LookAheadSet::new(self.k.max(other.k));
        for a in &self.sequences {
            for b in &other.sequences {
                if a.ids().starts_with(b.ids()) {
                    result.insert_seq(Sequence {
                        ids: b.ids().to_vec(),
                        repetitive: a.repetitive || b.repetitive,
                    });
                } else if b.ids().starts_with(a.ids()) {
                    result.insert_seq(Sequence {
                        ids: a.ids().to_vec(),
                        repetitive: a.repetitive || b.repetitive,
                    });
                }
            }
        }
        result
    }

    pub fn filter(&self, mut predicate: impl FnMut(&Sequence) -> bool) -> LookAheadSet {
        LookAheadSet {
            k: self.k,
            sequences: self
                .sequences
                .iter()
                .filter(|s| predicate(s))
                .cloned()
                .collect(),
        }
    }

    /// Sequences of `self` that start with `trim`, with that prefix
    /// stripped — used to narrow an alternative's look-ahead to just the
    /// branch that survived a conflict at a smaller `k`.
    pub fn filtered_by_prefix(&self, trim: &[PatternId]) -> LookAheadSet {
        let mut result = LookAheadSet::new(self.k);
        for seq in &self.sequences {
            if seq.ids().starts_with(trim) {
                result.insert_seq(Sequence {
                    ids: seq.ids()[trim.len()..].to_vec(),
                    repetitive: seq.repetitive,
                });
            }
        }
        result
    }

    /// The length-1 projection: the set of tokens that can come first.
    pub fn next_set(&self) -> BTreeSet<PatternId> {
        self.sequences.iter().filter_map(|s| s.ids().first().copied()).collect()
    }

    /// Sub-sequences remaining after reading `tok` as the first token: every
    /// sequence of `self` that starts with `tok`, with `tok` stripped.
    pub fn next_set_after(&self, tok: PatternId) -> LookAheadSet {
        self.filtered_by_prefix(&[tok])
    }

    /// The closure of `self` concatenated with itself enough times to fill
    /// `k` tokens, for elements that repeat (`*`/`+`): if `self` is `{a}`
    /// at `k = 3`, the repetitive closure is `{a, aa, aaa}`, every one of
    /// them marked `repetitive`. Always terminates: sequences are truncated
    /// to `k` over a finite token vocabulary, so the set of distinct
    /// sequences is finite and `union` only ever grows monotonically.
    pub fn create_repetitive(&self) -> LookAheadSet {
        let mut result = LookAheadSet::new(self.k);
        for seq in &self.sequences {
            result.insert_seq(Sequence {
                ids: seq.ids().to_vec(),
                repetitive: true,
            });
        }
        loop {
            let extended = result.combine(&result);
            let mut marked = LookAheadSet::new(result.k);
            for seq in extended.sequences() {
                marked.insert_seq(Sequence {
                    ids: seq.ids().to_vec(),
                    repetitive: true,
                });
            }
            if !result.union(&marked) {
                break;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_extends_only_shorter_sequences() {
        let mut a = LookAheadSet::new(2);
        a.insert(vec![1]);
        a.insert(vec![1, 2]);
        let mut b = LookAheadSet::new(2);
        b.insert(vec![9]);
        let combined = a.combine(&b);
        let seqs: Vec<_> = combined.sequences().map(|s| s.ids().to_vec()).collect();
        assert!(seqs.contains(&vec![1, 9]));
        assert!(seqs.contains(&vec![1, 2]));
        assert_eq!(seqs.len(), 2);
    }

    #[test]
    fn combine_with_empty_self_returns_other_verbatim() {
        let a = LookAheadSet::new(5);
        let mut b = LookAheadSet::new(2);
        b.insert(vec![9]);
        let combined = a.combine(&b);
        assert_eq!(combined.k(), 2, "combine(empty, B) must keep B's max_length");
    }

    #[test]
    fn overlaps_detects_shared_prefix() {
        let mut a = LookAheadSet::new(2);
        a.insert(vec![1, 2]);
        let mut b = LookAheadSet::new(2);
        b.insert(vec![1]);
        assert!(a.overlaps(&b));
        let mut c = LookAheadSet::new(2);
        c.insert(vec![3]);
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn create_repetitive_builds_up_to_k_and_marks_repetitive() {
        let mut a = LookAheadSet::new(3);
        a.insert(vec![1]);
        let rep = a.create_repetitive();
        let seqs: Vec<_> = rep.sequences().map(|s| s.ids().to_vec()).collect();
        assert!(seqs.contains(&vec![1]));
        assert!(seqs.contains(&vec![1, 1]));
        assert!(seqs.contains(&vec![1, 1, 1]));
        assert!(rep.sequences().all(|s| s.repetitive));
    }

    #[test]
    fn next_set_projects_first_tokens() {
        let mut a = LookAheadSet::new(2);
        a.insert(vec![1, 2]);
        a.insert(vec![3]);
        let next = a.next_set();
        assert_eq!(next, [1, 3].into_iter().collect());
    }

    #[test]
    fn next_set_after_strips_matched_prefix() {
        let mut a = LookAheadSet::new(2);
        a.insert(vec![1, 2]);
        a.insert(vec![1, 3]);
        a.insert(vec![4]);
        let rest = a.next_set_after(1);
        let seqs: Vec<_> = rest.sequences().map(|s| s.ids().to_vec()).collect();
        assert_eq!(seqs.len(), 2);
        assert!(seqs.contains(&vec![2]));
        assert!(seqs.contains(&vec![3]));
    }

    #[test]
    fn intersect_preserves_repetitive_flag_from_either_side() {
        let mut a = LookAheadSet::new(2);
        a.insert(Sequence::repetitive(vec![1]));
        let mut b = LookAheadSet::new(2);
        b.insert(vec![1]);
        let both = a.intersect(&b);
        let seq = both.sequences().next().unwrap();
        assert!(seq.repetitive);
    }

    #[test]
    fn remove_all_drops_shared_sequences() {
        let mut a = LookAheadSet::new(2);
        a.insert(vec![1]);
        a.insert(vec![2]);
        let mut b = LookAheadSet::new(2);
        b.insert(vec![1]);
        let diff = a.remove_all(&b);
        let seqs: Vec<_> = diff.sequences().map(|s| s.ids().to_vec()).collect();
        assert_eq!(seqs, vec![vec![2]]);
    }
}
