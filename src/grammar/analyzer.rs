//! `LookAheadAnalyzer`: computes a look-ahead set for every alternative of
//! every production via a FIRST/FOLLOW fixed point, growing `k` only as far
//! as genuine conflicts require, and rejects grammars that can never be
//! driven deterministically (left recursion, duplicate alternatives,
//! dangling references, ambiguity that is inherent rather than resolved by
//! growing `k` or by a default alternative).

use crate::error::GrammarError;
use crate::grammar::lookahead::LookAheadSet;
use crate::grammar::pattern::{Alternative, Element, ElementKind, ProductionId, ProductionPattern};
use crate::token::PatternId;
use std::collections::{HashMap, HashSet};

/// Position of one element within one alternative of one production —
/// the key under which its "take one more" look-ahead set is cached.
pub type ElementKey = (ProductionId, usize, usize);

/// The result of a successful analysis: the look-ahead set computed for
/// every alternative of every production, the per-element continuation set
/// for every repeatable/optional element, the `k` it stabilized at, and
/// which alternative (if any) the driver should fall back to when more than
/// one alternative's look-ahead matches.
pub struct Analysis {
    look_ahead: HashMap<ProductionId, Vec<LookAheadSet>>,
    element_look_ahead: HashMap<ElementKey, LookAheadSet>,
    defaults: HashMap<ProductionId, usize>,
    k: usize,
}

impl Analysis {
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn look_ahead(&self, production: ProductionId, alternative: usize) -> Option<&LookAheadSet> {
        self.look_ahead.get(&production)?.get(alternative)
    }

    pub fn look_aheads(&self, production: ProductionId) -> Option<&[LookAheadSet]> {
        self.look_ahead.get(&production).map(Vec::as_slice)
    }

    /// The "take one more occurrence" look-ahead set for the element at
    /// `(production, alternative, element)`. Only meaningful for elements
    /// with `min == 0` or `max != Some(1)`; callers decide "stop" if the
    /// next tokens are not in this set.
    pub fn element_look_ahead(&self, key: ElementKey) -> Option<&LookAheadSet> {
        self.element_look_ahead.get(&key)
    }

    /// The alternative the driver should take when no alternative's
    /// look-ahead uniquely matches the input, if this production has one.
    pub fn default_alternative(&self, production: ProductionId) -> Option<usize> {
        self.defaults.get(&production).copied()
    }
}

pub struct LookAheadAnalyzer<'g> {
    productions: &'g HashMap<ProductionId, ProductionPattern>,
    max_k: usize,
}

impl<'g> LookAheadAnalyzer<'g> {
    pub fn new(productions: &'g HashMap<ProductionId, ProductionPattern>, max_k: usize) -> Self {
        Self { productions, max_k }
    }

    /// Grows `k` from 1 while conflicts remain, per spec §4.7 steps 1-3: a
    /// conflict whose overlap contains a repetitive sequence is fatal at
    /// whatever `k` it's first seen (growing `k` further cannot separate two
    /// alternatives that both admit the same unbounded repetition). Any
    /// other conflict gets one more chance at every larger `k` to resolve
    /// itself outright (spec §9, scenario `G`: a grammar that merely has a
    /// long shared prefix resolves this way, with no default needed) before
    /// falling back, only once `max_k` is reached, to designating one of the
    /// conflicting alternatives as the default (step 4).
    pub fn analyze(&self, start: ProductionId) -> Result<Analysis, GrammarError> {
        self.check_structure(start)?;
        self.check_duplicate_alternatives()?;
        self.check_left_recursion()?;

        let max_k = self.max_k.max(1);
        for k in 1..=max_k {
            let first = self.compute_first(k);
            let follow = self.compute_follow(k, start, &first);
            let look_ahead = self.alternative_look_aheads(k, &first, &follow);
            let conflicts = self.find_conflicts(&look_ahead)?;
            if conflicts.is_empty() {
                let element_look_ahead = self.element_look_aheads(k, &first);
                return Ok(Analysis {
                    look_ahead,
                    element_look_ahead,
                    defaults: self.explicit_defaults(),
                    k,
                });
            }
            if k == max_k {
                let mut defaults = self.explicit_defaults();
                self.assign_defaults(&conflicts, &mut defaults)?;
                let element_look_ahead = self.element_look_aheads(k, &first);
                return Ok(Analysis {
                    look_ahead,
                    element_look_ahead,
                    defaults,
                    k,
                });
            }
        }
        unreachable!("the loop always returns by k == max_k")
    }

    fn explicit_defaults(&self) -> HashMap<ProductionId, usize> {
        self.productions
            .values()
            .filter_map(|p| p.default_alternative().map(|d| (p.id(), d)))
            .collect()
    }

    /// Structural checks independent of any `k`: every production has at
    /// least one alternative, every element's id resolves to a real token
    /// or production, and the start production cannot derive the empty
    /// string (spec §3: "no empty-matching top pattern").
    fn check_structure(&self, start: ProductionId) -> Result<(), GrammarError> {
        for prod in self.productions.values() {
            if prod.alternatives().is_empty() {
                return Err(GrammarError::InvalidProduction {
                    name: prod.name().to_string(),
                    detail: "a production must have at least one alternative".to_string(),
                });
            }
            for alt in prod.alternatives() {
                for element in alt.elements() {
                    if let ElementKind::Production(id) = element.kind() {
                        if !self.productions.contains_key(&id) {
                            return Err(GrammarError::InvalidProduction {
                                name: prod.name().to_string(),
                                detail: format!("reference to undefined production {id}"),
                            });
                        }
                    }
                }
            }
        }
        if self.derives_empty(start, &mut HashSet::new()) {
            let name = self
                .productions
                .get(&start)
                .map(|p| p.name().to_string())
                .unwrap_or_default();
            return Err(GrammarError::InvalidProduction {
                name,
                detail: "the start production must not be able to match zero tokens".to_string(),
            });
        }
        Ok(())
    }

    fn derives_empty(&self, id: ProductionId, visiting: &mut HashSet<ProductionId>) -> bool {
        if !visiting.insert(id) {
            return false;
        }
        let Some(prod) = self.productions.get(&id) else {
            return false;
        };
        prod.alternatives().iter().any(|alt| {
            alt.elements().iter().all(|element| {
                if element.is_optional() {
                    return true;
                }
                match element.kind() {
                    ElementKind::Token(_) => false,
                    ElementKind::Production(target) => self.derives_empty(target, visiting),
                }
            })
        })
    }

    fn check_duplicate_alternatives(&self) -> Result<(), GrammarError> {
        for prod in self.productions.values() {
            let alts = prod.alternatives();
            for i in 0..alts.len() {
                for j in (i + 1)..alts.len() {
                    if alts[i] == alts[j] {
                        return Err(GrammarError::InvalidProduction {
                            name: prod.name().to_string(),
                            detail: "two identical alternatives".to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Rejects a production that can reach itself at its own leftmost
    /// position without consuming a token — a classic recursive-descent
    /// non-terminator. Elements after the first non-optional one are never
    /// "leftmost", so the scan stops there.
    fn check_left_recursion(&self) -> Result<(), GrammarError> {
        for prod in self.productions.values() {
            let mut visiting = HashSet::new();
            if self.reaches_leftmost(prod.id(), prod.id(), &mut visiting) {
                return Err(GrammarError::InvalidProduction {
                    name: prod.name().to_string(),
                    detail: "left recursive patterns are not allowed".to_string(),
                });
            }
        }
        Ok(())
    }

    fn reaches_leftmost(
        &self,
        target: ProductionId,
        current: ProductionId,
        visiting: &mut HashSet<ProductionId>,
    ) -> bool {
        if !visiting.insert(current) {
            return false;
        }
        let Some(prod) = self.productions.get(&current) else {
            return false;
        };
        for alt in prod.alternatives() {
            for element in alt.elements() {
                if let ElementKind::Production(id) = element.kind() {
                    if id == target || self.reaches_leftmost(target, id, visiting) {
                        return true;
                    }
                }
                if !element.is_optional() {
                    break;
                }
            }
        }
        false
    }

    fn compute_first(&self, k: usize) -> HashMap<ProductionId, LookAheadSet> {
        let mut first: HashMap<ProductionId, LookAheadSet> = self
            .productions
            .keys()
            .map(|&id| (id, LookAheadSet::new(k)))
            .collect();
        loop {
            let mut changed = false;
            for prod in self.productions.values() {
                let mut prod_set = LookAheadSet::new(k);
                for alt in prod.alternatives() {
                    let alt_set = self.first_of_alternative(alt, k, &first);
                    prod_set.union(&alt_set);
                }
                if first.get_mut(&prod.id()).unwrap().union(&prod_set) {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        first
    }

    fn compute_follow(
        &self,
        k: usize,
        start: ProductionId,
        first: &HashMap<ProductionId, LookAheadSet>,
    ) -> HashMap<ProductionId, LookAheadSet> {
        let mut follow: HashMap<ProductionId, LookAheadSet> = self
            .productions
            .keys()
            .map(|&id| (id, LookAheadSet::new(k)))
            .collect();
        if let Some(set) = follow.get_mut(&start) {
            set.union(&LookAheadSet::epsilon(k));
        }
        loop {
            let mut changed = false;
            for prod in self.productions.values() {
                for alt in prod.alternatives() {
                    let elements = alt.elements();
                    for (i, element) in elements.iter().enumerate() {
                        let ElementKind::Production(target) = element.kind() else {
                            continue;
                        };
                        if element.is_repeating() {
                            let self_first = first.get(&target).cloned().unwrap_or_else(|| LookAheadSet::new(k));
                            if follow.get_mut(&target).unwrap().union(&self_first) {
                                changed = true;
                            }
                        }
                        let mut rest = LookAheadSet::epsilon(k);
                        for later in &elements[i + 1..] {
                            let later_set = self.first_of_element(later, k, first);
                            rest = rest.combine(&later_set);
                        }
                        let follow_q = follow.get(&prod.id()).cloned().unwrap_or_else(|| LookAheadSet::new(k));
                        let contribution = rest.combine(&follow_q);
                        if follow.get_mut(&target).unwrap().union(&contribution) {
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
        follow
    }

    fn first_of_element(
        &self,
        element: &Element,
        k: usize,
        first: &HashMap<ProductionId, LookAheadSet>,
    ) -> LookAheadSet {
        let base = match element.kind() {
            ElementKind::Token(id) => {
                let mut set = LookAheadSet::new(k);
                set.insert(vec![id]);
                set
            }
            ElementKind::Production(id) => first.get(&id).cloned().unwrap_or_else(|| LookAheadSet::new(k)),
        };
        let base = if element.is_repeating() {
            base.create_repetitive()
        } else {
            base
        };
        if element.is_optional() {
            let mut set = base;
            set.insert(Vec::<PatternId>::new());
            set
        } else {
            base
        }
    }

    fn first_of_alternative(
        &self,
        alt: &Alternative,
        k: usize,
        first: &HashMap<ProductionId, LookAheadSet>,
    ) -> LookAheadSet {
        let mut acc = LookAheadSet::epsilon(k);
        for element in alt.elements() {
            let elem_set = self.first_of_element(element, k, first);
            acc = acc.combine(&elem_set);
        }
        acc
    }

    fn alternative_look_aheads(
        &self,
        k: usize,
        first: &HashMap<ProductionId, LookAheadSet>,
        follow: &HashMap<ProductionId, LookAheadSet>,
    ) -> HashMap<ProductionId, Vec<LookAheadSet>> {
        self.productions
            .values()
            .map(|prod| {
                let follow_set = follow.get(&prod.id()).cloned().unwrap_or_else(|| LookAheadSet::new(k));
                let sets = prod
                    .alternatives()
                    .iter()
                    .map(|alt| self.first_of_alternative(alt, k, first).combine(&follow_set))
                    .collect();
                (prod.id(), sets)
            })
            .collect()
    }

    /// The "take one more occurrence" set for every element that repeats or
    /// is optional: just `first(elem)` (spec §4.7 step 5). Non-repeating,
    /// non-optional elements have nothing to decide and are skipped.
    fn element_look_aheads(
        &self,
        k: usize,
        first: &HashMap<ProductionId, LookAheadSet>,
    ) -> HashMap<ElementKey, LookAheadSet> {
        let mut out = HashMap::new();
        for prod in self.productions.values() {
            for (alt_idx, alt) in prod.alternatives().iter().enumerate() {
                for (elem_idx, element) in alt.elements().iter().enumerate() {
                    if element.is_optional() || element.is_repeating() {
                        out.insert(
                            (prod.id(), alt_idx, elem_idx),
                            self.first_of_element(element, k, first),
                        );
                    }
                }
            }
        }
        out
    }

    /// Finds every conflicting pair of alternatives at the current `k`
    /// (spec §4.7 step 2). A conflict whose overlap contains a repetitive
    /// sequence can never be resolved by growing `k` further, since both
    /// alternatives admit the same unbounded repetition at every larger `k`
    /// too — that is immediately fatal rather than returned as a pending
    /// conflict.
    fn find_conflicts(
        &self,
        look_ahead: &HashMap<ProductionId, Vec<LookAheadSet>>,
    ) -> Result<Vec<(ProductionId, usize, usize)>, GrammarError> {
        let mut conflicts = Vec::new();
        for prod in self.productions.values() {
            let sets = &look_ahead[&prod.id()];
            for i in 0..sets.len() {
                for j in (i + 1)..sets.len() {
                    let overlap = sets[i].conflict_witnesses(&sets[j]);
                    if overlap.is_empty() {
                        continue;
                    }
                    if overlap.has_repetitive() {
                        return Err(GrammarError::InherentAmbiguity {
                            name: prod.name().to_string(),
                            detail: format!(
                                "alternatives {i} and {j} both admit an unbounded repetition within \
                                 the conflicting look-ahead; growing k cannot resolve this"
                            ),
                        });
                    }
                    conflicts.push((prod.id(), i, j));
                }
            }
        }
        Ok(conflicts)
    }

    /// Last resort once `k` has grown as far as it's allowed to and
    /// conflicts remain (spec §4.7 step 4): designate one of each
    /// conflicting pair as the default alternative. A different alternative
    /// already marked as the default for the same pair is itself an
    /// unresolvable ambiguity — two would-be defaults.
    fn assign_defaults(
        &self,
        conflicts: &[(ProductionId, usize, usize)],
        defaults: &mut HashMap<ProductionId, usize>,
    ) -> Result<(), GrammarError> {
        for &(prod_id, i, j) in conflicts {
            let name = self.productions[&prod_id].name().to_string();
            match defaults.get(&prod_id).copied() {
                Some(d) if d == i || d == j => {}
                Some(_) => {
                    return Err(GrammarError::InherentAmbiguity {
                        name,
                        detail: format!(
                            "alternatives {i} and {j} conflict but a different alternative is \
                             already the default"
                        ),
                    });
                }
                None => {
                    defaults.insert(prod_id, j);
                }
            }
        }
        Ok(())
    }
}
