//! Knowledge spaces and learning spaces: axiom validation, fringes, atoms,
//! gradation, covering relation
//!
//! A [`KnowledgeSpace`] is a validated family of states over a domain; a
//! [`LearningSpace`] is a knowledge space additionally satisfying
//! accessibility. Both are built once, by a validating constructor, and are
//! immutable afterwards — every derived query (fringes, atoms, gradation,
//! covering edges) reads the stored family without mutating it.
//!
//! Construction always runs the full battery of axiom checks and returns a
//! [`Report`](crate::report::Report) describing each one; "strict" builders
//! additionally turn the first failing check into a [`SpaceError`].

use std::collections::HashSet;
use std::ops::Deref;

use crate::domain::{Domain, KnowledgeState};
use crate::report::{Check, Report};

/// Errors raised while building or validating a knowledge or learning space.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpaceError {
    /// A strict-mode build failed an axiom check.
    #[error("axiom violation ({which}): {witness}")]
    AxiomViolation {
        /// Which axiom failed (`"S1"`, `"S2"`, `"S3"`, `"subset"`).
        which: String,
        /// A human-readable witness (e.g. the offending state or pair).
        witness: String,
    },
    /// A strict-mode learning-space build failed accessibility.
    #[error("accessibility fails for state {0}")]
    InaccessibleState(String),
}

/// A validated family of knowledge states over a domain: $(Q,\mathcal K)$.
///
/// States are kept sorted by `(cardinality, ids)` so every derived
/// enumeration (gradation, covering, atoms) iterates deterministically.
#[derive(Clone)]
pub struct KnowledgeSpace {
    domain: Domain,
    states: Vec<KnowledgeState>,
    members: HashSet<KnowledgeState>,
}

fn canonical_order(mut states: Vec<KnowledgeState>) -> Vec<KnowledgeState> {
    states.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.ids().cmp(&b.ids())));
    states.dedup_by(|a, b| a == b);
    states
}

fn check_s1(members: &HashSet<KnowledgeState>, domain: &Domain) -> Check {
    if members.contains(&domain.empty_state()) {
        Check::pass("S1: empty state present", "S1")
    } else {
        Check::fail("S1: empty state present", "S1", "∅ is not a member of the family")
    }
}

fn check_s2(members: &HashSet<KnowledgeState>, domain: &Domain) -> Check {
    if members.contains(&domain.full_state()) {
        Check::pass("S2: full state present", "S2")
    } else {
        Check::fail("S2: full state present", "S2", "Q is not a member of the family")
    }
}

fn check_subset(states: &[KnowledgeState], domain: &Domain) -> Check {
    let full = domain.full_state();
    match states.iter().find(|k| !k.is_subset(&full)) {
        None => Check::pass("every state ⊆ Q", "subset"),
        Some(k) => Check::fail(
            "every state ⊆ Q",
            "subset",
            format!("state {:?} is not a subset of the domain", k.ids()),
        ),
    }
}

/// Naive $O(m^2 \cdot n)$ union-closure check. States are assumed already
/// sorted by ascending cardinality, so the first counterexample encountered
/// is also the smallest-cardinality one, matching the debugging contract.
fn check_union_closure(states: &[KnowledgeState], members: &HashSet<KnowledgeState>) -> Check {
    for i in 0..states.len() {
        for j in (i + 1)..states.len() {
            let union = states[i].union(&states[j]);
            if !members.contains(&union) {
                return Check::fail(
                    "S3: union closure",
                    "S3",
                    format!(
                        "{:?} ∪ {:?} = {:?} is not in the family",
                        states[i].ids(),
                        states[j].ids(),
                        union.ids()
                    ),
                );
            }
        }
    }
    Check::pass("S3: union closure", "S3")
}

fn check_accessibility(domain: &Domain, states: &[KnowledgeState], members: &HashSet<KnowledgeState>) -> Check {
    for k in states {
        if k.is_empty() {
            continue;
        }
        let reachable = k.ids().iter().any(|id| {
            let singleton = domain.singleton_state(id).expect("id came from a state over this domain");
            members.contains(&k.difference(&singleton))
        });
        if !reachable {
            return Check::fail(
                "accessibility",
                "accessibility",
                format!("no q ∈ {:?} has {:?} \\ {{q}} in the family", k.ids(), k.ids()),
            );
        }
    }
    Check::pass("accessibility", "accessibility")
}

impl KnowledgeSpace {
    fn assemble(domain: Domain, states: Vec<KnowledgeState>) -> (Self, Report) {
        let states = canonical_order(states);
        let members: HashSet<KnowledgeState> = states.iter().cloned().collect();

        let mut report = Report::new();
        report.push(check_s1(&members, &domain));
        report.push(check_s2(&members, &domain));
        report.push(check_subset(&states, &domain));
        report.push(check_union_closure(&states, &members));

        (Self { domain, states, members }, report)
    }

    /// Validate `states` against S1, S2, S3, and the subset invariant without
    /// constructing a space. Useful for a dry-run check.
    pub fn validate(domain: &Domain, states: &[KnowledgeState]) -> Report {
        let (_space, report) = Self::assemble(domain.clone(), states.to_vec());
        report
    }

    /// Build a knowledge space, always returning the constructed value
    /// alongside its validation [`Report`]. In `strict` mode, any failing
    /// check is returned as a [`SpaceError`] instead.
    pub fn build(domain: Domain, states: Vec<KnowledgeState>, strict: bool) -> Result<(Self, Report), SpaceError> {
        let (space, report) = Self::assemble(domain, states);
        if strict {
            if let Some(failure) = report.failures().next() {
                return Err(SpaceError::AxiomViolation {
                    which: failure.reference.clone(),
                    witness: failure.message.clone(),
                });
            }
        }
        Ok((space, report))
    }

    /// The domain this space is defined over.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// The states of the family, in canonical `(cardinality, ids)` order.
    pub fn states(&self) -> &[KnowledgeState] {
        &self.states
    }

    /// Number of states in the family.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True iff the family is empty (never the case for a validated space,
    /// since S1/S2 guarantee at least `∅` and `Q`).
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// True iff `k` belongs to the family.
    pub fn contains(&self, k: &KnowledgeState) -> bool {
        self.members.contains(k)
    }

    /// Inner fringe $K^I$: items of `k` whose removal stays in the family.
    pub fn inner_fringe(&self, k: &KnowledgeState) -> KnowledgeState {
        let mut acc = self.domain.empty_state();
        for id in k.ids() {
            let singleton = self.domain.singleton_state(&id).expect("id from k is in domain");
            if self.members.contains(&k.difference(&singleton)) {
                acc = acc.union(&singleton);
            }
        }
        acc
    }

    /// Outer fringe $K^O$: items outside `k` whose addition stays in the family.
    pub fn outer_fringe(&self, k: &KnowledgeState) -> KnowledgeState {
        let mut acc = self.domain.empty_state();
        for item in self.domain.items() {
            if k.contains(item.id()) {
                continue;
            }
            let singleton = self.domain.singleton_state(item.id()).expect("item is in domain");
            if self.members.contains(&k.union(&singleton)) {
                acc = acc.union(&singleton);
            }
        }
        acc
    }

    /// Minimal non-empty states of the family: states with no non-empty,
    /// strictly smaller state in the family.
    pub fn atoms(&self) -> Vec<KnowledgeState> {
        self.states
            .iter()
            .filter(|k| !k.is_empty())
            .filter(|k| {
                !self
                    .states
                    .iter()
                    .any(|other| !other.is_empty() && other != *k && other.is_subset(k))
            })
            .cloned()
            .collect()
    }

    /// States partitioned by cardinality, index `i` holding every state of
    /// size `i` (`0..=|Q|`).
    pub fn gradation(&self) -> Vec<Vec<KnowledgeState>> {
        let n = self.domain.len();
        let mut levels: Vec<Vec<KnowledgeState>> = vec![Vec::new(); n + 1];
        for k in &self.states {
            levels[k.len()].push(k.clone());
        }
        levels
    }

    /// The covering relation: every pair `(L, K)` with `L ⊂ K`, `|K| = |L|+1`,
    /// both in the family, tagged with the single item distinguishing them.
    pub fn covering_edges(&self) -> Vec<CoveringEdge> {
        let grad = self.gradation();
        let mut edges = Vec::new();
        for level in 0..self.domain.len() {
            for lower in &grad[level] {
                for upper in &grad[level + 1] {
                    if lower.is_subset(upper) {
                        let added = upper.difference(lower);
                        let item = added.ids().into_iter().next().expect("cardinality differs by one");
                        edges.push(CoveringEdge { lower: lower.clone(), upper: upper.clone(), item });
                    }
                }
            }
        }
        edges
    }
}

/// One edge of the covering relation, $L\lessdot K$: `upper` adds exactly
/// `item` to `lower`.
#[derive(Clone, Debug)]
pub struct CoveringEdge {
    /// The smaller state.
    pub lower: KnowledgeState,
    /// The larger state, covering `lower`.
    pub upper: KnowledgeState,
    /// The single item `upper` adds over `lower`.
    pub item: String,
}

/// A knowledge space additionally satisfying accessibility: every non-empty
/// state has at least one item whose removal stays in the family.
#[derive(Clone)]
pub struct LearningSpace {
    space: KnowledgeSpace,
}

impl LearningSpace {
    /// Build a learning space: runs every [`KnowledgeSpace`] check plus
    /// accessibility, always returning the constructed value alongside its
    /// report. In `strict` mode a failing check (of either kind) is
    /// returned as a [`SpaceError`].
    pub fn build(domain: Domain, states: Vec<KnowledgeState>, strict: bool) -> Result<(Self, Report), SpaceError> {
        let (space, mut report) = KnowledgeSpace::assemble(domain, states);
        let accessibility = check_accessibility(&space.domain, &space.states, &space.members);
        let accessibility_failed = !accessibility.passed;
        let witness = accessibility.message.clone();
        report.push(accessibility);

        if strict {
            if let Some(failure) = report.failures().next() {
                if accessibility_failed && failure.reference == "accessibility" {
                    return Err(SpaceError::InaccessibleState(witness));
                }
                return Err(SpaceError::AxiomViolation {
                    which: failure.reference.clone(),
                    witness: failure.message.clone(),
                });
            }
        }
        Ok((Self { space }, report))
    }

    /// Validate `states` as a learning space without constructing one.
    pub fn validate(domain: &Domain, states: &[KnowledgeState]) -> Report {
        let (space, _) = KnowledgeSpace::assemble(domain.clone(), states.to_vec());
        let mut report = Report::new();
        report.push(check_s1(&space.members, &space.domain));
        report.push(check_s2(&space.members, &space.domain));
        report.push(check_subset(&space.states, &space.domain));
        report.push(check_union_closure(&space.states, &space.members));
        report.push(check_accessibility(&space.domain, &space.states, &space.members));
        report
    }

    /// The underlying validated knowledge space.
    pub fn knowledge_space(&self) -> &KnowledgeSpace {
        &self.space
    }
}

impl Deref for LearningSpace {
    type Target = KnowledgeSpace;
    fn deref(&self) -> &Self::Target {
        &self.space
    }
}
