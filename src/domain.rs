//! Items, knowledge states, and domains
//!
//! This module is the crate's foundation: every other module builds on the
//! three value types defined here.
//!
//! ## Invariants
//!
//! - **Item identity.** An [`Item`]'s identity is its `id` alone; two items
//!   with the same id are the same item even if their labels differ.
//! - **Domain ordering.** A [`Domain`] stores its items sorted by id. This
//!   ordering is the canonical bit-position assignment used by
//!   [`KnowledgeState`] (see below) and by every downstream module that
//!   needs deterministic, reproducible iteration (prerequisite closure,
//!   space enumeration, learning paths).
//! - **State representation.** A [`KnowledgeState`] is stored as a fixed-size
//!   bitset indexed by a domain's item ordering rather than as a hash set of
//!   items. Union/intersection/difference/symmetric-difference become
//!   bitwise ops and membership tests become bit tests, which is the
//!   representation the combinatorial engine (`space`, `prerequisite`) leans
//!   on for the state counts this theory produces.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Errors raised while constructing or querying [`Item`]/[`Domain`]/
/// [`KnowledgeState`] values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// An item id was empty or contained only whitespace.
    #[error("item id must be non-empty and not whitespace-only")]
    InvalidItem,
    /// Two items in the same domain shared an id.
    #[error("duplicate item id: {0}")]
    DuplicateItemId(String),
    /// A domain was built with zero items.
    #[error("domain must contain at least one item")]
    EmptyDomain,
    /// An id was referenced that does not belong to the domain.
    #[error("unknown item id: {0}")]
    UnknownItem(String),
}

/// An atomic learnable unit, identified by a stable, non-empty id.
///
/// Equality, ordering, and hashing are based solely on [`Item::id`]; the
/// label is display metadata only.
#[derive(Clone, Debug)]
pub struct Item {
    id: String,
    label: Option<String>,
}

impl Item {
    /// Build an item with no display label.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        Self::with_label(id, None::<String>)
    }

    /// Build an item with an optional display label.
    pub fn with_label(
        id: impl Into<String>,
        label: impl Into<Option<String>>,
    ) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidItem);
        }
        Ok(Self { id, label: label.into() })
    }

    /// The item's stable id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The item's display label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Item {}

impl std::hash::Hash for Item {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Item {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Item {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

const WORD_BITS: usize = u64::BITS as usize;

/// A fixed-width bitset over a domain's id-sorted item positions.
///
/// Internal representation for [`KnowledgeState`]. Bit `i` corresponds to
/// the item at position `i` in the owning domain's sorted item list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) struct Bitset {
    words: Vec<u64>,
}

impl Bitset {
    pub(crate) fn empty(n: usize) -> Self {
        let n_words = (n + WORD_BITS - 1) / WORD_BITS;
        Self { words: vec![0u64; n_words.max(1)] }
    }

    pub(crate) fn full(n: usize) -> Self {
        let mut b = Self::empty(n);
        for i in 0..n {
            b.set(i);
        }
        b
    }

    #[inline]
    pub(crate) fn set(&mut self, i: usize) {
        self.words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
    }

    #[inline]
    pub(crate) fn contains(&self, i: usize) -> bool {
        (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1
    }

    #[inline]
    pub(crate) fn clear(&mut self, i: usize) {
        self.words[i / WORD_BITS] &= !(1u64 << (i % WORD_BITS));
    }

    pub(crate) fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub(crate) fn is_empty_set(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    fn zip_with(&self, other: &Self, f: impl Fn(u64, u64) -> u64) -> Self {
        debug_assert_eq!(self.words.len(), other.words.len(), "bitsets from different domains");
        Self { words: self.words.iter().zip(&other.words).map(|(&a, &b)| f(a, b)).collect() }
    }

    pub(crate) fn union(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a | b)
    }
    pub(crate) fn intersection(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a & b)
    }
    pub(crate) fn difference(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a & !b)
    }
    pub(crate) fn symmetric_difference(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a ^ b)
    }
    pub(crate) fn is_subset(&self, other: &Self) -> bool {
        debug_assert_eq!(self.words.len(), other.words.len(), "bitsets from different domains");
        self.words.iter().zip(&other.words).all(|(&a, &b)| a & !b == 0)
    }

    pub(crate) fn iter_ones(&self, n: usize) -> impl Iterator<Item = usize> + '_ {
        (0..n).filter(move |&i| self.contains(i))
    }

    pub(crate) fn with_bit(n: usize, i: usize) -> Self {
        let mut b = Self::empty(n);
        b.set(i);
        b
    }
}

/// An immutable set of items, interpreted as "items mastered."
///
/// States support the usual set operations; all of them are bitwise
/// operations on the underlying bitset and run in `O(|Q| / 64)`.
///
/// Two states must originate from the same [`Domain`] to be compared or
/// combined; this is a programmer invariant (debug-asserted), not a
/// recoverable error, mirroring how the rest of the crate treats
/// cross-domain misuse as a logic bug rather than expected input.
#[derive(Clone)]
pub struct KnowledgeState {
    domain_items: Arc<[Item]>,
    bits: Bitset,
}

impl KnowledgeState {
    pub(crate) fn from_bits(domain_items: Arc<[Item]>, bits: Bitset) -> Self {
        Self { domain_items, bits }
    }

    pub(crate) fn bits(&self) -> &Bitset {
        &self.bits
    }

    pub(crate) fn domain_items(&self) -> &Arc<[Item]> {
        &self.domain_items
    }

    /// Number of items in this state.
    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    /// True iff this state is the empty state.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty_set()
    }

    /// True iff `id` names an item in this state.
    pub fn contains(&self, id: &str) -> bool {
        self.domain_items.iter().position(|it| it.id() == id).is_some_and(|i| self.bits.contains(i))
    }

    /// The ids of the items mastered in this state, in id order.
    pub fn ids(&self) -> BTreeSet<String> {
        self.bits
            .iter_ones(self.domain_items.len())
            .map(|i| self.domain_items[i].id().to_string())
            .collect()
    }

    fn combine(&self, other: &Self, f: impl Fn(&Bitset, &Bitset) -> Bitset) -> Self {
        Self { domain_items: self.domain_items.clone(), bits: f(&self.bits, &other.bits) }
    }

    /// Set union.
    pub fn union(&self, other: &Self) -> Self {
        self.combine(other, Bitset::union)
    }
    /// Set intersection.
    pub fn intersection(&self, other: &Self) -> Self {
        self.combine(other, Bitset::intersection)
    }
    /// Set difference (`self \ other`).
    pub fn difference(&self, other: &Self) -> Self {
        self.combine(other, Bitset::difference)
    }
    /// Symmetric difference.
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        self.combine(other, Bitset::symmetric_difference)
    }
    /// True iff `self` is a subset of `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.bits.is_subset(&other.bits)
    }
    /// True iff `self` is a superset of `other`.
    pub fn is_superset(&self, other: &Self) -> bool {
        other.bits.is_subset(&self.bits)
    }
}

impl PartialEq for KnowledgeState {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}
impl Eq for KnowledgeState {}

impl std::hash::Hash for KnowledgeState {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl fmt::Debug for KnowledgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ids()).finish()
    }
}

/// A non-empty, finite set of items. The universe every other value type in
/// the crate is built against.
///
/// Items are stored sorted by id; this ordering is the canonical bit
/// position assignment for every [`KnowledgeState`] derived from this
/// domain, and the tie-break order used by every deterministic enumeration
/// in the crate (topological orders, downsets, learning paths).
#[derive(Clone)]
pub struct Domain {
    items: Arc<[Item]>,
    index: Arc<std::collections::HashMap<String, usize>>,
}

impl Domain {
    /// Build a domain from a list of items.
    ///
    /// # Errors
    /// [`DomainError::EmptyDomain`] if `items` is empty;
    /// [`DomainError::DuplicateItemId`] if two items share an id.
    pub fn new(items: Vec<Item>) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::EmptyDomain);
        }
        let mut items = items;
        items.sort();
        for pair in items.windows(2) {
            if pair[0].id() == pair[1].id() {
                return Err(DomainError::DuplicateItemId(pair[0].id().to_string()));
            }
        }
        let index = items
            .iter()
            .enumerate()
            .map(|(i, it)| (it.id().to_string(), i))
            .collect();
        Ok(Self { items: Arc::from(items), index: Arc::new(index) })
    }

    /// The domain's items, in canonical (id-sorted) order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// A cheap handle to the canonical item ordering, shared with every
    /// [`KnowledgeState`] built from this domain.
    pub(crate) fn items_arc(&self) -> Arc<[Item]> {
        self.items.clone()
    }

    /// Number of items in the domain (`|Q|`).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always `false`: [`Domain::new`] rejects empty domains.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True iff `id` names an item in this domain.
    pub fn contains_id(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// The bit position assigned to `id`, or an error if unknown.
    pub(crate) fn index_of(&self, id: &str) -> Result<usize, DomainError> {
        self.index.get(id).copied().ok_or_else(|| DomainError::UnknownItem(id.to_string()))
    }

    /// The ids of every item in the domain.
    pub fn id_set(&self) -> BTreeSet<String> {
        self.items.iter().map(|it| it.id().to_string()).collect()
    }

    /// The empty state, `∅`.
    pub fn empty_state(&self) -> KnowledgeState {
        KnowledgeState::from_bits(self.items.clone(), Bitset::empty(self.items.len()))
    }

    /// The full state, `Q`.
    pub fn full_state(&self) -> KnowledgeState {
        KnowledgeState::from_bits(self.items.clone(), Bitset::full(self.items.len()))
    }

    /// The singleton state `{q}`.
    pub fn singleton_state(&self, id: &str) -> Result<KnowledgeState, DomainError> {
        let i = self.index_of(id)?;
        Ok(KnowledgeState::from_bits(self.items.clone(), Bitset::with_bit(self.items.len(), i)))
    }

    /// Build a state from a set of item ids.
    ///
    /// # Errors
    /// [`DomainError::UnknownItem`] if any id is not in the domain.
    pub fn state_from_ids<I, S>(&self, ids: I) -> Result<KnowledgeState, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bits = Bitset::empty(self.items.len());
        for id in ids {
            let i = self.index_of(id.as_ref())?;
            bits.set(i);
        }
        Ok(KnowledgeState::from_bits(self.items.clone(), bits))
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain").field("items", &self.items).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(ids: &[&str]) -> Domain {
        Domain::new(ids.iter().map(|id| Item::new(*id).unwrap()).collect()).unwrap()
    }

    #[test]
    fn item_rejects_blank_ids() {
        assert_eq!(Item::new("").unwrap_err(), DomainError::InvalidItem);
        assert_eq!(Item::new("   ").unwrap_err(), DomainError::InvalidItem);
    }

    #[test]
    fn domain_rejects_empty_and_duplicates() {
        assert_eq!(Domain::new(vec![]).unwrap_err(), DomainError::EmptyDomain);
        let dup = vec![Item::new("a").unwrap(), Item::new("a").unwrap()];
        assert_eq!(Domain::new(dup).unwrap_err(), DomainError::DuplicateItemId("a".into()));
    }

    #[test]
    fn union_intersection_are_commutative_and_idempotent() {
        let d = domain(&["a", "b", "c"]);
        let k1 = d.state_from_ids(["a", "b"]).unwrap();
        let k2 = d.state_from_ids(["b", "c"]).unwrap();

        assert_eq!(k1.union(&k2), k2.union(&k1));
        assert_eq!(k1.intersection(&k2), k2.intersection(&k1));
        assert_eq!(k1.union(&k1), k1);
        assert_eq!(k1.intersection(&k1), k1);
    }

    #[test]
    fn identities_and_absorption_hold() {
        let d = domain(&["a", "b", "c"]);
        let k1 = d.state_from_ids(["a", "b"]).unwrap();
        let k2 = d.state_from_ids(["b", "c"]).unwrap();
        let empty = d.empty_state();
        let full = d.full_state();

        assert_eq!(k1.union(&empty), k1);
        assert_eq!(k1.intersection(&full), k1);
        assert_eq!(k1.union(&k1.intersection(&k2)), k1);
    }

    #[test]
    fn subset_is_a_partial_order() {
        let d = domain(&["a", "b", "c"]);
        let empty = d.empty_state();
        let ab = d.state_from_ids(["a", "b"]).unwrap();
        let full = d.full_state();

        assert!(empty.is_subset(&ab));
        assert!(ab.is_subset(&full));
        assert!(empty.is_subset(&full));
        assert!(ab.is_subset(&ab)); // reflexive
    }

    #[test]
    fn ids_round_trip() {
        let d = domain(&["b", "a", "c"]);
        let k = d.state_from_ids(["a", "c"]).unwrap();
        let ids: Vec<String> = k.ids().into_iter().collect();
        assert_eq!(ids, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn unknown_item_is_rejected() {
        let d = domain(&["a", "b"]);
        assert_eq!(d.state_from_ids(["z"]).unwrap_err(), DomainError::UnknownItem("z".into()));
    }
}
