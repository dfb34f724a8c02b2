//! Prerequisite algebra: surmise relations, DAGs, closure/reduction, downsets
//!
//! This module owns the algebra that sits beneath a knowledge space: a
//! quasi-order ("surmise relation") expressing "is a prerequisite of", and
//! the directed acyclic graph of *direct* prerequisites it is usually built
//! from. The two directions of the Birkhoff correspondence both live here:
//! [`PrerequisiteGraph::transitive_closure`] turns direct edges into a
//! quasi-order, and [`SurmiseRelation::downsets`] turns a quasi-order into
//! the family of knowledge states the `space` module validates.
//!
//! All reachability is computed on bitsets indexed by a domain's canonical
//! item order (see `domain`), so closure, reduction, and downset checks are
//! bitwise operations rather than hash-set churn.

use std::collections::VecDeque;

use crate::domain::{Bitset, Domain, DomainError, Item, KnowledgeState};

/// Errors raised while building or querying prerequisite structures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrerequisiteError {
    /// An edge or pair endpoint named an id outside the domain.
    #[error("unknown item id: {0}")]
    UnknownItem(String),
    /// The given edge set induces a directed cycle.
    ///
    /// The payload is one witness cycle, as a sequence of item ids starting
    /// and ending at the same item.
    #[error("cyclic prerequisites: {}", .0.join(" -> "))]
    CyclicPrerequisites(Vec<String>),
    /// A user-supplied relation is missing reflexive or transitive pairs.
    #[error("not a quasi-order: missing pair ({0}, {1})")]
    NotAQuasiOrder(String, String),
}

/// A directed acyclic graph of *direct* prerequisite edges over a domain.
#[derive(Clone)]
pub struct PrerequisiteGraph {
    domain: Domain,
    /// `successors[i]` = direct successors of item `i` (bit position, not id).
    successors: Vec<Bitset>,
    /// `predecessors[i]` = direct predecessors of item `i`.
    predecessors: Vec<Bitset>,
}

impl PrerequisiteGraph {
    /// Build a DAG from a domain and a set of `(prerequisite_id, item_id)` edges.
    ///
    /// # Errors
    /// [`PrerequisiteError::UnknownItem`] if an endpoint is not in the domain;
    /// [`PrerequisiteError::CyclicPrerequisites`] if the edges induce a cycle
    /// (a self-loop is a cycle of length one and is rejected the same way).
    pub fn new(domain: &Domain, edges: &[(String, String)]) -> Result<Self, PrerequisiteError> {
        let n = domain.len();
        let mut successors = vec![Bitset::empty(n); n];
        let mut predecessors = vec![Bitset::empty(n); n];

        for (src, tgt) in edges {
            let s = domain
                .index_of(src)
                .map_err(|_| PrerequisiteError::UnknownItem(src.clone()))?;
            let t = domain
                .index_of(tgt)
                .map_err(|_| PrerequisiteError::UnknownItem(tgt.clone()))?;
            successors[s].set(t);
            predecessors[t].set(s);
        }

        let graph = Self { domain: domain.clone(), successors, predecessors };
        if let Some(cycle) = graph.find_cycle() {
            let ids = cycle.into_iter().map(|i| graph.domain.items()[i].id().to_string()).collect();
            return Err(PrerequisiteError::CyclicPrerequisites(ids));
        }
        Ok(graph)
    }

    /// The domain this graph is defined over.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Direct predecessors of `id` (the items `id` directly depends on).
    pub fn direct_predecessors(&self, id: &str) -> Result<Vec<&Item>, PrerequisiteError> {
        let i = self.idx(id)?;
        Ok(self.predecessors[i].iter_ones(self.domain.len()).map(|j| &self.domain.items()[j]).collect())
    }

    /// Direct successors of `id` (the items that directly depend on `id`).
    pub fn direct_successors(&self, id: &str) -> Result<Vec<&Item>, PrerequisiteError> {
        let i = self.idx(id)?;
        Ok(self.successors[i].iter_ones(self.domain.len()).map(|j| &self.domain.items()[j]).collect())
    }

    fn idx(&self, id: &str) -> Result<usize, PrerequisiteError> {
        self.domain.index_of(id).map_err(|_| PrerequisiteError::UnknownItem(id.to_string()))
    }

    /// Three-color DFS cycle detection. Returns a witness cycle (bit indices)
    /// if one exists.
    fn find_cycle(&self) -> Option<Vec<usize>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let n = self.domain.len();
        let mut color = vec![Color::White; n];
        let mut parent = vec![usize::MAX; n];

        for start in 0..n {
            if color[start] != Color::White {
                continue;
            }
            let mut stack = vec![(start, false)];
            while let Some((u, processed)) = stack.pop() {
                if processed {
                    color[u] = Color::Black;
                    continue;
                }
                if color[u] == Color::Gray {
                    continue;
                }
                color[u] = Color::Gray;
                stack.push((u, true));
                for v in self.successors[u].iter_ones(n) {
                    match color[v] {
                        Color::White => {
                            parent[v] = u;
                            stack.push((v, false));
                        }
                        Color::Gray => {
                            // Found a back edge u -> v; reconstruct v .. u .. v.
                            let mut cycle = vec![v];
                            let mut cur = u;
                            while cur != v {
                                cycle.push(cur);
                                cur = parent[cur];
                            }
                            cycle.push(v);
                            cycle.reverse();
                            return Some(cycle);
                        }
                        Color::Black => {}
                    }
                }
            }
        }
        None
    }

    /// Reflexive-transitive closure: the surmise relation induced by this DAG.
    pub fn transitive_closure(&self) -> SurmiseRelation {
        let n = self.domain.len();
        let mut prereq_closure = vec![Bitset::empty(n); n];
        for i in 0..n {
            prereq_closure[i] = self.reachable_via(&self.predecessors, i);
            prereq_closure[i].set(i); // reflexive
        }
        SurmiseRelation::from_closure(self.domain.clone(), prereq_closure)
    }

    fn reachable_via(&self, adjacency: &[Bitset], start: usize) -> Bitset {
        let n = self.domain.len();
        let mut visited = Bitset::empty(n);
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(u) = queue.pop_front() {
            for v in adjacency[u].iter_ones(n) {
                if !visited.contains(v) {
                    visited.set(v);
                    queue.push_back(v);
                }
            }
        }
        visited
    }

    /// The minimum-edge DAG with the same reachability as this one.
    pub fn transitive_reduction(&self) -> PrerequisiteGraph {
        let n = self.domain.len();
        // successors_reach[i] = strict descendants of i (excludes i itself).
        let successors_reach: Vec<Bitset> = (0..n).map(|i| self.reachable_via(&self.successors, i)).collect();

        let mut reduced_successors = vec![Bitset::empty(n); n];
        let mut reduced_predecessors = vec![Bitset::empty(n); n];
        for u in 0..n {
            for v in self.successors[u].iter_ones(n) {
                let redundant = self.successors[u]
                    .iter_ones(n)
                    .any(|w| w != v && successors_reach[w].contains(v));
                if !redundant {
                    reduced_successors[u].set(v);
                    reduced_predecessors[v].set(u);
                }
            }
        }
        PrerequisiteGraph { domain: self.domain.clone(), successors: reduced_successors, predecessors: reduced_predecessors }
    }

    /// One or more total orderings of the domain consistent with the DAG,
    /// up to `limit` orders (pass `None` for no limit, but beware: the count
    /// of topological orders can grow combinatorially with the number of
    /// incomparable items).
    ///
    /// Every prefix of a returned order is a downset of the induced surmise
    /// relation.
    pub fn topological_orders(&self, limit: Option<usize>) -> Vec<Vec<usize>> {
        let n = self.domain.len();
        let mut indegree: Vec<usize> = (0..n).map(|i| self.predecessors[i].count_ones()).collect();
        let mut out = Vec::new();
        let mut path = Vec::with_capacity(n);
        let mut used = Bitset::empty(n);
        self.topo_dfs(&mut indegree, &mut path, &mut used, &mut out, limit);
        out
    }

    fn topo_dfs(
        &self,
        indegree: &mut [usize],
        path: &mut Vec<usize>,
        used: &mut Bitset,
        out: &mut Vec<Vec<usize>>,
        limit: Option<usize>,
    ) {
        if let Some(l) = limit {
            if out.len() >= l {
                return;
            }
        }
        let n = self.domain.len();
        if path.len() == n {
            out.push(path.clone());
            return;
        }
        // Candidates: zero indegree among the *not yet used* nodes, in id order.
        let candidates: Vec<usize> = (0..n).filter(|&i| !used.contains(i) && indegree[i] == 0).collect();
        for c in candidates {
            used.set(c);
            path.push(c);
            for v in self.successors[c].iter_ones(n) {
                indegree[v] -= 1;
            }

            self.topo_dfs(indegree, path, used, out, limit);

            for v in self.successors[c].iter_ones(n) {
                indegree[v] += 1;
            }
            path.pop();
            used.clear(c);

            if let Some(l) = limit {
                if out.len() >= l {
                    return;
                }
            }
        }
    }

    /// The length (in edges) of the longest directed path, and one witness.
    /// Isolated items contribute length 0.
    pub fn longest_path(&self) -> (Vec<&Item>, usize) {
        let n = self.domain.len();
        let order = self.topological_orders(Some(1)).into_iter().next().unwrap_or_default();
        let mut best_len = vec![0usize; n];
        let mut best_pred: Vec<Option<usize>> = vec![None; n];

        for &u in &order {
            for v in self.successors[u].iter_ones(n) {
                if best_len[u] + 1 > best_len[v] {
                    best_len[v] = best_len[u] + 1;
                    best_pred[v] = Some(u);
                }
            }
        }

        let (mut end, &len) = best_len.iter().enumerate().max_by_key(|&(_, &l)| l).unwrap();
        let mut witness = vec![end];
        while let Some(p) = best_pred[end] {
            witness.push(p);
            end = p;
        }
        witness.reverse();
        (witness.into_iter().map(|i| &self.domain.items()[i]).collect(), len)
    }
}

/// A quasi-order ("surmise relation") over a domain: `p ≼ q` reads as
/// "`p` is a prerequisite of `q`". Reflexive and transitive by construction.
#[derive(Clone)]
pub struct SurmiseRelation {
    domain: Domain,
    /// `prereq_closure[i]` = bitset of items that are prerequisites of item
    /// `i` (including `i` itself).
    prereq_closure: Vec<Bitset>,
}

impl SurmiseRelation {
    pub(crate) fn from_closure(domain: Domain, prereq_closure: Vec<Bitset>) -> Self {
        Self { domain, prereq_closure }
    }

    /// Build a surmise relation directly from a list of `(p, q)` pairs
    /// meaning `p ≼ q`. The pairs given must already be reflexive and
    /// transitively closed.
    ///
    /// # Errors
    /// [`PrerequisiteError::UnknownItem`] for an id outside the domain;
    /// [`PrerequisiteError::NotAQuasiOrder`] if reflexivity or transitivity
    /// is violated.
    pub fn from_pairs(domain: &Domain, pairs: &[(String, String)]) -> Result<Self, PrerequisiteError> {
        let n = domain.len();
        let mut closure = vec![Bitset::empty(n); n];
        for (p, q) in pairs {
            let pi = domain.index_of(p).map_err(|_| PrerequisiteError::UnknownItem(p.clone()))?;
            let qi = domain.index_of(q).map_err(|_| PrerequisiteError::UnknownItem(q.clone()))?;
            closure[qi].set(pi);
        }
        for i in 0..n {
            if !closure[i].contains(i) {
                let id = domain.items()[i].id().to_string();
                return Err(PrerequisiteError::NotAQuasiOrder(id.clone(), id));
            }
        }
        for q in 0..n {
            for p in closure[q].iter_ones(n) {
                if !closure[p].is_subset(&closure[q]) {
                    let missing = closure[p]
                        .iter_ones(n)
                        .find(|&r| !closure[q].contains(r))
                        .unwrap();
                    return Err(PrerequisiteError::NotAQuasiOrder(
                        domain.items()[missing].id().to_string(),
                        domain.items()[q].id().to_string(),
                    ));
                }
            }
        }
        Ok(Self { domain: domain.clone(), prereq_closure: closure })
    }

    /// The domain this relation is defined over.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// `{p : p ≼ q}`, including `q` itself.
    pub fn prerequisites_of(&self, id: &str) -> Result<Vec<&Item>, PrerequisiteError> {
        let i = self.idx(id)?;
        Ok(self.prereq_closure[i].iter_ones(self.domain.len()).map(|j| &self.domain.items()[j]).collect())
    }

    /// `{r : q ≼ r}`, including `q` itself.
    pub fn dependents_of(&self, id: &str) -> Result<Vec<&Item>, PrerequisiteError> {
        let i = self.idx(id)?;
        let n = self.domain.len();
        Ok((0..n)
            .filter(|&r| self.prereq_closure[r].contains(i))
            .map(|j| &self.domain.items()[j])
            .collect())
    }

    fn idx(&self, id: &str) -> Result<usize, PrerequisiteError> {
        self.domain.index_of(id).map_err(|_| PrerequisiteError::UnknownItem(id.to_string()))
    }

    /// True iff `q ≼ r` (item `q` is a prerequisite of item `r`).
    pub fn precedes(&self, q: &str, r: &str) -> Result<bool, PrerequisiteError> {
        let qi = self.idx(q)?;
        let ri = self.idx(r)?;
        Ok(self.prereq_closure[ri].contains(qi))
    }

    /// True iff `state` is a downset: every item in `state` has all of its
    /// prerequisites also in `state`.
    pub fn is_downset(&self, state: &KnowledgeState) -> bool {
        let n = self.domain.len();
        state.bits().iter_ones(n).all(|q| self.prereq_closure[q].is_subset(state.bits()))
    }

    /// A linear extension of the quasi-order (id order breaks remaining ties).
    fn linear_extension(&self) -> Vec<usize> {
        let n = self.domain.len();
        let mut order = Vec::with_capacity(n);
        let mut done = Bitset::empty(n);
        while order.len() < n {
            let before = order.len();
            for q in 0..n {
                if done.contains(q) {
                    continue;
                }
                let remaining = self.prereq_closure[q].iter_ones(n).filter(|&p| p != q && !done.contains(p)).count();
                if remaining == 0 {
                    order.push(q);
                    done.set(q);
                }
            }
            if order.len() == before {
                // No zero-remaining item exists: the relation has a mutual
                // pair (p ≼ q ≼ p, p ≠ q) and is not a strict partial order.
                // Fall back to placing whatever remains in id order so the
                // caller gets a total order rather than a hang; downset
                // enumeration over such a relation is best-effort.
                for q in 0..n {
                    if !done.contains(q) {
                        order.push(q);
                        done.set(q);
                    }
                }
            }
        }
        order
    }

    /// Enumerate every downset of this quasi-order exactly once (Birkhoff
    /// direction: a partial order maps to a family closed under union and
    /// intersection). The family always contains `∅` and `Q`.
    ///
    /// Worst case `O(2^{|Q|})`; callers bound the cost with `.take(n)`.
    pub fn downsets(&self) -> impl Iterator<Item = KnowledgeState> + '_ {
        let order = self.linear_extension();
        DownsetIter { rel: self, order, stack: vec![(0, Bitset::empty(self.domain.len()))] }
    }
}

struct DownsetIter<'a> {
    rel: &'a SurmiseRelation,
    order: Vec<usize>,
    /// Each frame is `(next item position to branch on, accumulated bitset)`.
    /// A stack-based encoding of the include/exclude backtracking recursion
    /// described in the module docs, made iterative to implement `Iterator`.
    stack: Vec<(usize, Bitset)>,
}

impl<'a> Iterator for DownsetIter<'a> {
    type Item = KnowledgeState;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((pos, acc)) = self.stack.pop() {
            if pos == self.order.len() {
                return Some(KnowledgeState::from_bits(self.rel.domain.items_arc(), acc));
            }
            let item = self.order[pos];
            // Push "exclude" first so "include" (if valid) is explored next
            // (depth-first, and both options are eventually visited).
            self.stack.push((pos + 1, acc.clone()));
            let mut with_item = acc.clone();
            with_item.set(item);
            // prereq_closure[item] always contains item itself (reflexivity),
            // so the subset test must be against acc ∪ {item}, not acc: this
            // checks that item's strict prerequisites are already included.
            if self.rel.prereq_closure[item].is_subset(&with_item) {
                self.stack.push((pos + 1, with_item));
            }
        }
        None
    }
}

impl From<DomainError> for PrerequisiteError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::UnknownItem(id) => PrerequisiteError::UnknownItem(id),
            other => PrerequisiteError::UnknownItem(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Item;

    fn domain(ids: &[&str]) -> Domain {
        Domain::new(ids.iter().map(|id| Item::new(*id).unwrap()).collect()).unwrap()
    }

    fn edge(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn rejects_self_loop_as_cycle() {
        let d = domain(&["a"]);
        let err = PrerequisiteGraph::new(&d, &[edge("a", "a")]).unwrap_err();
        assert!(matches!(err, PrerequisiteError::CyclicPrerequisites(_)));
    }

    #[test]
    fn rejects_cycle() {
        let d = domain(&["a", "b", "c"]);
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "a")];
        let err = PrerequisiteGraph::new(&d, &edges).unwrap_err();
        assert!(matches!(err, PrerequisiteError::CyclicPrerequisites(_)));
    }

    #[test]
    fn linear_chain_closure_and_downsets() {
        let d = domain(&["a", "b", "c", "d", "e"]);
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "d"), edge("d", "e")];
        let g = PrerequisiteGraph::new(&d, &edges).unwrap();
        let rel = g.transitive_closure();

        let prereqs_of_e: Vec<String> = rel.prerequisites_of("e").unwrap().iter().map(|i| i.id().to_string()).collect();
        assert_eq!(prereqs_of_e, vec!["a", "b", "c", "d", "e"]);

        let downsets: Vec<_> = rel.downsets().collect();
        assert_eq!(downsets.len(), 6); // {}, {a}, {a,b}, {a,b,c}, {a,b,c,d}, Q
    }

    #[test]
    fn diamond_has_six_downsets() {
        let d = domain(&["a", "b", "c", "d"]);
        let edges = vec![edge("a", "b"), edge("a", "c"), edge("b", "d"), edge("c", "d")];
        let g = PrerequisiteGraph::new(&d, &edges).unwrap();
        let rel = g.transitive_closure();
        assert_eq!(rel.downsets().count(), 6);
    }

    #[test]
    fn antichain_has_eight_downsets() {
        let d = domain(&["a", "b", "c"]);
        let g = PrerequisiteGraph::new(&d, &[]).unwrap();
        let rel = g.transitive_closure();
        assert_eq!(rel.downsets().count(), 8);
    }

    #[test]
    fn transitive_reduction_drops_shortcut_edges() {
        let d = domain(&["a", "b", "c"]);
        // a -> b -> c, plus a redundant shortcut a -> c.
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("a", "c")];
        let g = PrerequisiteGraph::new(&d, &edges).unwrap();
        let reduced = g.transitive_reduction();
        assert_eq!(reduced.direct_successors("a").unwrap().len(), 1);
        assert_eq!(reduced.direct_successors("a").unwrap()[0].id(), "b");
    }

    #[test]
    fn longest_path_on_linear_chain() {
        let d = domain(&["a", "b", "c", "d", "e"]);
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "d"), edge("d", "e")];
        let g = PrerequisiteGraph::new(&d, &edges).unwrap();
        let (witness, len) = g.longest_path();
        assert_eq!(len, 4);
        let ids: Vec<&str> = witness.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn quasi_order_rejects_non_reflexive_pairs() {
        let d = domain(&["a", "b"]);
        let pairs = vec![edge("a", "b")]; // missing reflexive (a,a) and (b,b)
        let err = SurmiseRelation::from_pairs(&d, &pairs).unwrap_err();
        assert!(matches!(err, PrerequisiteError::NotAQuasiOrder(_, _)));
    }
}
