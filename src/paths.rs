//! Learning-path enumeration
//!
//! A learning path is a maximal chain $\emptyset=K_0\lessdot\dots\lessdot K_n=Q$
//! in a [`LearningSpace`]'s covering relation. This module enumerates them
//! depth-first from $\emptyset$, branching on the outer fringe at each step
//! in item-id order so output is deterministic and reproducible across runs.

use crate::domain::KnowledgeState;
use crate::space::LearningSpace;

/// One learning path: the state sequence from `∅` to `Q`, and the item
/// added at each step (`items.len() == states.len() - 1`).
#[derive(Clone, Debug)]
pub struct LearningPath {
    /// States visited, starting at `∅` and ending at `Q`.
    pub states: Vec<KnowledgeState>,
    /// The item acquired at each step, in order.
    pub items: Vec<String>,
}

impl LearningPath {
    /// Number of items acquired (the path's length in edges).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// A path with at least one edge is never empty by construction; this
    /// is `true` only for the degenerate single-item domain's trivial path.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Enumerate every learning path through `space`, starting at `∅`, up to
/// `max_paths` (pass `None` for no cap — the count can grow factorially
/// with the number of pairwise-incomparable items, so an unbounded call is
/// only safe on small domains).
pub fn learning_paths(space: &LearningSpace, max_paths: Option<usize>) -> Vec<LearningPath> {
    let domain = space.domain();
    let mut out = Vec::new();
    let mut path_states = vec![domain.empty_state()];
    let mut path_items = Vec::new();
    walk(space, &mut path_states, &mut path_items, &mut out, max_paths);
    if let Some(limit) = max_paths {
        if out.len() >= limit {
            tracing::warn!(limit, "learning-path enumeration truncated by caller-supplied budget");
        }
    }
    out
}

fn walk(
    space: &LearningSpace,
    path_states: &mut Vec<KnowledgeState>,
    path_items: &mut Vec<String>,
    out: &mut Vec<LearningPath>,
    max_paths: Option<usize>,
) {
    if let Some(limit) = max_paths {
        if out.len() >= limit {
            return;
        }
    }
    let current = path_states.last().expect("path always has a start state");
    if current.len() == space.domain().len() {
        out.push(LearningPath { states: path_states.clone(), items: path_items.clone() });
        return;
    }
    for id in space.outer_fringe(current).ids() {
        let singleton = space.domain().singleton_state(&id).expect("id came from the domain");
        let next = current.union(&singleton);
        path_states.push(next);
        path_items.push(id);
        walk(space, path_states, path_items, out, max_paths);
        path_items.pop();
        path_states.pop();

        if let Some(limit) = max_paths {
            if out.len() >= limit {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Item};
    use crate::prerequisite::PrerequisiteGraph;

    fn space_from(ids: &[&str], edges: &[(&str, &str)]) -> LearningSpace {
        let d = Domain::new(ids.iter().map(|id| Item::new(*id).unwrap()).collect()).unwrap();
        let edges: Vec<(String, String)> = edges.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect();
        let g = PrerequisiteGraph::new(&d, &edges).unwrap();
        let rel = g.transitive_closure();
        let states: Vec<_> = rel.downsets().collect();
        let (space, _) = LearningSpace::build(d, states, true).unwrap();
        space
    }

    #[test]
    fn linear_chain_has_exactly_one_path() {
        let space = space_from(&["a", "b", "c", "d", "e"], &[("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")]);
        let paths = learning_paths(&space, None);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].items, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn diamond_has_exactly_two_paths() {
        let space = space_from(&["a", "b", "c", "d"], &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
        let mut paths = learning_paths(&space, None);
        paths.sort_by(|a, b| a.items.cmp(&b.items));
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].items, vec!["a", "b", "c", "d"]);
        assert_eq!(paths[1].items, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn antichain_has_six_permutations() {
        let space = space_from(&["a", "b", "c"], &[]);
        let paths = learning_paths(&space, None);
        assert_eq!(paths.len(), 6);
        for p in &paths {
            assert_eq!(p.len(), 3);
        }
    }

    #[test]
    fn max_paths_caps_output() {
        let space = space_from(&["a", "b", "c"], &[]);
        let paths = learning_paths(&space, Some(2));
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn every_prefix_of_every_path_is_in_the_space() {
        let space = space_from(&["a", "b", "c", "d"], &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
        for path in learning_paths(&space, None) {
            for state in &path.states {
                assert!(space.contains(state));
            }
            for pair in path.states.windows(2) {
                assert_eq!(pair[0].symmetric_difference(&pair[1]).len(), 1);
            }
        }
    }
}
