//! `CourseCore`: the bottom-up aggregate owning a domain, its prerequisite
//! graph, the surmise relation it induces, and the validated learning space
//! built from that relation's downsets.
//!
//! §9's Design Notes call for plain ownership rather than cyclic references
//! between the DAG, the surmise relation, and the knowledge space: each
//! component here borrows the domain, never the aggregate, and the
//! aggregate is built once, bottom-up, by [`CourseCore::build`].

use crate::domain::Domain;
use crate::prerequisite::{PrerequisiteError, PrerequisiteGraph, SurmiseRelation};
use crate::report::Report;
use crate::space::{LearningSpace, SpaceError};

/// Errors raised while assembling a [`CourseCore`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CourseError {
    /// The prerequisite edges were invalid.
    #[error(transparent)]
    Prerequisite(#[from] PrerequisiteError),
    /// The downsets of the induced surmise relation failed learning-space
    /// validation (unreachable for a correctly built quasi-order, but
    /// guarded against since `LearningSpace::build` is the single source of
    /// truth for that check).
    #[error(transparent)]
    Space(#[from] SpaceError),
}

/// A fully assembled course: domain, direct-prerequisite DAG, the surmise
/// relation it induces, and the learning space of that relation's downsets.
pub struct CourseCore {
    domain: Domain,
    graph: PrerequisiteGraph,
    relation: SurmiseRelation,
    learning_space: LearningSpace,
}

impl CourseCore {
    /// Build a course from a domain and a set of direct-prerequisite edges
    /// `(prerequisite_id, item_id)`.
    ///
    /// Builds, in order: the DAG (rejecting cycles), its transitive closure
    /// (the surmise relation), the Birkhoff downset family of that relation,
    /// and the learning space those downsets form (always valid, since a
    /// downset family is automatically union- and intersection-closed and
    /// accessible).
    pub fn build(domain: Domain, edges: &[(String, String)]) -> Result<(Self, Report), CourseError> {
        let graph = PrerequisiteGraph::new(&domain, edges)?;
        let relation = graph.transitive_closure();
        let states: Vec<_> = relation.downsets().collect();
        let (learning_space, report) = LearningSpace::build(domain.clone(), states, true)?;
        Ok((Self { domain, graph, relation, learning_space }, report))
    }

    /// The domain this course is defined over.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// The direct-prerequisite DAG.
    pub fn graph(&self) -> &PrerequisiteGraph {
        &self.graph
    }

    /// The surmise relation (reflexive-transitive closure of `graph`).
    pub fn relation(&self) -> &SurmiseRelation {
        &self.relation
    }

    /// The validated learning space built from the relation's downsets.
    pub fn learning_space(&self) -> &LearningSpace {
        &self.learning_space
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Item;

    fn domain(ids: &[&str]) -> Domain {
        Domain::new(ids.iter().map(|id| Item::new(*id).unwrap()).collect()).unwrap()
    }

    #[test]
    fn diamond_course_builds_a_six_state_learning_space() {
        let d = domain(&["a", "b", "c", "d"]);
        let edges: Vec<(String, String)> = vec![("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        let (course, report) = CourseCore::build(d, &edges).unwrap();
        assert!(report.is_valid());
        assert_eq!(course.learning_space().len(), 6);
        assert_eq!(course.graph().direct_successors("a").unwrap().len(), 2);
    }

    #[test]
    fn cyclic_edges_are_rejected_before_any_space_is_built() {
        let d = domain(&["a", "b"]);
        let edges: Vec<(String, String)> = vec![("a", "b"), ("b", "a")].into_iter().map(|(a, b)| (a.to_string(), b.to_string())).collect();
        let err = CourseCore::build(d, &edges).unwrap_err();
        assert!(matches!(err, CourseError::Prerequisite(PrerequisiteError::CyclicPrerequisites(_))));
    }
}
