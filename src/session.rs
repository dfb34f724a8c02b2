//! Adaptive assessment session state machine
//!
//! Wraps [`crate::assessment`]'s pure belief-update and information-gain
//! functions in an explicit protocol: `Idle → Open → Open' → Complete`, with
//! misuse (asking an unknown item, re-asking an item, continuing a finished
//! session) routed to a terminal `Failed` state rather than silently
//! retried.

use std::collections::BTreeSet;

use crate::assessment::{information_gain, update_belief, AssessmentError, BLIMParameters, BeliefState};
use crate::domain::{Domain, KnowledgeState};

/// The session's lifecycle position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// Accepting observations.
    Open,
    /// Every item has been asked, or the entropy threshold was reached.
    Complete,
    /// A protocol error occurred; the session accepts no further operations.
    Failed,
}

/// One step of the session's audit trail.
#[derive(Clone, Debug)]
pub struct StepLog {
    /// The item asked.
    pub item: String,
    /// The observed response.
    pub response: bool,
    /// Belief entropy immediately before this observation.
    pub entropy_before: f64,
    /// Belief entropy immediately after this observation.
    pub entropy_after: f64,
    /// The MAP state after this observation.
    pub map_state: KnowledgeState,
}

/// The terminal report of a completed (or failed) session.
#[derive(Clone, Debug)]
pub struct AssessmentSummary {
    /// Total number of questions asked.
    pub total_questions: usize,
    /// The ordered step log.
    pub steps: Vec<StepLog>,
    /// The final MAP state.
    pub final_map_state: KnowledgeState,
    /// Confidence score $1 - H(\pi)/\log_2|\mathcal K|$.
    pub confidence: f64,
}

/// Configuration for session completion.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// The session completes early once belief entropy drops to or below
    /// this value, even if unasked items remain. Default `0.0`: complete
    /// only on exact certainty (or once every item has been asked).
    pub entropy_threshold: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { entropy_threshold: 0.0 }
    }
}

/// An adaptive (or batch) BLIM assessment session.
#[derive(Clone)]
pub struct AssessmentSession {
    domain: Domain,
    params: BLIMParameters,
    belief: BeliefState,
    asked: BTreeSet<String>,
    steps: Vec<StepLog>,
    status: SessionStatus,
    config: SessionConfig,
}

impl AssessmentSession {
    /// Start a session: `Idle → Open`, with a uniform prior over `states`.
    pub fn start(domain: Domain, states: Vec<KnowledgeState>, params: BLIMParameters, config: SessionConfig) -> Self {
        let belief = BeliefState::uniform(&states);
        Self { domain, params, belief, asked: BTreeSet::new(), steps: Vec::new(), status: SessionStatus::Open, config }
    }

    /// The session's current lifecycle position.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The current belief over the knowledge family.
    pub fn belief(&self) -> &BeliefState {
        &self.belief
    }

    /// Items already asked.
    pub fn asked(&self) -> &BTreeSet<String> {
        &self.asked
    }

    fn recompute_status(&mut self) {
        if self.status != SessionStatus::Open {
            return;
        }
        let all_asked = self.asked.len() == self.domain.len();
        if all_asked || self.belief.entropy() <= self.config.entropy_threshold {
            self.status = SessionStatus::Complete;
            tracing::debug!(questions_asked = self.asked.len(), "session complete");
        }
    }

    /// Pure query: among unasked items, the maximiser of information gain,
    /// ties broken by item-id order. `None` if the session is not open or no
    /// unasked items remain.
    pub fn select_item(&self) -> Option<String> {
        if self.status != SessionStatus::Open {
            return None;
        }
        let mut candidates: Vec<(String, f64)> = self
            .domain
            .items()
            .iter()
            .map(|it| it.id().to_string())
            .filter(|id| !self.asked.contains(id))
            .filter_map(|id| information_gain(&self.params, &self.belief, &id).ok().map(|g| (id, g)))
            .collect();
        // Highest gain first; ties broken by ascending item id.
        candidates.sort_by(|(a_id, a_gain), (b_id, b_gain)| {
            b_gain.partial_cmp(a_gain).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a_id.cmp(b_id))
        });
        candidates.into_iter().next().map(|(id, _)| id)
    }

    /// `Open --observe(q,r)--> Open'`, updating the belief and recomputing
    /// completion. Protocol misuse (unknown item, re-asked item, or
    /// continuing a non-open session) moves the session to `Failed`.
    pub fn observe(&mut self, item_id: &str, response: bool) -> Result<(), AssessmentError> {
        if self.status != SessionStatus::Open {
            self.status = SessionStatus::Failed;
            return Err(AssessmentError::NoRemainingItems);
        }
        if !self.domain.contains_id(item_id) {
            self.status = SessionStatus::Failed;
            return Err(AssessmentError::UnknownItem(item_id.to_string()));
        }
        if self.asked.contains(item_id) {
            self.status = SessionStatus::Failed;
            return Err(AssessmentError::AlreadyAsked(item_id.to_string()));
        }

        let entropy_before = self.belief.entropy();
        let posterior = update_belief(&self.params, &self.belief, item_id, response)?;
        self.belief = posterior;
        self.asked.insert(item_id.to_string());
        let entropy_after = self.belief.entropy();
        tracing::debug!(item = item_id, response, entropy_before, entropy_after, "belief updated");
        self.steps.push(StepLog {
            item: item_id.to_string(),
            response,
            entropy_before,
            entropy_after,
            map_state: self.belief.map_state().clone(),
        });
        self.recompute_status();
        Ok(())
    }

    /// Produce the summary of this session as it currently stands (valid
    /// whether `Open`, `Complete`, or partially stepped through).
    pub fn summary(&self) -> AssessmentSummary {
        AssessmentSummary {
            total_questions: self.steps.len(),
            steps: self.steps.clone(),
            final_map_state: self.belief.map_state().clone(),
            confidence: self.belief.confidence(),
        }
    }

    /// Batch (non-adaptive) mode: fold every observation from a complete
    /// response map through the Bayesian update in item-id order. Equivalent
    /// to calling [`AssessmentSession::observe`] once per item in that order.
    pub fn run_batch(
        domain: Domain,
        states: Vec<KnowledgeState>,
        params: BLIMParameters,
        pattern: &crate::assessment::ResponsePattern,
        config: SessionConfig,
    ) -> Result<Self, AssessmentError> {
        crate::assessment::validate_pattern(&domain, pattern)?;
        let mut session = Self::start(domain, states, params, config);
        let ids: Vec<String> = session.domain.items().iter().map(|it| it.id().to_string()).collect();
        for id in ids {
            if session.status != SessionStatus::Open {
                break;
            }
            session.observe(&id, pattern[&id])?;
        }
        Ok(session)
    }

    /// Adaptive mode: repeatedly select the most informative unasked item and
    /// hand it to `responder`, until the session completes. `responder`
    /// typically compares against a "true" state (scenario testing) or draws
    /// from [`crate::assessment::simulate_response`].
    pub fn run_adaptive(&mut self, mut responder: impl FnMut(&str) -> bool) -> Result<AssessmentSummary, AssessmentError> {
        while self.status == SessionStatus::Open {
            let Some(item) = self.select_item() else {
                break;
            };
            let response = responder(&item);
            self.observe(&item, response)?;
        }
        Ok(self.summary())
    }
}

/// Convenience: the truthful responder scenario 4 describes — answers
/// exactly according to whether the item is in `true_state`, independent of
/// any BLIM parameters.
pub fn truthful_responder(true_state: KnowledgeState) -> impl FnMut(&str) -> bool {
    move |item_id| true_state.contains(item_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Item};
    use crate::prerequisite::PrerequisiteGraph;
    use crate::space::LearningSpace;

    fn diamond() -> (Domain, Vec<KnowledgeState>) {
        let d = Domain::new(vec!["a", "b", "c", "d"].into_iter().map(|id| Item::new(id).unwrap()).collect()).unwrap();
        let edges = vec![("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect::<Vec<_>>();
        let g = PrerequisiteGraph::new(&d, &edges).unwrap();
        let rel = g.transitive_closure();
        let states: Vec<_> = rel.downsets().collect();
        (d, states)
    }

    #[test]
    fn truthful_adaptive_assessment_identifies_true_state_exactly() {
        let (d, states) = diamond();
        let (_space, _report) = LearningSpace::build(d.clone(), states.clone(), true).unwrap();
        let params = BLIMParameters::uniform(&d, 0.0, 0.0).unwrap();
        let true_state = d.state_from_ids(["a", "b"]).unwrap();

        let mut session = AssessmentSession::start(d.clone(), states, params, SessionConfig::default());
        let responder = truthful_responder(true_state.clone());
        let summary = session.run_adaptive(responder).unwrap();

        assert_eq!(session.status(), SessionStatus::Complete);
        assert_eq!(summary.final_map_state, true_state);
        assert!((session.belief().prob_of(&true_state) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn observe_unknown_item_fails_session() {
        let (d, states) = diamond();
        let params = BLIMParameters::uniform(&d, 0.1, 0.1).unwrap();
        let mut session = AssessmentSession::start(d, states, params, SessionConfig::default());
        let err = session.observe("z", true).unwrap_err();
        assert!(matches!(err, AssessmentError::UnknownItem(_)));
        assert_eq!(session.status(), SessionStatus::Failed);
    }

    #[test]
    fn observe_same_item_twice_fails_session() {
        let (d, states) = diamond();
        let params = BLIMParameters::uniform(&d, 0.1, 0.1).unwrap();
        let mut session = AssessmentSession::start(d, states, params, SessionConfig::default());
        session.observe("a", true).unwrap();
        let err = session.observe("a", false).unwrap_err();
        assert!(matches!(err, AssessmentError::AlreadyAsked(_)));
        assert_eq!(session.status(), SessionStatus::Failed);
    }

    #[test]
    fn batch_and_sequential_modes_agree() {
        let (d, states) = diamond();
        let params = BLIMParameters::uniform(&d, 0.1, 0.1).unwrap();
        let mut pattern = crate::assessment::ResponsePattern::new();
        for id in ["a", "b", "c", "d"] {
            pattern.insert(id.to_string(), id != "c");
        }

        let batch = AssessmentSession::run_batch(d.clone(), states.clone(), params.clone(), &pattern, SessionConfig::default()).unwrap();

        let mut sequential = AssessmentSession::start(d, states, params, SessionConfig::default());
        for id in ["a", "b", "c", "d"] {
            sequential.observe(id, pattern[id]).unwrap();
        }

        for (bp, sp) in batch.belief().probs().iter().zip(sequential.belief().probs()) {
            assert!((bp - sp).abs() < 1e-9);
        }
    }
}
