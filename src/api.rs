//! The library's public "shape, not syntax" surface (§6).
//!
//! This module is a thin facade: every function here is a plain synchronous
//! call into the internal modules, named and grouped the way §6 lists them,
//! for a host that wants one place to import the whole engine from rather
//! than reaching into `domain`/`prerequisite`/`space`/... individually.
//! Nothing here is a wire protocol; it is the same crate's types, just named
//! the way an external declarative layer (YAML course definitions, a CLI, an
//! HTTP handler) would call them.

use std::collections::HashMap;

use rand::Rng;

use crate::assessment::{AssessmentError, BLIMParameters, ResponsePattern};
use crate::course::{CourseCore, CourseError};
use crate::difficulty::{estimate_item_difficulty as estimate_item_difficulty_impl, DifficultyError, DifficultyInputs};
use crate::domain::{Domain, DomainError, Item, KnowledgeState};
use crate::estimation::{
    calibrate_parameters as calibrate_parameters_impl, em_fit as em_fit_impl, goodness_of_fit as goodness_of_fit_impl,
    BLIMEstimate, CalibrationConfig, CalibrationResult, EmStopCriteria, EstimationError,
};
use crate::markov::{
    expected_steps as expected_steps_impl, optimal_teaching_sequence as optimal_teaching_sequence_impl,
    simulate_trajectory as simulate_trajectory_impl, transition_matrix as transition_matrix_impl,
    tune_learning_rates as tune_learning_rates_impl, LearningModelError, LearningRate, RateTuningStop, TeachingPlan, Trajectory,
};
use crate::paths::{learning_paths as learning_paths_impl, LearningPath};
use crate::prerequisite::{PrerequisiteError, PrerequisiteGraph, SurmiseRelation};
use crate::report::Report;
use crate::session::{AssessmentSession, SessionConfig};
use crate::space::{CoveringEdge, KnowledgeSpace, LearningSpace, SpaceError};
use nalgebra::DMatrix;

/// Build a [`Domain`] from `(id, label)` pairs.
pub fn build_domain<I>(items: I) -> Result<Domain, DomainError>
where
    I: IntoIterator<Item = (String, Option<String>)>,
{
    let items = items
        .into_iter()
        .map(|(id, label)| Item::with_label(id, label))
        .collect::<Result<Vec<_>, _>>()?;
    Domain::new(items)
}

/// Build a [`KnowledgeState`] from a set of item ids.
pub fn build_state<I, S>(domain: &Domain, ids: I) -> Result<KnowledgeState, DomainError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    domain.state_from_ids(ids)
}

/// Build a [`PrerequisiteGraph`] from `(prerequisite_id, item_id)` edges.
pub fn build_prerequisite_graph(domain: &Domain, edges: &[(String, String)]) -> Result<PrerequisiteGraph, PrerequisiteError> {
    PrerequisiteGraph::new(domain, edges)
}

/// The reflexive-transitive closure of `graph` (Birkhoff's "quasi-order" direction).
pub fn closure(graph: &PrerequisiteGraph) -> SurmiseRelation {
    graph.transitive_closure()
}

/// The minimum-edge DAG with the same reachability as `graph`.
pub fn reduction(graph: &PrerequisiteGraph) -> PrerequisiteGraph {
    graph.transitive_reduction()
}

/// Every downset of `relation` (Birkhoff's "downset family" direction) — the
/// combinatorial family a [`KnowledgeSpace`] is normally built from.
pub fn downsets(relation: &SurmiseRelation) -> Vec<KnowledgeState> {
    relation.downsets().collect()
}

/// Build a [`KnowledgeSpace`], validating S1/S2/S3/subset. In `strict` mode
/// a failing check becomes a [`SpaceError`]; otherwise the failing [`Report`]
/// is returned alongside the (still-constructed) space.
pub fn build_knowledge_space(domain: Domain, states: Vec<KnowledgeState>, strict: bool) -> Result<(KnowledgeSpace, Report), SpaceError> {
    KnowledgeSpace::build(domain, states, strict)
}

/// Build a [`LearningSpace`], additionally validating accessibility.
pub fn build_learning_space(domain: Domain, states: Vec<KnowledgeState>, strict: bool) -> Result<(LearningSpace, Report), SpaceError> {
    LearningSpace::build(domain, states, strict)
}

/// Validate `states` as a knowledge space without erroring on failure.
pub fn validate_knowledge_space(domain: &Domain, states: &[KnowledgeState]) -> Report {
    KnowledgeSpace::validate(domain, states)
}

/// Validate `states` as a learning space without erroring on failure.
pub fn validate_learning_space(domain: &Domain, states: &[KnowledgeState]) -> Report {
    LearningSpace::validate(domain, states)
}

/// Inner fringe $K^I$: items of `state` removable while staying in the space.
pub fn inner_fringe(space: &KnowledgeSpace, state: &KnowledgeState) -> KnowledgeState {
    space.inner_fringe(state)
}

/// Outer fringe $K^O$: items addable to `state` while staying in the space.
pub fn outer_fringe(space: &KnowledgeSpace, state: &KnowledgeState) -> KnowledgeState {
    space.outer_fringe(state)
}

/// Minimal non-empty states of the space.
pub fn atoms(space: &KnowledgeSpace) -> Vec<KnowledgeState> {
    space.atoms()
}

/// States partitioned by cardinality, `0..=|Q|`.
pub fn gradation(space: &KnowledgeSpace) -> Vec<Vec<KnowledgeState>> {
    space.gradation()
}

/// Every covering edge `(lower, upper, item)` of the space.
pub fn covering_edges(space: &KnowledgeSpace) -> Vec<CoveringEdge> {
    space.covering_edges()
}

/// Every learning path through `space`, capped at `max` (`None` for no cap).
pub fn learning_paths(space: &LearningSpace, max: Option<usize>) -> Vec<LearningPath> {
    learning_paths_impl(space, max)
}

/// Build the `CourseCore` aggregate (domain + DAG + surmise relation + the
/// learning space of its downsets) in one call.
pub fn build_course(domain: Domain, edges: &[(String, String)]) -> Result<(CourseCore, Report), CourseError> {
    CourseCore::build(domain, edges)
}

/// The same `beta`/`eta` for every item.
pub fn build_blim_params_uniform(domain: &Domain, beta: f64, eta: f64) -> Result<BLIMParameters, AssessmentError> {
    BLIMParameters::uniform(domain, beta, eta)
}

/// Per-item `beta`/`eta`, keyed by item id.
pub fn build_blim_params_per_item(
    domain: &Domain,
    beta: &HashMap<String, f64>,
    eta: &HashMap<String, f64>,
) -> Result<BLIMParameters, AssessmentError> {
    BLIMParameters::per_item(domain, beta, eta)
}

/// Start an adaptive assessment session with a uniform prior over `states`.
pub fn start_session(domain: Domain, states: Vec<KnowledgeState>, params: BLIMParameters, config: SessionConfig) -> AssessmentSession {
    AssessmentSession::start(domain, states, params, config)
}

/// One EM fit from an explicit initialisation.
pub fn em_fit(
    domain: &Domain,
    states: &[KnowledgeState],
    data: &[ResponsePattern],
    stop: EmStopCriteria,
    init_pi: Vec<f64>,
    init_beta: BLIMParameters,
) -> Result<BLIMEstimate, EstimationError> {
    em_fit_impl(domain, states, data, stop, init_pi, init_beta)
}

/// Run EM from several seeded random restarts and keep the best.
pub fn calibrate_parameters<R: Rng + ?Sized>(
    domain: &Domain,
    states: &[KnowledgeState],
    data: &[ResponsePattern],
    stop: EmStopCriteria,
    config: CalibrationConfig,
    rng: &mut R,
) -> Result<CalibrationResult, EstimationError> {
    calibrate_parameters_impl(domain, states, data, stop, config, rng)
}

/// $G^2$ goodness-of-fit statistic and its degrees of freedom.
pub fn goodness_of_fit(domain: &Domain, estimate: &BLIMEstimate, data: &[ResponsePattern]) -> Result<(f64, usize), EstimationError> {
    goodness_of_fit_impl(domain, estimate, data)
}

/// Per-item difficulty, averaging whichever of `inputs`'s measures are present.
pub fn estimate_item_difficulty(domain: &Domain, inputs: DifficultyInputs<'_>) -> Result<HashMap<String, f64>, DifficultyError> {
    estimate_item_difficulty_impl(domain, inputs)
}

/// The same rate for every item.
pub fn build_learning_rate_uniform(domain: &Domain, rate: f64) -> Result<LearningRate, LearningModelError> {
    LearningRate::uniform(domain, rate)
}

/// Per-item rates, keyed by item id.
pub fn build_learning_rate(domain: &Domain, rates: &HashMap<String, f64>) -> Result<LearningRate, LearningModelError> {
    LearningRate::per_item(domain, rates)
}

/// The full transition matrix over `space.states()`'s canonical order.
pub fn transition_matrix(space: &LearningSpace, rates: &LearningRate) -> DMatrix<f64> {
    transition_matrix_impl(space, rates)
}

/// Expected steps to `Q` from every state, aligned with `space.states()`.
pub fn expected_steps(space: &LearningSpace, rates: &LearningRate) -> Result<Vec<f64>, LearningModelError> {
    expected_steps_impl(space, rates)
}

/// Simulate one trajectory from `start` (`None` for `∅`) to `Q` or `max_steps`.
pub fn simulate_trajectory<R: Rng + ?Sized>(
    space: &LearningSpace,
    rates: &LearningRate,
    start: Option<&KnowledgeState>,
    rng: &mut R,
    max_steps: usize,
) -> Trajectory {
    simulate_trajectory_impl(space, rates, start, rng, max_steps)
}

/// The optimal (value-iteration) teaching plan from `start` to `Q`.
pub fn optimal_teaching_sequence(space: &LearningSpace, start: &KnowledgeState) -> TeachingPlan {
    optimal_teaching_sequence_impl(space, start)
}

/// Fit per-item learning rates to observed trajectories by maximum likelihood.
pub fn tune_learning_rates(
    space: &LearningSpace,
    trajectories: &[Vec<KnowledgeState>],
    stop: RateTuningStop,
) -> Result<LearningRate, LearningModelError> {
    tune_learning_rates_impl(space, trajectories, stop)
}
