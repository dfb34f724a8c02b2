//! Markov learning model: transition structure, expected steps to mastery,
//! optimal teaching by value iteration, trajectory simulation, and rate
//! tuning from observed trajectories.
//!
//! A learner is modelled as a pure-birth absorbing Markov chain over a
//! [`LearningSpace`]'s states: from state `K` the next state is always a
//! cover `K ∪ {q}` for some `q` in the outer fringe, chosen with probability
//! proportional to `q`'s learning rate; `Q` is absorbing. States are indexed
//! in the space's own canonical `(cardinality, ids)` order throughout this
//! module, matching §4.5's "index states by cardinality then id" contract.

use std::collections::HashMap;

use nalgebra::DMatrix;
use rand::Rng;

use crate::domain::{Domain, KnowledgeState};
use crate::space::LearningSpace;

/// Errors raised while building or using a learning-rate mapping, a
/// transition structure, or a teaching/simulation result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LearningModelError {
    /// A rate was not strictly positive.
    #[error("learning rate for {0} must be strictly positive, got {1}")]
    ParameterOutOfRange(String, f64),
    /// An id was referenced that is not in the domain.
    #[error("unknown item id: {0}")]
    UnknownItem(String),
    /// `(I - T)` was not invertible: some transient state cannot reach `Q`.
    #[error("fundamental matrix is singular: state could not be solved for expected steps")]
    SingularFundamentalMatrix,
    /// A trajectory contained a consecutive pair that was not a single-item cover.
    #[error("trajectory step {0} -> {1} is not a single-item cover")]
    InvalidTrajectory(String, String),
}

/// A mapping `item id -> λ_q > 0`; keys match a domain exactly.
#[derive(Clone, Debug)]
pub struct LearningRate {
    domain: Domain,
    rates: Vec<f64>,
}

impl LearningRate {
    /// The same rate for every item.
    pub fn uniform(domain: &Domain, rate: f64) -> Result<Self, LearningModelError> {
        if rate <= 0.0 {
            return Err(LearningModelError::ParameterOutOfRange("*".into(), rate));
        }
        Ok(Self { domain: domain.clone(), rates: vec![rate; domain.len()] })
    }

    /// Per-item rates, given as a map keyed by item id. Every domain item
    /// must have an entry.
    pub fn per_item(domain: &Domain, rates: &HashMap<String, f64>) -> Result<Self, LearningModelError> {
        let mut out = vec![0.0; domain.len()];
        for (i, item) in domain.items().iter().enumerate() {
            let r = *rates.get(item.id()).ok_or_else(|| LearningModelError::UnknownItem(item.id().to_string()))?;
            if r <= 0.0 {
                return Err(LearningModelError::ParameterOutOfRange(item.id().to_string(), r));
            }
            out[i] = r;
        }
        Ok(Self { domain: domain.clone(), rates: out })
    }

    /// `λ_q` for item `id`.
    pub fn rate(&self, id: &str) -> Result<f64, LearningModelError> {
        let i = self.domain.index_of(id).map_err(|_| LearningModelError::UnknownItem(id.to_string()))?;
        Ok(self.rates[i])
    }

    /// The domain these rates are defined over.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// A copy of these rates rescaled so their mean is 1, for reporting.
    pub fn normalized_to_mean_one(&self) -> Self {
        let mean = self.rates.iter().sum::<f64>() / self.rates.len() as f64;
        let rates = if mean > 0.0 { self.rates.iter().map(|&r| r / mean).collect() } else { self.rates.clone() };
        Self { domain: self.domain.clone(), rates }
    }
}

/// `P(K -> K∪{q})` for every `q` in `K`'s outer fringe, in item-id order.
/// Empty for `K = Q` (the absorbing state).
pub fn transition_probs(space: &LearningSpace, rates: &LearningRate, state: &KnowledgeState) -> Vec<(String, f64)> {
    let fringe = space.outer_fringe(state);
    let mut ids = fringe.ids().into_iter().collect::<Vec<_>>();
    ids.sort();
    let total: f64 = ids.iter().map(|id| rates.rate(id).unwrap_or(0.0)).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    ids.into_iter().map(|id| {
        let r = rates.rate(&id).unwrap_or(0.0);
        (id, r / total)
    }).collect()
}

/// The full transition matrix over `space.states()` (in that canonical
/// order): row `i` sums to 1, with zero entries outside the covering
/// relation. `Q`'s row is the identity row (absorbing).
pub fn transition_matrix(space: &LearningSpace, rates: &LearningRate) -> DMatrix<f64> {
    let states = space.states();
    let n = states.len();
    let index: HashMap<Vec<u8>, usize> = states
        .iter()
        .enumerate()
        .map(|(i, k)| (state_key(k), i))
        .collect();
    let mut m = DMatrix::<f64>::zeros(n, n);
    let full = space.domain().full_state();
    for (i, state) in states.iter().enumerate() {
        if *state == full {
            m[(i, i)] = 1.0;
            continue;
        }
        for (item_id, p) in transition_probs(space, rates, state) {
            let next = state.union(&space.domain().singleton_state(&item_id).expect("fringe item is in domain"));
            let j = index[&state_key(&next)];
            m[(i, j)] = p;
        }
    }
    m
}

fn state_key(k: &KnowledgeState) -> Vec<u8> {
    k.ids().into_iter().flat_map(|s| s.into_bytes()).chain(std::iter::once(0)).collect()
}

/// Expected number of steps to reach `Q` from every state in
/// `space.states()`'s order, via the fundamental matrix of the transient
/// submatrix. Solved as `(I-T)x = 1` rather than by forming an explicit
/// inverse.
///
/// # Errors
/// [`LearningModelError::SingularFundamentalMatrix`] if `I-T` is not
/// invertible (some transient state cannot reach `Q` — unreachable under a
/// valid [`LearningSpace`] with all-positive rates, but guarded against
/// numerically).
pub fn expected_steps(space: &LearningSpace, rates: &LearningRate) -> Result<Vec<f64>, LearningModelError> {
    let states = space.states();
    let n = states.len();
    let full = space.domain().full_state();
    let q_idx = states.iter().position(|k| *k == full).expect("Q is always in a learning space");

    let transient: Vec<usize> = (0..n).filter(|&i| i != q_idx).collect();
    let m = n - 1;
    let full_matrix = transition_matrix(space, rates);

    let mut identity_minus_t = DMatrix::<f64>::zeros(m, m);
    for (a, &i) in transient.iter().enumerate() {
        for (b, &j) in transient.iter().enumerate() {
            let t_ij = full_matrix[(i, j)];
            identity_minus_t[(a, b)] = if a == b { 1.0 - t_ij } else { -t_ij };
        }
    }
    let ones = DMatrix::<f64>::from_element(m, 1, 1.0);
    let solution = identity_minus_t
        .lu()
        .solve(&ones)
        .ok_or(LearningModelError::SingularFundamentalMatrix)?;

    let mut out = vec![0.0; n];
    for (a, &i) in transient.iter().enumerate() {
        out[i] = solution[(a, 0)];
    }
    out[q_idx] = 0.0;
    Ok(out)
}

/// One step of an optimal teaching plan.
#[derive(Clone, Debug)]
pub struct TeachingStep {
    /// The item chosen at this step.
    pub item: String,
    /// The state before this step.
    pub pre_state: KnowledgeState,
    /// The state after this step.
    pub post_state: KnowledgeState,
    /// `V*` at `post_state`: the expected number of remaining steps.
    pub expected_remaining: f64,
}

/// An ordered sequence of teaching steps from a start state to `Q`.
#[derive(Clone, Debug)]
pub struct TeachingPlan {
    /// The steps, in order.
    pub steps: Vec<TeachingStep>,
}

impl TeachingPlan {
    /// Total number of steps in the plan.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True iff the plan has no steps (the start state was already `Q`).
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Solve the Bellman equation `V*(Q)=0`, `V*(K)=1+min_{q∈K^O} V*(K∪{q})` by
/// backward induction on cardinality-descending order (every state's covers
/// have strictly greater cardinality and are therefore already solved).
/// Returns `V*` aligned with `space.states()`.
pub fn optimal_value_function(space: &LearningSpace) -> Vec<f64> {
    let states = space.states();
    let n = states.len();
    let index: HashMap<Vec<u8>, usize> = states.iter().enumerate().map(|(i, k)| (state_key(k), i)).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| states[b].len().cmp(&states[a].len()));

    let mut v = vec![0.0; n];
    let full = space.domain().full_state();
    for &i in &order {
        let state = &states[i];
        if *state == full {
            v[i] = 0.0;
            continue;
        }
        let fringe = space.outer_fringe(state);
        let best = fringe
            .ids()
            .into_iter()
            .map(|id| {
                let next = state.union(&space.domain().singleton_state(&id).expect("fringe item in domain"));
                v[index[&state_key(&next)]]
            })
            .fold(f64::INFINITY, f64::min);
        v[i] = 1.0 + if best.is_finite() { best } else { 0.0 };
    }
    v
}

/// Greedily follow `argmin V*` from `start` to `Q`, breaking ties by item id.
pub fn optimal_teaching_sequence(space: &LearningSpace, start: &KnowledgeState) -> TeachingPlan {
    let states = space.states();
    let index: HashMap<Vec<u8>, usize> = states.iter().enumerate().map(|(i, k)| (state_key(k), i)).collect();
    let v = optimal_value_function(space);
    let full = space.domain().full_state();

    let mut steps = Vec::new();
    let mut current = start.clone();
    while current != full {
        let fringe = space.outer_fringe(&current);
        let mut ids: Vec<String> = fringe.ids().into_iter().collect();
        ids.sort();
        let chosen = ids
            .into_iter()
            .map(|id| {
                let next = current.union(&space.domain().singleton_state(&id).expect("fringe item in domain"));
                let val = v[index[&state_key(&next)]];
                (id, next, val)
            })
            .min_by(|(a_id, _, a_v), (b_id, _, b_v)| {
                a_v.partial_cmp(b_v).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a_id.cmp(b_id))
            });
        let Some((item, next, val)) = chosen else { break };
        steps.push(TeachingStep { item, pre_state: current.clone(), post_state: next.clone(), expected_remaining: val });
        current = next;
    }
    TeachingPlan { steps }
}

/// One simulated learning trajectory.
#[derive(Clone, Debug)]
pub struct Trajectory {
    /// States visited, starting at the given start state.
    pub states: Vec<KnowledgeState>,
    /// The item added at each step (`items.len() == states.len() - 1`).
    pub items: Vec<String>,
    /// True iff the simulation hit `max_steps` before reaching `Q`.
    pub truncated: bool,
}

/// Simulate a trajectory from `start` (pass `None` for `∅`) by repeatedly
/// sampling the next item from the outer-fringe distribution, until
/// absorbing at `Q` or `max_steps` is hit.
pub fn simulate_trajectory<R: Rng + ?Sized>(
    space: &LearningSpace,
    rates: &LearningRate,
    start: Option<&KnowledgeState>,
    rng: &mut R,
    max_steps: usize,
) -> Trajectory {
    let full = space.domain().full_state();
    let mut current = start.cloned().unwrap_or_else(|| space.domain().empty_state());
    let mut states = vec![current.clone()];
    let mut items = Vec::new();
    let mut truncated = false;

    for _ in 0..max_steps {
        if current == full {
            break;
        }
        let probs = transition_probs(space, rates, &current);
        if probs.is_empty() {
            break;
        }
        let draw: f64 = rng.gen();
        let mut acc = 0.0;
        let mut chosen = probs.last().expect("non-empty").0.clone();
        for (id, p) in &probs {
            acc += p;
            if draw < acc {
                chosen = id.clone();
                break;
            }
        }
        current = current.union(&space.domain().singleton_state(&chosen).expect("sampled item is in domain"));
        items.push(chosen);
        states.push(current.clone());
    }
    if current != full {
        truncated = true;
    }
    Trajectory { states, items, truncated }
}

/// Stopping criteria for [`tune_learning_rates`], identical in shape to
/// [`crate::estimation::EmStopCriteria`]: the same max-iterations/tolerance
/// convergence test as [`crate::estimation::em_fit`].
#[derive(Clone, Copy, Debug)]
pub struct RateTuningStop {
    /// Maximum number of fixed-point iterations.
    pub max_iter: usize,
    /// Stop once the log-likelihood improves by less than this amount.
    pub tol: f64,
}

impl Default for RateTuningStop {
    fn default() -> Self {
        Self { max_iter: 200, tol: 1e-6 }
    }
}

/// Fit per-item learning rates to observed trajectories by maximum
/// likelihood. Each trajectory is a sequence of states whose consecutive
/// pairs must be covers in `space`; the item each step adds is the observed
/// "choice" among that step's outer fringe.
///
/// Uses the minorize-maximize fixed point for this Luce/Plackett choice
/// model: `λ_q ← (times q chosen) / Σ_t [q ∈ fringe_t] / Σ_{q'∈fringe_t} λ_{q'}`,
/// iterated with the same max-iterations/tolerance stopping test
/// [`crate::estimation::em_fit`] uses. Final rates are normalised to mean 1
/// for reporting.
pub fn tune_learning_rates(
    space: &LearningSpace,
    trajectories: &[Vec<KnowledgeState>],
    stop: RateTuningStop,
) -> Result<LearningRate, LearningModelError> {
    let domain = space.domain();
    let n = domain.len();

    // Precompute, for each step, the chosen item index and the fringe's item indices.
    let mut steps: Vec<(usize, Vec<usize>)> = Vec::new();
    for traj in trajectories {
        for pair in traj.windows(2) {
            let (lo, hi) = (&pair[0], &pair[1]);
            let diff = hi.difference(lo);
            if diff.len() != 1 {
                return Err(LearningModelError::InvalidTrajectory(
                    lo.ids().into_iter().collect::<Vec<_>>().join(","),
                    hi.ids().into_iter().collect::<Vec<_>>().join(","),
                ));
            }
            let chosen_id = diff.ids().into_iter().next().expect("len checked above");
            let chosen = domain.index_of(&chosen_id).map_err(|_| LearningModelError::UnknownItem(chosen_id))?;
            let fringe = space.outer_fringe(lo);
            let mut fringe_idx: Vec<usize> = fringe.ids().into_iter().map(|id| domain.index_of(&id).expect("fringe id in domain")).collect();
            fringe_idx.sort_unstable();
            steps.push((chosen, fringe_idx));
        }
    }

    let mut lambda = vec![1.0; n];
    let mut prev_ll = f64::NEG_INFINITY;

    let log_likelihood = |lambda: &[f64]| -> f64 {
        steps
            .iter()
            .map(|(chosen, fringe)| {
                let denom: f64 = fringe.iter().map(|&i| lambda[i]).sum();
                lambda[*chosen].ln() - denom.ln()
            })
            .sum()
    };

    for _ in 0..stop.max_iter {
        let ll = log_likelihood(&lambda);
        if (ll - prev_ll).abs() < stop.tol && ll > f64::NEG_INFINITY {
            prev_ll = ll;
            break;
        }
        prev_ll = ll;

        let mut wins = vec![0.0; n];
        let mut denom = vec![0.0; n];
        for (chosen, fringe) in &steps {
            wins[*chosen] += 1.0;
            let z: f64 = fringe.iter().map(|&i| lambda[i]).sum();
            if z > 0.0 {
                for &i in fringe {
                    denom[i] += 1.0 / z;
                }
            }
        }
        for i in 0..n {
            if denom[i] > 0.0 {
                lambda[i] = wins[i] / denom[i];
            }
        }
    }
    let _ = prev_ll;

    let mut rate_map = HashMap::new();
    for (i, item) in domain.items().iter().enumerate() {
        rate_map.insert(item.id().to_string(), lambda[i].max(1e-9));
    }
    Ok(LearningRate::per_item(domain, &rate_map)?.normalized_to_mean_one())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Item};
    use crate::prerequisite::PrerequisiteGraph;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn linear_chain() -> LearningSpace {
        let d = Domain::new(vec!["a", "b", "c", "d", "e"].into_iter().map(|id| Item::new(id).unwrap()).collect()).unwrap();
        let edges: Vec<(String, String)> = vec![("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")]
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        let g = PrerequisiteGraph::new(&d, &edges).unwrap();
        let rel = g.transitive_closure();
        let states: Vec<_> = rel.downsets().collect();
        LearningSpace::build(d, states, true).unwrap().0
    }

    fn diamond() -> LearningSpace {
        let d = Domain::new(vec!["a", "b", "c", "d"].into_iter().map(|id| Item::new(id).unwrap()).collect()).unwrap();
        let edges: Vec<(String, String)> = vec![("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        let g = PrerequisiteGraph::new(&d, &edges).unwrap();
        let rel = g.transitive_closure();
        let states: Vec<_> = rel.downsets().collect();
        LearningSpace::build(d, states, true).unwrap().0
    }

    #[test]
    fn transition_matrix_rows_sum_to_one() {
        let space = diamond();
        let rates = LearningRate::uniform(space.domain(), 1.0).unwrap();
        let m = transition_matrix(&space, &rates);
        for i in 0..m.nrows() {
            let row_sum: f64 = (0..m.ncols()).map(|j| m[(i, j)]).sum();
            assert!((row_sum - 1.0).abs() < 1e-9, "row {i} sums to {row_sum}");
        }
    }

    #[test]
    fn expected_steps_from_empty_equals_domain_size_under_uniform_rates() {
        let space = linear_chain();
        let rates = LearningRate::uniform(space.domain(), 1.0).unwrap();
        let steps = expected_steps(&space, &rates).unwrap();
        let empty_idx = space.states().iter().position(|k| k.is_empty()).unwrap();
        assert!((steps[empty_idx] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn expected_steps_at_q_is_zero() {
        let space = diamond();
        let rates = LearningRate::uniform(space.domain(), 1.0).unwrap();
        let steps = expected_steps(&space, &rates).unwrap();
        let q_idx = space.states().iter().position(|k| *k == space.domain().full_state()).unwrap();
        assert_eq!(steps[q_idx], 0.0);
    }

    #[test]
    fn optimal_teaching_plan_from_empty_has_length_n_and_single_item_steps() {
        let space = diamond();
        let plan = optimal_teaching_sequence(&space, &space.domain().empty_state());
        assert_eq!(plan.len(), 4);
        for step in &plan.steps {
            assert_eq!(step.post_state.symmetric_difference(&step.pre_state).len(), 1);
        }
        assert_eq!(plan.steps.last().unwrap().post_state, space.domain().full_state());
    }

    #[test]
    fn simulated_trajectory_reaches_q_and_is_seed_deterministic() {
        let space = linear_chain();
        let rates = LearningRate::uniform(space.domain(), 1.0).unwrap();
        let mut rng1 = StdRng::seed_from_u64(11);
        let mut rng2 = StdRng::seed_from_u64(11);
        let t1 = simulate_trajectory(&space, &rates, None, &mut rng1, 1000);
        let t2 = simulate_trajectory(&space, &rates, None, &mut rng2, 1000);
        assert!(!t1.truncated);
        assert_eq!(t1.items, t2.items);
        assert_eq!(*t1.states.last().unwrap(), space.domain().full_state());
    }

    #[test]
    fn tuned_rates_recover_a_strong_preference() {
        let space = diamond();
        // True rates: "b" is learned much faster than "c" whenever both compete.
        let mut rate_map = HashMap::new();
        rate_map.insert("a".to_string(), 1.0);
        rate_map.insert("b".to_string(), 5.0);
        rate_map.insert("c".to_string(), 1.0);
        rate_map.insert("d".to_string(), 1.0);
        let true_rates = LearningRate::per_item(space.domain(), &rate_map).unwrap();

        let mut rng = StdRng::seed_from_u64(99);
        let trajectories: Vec<Vec<KnowledgeState>> = (0..200)
            .map(|_| simulate_trajectory(&space, &true_rates, None, &mut rng, 1000).states)
            .collect();

        let fitted = tune_learning_rates(&space, &trajectories, RateTuningStop::default()).unwrap();
        // "b" should come out with a noticeably larger rate than "c".
        assert!(fitted.rate("b").unwrap() > fitted.rate("c").unwrap());
    }
}
