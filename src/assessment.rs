//! BLIM: response likelihood, belief update, information gain
//!
//! The Basic Local Independence Model assigns every item a slip probability
//! $\beta_q$ (chance of a wrong answer despite mastery) and a lucky-guess
//! probability $\eta_q$ (chance of a right answer without mastery). A
//! [`BeliefState`] tracks a probability distribution over a knowledge
//! family; [`update_belief`] folds one observed response into it via Bayes'
//! rule, performed in log space throughout (not only above the
//! `|K| > 64` threshold the theory requires, since doing so unconditionally
//! is strictly more stable and costs nothing extra here).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rand::Rng;

use crate::domain::{Domain, KnowledgeState};

/// Tolerance for "does this probability vector sum to 1".
pub const BELIEF_SUM_TOL: f64 = 1e-6;

/// Errors raised by BLIM parameter construction, belief updates, and response
/// scoring.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssessmentError {
    /// A `β`/`η` parameter (or a belief probability) fell outside its
    /// required range.
    #[error("parameter {name} out of range: {value}")]
    ParameterOutOfRange {
        /// The parameter's name (`"beta:<id>"`, `"eta:<id>"`, or `"belief"`).
        name: String,
        /// The offending value.
        value: f64,
    },
    /// A response pattern or per-item map did not cover exactly the domain's ids.
    #[error("unknown item id: {0}")]
    UnknownItem(String),
    /// Every state in the belief assigned zero probability to the observed response.
    #[error("observation is inconsistent with every state in the belief")]
    InconsistentObservation,
    /// The item requested was already asked in this session.
    #[error("item already asked: {0}")]
    AlreadyAsked(String),
    /// No unasked items remain (the session is already complete).
    #[error("no remaining items to ask")]
    NoRemainingItems,
}

const BETA_ETA_MAX: f64 = 0.5;

fn check_beta_eta(name: &str, value: f64) -> Result<(), AssessmentError> {
    if !(0.0..BETA_ETA_MAX).contains(&value) {
        return Err(AssessmentError::ParameterOutOfRange { name: name.to_string(), value });
    }
    Ok(())
}

/// Per-item slip ($\beta_q$) and lucky-guess ($\eta_q$) probabilities.
///
/// Both are constrained to $[0, 0.5)$: at or above 0.5 an item carries no
/// discriminating information (a coin flip is at least as informative).
#[derive(Clone, Debug)]
pub struct BLIMParameters {
    domain: Domain,
    beta: Vec<f64>,
    eta: Vec<f64>,
}

impl BLIMParameters {
    /// The same `beta`/`eta` for every item in the domain.
    pub fn uniform(domain: &Domain, beta: f64, eta: f64) -> Result<Self, AssessmentError> {
        check_beta_eta("beta", beta)?;
        check_beta_eta("eta", eta)?;
        Ok(Self { domain: domain.clone(), beta: vec![beta; domain.len()], eta: vec![eta; domain.len()] })
    }

    /// Per-item `beta`/`eta`, given as maps keyed by item id. Every item in
    /// the domain must have an entry in both maps.
    pub fn per_item(
        domain: &Domain,
        beta: &HashMap<String, f64>,
        eta: &HashMap<String, f64>,
    ) -> Result<Self, AssessmentError> {
        let mut beta_vec = vec![0.0; domain.len()];
        let mut eta_vec = vec![0.0; domain.len()];
        for (i, item) in domain.items().iter().enumerate() {
            let b = *beta.get(item.id()).ok_or_else(|| AssessmentError::UnknownItem(item.id().to_string()))?;
            let e = *eta.get(item.id()).ok_or_else(|| AssessmentError::UnknownItem(item.id().to_string()))?;
            check_beta_eta(&format!("beta:{}", item.id()), b)?;
            check_beta_eta(&format!("eta:{}", item.id()), e)?;
            beta_vec[i] = b;
            eta_vec[i] = e;
        }
        Ok(Self { domain: domain.clone(), beta: beta_vec, eta: eta_vec })
    }

    /// The domain these parameters are defined over.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// $\beta_q$ for item `id`.
    pub fn beta(&self, id: &str) -> Result<f64, AssessmentError> {
        let i = self.domain.index_of(id).map_err(|e| AssessmentError::UnknownItem(e.to_string()))?;
        Ok(self.beta[i])
    }

    /// $\eta_q$ for item `id`.
    pub fn eta(&self, id: &str) -> Result<f64, AssessmentError> {
        let i = self.domain.index_of(id).map_err(|e| AssessmentError::UnknownItem(e.to_string()))?;
        Ok(self.eta[i])
    }

    fn beta_eta_at(&self, i: usize) -> (f64, f64) {
        (self.beta[i], self.eta[i])
    }
}

/// `P(r=1 | q, K)`: the probability of a correct response to `item_id` given
/// mastery state `state`.
pub fn p_correct(params: &BLIMParameters, state: &KnowledgeState, item_id: &str) -> Result<f64, AssessmentError> {
    let i = params.domain.index_of(item_id).map_err(|e| AssessmentError::UnknownItem(e.to_string()))?;
    let (beta, eta) = params.beta_eta_at(i);
    Ok(if state.contains(item_id) { 1.0 - beta } else { eta })
}

/// `P(r | q, K)` for an observed boolean response `r`.
pub fn p_response(params: &BLIMParameters, state: &KnowledgeState, item_id: &str, response: bool) -> Result<f64, AssessmentError> {
    let p1 = p_correct(params, state, item_id)?;
    Ok(if response { p1 } else { 1.0 - p1 })
}

/// A full response pattern: one boolean per domain item. Keys must equal the
/// domain's id set exactly.
pub type ResponsePattern = BTreeMap<String, bool>;

/// Validate that `pattern`'s key set equals `domain`'s id set exactly.
pub fn validate_pattern(domain: &Domain, pattern: &ResponsePattern) -> Result<(), AssessmentError> {
    let ids = domain.id_set();
    let pattern_ids: std::collections::BTreeSet<String> = pattern.keys().cloned().collect();
    if pattern_ids != ids {
        let missing = ids.difference(&pattern_ids).next().or_else(|| pattern_ids.difference(&ids).next());
        return Err(AssessmentError::UnknownItem(missing.cloned().unwrap_or_default()));
    }
    Ok(())
}

/// $\ln P(R \mid K)$ for a full pattern, under local independence: the log
/// of the product of per-item response probabilities.
pub fn log_likelihood(params: &BLIMParameters, pattern: &ResponsePattern, state: &KnowledgeState) -> Result<f64, AssessmentError> {
    validate_pattern(&params.domain, pattern)?;
    let mut acc = 0.0;
    for item in params.domain.items() {
        let r = pattern[item.id()];
        acc += p_response(params, state, item.id(), r)?.ln();
    }
    Ok(acc)
}

fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + xs.iter().map(|&x| (x - max).exp()).sum::<f64>().ln()
}

/// A probability distribution over an ordered family of knowledge states.
///
/// The state sequence is shared (`Arc`) across every belief derived from the
/// same starting family, so updates only reallocate the probability vector.
#[derive(Clone, Debug)]
pub struct BeliefState {
    states: Arc<[KnowledgeState]>,
    probs: Vec<f64>,
}

impl BeliefState {
    /// Build a belief from an explicit probability vector. Probabilities
    /// must be non-negative and sum to 1 within [`BELIEF_SUM_TOL`].
    pub fn new(states: Vec<KnowledgeState>, probs: Vec<f64>) -> Result<Self, AssessmentError> {
        if states.len() != probs.len() {
            return Err(AssessmentError::ParameterOutOfRange { name: "belief".into(), value: probs.len() as f64 });
        }
        for &p in &probs {
            if !(0.0..=1.0).contains(&p) {
                return Err(AssessmentError::ParameterOutOfRange { name: "belief".into(), value: p });
            }
        }
        let sum: f64 = probs.iter().sum();
        if (sum - 1.0).abs() > BELIEF_SUM_TOL {
            return Err(AssessmentError::ParameterOutOfRange { name: "belief:sum".into(), value: sum });
        }
        Ok(Self { states: Arc::from(states), probs })
    }

    /// The uniform belief over `states`.
    pub fn uniform(states: &[KnowledgeState]) -> Self {
        let n = states.len().max(1);
        let p = 1.0 / n as f64;
        Self { states: Arc::from(states.to_vec()), probs: vec![p; states.len()] }
    }

    /// The states this belief ranges over, in the order supplied at construction.
    pub fn states(&self) -> &[KnowledgeState] {
        &self.states
    }

    /// The probability vector, aligned with [`BeliefState::states`].
    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    /// The probability mass on `state` (0 if `state` is not in the family).
    pub fn prob_of(&self, state: &KnowledgeState) -> f64 {
        self.states.iter().position(|k| k == state).map(|i| self.probs[i]).unwrap_or(0.0)
    }

    /// Shannon entropy in bits, with the convention $0\log 0 = 0$.
    pub fn entropy(&self) -> f64 {
        -self.probs.iter().filter(|&&p| p > 0.0).map(|&p| p * p.log2()).sum::<f64>()
    }

    /// The state with maximum posterior probability. Ties resolved in favor
    /// of the earliest state in [`BeliefState::states`] order (the canonical
    /// `(cardinality, ids)` order the family is normally built in).
    pub fn map_state(&self) -> &KnowledgeState {
        let (idx, _) = self
            .probs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .expect("belief always has at least one state");
        &self.states[idx]
    }

    /// Confidence score $1 - H(\pi)/\log_2|\mathcal K|$, in $[0,1]$; `1.0`
    /// when the family has a single state (no uncertainty is possible).
    pub fn confidence(&self) -> f64 {
        if self.states.len() <= 1 {
            return 1.0;
        }
        1.0 - self.entropy() / (self.states.len() as f64).log2()
    }
}

/// Bayesian belief update: multiply each state's prior mass by the
/// likelihood of the observed response, renormalise, and return the
/// posterior. Performed in log space.
///
/// # Errors
/// [`AssessmentError::InconsistentObservation`] if every state assigns zero
/// probability to the observation (only reachable when some `beta`/`eta` is
/// exactly 0 or 1 and the observation contradicts every state with nonzero
/// prior mass).
pub fn update_belief(params: &BLIMParameters, belief: &BeliefState, item_id: &str, response: bool) -> Result<BeliefState, AssessmentError> {
    let mut log_w = Vec::with_capacity(belief.states.len());
    for (state, &prior) in belief.states.iter().zip(belief.probs.iter()) {
        let like = p_response(params, state, item_id, response)?;
        let lw = if prior > 0.0 && like > 0.0 { prior.ln() + like.ln() } else { f64::NEG_INFINITY };
        log_w.push(lw);
    }
    let norm = log_sum_exp(&log_w);
    if norm == f64::NEG_INFINITY {
        return Err(AssessmentError::InconsistentObservation);
    }
    let probs: Vec<f64> = log_w.iter().map(|&lw| (lw - norm).exp()).collect();
    Ok(BeliefState { states: belief.states.clone(), probs })
}

/// Expected information gain $I(q;\pi)$ from asking `item_id`: the
/// reduction in entropy averaged over the two possible outcomes.
pub fn information_gain(params: &BLIMParameters, belief: &BeliefState, item_id: &str) -> Result<f64, AssessmentError> {
    let i = params.domain.index_of(item_id).map_err(|e| AssessmentError::UnknownItem(e.to_string()))?;
    let (beta, eta) = params.beta_eta_at(i);
    let mut p1 = 0.0;
    for (state, &prior) in belief.states.iter().zip(belief.probs.iter()) {
        let pc = if state.contains(item_id) { 1.0 - beta } else { eta };
        p1 += prior * pc;
    }
    let p0 = 1.0 - p1;
    let prior_h = belief.entropy();

    let h1 = if p1 > 0.0 { update_belief(params, belief, item_id, true)?.entropy() } else { 0.0 };
    let h0 = if p0 > 0.0 { update_belief(params, belief, item_id, false)?.entropy() } else { 0.0 };

    Ok(prior_h - p1 * h1 - p0 * h0)
}

/// Draw a simulated response to `item_id` given the learner's true mastery
/// state, using the caller-supplied RNG (never a global one).
pub fn simulate_response<R: Rng + ?Sized>(
    params: &BLIMParameters,
    true_state: &KnowledgeState,
    item_id: &str,
    rng: &mut R,
) -> Result<bool, AssessmentError> {
    let p1 = p_correct(params, true_state, item_id)?;
    Ok(rng.gen::<f64>() < p1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Item};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn domain(ids: &[&str]) -> Domain {
        Domain::new(ids.iter().map(|id| Item::new(*id).unwrap()).collect()).unwrap()
    }

    #[test]
    fn uniform_params_reject_out_of_range() {
        let d = domain(&["a"]);
        assert!(BLIMParameters::uniform(&d, 0.5, 0.1).is_err());
        assert!(BLIMParameters::uniform(&d, -0.1, 0.1).is_err());
        assert!(BLIMParameters::uniform(&d, 0.1, 0.1).is_ok());
    }

    #[test]
    fn p_correct_matches_mastery_with_perfect_params() {
        let d = domain(&["a", "b"]);
        let params = BLIMParameters::uniform(&d, 0.0, 0.0).unwrap();
        let mastered = d.state_from_ids(["a"]).unwrap();
        assert_eq!(p_correct(&params, &mastered, "a").unwrap(), 1.0);
        assert_eq!(p_correct(&params, &mastered, "b").unwrap(), 0.0);
    }

    #[test]
    fn belief_update_concentrates_with_perfect_params() {
        let d = domain(&["a", "b"]);
        let params = BLIMParameters::uniform(&d, 0.0, 0.0).unwrap();
        let states = vec![d.empty_state(), d.state_from_ids(["a"]).unwrap(), d.state_from_ids(["b"]).unwrap(), d.full_state()];
        let belief = BeliefState::uniform(&states);
        let updated = update_belief(&params, &belief, "a", true).unwrap();
        // Only states containing "a" survive a truthful positive response.
        for (state, &p) in updated.states().iter().zip(updated.probs()) {
            if !state.contains("a") {
                assert!(p.abs() < 1e-12);
            }
        }
        let sum: f64 = updated.probs().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn inconsistent_observation_is_detected() {
        let d = domain(&["a"]);
        let params = BLIMParameters::uniform(&d, 0.0, 0.0).unwrap();
        let states = vec![d.state_from_ids(["a"]).unwrap()];
        let belief = BeliefState::new(states, vec![1.0]).unwrap();
        // Mastered, perfect beta=0, so a wrong answer is impossible.
        let err = update_belief(&params, &belief, "a", false).unwrap_err();
        assert_eq!(err, AssessmentError::InconsistentObservation);
    }

    #[test]
    fn information_gain_is_nonnegative() {
        let d = domain(&["a", "b"]);
        let params = BLIMParameters::uniform(&d, 0.1, 0.1).unwrap();
        let states = vec![d.empty_state(), d.state_from_ids(["a"]).unwrap(), d.state_from_ids(["b"]).unwrap(), d.full_state()];
        let belief = BeliefState::uniform(&states);
        let gain = information_gain(&params, &belief, "a").unwrap();
        assert!(gain >= -1e-9);
    }

    #[test]
    fn simulate_response_is_deterministic_given_seed() {
        let d = domain(&["a"]);
        let params = BLIMParameters::uniform(&d, 0.1, 0.1).unwrap();
        let state = d.state_from_ids(["a"]).unwrap();
        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);
        let r1 = simulate_response(&params, &state, "a", &mut rng1).unwrap();
        let r2 = simulate_response(&params, &state, "a", &mut rng2).unwrap();
        assert_eq!(r1, r2);
    }
}
