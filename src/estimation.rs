//! EM parameter estimation: E-step responsibilities, M-step updates,
//! multi-restart calibration, $G^2$ goodness of fit
//!
//! Fits [`BLIMParameters`] and a state prior $\pi$ to observed response
//! patterns by expectation-maximisation. The E-step is computed in log
//! space (log-sum-exp over states) the same way [`crate::assessment`]'s
//! belief update is, for the same numerical reasons.

use rand::Rng;

use crate::assessment::{log_likelihood, AssessmentError, BLIMParameters, ResponsePattern};
use crate::domain::{Domain, KnowledgeState};

/// Errors raised while fitting or scoring a BLIM model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimationError {
    /// The observed-data log-likelihood decreased between iterations by
    /// more than the convergence tolerance — a numerical-drift condition
    /// the EM theory says cannot happen in exact arithmetic.
    #[error("EM diverged: log-likelihood decreased from {prev} to {next}")]
    EMDiverged {
        /// Log-likelihood before the offending iteration.
        prev: f64,
        /// Log-likelihood after the offending iteration.
        next: f64,
    },
    /// A `beta`/`eta`/probability parameter left its valid range.
    #[error("parameter out of range: {0}")]
    ParameterOutOfRange(String),
    /// The response dataset was empty.
    #[error("response data must contain at least one pattern")]
    EmptyResponseData,
    /// Underlying BLIM parameter or likelihood error.
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
}

const BETA_ETA_FLOOR: f64 = 1e-6;
const BETA_ETA_CEIL: f64 = 0.5 - 1e-6;

/// Stopping criteria for a single EM fit.
#[derive(Clone, Copy, Debug)]
pub struct EmStopCriteria {
    /// Maximum number of EM iterations.
    pub max_iter: usize,
    /// Stop once the log-likelihood improves by less than this amount.
    pub tol: f64,
}

impl Default for EmStopCriteria {
    fn default() -> Self {
        Self { max_iter: 200, tol: 1e-6 }
    }
}

/// Configuration for multi-restart calibration.
#[derive(Clone, Copy, Debug)]
pub struct CalibrationConfig {
    /// Number of independent random restarts.
    pub restarts: usize,
    /// Maximum across-restart standard deviation of `beta`/`eta` for the
    /// fit to be declared identifiable.
    pub identifiability_tol: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { restarts: 8, identifiability_tol: 0.05 }
    }
}

/// The result of fitting a BLIM model to observed response data.
#[derive(Clone, Debug)]
pub struct BLIMEstimate {
    /// Fitted per-item slip/lucky-guess parameters.
    pub params: BLIMParameters,
    /// Fitted state prior $\hat\pi$, aligned with the `states` the fit was run against.
    pub pi: Vec<f64>,
    /// The states $\hat\pi$ is defined over.
    pub states: Vec<KnowledgeState>,
    /// Final observed-data log-likelihood.
    pub log_likelihood: f64,
    /// Number of EM iterations performed.
    pub iterations: usize,
    /// Whether the fit converged before `max_iter` was reached.
    pub converged: bool,
}

impl BLIMEstimate {
    /// $\hat\pi(K)$ for a state in [`BLIMEstimate::states`]'s order.
    pub fn pi_of(&self, state: &KnowledgeState) -> f64 {
        self.states.iter().position(|k| k == state).map(|i| self.pi[i]).unwrap_or(0.0)
    }
}

fn clamp_beta_eta(x: f64) -> f64 {
    x.clamp(BETA_ETA_FLOOR, BETA_ETA_CEIL)
}

fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + xs.iter().map(|&x| (x - max).exp()).sum::<f64>().ln()
}

/// One EM fit from an explicit initialisation.
///
/// # Errors
/// [`EstimationError::EmptyResponseData`] if `data` is empty;
/// [`EstimationError::EMDiverged`] if the log-likelihood decreases by more
/// than `stop.tol` between iterations.
pub fn em_fit(
    domain: &Domain,
    states: &[KnowledgeState],
    data: &[ResponsePattern],
    stop: EmStopCriteria,
    init_pi: Vec<f64>,
    mut init_beta: BLIMParameters,
) -> Result<BLIMEstimate, EstimationError> {
    if data.is_empty() {
        return Err(EstimationError::EmptyResponseData);
    }
    let n_states = states.len();
    let n_learners = data.len();
    let n_items = domain.len();

    let mut pi = init_pi;
    let mut prev_ll = f64::NEG_INFINITY;
    let mut iterations = 0;
    let mut converged = false;

    // log P(R_j | K) cache, recomputed each iteration since beta/eta change.
    loop {
        iterations += 1;
        let mut log_resp: Vec<Vec<f64>> = Vec::with_capacity(n_learners);
        let mut ll = 0.0;
        for pattern in data {
            let mut row = Vec::with_capacity(n_states);
            for (k, state) in states.iter().enumerate() {
                let log_pi = if pi[k] > 0.0 { pi[k].ln() } else { f64::NEG_INFINITY };
                let log_lik = log_likelihood(&init_beta, pattern, state)?;
                row.push(log_pi + log_lik);
            }
            let z = log_sum_exp(&row);
            ll += z;
            for v in row.iter_mut() {
                *v = (*v - z).exp(); // now w_jK
            }
            log_resp.push(row);
        }

        if ll < prev_ll - stop.tol {
            return Err(EstimationError::EMDiverged { prev: prev_ll, next: ll });
        }
        let improved = ll - prev_ll;
        let should_stop = iterations > 1 && improved.abs() < stop.tol;
        prev_ll = ll;
        tracing::trace!(iterations, log_likelihood = ll, "EM iteration");

        if should_stop {
            converged = true;
            // Apply the M-step once more isn't needed; parameters from the
            // iteration that produced `ll` are the ones reported.
            break;
        }
        if iterations >= stop.max_iter {
            converged = false;
            tracing::warn!(max_iter = stop.max_iter, log_likelihood = ll, "EM hit its iteration cap without converging");
            break;
        }

        // M-step: new pi.
        let mut new_pi = vec![0.0; n_states];
        for row in &log_resp {
            for (k, &w) in row.iter().enumerate() {
                new_pi[k] += w / n_learners as f64;
            }
        }

        // M-step: new beta/eta per item.
        let mut beta_num = vec![0.0; n_items];
        let mut beta_den = vec![0.0; n_items];
        let mut eta_num = vec![0.0; n_items];
        let mut eta_den = vec![0.0; n_items];

        for (j, pattern) in data.iter().enumerate() {
            for (qi, item) in domain.items().iter().enumerate() {
                let observed_correct = pattern[item.id()];
                for (k, state) in states.iter().enumerate() {
                    let w = log_resp[j][k];
                    if state.contains(item.id()) {
                        beta_den[qi] += w;
                        if !observed_correct {
                            beta_num[qi] += w;
                        }
                    } else {
                        eta_den[qi] += w;
                        if observed_correct {
                            eta_num[qi] += w;
                        }
                    }
                }
            }
        }

        let mut beta_map = std::collections::HashMap::new();
        let mut eta_map = std::collections::HashMap::new();
        for (qi, item) in domain.items().iter().enumerate() {
            let beta = if beta_den[qi] > 0.0 { clamp_beta_eta(beta_num[qi] / beta_den[qi]) } else { clamp_beta_eta(init_beta.beta(item.id())?) };
            let eta = if eta_den[qi] > 0.0 { clamp_beta_eta(eta_num[qi] / eta_den[qi]) } else { clamp_beta_eta(init_beta.eta(item.id())?) };
            beta_map.insert(item.id().to_string(), beta);
            eta_map.insert(item.id().to_string(), eta);
        }
        init_beta = BLIMParameters::per_item(domain, &beta_map, &eta_map)?;

        let pi_sum: f64 = new_pi.iter().sum();
        pi = if pi_sum > 0.0 { new_pi.into_iter().map(|p| p / pi_sum).collect() } else { vec![1.0 / n_states as f64; n_states] };
    }

    Ok(BLIMEstimate { params: init_beta, pi, states: states.to_vec(), log_likelihood: prev_ll, iterations, converged })
}

fn random_init<R: Rng + ?Sized>(domain: &Domain, states: &[KnowledgeState], rng: &mut R) -> (Vec<f64>, BLIMParameters) {
    let mut pi: Vec<f64> = (0..states.len()).map(|_| rng.gen::<f64>() + 1e-9).collect();
    let sum: f64 = pi.iter().sum();
    for p in pi.iter_mut() {
        *p /= sum;
    }
    let mut beta_map = std::collections::HashMap::new();
    let mut eta_map = std::collections::HashMap::new();
    for item in domain.items() {
        beta_map.insert(item.id().to_string(), clamp_beta_eta(rng.gen::<f64>() * 0.4 + 0.05));
        eta_map.insert(item.id().to_string(), clamp_beta_eta(rng.gen::<f64>() * 0.4 + 0.05));
    }
    let params = BLIMParameters::per_item(domain, &beta_map, &eta_map).expect("random init within range");
    (pi, params)
}

/// The result of running EM from several random restarts.
#[derive(Clone, Debug)]
pub struct CalibrationResult {
    /// The restart with the highest final log-likelihood.
    pub best: BLIMEstimate,
    /// Every restart's estimate, in the order they were run.
    pub restarts: Vec<BLIMEstimate>,
    /// True iff the across-restart standard deviation of every `beta`/`eta`
    /// is below [`CalibrationConfig::identifiability_tol`].
    pub identifiable: bool,
}

/// Run [`em_fit`] `config.restarts` times from seeded random initialisations
/// and return the best-scoring restart alongside an identifiability verdict.
pub fn calibrate_parameters<R: Rng + ?Sized>(
    domain: &Domain,
    states: &[KnowledgeState],
    data: &[ResponsePattern],
    stop: EmStopCriteria,
    config: CalibrationConfig,
    rng: &mut R,
) -> Result<CalibrationResult, EstimationError> {
    let mut restarts = Vec::with_capacity(config.restarts);
    for _ in 0..config.restarts {
        let (pi0, beta0) = random_init(domain, states, rng);
        let estimate = em_fit(domain, states, data, stop, pi0, beta0)?;
        restarts.push(estimate);
    }
    let best = restarts
        .iter()
        .max_by(|a, b| a.log_likelihood.partial_cmp(&b.log_likelihood).unwrap_or(std::cmp::Ordering::Equal))
        .cloned()
        .expect("at least one restart was run");

    let identifiable = domain.items().iter().all(|item| {
        let betas: Vec<f64> = restarts.iter().map(|e| e.params.beta(item.id()).unwrap()).collect();
        let etas: Vec<f64> = restarts.iter().map(|e| e.params.eta(item.id()).unwrap()).collect();
        stddev(&betas) < config.identifiability_tol && stddev(&etas) < config.identifiability_tol
    });

    Ok(CalibrationResult { best, restarts, identifiable })
}

fn stddev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

/// $G^2$ goodness-of-fit statistic and its degrees of freedom, computed by
/// grouping `data` into distinct observed patterns.
pub fn goodness_of_fit(domain: &Domain, estimate: &BLIMEstimate, data: &[ResponsePattern]) -> Result<(f64, usize), EstimationError> {
    let mut counts: std::collections::HashMap<Vec<bool>, usize> = std::collections::HashMap::new();
    for pattern in data {
        let key: Vec<bool> = domain.items().iter().map(|it| pattern[it.id()]).collect();
        *counts.entry(key).or_insert(0) += 1;
    }
    let n = data.len() as f64;
    let mut g2 = 0.0;
    for (key, &count) in &counts {
        let pattern: ResponsePattern = domain.items().iter().zip(key.iter()).map(|(it, &r)| (it.id().to_string(), r)).collect();
        let mut p_hat = 0.0;
        for (k, state) in estimate.states.iter().enumerate() {
            p_hat += estimate.pi[k] * log_likelihood(&estimate.params, &pattern, state)?.exp();
        }
        if p_hat > 0.0 && count > 0 {
            let n_r = count as f64;
            g2 += 2.0 * n_r * (n_r / (n * p_hat)).ln();
        }
    }
    let distinct_patterns = counts.len();
    let n_items = domain.len();
    let model_df = estimate.states.len() - 1 + 2 * n_items;
    let df = distinct_patterns.saturating_sub(1).saturating_sub(model_df);
    Ok((g2, df))
}
