//! Crate root: public surface and crate-wide invariants
//!
//! This module is the **single canonical entry-point** for downstream users
//! of the library. It documents the crate-wide invariants every submodule
//! depends on and re-exports the public surface: value types, per-module
//! error enums, and the `api` facade.
//!
//! ## Invariants
//!
//! - **Canonical item order.** A [`Domain`] stores its items sorted by id;
//!   every [`KnowledgeState`] derived from it is a fixed-width bitset
//!   indexed by that order. Every deterministic enumeration in the crate
//!   (topological orders, downsets, learning paths, the Markov transition
//!   matrix) iterates in this order or in `(cardinality, ids)` order derived
//!   from it, so results are reproducible across runs.
//! - **Validate at construction, not downstream.** Every value type in
//!   `domain`/`prerequisite`/`space`/`assessment` is built by a validating
//!   constructor that returns a typed error on the first violated invariant;
//!   once constructed, a value is immutable and every downstream module
//!   trusts it without re-checking.
//! - **No global RNG, no global mutable state.** Every operation that needs
//!   randomness (EM restarts, trajectory simulation, response simulation)
//!   takes a caller-supplied `rand::Rng`. The core opens no file, socket, or
//!   lock and installs no global subscriber.
//! - **Numerical stability.** Belief updates and the EM E-step are computed
//!   in log space via log-sum-exp; fitted `beta`/`eta` are clamped to
//!   `[1e-6, 0.5-1e-6]`; the Markov model's expected-steps computation
//!   solves `(I-T)x=1` rather than forming an explicit matrix inverse.
//!
//! If any invariant is violated at runtime, the failure mode is a typed
//! error value from the owning module's error enum — never a panic in
//! non-test code, never silent truncation.
//!
//! ## Module map
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`domain`] | Items, knowledge states (bitset-backed), domains |
//! | [`prerequisite`] | Surmise relations, prerequisite DAGs, closure/reduction, Birkhoff downsets |
//! | [`space`] | Knowledge/learning spaces, axiom validation, fringes, atoms, gradation, covering |
//! | [`paths`] | Learning-path enumeration |
//! | [`report`] | Structured validation checks and reports |
//! | [`course`] | The `CourseCore` aggregate: domain + DAG + relation + learning space |
//! | [`assessment`] | BLIM parameters, belief state, Bayesian update, information gain |
//! | [`session`] | The adaptive assessment session state machine, batch mode |
//! | [`estimation`] | EM parameter fitting, multi-restart calibration, $G^2$ |
//! | [`markov`] | Transition structure, expected steps, optimal teaching, trajectory simulation, rate tuning |
//! | [`difficulty`] | Structural/empirical/BLIM item difficulty |
//! | [`api`] | A flat facade over all of the above |

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// Items, knowledge states, and domains (C1).
pub mod domain;
/// Prerequisite algebra: surmise relations, DAGs, closure/reduction, downsets (C2).
pub mod prerequisite;
/// Knowledge/learning spaces: axiom validation, fringes, atoms, gradation, covering (C3).
pub mod space;
/// Learning-path enumeration (C3).
pub mod paths;
/// Structured validation reporting (C8).
pub mod report;
/// The `CourseCore` aggregate (domain + DAG + relation + learning space).
pub mod course;
/// BLIM: response likelihood, belief update, information gain (C4).
pub mod assessment;
/// Adaptive assessment session state machine (C4).
pub mod session;
/// EM parameter estimation: E-step, M-step, calibration, $G^2$ (C5).
pub mod estimation;
/// Markov learning model: transitions, expected steps, optimal teaching, simulation, rate tuning (C6).
pub mod markov;
/// Item difficulty: structural, empirical, BLIM-based (C7).
pub mod difficulty;
/// The library's flat "shape, not syntax" facade (§6).
pub mod api;

// ============================================================================
// Root re-exports: value types
// ============================================================================

/// Items, knowledge states, and the domain that owns their canonical order (C1).
pub use crate::domain::{Domain, Item, KnowledgeState};
/// Prerequisite DAGs and the surmise relations (quasi-orders) derived from them (C2).
pub use crate::prerequisite::{PrerequisiteGraph, SurmiseRelation};
/// Knowledge/learning spaces and the covering relation between their states (C3).
pub use crate::space::{CoveringEdge, KnowledgeSpace, LearningSpace};
/// A single maximal learning path (a chain from `∅` to `Q`) (C3).
pub use crate::paths::LearningPath;
/// Structured validation checks and the reports that aggregate them (C8).
pub use crate::report::{Check, Report};
/// The aggregate owning a domain, its DAG, surmise relation, and learning space.
pub use crate::course::CourseCore;
/// BLIM parameters, belief states, and observed response patterns (C4).
pub use crate::assessment::{BLIMParameters, BeliefState, ResponsePattern};
/// The adaptive assessment session state machine and its outputs (C4).
pub use crate::session::{AssessmentSession, AssessmentSummary, SessionConfig, SessionStatus};
/// EM fitting results and calibration configuration/outcome (C5).
pub use crate::estimation::{BLIMEstimate, CalibrationConfig, CalibrationResult, EmStopCriteria};
/// Markov learning-model rates, teaching plans, and simulated trajectories (C6).
pub use crate::markov::{LearningRate, RateTuningStop, TeachingPlan, TeachingStep, Trajectory};
/// Inputs to structural/empirical/BLIM-based item difficulty (C7).
pub use crate::difficulty::DifficultyInputs;

// ============================================================================
// Root re-exports: error taxonomy (§7)
// ============================================================================

/// Errors from BLIM parameter construction, belief update, or information gain.
pub use crate::assessment::AssessmentError;
/// Errors from building the `CourseCore` aggregate.
pub use crate::course::CourseError;
/// Errors from item-difficulty estimation.
pub use crate::difficulty::DifficultyError;
/// Errors from item/state/domain construction.
pub use crate::domain::DomainError;
/// Errors from EM fitting and calibration.
pub use crate::estimation::EstimationError;
/// Errors from the Markov learning model.
pub use crate::markov::LearningModelError;
/// Errors from prerequisite graph/surmise relation construction.
pub use crate::prerequisite::PrerequisiteError;
/// Errors from knowledge/learning space construction and validation.
pub use crate::space::SpaceError;
