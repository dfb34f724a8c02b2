//! Black-box coverage of adaptive assessment: a truthful learner on a
//! diamond-shaped learning space should be identified exactly, and batch
//! mode should agree with an equivalent sequence of `observe` calls.

use kst_engine::api;
use kst_engine::session::{truthful_responder, AssessmentSession, SessionConfig, SessionStatus};
use kst_engine::ResponsePattern;

fn diamond_domain_and_states() -> (kst_engine::Domain, Vec<kst_engine::KnowledgeState>) {
    let domain = api::build_domain(vec![
        ("a".to_string(), None),
        ("b".to_string(), None),
        ("c".to_string(), None),
        ("d".to_string(), None),
    ])
    .unwrap();
    let edges = vec![
        ("a".to_string(), "b".to_string()),
        ("a".to_string(), "c".to_string()),
        ("b".to_string(), "d".to_string()),
        ("c".to_string(), "d".to_string()),
    ];
    let (course, report) = api::build_course(domain, &edges).unwrap();
    assert!(report.is_valid());
    let states = course.learning_space().states().to_vec();
    (course.domain().clone(), states)
}

#[test]
fn truthful_adaptive_session_identifies_the_true_state_exactly() {
    let (domain, states) = diamond_domain_and_states();
    let params = api::build_blim_params_uniform(&domain, 0.0, 0.0).unwrap();
    let true_state = api::build_state(&domain, ["a", "b"]).unwrap();

    let mut session = api::start_session(domain, states, params, SessionConfig::default());
    let summary = session.run_adaptive(truthful_responder(true_state.clone())).unwrap();

    assert_eq!(session.status(), SessionStatus::Complete);
    assert_eq!(summary.final_map_state, true_state);
    assert_eq!(summary.confidence, 1.0);
}

#[test]
fn batch_mode_agrees_with_a_sequential_run_over_the_same_pattern() {
    let (domain, states) = diamond_domain_and_states();
    let params = api::build_blim_params_uniform(&domain, 0.1, 0.1).unwrap();

    let mut pattern = ResponsePattern::new();
    for id in ["a", "b", "c", "d"] {
        pattern.insert(id.to_string(), id != "c");
    }

    let batch = AssessmentSession::run_batch(domain.clone(), states.clone(), params.clone(), &pattern, SessionConfig::default()).unwrap();

    let mut sequential = api::start_session(domain, states, params, SessionConfig::default());
    for id in ["a", "b", "c", "d"] {
        sequential.observe(id, pattern[id]).unwrap();
    }

    for (b, s) in batch.belief().probs().iter().zip(sequential.belief().probs()) {
        assert!((b - s).abs() < 1e-9);
    }
}
