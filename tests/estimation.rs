//! Black-box coverage of EM calibration: fitting a BLIM model to simulated
//! response data recovers the generating `beta`/`eta` within tolerance, and
//! the fitted model's `G^2` statistic comes back finite with a sane degrees
//! of freedom.

use kst_engine::api;
use kst_engine::estimation::EmStopCriteria;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::Rng;

fn linear_chain() -> (kst_engine::Domain, Vec<kst_engine::KnowledgeState>) {
    let domain = api::build_domain(vec![
        ("a".to_string(), None),
        ("b".to_string(), None),
        ("c".to_string(), None),
        ("d".to_string(), None),
        ("e".to_string(), None),
    ])
    .unwrap();
    let edges = vec![
        ("a".to_string(), "b".to_string()),
        ("b".to_string(), "c".to_string()),
        ("c".to_string(), "d".to_string()),
        ("d".to_string(), "e".to_string()),
    ];
    let (course, report) = api::build_course(domain, &edges).unwrap();
    assert!(report.is_valid());
    let states = course.learning_space().states().to_vec();
    (course.domain().clone(), states)
}

#[test]
fn em_fit_recovers_known_beta_eta_on_simulated_data() {
    let (domain, states) = linear_chain();
    let true_beta = 0.1;
    let true_eta = 0.1;
    let true_params = api::build_blim_params_uniform(&domain, true_beta, true_eta).unwrap();

    let mut rng = StdRng::seed_from_u64(123);
    let data: Vec<_> = (0..500)
        .map(|_| {
            let state = &states[rng.gen_range(0..states.len())];
            domain
                .items()
                .iter()
                .map(|it| {
                    let r = kst_engine::assessment::simulate_response(&true_params, state, it.id(), &mut rng).unwrap();
                    (it.id().to_string(), r)
                })
                .collect()
        })
        .collect();

    let init_pi = vec![1.0 / states.len() as f64; states.len()];
    let init_beta = api::build_blim_params_uniform(&domain, 0.25, 0.25).unwrap();
    let estimate = api::em_fit(&domain, &states, &data, EmStopCriteria { max_iter: 500, tol: 1e-8 }, init_pi, init_beta).unwrap();

    for item in domain.items() {
        let b = estimate.params.beta(item.id()).unwrap();
        let e = estimate.params.eta(item.id()).unwrap();
        assert!((b - true_beta).abs() < 0.03, "beta[{}] = {b}", item.id());
        assert!((e - true_eta).abs() < 0.03, "eta[{}] = {e}", item.id());
    }

    let pi_total_variation: f64 = states
        .iter()
        .map(|k| (estimate.pi_of(k) - 1.0 / states.len() as f64).abs())
        .sum::<f64>()
        / 2.0;
    assert!(pi_total_variation < 0.05, "pi TV distance = {pi_total_variation}");

    let (g2, df) = api::goodness_of_fit(&domain, &estimate, &data).unwrap();
    assert!(g2.is_finite());
    assert!(df > 0);
}
