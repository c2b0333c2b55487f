//! Quantal-response decision model properties.

use schelling_core::{
    juror::{qre_probability, JurorDecisionModel},
    params::{PayoffType, SimulationParameters},
    rng::RoundRng,
    round::RoundSimulator,
    types::Vote,
};

// ── Probability properties ───────────────────────────────────────────────────

#[test]
fn probabilities_stay_in_unit_interval_across_parameter_sweep() {
    let mechanisms = [
        PayoffType::Basic,
        PayoffType::Redistributive,
        PayoffType::Symbiotic,
    ];
    let mut seed = 1u64;
    for payoff_type in mechanisms {
        for &lambda in &[0.0, 0.5, 1.5, 5.0, 100.0] {
            for &x_mean in &[0.0, 0.25, 0.5, 1.0] {
                let params = SimulationParameters {
                    num_jurors: 11,
                    base_reward: 2.0,
                    deposit: 1.0,
                    lambda_qre: lambda,
                    noise: 0.3,
                    x_mean,
                    x_guess_noise: 0.4,
                    payoff_type,
                    attack: false,
                    epsilon: 0.0,
                };
                let juror = JurorDecisionModel::new(&params);
                let mut rng = RoundRng::from_seed(seed);
                seed += 1;

                for _ in 0..50 {
                    let p_x = juror.vote_probability(&mut rng);
                    assert!(
                        (0.0..=1.0).contains(&p_x),
                        "P(X)={p_x} out of range for {payoff_type:?} lambda={lambda}"
                    );
                    let p_y = 1.0 - p_x;
                    assert!((p_x + p_y - 1.0).abs() < 1e-12);
                }
            }
        }
    }
}

#[test]
fn lambda_zero_is_a_fair_coin_for_any_utilities() {
    assert_eq!(qre_probability(0.0, 1_000.0, -1_000.0), 0.5);
    assert_eq!(qre_probability(0.0, -3.5, 7.25), 0.5);
    assert_eq!(qre_probability(0.0, 0.0, 0.0), 0.5);

    // Through the full pipeline as well, for every mechanism.
    for payoff_type in [
        PayoffType::Basic,
        PayoffType::Redistributive,
        PayoffType::Symbiotic,
    ] {
        let params = SimulationParameters {
            lambda_qre: 0.0,
            payoff_type,
            ..SimulationParameters::default()
        };
        let juror = JurorDecisionModel::new(&params);
        let mut rng = RoundRng::from_seed(7);
        for _ in 0..20 {
            assert_eq!(juror.vote_probability(&mut rng), 0.5);
        }
    }
}

#[test]
fn large_lambda_sharpens_toward_the_better_action() {
    assert!(qre_probability(50.0, 1.0, 0.0) > 0.999);
    assert!(qre_probability(50.0, 0.0, 1.0) < 0.001);
}

#[test]
fn extreme_lambda_and_utilities_do_not_overflow() {
    // Without max-subtraction, exp(1e6 * 1e3) is +inf and the ratio NaN.
    let p = qre_probability(1e6, 1e3, 999.0);
    assert!(p.is_finite(), "stabilization failed: P(X)={p}");
    assert!(p > 0.999);

    let q = qre_probability(1e6, -1e3, -999.0);
    assert!(q.is_finite());
    assert!(q < 0.001);
}

#[test]
fn symmetry_of_the_softmax() {
    for &(u_x, u_y) in &[(0.7, -0.3), (5.0, 5.0), (-2.0, 4.0)] {
        let p = qre_probability(1.5, u_x, u_y);
        let q = qre_probability(1.5, u_y, u_x);
        assert!((p + q - 1.0).abs() < 1e-12);
    }
}

// ── Rational limit ───────────────────────────────────────────────────────────

/// noise=0 plus a huge lambda collapses to the utility-maximizing
/// action: with a strongly X-leaning focal point every juror votes X.
#[test]
fn zero_noise_rational_limit_votes_unanimously() {
    let params = SimulationParameters {
        num_jurors: 9,
        base_reward: 1.0,
        deposit: 0.5,
        lambda_qre: 1_000.0,
        noise: 0.0,
        x_mean: 0.9,
        x_guess_noise: 0.0,
        payoff_type: PayoffType::Basic,
        attack: false,
        epsilon: 0.0,
    };
    let simulator = RoundSimulator::new(&params);

    for seed in 0..10 {
        let mut rng = RoundRng::from_seed(seed);
        let result = simulator.run(&mut rng);
        assert_eq!(
            result.x_votes, 9,
            "expected unanimity at seed {seed}, got {}/{}",
            result.x_votes, result.y_votes
        );
        assert_eq!(result.majority, Vote::X);
    }
}
