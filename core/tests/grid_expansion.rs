//! Grid expansion: value sets, cartesian ordering, seeds.

use schelling_core::{
    grid::{ParameterGrid, ValueSet},
    params::PayoffType,
};

fn base_grid() -> ParameterGrid {
    ParameterGrid {
        num_jurors: ValueSet::Fixed(9.0),
        base_reward: ValueSet::Fixed(1.0),
        deposit: ValueSet::Fixed(0.0),
        lambda_qre: ValueSet::Fixed(1.5),
        noise: ValueSet::Fixed(0.1),
        x_mean: ValueSet::Fixed(0.5),
        x_guess_noise: ValueSet::Fixed(0.0),
        payoff_type: PayoffType::Basic,
        attack: false,
        epsilon: 0.0,
        num_simulations: 10,
    }
}

#[test]
fn fixed_and_values_axes_expand_verbatim() {
    assert_eq!(ValueSet::Fixed(2.5).expand(), vec![2.5]);
    assert_eq!(
        ValueSet::Values(vec![0.1, 0.2, 0.7]).expand(),
        vec![0.1, 0.2, 0.7]
    );
}

#[test]
fn range_expansion_includes_max() {
    let values = ValueSet::Range {
        min: 3.0,
        max: 21.0,
        step: 2.0,
    }
    .expand();
    assert_eq!(values.len(), 10);
    assert_eq!(values[0], 3.0);
    assert_eq!(values[9], 21.0);

    // Fractional steps reach max within half a step despite float drift.
    let fine = ValueSet::Range {
        min: 0.5,
        max: 1.5,
        step: 0.1,
    }
    .expand();
    assert_eq!(fine.len(), 11);
    assert!((fine[10] - 1.5).abs() < 1e-9);
}

#[test]
fn degenerate_range_collapses_to_min() {
    let v = ValueSet::Range {
        min: 1.0,
        max: 0.5,
        step: 0.1,
    }
    .expand();
    assert_eq!(v, vec![1.0]);

    let zero_step = ValueSet::Range {
        min: 1.0,
        max: 2.0,
        step: 0.0,
    }
    .expand();
    assert_eq!(zero_step, vec![1.0]);
}

#[test]
fn cartesian_product_counts_and_order() {
    let mut grid = base_grid();
    grid.num_jurors = ValueSet::Values(vec![5.0, 9.0]);
    grid.lambda_qre = ValueSet::Values(vec![1.0, 2.0, 3.0]);
    grid.noise = ValueSet::Values(vec![0.0, 0.1]);

    let jobs = grid.expand_jobs(42).unwrap();
    assert_eq!(jobs.len(), 2 * 3 * 2);

    // Fixed enumeration order: later axes vary fastest.
    assert_eq!(jobs[0].params.num_jurors, 5);
    assert_eq!(jobs[0].params.lambda_qre, 1.0);
    assert_eq!(jobs[0].params.noise, 0.0);

    assert_eq!(jobs[1].params.noise, 0.1);
    assert_eq!(jobs[2].params.lambda_qre, 2.0);
    assert_eq!(jobs[11].params.num_jurors, 9);
    assert_eq!(jobs[11].params.lambda_qre, 3.0);
    assert_eq!(jobs[11].params.noise, 0.1);

    // Indices follow enumeration order; every job gets its own seed.
    for (i, job) in jobs.iter().enumerate() {
        assert_eq!(job.job_index, i as u64);
        assert_eq!(job.num_simulations, 10);
    }
    let mut seeds: Vec<u64> = jobs.iter().map(|j| j.seed).collect();
    seeds.sort_unstable();
    seeds.dedup();
    assert_eq!(seeds.len(), jobs.len(), "job seeds must be pairwise distinct");
}

#[test]
fn expansion_is_reproducible() {
    let grid = {
        let mut g = base_grid();
        g.deposit = ValueSet::Range {
            min: 0.0,
            max: 1.0,
            step: 0.25,
        };
        g
    };
    let a = grid.expand_jobs(123).unwrap();
    let b = grid.expand_jobs(123).unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.params, y.params);
        assert_eq!(x.seed, y.seed);
    }
}

#[test]
fn invalid_grid_values_are_rejected() {
    let mut grid = base_grid();
    grid.noise = ValueSet::Values(vec![0.1, 2.0]); // out of [0, 1]
    assert!(grid.expand_jobs(1).is_err());

    let mut empty = base_grid();
    empty.lambda_qre = ValueSet::Values(vec![]);
    assert!(empty.expand_jobs(1).is_err());

    let mut no_rounds = base_grid();
    no_rounds.num_simulations = 0;
    assert!(no_rounds.expand_jobs(1).is_err());
}

#[test]
fn grid_config_parses_from_json() {
    let json = r#"{
        "num_jurors": 9,
        "base_reward": {"min": 0.5, "max": 1.5, "step": 0.5},
        "deposit": 0.0,
        "lambda_qre": [1.0, 2.0],
        "noise": 0.1,
        "x_mean": 0.5,
        "payoff_type": "redistributive",
        "num_simulations": 100
    }"#;
    let grid: ParameterGrid = serde_json::from_str(json).unwrap();
    assert_eq!(grid.payoff_type, PayoffType::Redistributive);
    assert!(!grid.attack);

    let jobs = grid.expand_jobs(9).unwrap();
    assert_eq!(jobs.len(), 3 * 2);
    assert_eq!(jobs[0].params.x_guess_noise, 0.0);
}
