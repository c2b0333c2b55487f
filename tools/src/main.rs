//! oracle-runner: headless runner for the Schelling oracle simulator.
//!
//! Usage:
//!   oracle-runner --seed 42 --rounds 1000 --jurors 9 --lambda 1.5
//!   oracle-runner --grid grid.json --db batch.db --csv results.csv
//!   oracle-runner --dispute dispute_123.json

use anyhow::{bail, Context, Result};
use schelling_core::{
    batch::{new_run_id, BatchConfig, BatchRunner, CancelToken},
    dispute::{tally_votes, RecordedChoice},
    grid::ParameterGrid,
    observer::LogObserver,
    oracle::{OracleModel, SimulationResult},
    params::{PayoffType, SimulationParameters},
    payoff::payoff_table,
    store::SimStore,
};
use std::env;
use std::fs;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    if let Some(path) = parse_str_arg(&args, "--dispute") {
        return run_dispute(&path);
    }
    if let Some(path) = parse_str_arg(&args, "--grid") {
        return run_batch(&args, &path);
    }
    run_single(&args)
}

fn print_usage() {
    println!("oracle-runner — Schelling oracle simulation runner");
    println!();
    println!("Single run (default mode):");
    println!("  --seed N           master seed (default 42)");
    println!("  --rounds N         simulation rounds (default 100)");
    println!("  --jurors M         number of jurors (default 10)");
    println!("  --lambda F         QRE sensitivity (default 1.5)");
    println!("  --noise F          payoff perception noise (default 0.1)");
    println!("  --p F              base reward (default 1.0)");
    println!("  --d F              deposit (default 0.0)");
    println!("  --x-mean F         expected share of X votes (default 0.5)");
    println!("  --x-guess-noise F  belief spread (default 0.0)");
    println!("  --payoff TYPE      basic | redistributive | symbiotic");
    println!("  --attack           enable the p+epsilon attack");
    println!("  --epsilon F        bribe amount (default 0.0)");
    println!();
    println!("Batch run:");
    println!("  --grid FILE        JSON parameter grid (switches to batch mode)");
    println!("  --db FILE          batch database (default batch.db)");
    println!("  --csv FILE         export results CSV after the run");
    println!("  --workers N        worker threads (default: cores - 1)");
    println!("  --chunk-size N     jobs per chunk (default 4)");
    println!();
    println!("Historical record:");
    println!("  --dispute FILE     tally a dispute JSON export and exit");
}

// ── Single run ───────────────────────────────────────────────────────────────

fn run_single(args: &[String]) -> Result<()> {
    let seed = parse_arg(args, "--seed", 42u64);
    let rounds = parse_arg(args, "--rounds", 100u64);

    let payoff_name = parse_str_arg(args, "--payoff").unwrap_or_else(|| "basic".into());
    let Some(payoff_type) = PayoffType::parse(&payoff_name) else {
        bail!("unknown payoff type: {payoff_name}");
    };

    let params = SimulationParameters {
        num_jurors:    parse_arg(args, "--jurors", 10u32),
        base_reward:   parse_arg(args, "--p", 1.0f64),
        deposit:       parse_arg(args, "--d", 0.0f64),
        lambda_qre:    parse_arg(args, "--lambda", 1.5f64),
        noise:         parse_arg(args, "--noise", 0.1f64),
        x_mean:        parse_arg(args, "--x-mean", 0.5f64),
        x_guess_noise: parse_arg(args, "--x-guess-noise", 0.0f64),
        payoff_type,
        attack:        args.iter().any(|a| a == "--attack"),
        epsilon:       parse_arg(args, "--epsilon", 0.0f64),
    };

    println!("Schelling Oracle Simulation");
    println!("  seed:    {seed}");
    println!("  rounds:  {rounds}");
    println!("  jurors:  {}", params.num_jurors);
    println!("  payoff:  {}", params.payoff_type.as_str());
    if params.attack {
        println!("  attack:  enabled (epsilon = {})", params.epsilon);
    }
    println!();

    print_payoff_matrix(&params);

    let oracle = OracleModel::new(params, seed)?;
    let mut observer = LogObserver::new();
    let result = oracle.run_simulations(rounds, &mut observer)?;

    print_summary(&result);
    Ok(())
}

/// The juror-facing payoff matrix at the focal belief, the same table
/// the interactive front end renders.
fn print_payoff_matrix(params: &SimulationParameters) {
    let focal_x = params.x_mean * params.num_jurors.saturating_sub(1) as f64;
    let table = payoff_table(params, focal_x);

    println!("Payoff matrix at the focal belief (x = {focal_x:.1}):");
    println!("                 X wins      Y wins");
    println!("  vote X   {:>10.3}  {:>10.3}", table.x_when_x, table.x_when_y);
    println!("  vote Y   {:>10.3}  {:>10.3}", table.y_when_x, table.y_when_y);
    println!();
}

fn print_summary(result: &SimulationResult) {
    let rounds = result.num_rounds();
    let pct_x = 100.0 * result.x_wins as f64 / rounds as f64;
    let pct_y = 100.0 * result.y_wins as f64 / rounds as f64;

    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len().max(1) as f64;

    println!("=== RUN SUMMARY ===");
    println!("  rounds:        {rounds}");
    println!("  X wins:        {} ({pct_x:.1}%)", result.x_wins);
    println!("  Y wins:        {} ({pct_y:.1}%)", result.y_wins);
    println!(
        "  avg votes:     X {:.2} / Y {:.2}",
        result.average_votes_x, result.average_votes_y,
    );
    println!(
        "  avg payoff:    X {:.3} / Y {:.3}",
        mean(&result.avg_payoff_x),
        mean(&result.avg_payoff_y),
    );
    if let Some(rate) = result.attack_success_rate {
        println!("  attack success rate: {rate:+.1} pp vs no-attack baseline");
    }
}

// ── Batch run ────────────────────────────────────────────────────────────────

fn run_batch(args: &[String], grid_path: &str) -> Result<()> {
    let seed = parse_arg(args, "--seed", 42u64);
    let db = parse_str_arg(args, "--db").unwrap_or_else(|| "batch.db".into());
    let config = BatchConfig {
        workers: parse_arg(args, "--workers", 0usize),
        chunk_size: parse_arg(args, "--chunk-size", 4usize),
    };

    let grid_json = fs::read_to_string(grid_path)
        .with_context(|| format!("reading grid config {grid_path}"))?;
    let grid: ParameterGrid =
        serde_json::from_str(&grid_json).with_context(|| format!("parsing {grid_path}"))?;

    let jobs = grid.expand_jobs(seed)?;

    let store = SimStore::open(&db)?;
    store.migrate()?;

    let run_id = new_run_id();
    store.insert_batch_run(
        &run_id,
        seed,
        jobs.len() as u64,
        grid.attack,
        env!("CARGO_PKG_VERSION"),
    )?;

    println!("Batch simulation");
    println!("  run_id:   {run_id}");
    println!("  started:  {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("  grid:     {grid_path}");
    println!("  jobs:     {} × {} rounds", jobs.len(), grid.num_simulations);
    println!("  db:       {db}");
    println!();

    let runner = BatchRunner::new(config);
    let mut observer = LogObserver::new();
    let cancel = CancelToken::new();
    let report = runner.run(&run_id, &jobs, &store, &mut observer, &cancel)?;

    println!("=== BATCH SUMMARY ===");
    println!("  total jobs:     {}", report.total_jobs);
    println!("  completed:      {}", report.completed_jobs);
    println!("  failed:         {}", report.failed_jobs);
    println!("  rows written:   {}", report.rows_written);
    println!("  elapsed:        {:.1}s", report.elapsed_secs);

    for failure in store.failed_jobs(&run_id)? {
        println!(
            "  FAILED job {}: {} (jurors={}, lambda={})",
            failure.job_index,
            failure.error,
            failure.params.num_jurors,
            failure.params.lambda_qre,
        );
    }

    if let Some(csv_path) = parse_str_arg(args, "--csv") {
        let mut file = fs::File::create(&csv_path)
            .with_context(|| format!("creating {csv_path}"))?;
        let written = store.export_csv(&run_id, &mut file)?;
        println!("  csv export:     {written} rows → {csv_path}");
    }

    Ok(())
}

// ── Historical dispute records ───────────────────────────────────────────────

/// Court JSON export shape: rounds of votes, each vote tagged with
/// `voted` and a binary `choice` ("1" → X, "2" → Y). The final round
/// decides the dispute.
#[derive(serde::Deserialize)]
struct DisputeFile {
    id: Option<serde_json::Value>,
    #[serde(rename = "currentRulling")]
    current_ruling: Option<String>,
    #[serde(default)]
    rounds: Vec<DisputeRound>,
}

#[derive(serde::Deserialize)]
struct DisputeRound {
    #[serde(default)]
    votes: Vec<DisputeVote>,
}

#[derive(serde::Deserialize)]
struct DisputeVote {
    #[serde(default)]
    voted: bool,
    choice: Option<String>,
}

fn run_dispute(path: &str) -> Result<()> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let dispute: DisputeFile =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;

    let Some(final_round) = dispute.rounds.last() else {
        bail!("{path}: dispute has no rounds");
    };

    let votes: Vec<RecordedChoice> = final_round
        .votes
        .iter()
        .map(|v| match (v.voted, v.choice.as_deref()) {
            (true, Some("1")) => RecordedChoice::X,
            (true, Some("2")) => RecordedChoice::Y,
            _ => RecordedChoice::NotVoted,
        })
        .collect();

    let tally = tally_votes(&votes)?;

    let dispute_id = dispute
        .id
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".into());
    let ruling = match dispute.current_ruling.as_deref() {
        Some("2") => "Yes (choice 2)",
        Some("1") => "No (choice 1)",
        _ => "undecided",
    };

    println!("=== DISPUTE {dispute_id} ===");
    println!("  final ruling:  {ruling}");
    println!(
        "  X (choice 1):  {} of {} votes ({:.2}%)",
        tally.x_votes, tally.total_votes, tally.x_percent,
    );
    println!(
        "  Y (choice 2):  {} of {} votes ({:.2}%)",
        tally.y_votes, tally.total_votes, tally.y_percent,
    );
    println!("  majority:      {}", tally.majority.as_str());
    Ok(())
}

// ── Argument helpers ─────────────────────────────────────────────────────────

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
}
