//! Parallel batch engine.
//!
//! Jobs are grouped into chunks; worker threads claim chunks from a
//! shared cursor, run every job in their chunk, and send the chunk's
//! rows back over a channel. The coordinator thread is the sole
//! storage writer and the sole observer caller, so neither path needs
//! a lock.
//!
//! RULES:
//!   - Every job runs with its own derived seed. Workers never share
//!     RNG state.
//!   - A failing job (error or panic) is recorded and skipped; the
//!     batch continues. A job contributes either all of its rows or
//!     none — never a partial count.
//!   - Cancellation stops the dispatch of new chunks; chunks already
//!     in flight drain and their rows are still persisted.
//!   - Callers register the run via `SimStore::insert_batch_run`
//!     before calling `BatchRunner::run`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::grid::BatchJob;
use crate::observer::{NoopObserver, ProgressObserver};
use crate::oracle::{OracleModel, SimulationResult};
use crate::params::{PayoffType, SimulationParameters};
use crate::store::SimStore;
use crate::types::{JobIndex, RoundIndex, RunId};

/// One persisted row: a single round of a single job, carrying the
/// job's echoed parameters. The CSV projection of these rows is the
/// durable contract with the analysis layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResultRow {
    pub job_index:     JobIndex,
    pub round:         RoundIndex,
    pub num_jurors:    u32,
    pub lambda_qre:    f64,
    pub base_reward:   f64,
    pub deposit:       f64,
    pub noise:         f64,
    pub x_guess_noise: f64,
    pub payoff_type:   PayoffType,
    pub x_votes:       u32,
    pub y_votes:       u32,
    pub avg_payoff_x:  f64,
    pub avg_payoff_y:  f64,
    pub x_votes_no_attack: Option<u32>,
    pub y_votes_no_attack: Option<u32>,
}

/// Worker-pool sizing. `workers == 0` means auto: one below the
/// host's parallelism, floor 1, leaving headroom for the coordinator.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub workers:    usize,
    pub chunk_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            chunk_size: 4,
        }
    }
}

impl BatchConfig {
    fn effective_workers(&self, chunk_count: usize) -> usize {
        let auto = thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1);
        let requested = if self.workers == 0 { auto } else { self.workers };
        requested.clamp(1, chunk_count.max(1))
    }
}

/// Cooperative cancellation handle. Clone freely across threads;
/// setting it stops dispatch of new chunks.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A job that did not produce rows, with the offending parameter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedJob {
    pub job_index: JobIndex,
    pub params:    SimulationParameters,
    pub error:     String,
}

/// End-of-batch accounting. completed + failed + skipped = total.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id:         RunId,
    pub total_jobs:     u64,
    pub completed_jobs: u64,
    pub failed_jobs:    u64,
    pub rows_written:   u64,
    pub cancelled:      bool,
    pub elapsed_secs:   f64,
}

struct ChunkOutcome {
    chunk_index: usize,
    rows:        Vec<BatchResultRow>,
    failures:    Vec<FailedJob>,
    jobs_ok:     u64,
}

/// A unique identifier for a new batch run.
pub fn new_run_id() -> RunId {
    format!("batch-{}", uuid::Uuid::new_v4())
}

pub struct BatchRunner {
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Run the whole job sequence, appending each completed chunk to
    /// `store` as it arrives. Storage errors abort the batch but leave
    /// the already-written rows intact, with the count reported in the
    /// error.
    pub fn run(
        &self,
        run_id: &str,
        jobs: &[BatchJob],
        store: &SimStore,
        observer: &mut dyn ProgressObserver,
        cancel: &CancelToken,
    ) -> SimResult<BatchReport> {
        if jobs.is_empty() {
            return Err(SimError::EmptyGrid);
        }

        let started = Instant::now();
        let chunk_size = self.config.chunk_size.max(1);
        let chunks: Vec<&[BatchJob]> = jobs.chunks(chunk_size).collect();
        let workers = self.config.effective_workers(chunks.len());
        let cursor = AtomicUsize::new(0);

        log::info!(
            "batch {run_id}: {} jobs in {} chunks across {workers} workers",
            jobs.len(),
            chunks.len(),
        );

        let mut completed_jobs: u64 = 0;
        let mut failed_jobs: u64 = 0;
        let mut rows_written: u64 = 0;

        let outcome: SimResult<()> = thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<ChunkOutcome>();

            for _ in 0..workers {
                let tx = tx.clone();
                let cursor = &cursor;
                let chunks = &chunks;
                let cancel = cancel.clone();
                scope.spawn(move || loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let i = cursor.fetch_add(1, Ordering::SeqCst);
                    if i >= chunks.len() {
                        break;
                    }
                    let outcome = run_chunk(i, chunks[i]);
                    if tx.send(outcome).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            // Coordinator: sole store writer, sole observer caller.
            let mut chunks_done = 0usize;
            for outcome in rx {
                chunks_done += 1;

                if let Err(e) = store.append_rows(run_id, &outcome.rows) {
                    cancel.cancel();
                    return Err(SimError::Persistence {
                        rows_written,
                        source: Box::new(e),
                    });
                }
                rows_written += outcome.rows.len() as u64;
                completed_jobs += outcome.jobs_ok;

                for failure in &outcome.failures {
                    failed_jobs += 1;
                    log::warn!(
                        "batch {run_id}: job {} failed: {} (params: {:?})",
                        failure.job_index,
                        failure.error,
                        failure.params,
                    );
                    store.record_failed_job(run_id, failure)?;
                }

                observer.on_progress(
                    chunks_done as f64 / chunks.len() as f64,
                    &format!(
                        "chunk {}/{} done ({completed_jobs} jobs, {failed_jobs} failed)",
                        outcome.chunk_index + 1,
                        chunks.len(),
                    ),
                );
            }
            Ok(())
        });
        outcome?;

        let cancelled = cancel.is_cancelled();
        let report = BatchReport {
            run_id: run_id.to_string(),
            total_jobs: jobs.len() as u64,
            completed_jobs,
            failed_jobs,
            rows_written,
            cancelled,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };

        log::info!(
            "batch {run_id}: {}/{} jobs completed, {} failed, {} rows in {:.1}s{}",
            report.completed_jobs,
            report.total_jobs,
            report.failed_jobs,
            report.rows_written,
            report.elapsed_secs,
            if cancelled { " (cancelled)" } else { "" },
        );
        Ok(report)
    }
}

fn run_chunk(chunk_index: usize, chunk: &[BatchJob]) -> ChunkOutcome {
    let mut rows = Vec::new();
    let mut failures = Vec::new();
    let mut jobs_ok: u64 = 0;

    for job in chunk {
        match run_job(job) {
            Ok(mut job_rows) => {
                rows.append(&mut job_rows);
                jobs_ok += 1;
            }
            Err(e) => failures.push(FailedJob {
                job_index: job.job_index,
                params: job.params.clone(),
                error: e.to_string(),
            }),
        }
    }

    ChunkOutcome {
        chunk_index,
        rows,
        failures,
        jobs_ok,
    }
}

/// One job, isolated: both error returns and panics are captured so a
/// poisoned parameter set cannot take down the batch.
fn run_job(job: &BatchJob) -> Result<Vec<BatchResultRow>, SimError> {
    let caught = panic::catch_unwind(AssertUnwindSafe(|| -> SimResult<Vec<BatchResultRow>> {
        let oracle = OracleModel::new(job.params.clone(), job.seed)?;
        let result = oracle.run_simulations(job.num_simulations, &mut NoopObserver)?;
        Ok(rows_from_result(job, &result))
    }));

    let reason = match caught {
        Ok(Ok(rows)) => return Ok(rows),
        Ok(Err(e)) => e.to_string(),
        Err(payload) => panic_message(payload),
    };
    Err(SimError::WorkerFailure {
        job_index: job.job_index,
        reason,
    })
}

/// Flatten a finished run into its per-round rows.
pub fn rows_from_result(job: &BatchJob, result: &SimulationResult) -> Vec<BatchResultRow> {
    let p = &job.params;
    (0..result.history_x.len())
        .map(|i| BatchResultRow {
            job_index: job.job_index,
            round: i as RoundIndex,
            num_jurors: p.num_jurors,
            lambda_qre: p.lambda_qre,
            base_reward: p.base_reward,
            deposit: p.deposit,
            noise: p.noise,
            x_guess_noise: p.x_guess_noise,
            payoff_type: p.payoff_type,
            x_votes: result.history_x[i],
            y_votes: result.history_y[i],
            avg_payoff_x: result.avg_payoff_x[i],
            avg_payoff_y: result.avg_payoff_y[i],
            x_votes_no_attack: result.history_x_no_attack.as_ref().map(|h| h[i]),
            y_votes_no_attack: result.history_y_no_attack.as_ref().map(|h| h[i]),
        })
        .collect()
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: <non-string payload>".to_string()
    }
}
