//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database. During a batch the
//! coordinator thread is the sole writer, so a single connection is
//! enough and no locking happens here.
//!
//! batch_row is append-only: one transaction per arriving chunk. The
//! CSV export projects the rows into the fixed column order consumed
//! by the external analysis layer.

use std::io::Write;

use rusqlite::{params, Connection};

use crate::batch::{BatchResultRow, FailedJob};
use crate::error::SimResult;
use crate::params::PayoffType;
use crate::types::JobIndex;

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    /// Open (or create) the batch database at `path`.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Batch run ──────────────────────────────────────────────

    pub fn insert_batch_run(
        &self,
        run_id: &str,
        master_seed: u64,
        total_jobs: u64,
        attack: bool,
        version: &str,
    ) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO batch_run (run_id, master_seed, total_jobs, attack, version, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                master_seed as i64,
                total_jobs as i64,
                attack,
                version,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn batch_run_attack(&self, run_id: &str) -> SimResult<bool> {
        let attack = self.conn.query_row(
            "SELECT attack FROM batch_run WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(attack)
    }

    // ── Result rows ────────────────────────────────────────────

    /// Append one chunk's rows in a single transaction.
    pub fn append_rows(&self, run_id: &str, rows: &[BatchResultRow]) -> SimResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO batch_row (
                    run_id, job_index, round, num_jurors, lambda_qre,
                    base_reward, deposit, noise, x_guess_noise, payoff_type,
                    x_votes, y_votes, avg_payoff_x, avg_payoff_y,
                    x_votes_no_attack, y_votes_no_attack
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            )?;
            for row in rows {
                stmt.execute(params![
                    run_id,
                    row.job_index as i64,
                    row.round as i64,
                    row.num_jurors,
                    row.lambda_qre,
                    row.base_reward,
                    row.deposit,
                    row.noise,
                    row.x_guess_noise,
                    row.payoff_type.as_str(),
                    row.x_votes,
                    row.y_votes,
                    row.avg_payoff_x,
                    row.avg_payoff_y,
                    row.x_votes_no_attack,
                    row.y_votes_no_attack,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn row_count(&self, run_id: &str) -> SimResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM batch_row WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    pub fn row_count_for_job(&self, run_id: &str, job_index: JobIndex) -> SimResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM batch_row WHERE run_id = ?1 AND job_index = ?2",
            params![run_id, job_index as i64],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// All rows for a run, ordered by (job_index, round). Chunks may
    /// have arrived in any order; this restores the canonical order.
    pub fn rows_for_run(&self, run_id: &str) -> SimResult<Vec<BatchResultRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT job_index, round, num_jurors, lambda_qre, base_reward,
                    deposit, noise, x_guess_noise, payoff_type, x_votes,
                    y_votes, avg_payoff_x, avg_payoff_y,
                    x_votes_no_attack, y_votes_no_attack
             FROM batch_row WHERE run_id = ?1
             ORDER BY job_index, round",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                let payoff_type: String = row.get(8)?;
                Ok(BatchResultRow {
                    job_index: row.get::<_, i64>(0)? as u64,
                    round: row.get::<_, i64>(1)? as u64,
                    num_jurors: row.get(2)?,
                    lambda_qre: row.get(3)?,
                    base_reward: row.get(4)?,
                    deposit: row.get(5)?,
                    noise: row.get(6)?,
                    x_guess_noise: row.get(7)?,
                    payoff_type: PayoffType::parse(&payoff_type)
                        .unwrap_or(PayoffType::Basic),
                    x_votes: row.get(9)?,
                    y_votes: row.get(10)?,
                    avg_payoff_x: row.get(11)?,
                    avg_payoff_y: row.get(12)?,
                    x_votes_no_attack: row.get(13)?,
                    y_votes_no_attack: row.get(14)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Failed jobs ────────────────────────────────────────────

    pub fn record_failed_job(&self, run_id: &str, failure: &FailedJob) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO failed_job (run_id, job_index, params, error)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id,
                failure.job_index as i64,
                serde_json::to_string(&failure.params)?,
                failure.error,
            ],
        )?;
        Ok(())
    }

    pub fn failed_job_count(&self, run_id: &str) -> SimResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM failed_job WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    pub fn failed_jobs(&self, run_id: &str) -> SimResult<Vec<FailedJob>> {
        let mut stmt = self.conn.prepare(
            "SELECT job_index, params, error FROM failed_job
             WHERE run_id = ?1 ORDER BY job_index",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                let job_index: i64 = row.get(0)?;
                let params_json: String = row.get(1)?;
                let error: String = row.get(2)?;
                Ok((job_index, params_json, error))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(job_index, params_json, error)| {
                Ok(FailedJob {
                    job_index: job_index as u64,
                    params: serde_json::from_str(&params_json)?,
                    error,
                })
            })
            .collect::<SimResult<Vec<_>>>()
    }

    // ── CSV export ─────────────────────────────────────────────

    /// Write the run's rows as CSV in the fixed schema order. The
    /// no-attack columns appear only when the run was attacked.
    /// Returns the number of data rows written.
    pub fn export_csv(&self, run_id: &str, out: &mut dyn Write) -> SimResult<u64> {
        let attack = self.batch_run_attack(run_id)?;
        let rows = self.rows_for_run(run_id)?;

        let mut header = String::from(
            "round,num_jurors,lambda_qre,base_reward,deposit,noise,\
             x_guess_noise,payoff_type,x_votes,y_votes,avg_payoff_x,avg_payoff_y",
        );
        if attack {
            header.push_str(",x_votes_no_attack,y_votes_no_attack");
        }
        writeln!(out, "{header}")?;

        let mut written: u64 = 0;
        for row in &rows {
            let mut line = format!(
                "{},{},{},{},{},{},{},{},{},{},{},{}",
                row.round,
                row.num_jurors,
                row.lambda_qre,
                row.base_reward,
                row.deposit,
                row.noise,
                row.x_guess_noise,
                row.payoff_type.as_str(),
                row.x_votes,
                row.y_votes,
                row.avg_payoff_x,
                row.avg_payoff_y,
            );
            if attack {
                line.push_str(&format!(
                    ",{},{}",
                    row.x_votes_no_attack.map_or(String::new(), |v| v.to_string()),
                    row.y_votes_no_attack.map_or(String::new(), |v| v.to_string()),
                ));
            }
            writeln!(out, "{line}")?;
            written += 1;
        }

        log::debug!("exported {written} rows for run {run_id}");
        Ok(written)
    }
}