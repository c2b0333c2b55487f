use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid parameter {name}={value}: {constraint}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        constraint: &'static str,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job {job_index} failed: {reason}")]
    WorkerFailure { job_index: u64, reason: String },

    #[error("Persistence failure after {rows_written} rows already written: {source}")]
    Persistence {
        rows_written: u64,
        #[source]
        source: Box<SimError>,
    },

    #[error("Parameter grid expands to zero jobs")]
    EmptyGrid,

    #[error("Dispute record contains no countable votes")]
    EmptyDispute,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
