//! Concurrent batch ingestion of user CSV files.
//!
//! - Rows are parsed and validated one at a time, grouped into fixed-size
//!   batches and handed to a bounded pool of workers that bulk-insert them
//!   through a [`Sink`].
//! - Per-batch outcomes are folded into a [`Summary`] of added, failed,
//!   skipped and duplicate counts. Row and batch errors become counts; only a
//!   broken source aborts a run.
//!
//! Data shape:
//! - Input: header row, then `id,name,email,monthly_income,credit_score,employment_status,age`
//! - Output: `Summary { added, failed, skipped, duplicate, .. }`
#![cfg_attr(docsrs, feature(doc_cfg))]
//
mod aggregate;
mod batch;
mod config;
mod io;
mod pipeline;
mod record;
mod sink;
mod worker;

pub use crate::aggregate::{Aggregator, BatchOutcome, RowTally, Summary};
pub use crate::batch::{Batch, Batcher, Batches};
pub use crate::config::{
    PipelineConfig, DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS,
};
pub use crate::io::{open_source, source_from_path, Compression};
pub use crate::pipeline::{Pipeline, Stage};
pub use crate::record::{
    check_header, column, parse_row, Rejection, UserRecord, COLUMN_COUNT, HEADER,
};
pub use crate::sink::{MemorySink, Sink};
pub use crate::worker::{write_batch, Intake, WorkerPool};

use thiserror::Error;

/// Errors that abort a whole run. Row and batch problems never surface here.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source has no header row: {0}")]
    MissingHeader(String),
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("ingest cancelled")]
    Cancelled,
    #[error("all workers exited before the intake queue was drained")]
    WorkersGone,
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv_async::Error),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
