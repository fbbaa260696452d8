use crate::aggregate::{Aggregator, RowTally, Summary};
use crate::batch::{Batch, Batcher};
use crate::config::PipelineConfig;
use crate::record::{check_header, parse_row};
use crate::sink::Sink;
use crate::worker::WorkerPool;
use crate::{IngestError, IngestResult};
use csv_async::{AsyncReader, AsyncReaderBuilder, ByteRecord};
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Coordinator states, in the order a run moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ParsingBatching,
    Draining,
    Aggregating,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Idle => "idle",
            Stage::ParsingBatching => "parsing+batching",
            Stage::Draining => "draining",
            Stage::Aggregating => "aggregating",
            Stage::Done => "done",
        })
    }
}

/// One-shot ingest run: CSV rows in, [`Summary`] out.
///
/// The producer (parsing and batching) runs on the caller's task while
/// `config.workers` spawned tasks write batches to the sink. `run` consumes
/// the pipeline.
pub struct Pipeline<S> {
    config: PipelineConfig,
    sink: Arc<S>,
    cancel: CancellationToken,
}

impl<S: Sink> Pipeline<S> {
    pub fn new(sink: S) -> Self {
        Self {
            config: PipelineConfig::default(),
            sink: Arc::new(sink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Stop early when `token` is cancelled. A cancelled run returns
    /// [`IngestError::Cancelled`] instead of a summary.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Ingest every data row of `reader`. The first row is a header and is skipped.
    pub async fn run<R>(self, reader: R) -> IngestResult<Summary>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.config.validate()?;
        debug!(stage = %Stage::Idle, "opening source");

        let mut rdr = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .buffer_capacity(1 << 20) // 1 MiB
            .create_reader(reader);

        check_header(rdr.byte_headers().await?).map_err(IngestError::MissingHeader)?;

        let PipelineConfig {
            workers,
            batch_size,
            queue_capacity,
        } = self.config;
        info!(
            stage = %Stage::ParsingBatching,
            workers,
            batch_size,
            queue_capacity,
            "starting ingest"
        );

        let (intake_tx, intake_rx) = mpsc::channel::<Batch>(queue_capacity);
        let (outcome_tx, outcome_rx) = mpsc::channel(queue_capacity);

        // Workers hold the only outcome senders, so the aggregator sees the
        // queue close right after the last worker returns.
        let pool = WorkerPool::spawn(
            workers,
            self.sink.clone(),
            Arc::new(Mutex::new(intake_rx)),
            outcome_tx,
            self.cancel.clone(),
        );
        let aggregator = tokio::spawn(Aggregator::new().drain(outcome_rx));

        let produced = self.produce(&mut rdr, intake_tx).await;

        info!(stage = %Stage::Draining, "intake queue closed, waiting for workers");
        let joined = pool.join().await;

        info!(stage = %Stage::Aggregating, "all workers finished, collecting outcomes");
        let aggregated = aggregator.await;

        let processed = joined?;
        let aggregator = aggregated?;
        let tally = produced?;
        // Workers only stop short of the sent batches when cancelled.
        if aggregator.batches() < tally.batches_sent {
            return Err(IngestError::Cancelled);
        }

        let summary = aggregator.finish(tally);
        info!(
            stage = %Stage::Done,
            batches = processed,
            rows_read = summary.rows_read,
            added = summary.added,
            failed = summary.failed,
            skipped = summary.skipped,
            duplicate = summary.duplicate,
            lost = summary.lost,
            "ingest finished"
        );
        Ok(summary)
    }

    /// Read, parse and batch every row, pushing batches onto `intake`.
    /// Dropping `intake` on return is what tells the workers to stop.
    async fn produce<R>(
        &self,
        rdr: &mut AsyncReader<R>,
        intake: mpsc::Sender<Batch>,
    ) -> IngestResult<RowTally>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut tally = RowTally::default();
        let mut batcher = Batcher::new(self.config.batch_size);
        let mut record = ByteRecord::new();

        loop {
            if self.cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }

            match rdr.read_byte_record(&mut record).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) if matches!(e.kind(), csv_async::ErrorKind::Io(_)) => {
                    return Err(e.into());
                }
                Err(e) => {
                    tally.rows_read += 1;
                    tally.failed += 1;
                    warn!(row_num = tally.rows_read, error = %e, "error reading CSV row");
                    continue;
                }
            }
            tally.rows_read += 1;

            match parse_row(&record) {
                Ok(user) => {
                    tally.accepted += 1;
                    if let Some(batch) = batcher.push(user) {
                        tally.batches_sent += 1;
                        debug!(
                            batch_num = tally.batches_sent,
                            batch_size = batch.len(),
                            rows_read = tally.rows_read,
                            "sending batch"
                        );
                        self.send(&intake, batch).await?;
                    }
                }
                Err(rejection) if rejection.is_malformed() => {
                    tally.failed += 1;
                    debug!(row_num = tally.rows_read, %rejection, "row failed");
                }
                Err(rejection) => {
                    tally.skipped += 1;
                    debug!(row_num = tally.rows_read, %rejection, "row skipped");
                }
            }
        }

        if let Some(batch) = batcher.finish() {
            tally.batches_sent += 1;
            debug!(
                batch_num = tally.batches_sent,
                batch_size = batch.len(),
                "sending final batch"
            );
            self.send(&intake, batch).await?;
        }

        info!(
            rows_read = tally.rows_read,
            accepted = tally.accepted,
            failed = tally.failed,
            skipped = tally.skipped,
            batches_sent = tally.batches_sent,
            "reached end of source"
        );
        Ok(tally)
    }

    /// Blocks while the intake queue is full.
    async fn send(&self, intake: &mpsc::Sender<Batch>, batch: Batch) -> IngestResult<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(IngestError::Cancelled),
            res = intake.send(batch) => res.map_err(|_| IngestError::WorkersGone),
        }
    }
}
