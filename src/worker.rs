use crate::aggregate::BatchOutcome;
use crate::batch::Batch;
use crate::sink::Sink;
use crate::{IngestError, IngestResult};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared receiving end of the intake queue.
pub type Intake = Arc<Mutex<mpsc::Receiver<Batch>>>;

/// A fixed set of worker tasks writing batches to a shared sink.
pub struct WorkerPool {
    handles: Vec<JoinHandle<usize>>,
}

impl WorkerPool {
    /// Spawn `size` workers. Each one owns a clone of `outcomes`, so the
    /// outcome queue closes once the last worker returns.
    pub fn spawn<S: Sink>(
        size: usize,
        sink: Arc<S>,
        intake: Intake,
        outcomes: mpsc::Sender<BatchOutcome>,
        cancel: CancellationToken,
    ) -> Self {
        let handles = (0..size)
            .map(|worker_id| {
                info!(worker_id, "starting worker");
                tokio::spawn(run_worker(
                    worker_id,
                    sink.clone(),
                    intake.clone(),
                    outcomes.clone(),
                    cancel.clone(),
                ))
            })
            .collect();
        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker. Returns the number of batches processed.
    pub async fn join(self) -> IngestResult<usize> {
        let mut processed = 0usize;
        let mut first_err = None;
        for res in futures::future::join_all(self.handles).await {
            match res {
                Ok(n) => processed += n,
                Err(e) => {
                    error!(error = %e, "worker task failed");
                    first_err.get_or_insert(IngestError::Worker(e));
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(processed),
        }
    }
}

async fn run_worker<S: Sink>(
    worker_id: usize,
    sink: Arc<S>,
    intake: Intake,
    outcomes: mpsc::Sender<BatchOutcome>,
    cancel: CancellationToken,
) -> usize {
    let mut batch_num = 0usize;
    loop {
        // Only one worker waits on the receiver at a time; the lock is
        // released before the sink write.
        let next = {
            let mut rx = intake.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                batch = rx.recv() => batch,
            }
        };
        let Some(batch) = next else {
            break;
        };

        batch_num += 1;
        let outcome = write_batch(worker_id, batch_num, sink.as_ref(), &batch).await;
        drop(batch);

        if outcomes.send(outcome).await.is_err() {
            warn!(worker_id, batch_num, "outcome queue closed, stopping worker");
            break;
        }
    }
    info!(worker_id, batches = batch_num, "worker finished");
    batch_num
}

/// Write one batch and turn the result into an outcome. Sink errors stay here.
pub async fn write_batch<S: Sink + ?Sized>(
    worker_id: usize,
    batch_num: usize,
    sink: &S,
    batch: &Batch,
) -> BatchOutcome {
    let attempted = batch.len();
    debug!(worker_id, batch_num, batch_size = attempted, "worker processing batch");

    match sink.bulk_insert(batch.records()).await {
        Ok(persisted) if persisted > attempted => {
            warn!(
                worker_id,
                batch_num,
                persisted,
                attempted,
                "sink reported more rows than submitted, clamping"
            );
            BatchOutcome::written(attempted, attempted)
        }
        Ok(persisted) => {
            debug!(worker_id, batch_num, persisted, attempted, "worker batch completed");
            BatchOutcome::written(attempted, persisted)
        }
        Err(e) => {
            error!(worker_id, batch_num, attempted, error = %e, "worker batch failed");
            BatchOutcome::lost(attempted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batcher;
    use crate::record::UserRecord;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use uuid::Uuid;

    fn batch(n: usize) -> Batch {
        let records = (0..n as u128).map(|i| UserRecord {
            id: Uuid::from_u128(i),
            name: String::new(),
            email: format!("{i}@x.io"),
            monthly_income: 0.0,
            credit_score: 0,
            employment_status: String::new(),
            age: 0,
        });
        Batcher::batches(records, n.max(1)).next().unwrap()
    }

    struct Fixed(Result<usize, &'static str>);

    #[async_trait]
    impl Sink for Fixed {
        async fn bulk_insert(&self, _records: &[UserRecord]) -> Result<usize> {
            match self.0 {
                Ok(n) => Ok(n),
                Err(msg) => bail!(msg),
            }
        }
    }

    #[tokio::test]
    async fn sink_error_loses_whole_batch() {
        let outcome = write_batch(0, 1, &Fixed(Err("connection reset")), &batch(40)).await;
        assert_eq!(outcome, BatchOutcome::lost(40));
        assert_eq!(outcome.declined(), 0);
    }

    #[tokio::test]
    async fn zero_persisted_without_error_is_declined() {
        let outcome = write_batch(0, 1, &Fixed(Ok(0)), &batch(40)).await;
        assert_eq!(outcome, BatchOutcome::written(40, 0));
        assert_eq!(outcome.declined(), 40);
    }

    #[tokio::test]
    async fn overreporting_sink_is_clamped() {
        let outcome = write_batch(0, 1, &Fixed(Ok(500)), &batch(10)).await;
        assert_eq!(outcome, BatchOutcome::written(10, 10));
    }

    #[tokio::test]
    async fn pool_drains_queue_and_closes_outcomes() {
        let (batch_tx, batch_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let pool = WorkerPool::spawn(
            3,
            Arc::new(Fixed(Ok(1))),
            Arc::new(Mutex::new(batch_rx)),
            out_tx,
            CancellationToken::new(),
        );
        assert_eq!(pool.size(), 3);

        for _ in 0..7 {
            batch_tx.send(batch(2)).await.unwrap();
        }
        drop(batch_tx);

        assert_eq!(pool.join().await.unwrap(), 7);
        let mut seen = 0;
        while let Some(outcome) = out_rx.recv().await {
            assert_eq!(outcome, BatchOutcome::written(2, 1));
            seen += 1;
        }
        assert_eq!(seen, 7);
    }
}
