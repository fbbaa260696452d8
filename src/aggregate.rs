use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// What a worker reports back for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub persisted: usize,
    /// The sink call itself failed; `persisted` is zero and nothing is a duplicate.
    pub sink_failed: bool,
}

impl BatchOutcome {
    pub fn written(attempted: usize, persisted: usize) -> Self {
        Self {
            attempted,
            persisted,
            sink_failed: false,
        }
    }

    pub fn lost(attempted: usize) -> Self {
        Self {
            attempted,
            persisted: 0,
            sink_failed: true,
        }
    }

    /// Rows the sink declined in a successful call.
    pub fn declined(&self) -> usize {
        if self.sink_failed {
            0
        } else {
            self.attempted.saturating_sub(self.persisted)
        }
    }
}

/// Final counts of an ingest run.
///
/// `duplicate` is an estimate: it counts every row the sink declined in a
/// successful call, whatever the reason. Rows from batches whose sink call
/// failed are counted in `lost` only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    #[serde(rename = "records_added")]
    pub added: usize,
    #[serde(rename = "records_failed")]
    pub failed: usize,
    #[serde(rename = "records_skipped")]
    pub skipped: usize,
    #[serde(rename = "duplicate_email_count")]
    pub duplicate: usize,
    #[serde(rename = "records_lost")]
    pub lost: usize,
    pub rows_read: usize,
    #[serde(rename = "records_accepted")]
    pub accepted: usize,
    pub batches: usize,
}

/// Folds batch outcomes into running totals. Every field is a plain sum, so
/// the result does not depend on the order outcomes arrive in.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Aggregator {
    added: usize,
    duplicate: usize,
    lost: usize,
    batches: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: BatchOutcome) {
        self.batches += 1;
        self.added += outcome.persisted;
        self.duplicate += outcome.declined();
        if outcome.sink_failed {
            self.lost += outcome.attempted;
        }
    }

    /// Consume outcomes until every sender has been dropped.
    pub async fn drain(mut self, mut outcomes: mpsc::Receiver<BatchOutcome>) -> Self {
        while let Some(outcome) = outcomes.recv().await {
            self.record(outcome);
            debug!(
                result_num = self.batches,
                attempted = outcome.attempted,
                persisted = outcome.persisted,
                sink_failed = outcome.sink_failed,
                "outcome folded"
            );
        }
        self
    }

    /// Outcomes folded so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Combine with the producer's row counts.
    pub fn finish(self, tally: RowTally) -> Summary {
        Summary {
            added: self.added,
            failed: tally.failed,
            skipped: tally.skipped,
            duplicate: self.duplicate,
            lost: self.lost,
            rows_read: tally.rows_read,
            accepted: tally.accepted,
            batches: self.batches,
        }
    }
}

/// Row classification counts kept by the producer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RowTally {
    pub rows_read: usize,
    pub accepted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub batches_sent: usize,
}
