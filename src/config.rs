use crate::{IngestError, IngestResult};

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Enough room for every in-flight batch of a typical upload without stalling the producer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Pipeline tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub workers: usize,
    pub batch_size: usize,
    /// Capacity of both the intake and the outcome queue.
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.workers == 0 {
            return Err(IngestError::InvalidConfig("workers must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(IngestError::InvalidConfig("batch size must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(IngestError::InvalidConfig("queue capacity must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!((cfg.workers, cfg.batch_size, cfg.queue_capacity), (5, 100, 100));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_knobs() {
        let base = PipelineConfig::default();
        assert!(base.with_workers(0).validate().is_err());
        assert!(base.with_batch_size(0).validate().is_err());
        assert!(matches!(
            base.with_queue_capacity(0).validate(),
            Err(IngestError::InvalidConfig(_))
        ));
    }
}
