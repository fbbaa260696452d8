use crate::record::UserRecord;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Bulk-persistence target for validated records.
///
/// Workers call `bulk_insert` concurrently, so implementations must be safe to
/// share. A call inserts the batch atomically, skips rows that collide with a
/// uniqueness constraint, and returns how many rows were actually persisted.
/// An `Err` means nothing from the batch is assumed to have been written.
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    async fn bulk_insert(&self, records: &[UserRecord]) -> Result<usize>;
}

#[async_trait]
impl<T: Sink + ?Sized> Sink for Arc<T> {
    async fn bulk_insert(&self, records: &[UserRecord]) -> Result<usize> {
        (**self).bulk_insert(records).await
    }
}

/// In-process store with unique `id` and unique `email`.
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<MemoryTable>,
}

#[derive(Debug, Default)]
struct MemoryTable {
    by_email: HashMap<String, UserRecord>,
    ids: HashSet<Uuid>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    // Reads see whatever the last completed insert left behind.
    fn table(&self) -> MutexGuard<'_, MemoryTable> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.table().by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_by_email(&self, email: &str) -> Option<UserRecord> {
        self.table().by_email.get(email).cloned()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn bulk_insert(&self, records: &[UserRecord]) -> Result<usize> {
        let mut table = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?;

        let mut inserted = 0usize;
        for record in records {
            if table.ids.contains(&record.id) || table.by_email.contains_key(&record.email) {
                continue;
            }
            table.ids.insert(record.id);
            table.by_email.insert(record.email.clone(), record.clone());
            inserted += 1;
        }
        Ok(inserted)
    }
}
