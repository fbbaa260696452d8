use crate::record::UserRecord;

/// A non-empty, size-bounded group of records written to the sink together.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<UserRecord>,
}

impl Batch {
    pub fn records(&self) -> &[UserRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<UserRecord> {
        self.records
    }
}

/// Groups records into batches of at most `max_size`, preserving arrival order.
#[derive(Debug)]
pub struct Batcher {
    max_size: usize,
    pending: Vec<UserRecord>,
}

impl Batcher {
    /// `max_size` must be at least one; zero is treated as one.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            pending: Vec::with_capacity(max_size),
        }
    }

    /// Add a record, returning a full batch once `max_size` records are pending.
    pub fn push(&mut self, record: UserRecord) -> Option<Batch> {
        self.pending.push(record);
        if self.pending.len() >= self.max_size {
            let records = std::mem::replace(&mut self.pending, Vec::with_capacity(self.max_size));
            Some(Batch { records })
        } else {
            None
        }
    }

    /// Flush whatever is left as a final partial batch. Returns `None` when nothing is pending.
    pub fn finish(self) -> Option<Batch> {
        (!self.pending.is_empty()).then_some(Batch {
            records: self.pending,
        })
    }

    /// Lazily batch an iterator of records.
    pub fn batches<I>(records: I, max_size: usize) -> Batches<I::IntoIter>
    where
        I: IntoIterator<Item = UserRecord>,
    {
        Batches {
            inner: records.into_iter(),
            batcher: Some(Batcher::new(max_size)),
        }
    }
}

/// Iterator returned by [`Batcher::batches`].
pub struct Batches<I> {
    inner: I,
    batcher: Option<Batcher>,
}

impl<I> Iterator for Batches<I>
where
    I: Iterator<Item = UserRecord>,
{
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let batcher = self.batcher.as_mut()?;
        for record in self.inner.by_ref() {
            if let Some(batch) = batcher.push(record) {
                return Some(batch);
            }
        }
        self.batcher.take().and_then(Batcher::finish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(n: u128) -> UserRecord {
        UserRecord {
            id: Uuid::from_u128(n),
            name: format!("user {n}"),
            email: format!("user{n}@example.com"),
            monthly_income: 0.0,
            credit_score: 0,
            employment_status: String::new(),
            age: 0,
        }
    }

    #[test]
    fn splits_250_into_100_100_50_in_order() {
        let batches: Vec<Batch> = Batcher::batches((0..250).map(user), 100).collect();
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);

        let ids: Vec<u128> = batches
            .iter()
            .flat_map(|b| b.records().iter().map(|r| r.id.as_u128()))
            .collect();
        assert_eq!(ids, (0..250).collect::<Vec<_>>());
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert_eq!(Batcher::batches(std::iter::empty(), 100).count(), 0);
        assert!(Batcher::new(100).finish().is_none());
    }

    #[test]
    fn exact_multiple_has_no_trailing_batch() {
        let sizes: Vec<usize> = Batcher::batches((0..200).map(user), 100)
            .map(|b| b.len())
            .collect();
        assert_eq!(sizes, vec![100, 100]);
    }

    #[test]
    fn push_emits_on_the_boundary() {
        let mut batcher = Batcher::new(2);
        assert!(batcher.push(user(1)).is_none());
        let full = batcher.push(user(2)).unwrap();
        assert_eq!(full.len(), 2);
        assert!(batcher.push(user(3)).is_none());
        assert_eq!(batcher.finish().map(|b| b.len()), Some(1));
    }
}
