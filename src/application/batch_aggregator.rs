//! Accumulates canonical records and flushes them to a record store
//!
//! A flush loads whatever the store already holds, appends the pending
//! records after it and writes the union back. Columns only one side knows
//! are kept and backfilled empty on the other side. Stored data that cannot
//! be read is treated as absent.

use tracing::{info, warn};

use crate::domain::{CanonicalRecord, RecordBatch};
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};
use crate::infrastructure::record_store::RecordStore;

pub struct BatchAggregator {
    pending: RecordBatch,
    flush_every: usize,
    flushed_total: usize,
}

impl BatchAggregator {
    pub fn new(header: Vec<String>, flush_every: usize) -> Self {
        Self {
            pending: RecordBatch::new(header),
            flush_every: flush_every.max(1),
            flushed_total: 0,
        }
    }

    /// Queue one record. Returns `true` once enough records are pending to
    /// warrant a flush.
    pub fn push(&mut self, record: CanonicalRecord) -> bool {
        self.pending.push(record);
        self.should_flush()
    }

    pub fn should_flush(&self) -> bool {
        self.pending.len() >= self.flush_every
    }

    pub fn pending(&self) -> &RecordBatch {
        &self.pending
    }

    /// Records written by successful flushes so far
    pub fn flushed_total(&self) -> usize {
        self.flushed_total
    }

    /// Write pending records after the stored batch and clear them. Pending
    /// records are kept if the write fails. Returns the number of records
    /// flushed.
    pub async fn flush(&mut self, store: &dyn RecordStore) -> HarvestResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let mut merged = match store.load().await {
            Ok(Some(existing)) => existing,
            Ok(None) => RecordBatch::new(Vec::new()),
            Err(e @ HarvestError::PersistenceConflict { .. }) => {
                warn!("{}; writing new records without the prior batch", e);
                RecordBatch::new(Vec::new())
            }
            Err(e) => return Err(e),
        };
        let existing = merged.len();
        merged.append(self.pending.clone());

        store.save(&merged).await?;

        let flushed = self.pending.len();
        self.pending.clear();
        self.flushed_total += flushed;
        info!(
            "Flushed {} records to {} ({} previously stored)",
            flushed,
            store.location(),
            existing
        );
        Ok(flushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::record_store::CsvRecordStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn record(fields: &[(&str, &str)]) -> CanonicalRecord {
        let names: Vec<&str> = fields.iter().map(|(n, _)| *n).collect();
        let mut record = CanonicalRecord::empty(&names);
        for (name, value) in fields {
            record.set(name, *value);
        }
        record
    }

    /// Store whose save always fails
    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn load(&self) -> HarvestResult<Option<RecordBatch>> {
            Ok(None)
        }
        async fn save(&self, _: &RecordBatch) -> HarvestResult<()> {
            Err(HarvestError::persistence("memory", "disk full"))
        }
        fn location(&self) -> String {
            "memory".to_string()
        }
    }

    /// Store that reports its contents as corrupt
    struct CorruptStore {
        saved: Mutex<Option<RecordBatch>>,
    }

    #[async_trait]
    impl RecordStore for CorruptStore {
        async fn load(&self) -> HarvestResult<Option<RecordBatch>> {
            Err(HarvestError::persistence_conflict("memory", "garbled"))
        }
        async fn save(&self, batch: &RecordBatch) -> HarvestResult<()> {
            *self.saved.lock().unwrap() = Some(batch.clone());
            Ok(())
        }
        fn location(&self) -> String {
            "memory".to_string()
        }
    }

    #[test]
    fn push_signals_flush_threshold() {
        let mut aggregator = BatchAggregator::new(header(&["Colour"]), 2);
        assert!(!aggregator.push(record(&[("Colour", "Red")])));
        assert!(aggregator.push(record(&[("Colour", "Blue")])));
    }

    #[tokio::test]
    async fn flushes_accumulate_in_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvRecordStore::new(dir.path().join("out.csv"));
        let mut aggregator = BatchAggregator::new(header(&["Dress name", "Colour"]), 10);

        for i in 0..3 {
            let name = format!("Kurta {i}");
            aggregator.push(record(&[("Dress name", name.as_str()), ("Colour", "Red")]));
        }
        assert_eq!(aggregator.flush(&store).await.unwrap(), 3);
        assert!(aggregator.pending().is_empty());

        aggregator.push(record(&[("Dress name", "Frock"), ("Colour", "")]));
        aggregator.push(record(&[("Dress name", "Lehenga"), ("Colour", "Gold")]));
        assert_eq!(aggregator.flush(&store).await.unwrap(), 2);
        assert_eq!(aggregator.flushed_total(), 5);

        let stored = store.load().await.unwrap().unwrap();
        assert_eq!(stored.len(), 5);
        assert_eq!(stored.records()[0].get("Dress name"), Some("Kurta 0"));
        assert_eq!(stored.records()[2].get("Colour"), Some("Red"));
        assert_eq!(stored.records()[4].get("Colour"), Some("Gold"));
    }

    #[tokio::test]
    async fn reconciles_differing_field_sets() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvRecordStore::new(dir.path().join("out.csv"));

        let mut old_run = BatchAggregator::new(header(&["Dress name", "Sleeve type"]), 10);
        old_run.push(record(&[("Dress name", "Kurta"), ("Sleeve type", "Short")]));
        old_run.flush(&store).await.unwrap();

        let mut new_run = BatchAggregator::new(header(&["Dress name", "Gender"]), 10);
        new_run.push(record(&[("Dress name", "Frock"), ("Gender", "Girls")]));
        new_run.flush(&store).await.unwrap();

        let stored = store.load().await.unwrap().unwrap();
        assert_eq!(stored.header(), header(&["Dress name", "Sleeve type", "Gender"]).as_slice());
        assert_eq!(stored.records()[0].get("Gender"), Some(""));
        assert_eq!(stored.records()[0].get("Sleeve type"), Some("Short"));
        assert_eq!(stored.records()[1].get("Sleeve type"), Some(""));
        assert_eq!(stored.records()[1].get("Gender"), Some("Girls"));
    }

    #[tokio::test]
    async fn corrupt_store_is_replaced_by_new_records() {
        let store = CorruptStore {
            saved: Mutex::new(None),
        };
        let mut aggregator = BatchAggregator::new(header(&["Colour"]), 10);
        aggregator.push(record(&[("Colour", "Red")]));
        assert_eq!(aggregator.flush(&store).await.unwrap(), 1);
        assert_eq!(store.saved.lock().unwrap().as_ref().map(RecordBatch::len), Some(1));
    }

    #[tokio::test]
    async fn failed_save_keeps_pending_records() {
        let mut aggregator = BatchAggregator::new(header(&["Colour"]), 10);
        aggregator.push(record(&[("Colour", "Red")]));
        assert!(aggregator.flush(&FailingStore).await.is_err());
        assert_eq!(aggregator.pending().len(), 1);
        assert_eq!(aggregator.flushed_total(), 0);
    }

    #[tokio::test]
    async fn empty_flush_does_not_touch_the_store() {
        let mut aggregator = BatchAggregator::new(header(&["Colour"]), 10);
        assert_eq!(aggregator.flush(&FailingStore).await.unwrap(), 0);
    }
}
