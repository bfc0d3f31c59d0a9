//! Tabular persistence for record batches
//!
//! One header row of field names, then one row per record. All values are
//! strings. Ragged rows are padded with empty values on load. File work runs
//! on tokio's blocking pool.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, info};

use crate::domain::RecordBatch;
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};

/// Persistence collaborator for `RecordBatch`es
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load the persisted batch. `Ok(None)` when nothing has been written
    /// yet; `PersistenceConflict` when the stored data cannot be read.
    async fn load(&self) -> HarvestResult<Option<RecordBatch>>;

    /// Replace the persisted batch.
    async fn save(&self, batch: &RecordBatch) -> HarvestResult<()>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}

/// CSV file store
#[derive(Debug, Clone)]
pub struct CsvRecordStore {
    path: PathBuf,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conflict(&self, reason: impl ToString) -> HarvestError {
        HarvestError::persistence_conflict(self.path.display(), reason)
    }

    fn failure(&self, reason: impl ToString) -> HarvestError {
        HarvestError::persistence(self.path.display(), reason)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read_batch(&self) -> HarvestResult<Option<RecordBatch>> {
        if !self.path.exists() {
            debug!("No existing record file at {:?}", self.path);
            return Ok(None);
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| self.conflict(e))?;

        let header: Vec<String> = reader
            .headers()
            .map_err(|e| self.conflict(e))?
            .iter()
            .map(str::to_string)
            .collect();

        if header.iter().all(|h| h.is_empty()) {
            return Err(self.conflict("missing header row"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = header.iter().find(|h| !seen.insert(h.as_str())) {
            return Err(self.conflict(format!("duplicate column '{dup}'")));
        }

        let rows = reader
            .records()
            .map(|row| {
                row.map(|record| record.iter().map(str::to_string).collect::<Vec<_>>())
                    .map_err(|e| self.conflict(e))
            })
            .collect::<HarvestResult<Vec<_>>>()?;

        debug!("Loaded {} records from {:?}", rows.len(), self.path);
        Ok(Some(RecordBatch::from_rows(header, rows)))
    }

    fn write_batch(&self, batch: &RecordBatch) -> HarvestResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.failure(e))?;
            }
        }

        let temp_path = self.temp_path();
        {
            let mut writer = WriterBuilder::new()
                .has_headers(false)
                .from_path(&temp_path)
                .map_err(|e| self.failure(e))?;

            writer.write_record(batch.header()).map_err(|e| self.failure(e))?;
            for row in batch.rows() {
                writer.write_record(&row).map_err(|e| self.failure(e))?;
            }
            writer.flush().map_err(|e| self.failure(e))?;
        }
        fs::rename(&temp_path, &self.path).map_err(|e| self.failure(e))?;

        info!("Saved {} records to {:?}", batch.len(), self.path);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for CsvRecordStore {
    async fn load(&self) -> HarvestResult<Option<RecordBatch>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.read_batch())
            .await
            .map_err(|e| self.conflict(e))?
    }

    async fn save(&self, batch: &RecordBatch) -> HarvestResult<()> {
        let store = self.clone();
        let batch = batch.clone();
        tokio::task::spawn_blocking(move || store.write_batch(&batch))
            .await
            .map_err(|e| self.failure(e))?
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CanonicalRecord;

    fn record(fields: &[(&str, &str)]) -> CanonicalRecord {
        let names: Vec<&str> = fields.iter().map(|(n, _)| *n).collect();
        let mut record = CanonicalRecord::empty(&names);
        for (name, value) in fields {
            record.set(name, *value);
        }
        record
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvRecordStore::new(dir.path().join("out.csv"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_reproduces_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvRecordStore::new(dir.path().join("nested").join("out.csv"));

        let mut batch = RecordBatch::new(vec!["Dress name".into(), "Colour".into(), "About".into()]);
        batch.push(record(&[
            ("Dress name", "Girls Kurta, Cotton"),
            ("Colour", "Red"),
            ("About", "Soft \"breathable\" fabric | Machine wash"),
        ]));
        batch.push(record(&[("Dress name", "Lehenga"), ("Colour", ""), ("About", "")]));
        store.save(&batch).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, batch);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn ragged_rows_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "Dress name,Colour,Size\nKurta,Red\nFrock,Blue,4-5Y\n").unwrap();

        let loaded = CsvRecordStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.records()[0].get("Size"), Some(""));
        assert_eq!(loaded.records()[1].get("Size"), Some("4-5Y"));
    }

    #[tokio::test]
    async fn unreadable_file_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, b"Dress name,Colour\n\xff\xfe,\xc3\x28\n").unwrap();
        assert!(matches!(
            CsvRecordStore::new(&path).load().await,
            Err(HarvestError::PersistenceConflict { .. })
        ));

        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            CsvRecordStore::new(&path).load().await,
            Err(HarvestError::PersistenceConflict { .. })
        ));
    }
}
