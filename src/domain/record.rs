//! Canonical records and record batches
//!
//! A `CanonicalRecord` always carries every declared field; absent data is an
//! empty string, never a missing key. A `RecordBatch` keeps one header for all
//! of its records and reconciles headers when batches with different field
//! sets are concatenated.

use serde::{Deserialize, Serialize};

/// One normalized product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    fields: Vec<(String, String)>,
}

impl CanonicalRecord {
    /// A record with every given field present and empty.
    pub fn empty<S: AsRef<str>>(field_names: &[S]) -> Self {
        Self {
            fields: field_names
                .iter()
                .map(|name| (name.as_ref().to_string(), String::new()))
                .collect(),
        }
    }

    /// Set a declared field. Undeclared fields are ignored and `false` is returned.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some(slot) => {
                slot.1 = value.into();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Re-shape onto `header`: fields missing here become empty, fields not in
    /// `header` are dropped.
    pub fn project<S: AsRef<str>>(&self, header: &[S]) -> Self {
        let mut projected = Self::empty(header);
        for (name, value) in &self.fields {
            projected.set(name, value.clone());
        }
        projected
    }
}

/// Ordered, append-only sequence of records sharing one header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordBatch {
    header: Vec<String>,
    records: Vec<CanonicalRecord>,
}

impl RecordBatch {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            records: Vec::new(),
        }
    }

    /// Build a batch from tabular rows. Short rows are padded with empty
    /// values, extra cells beyond the header are dropped.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let records = rows
            .into_iter()
            .map(|row| {
                let mut record = CanonicalRecord::empty(&header);
                for (name, value) in header.iter().zip(row) {
                    record.set(name, value);
                }
                record
            })
            .collect();
        Self { header, records }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append one record. Fields the header does not know yet are added to it
    /// and backfilled as empty on every earlier record.
    pub fn push(&mut self, record: CanonicalRecord) {
        let new_fields: Vec<String> = record
            .field_names()
            .filter(|name| !self.header.iter().any(|h| h == name))
            .map(str::to_string)
            .collect();
        self.extend_header(new_fields);
        self.records.push(record.project(&self.header));
    }

    /// Concatenate `other` after `self` (existing-then-new). The resulting
    /// header is `self`'s header followed by any fields only `other` has.
    pub fn append(&mut self, other: Self) {
        let new_fields: Vec<String> = other
            .header
            .iter()
            .filter(|name| !self.header.contains(name))
            .cloned()
            .collect();
        self.extend_header(new_fields);
        for record in other.records {
            self.records.push(record.project(&self.header));
        }
    }

    /// Rows aligned with `header()`, for tabular output.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> {
        self.records.iter().map(|r| r.values().collect())
    }

    /// Drop all records, keep the header.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Move records out, leaving an empty batch with the same header.
    pub fn take(&mut self) -> Self {
        Self {
            header: self.header.clone(),
            records: std::mem::take(&mut self.records),
        }
    }

    fn extend_header(&mut self, new_fields: Vec<String>) {
        if new_fields.is_empty() {
            return;
        }
        self.header.extend(new_fields);
        for record in &mut self.records {
            *record = record.project(&self.header);
        }
    }
}
