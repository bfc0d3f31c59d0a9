//! Mapping raw attribute maps onto the canonical field set
//!
//! Every declared field is resolved independently:
//! 1. a raw key equal to one of its patterns (case-sensitive),
//! 2. a raw key equal to one of its patterns ignoring case,
//! 3. for each substring pattern in declared order, the first raw key (in
//!    map order) containing it, ignoring case,
//! 4. otherwise the empty string.
//!
//! A pattern written with a leading `=` (`"=Style"`) only takes part in the
//! exact steps. Raw entries with empty values are skipped at every step.
//!
//! Document-bound fields (title, image, URL, ...) resolve like any other
//! field; a non-empty value read from the document replaces the match.

use std::collections::HashSet;

use tracing::trace;

use crate::domain::{CanonicalRecord, ParsedProduct, RawAttributeMap};
use crate::infrastructure::config::SchemaConfig;

/// Marks a pattern as exact-only
pub const EXACT_PREFIX: char = '=';

/// Canonical field name to raw-key patterns, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymTable {
    entries: Vec<SynonymEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SynonymEntry {
    field: String,
    patterns: Vec<Pattern>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pattern {
    text: String,
    /// Lowercased `text` for the case-insensitive steps
    folded: String,
    exact_only: bool,
}

impl Pattern {
    fn parse(raw: &str) -> Self {
        let (text, exact_only) = match raw.strip_prefix(EXACT_PREFIX) {
            Some(rest) => (rest.to_string(), true),
            None => (raw.to_string(), false),
        };
        Self {
            folded: text.to_lowercase(),
            text,
            exact_only,
        }
    }
}

impl SynonymTable {
    /// Build a table from `(field, patterns)` pairs. A field declared with no
    /// patterns matches its own name.
    pub fn new<F, P>(entries: impl IntoIterator<Item = (F, Vec<P>)>) -> Self
    where
        F: Into<String>,
        P: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(field, patterns)| {
                let field = field.into();
                let mut patterns: Vec<Pattern> = patterns
                    .into_iter()
                    .map(|p| Pattern::parse(&p.into()))
                    .collect();
                if patterns.is_empty() {
                    patterns.push(Pattern::parse(&field));
                }
                SynonymEntry { field, patterns }
            })
            .collect();
        Self { entries }
    }

    pub fn from_config(schema: &SchemaConfig) -> Self {
        Self::new(
            schema
                .fields
                .entries()
                .iter()
                .map(|(field, synonyms)| (field.clone(), synonyms.clone())),
        )
    }

    pub fn field_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.field.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn resolve<'a>(&self, entry: &SynonymEntry, raw: &'a RawAttributeMap) -> Option<&'a str> {
        if let Some(value) = entry
            .patterns
            .iter()
            .find_map(|p| raw.get(&p.text).filter(|v| !v.is_empty()))
        {
            return Some(value);
        }

        let folded_keys: Vec<(String, &str)> = raw
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.to_lowercase(), value))
            .collect();

        if let Some((_, value)) = folded_keys
            .iter()
            .find(|(key, _)| entry.patterns.iter().any(|p| p.folded == *key))
        {
            return Some(value);
        }

        entry
            .patterns
            .iter()
            .filter(|p| !p.exact_only)
            .find_map(|pattern| {
                folded_keys
                    .iter()
                    .find(|(key, _)| key.contains(pattern.folded.as_str()))
                    .map(|(_, value)| *value)
            })
    }
}

/// Translates extraction output into `CanonicalRecord`s.
#[derive(Debug, Clone)]
pub struct SchemaMapper {
    table: SynonymTable,
    field_names: Vec<String>,
    document_fields: HashSet<String>,
}

impl SchemaMapper {
    pub fn new(table: SynonymTable, document_fields: impl IntoIterator<Item = String>) -> Self {
        let field_names = table.field_names();
        Self {
            table,
            field_names,
            document_fields: document_fields.into_iter().collect(),
        }
    }

    pub fn from_config(schema: &SchemaConfig) -> Self {
        Self::new(
            SynonymTable::from_config(schema),
            schema.document_fields.iter().map(|binding| binding.field.clone()),
        )
    }

    /// Declared field set in output order
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Resolve every declared field from `raw`.
    pub fn map_attributes(&self, raw: &RawAttributeMap) -> CanonicalRecord {
        let mut record = CanonicalRecord::empty(&self.field_names);
        for entry in &self.table.entries {
            if let Some(value) = self.table.resolve(entry, raw) {
                trace!("Resolved '{}' from raw attributes", entry.field);
                record.set(&entry.field, value);
            }
        }
        record
    }

    /// Full mapping for one parsed page: synonym-resolved fields, with
    /// document-bound fields replaced by the value found in the document.
    pub fn map_product(&self, product: &ParsedProduct) -> CanonicalRecord {
        let mut record = self.map_attributes(&product.attributes);
        for (field, value) in product.document_values.iter() {
            if self.document_fields.contains(field) && !value.is_empty() {
                record.set(field, value);
            }
        }
        record
    }
}
