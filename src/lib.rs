//! catalog-harvest - product attribute extraction and normalization
//!
//! Product detail pages are scanned by several independent section extractors,
//! their raw key/value maps merged under a fixed precedence policy and mapped
//! onto a configured canonical schema. Records are batched and appended to a
//! tabular file.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{HarvestSession, HarvestSummary, MergePolicy, SchemaMapper};
pub use domain::{CanonicalRecord, ParsedProduct, RawAttributeMap, RecordBatch};
pub use infrastructure::{AppConfig, ConfigManager, HarvestError, HarvestResult};
