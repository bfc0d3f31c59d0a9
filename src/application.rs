//! Application layer
//!
//! Merging, schema mapping, batching and the run loop that drives them.

pub mod attribute_merger;
pub mod batch_aggregator;
pub mod harvest_session;
pub mod schema_mapper;

pub use attribute_merger::{AttributeMerger, MergePolicy};
pub use batch_aggregator::BatchAggregator;
pub use harvest_session::{HarvestSession, HarvestSummary};
pub use schema_mapper::{SchemaMapper, SynonymTable};
