//! Domain types for product attribute harvesting
//!
//! Plain data: raw attribute maps, parsed products and canonical records.

pub mod attributes;
pub mod product;
pub mod record;

pub use attributes::RawAttributeMap;
pub use product::ParsedProduct;
pub use record::{CanonicalRecord, RecordBatch};
