//! Infrastructure layer: configuration, logging, HTML parsing, document
//! retrieval and record persistence

pub mod config;
pub mod document_source;
pub mod harvest_error;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod record_store;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager};
pub use document_source::{DocumentSource, FileDocumentSource};
pub use harvest_error::{HarvestError, HarvestResult};
pub use http_client::{HttpClient, HttpClientConfig};
pub use logging::{get_log_directory, init_logging_with_config};
pub use parsing::{ProductDetailParser, ProductListParser};
pub use record_store::{CsvRecordStore, RecordStore};
