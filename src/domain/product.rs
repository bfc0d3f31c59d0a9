use serde::{Deserialize, Serialize};

use super::attributes::RawAttributeMap;

/// Everything read from one product detail page in a single extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedProduct {
    pub url: String,
    /// Values read from fixed document locations, keyed by the canonical
    /// field they are bound to (`Dress name`, `Image link`, `URL`, ...).
    pub document_values: RawAttributeMap,
    /// Merged raw attributes from all section extractors.
    pub attributes: RawAttributeMap,
    /// Extractors that found their section on this page, in run order.
    pub sections_found: Vec<String>,
}

impl ParsedProduct {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}
