//! Parsing context for listing and detail pages

/// Context for collecting product links from a listing page
#[derive(Debug, Clone)]
pub struct ListParseContext {
    /// Base URL for resolving relative links
    pub base_url: String,

    /// Stop after this many unique links
    pub target_count: usize,
}

impl ListParseContext {
    pub fn new(base_url: impl Into<String>, target_count: usize) -> Self {
        Self {
            base_url: base_url.into(),
            target_count,
        }
    }
}

/// Context for one product detail page
#[derive(Debug, Clone)]
pub struct DetailParseContext {
    /// URL the document was loaded from; bound to the `Url` document location
    pub url: String,
}

impl DetailParseContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}
