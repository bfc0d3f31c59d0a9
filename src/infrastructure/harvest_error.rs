//! Error types for document loading, extraction, persistence and configuration
//!
//! Extraction-level errors (`ElementNotFound`, `SectionAbsent`) are recovered
//! locally by the extractor that raised them. Load and persistence errors are
//! recovered by the run loop. Only configuration errors abort a run, and they
//! are raised at startup.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum HarvestError {
    #[error("Element '{selector}' not found while reading {field}")]
    ElementNotFound { field: String, selector: String },

    #[error("Section '{section}' absent from document")]
    SectionAbsent {
        section: String,
        tried_selectors: Vec<String>,
    },

    #[error("Document load failed after {attempts} attempt(s): {url} - {reason}")]
    DocumentLoadFailed {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Document load timed out after {timeout_seconds}s: {url}")]
    LoadTimeout { url: String, timeout_seconds: u64 },

    #[error("HTTP request failed: {status} - {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Existing record file unusable: {path} - {reason}")]
    PersistenceConflict { path: String, reason: String },

    #[error("Record persistence failed: {path} - {reason}")]
    Persistence { path: String, reason: String },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed { url: String, reason: String },

    #[error("Configuration error in '{field}': {message}")]
    Configuration { field: String, message: String },

    #[error("Run cancelled")]
    Cancelled,
}

impl HarvestError {
    pub fn element_not_found(field: &str, selector: &str) -> Self {
        Self::ElementNotFound {
            field: field.to_string(),
            selector: selector.to_string(),
        }
    }

    pub fn section_absent(section: &str, tried_selectors: Vec<String>) -> Self {
        Self::SectionAbsent {
            section: section.to_string(),
            tried_selectors,
        }
    }

    pub fn load_failed(url: &str, attempts: u32, reason: impl ToString) -> Self {
        Self::DocumentLoadFailed {
            url: url.to_string(),
            attempts,
            reason: reason.to_string(),
        }
    }

    pub fn persistence_conflict(path: impl ToString, reason: impl ToString) -> Self {
        Self::PersistenceConflict {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(path: impl ToString, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn configuration(field: &str, message: impl ToString) -> Self {
        Self::Configuration {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether the run can continue past this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ElementNotFound { .. } => true,
            Self::SectionAbsent { .. } => true,
            Self::DocumentLoadFailed { .. } => true,
            Self::LoadTimeout { .. } => true,
            Self::HttpStatus { .. } => true,
            Self::PersistenceConflict { .. } => true,
            Self::UrlResolutionFailed { .. } => true,
            Self::Persistence { .. } => false,
            Self::InvalidSelector { .. } => false,
            Self::Configuration { .. } => false,
            Self::Cancelled => false,
        }
    }

    /// Whether a second load attempt is worth making.
    pub fn is_retryable_load(&self) -> bool {
        match self {
            Self::LoadTimeout { .. } | Self::DocumentLoadFailed { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type HarvestResult<T> = Result<T, HarvestError>;
