//! Configuration infrastructure
//!
//! Contains configuration loading and management for harvesting runs.
//!
//! Configuration is organized into sections:
//! 1. Scrape settings (listing URL, politeness delays, retries, output)
//! 2. Canonical schema (declared fields, synonyms, document-bound fields)
//! 3. Page selectors and link collection rules
//! 4. Logging

#![allow(clippy::derivable_impls)]

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::fs;
use tracing::info;

use crate::application::attribute_merger::MergePolicy;
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};
use crate::infrastructure::parsing::selectors::{compile_selectors, SectionSelectors};

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub scrape: ScrapeConfig,

    /// How values from different page sections are combined
    #[serde(default)]
    pub merge_policy: MergePolicy,

    pub schema: SchemaConfig,

    #[serde(default)]
    pub selectors: SectionSelectors,

    #[serde(default)]
    pub link_collector: LinkCollectorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for one harvesting run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Listing (search results) page to collect product links from
    pub listing_url: String,

    /// Base URL for resolving relative product links
    pub base_url: String,

    /// Maximum number of product pages to visit
    pub target_count: usize,

    /// Politeness delay window after each document, in milliseconds
    pub request_delay_min_ms: u64,
    pub request_delay_max_ms: u64,

    /// Page load timeout in seconds
    pub page_load_timeout_seconds: u64,

    /// Extra load attempts after a failed one
    pub load_retries: u32,

    /// Flush the record batch to storage every N records
    pub flush_every: usize,

    /// Tabular output file
    pub output_path: PathBuf,

    pub user_agent: String,
    pub accept_language: String,

    /// Upper bound on request rate, on top of the politeness delay
    pub max_requests_per_second: u32,
}

/// Fixed document locations a canonical field can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentLocation {
    Title,
    Image,
    Url,
    Brand,
    Price,
}

/// A canonical field populated straight from the document rather than
/// through synonym matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentField {
    pub field: String,
    pub location: DocumentLocation,
}

/// Ordered `{field_name: [synonym_or_substring, ...]}` table.
///
/// Serialized as a JSON object; declaration order is preserved and is the
/// output column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTable(Vec<(String, Vec<String>)>);

impl FieldTable {
    pub fn new(entries: Vec<(String, Vec<String>)>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[(String, Vec<String>)] {
        &self.0
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FieldTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, synonyms) in &self.0 {
            map.serialize_entry(name, synonyms)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldTableVisitor;

        impl<'de> Visitor<'de> for FieldTableVisitor {
            type Value = FieldTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field name to a list of synonyms")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, synonyms)) = access.next_entry::<String, Vec<String>>()? {
                    entries.push((name, synonyms));
                }
                Ok(FieldTable(entries))
            }
        }

        deserializer.deserialize_map(FieldTableVisitor)
    }
}

/// Canonical output schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Declared fields in output order, each with its raw-key synonyms.
    /// An empty synonym list matches the field's own name. A synonym written
    /// `"=Style"` matches the raw key exactly and never as a substring.
    pub fields: FieldTable,

    /// Fields read from fixed document locations. A value found there
    /// replaces whatever the synonyms resolved.
    #[serde(default)]
    pub document_fields: Vec<DocumentField>,
}

/// Rules for collecting product links from a listing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCollectorConfig {
    pub link_selectors: Vec<String>,

    /// Substring an href must contain to be a product detail link
    pub required_marker: String,

    /// Substrings that disqualify an href (sponsored redirects)
    pub excluded_markers: Vec<String>,

    /// Drop the query string before resolving
    pub strip_query: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Log directory; defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,

    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,

    /// Module-specific log level filters (e.g., "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scrape: ScrapeConfig::default(),
            merge_policy: MergePolicy::default(),
            schema: SchemaConfig::default(),
            selectors: SectionSelectors::default(),
            link_collector: LinkCollectorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            listing_url: marketplace::LISTING_URL.to_string(),
            base_url: marketplace::BASE_URL.to_string(),
            target_count: defaults::TARGET_COUNT,
            request_delay_min_ms: defaults::REQUEST_DELAY_MIN_MS,
            request_delay_max_ms: defaults::REQUEST_DELAY_MAX_MS,
            page_load_timeout_seconds: defaults::PAGE_LOAD_TIMEOUT_SECONDS,
            load_retries: defaults::LOAD_RETRIES,
            flush_every: defaults::FLUSH_EVERY,
            output_path: PathBuf::from(defaults::OUTPUT_FILE),
            user_agent: marketplace::USER_AGENT.to_string(),
            accept_language: marketplace::ACCEPT_LANGUAGE.to_string(),
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        let field = |name: &str, synonyms: &[&str]| {
            (
                name.to_string(),
                synonyms.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            )
        };
        let bind = |name: &str, location| DocumentField {
            field: name.to_string(),
            location,
        };

        Self {
            fields: FieldTable(vec![
                field("Dress name", &[]),
                field("Brand", &["Brand"]),
                field("Price", &["=Price"]),
                field("Gender", &["Department"]),
                field("Fabric Type", &["Material composition", "Fabric"]),
                field("Material Type", &["Material type", "Material"]),
                field("Colour", &["Colour", "Color"]),
                field("Size", &["Size"]),
                field("Pattern", &["Pattern"]),
                field("Sleeve type", &["Sleeve type", "Sleeve"]),
                field("Neck style", &["Neck style", "Neck"]),
                field("Closure type", &["Closure type", "Closure"]),
                field("Bottom style", &["Bottom style"]),
                field("Fit type", &["Fit type"]),
                field("Length", &["Length"]),
                field("Occasion", &["Occasion"]),
                field("Style", &["=Style", "Style name"]),
                field("Theme", &["Theme"]),
                field("Care instructions", &["Care instructions", "Care"]),
                field("Age range description", &["Age range description", "Age range"]),
                field("About", &["About"]),
                field("Image link", &[]),
                field("URL", &[]),
            ]),
            document_fields: vec![
                bind("Dress name", DocumentLocation::Title),
                bind("Brand", DocumentLocation::Brand),
                bind("Price", DocumentLocation::Price),
                bind("Image link", DocumentLocation::Image),
                bind("URL", DocumentLocation::Url),
            ],
        }
    }
}

impl Default for LinkCollectorConfig {
    fn default() -> Self {
        Self {
            link_selectors: vec!["a.a-link-normal.s-no-outline".to_string()],
            required_marker: "/dp/".to_string(),
            excluded_markers: vec!["aax".to_string()],
            strip_query: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters.insert("selectors".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

impl AppConfig {
    /// Check everything that would otherwise fail per document. Any error
    /// here aborts startup.
    pub fn validate(&self) -> HarvestResult<()> {
        self.schema.validate()?;
        self.selectors.compile()?;
        compile_selectors(&self.link_collector.link_selectors)?;

        let scrape = &self.scrape;
        if scrape.request_delay_min_ms > scrape.request_delay_max_ms {
            return Err(HarvestError::configuration(
                "scrape.request_delay_min_ms",
                format!(
                    "minimum delay {}ms exceeds maximum {}ms",
                    scrape.request_delay_min_ms, scrape.request_delay_max_ms
                ),
            ));
        }
        if scrape.flush_every == 0 {
            return Err(HarvestError::configuration(
                "scrape.flush_every",
                "must be greater than 0",
            ));
        }
        if scrape.target_count == 0 {
            return Err(HarvestError::configuration(
                "scrape.target_count",
                "must be greater than 0",
            ));
        }
        if scrape.max_requests_per_second == 0 {
            return Err(HarvestError::configuration(
                "scrape.max_requests_per_second",
                "must be greater than 0",
            ));
        }
        if scrape.page_load_timeout_seconds == 0 {
            return Err(HarvestError::configuration(
                "scrape.page_load_timeout_seconds",
                "must be greater than 0",
            ));
        }
        if self.link_collector.required_marker.is_empty() {
            return Err(HarvestError::configuration(
                "link_collector.required_marker",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

impl SchemaConfig {
    pub fn declared_fields(&self) -> Vec<String> {
        self.fields.field_names().map(str::to_string).collect()
    }

    pub fn validate(&self) -> HarvestResult<()> {
        if self.fields.is_empty() {
            return Err(HarvestError::configuration(
                "schema.fields",
                "no canonical fields declared",
            ));
        }

        let mut seen = HashSet::new();
        for (name, synonyms) in self.fields.entries() {
            if name.trim().is_empty() {
                return Err(HarvestError::configuration(
                    "schema.fields",
                    "field names must not be empty",
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(HarvestError::configuration(
                    "schema.fields",
                    format!("field '{name}' declared more than once"),
                ));
            }
            if synonyms
                .iter()
                .any(|s| s.strip_prefix('=').unwrap_or(s).trim().is_empty())
            {
                return Err(HarvestError::configuration(
                    "schema.fields",
                    format!("field '{name}' has an empty synonym"),
                ));
            }
        }

        let mut bound = HashSet::new();
        for binding in &self.document_fields {
            if !seen.contains(binding.field.as_str()) {
                return Err(HarvestError::configuration(
                    "schema.document_fields",
                    format!("'{}' is not a declared field", binding.field),
                ));
            }
            if !bound.insert(binding.field.as_str()) {
                return Err(HarvestError::configuration(
                    "schema.document_fields",
                    format!("'{}' is bound more than once", binding.field),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Configuration manager for the default per-user location
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Ok(Self {
            config_path: config_dir.join(defaults::CONFIG_FILE_NAME),
        })
    }

    /// Configuration manager for an explicit file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// Load configuration from file, writing the defaults if it doesn't exist.
    /// A file that exists but does not parse or validate is an error.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("Failed to read configuration file {:?}", self.config_path))?;

        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Malformed configuration file {:?}", self.config_path))?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", self.config_path))?;

        info!("Loaded configuration from: {:?}", self.config_path);
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Reset configuration to defaults (useful for troubleshooting)
    pub async fn reset_to_defaults(&self) -> Result<AppConfig> {
        info!("Resetting configuration to defaults");
        let default_config = AppConfig::default();
        self.save_config(&default_config).await?;
        Ok(default_config)
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Marketplace the default selectors and listing target
pub mod marketplace {
    /// Base URL for resolving product links
    pub const BASE_URL: &str = "https://www.amazon.in";

    /// Default listing page (search results)
    pub const LISTING_URL: &str = "https://www.amazon.in/s?k=ethnic+dresses+for+kids+girls&page=1";

    pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    pub const ACCEPT_LANGUAGE: &str = "en-IN,en;q=0.9";
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "catalog-harvest";

    pub const CONFIG_FILE_NAME: &str = "config.json";

    /// Default number of product pages per run
    pub const TARGET_COUNT: usize = 10;

    /// Politeness delay window in milliseconds
    pub const REQUEST_DELAY_MIN_MS: u64 = 2000;
    pub const REQUEST_DELAY_MAX_MS: u64 = 4000;

    pub const PAGE_LOAD_TIMEOUT_SECONDS: u64 = 30;

    /// One retry after a failed load, then the link is skipped
    pub const LOAD_RETRIES: u32 = 1;

    /// Pause before retrying a failed load
    pub const RETRY_BACKOFF_MS: u64 = 1000;

    pub const FLUSH_EVERY: usize = 25;

    pub const OUTPUT_FILE: &str = "product_attributes.csv";

    pub const MAX_REQUESTS_PER_SECOND: u32 = 1;

    // Log configuration defaults
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_FILE_NAME: &str = "catalog-harvest.log";
    pub const LOG_MAX_FILES: u32 = 5;
    pub const LOG_AUTO_CLEANUP: bool = true;
}
