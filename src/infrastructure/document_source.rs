//! Document retrieval capability injected into a harvesting run
//!
//! A source is opened before the run and `close()`d when it ends, on every
//! exit path. `HttpClient` fetches live pages; `FileDocumentSource` serves
//! pages saved to disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use url::Url;

use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Load the raw HTML behind `url`.
    async fn fetch(&self, url: &str) -> HarvestResult<String>;

    /// Release whatever the source holds open.
    async fn close(&self) -> HarvestResult<()> {
        Ok(())
    }
}

/// Serves saved HTML pages from a directory.
///
/// `file://` URLs and plain paths are read directly. Any other URL is looked
/// up as `<root>/<file_name_for(url)>`.
#[derive(Debug, Clone)]
pub struct FileDocumentSource {
    root: PathBuf,
}

impl FileDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name a page saved for `url` is expected under: every character
    /// outside `[A-Za-z0-9.-]` becomes `_`, scheme dropped.
    pub fn file_name_for(url: &str) -> String {
        let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
        let mut name: String = without_scheme
            .trim_end_matches('/')
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        if !name.ends_with(".html") {
            name.push_str(".html");
        }
        name
    }

    fn path_for(&self, url: &str) -> HarvestResult<PathBuf> {
        match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "file" => parsed.to_file_path().map_err(|_| {
                HarvestError::UrlResolutionFailed {
                    url: url.to_string(),
                    reason: "not a local file path".to_string(),
                }
            }),
            Ok(_) => Ok(self.root.join(Self::file_name_for(url))),
            Err(_) => Ok(self.root.join(url)),
        }
    }
}

#[async_trait]
impl DocumentSource for FileDocumentSource {
    async fn fetch(&self, url: &str) -> HarvestResult<String> {
        let path = self.path_for(url)?;
        debug!("Reading saved page {:?} for {}", path, url);
        fs::read_to_string(&path)
            .await
            .map_err(|e| HarvestError::load_failed(url, 1, format!("{}: {}", path.display(), e)))
    }
}
