//! Merging the maps of all section extractors into one raw attribute map
//!
//! Extractors run in a fixed order, most authoritative first (selected
//! variant widgets, then labelled detail tables, overview and attribute
//! tables, colon bullets, and free-text bullets last). Under the default
//! `FillOnly` policy a key is written only by the first extractor that
//! produces it, so structured sources win and later, broader scans only
//! fill gaps. A key an earlier extractor left empty counts as a gap.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::RawAttributeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// First non-empty writer wins; later maps only fill keys that are
    /// absent or empty.
    #[default]
    FillOnly,
    /// Last writer wins; later maps overwrite earlier values.
    Overwrite,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeMerger {
    policy: MergePolicy,
}

impl AttributeMerger {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Merge maps left to right under the configured policy.
    pub fn merge<I>(&self, maps: I) -> RawAttributeMap
    where
        I: IntoIterator<Item = RawAttributeMap>,
    {
        let mut merged = RawAttributeMap::new();
        for map in maps {
            for (key, value) in map {
                match self.policy {
                    MergePolicy::FillOnly => match merged.get(&key) {
                        Some(existing) if !existing.is_empty() => {
                            trace!("Keeping earlier value for '{}'", key);
                        }
                        _ => {
                            merged.insert(key, value);
                        }
                    },
                    MergePolicy::Overwrite => {
                        merged.insert(key, value);
                    }
                }
            }
        }
        merged
    }
}
