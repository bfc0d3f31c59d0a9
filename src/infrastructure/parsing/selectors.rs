//! CSS selectors for product detail and listing pages
//!
//! Selector strings live in configuration so layout changes on the source
//! site are a config edit. They are compiled once at startup; a selector that
//! does not compile is a configuration error.

use scraper::Selector;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};

/// One variant axis (size, colour, ...) read from a selection widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAxisSelectors {
    /// Raw key emitted for this axis
    pub key: String,
    pub selectors: Vec<String>,
}

/// Selector strings for every section of a product detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSelectors {
    /// Selected-option widgets, one per variant axis
    pub variant_axes: Vec<VariantAxisSelectors>,

    /// Rows pairing a header cell (label) with a data cell (value).
    /// All selectors are scanned: current and legacy layouts coexist.
    pub labelled_rows: Vec<String>,

    /// Rows of the overview table, exactly two data cells each
    pub overview_rows: Vec<String>,

    /// Rows of generic two-column attribute tables (style, materials & care)
    pub attribute_table_rows: Vec<String>,

    /// "Label : value" bullet items
    pub detail_bullets: Vec<String>,

    /// Free-text feature bullets
    pub about_bullets: Vec<String>,

    /// Fixed document locations, first match wins
    pub title: Vec<String>,
    pub image: Vec<String>,
    pub image_attribute: String,
    pub brand: Vec<String>,
    pub price: Vec<String>,
}

impl Default for SectionSelectors {
    fn default() -> Self {
        Self {
            variant_axes: vec![
                VariantAxisSelectors {
                    key: "Size".to_string(),
                    selectors: vec!["#variation_size_name .selection".to_string()],
                },
                VariantAxisSelectors {
                    key: "Colour".to_string(),
                    selectors: vec!["#variation_color_name .selection".to_string()],
                },
            ],
            labelled_rows: vec![
                "#productDetails_techSpec_section_1 tr".to_string(),
                "#productDetails_detailBullets_sections1 tr".to_string(),
            ],
            overview_rows: vec!["#productOverview_feature_div tr".to_string()],
            attribute_table_rows: vec!["table.a-normal tr".to_string()],
            detail_bullets: vec!["#detailBullets_feature_div li".to_string()],
            about_bullets: vec!["#feature-bullets li span".to_string()],
            title: vec!["#productTitle".to_string()],
            image: vec!["#landingImage".to_string(), "#imgTagWrapperId img".to_string()],
            image_attribute: "src".to_string(),
            brand: vec!["#bylineInfo".to_string()],
            price: vec![".a-price .a-offscreen".to_string()],
        }
    }
}

/// A selector together with its source string, kept for log messages.
#[derive(Debug, Clone)]
pub struct NamedSelector {
    pub source: String,
    pub selector: Selector,
}

#[derive(Debug, Clone)]
pub struct CompiledVariantAxis {
    pub key: String,
    pub selectors: Vec<NamedSelector>,
}

/// `SectionSelectors` compiled into `scraper` selectors.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub variant_axes: Vec<CompiledVariantAxis>,
    pub labelled_rows: Vec<NamedSelector>,
    pub overview_rows: Vec<NamedSelector>,
    pub attribute_table_rows: Vec<NamedSelector>,
    pub detail_bullets: Vec<NamedSelector>,
    pub about_bullets: Vec<NamedSelector>,
    pub title: Vec<NamedSelector>,
    pub image: Vec<NamedSelector>,
    pub image_attribute: String,
    pub brand: Vec<NamedSelector>,
    pub price: Vec<NamedSelector>,
}

impl SectionSelectors {
    pub fn compile(&self) -> HarvestResult<CompiledSelectors> {
        let variant_axes = self
            .variant_axes
            .iter()
            .map(|axis| {
                if axis.key.trim().is_empty() {
                    return Err(HarvestError::configuration(
                        "selectors.variant_axes",
                        "variant axis key must not be empty",
                    ));
                }
                Ok(CompiledVariantAxis {
                    key: axis.key.clone(),
                    selectors: compile_selectors(&axis.selectors)?,
                })
            })
            .collect::<HarvestResult<Vec<_>>>()?;

        if self.image_attribute.trim().is_empty() {
            return Err(HarvestError::configuration(
                "selectors.image_attribute",
                "image attribute name must not be empty",
            ));
        }

        Ok(CompiledSelectors {
            variant_axes,
            labelled_rows: compile_selectors(&self.labelled_rows)?,
            overview_rows: compile_selectors(&self.overview_rows)?,
            attribute_table_rows: compile_selectors(&self.attribute_table_rows)?,
            detail_bullets: compile_selectors(&self.detail_bullets)?,
            about_bullets: compile_selectors(&self.about_bullets)?,
            title: compile_selectors(&self.title)?,
            image: compile_selectors(&self.image)?,
            image_attribute: self.image_attribute.clone(),
            brand: compile_selectors(&self.brand)?,
            price: compile_selectors(&self.price)?,
        })
    }
}

/// Compile selector strings. The first string that fails to parse is
/// reported as an error.
pub fn compile_selectors(selector_strings: &[String]) -> HarvestResult<Vec<NamedSelector>> {
    selector_strings
        .iter()
        .map(|source| {
            Selector::parse(source)
                .map(|selector| NamedSelector {
                    source: source.clone(),
                    selector,
                })
                .map_err(|e| {
                    warn!("Failed to compile selector '{}': {}", source, e);
                    HarvestError::invalid_selector(source, e)
                })
        })
        .collect()
}

/// Selectors that are not configurable: structural parts of a row.
pub mod structural {
    use once_cell::sync::Lazy;
    use scraper::Selector;

    pub static HEADER_CELL: Lazy<Selector> =
        Lazy::new(|| Selector::parse("th").expect("static selector"));
    pub static DATA_CELL: Lazy<Selector> =
        Lazy::new(|| Selector::parse("td").expect("static selector"));
    pub static ANY_CELL: Lazy<Selector> =
        Lazy::new(|| Selector::parse("th, td").expect("static selector"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selectors_compile() {
        let compiled = SectionSelectors::default().compile().unwrap();
        assert_eq!(compiled.labelled_rows.len(), 2);
        assert_eq!(compiled.variant_axes.len(), 2);
        assert_eq!(compiled.image_attribute, "src");
    }

    #[test]
    fn invalid_selector_is_reported() {
        let selectors = SectionSelectors {
            overview_rows: vec!["tr[".to_string()],
            ..SectionSelectors::default()
        };
        match selectors.compile() {
            Err(HarvestError::InvalidSelector { selector, .. }) => assert_eq!(selector, "tr["),
            other => panic!("expected invalid selector, got {other:?}"),
        }
    }
}
