//! HTML parsing for listing and product detail pages
//!
//! Detail pages are read by several independent section extractors whose
//! results are merged into one raw attribute map. Listing pages only yield
//! product links.

pub mod context;
pub mod product_detail_parser;
pub mod product_list_parser;
pub mod section_extractors;
pub mod selectors;
pub mod text;

pub use context::{DetailParseContext, ListParseContext};
pub use product_detail_parser::ProductDetailParser;
pub use product_list_parser::ProductListParser;
pub use section_extractors::SectionExtractor;
pub use selectors::{CompiledSelectors, SectionSelectors};

use scraper::Html;

use crate::infrastructure::harvest_error::HarvestResult;

/// Parser over an already-parsed document with per-document context
pub trait ContextualParser {
    type Output;
    type Context;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> HarvestResult<Self::Output>;
}
