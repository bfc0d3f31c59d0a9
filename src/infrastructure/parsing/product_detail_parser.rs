//! Product detail parser
//!
//! Runs every section extractor against the page, merges their maps under the
//! configured policy and reads the fixed document locations (title, image,
//! brand, price, URL) for the fields bound to them.

use scraper::Html;
use tracing::{debug, trace};

use super::context::DetailParseContext;
use super::section_extractors::{first_text, standard_extractors, SectionExtractor};
use super::selectors::{CompiledSelectors, SectionSelectors};
use super::ContextualParser;
use crate::application::attribute_merger::{AttributeMerger, MergePolicy};
use crate::domain::{ParsedProduct, RawAttributeMap};
use crate::infrastructure::config::{AppConfig, DocumentField, DocumentLocation};
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};

/// Parser for extracting attributes from product detail pages
pub struct ProductDetailParser {
    extractors: Vec<Box<dyn SectionExtractor>>,
    merger: AttributeMerger,
    selectors: CompiledSelectors,
    document_fields: Vec<DocumentField>,
}

impl ProductDetailParser {
    /// Create a parser with custom selector configuration
    pub fn new(
        selectors: &SectionSelectors,
        document_fields: Vec<DocumentField>,
        policy: MergePolicy,
    ) -> HarvestResult<Self> {
        let compiled = selectors.compile()?;
        Ok(Self {
            extractors: standard_extractors(&compiled),
            merger: AttributeMerger::new(policy),
            selectors: compiled,
            document_fields,
        })
    }

    pub fn from_config(config: &AppConfig) -> HarvestResult<Self> {
        Self::new(
            &config.selectors,
            config.schema.document_fields.clone(),
            config.merge_policy,
        )
    }

    /// Names of the extractors in run order
    pub fn extractor_names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Parse raw HTML loaded from `url`.
    pub fn parse_document(&self, html: &str, url: &str) -> HarvestResult<ParsedProduct> {
        let document = Html::parse_document(html);
        self.parse_with_context(&document, &DetailParseContext::new(url))
    }

    fn read_location(
        &self,
        document: &Html,
        field: &str,
        location: DocumentLocation,
        context: &DetailParseContext,
    ) -> HarvestResult<String> {
        match location {
            DocumentLocation::Title => first_text(document, field, &self.selectors.title),
            DocumentLocation::Brand => first_text(document, field, &self.selectors.brand),
            DocumentLocation::Price => first_text(document, field, &self.selectors.price),
            DocumentLocation::Url => Ok(context.url.clone()),
            DocumentLocation::Image => self.image_link(document, field),
        }
    }

    /// First non-empty image attribute, trying the selectors in order.
    fn image_link(&self, document: &Html, field: &str) -> HarvestResult<String> {
        let attribute = self.selectors.image_attribute.as_str();
        self.selectors
            .image
            .iter()
            .flat_map(|named| document.select(&named.selector))
            .filter_map(|element| element.value().attr(attribute))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .ok_or_else(|| {
                let tried = self
                    .selectors
                    .image
                    .iter()
                    .map(|s| format!("{}[{}]", s.source, attribute))
                    .collect::<Vec<_>>()
                    .join(", ");
                HarvestError::element_not_found(field, &tried)
            })
    }
}

impl ContextualParser for ProductDetailParser {
    type Output = ParsedProduct;
    type Context = DetailParseContext;

    fn parse_with_context(
        &self,
        document: &Html,
        context: &Self::Context,
    ) -> HarvestResult<Self::Output> {
        let mut product = ParsedProduct::new(context.url.clone());

        let mut maps = Vec::with_capacity(self.extractors.len());
        for extractor in &self.extractors {
            let map = extractor.extract(document);
            if !map.is_empty() {
                product.sections_found.push(extractor.name().to_string());
            }
            maps.push(map);
        }
        product.attributes = self.merger.merge(maps);

        let mut document_values = RawAttributeMap::new();
        for binding in &self.document_fields {
            match self.read_location(document, &binding.field, binding.location, context) {
                Ok(value) => {
                    document_values.insert(binding.field.clone(), value);
                }
                Err(e) => trace!("{}", e),
            }
        }
        product.document_values = document_values;

        debug!(
            "Parsed {}: {} raw attributes from sections {:?}",
            context.url,
            product.attributes.len(),
            product.sections_found
        );
        Ok(product)
    }
}
