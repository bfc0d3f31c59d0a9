//! Listing page parser: collects product detail links
//!
//! Anchors are filtered by a detail-page marker, sponsored redirects are
//! dropped, query strings stripped, and the result deduplicated in first-seen
//! order up to the target count.

use std::collections::HashSet;

use scraper::Html;
use tracing::{debug, trace, warn};
use url::Url;

use super::context::ListParseContext;
use super::selectors::{compile_selectors, NamedSelector};
use super::ContextualParser;
use crate::infrastructure::config::LinkCollectorConfig;
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};

/// Parser for extracting product links from listing pages
pub struct ProductListParser {
    link_selectors: Vec<NamedSelector>,
    required_marker: String,
    excluded_markers: Vec<String>,
    strip_query: bool,
}

impl ProductListParser {
    pub fn new(config: &LinkCollectorConfig) -> HarvestResult<Self> {
        Ok(Self {
            link_selectors: compile_selectors(&config.link_selectors)?,
            required_marker: config.required_marker.clone(),
            excluded_markers: config.excluded_markers.clone(),
            strip_query: config.strip_query,
        })
    }

    /// Collect links from raw listing HTML.
    pub fn collect_links(&self, html: &str, context: &ListParseContext) -> HarvestResult<Vec<String>> {
        let document = Html::parse_document(html);
        self.parse_with_context(&document, context)
    }

    fn is_product_href(&self, href: &str) -> bool {
        href.contains(&self.required_marker)
            && !self.excluded_markers.iter().any(|marker| href.contains(marker.as_str()))
    }

    fn resolve_url(&self, href: &str, base_url: &str) -> HarvestResult<String> {
        let href = if self.strip_query {
            href.split('?').next().unwrap_or(href)
        } else {
            href
        };

        let base = Url::parse(base_url).map_err(|e| HarvestError::UrlResolutionFailed {
            url: base_url.to_string(),
            reason: format!("Invalid base URL: {}", e),
        })?;

        base.join(href)
            .map(|url| url.to_string())
            .map_err(|e| HarvestError::UrlResolutionFailed {
                url: href.to_string(),
                reason: format!("Failed to join URL: {}", e),
            })
    }
}

impl ContextualParser for ProductListParser {
    type Output = Vec<String>;
    type Context = ListParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> HarvestResult<Self::Output> {
        let mut links = Vec::new();
        let mut seen = HashSet::new();

        'selectors: for named in &self.link_selectors {
            for element in html.select(&named.selector) {
                if links.len() >= context.target_count {
                    break 'selectors;
                }
                let Some(href) = element.value().attr("href") else {
                    continue;
                };
                if !self.is_product_href(href) {
                    trace!("Skipping non-product link {}", href);
                    continue;
                }
                match self.resolve_url(href, &context.base_url) {
                    Ok(url) => {
                        if seen.insert(url.clone()) {
                            links.push(url);
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
            }
        }

        debug!(
            "Collected {} product links (target {})",
            links.len(),
            context.target_count
        );
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <div class="s-result-list">
          <a class="a-link-normal s-no-outline" href="/Girls-Kurta/dp/B0AAA?ref=sr_1_1">one</a>
          <a class="a-link-normal s-no-outline" href="/Girls-Kurta/dp/B0AAA?ref=sr_1_9">dup</a>
          <a class="a-link-normal s-no-outline" href="https://aax-eu.amazon.in/x/c/Qd8/dp/B0ZZZ">ad</a>
          <a class="a-link-normal s-no-outline" href="/gp/help">help</a>
          <a class="a-link-normal s-no-outline" href="https://www.amazon.in/Lehenga/dp/B0BBB">two</a>
          <a class="a-link-normal s-no-outline">no href</a>
          <a class="a-link-normal s-no-outline" href="/Frock/dp/B0CCC/">three</a>
        </div>
    "#;

    fn parser() -> ProductListParser {
        ProductListParser::new(&LinkCollectorConfig::default()).unwrap()
    }

    #[test]
    fn collects_deduplicated_product_links() {
        let links = parser()
            .collect_links(LISTING, &ListParseContext::new("https://www.amazon.in", 10))
            .unwrap();
        assert_eq!(
            links,
            vec![
                "https://www.amazon.in/Girls-Kurta/dp/B0AAA",
                "https://www.amazon.in/Lehenga/dp/B0BBB",
                "https://www.amazon.in/Frock/dp/B0CCC/",
            ]
        );
    }

    #[test]
    fn stops_at_target_count() {
        let links = parser()
            .collect_links(LISTING, &ListParseContext::new("https://www.amazon.in", 2))
            .unwrap();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn empty_listing_yields_no_links() {
        let links = parser()
            .collect_links("<html></html>", &ListParseContext::new("https://www.amazon.in", 5))
            .unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn url_resolution() {
        let parser = parser();
        assert_eq!(
            parser.resolve_url("/dp/123?th=1", "https://www.amazon.in").unwrap(),
            "https://www.amazon.in/dp/123"
        );
        assert_eq!(
            parser.resolve_url("https://other.com/dp/1", "https://www.amazon.in").unwrap(),
            "https://other.com/dp/1"
        );
        assert!(parser.resolve_url("/dp/1", "not a url").is_err());
    }
}
