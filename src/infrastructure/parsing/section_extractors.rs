//! Section extractors
//!
//! Each extractor scans a document for one structural pattern and returns
//! the key/value pairs it found. A missing section yields an empty map and a
//! missing element inside a section drops only that pair; nothing here
//! returns an error to the caller.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

use super::selectors::{structural, CompiledSelectors, CompiledVariantAxis, NamedSelector};
use super::text::{element_text, flatten_text, split_first_colon};
use crate::domain::RawAttributeMap;
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};

/// Raw key under which the joined feature bullets are stored.
pub const ABOUT_KEY: &str = "About";

/// Separator between joined feature bullets.
pub const ABOUT_SEPARATOR: &str = " | ";

/// Looks for one page-structure pattern.
pub trait SectionExtractor: Send + Sync {
    /// Stable name used in logs and in `ParsedProduct::sections_found`
    fn name(&self) -> &'static str;

    fn extract(&self, document: &Html) -> RawAttributeMap;
}

/// The shipped extractors, in merge order: most authoritative first,
/// free-text aggregation last.
pub fn standard_extractors(selectors: &CompiledSelectors) -> Vec<Box<dyn SectionExtractor>> {
    vec![
        Box::new(VariantSelectionExtractor::new(selectors.variant_axes.clone())),
        Box::new(LabelledRowsExtractor::new(selectors.labelled_rows.clone())),
        Box::new(TwoColumnRowsExtractor::overview(selectors.overview_rows.clone())),
        Box::new(TwoColumnRowsExtractor::attribute_tables(
            selectors.attribute_table_rows.clone(),
        )),
        Box::new(ColonBulletsExtractor::new(selectors.detail_bullets.clone())),
        Box::new(AboutExtractor::new(selectors.about_bullets.clone())),
    ]
}

/// All elements matched by any of the selectors, selector order first.
fn select_all<'a>(document: &'a Html, selectors: &'a [NamedSelector]) -> Vec<ElementRef<'a>> {
    selectors
        .iter()
        .flat_map(|named| document.select(&named.selector))
        .collect()
}

fn log_section_absent(section: &str, selectors: &[NamedSelector]) {
    let err = HarvestError::section_absent(
        section,
        selectors.iter().map(|s| s.source.clone()).collect(),
    );
    debug!("{}", err);
}

/// Text of the first element matched by the selectors, first selector first.
pub(crate) fn first_text(
    document: &Html,
    field: &str,
    selectors: &[NamedSelector],
) -> HarvestResult<String> {
    selectors
        .iter()
        .filter_map(|named| document.select(&named.selector).next())
        .map(|element| element_text(&element))
        .find(|text| !text.is_empty())
        .ok_or_else(|| {
            let tried = selectors
                .iter()
                .map(|s| s.source.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            HarvestError::element_not_found(field, &tried)
        })
}

/// Currently-selected option of each variant widget (size, colour).
pub struct VariantSelectionExtractor {
    axes: Vec<CompiledVariantAxis>,
}

impl VariantSelectionExtractor {
    pub fn new(axes: Vec<CompiledVariantAxis>) -> Self {
        Self { axes }
    }
}

impl SectionExtractor for VariantSelectionExtractor {
    fn name(&self) -> &'static str {
        "variations"
    }

    fn extract(&self, document: &Html) -> RawAttributeMap {
        let mut data = RawAttributeMap::new();
        for axis in &self.axes {
            match first_text(document, &axis.key, &axis.selectors) {
                Ok(value) => {
                    data.insert(axis.key.clone(), value);
                }
                Err(e) => trace!("{}", e),
            }
        }
        data
    }
}

/// Rows that pair a header cell (label) with a data cell (value).
pub struct LabelledRowsExtractor {
    rows: Vec<NamedSelector>,
}

impl LabelledRowsExtractor {
    pub fn new(rows: Vec<NamedSelector>) -> Self {
        Self { rows }
    }
}

impl SectionExtractor for LabelledRowsExtractor {
    fn name(&self) -> &'static str {
        "product_details"
    }

    fn extract(&self, document: &Html) -> RawAttributeMap {
        let mut data = RawAttributeMap::new();
        let rows = select_all(document, &self.rows);
        if rows.is_empty() {
            log_section_absent(self.name(), &self.rows);
            return data;
        }

        for row in rows {
            let label = row.select(&structural::HEADER_CELL).next();
            let value = row.select(&structural::DATA_CELL).next();
            let (Some(label), Some(value)) = (label, value) else {
                continue;
            };
            let key = element_text(&label);
            if !key.is_empty() {
                data.insert(key, element_text(&value));
            }
        }
        data
    }
}

/// Rows with exactly two cells: first is the key, second the value.
pub struct TwoColumnRowsExtractor {
    name: &'static str,
    rows: Vec<NamedSelector>,
    cells: &'static Selector,
    require_value: bool,
}

impl TwoColumnRowsExtractor {
    /// Overview table: two `td` cells, empty values kept.
    pub fn overview(rows: Vec<NamedSelector>) -> Self {
        Self {
            name: "product_overview",
            rows,
            cells: &structural::DATA_CELL,
            require_value: false,
        }
    }

    /// Generic attribute tables: any two `th`/`td` cells, both non-empty.
    pub fn attribute_tables(rows: Vec<NamedSelector>) -> Self {
        Self {
            name: "attribute_tables",
            rows,
            cells: &structural::ANY_CELL,
            require_value: true,
        }
    }
}

impl SectionExtractor for TwoColumnRowsExtractor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extract(&self, document: &Html) -> RawAttributeMap {
        let mut data = RawAttributeMap::new();
        let rows = select_all(document, &self.rows);
        if rows.is_empty() {
            log_section_absent(self.name, &self.rows);
            return data;
        }

        for row in rows {
            let cells: Vec<_> = row.select(self.cells).collect();
            if cells.len() != 2 {
                continue;
            }
            let key = element_text(&cells[0]);
            let value = element_text(&cells[1]);
            if key.is_empty() || (self.require_value && value.is_empty()) {
                continue;
            }
            data.insert(key, value);
        }
        data
    }
}

/// "Label : value" list items. Items without a colon are skipped.
pub struct ColonBulletsExtractor {
    items: Vec<NamedSelector>,
}

impl ColonBulletsExtractor {
    pub fn new(items: Vec<NamedSelector>) -> Self {
        Self { items }
    }
}

impl SectionExtractor for ColonBulletsExtractor {
    fn name(&self) -> &'static str {
        "detail_bullets"
    }

    fn extract(&self, document: &Html) -> RawAttributeMap {
        let mut data = RawAttributeMap::new();
        let items = select_all(document, &self.items);
        if items.is_empty() {
            log_section_absent(self.name(), &self.items);
            return data;
        }

        for item in items {
            if let Some((key, value)) = split_first_colon(&flatten_text(&item)) {
                data.insert(key, value);
            }
        }
        data
    }
}

/// Free-text feature bullets: joined under `ABOUT_KEY`, and each bullet
/// re-parsed for an embedded "Label: value" pair.
pub struct AboutExtractor {
    bullets: Vec<NamedSelector>,
}

impl AboutExtractor {
    pub fn new(bullets: Vec<NamedSelector>) -> Self {
        Self { bullets }
    }
}

impl SectionExtractor for AboutExtractor {
    fn name(&self) -> &'static str {
        "about"
    }

    fn extract(&self, document: &Html) -> RawAttributeMap {
        let mut data = RawAttributeMap::new();
        let texts: Vec<String> = select_all(document, &self.bullets)
            .iter()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
        if texts.is_empty() {
            log_section_absent(self.name(), &self.bullets);
            return data;
        }

        data.insert(ABOUT_KEY, texts.join(ABOUT_SEPARATOR));
        for text in &texts {
            if let Some((key, value)) = split_first_colon(text) {
                data.insert_if_absent(key, value);
            }
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::parsing::selectors::SectionSelectors;

    fn compiled() -> CompiledSelectors {
        SectionSelectors::default().compile().unwrap()
    }

    fn run(extractor: &dyn SectionExtractor, html: &str) -> RawAttributeMap {
        extractor.extract(&Html::parse_document(html))
    }

    #[test]
    fn every_extractor_tolerates_an_empty_page() {
        let document = Html::parse_document("<html><body><p>nothing here</p></body></html>");
        for extractor in standard_extractors(&compiled()) {
            assert!(
                extractor.extract(&document).is_empty(),
                "{} produced data from an empty page",
                extractor.name()
            );
        }
    }

    #[test]
    fn variations_read_selected_options() {
        let s = compiled();
        let html = r#"
            <div id="variation_size_name"><span class="selection">
                4-5 Years
            </span></div>
            <div id="variation_color_name"><span class="selection"></span></div>"#;
        let data = run(&VariantSelectionExtractor::new(s.variant_axes), html);
        assert_eq!(data.get("Size"), Some("4-5 Years"));
        // empty widget text omits the pair
        assert!(!data.contains_key("Colour"));
    }

    #[test]
    fn labelled_rows_scan_both_layouts() {
        let s = compiled();
        let html = r#"
            <table id="productDetails_techSpec_section_1">
                <tr><th> Material type </th><td>Cotton</td></tr>
                <tr><td>orphan cell</td></tr>
            </table>
            <table id="productDetails_detailBullets_sections1">
                <tr><th>Department</th><td>&lrm;Girls</td></tr>
            </table>"#;
        let data = run(&LabelledRowsExtractor::new(s.labelled_rows), html);
        assert_eq!(data.len(), 2);
        assert_eq!(data.get("Material type"), Some("Cotton"));
        assert_eq!(data.get("Department"), Some("Girls"));
    }

    #[test]
    fn overview_requires_exactly_two_cells() {
        let s = compiled();
        let html = r#"
            <div id="productOverview_feature_div"><table>
                <tr><td>Colour</td><td>Pink</td></tr>
                <tr><td>Pattern</td><td></td></tr>
                <tr><td>a</td><td>b</td><td>c</td></tr>
            </table></div>"#;
        let data = run(&TwoColumnRowsExtractor::overview(s.overview_rows), html);
        assert_eq!(data.get("Colour"), Some("Pink"));
        assert_eq!(data.get("Pattern"), Some(""));
        assert!(!data.contains_key("a"));
    }

    #[test]
    fn attribute_tables_skip_empty_values() {
        let s = compiled();
        let html = r#"
            <table class="a-normal">
                <tr><th>Sleeve type</th><td>Short Sleeve</td></tr>
                <tr><td>Neck style</td><td> </td></tr>
            </table>"#;
        let data = run(&TwoColumnRowsExtractor::attribute_tables(s.attribute_table_rows), html);
        assert_eq!(data.get("Sleeve type"), Some("Short Sleeve"));
        assert!(!data.contains_key("Neck style"));
    }

    #[test]
    fn detail_bullets_split_on_first_colon() {
        let s = compiled();
        let html = "
            <div id=\"detailBullets_feature_div\"><ul>
                <li><span><span>Department \u{200F}:\u{200E}</span><span>Girls</span></span></li>
                <li><span>Date First Available : 3 May 2023</span></li>
                <li><span>Best seller in kidswear</span></li>
            </ul></div>";
        let data = run(&ColonBulletsExtractor::new(s.detail_bullets), html);
        assert_eq!(data.get("Department"), Some("Girls"));
        assert_eq!(data.get("Date First Available"), Some("3 May 2023"));
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn about_joins_and_recovers_embedded_pairs() {
        let s = compiled();
        let html = r#"
            <div id="feature-bullets"><ul>
                <li><span>Outer Material: Cotton Blend</span></li>
                <li><span>Soft and breathable</span></li>
                <li><span>  </span></li>
            </ul></div>"#;
        let data = run(&AboutExtractor::new(s.about_bullets), html);
        assert_eq!(
            data.get(ABOUT_KEY),
            Some("Outer Material: Cotton Blend | Soft and breathable")
        );
        assert_eq!(data.get("Outer Material"), Some("Cotton Blend"));
    }
}
