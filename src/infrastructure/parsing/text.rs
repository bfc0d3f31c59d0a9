//! Text cleanup applied to every key and value read from markup

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

/// Bidi marks and embedding/isolate controls that marketplaces sprinkle
/// around labels ("Department ‏ : ‎ Girls").
const DIRECTIONAL_MARKS: &[char] = &[
    '\u{200E}', '\u{200F}', '\u{061C}', '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}',
    '\u{202E}', '\u{2066}', '\u{2067}', '\u{2068}', '\u{2069}',
];

static LINE_BREAK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\r\n]+\s*").expect("static regex"));

/// Remove directional marks, collapse line breaks (and the whitespace around
/// them) to a single space, trim.
pub fn clean_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let stripped: String = raw.chars().filter(|c| !DIRECTIONAL_MARKS.contains(c)).collect();
    LINE_BREAK_RUN.replace_all(&stripped, " ").trim().to_string()
}

pub fn clean_optional(raw: Option<&str>) -> String {
    raw.map(clean_text).unwrap_or_default()
}

/// Concatenated text of an element, cleaned.
pub fn element_text(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Text nodes of an element cleaned one by one and joined with single
/// spaces, empty nodes skipped.
pub fn flatten_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split on the first colon only. Both sides are cleaned; an empty key
/// yields `None`.
pub fn split_first_colon(text: &str) -> Option<(String, String)> {
    let (key, value) = text.split_once(':')?;
    let key = clean_text(key);
    if key.is_empty() {
        return None;
    }
    Some((key, clean_text(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use scraper::{Html, Selector};

    #[test]
    fn strips_marks_and_newlines() {
        assert_eq!(clean_text("\u{200F}  Cotton\n  Blend \u{200E}"), "Cotton Blend");
        assert_eq!(clean_text("a\r\n\r\nb"), "a b");
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_optional(None), "");
    }

    #[test]
    fn inner_spaces_without_newline_survive() {
        assert_eq!(clean_text("100%  Cotton"), "100%  Cotton");
    }

    #[test]
    fn first_colon_split() {
        assert_eq!(
            split_first_colon("Outer Material: Cotton Blend"),
            Some(("Outer Material".to_string(), "Cotton Blend".to_string()))
        );
        assert_eq!(
            split_first_colon("Date First Available : 12 Jan 2024: restock"),
            Some(("Date First Available".to_string(), "12 Jan 2024: restock".to_string()))
        );
        assert_eq!(split_first_colon("Soft and breathable"), None);
        assert_eq!(split_first_colon(": orphan"), None);
    }

    #[test]
    fn amazon_style_bullet_flattens() {
        let html = Html::parse_fragment(
            "<li><span><span class=\"a-text-bold\">Department\n\u{200F}\n:\n\u{200E}\n</span><span>Girls</span></span></li>",
        );
        let li = html.select(&Selector::parse("li").unwrap()).next().unwrap();
        let flat = flatten_text(&li);
        assert_eq!(flat, "Department : Girls");
        assert_eq!(
            split_first_colon(&flat),
            Some(("Department".to_string(), "Girls".to_string()))
        );
    }

    proptest! {
        #[test]
        fn cleaning_is_idempotent(raw in any::<String>()) {
            let once = clean_text(&raw);
            prop_assert_eq!(clean_text(&once), once.clone());
            prop_assert!(!once.contains('\n'));
            prop_assert!(!once.contains('\u{200F}'), "right-to-left mark kept in {:?}", once);
        }
    }
}
