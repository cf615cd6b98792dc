//! Text and title extraction from raw HTML.
//!
//! Used once at `Page` construction; pages carry the derived values from
//! then on.

use scraper::{Html, Selector};

/// Longest extracted text we keep; anything past this adds nothing to an
/// embedding and inflates provider costs.
const MAX_TEXT_LENGTH: usize = 32_000;

/// Extractions shorter than this are treated as empty (error pages,
/// placeholder bodies) and replaced by the URL itself.
const MIN_TEXT_LENGTH: usize = 10;

/// Elements stripped before text extraction.
const BOILERPLATE_SELECTORS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript",
];

/// Extract clean text from a page, falling back to the URL when the page
/// yields too little.
pub fn extract_text(html: &str, url: &str) -> String {
    if html.trim().is_empty() {
        return url.to_string();
    }

    let document = Html::parse_document(&strip_boilerplate(html));

    let root_html = select_main_content(&document);
    let fragment = Html::parse_fragment(&root_html);

    let text = fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    let mut text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.len() > MAX_TEXT_LENGTH {
        let mut cut = MAX_TEXT_LENGTH;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }

    if text.len() < MIN_TEXT_LENGTH {
        return url.to_string();
    }

    text
}

/// Extract the page title: `<title>` first, then the first `<h1>`, else
/// empty.
pub fn extract_title(html: &str) -> String {
    let document = Html::parse_document(html);

    if let Ok(selector) = Selector::parse("title") {
        if let Some(el) = document.select(&selector).next() {
            let title = el.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                return title;
            }
        }
    }

    if let Ok(selector) = Selector::parse("h1") {
        if let Some(el) = document.select(&selector).next() {
            return el
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    String::new()
}

/// Prefer a main content region; fall back to body, then the whole
/// document.
fn select_main_content(document: &Html) -> String {
    for selector_str in ["main", "article", "body"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(el) = document.select(&selector).next() {
                return el.html();
            }
        }
    }
    document.root_element().html()
}

/// Remove boilerplate elements from the HTML string.
fn strip_boilerplate(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut result = html.to_string();

    for selector_str in BOILERPLATE_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                let element_html = element.html();
                result = result.replace(&element_html, "");
            }
        }
    }

    result
}
