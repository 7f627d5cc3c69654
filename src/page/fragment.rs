//! Offline reads over captured HTML, shared by the page backends.
//!
//! Backends capture each card's outer HTML when candidates are enumerated;
//! field reads then run against that capture instead of the live DOM.

use scraper::{ElementRef, Html, Selector};

use super::PageError;

fn selector(css: &str) -> Result<Selector, PageError> {
    Selector::parse(css).map_err(|e| PageError::read(css, format!("invalid selector: {e:?}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// `(id attribute, outer html)` for every element matching `card_selector`.
pub fn cards(document: &str, card_selector: &str) -> Result<Vec<(Option<String>, String)>, PageError> {
    let sel = selector(card_selector)?;
    let doc = Html::parse_document(document);
    Ok(doc
        .select(&sel)
        .map(|el| (el.value().attr("id").map(str::to_string), el.html()))
        .collect())
}

pub fn first_text(fragment: &str, css: &str) -> Result<Option<String>, PageError> {
    let sel = selector(css)?;
    let doc = Html::parse_fragment(fragment);
    let text = doc.select(&sel).next().map(element_text);
    Ok(text)
}

pub fn facets(
    fragment: &str,
    item_css: &str,
    label_css: &str,
) -> Result<Vec<(String, String)>, PageError> {
    let item_sel = selector(item_css)?;
    let label_sel = selector(label_css)?;
    let doc = Html::parse_fragment(fragment);

    let mut out = Vec::new();
    for item in doc.select(&item_sel) {
        let label = item
            .select(&label_sel)
            .next()
            .map(element_text)
            .ok_or_else(|| PageError::read(label_css, "facet item without label"))?;
        out.push((label, element_text(item)));
    }
    Ok(out)
}

/// Inner HTML of the first element matching `css` in a full document.
pub fn script_body(document: &str, css: &str) -> Result<Option<String>, PageError> {
    let sel = selector(css)?;
    let doc = Html::parse_document(document);
    let body = doc.select(&sel).next().map(|el| el.inner_html());
    Ok(body)
}
