use crate::error::{Result, SpiderError};
use scraper::{Html, Selector};

/// One anchor element that survived filtering: a non-empty, non-fragment
/// href plus the element's trimmed text content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorHit {
    pub href: String,
    pub text: String,
}

/// Parses a CSS selector expression, mapping failures into the engine's
/// error type so jobs can reject bad configuration up front.
pub fn parse_selector(expression: &str) -> Result<Selector> {
    Selector::parse(expression)
        .map_err(|e| SpiderError::Selector(format!("{:?}: {}", expression, e)))
}

/// Evaluates a link selector over a fetched page. Elements without an
/// `href`, or whose `href` is a pure in-page fragment, are discarded.
pub fn extract_anchors(html: &str, selector: &Selector) -> Vec<AnchorHit> {
    let document = Html::parse_document(html);
    let mut anchors = Vec::new();
    for element in document.select(selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let text = element.text().collect::<String>();
        anchors.push(AnchorHit {
            href: href.to_string(),
            text: text.trim_matches(['\t', '\r', '\n']).to_string(),
        });
    }
    anchors
}
