use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use url::Url;

/// An image discovered on a page, with its absolute URL and the filename
/// it would be stored under.
#[derive(Debug, Clone, Serialize)]
pub struct ImageHit {
    pub url: String,
    pub alt: String,
    pub filename: String,
}

/// A text block extracted from a page, tagged with enough element context
/// to be useful downstream.
#[derive(Debug, Clone, Serialize)]
pub struct TextHit {
    pub id: String,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
    pub element_type: String,
}

/// Evaluates an image selector over a page. Matches that are `img`
/// elements contribute directly; other matches contribute their first
/// descendant `img`. Sources resolve against the page URL.
pub fn extract_images(html: &str, selector: &Selector, base_url: &Url) -> Vec<ImageHit> {
    let document = Html::parse_document(html);
    let mut images = Vec::new();
    for element in document.select(selector) {
        let Some((src, alt)) = image_source(element) else {
            continue;
        };
        let Ok(resolved) = base_url.join(&src) else {
            continue;
        };
        let filename = image_filename(&resolved, images.len());
        images.push(ImageHit {
            url: resolved.to_string(),
            alt,
            filename,
        });
    }
    images
}

fn image_source(element: ElementRef) -> Option<(String, String)> {
    let img = if element.value().name() == "img" {
        element
    } else {
        element
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "img")?
    };
    let src = img.value().attr("src")?;
    if src.is_empty() {
        return None;
    }
    let alt = img.value().attr("alt").unwrap_or_default();
    Some((src.to_string(), alt.to_string()))
}

fn image_filename(url: &Url, ordinal: usize) -> String {
    let name = url.path().rsplit('/').next().unwrap_or_default();
    if name.is_empty() {
        format!("image_{}.jpg", ordinal)
    } else {
        name.to_string()
    }
}

/// Evaluates a text selector over a page. Matches whose text content is
/// empty after trimming are skipped; ids are deterministic across runs.
pub fn extract_text(html: &str, selector: &Selector) -> Vec<TextHit> {
    let document = Html::parse_document(html);
    let mut hits = Vec::new();
    for (index, element) in document.select(selector).enumerate() {
        let text = element.text().collect::<String>();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let attributes: BTreeMap<String, String> = element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        hits.push(TextHit {
            id: format!("text_{}_{}", index, text_fingerprint(text)),
            text: text.to_string(),
            attributes,
            element_type: element.value().name().to_string(),
        });
    }
    hits
}

fn text_fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish() % 10_000
}
