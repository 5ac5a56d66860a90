use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Deserialize;
use std::sync::LazyLock;

/// Inline event handlers dropped from every element.
const EVENT_HANDLER_ATTRS: &[&str] = &[
    "onclick", "onload", "onunload", "onchange", "onsubmit", "onfocus", "onblur",
];

static MANY_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());
static TRAILING_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +\n").unwrap());
static INTER_TAG_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Serialization mode for cleaned documents. Exactly one is active per
/// call: `Pretty` keeps the newline structure of the source text, `Compact`
/// additionally squeezes inter-tag whitespace down to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Pretty,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Drop script, style and stylesheet-link elements.
    pub strip_assets: bool,
    pub mode: OutputMode,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            strip_assets: true,
            mode: OutputMode::Pretty,
        }
    }
}

/// Rebuilds a fetched page as a minimal, inert document.
///
/// When `selector` matches, the first matching element becomes the sole
/// body child and its text nodes are trimmed; otherwise the rebuilt body
/// carries all element children of the original body. Script/style/
/// stylesheet elements and inline event handlers are dropped along the way,
/// and the output always uses explicit open/close tag pairs behind a
/// doctype declaration.
///
/// This function never fails: the parser tolerates arbitrarily broken
/// markup, and if no body can be recovered at all the original input is
/// returned verbatim.
pub fn clean_html(page: &str, selector: Option<&Selector>, options: &CleanOptions) -> String {
    let document = Html::parse_document(page);
    let body_selector = Selector::parse("body").unwrap();
    let Some(body) = document.select(&body_selector).next() else {
        return page.to_string();
    };

    let mut inner = String::with_capacity(page.len());
    match selector.and_then(|s| document.select(s).next()) {
        Some(target) => write_element(&mut inner, target, options.strip_assets, true),
        None => {
            for child in body.children().filter_map(ElementRef::wrap) {
                write_element(&mut inner, child, options.strip_assets, false);
            }
        }
    }

    let serialized = match options.mode {
        OutputMode::Pretty => format!("<!DOCTYPE html>\n<html><body>{}</body></html>", inner),
        OutputMode::Compact => format!("<!DOCTYPE html><html><body>{}</body></html>", inner),
    };
    squeeze_whitespace(&serialized, options.mode)
}

fn write_element(out: &mut String, element: ElementRef, strip_assets: bool, trim_text: bool) {
    if strip_assets && is_asset_element(element) {
        return;
    }
    let name = element.value().name();
    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        if EVENT_HANDLER_ATTRS.contains(&attr) {
            continue;
        }
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(value));
        out.push('"');
    }
    out.push('>');
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = if trim_text { text.trim() } else { &**text };
                out.push_str(&html_escape::encode_text(text));
            }
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    write_element(out, child_element, strip_assets, trim_text);
                }
            }
            // Comments and stray doctypes do not survive the rebuild.
            _ => {}
        }
    }
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn is_asset_element(element: ElementRef) -> bool {
    match element.value().name() {
        "script" | "style" => true,
        "link" => element
            .value()
            .attr("rel")
            .is_some_and(|rel| rel.eq_ignore_ascii_case("stylesheet")),
        _ => false,
    }
}

fn squeeze_whitespace(html: &str, mode: OutputMode) -> String {
    let flat = html.replace('\r', "");
    let flat = MANY_NEWLINES.replace_all(&flat, "\n");
    let flat = TRAILING_SPACES.replace_all(&flat, "\n");
    match mode {
        OutputMode::Pretty => flat.into_owned(),
        OutputMode::Compact => {
            let flat = INTER_TAG_SPACE.replace_all(&flat, "><");
            SPACE_RUNS.replace_all(&flat, " ").into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pretty() -> CleanOptions {
        CleanOptions::default()
    }

    fn compact() -> CleanOptions {
        CleanOptions {
            strip_assets: true,
            mode: OutputMode::Compact,
        }
    }

    fn selector(expr: &str) -> Selector {
        Selector::parse(expr).unwrap()
    }

    #[test]
    fn strips_scripts_styles_and_stylesheet_links() {
        let page = r#"<html><head>
            <link rel="stylesheet" href="a.css">
            <link rel="icon" href="fav.ico">
            <style>body { color: red }</style>
        </head><body>
            <script>alert(1)</script>
            <div id="keep">hello</div>
        </body></html>"#;
        let cleaned = clean_html(page, None, &pretty());
        assert!(!cleaned.contains("script"));
        assert!(!cleaned.contains("style"));
        assert!(!cleaned.contains("a.css"));
        assert!(cleaned.contains(r#"<div id="keep">hello</div>"#));
    }

    #[test]
    fn keeps_assets_when_stripping_is_disabled() {
        let page = "<html><body><script>alert(1)</script><p>x</p></body></html>";
        let options = CleanOptions {
            strip_assets: false,
            mode: OutputMode::Pretty,
        };
        let cleaned = clean_html(page, None, &options);
        assert!(cleaned.contains("<script>"));
    }

    #[test]
    fn drops_inline_event_handlers_everywhere() {
        let page = r#"<html><body>
            <a href="/x" onclick="evil()">link</a>
            <form onsubmit="evil()"><input onfocus="evil()" name="q"></form>
        </body></html>"#;
        let cleaned = clean_html(page, None, &pretty());
        assert!(!cleaned.contains("onclick"));
        assert!(!cleaned.contains("onsubmit"));
        assert!(!cleaned.contains("onfocus"));
        assert!(cleaned.contains(r#"<a href="/x">link</a>"#));
        assert!(cleaned.contains(r#"name="q""#));
    }

    #[test]
    fn selector_keeps_only_the_first_match_with_trimmed_text() {
        let page = r#"<html><body>
            <div class="article">  first  </div>
            <div class="article">second</div>
            <p>noise</p>
        </body></html>"#;
        let cleaned = clean_html(page, Some(&selector("div.article")), &pretty());
        assert!(cleaned.contains(r#"<div class="article">first</div>"#));
        assert!(!cleaned.contains("second"));
        assert!(!cleaned.contains("noise"));
    }

    #[test]
    fn unmatched_selector_falls_back_to_body_children() {
        let page = "<html><body><p>alpha</p><p>beta</p></body></html>";
        let cleaned = clean_html(page, Some(&selector("div.missing")), &pretty());
        assert!(cleaned.contains("<p>alpha</p>"));
        assert!(cleaned.contains("<p>beta</p>"));
    }

    #[test]
    fn self_closing_tags_become_explicit_pairs() {
        let page = "<html><body><div>a<br/>b<img src=\"x.png\"/></div></body></html>";
        let cleaned = clean_html(page, None, &pretty());
        assert!(cleaned.contains("<br></br>"));
        assert!(cleaned.contains("<img src=\"x.png\"></img>"));
    }

    #[test]
    fn output_starts_with_a_doctype() {
        let cleaned = clean_html("<html><body><p>x</p></body></html>", None, &pretty());
        assert!(cleaned.starts_with("<!DOCTYPE html>\n"));
        let cleaned = clean_html("<html><body><p>x</p></body></html>", None, &compact());
        assert!(cleaned.starts_with("<!DOCTYPE html><html>"));
    }

    #[test]
    fn pretty_mode_collapses_blank_lines_and_trailing_spaces() {
        let page = "<html><body><pre>a   \n\n\n\nb</pre></body></html>";
        let cleaned = clean_html(page, None, &pretty());
        assert!(cleaned.contains("<pre>a\nb</pre>"));
    }

    #[test]
    fn compact_mode_squeezes_inter_tag_whitespace() {
        let page = "<html><body><div>x</div>   \n   <div>y   y</div></body></html>";
        let cleaned = clean_html(page, None, &compact());
        assert!(cleaned.contains("<div>x</div><div>y y</div>"));
        assert!(!cleaned.contains('\n'));
    }

    #[test]
    fn never_panics_on_malformed_markup_and_stays_non_empty() {
        let pages = [
            "<div><span>unclosed",
            "",
            "<<<>>>",
            "plain text, no markup at all",
            "<html><body><p>ok",
        ];
        for page in pages {
            let cleaned = clean_html(page, None, &pretty());
            assert!(!cleaned.is_empty(), "empty output for {:?}", page);
        }
    }

    #[test]
    fn output_is_deterministic() {
        let page = r#"<html><body><div id="a" class="b" data-x="1">t</div><p>u</p></body></html>"#;
        let first = clean_html(page, None, &pretty());
        let second = clean_html(page, None, &pretty());
        assert_eq!(first, second);
    }

    #[test]
    fn escapes_text_and_attribute_values() {
        let page = r#"<html><body><p title="a&quot;b">1 &lt; 2</p></body></html>"#;
        let cleaned = clean_html(page, None, &pretty());
        assert!(cleaned.contains("1 &lt; 2"));
        assert!(cleaned.contains(r#"title="a&quot;b""#));
    }
}
