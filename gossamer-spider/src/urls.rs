use crate::error::{Result, SpiderError};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;
use url::Url;

static UNSAFE_KEY_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\-.]").unwrap());

pub fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| SpiderError::InvalidUrl(format!("{}: {}", url, e)))
}

/// Overlays configured query parameters on a URL. A configured parameter
/// always wins over a same-named parameter already on the URL; unrelated
/// parameters and the fragment survive untouched, and parameters not yet
/// present are appended.
pub fn merge_params(url: &Url, params: &BTreeMap<String, String>) -> Url {
    if params.is_empty() {
        return url.clone();
    }

    let mut merged: Vec<(String, String)> = Vec::new();
    let mut replaced: HashSet<String> = HashSet::new();
    for (key, value) in url.query_pairs() {
        let key = key.into_owned();
        match params.get(&key) {
            Some(replacement) if !replaced.contains(&key) => {
                merged.push((key.clone(), replacement.clone()));
                replaced.insert(key);
            }
            // Further native values of an overridden key collapse away.
            Some(_) => {}
            None => merged.push((key, value.into_owned())),
        }
    }
    for (key, value) in params {
        if !replaced.contains(key) {
            merged.push((key.clone(), value.clone()));
        }
    }

    let mut merged_url = url.clone();
    merged_url.set_query(None);
    if !merged.is_empty() {
        merged_url
            .query_pairs_mut()
            .extend_pairs(merged.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    merged_url
}

/// Derives the filesystem-safe key a page is stored under. When the
/// configured key parameter is present on the URL its value is the key;
/// otherwise the whole URL is sanitized character by character.
pub fn storage_key(url: &str, key_param: Option<&str>) -> String {
    if let Some(param) = key_param
        && let Ok(parsed) = Url::parse(url)
    {
        for (key, value) in parsed.query_pairs() {
            if key == param {
                return value.into_owned();
            }
        }
    }
    UNSAFE_KEY_CHARS.replace_all(url, "_").into_owned()
}

/// Canonical form the archive pipeline fetches and keys by:
/// scheme://authority/path plus only the first query parameter.
pub fn trimmed_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let mut trimmed = format!(
        "{}://{}{}",
        parsed.scheme(),
        parsed.authority(),
        parsed.path()
    );
    if let Some(query) = parsed.query()
        && let Some(first) = query.split('&').next()
        && !first.is_empty()
    {
        trimmed.push('?');
        trimmed.push_str(first);
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn configured_params_overwrite_native_ones() {
        let url = Url::parse("http://example.com/list?page=1&sort=asc").unwrap();
        let merged = merge_params(&url, &params(&[("page", "7")]));
        assert_eq!(merged.as_str(), "http://example.com/list?page=7&sort=asc");
    }

    #[test]
    fn missing_params_are_appended_and_fragment_survives() {
        let url = Url::parse("http://example.com/list?sort=asc#sec").unwrap();
        let merged = merge_params(&url, &params(&[("page", "2")]));
        assert_eq!(
            merged.as_str(),
            "http://example.com/list?sort=asc&page=2#sec"
        );
    }

    #[test]
    fn duplicate_native_values_collapse_when_overridden() {
        let url = Url::parse("http://example.com/?id=1&id=2&x=3").unwrap();
        let merged = merge_params(&url, &params(&[("id", "9")]));
        assert_eq!(merged.as_str(), "http://example.com/?id=9&x=3");
    }

    #[test]
    fn empty_params_leave_the_url_alone() {
        let url = Url::parse("http://example.com/a?b=c#d").unwrap();
        let merged = merge_params(&url, &BTreeMap::new());
        assert_eq!(merged, url);
    }

    #[test]
    fn storage_key_prefers_the_configured_parameter() {
        let key = storage_key("http://example.com/view?id=kda_10101&page=3", Some("id"));
        assert_eq!(key, "kda_10101");
    }

    #[test]
    fn storage_key_falls_back_to_the_sanitized_url() {
        let key = storage_key("http://example.com/view?page=3", Some("id"));
        assert_eq!(key, "http___example.com_view_page_3");
        // Deterministic either way.
        assert_eq!(key, storage_key("http://example.com/view?page=3", Some("id")));
    }

    #[test]
    fn trimmed_url_keeps_only_the_first_query_parameter() {
        assert_eq!(
            trimmed_url("http://example.com/a?id=7&junk=1&also=2"),
            "http://example.com/a?id=7"
        );
        assert_eq!(trimmed_url("http://example.com/a"), "http://example.com/a");
    }
}
