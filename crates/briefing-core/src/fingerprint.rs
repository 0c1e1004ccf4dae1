//! Deterministic item identifiers and URL normalization for deduplication.
//!
//! The hashing idiom mirrors the teacher's `Sha256::digest` use for PKCE
//! challenge generation during startup.

use sha2::{Digest, Sha256};

const TRACKING_PARAM_PREFIXES: &[&str] = &["utm_"];
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "ref", "source"];

/// Compute the 12-hex-char item id: the first 12 hex characters of
/// `sha256(normalized_url || '\n' || title)`.
pub fn fingerprint_id(normalized_url: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    hasher.update(b"\n");
    hasher.update(title.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..12].to_string()
}

/// Normalize a URL for fingerprinting and dedup: lowercase the scheme and
/// host, strip a trailing slash, and drop known tracking query parameters.
/// Falls back to a trimmed copy of the input if it does not parse as a URL.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = reqwest::Url::parse(raw) else {
        return raw.trim().to_string();
    };

    let scheme = url.scheme().to_lowercase();
    let _ = url.set_scheme(&scheme);

    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        let _ = url.set_host(Some(&lowered));
    }

    let filtered: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if filtered.is_empty() {
        url.set_query(None);
    } else {
        let query = filtered
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    let mut normalized = url.to_string();
    if normalized.ends_with('/') && normalized.matches('/').count() > 2 {
        normalized.pop();
    }
    normalized
}

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_lowercase();
    TRACKING_PARAM_PREFIXES.iter().any(|p| lower.starts_with(p))
        || TRACKING_PARAMS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_id_is_twelve_lowercase_hex_chars() {
        let id = fingerprint_id("https://example.com/post", "A Title");
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn fingerprint_id_is_deterministic() {
        let a = fingerprint_id("https://example.com/post", "A Title");
        let b = fingerprint_id("https://example.com/post", "A Title");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_id_differs_on_title_change() {
        let a = fingerprint_id("https://example.com/post", "Title One");
        let b = fingerprint_id("https://example.com/post", "Title Two");
        assert_ne!(a, b);
    }

    #[test]
    fn normalize_url_lowercases_scheme_and_host() {
        let normalized = normalize_url("HTTPS://Example.COM/Post");
        assert!(normalized.starts_with("https://example.com"));
    }

    #[test]
    fn normalize_url_strips_tracking_params() {
        let normalized = normalize_url("https://example.com/post?utm_source=twitter&id=5&fbclid=abc");
        assert!(!normalized.contains("utm_source"));
        assert!(!normalized.contains("fbclid"));
        assert!(normalized.contains("id=5"));
    }

    #[test]
    fn normalize_url_trims_trailing_slash() {
        let normalized = normalize_url("https://example.com/post/");
        assert!(!normalized.ends_with('/'));
    }

    #[test]
    fn normalize_url_falls_back_on_unparseable_input() {
        let normalized = normalize_url("  not a url  ");
        assert_eq!(normalized, "not a url");
    }
}
