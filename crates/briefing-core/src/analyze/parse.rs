//! Tolerant JSON extraction from LLM output.
//!
//! Models are asked for a fenced ` ```json ... ``` ` block but do not
//! always comply. This tries the structured pattern first, then degrades
//! to scanning for the largest balanced `{...}`/`[...]` substring, mirroring
//! the teacher's `parse_thread` "structured pattern, then degrade" idiom.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fenced json regex must compile"))
}

/// Attempt to parse `T` out of `raw`: first from a fenced code block, then
/// from the largest balanced bracketed substring found anywhere in `raw`.
pub fn parse_tolerant_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    if let Some(captures) = fenced_json_re().captures(raw) {
        if let Some(candidate) = captures.get(1) {
            if let Ok(value) = serde_json::from_str(candidate.as_str()) {
                return Some(value);
            }
        }
    }

    if let Ok(value) = serde_json::from_str(raw.trim()) {
        return Some(value);
    }

    largest_balanced_substring(raw).and_then(|s| serde_json::from_str(&s).ok())
}

/// Scan `raw` for the longest substring that is a balanced `{...}` or
/// `[...]` span, tracking string/escape state so brackets inside string
/// literals are not mistaken for structural ones.
fn largest_balanced_substring(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut best: Option<(usize, usize)> = None;

    for (start, &b) in bytes.iter().enumerate() {
        let (open, close) = match b {
            b'{' => (b'{', b'}'),
            b'[' => (b'[', b']'),
            _ => continue,
        };

        let mut depth = 0i32;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, &c) in bytes[start..].iter().enumerate() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == b'\\' {
                    escaped = true;
                } else if c == b'"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                b'"' => in_string = true,
                c if c == open => depth += 1,
                c if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset + 1;
                        let len = end - start;
                        if best.map_or(true, |(s, e)| len > e - s) {
                            best = Some((start, end));
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    best.map(|(s, e)| raw[s..e].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, PartialEq, Debug)]
    struct Sample {
        name: String,
        score: u8,
    }

    #[test]
    fn parses_fenced_json_block() {
        let raw = "here's the result:\n```json\n{\"name\": \"a\", \"score\": 5}\n```\nhope that helps";
        let parsed: Sample = parse_tolerant_json(raw).expect("parse");
        assert_eq!(parsed, Sample { name: "a".into(), score: 5 });
    }

    #[test]
    fn parses_bare_json_with_no_fence() {
        let raw = "{\"name\": \"b\", \"score\": 9}";
        let parsed: Sample = parse_tolerant_json(raw).expect("parse");
        assert_eq!(parsed, Sample { name: "b".into(), score: 9 });
    }

    #[test]
    fn recovers_largest_balanced_object_amid_prose() {
        let raw = "Sure, thinking... {\"ignored\": true} but actually the real answer is {\"name\": \"c\", \"score\": 1} - done.";
        let parsed: Sample = parse_tolerant_json(raw).expect("parse");
        assert_eq!(parsed, Sample { name: "c".into(), score: 1 });
    }

    #[test]
    fn returns_none_on_unparseable_garbage() {
        let parsed: Option<Sample> = parse_tolerant_json("not json at all, sorry");
        assert!(parsed.is_none());
    }

    #[test]
    fn brackets_inside_string_literals_do_not_confuse_the_scanner() {
        let raw = r#"prefix {"name": "a{b}c", "score": 2} suffix"#;
        let parsed: Sample = parse_tolerant_json(raw).expect("parse");
        assert_eq!(parsed, Sample { name: "a{b}c".into(), score: 2 });
    }
}
