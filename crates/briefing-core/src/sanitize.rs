//! HTML-to-sanitized-plain-text, structurally discarding `script`/`style`
//! subtrees instead of string-stripping them.

use ego_tree::NodeRef;
use scraper::{Html, Node};

/// Tags whose entire subtree (including any nested markup) is dropped.
const DROPPED_SUBTREE_TAGS: &[&str] = &["script", "style", "noscript"];

/// Per-item payload cap enforced before sanitization; bodies over this are
/// truncated rather than rejected.
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024;

/// Truncate `body` to at most [`MAX_PAYLOAD_BYTES`], respecting UTF-8
/// character boundaries.
pub fn truncate_payload(body: &str) -> (String, bool) {
    if body.len() <= MAX_PAYLOAD_BYTES {
        return (body.to_string(), false);
    }
    let mut end = MAX_PAYLOAD_BYTES;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    (body[..end].to_string(), true)
}

/// Parse `raw_html` and return its text content, with `script`/`style`
/// subtrees discarded structurally (the tag is never copied into the
/// output) and whitespace collapsed.
pub fn sanitize_to_plain_text(raw_html: &str) -> String {
    let document = Html::parse_fragment(raw_html);
    let mut out = String::new();
    collect_text(document.tree.root(), &mut out);
    collapse_whitespace(&out)
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Element(element) => {
            if DROPPED_SUBTREE_TAGS.contains(&element.name()) {
                return;
            }
            for child in node.children() {
                collect_text(child, out);
            }
            if matches!(element.name(), "p" | "div" | "br" | "li") {
                out.push(' ');
            }
        }
        Node::Text(text) => {
            out.push_str(text);
            out.push(' ');
        }
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render plain-text paragraphs as sanitized HTML, each wrapped in `<p>`
/// with HTML-special characters escaped. This is the only path the
/// executive summary's HTML rendering goes through — it never copies raw
/// model output into markup.
pub fn render_paragraphs_html(paragraphs: &[String]) -> String {
    paragraphs
        .iter()
        .map(|p| format!("<p>{}</p>", escape_html(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_tag_is_never_copied_into_output() {
        let html = "<div>hello <script>alert('xss')</script> world</div>";
        let text = sanitize_to_plain_text(html);
        assert!(!text.contains("script"));
        assert!(!text.contains("alert"));
        assert!(text.contains("hello"));
        assert!(text.contains("world"));
    }

    #[test]
    fn style_subtree_is_dropped_entirely() {
        let html = "<p>visible</p><style>.x { color: red; }</style>";
        let text = sanitize_to_plain_text(html);
        assert_eq!(text, "visible");
    }

    #[test]
    fn nested_tags_preserve_inner_text() {
        let html = "<div><p>one <strong>two</strong> three</p></div>";
        let text = sanitize_to_plain_text(html);
        assert_eq!(text, "one two three");
    }

    #[test]
    fn truncate_payload_respects_char_boundaries() {
        let body = "a".repeat(MAX_PAYLOAD_BYTES + 500);
        let (truncated, was_truncated) = truncate_payload(&body);
        assert!(was_truncated);
        assert!(truncated.len() <= MAX_PAYLOAD_BYTES);
    }

    #[test]
    fn truncate_payload_is_noop_under_cap() {
        let (text, was_truncated) = truncate_payload("short body");
        assert_eq!(text, "short body");
        assert!(!was_truncated);
    }

    #[test]
    fn render_paragraphs_html_escapes_and_wraps() {
        let html = render_paragraphs_html(&["a <b> & c".to_string()]);
        assert_eq!(html, "<p>a &lt;b&gt; &amp; c</p>");
    }
}
