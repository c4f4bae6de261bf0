//! Readable-text extraction from HTML.
//!
//! A small regex pass, not a parser: it drops non-content elements
//! (scripts, navigation, forms and the like), turns block boundaries into
//! line breaks, strips the remaining tags, decodes entities and collapses
//! whitespace. Good enough for handing page text to a model.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Elements removed together with their content.
const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "form", "svg",
    "template",
];

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("hard-coded pattern compiles")
}

static COMMENT: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)<!--.*?-->"));

// The regex crate has no backreferences, hence one pattern per element.
static STRIPPED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    STRIPPED_ELEMENTS
        .iter()
        .map(|tag| re(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")))
        .collect()
});

static TITLE: LazyLock<Regex> = LazyLock::new(|| re(r"(?is)<title\b[^>]*>(.*?)</title\s*>"));

static HEAD: LazyLock<Regex> = LazyLock::new(|| re(r"(?is)<head\b[^>]*>.*?</head\s*>"));

static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)<(br|hr)\b[^>]*>|</?(p|div|section|article|main|li|ul|ol|tr|table|h[1-6]|blockquote|pre|dd|dt)\b[^>]*>")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)<[^>]*>"));

static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| re(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z][a-zA-Z0-9]{1,31});"));

static SPACES: LazyLock<Regex> = LazyLock::new(|| re(r"[ \t\x0C\r\u{00A0}]+"));

/// Whether a response looks like HTML, by content type or a sniff of the body.
pub fn is_html(content_type: &str, body: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("html") {
        return true;
    }
    if !ct.is_empty() && !ct.starts_with("text/plain") && !ct.contains("octet-stream") {
        return false;
    }
    let head: String = body
        .trim_start()
        .chars()
        .take(256)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Contents of the first `<title>`, decoded and whitespace-collapsed.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE.captures(html)?.get(1)?.as_str();
    let title = collapse_inline(&decode_entities(&TAG.replace_all(raw, "")));
    (!title.is_empty()).then_some(title)
}

/// Convert an HTML document into readable plain text.
pub fn html_to_text(html: &str) -> String {
    let mut text = COMMENT.replace_all(html, "").into_owned();
    text = HEAD.replace_all(&text, "\n").into_owned();
    for element in STRIPPED.iter() {
        text = element.replace_all(&text, "\n").into_owned();
    }
    text = BLOCK_BREAK.replace_all(&text, "\n").into_owned();
    text = TAG.replace_all(&text, "").into_owned();
    collapse_lines(&decode_entities(&text))
}

/// Decode named and numeric character references. Unknown names are kept
/// verbatim.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures<'_>| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or(body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "middot" => '\u{00B7}',
        "bull" => '\u{2022}',
        "laquo" => '\u{00AB}',
        "raquo" => '\u{00BB}',
        "euro" => '\u{20AC}',
        _ => return None,
    })
}

/// Collapse runs of spaces within lines and drop blank lines.
fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(collapse_inline)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_inline(line: &str) -> String {
    SPACES.replace_all(line, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>  Rust &amp; Safety </title>
  <style>body { color: red }</style>
</head>
<body>
  <header><a href="/">Home</a></header>
  <nav><ul><li>Menu</li></ul></nav>
  <!-- tracking pixel -->
  <main>
    <h1>Guarded   tools</h1>
    <p>Paths are <b>canonicalized</b>&nbsp;first.</p>
    <p>Caf&#233; &#x2014; 5 &lt; 6</p>
    <script type="text/javascript">var secret = "<p>not text</p>";</script>
  </main>
  <form><input name="q"></form>
  <footer>Copyright</footer>
</body>
</html>"#;

    #[test]
    fn title_extracted_and_decoded() {
        assert_eq!(extract_title(PAGE).as_deref(), Some("Rust & Safety"));
        assert_eq!(extract_title("<p>no title</p>"), None);
        assert_eq!(extract_title("<title>  </title>"), None);
    }

    #[test]
    fn text_keeps_content_only() {
        let text = html_to_text(PAGE);
        assert_eq!(
            text,
            "Guarded tools\nPaths are canonicalized first.\nCaf\u{e9} \u{2014} 5 < 6"
        );
    }

    #[test]
    fn stripped_elements_case_insensitive() {
        let text = html_to_text("<SCRIPT>alert(1)</SCRIPT><Aside>ad</Aside>kept");
        assert_eq!(text, "kept");
    }

    #[test]
    fn unknown_entities_left_alone() {
        assert_eq!(decode_entities("a &bogus; b &amp; c"), "a &bogus; b & c");
        assert_eq!(decode_entities("&#xFFFFFF;"), "&#xFFFFFF;");
    }

    #[test]
    fn html_detection() {
        assert!(is_html("text/html; charset=utf-8", ""));
        assert!(is_html("application/xhtml+xml", ""));
        assert!(is_html("", "  <!DOCTYPE html><html>"));
        assert!(is_html("text/plain", "<html><body>x</body></html>"));
        assert!(!is_html("application/json", "<html>"));
        assert!(!is_html("", "plain words"));
    }
}
