//! Plain-text digest output.
//!
//! Strips tags, collapses whitespace, and joins the batch with rule lines.
//! The result is truncated at a fixed character ceiling with an explicit
//! `(truncated)` marker so the delivery channel never sees an unbounded
//! payload.

use crate::models::ExtractedArticle;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;
use tracing::instrument;

/// Hard ceiling on digest size, in characters.
const MAX_DIGEST_CHARS: usize = 50_000;

const TRUNCATION_MARKER: &str = "\n(truncated)";

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Build the plain-text digest.
#[instrument(level = "info", skip(articles), fields(count = articles.len()))]
pub fn build_digest(articles: &[ExtractedArticle], date: &str) -> String {
    let mut out = String::new();
    writeln!(out, "WEB DIGEST {}", date).unwrap();
    writeln!(out, "{}", "=".repeat(40)).unwrap();

    for article in articles {
        writeln!(out).unwrap();
        writeln!(out, "[{}] {}", article.category, article.title).unwrap();
        writeln!(out, "{}", article.source_url).unwrap();
        writeln!(out, "{}", "-".repeat(40)).unwrap();
        writeln!(out, "{}", strip_markup(&article.body)).unwrap();
    }

    truncate_digest(out)
}

/// Replace tags with spaces, unescape the sanitizer's entities, and collapse
/// runs of whitespace.
fn strip_markup(body: &str) -> String {
    // Block-level closers become line breaks so paragraphs stay readable.
    let with_breaks = body
        .replace("</p>", "\n")
        .replace("</h1>", "\n")
        .replace("</h2>", "\n")
        .replace("</h3>", "\n")
        .replace("</li>", "\n")
        .replace("<br/>", "\n");
    let stripped = RE_TAGS.replace_all(&with_breaks, " ");
    let unescaped = stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    let collapsed = RE_WHITESPACE.replace_all(&unescaped, " ");
    let lines: Vec<String> = collapsed
        .lines()
        .map(|l| l.trim().to_string())
        .collect();
    RE_BLANK_LINES
        .replace_all(lines.join("\n").trim(), "\n\n")
        .into_owned()
}

fn truncate_digest(digest: String) -> String {
    if digest.chars().count() <= MAX_DIGEST_CHARS {
        return digest;
    }
    let mut truncated: String = digest.chars().take(MAX_DIGEST_CHARS).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, body: &str) -> ExtractedArticle {
        ExtractedArticle {
            title: title.to_string(),
            body: body.to_string(),
            source_url: "https://example.com/news/x".to_string(),
            category: "news".to_string(),
            date: None,
            images: Vec::new(),
        }
    }

    #[test]
    fn test_strips_tags_and_collapses_whitespace() {
        let digest = build_digest(
            &[article("T", "<p>Hello   <em>world</em></p><p>Next    para</p>")],
            "2026-08-29",
        );
        assert!(!digest.contains('<'));
        assert!(digest.contains("Hello world"));
        assert!(digest.contains("Next para"));
    }

    #[test]
    fn test_unescapes_entities() {
        let digest = build_digest(&[article("T", "<p>a &amp; b &lt;c&gt;</p>")], "2026-08-29");
        assert!(digest.contains("a & b <c>"));
    }

    #[test]
    fn test_header_and_source_line() {
        let digest = build_digest(&[article("Headline", "<p>body</p>")], "2026-08-29");
        assert!(digest.starts_with("WEB DIGEST 2026-08-29"));
        assert!(digest.contains("[news] Headline"));
        assert!(digest.contains("https://example.com/news/x"));
    }

    #[test]
    fn test_truncation_ceiling() {
        let huge = format!("<p>{}</p>", "word ".repeat(20_000));
        let digest = build_digest(&[article("Big", &huge)], "2026-08-29");
        assert!(digest.ends_with("(truncated)"));
        assert!(digest.chars().count() <= MAX_DIGEST_CHARS + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_small_digest_not_truncated() {
        let digest = build_digest(&[article("T", "<p>short</p>")], "2026-08-29");
        assert!(!digest.contains("(truncated)"));
    }
}
