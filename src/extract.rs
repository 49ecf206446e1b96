//! Content extraction: title, main body region, and image references.
//!
//! Extraction parses the article page into a DOM tree with `scraper` and
//! selects the body with an ordered chain of structural selectors. A candidate
//! container is accepted when its text runs past a length threshold; the
//! longest accepted candidate wins, and when nothing passes the threshold the
//! longest candidate overall is taken as a best-effort fallback (the chain
//! ends at `body`, so there is always one).
//!
//! The chosen container is re-serialized through a sanitizer that drops
//! script/style/chrome subtrees and every attribute except `a[href]` and
//! `img[src alt]`, yielding self-contained prose+image markup. Image `src`
//! values are normalized to absolute secure URLs on the way through, and
//! obvious non-content images (tracking pixels, icons, favicons) are dropped
//! by a substring denylist.

use crate::models::{DiscoveredImage, ExtractedArticle};
use crate::utils::{escape_attr, escape_text};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

/// Ordered body-container fallback chain. Later entries are broader.
const BODY_SELECTORS: &[&str] = &[
    "main article",
    "article",
    "main",
    "div.prose",
    "div.post-body, div.article-body, div.entry-content",
    "#content, div.content",
    "body",
];

/// Text length a candidate container must exceed to be accepted outright.
const ACCEPT_BODY_CHARS: usize = 1000;

/// Articles whose sanitized body text is shorter than this are dropped.
const MIN_BODY_CHARS: usize = 150;

/// Subtrees removed entirely during sanitization.
const DROP_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "iframe", "form", "noscript", "svg",
    "button", "link", "meta", "template",
];

/// Tags serialized in self-closing form.
const VOID_TAGS: &[&str] = &["br", "hr", "img"];

/// Substrings that mark an image URL as non-content.
const IMAGE_DENYLIST: &[&str] = &["pixel", "tracker", "tracking", "icon", "favicon", "sprite", "1x1"];

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Extract one article from a fetched page.
///
/// # Arguments
///
/// * `html` - The full article page markup
/// * `source_url` - The URL the page was fetched from
/// * `category` - Label of the listing source the URL came from
/// * `title_suffix` - Site suffix to strip from the `<title>` contents
///
/// # Returns
///
/// `Some(ExtractedArticle)` with a sanitized body and discovered images, or
/// `None` when the body is empty or under the minimum length (the article is
/// then dropped from the batch, not fatal to the run).
#[instrument(level = "info", skip(html), fields(url = %source_url))]
pub fn extract_article(
    html: &str,
    source_url: &str,
    category: &str,
    title_suffix: &str,
) -> Option<ExtractedArticle> {
    let page_url = match Url::parse(source_url) {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, "Article URL does not parse; dropping");
            return None;
        }
    };

    let document = Html::parse_document(html);
    let title = extract_title(&document, title_suffix).unwrap_or_else(|| source_url.to_string());
    let date = extract_date(&document);

    let body_el = select_body(&document)?;
    let mut body = String::new();
    let mut images = Vec::new();
    serialize_children(body_el, &page_url, &mut body, &mut images);

    let text_len = visible_text_len(&body);
    if text_len < MIN_BODY_CHARS {
        warn!(text_len, "Body under minimum length; dropping article");
        return None;
    }
    debug!(text_len, images = images.len(), %title, "Extracted article");

    Some(ExtractedArticle {
        title,
        body,
        source_url: source_url.to_string(),
        category: category.to_string(),
        date,
        images,
    })
}

/// Length of the text content once tags are stripped.
pub fn visible_text_len(markup: &str) -> usize {
    RE_TAGS.replace_all(markup, " ").trim().len()
}

fn extract_title(document: &Html, title_suffix: &str) -> Option<String> {
    let title_selector = Selector::parse("title").unwrap();
    let h1_selector = Selector::parse("h1").unwrap();

    let raw = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            document
                .select(&h1_selector)
                .next()
                .map(|el| el.text().collect::<String>())
        })?;

    let mut title = raw.trim().to_string();
    if !title_suffix.is_empty() {
        if let Some(stripped) = title.strip_suffix(title_suffix) {
            title = stripped.trim_end().to_string();
        }
    }
    if title.is_empty() { None } else { Some(title) }
}

fn extract_date(document: &Html) -> Option<DateTime<Utc>> {
    let meta_selector =
        Selector::parse(r#"meta[property="article:published_time"], meta[name="date"]"#).unwrap();
    let time_selector = Selector::parse("time[datetime]").unwrap();

    let raw = document
        .select(&meta_selector)
        .filter_map(|el| el.value().attr("content"))
        .next()
        .or_else(|| {
            document
                .select(&time_selector)
                .filter_map(|el| el.value().attr("datetime"))
                .next()
        })?;

    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Walk the selector chain and pick the winning body container.
fn select_body<'a>(document: &'a Html) -> Option<ElementRef<'a>> {
    let mut best_accepted: Option<(usize, ElementRef)> = None;
    let mut best_any: Option<(usize, ElementRef)> = None;

    for selector_str in BODY_SELECTORS {
        let selector = Selector::parse(selector_str).unwrap();
        for element in document.select(&selector) {
            let len = element.text().map(|t| t.trim().len()).sum::<usize>();
            if best_any.as_ref().is_none_or(|(l, _)| len > *l) {
                best_any = Some((len, element));
            }
            if len > ACCEPT_BODY_CHARS && best_accepted.as_ref().is_none_or(|(l, _)| len > *l) {
                best_accepted = Some((len, element));
            }
        }
        // An accepted match at a more specific selector wins over anything
        // a broader selector could add later.
        if best_accepted.is_some() {
            break;
        }
    }

    best_accepted.or(best_any).map(|(_, el)| el)
}

/// Serialize an element's children into sanitized markup.
fn serialize_children(
    element: ElementRef,
    page_url: &Url,
    out: &mut String,
    images: &mut Vec<DiscoveredImage>,
) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            serialize_element(child_el, page_url, out, images);
        } else if let Node::Text(text) = child.value() {
            out.push_str(&escape_text(text));
        }
    }
}

fn serialize_element(
    element: ElementRef,
    page_url: &Url,
    out: &mut String,
    images: &mut Vec<DiscoveredImage>,
) {
    let value = element.value();
    let name = value.name();
    if DROP_TAGS.contains(&name) {
        return;
    }
    if name == "img" {
        serialize_image(value.attr("src"), value.attr("alt"), page_url, out, images);
        return;
    }

    out.push('<');
    out.push_str(name);
    if name == "a" {
        if let Some(href) = value.attr("href") {
            if let Ok(resolved) = page_url.join(href) {
                out.push_str(&format!(r#" href="{}""#, escape_attr(resolved.as_str())));
            }
        }
    }
    if VOID_TAGS.contains(&name) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    serialize_children(element, page_url, out, images);
    out.push_str(&format!("</{}>", name));
}

fn serialize_image(
    src: Option<&str>,
    alt: Option<&str>,
    page_url: &Url,
    out: &mut String,
    images: &mut Vec<DiscoveredImage>,
) {
    let Some(src) = src else { return };
    let Some(normalized) = normalize_image_url(src, page_url) else {
        debug!(src, "Skipping denied or unresolvable image");
        return;
    };
    images.push(DiscoveredImage {
        source_url: normalized.clone(),
        position_index: images.len(),
    });
    out.push_str(&format!(
        r#"<img src="{}" alt="{}"/>"#,
        escape_attr(&normalized),
        escape_attr(alt.unwrap_or(""))
    ));
}

/// Normalize an image reference to an absolute secure URL.
///
/// Protocol-relative `//host/...` becomes `https://host/...`; site-relative
/// paths resolve against the page URL. Data URIs and denylisted references
/// return `None`.
pub fn normalize_image_url(src: &str, page_url: &Url) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }

    let absolute = if let Some(rest) = src.strip_prefix("//") {
        Url::parse(&format!("https://{}", rest)).ok()?
    } else {
        page_url.join(src).ok()?
    };

    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }

    let lowered = absolute.as_str().to_lowercase();
    if IMAGE_DENYLIST.iter().any(|d| lowered.contains(d)) {
        return None;
    }
    Some(absolute.into())
}
