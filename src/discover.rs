//! Article discovery on listing pages.
//!
//! A listing page enumerates links to individual articles. Discovery walks
//! every `a[href]` in document order, resolves relative targets against the
//! listing URL, and keeps same-host links whose path contains one of the
//! source's allow-listed fragments. Results are deduplicated by full URL and
//! capped at the configured per-source maximum.
//!
//! Order among matches is markup-appearance order, not freshness. The cap
//! therefore bounds per-run work, it does not pick the newest articles.

use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument};
use url::Url;

/// Extract article URLs from a listing page's markup.
///
/// # Arguments
///
/// * `html` - The listing page markup
/// * `base` - The listing page URL, used to resolve relative hrefs
/// * `allow` - Path fragments an article link must contain
/// * `max` - Cap on the number of returned URLs
///
/// # Returns
///
/// Deduplicated absolute article URLs in document order, at most `max`.
#[instrument(level = "info", skip(html, allow), fields(base = %base))]
pub fn discover_articles(html: &str, base: &Url, allow: &[String], max: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]").unwrap();

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for element in document.select(&link_selector) {
        if urls.len() >= max {
            break;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(mut resolved) = base.join(href) else {
            debug!(href, "Skipping unresolvable href");
            continue;
        };
        // Anchors within the same article must not count as distinct URLs.
        resolved.set_fragment(None);

        if resolved.host_str() != base.host_str() {
            continue;
        }
        let path = resolved.path();
        if !allow.iter().any(|fragment| path.contains(fragment.as_str())) {
            continue;
        }

        let url = resolved.to_string();
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }

    info!(count = urls.len(), "Discovered article URLs");
    urls
}
