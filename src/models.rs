//! Data models for discovered articles, downloaded images, and run state.
//!
//! This module defines the core data structures used throughout the application:
//! - [`RunState`] / [`SentArticleRecord`]: the persisted record of delivered URLs
//! - [`ExtractedArticle`]: one sanitized article on its way to the assembler
//! - [`DiscoveredImage`]: a remote image reference found inside an article body
//! - [`FetchedImage`]: the downloaded form of an image, ready for packaging
//!
//! The state types serialize to the on-disk JSON format
//! `{"sent": [{"url", "title", "date"}], "lastCheck": "..."}` and must stay
//! wire-compatible across releases, so field renames are pinned with serde
//! attributes rather than a blanket rename rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One previously delivered article, as recorded in the state file.
///
/// Membership is keyed by `url`: a URL present in [`RunState::sent`] is never
/// fetched or delivered again in a later run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SentArticleRecord {
    /// Canonical article URL, the uniqueness key.
    pub url: String,
    /// Title as extracted at delivery time.
    pub title: String,
    /// When the article was delivered.
    pub date: DateTime<Utc>,
}

/// The persisted state of the whole pipeline.
///
/// Loaded once at process start and written back once at the end of the run
/// (or on the early "nothing new" exit). An absent or corrupt state file is
/// treated as the default empty state, never as an error.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RunState {
    /// Append-only list of delivered articles, oldest first.
    #[serde(default)]
    pub sent: Vec<SentArticleRecord>,
    /// Timestamp of the last completed check, delivered or not.
    #[serde(rename = "lastCheck", default)]
    pub last_check: Option<DateTime<Utc>>,
}

impl RunState {
    /// Whether `url` was already delivered in an earlier run.
    pub fn contains_url(&self, url: &str) -> bool {
        self.sent.iter().any(|r| r.url == url)
    }

    /// Append a delivery record for `url`.
    pub fn mark_sent(&mut self, url: &str, title: &str, date: DateTime<Utc>) {
        self.sent.push(SentArticleRecord {
            url: url.to_string(),
            title: title.to_string(),
            date,
        });
    }
}

/// A remote image reference discovered inside an article body.
///
/// `position_index` is the zero-based appearance order within the body and is
/// what correlates the original reference with its rewritten local form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredImage {
    /// Absolute URL of the image after protocol/site-relative normalization.
    pub source_url: String,
    /// Appearance order within the article body.
    pub position_index: usize,
}

/// A sanitized article ready for image substitution and assembly.
///
/// The `body` is self-contained prose+image markup: no scripts, styles, page
/// chrome, or attributes beyond `a[href]` and `img[src alt]` survive
/// extraction. Image `src` values start out as absolute remote URLs and are
/// rewritten in place by the image downloader.
#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    /// Article title with the site suffix stripped.
    pub title: String,
    /// Sanitized body markup.
    pub body: String,
    /// The URL the article was fetched from.
    pub source_url: String,
    /// Category label, taken from the listing page the URL was discovered on.
    pub category: String,
    /// Publication date when one could be parsed from the page.
    pub date: Option<DateTime<Utc>>,
    /// Image references in appearance order.
    pub images: Vec<DiscoveredImage>,
}

/// A successfully downloaded image, held for packaging.
///
/// For disk output the bytes are written under `images/`; for EPUB output they
/// are bundled into the container; inline mode encodes them as a data URI and
/// drops the struct immediately.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// The remote URL the bytes came from.
    pub original_url: String,
    /// Numbered local name, e.g. `images/img-0003.jpg`.
    pub local_name: String,
    /// Media type reported by the server (defaulted when absent).
    pub media_type: String,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
}
