//! Output generation modules for the three deliverable strategies.
//!
//! All strategies consume the same prepared article sequence:
//!
//! - [`html`]: styled single-file HTML with an anchor-linked table of contents
//! - [`epub`]: EPUB 3 container with one chapter per article
//! - [`text`]: tag-stripped plain-text digest with a hard size ceiling
//!
//! [`prepare_batch`] applies the shared pre-pass: duplicate-title removal and
//! category-priority ordering. Each strategy is a pure function of its input
//! sequence, so assembling the same batch twice yields byte-identical output.

pub mod epub;
pub mod html;
pub mod text;

use crate::config::RunConfig;
use crate::models::ExtractedArticle;
use crate::utils::normalize_title;
use itertools::Itertools;
use std::cmp::Ordering;
use tracing::{debug, instrument};

/// Dedupe and order a batch for assembly.
///
/// Articles whose normalized (lowercased, whitespace-collapsed) titles collide
/// are duplicates; the first seen wins. The survivors are ordered by the fixed
/// category priority (the configured source order), then by descending date
/// within a category, dateless articles last.
#[instrument(level = "debug", skip_all, fields(count = articles.len()))]
pub fn prepare_batch(articles: Vec<ExtractedArticle>, config: &RunConfig) -> Vec<ExtractedArticle> {
    let before = articles.len();
    let mut batch: Vec<ExtractedArticle> = articles
        .into_iter()
        .unique_by(|a| normalize_title(&a.title))
        .collect();
    if batch.len() < before {
        debug!(dropped = before - batch.len(), "Dropped duplicate titles");
    }

    batch.sort_by(|a, b| {
        let rank = config
            .category_rank(&a.category)
            .cmp(&config.category_rank(&b.category));
        if rank != Ordering::Equal {
            return rank;
        }
        match (&a.date, &b.date) {
            (Some(da), Some(db)) => db.cmp(da),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    batch
}

/// Deliverable filename for a run date, e.g. `digest_2026-08-29.epub`.
pub fn deliverable_filename(date: &str, extension: &str) -> String {
    format!("digest_{}.{}", date, extension)
}
