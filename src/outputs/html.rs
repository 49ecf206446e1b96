//! Styled single-file HTML output.
//!
//! Wraps the prepared article sequence in a templated document with an
//! embedded stylesheet and an anchor-linked table of contents, grouping
//! articles under category headings. The builder is a pure function of the
//! input sequence; no clocks or randomness, so repeated assembly of the same
//! batch is byte-identical.

use crate::models::ExtractedArticle;
use crate::utils::{escape_text, slugify_title, upcase};
use std::collections::HashMap;
use std::fmt::Write;
use tracing::instrument;

const STYLESHEET: &str = "\
body { font-family: Georgia, serif; max-width: 42em; margin: 0 auto; padding: 1em; line-height: 1.6; }\n\
h1, h2, h3 { font-family: Helvetica, Arial, sans-serif; }\n\
h2.category { border-bottom: 2px solid #333; padding-bottom: 0.2em; }\n\
article { margin-bottom: 3em; }\n\
.meta { color: #666; font-size: 0.85em; }\n\
img { max-width: 100%; height: auto; }\n\
nav.toc { background: #f5f5f5; padding: 1em; border-radius: 4px; }\n\
nav.toc ul { margin: 0.2em 0; }";

/// Build the full digest document.
///
/// # Arguments
///
/// * `articles` - Prepared (deduped, ordered) batch
/// * `date` - Run date label embedded in the heading, `YYYY-MM-DD`
#[instrument(level = "info", skip(articles), fields(count = articles.len()))]
pub fn build_document(articles: &[ExtractedArticle], date: &str) -> String {
    let mut out = String::new();
    write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\"/>\n\
         <title>Web Digest {date}</title>\n<style>\n{STYLESHEET}\n</style>\n</head>\n<body>\n\
         <h1>Web Digest {date}</h1>\n"
    )
    .unwrap();

    // Distinct titles can still collapse to one slug ("A-B" vs "A B"), so
    // repeats within the batch get a numeric suffix to keep anchors unique.
    let mut slug_uses: HashMap<String, usize> = HashMap::new();
    let anchor_ids: Vec<String> = articles
        .iter()
        .map(|article| {
            let slug = slugify_title(&article.title);
            let n = slug_uses.entry(slug.clone()).or_insert(0);
            *n += 1;
            if *n == 1 { slug } else { format!("{}-{}", slug, n) }
        })
        .collect();

    // Table of contents grouped by category, in batch order.
    out.push_str("<nav class=\"toc\">\n<h2>Contents</h2>\n<ul>\n");
    let mut current_category: Option<&str> = None;
    for (article, anchor_id) in articles.iter().zip(&anchor_ids) {
        if current_category != Some(article.category.as_str()) {
            if current_category.is_some() {
                out.push_str("</ul></li>\n");
            }
            write!(
                out,
                "<li><a href=\"#cat-{}\">{}</a><ul>\n",
                slugify_title(&article.category),
                escape_text(&upcase(&article.category))
            )
            .unwrap();
            current_category = Some(article.category.as_str());
        }
        write!(
            out,
            "<li><a href=\"#{}\">{}</a></li>\n",
            anchor_id,
            escape_text(&article.title)
        )
        .unwrap();
    }
    if current_category.is_some() {
        out.push_str("</ul></li>\n");
    }
    out.push_str("</ul>\n</nav>\n");

    // Article sections under category headings.
    let mut current_category: Option<&str> = None;
    for (article, anchor_id) in articles.iter().zip(&anchor_ids) {
        if current_category != Some(article.category.as_str()) {
            write!(
                out,
                "<h2 class=\"category\" id=\"cat-{}\">{}</h2>\n",
                slugify_title(&article.category),
                escape_text(&upcase(&article.category))
            )
            .unwrap();
            current_category = Some(article.category.as_str());
        }
        write!(
            out,
            "<article id=\"{}\">\n<h3>{}</h3>\n<p class=\"meta\"><a href=\"{}\">{}</a>{}</p>\n{}\n</article>\n",
            anchor_id,
            escape_text(&article.title),
            crate::utils::escape_attr(&article.source_url),
            escape_text(&article.source_url),
            article
                .date
                .map(|d| format!(" &middot; {}", d.format("%Y-%m-%d")))
                .unwrap_or_default(),
            article.body
        )
        .unwrap();
    }

    out.push_str("</body>\n</html>\n");
    out
}
