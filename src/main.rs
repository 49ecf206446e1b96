//! # Kindle Digest
//!
//! A scheduled delivery pipeline that polls a fixed set of listing pages for
//! new articles, extracts and sanitizes their content (including inline
//! images), packages the batch as HTML, EPUB, or plain text, and mails the
//! result to a Kindle device address.
//!
//! ## Features
//!
//! - Watches the news, engineering, and research sections of one site
//!   (configurable via YAML)
//! - Real DOM extraction with an ordered selector fallback chain
//! - Image download with batch-wide dedup, per-image timeout, and reference
//!   substitution (disk files, base64 inlining, or EPUB bundling)
//! - JSON state file so an article is never delivered twice
//! - Delivery through the local Mail client, plus a confirmation notice
//!
//! ## Usage
//!
//! ```sh
//! kindle_digest -c digest.yaml -f epub
//! ```
//!
//! ## Architecture
//!
//! One run is strictly sequential:
//! 1. **Discovery**: scan each listing page for allow-listed article links
//! 2. **Extraction**: fetch each new article, isolate and sanitize its body
//! 3. **Images**: download referenced images once each, rewrite references
//! 4. **Assembly**: dedupe titles, order by category, package the deliverable
//! 5. **Dispatch**: mail the deliverable and a confirmation, persist state

use chrono::{Local, Utc};
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod discover;
mod dispatch;
mod extract;
mod fetch;
mod images;
mod models;
mod outputs;
mod state;
mod utils;

use cli::{Cli, ImageHandling, OutputFormat};
use config::RunConfig;
use fetch::Fetcher;
use images::ImageMode;
use models::ExtractedArticle;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("kindle_digest starting up");

    let args = Cli::parse();
    let mut config = RunConfig::load(args.config.as_deref()).await?;
    args.apply_to(&mut config);
    info!(
        sources = config.sources.len(),
        format = ?args.format,
        no_send = args.no_send,
        "Run configured"
    );

    // A stuck page fetch or mail client must not hang the schedule forever.
    let deadline = Duration::from_secs(config.run_deadline_secs);
    let result = match tokio::time::timeout(deadline, run(&args, &config)).await {
        Ok(result) => result,
        Err(_) => {
            error!(deadline_secs = config.run_deadline_secs, "Run deadline exceeded");
            Err("run deadline exceeded".into())
        }
    };

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
    result
}

/// One complete poll-extract-assemble-dispatch cycle.
#[instrument(level = "info", skip_all)]
async fn run(args: &Cli, config: &RunConfig) -> Result<(), Box<dyn Error>> {
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let mut run_state = state::load(&config.state_path).await;
    let fetcher = Fetcher::new(config.page_timeout_secs, config.image_timeout_secs)?;

    // ---- Discover new article URLs across all sources ----
    let mut new_urls: Vec<(String, String)> = Vec::new();
    for source in &config.sources {
        let listing = match fetcher.text(&source.url).await {
            Ok(listing) => listing,
            Err(e) => {
                error!(source = %source.label, url = %source.url, error = %e, "Listing fetch failed; skipping source");
                continue;
            }
        };
        let base = match url::Url::parse(&source.url) {
            Ok(base) => base,
            Err(e) => {
                error!(source = %source.label, error = %e, "Listing URL does not parse; skipping source");
                continue;
            }
        };
        let discovered = discover::discover_articles(
            &listing,
            &base,
            &source.allow,
            config.max_articles_per_source,
        );
        let fresh: Vec<String> = discovered
            .into_iter()
            .filter(|url| !run_state.contains_url(url))
            .collect();
        info!(source = %source.label, count = fresh.len(), "New articles for source");
        new_urls.extend(fresh.into_iter().map(|url| (url, source.label.clone())));
    }

    if new_urls.is_empty() {
        info!("No new articles; updating last check and exiting");
        run_state.last_check = Some(Utc::now());
        state::save(&config.state_path, &run_state).await?;
        return Ok(());
    }

    // ---- Fetch and extract each new article, one at a time ----
    use futures::stream::{self, StreamExt};
    let mut articles: Vec<ExtractedArticle> = stream::iter(new_urls.iter())
        .then(|(url, category)| {
            let fetcher = &fetcher;
            let suffix = &config.site_title_suffix;
            async move {
                let page = match fetcher.text(url).await {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(%url, error = %e, "Article fetch failed; skipping");
                        return None;
                    }
                };
                let extracted = extract::extract_article(&page, url, category, suffix);
                if extracted.is_none() {
                    warn!(%url, "Extraction produced no usable body; skipping");
                }
                extracted
            }
        })
        .filter_map(std::future::ready)
        .collect()
        .await;
    info!(
        discovered = new_urls.len(),
        extracted = articles.len(),
        "Article extraction complete"
    );

    if articles.is_empty() {
        info!("Nothing extractable this run; updating last check and exiting");
        run_state.last_check = Some(Utc::now());
        state::save(&config.state_path, &run_state).await?;
        return Ok(());
    }

    // ---- Images ----
    let fetched_images = if args.format == OutputFormat::Text {
        // The text digest strips all markup, so there is nothing to download.
        Vec::new()
    } else {
        let image_mode = match args.format {
            OutputFormat::Html => match args.images {
                ImageHandling::Inline => ImageMode::Inline,
                ImageHandling::Disk => ImageMode::Disk,
            },
            _ => ImageMode::Bundle,
        };
        images::process_images(&fetcher, &mut articles, image_mode, &config.output_dir).await?
    };

    // ---- Assemble the deliverable ----
    let batch = outputs::prepare_batch(articles, config);
    let date = Local::now().date_naive().to_string();
    let (file_name, payload): (String, Vec<u8>) = match args.format {
        OutputFormat::Html => (
            outputs::deliverable_filename(&date, "html"),
            outputs::html::build_document(&batch, &date).into_bytes(),
        ),
        OutputFormat::Epub => (
            outputs::deliverable_filename(&date, "epub"),
            outputs::epub::build_epub(&batch, &fetched_images, &date)?,
        ),
        OutputFormat::Text => (
            outputs::deliverable_filename(&date, "txt"),
            outputs::text::build_digest(&batch, &date).into_bytes(),
        ),
    };
    let output_path = format!("{}/{}", config.output_dir.trim_end_matches('/'), file_name);
    tokio::fs::write(&output_path, &payload).await?;
    info!(path = %output_path, bytes = payload.len(), articles = batch.len(), "Wrote deliverable");

    // ---- Dispatch ----
    let mut dispatch_error: Option<Box<dyn Error>> = None;
    if args.no_send {
        info!("Dispatch skipped (--no-send)");
    } else {
        let subject = format!("Web Digest {}", date);
        let primary = dispatch::send(
            &config.kindle_address,
            &subject,
            "Today's articles are attached.",
            Some(Path::new(&output_path)),
        )
        .await;
        if let Err(e) = primary {
            error!(error = %e, "Primary delivery failed");
            dispatch_error = Some(e);
        }

        // The confirmation is informational only; its failure never rolls
        // back or re-triggers the primary delivery.
        let summary = batch
            .iter()
            .map(|a| format!("- {}", a.title))
            .collect::<Vec<_>>()
            .join("\n");
        let notice_body = format!("Delivered {} article(s):\n{}", batch.len(), summary);
        if let Err(e) = dispatch::send(
            &config.notification_address,
            &format!("{} sent", subject),
            &notice_body,
            None,
        )
        .await
        {
            warn!(error = %e, "Confirmation notice failed");
        }
    }

    // ---- Persist state ----
    // The written deliverable and updated state survive a delivery failure.
    let now = Utc::now();
    for article in &batch {
        run_state.mark_sent(&article.source_url, &article.title, now);
    }
    run_state.last_check = Some(now);
    state::save(&config.state_path, &run_state).await?;

    match dispatch_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn article_page(title: &str) -> String {
        format!(
            "<html><head><title>{}</title></head><body><article>{}</article></body></html>",
            title,
            "<p>The quick brown fox jumps over the lazy dog once more. </p>".repeat(30)
        )
    }

    // Fresh state, two discovered articles, offline pipeline: the document
    // carries exactly two sections and the state file records both URLs.
    #[tokio::test]
    async fn test_fresh_state_two_article_run() {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let state_str = state_path.to_str().unwrap();

        let mut run_state = state::load(state_str).await;
        assert!(run_state.sent.is_empty());

        let listing = r#"
            <a href="/news/alpha">Alpha</a>
            <a href="/careers">Jobs</a>
            <a href="/news/beta">Beta</a>
        "#;
        let base = url::Url::parse("https://example.com/news").unwrap();
        let urls = discover::discover_articles(listing, &base, &["/news/".to_string()], 5);
        assert_eq!(urls.len(), 2);

        let config = RunConfig::default();
        let articles: Vec<ExtractedArticle> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| {
                let page = article_page(if i == 0 { "Alpha" } else { "Beta" });
                extract::extract_article(&page, url, "news", "").unwrap()
            })
            .collect();

        let batch = outputs::prepare_batch(articles, &config);
        let document = outputs::html::build_document(&batch, "2026-08-29");
        assert_eq!(document.matches("<article id=").count(), 2);

        let now = Utc::now();
        for article in &batch {
            run_state.mark_sent(&article.source_url, &article.title, now);
        }
        run_state.last_check = Some(now);
        state::save(state_str, &run_state).await.unwrap();

        let reloaded = state::load(state_str).await;
        assert_eq!(reloaded.sent.len(), 2);
        assert!(reloaded.contains_url("https://example.com/news/alpha"));
        assert!(reloaded.contains_url("https://example.com/news/beta"));
        assert!(reloaded.last_check.is_some());

        // A second discovery pass excludes everything already sent.
        let again = discover::discover_articles(listing, &base, &["/news/".to_string()], 5);
        let fresh: Vec<_> = again
            .into_iter()
            .filter(|u| !reloaded.contains_url(u))
            .collect();
        assert!(fresh.is_empty());
    }
}
