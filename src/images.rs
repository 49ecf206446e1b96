//! Image downloading, deduplication, and body-reference substitution.
//!
//! Every image URL discovered across the whole batch is fetched at most once,
//! sequentially and each under the short image timeout. A failed download is
//! recorded and the corresponding `<img .../>` tag is removed from every body
//! that referenced it, so the deliverable never carries a dangling remote
//! link. Successful downloads have their `src` rewritten to the destination
//! form: a numbered file under `images/` (disk and EPUB packaging) or a
//! base64 data URI (inline mode).

use crate::fetch::Fetcher;
use crate::models::{ExtractedArticle, FetchedImage};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use std::collections::HashMap;
use std::error::Error;
use tracing::{info, instrument, warn};

/// Where downloaded image bytes end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    /// Write numbered files under `{output_dir}/images/`.
    Disk,
    /// Rewrite references to base64 data URIs.
    Inline,
    /// Keep bytes in memory for the EPUB packager.
    Bundle,
}

/// Download all images referenced by the batch and rewrite the bodies.
///
/// # Arguments
///
/// * `fetcher` - Shared HTTP client
/// * `articles` - The batch; bodies and image lists are updated in place
/// * `mode` - Destination for the downloaded bytes
/// * `output_dir` - Base directory for [`ImageMode::Disk`]
///
/// # Returns
///
/// The successfully fetched images, for modes that package them separately.
/// Inline mode returns an empty vector since the bytes live in the bodies.
#[instrument(level = "info", skip_all, fields(articles = articles.len(), ?mode))]
pub async fn process_images(
    fetcher: &Fetcher,
    articles: &mut [ExtractedArticle],
    mode: ImageMode,
    output_dir: &str,
) -> Result<Vec<FetchedImage>, Box<dyn Error>> {
    // Fetch each unique URL once, batch-wide.
    let mut by_url: HashMap<String, Option<usize>> = HashMap::new();
    let mut fetched: Vec<FetchedImage> = Vec::new();

    for article in articles.iter() {
        for image in &article.images {
            if by_url.contains_key(&image.source_url) {
                continue;
            }
            let entry = match fetcher.bytes(&image.source_url).await {
                Ok((bytes, content_type)) => {
                    let media_type = media_type_of(content_type.as_deref());
                    let local_name = format!(
                        "images/img-{:04}.{}",
                        fetched.len() + 1,
                        extension_of(&media_type)
                    );
                    fetched.push(FetchedImage {
                        original_url: image.source_url.clone(),
                        local_name,
                        media_type,
                        bytes,
                    });
                    Some(fetched.len() - 1)
                }
                Err(e) => {
                    warn!(url = %image.source_url, error = %e, "Image download failed; reference will be dropped");
                    None
                }
            };
            by_url.insert(image.source_url.clone(), entry);
        }
    }

    for article in articles.iter_mut() {
        for image in &article.images {
            match by_url.get(&image.source_url).copied().flatten() {
                Some(idx) => {
                    let img = &fetched[idx];
                    let replacement = match mode {
                        ImageMode::Inline => format!(
                            "data:{};base64,{}",
                            img.media_type,
                            BASE64.encode(&img.bytes)
                        ),
                        ImageMode::Disk | ImageMode::Bundle => img.local_name.clone(),
                    };
                    article.body = substitute_src(&article.body, &image.source_url, &replacement);
                }
                None => {
                    article.body = remove_image_tag(&article.body, &image.source_url);
                }
            }
        }
        article
            .images
            .retain(|img| by_url.get(&img.source_url).copied().flatten().is_some());
    }

    if mode == ImageMode::Disk && !fetched.is_empty() {
        let images_dir = format!("{}/images", output_dir.trim_end_matches('/'));
        tokio::fs::create_dir_all(&images_dir).await?;
        for img in &fetched {
            let file_name = img.local_name.trim_start_matches("images/");
            tokio::fs::write(format!("{}/{}", images_dir, file_name), &img.bytes).await?;
        }
    }

    info!(
        unique = by_url.len(),
        downloaded = fetched.len(),
        "Processed image batch"
    );
    Ok(match mode {
        ImageMode::Inline => Vec::new(),
        ImageMode::Disk | ImageMode::Bundle => fetched,
    })
}

/// Rewrite one `src` value inside sanitized body markup.
pub fn substitute_src(body: &str, original_url: &str, replacement: &str) -> String {
    let needle = format!(r#"src="{}""#, crate::utils::escape_attr(original_url));
    let new = format!(r#"src="{}""#, crate::utils::escape_attr(replacement));
    body.replace(&needle, &new)
}

/// Remove every `<img .../>` tag referencing `original_url`.
pub fn remove_image_tag(body: &str, original_url: &str) -> String {
    let escaped = regex::escape(&crate::utils::escape_attr(original_url));
    // The sanitizer emits img tags in exactly this self-closing shape.
    let pattern = format!(r#"<img src="{}"[^>]*/>"#, escaped);
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(body, "").into_owned(),
        Err(_) => body.to_string(),
    }
}

fn media_type_of(content_type: Option<&str>) -> String {
    content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_lowercase())
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn extension_of(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}
