//! Utility functions for string normalization, escaping, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Title normalization and slugification for dedup and anchor links
//! - HTML text/attribute escaping for the serializers
//! - File system validation for the output directory

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalize a title for duplicate detection.
///
/// Lowercases, trims, and collapses internal whitespace so that titles
/// differing only in case or spacing compare equal.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_title("  Hello   World "), "hello world");
/// ```
pub fn normalize_title(title: &str) -> String {
    RE_WHITESPACE
        .replace_all(title.trim(), " ")
        .to_lowercase()
}

/// Convert a title to a URL-friendly slug.
///
/// Used to generate anchor links in the HTML table of contents. Lowercases
/// the text, removes special characters, and replaces spaces with hyphens.
pub fn slugify_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-', "")
        .replace(' ', "-")
}

/// Capitalize the first character of a string.
///
/// Used for formatting category headings (e.g. "news" -> "News").
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Escape text for placement inside an HTML or XML text node.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape text for placement inside a double-quoted HTML/XML attribute.
pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
