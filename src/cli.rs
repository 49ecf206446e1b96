//! Command-line interface definitions for Kindle Digest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Addresses can be provided via command-line flags or environment variables;
//! any flag given here overrides the corresponding YAML config field.

use clap::{Parser, ValueEnum};

/// Output packaging strategy for the assembled digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Styled single-file HTML with a table of contents.
    Html,
    /// EPUB container with one chapter per article.
    Epub,
    /// Tag-stripped plain-text digest.
    Text,
}

/// How downloaded images end up in the HTML deliverable.
///
/// Ignored for EPUB (always bundled into the container) and text (never
/// downloaded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageHandling {
    /// Embed as base64 data URIs; the document is self-contained.
    Inline,
    /// Write numbered files under `{output_dir}/images/` and reference them
    /// by relative path.
    Disk,
}

/// Command-line arguments for the Kindle Digest application.
///
/// # Examples
///
/// ```sh
/// # Default EPUB run with the built-in source list
/// kindle_digest --kindle-address reader_123@kindle.com --notify-address me@example.com
///
/// # HTML output from a config file, without sending mail
/// kindle_digest -c digest.yaml -f html --no-send
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output packaging: html, epub, or text
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Epub)]
    pub format: OutputFormat,

    /// Output directory for the deliverable (overrides config)
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Path of the JSON state file (overrides config)
    #[arg(long)]
    pub state_path: Option<String>,

    /// Kindle device address (overrides config)
    #[arg(long, env = "KINDLE_ADDRESS")]
    pub kindle_address: Option<String>,

    /// Notification address for the confirmation notice (overrides config)
    #[arg(long, env = "NOTIFY_ADDRESS")]
    pub notify_address: Option<String>,

    /// Image packaging for HTML output (epub/text ignore this)
    #[arg(long, value_enum, default_value_t = ImageHandling::Inline)]
    pub images: ImageHandling,

    /// Build the deliverable and update state, but skip mail dispatch
    #[arg(long, default_value_t = false)]
    pub no_send: bool,

    /// Overall run deadline in seconds (overrides config)
    #[arg(long)]
    pub run_deadline_secs: Option<u64>,
}

impl Cli {
    /// Fold CLI overrides into a loaded [`crate::config::RunConfig`].
    pub fn apply_to(&self, config: &mut crate::config::RunConfig) {
        if let Some(ref dir) = self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(ref path) = self.state_path {
            config.state_path = path.clone();
        }
        if let Some(ref addr) = self.kindle_address {
            config.kindle_address = addr.clone();
        }
        if let Some(ref addr) = self.notify_address {
            config.notification_address = addr.clone();
        }
        if let Some(secs) = self.run_deadline_secs {
            config.run_deadline_secs = secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["kindle_digest"]);
        assert_eq!(cli.format, OutputFormat::Epub);
        assert_eq!(cli.images, ImageHandling::Inline);
        assert!(!cli.no_send);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_image_handling_values() {
        let cli = Cli::parse_from(["kindle_digest", "-f", "html", "--images", "disk"]);
        assert_eq!(cli.images, ImageHandling::Disk);
        let cli = Cli::parse_from(["kindle_digest", "-f", "html", "--images", "inline"]);
        assert_eq!(cli.images, ImageHandling::Inline);
    }

    #[test]
    fn test_cli_format_values() {
        let cli = Cli::parse_from(["kindle_digest", "-f", "html"]);
        assert_eq!(cli.format, OutputFormat::Html);
        let cli = Cli::parse_from(["kindle_digest", "--format", "text"]);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "kindle_digest",
            "--kindle-address",
            "override@kindle.com",
            "--output-dir",
            "/tmp/digest",
            "--run-deadline-secs",
            "120",
        ]);
        let mut config = RunConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.kindle_address, "override@kindle.com");
        assert_eq!(config.output_dir, "/tmp/digest");
        assert_eq!(config.run_deadline_secs, 120);
        // untouched fields keep their config value
        assert_eq!(config.notification_address, "me@example.com");
    }
}
