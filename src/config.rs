//! Run configuration: watched sources, addresses, paths, and timeouts.
//!
//! Configuration comes from three layers, later layers winning:
//! 1. Built-in defaults (the three sections of the watched site)
//! 2. An optional YAML file passed with `--config`
//! 3. Individual CLI flags / environment variables
//!
//! The addresses and paths used to be hard-coded in the delivery code; they
//! are now carried in a single [`RunConfig`] value handed into the pipeline.

use serde::{Deserialize, Serialize};
use std::error::Error;
use tracing::{info, instrument};

/// One watched listing page.
///
/// `allow` is the set of URL path fragments a hyperlink must contain to be
/// considered an article link on this listing. The `label` doubles as the
/// article category in the assembled document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Category label, e.g. "news".
    pub label: String,
    /// Listing page URL.
    pub url: String,
    /// Allow-listed path fragments for article links.
    pub allow: Vec<String>,
}

/// Full configuration for a single run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Kindle device address the deliverable is mailed to.
    pub kindle_address: String,
    /// Human address that receives the confirmation notice.
    pub notification_address: String,
    /// Path of the JSON state file.
    pub state_path: String,
    /// Directory the deliverable (and disk-mode images) are written to.
    pub output_dir: String,
    /// Listing pages to poll, in category-priority order.
    pub sources: Vec<SourceConfig>,
    /// Per-source cap on newly discovered articles.
    pub max_articles_per_source: usize,
    /// Timeout for a single page fetch, in seconds.
    pub page_timeout_secs: u64,
    /// Timeout for a single image download, in seconds.
    pub image_timeout_secs: u64,
    /// Overall deadline for the whole run, in seconds.
    pub run_deadline_secs: u64,
    /// Suffix stripped from `<title>` contents, e.g. " | Example Blog".
    pub site_title_suffix: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            kindle_address: "device@kindle.com".to_string(),
            notification_address: "me@example.com".to_string(),
            state_path: "kindle_digest_state.json".to_string(),
            output_dir: "out".to_string(),
            sources: vec![
                SourceConfig {
                    label: "news".to_string(),
                    url: "https://example.com/news".to_string(),
                    allow: vec!["/news/".to_string(), "/blog/".to_string()],
                },
                SourceConfig {
                    label: "engineering".to_string(),
                    url: "https://example.com/engineering".to_string(),
                    allow: vec!["/engineering/".to_string()],
                },
                SourceConfig {
                    label: "research".to_string(),
                    url: "https://example.com/research".to_string(),
                    allow: vec!["/research/".to_string(), "/papers/".to_string()],
                },
            ],
            max_articles_per_source: 5,
            page_timeout_secs: 30,
            image_timeout_secs: 10,
            run_deadline_secs: 600,
            site_title_suffix: String::new(),
        }
    }
}

impl RunConfig {
    /// Load configuration from an optional YAML file.
    ///
    /// `None` yields the built-in defaults. A present-but-unreadable or
    /// malformed file is an error: a misconfigured run should fail loudly
    /// rather than silently mail the wrong mailbox.
    #[instrument(level = "info", skip_all, fields(path = ?path))]
    pub async fn load(path: Option<&str>) -> Result<RunConfig, Box<dyn Error>> {
        match path {
            None => Ok(RunConfig::default()),
            Some(p) => {
                let raw = tokio::fs::read_to_string(p).await?;
                let config: RunConfig = serde_yaml::from_str(&raw)?;
                info!(path = p, sources = config.sources.len(), "Loaded configuration file");
                Ok(config)
            }
        }
    }

    /// Priority rank of a category: its position in the configured source
    /// order. Unknown categories sort after all configured ones.
    pub fn category_rank(&self, category: &str) -> usize {
        self.sources
            .iter()
            .position(|s| s.label == category)
            .unwrap_or(self.sources.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_three_sources() {
        let config = RunConfig::default();
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[0].label, "news");
        assert_eq!(config.max_articles_per_source, 5);
    }

    #[test]
    fn test_category_rank_follows_source_order() {
        let config = RunConfig::default();
        assert_eq!(config.category_rank("news"), 0);
        assert_eq!(config.category_rank("engineering"), 1);
        assert_eq!(config.category_rank("research"), 2);
        assert_eq!(config.category_rank("unknown"), 3);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
kindle_address: "reader@kindle.com"
max_articles_per_source: 3
"#;
        let config: RunConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.kindle_address, "reader@kindle.com");
        assert_eq!(config.max_articles_per_source, 3);
        // untouched fields come from Default
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.image_timeout_secs, 10);
    }

    #[test]
    fn test_sources_yaml_round_trip() {
        let config = RunConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: RunConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.sources.len(), config.sources.len());
        assert_eq!(back.sources[1].allow, config.sources[1].allow);
    }

    #[tokio::test]
    async fn test_load_none_is_default() {
        let config = RunConfig::load(None).await.unwrap();
        assert_eq!(config.run_deadline_secs, 600);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_error() {
        let result = RunConfig::load(Some("/nonexistent/config.yaml")).await;
        assert!(result.is_err());
    }
}
