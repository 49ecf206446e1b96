//! HTTP fetching with bounded redirects and per-request timeouts.
//!
//! A single [`Fetcher`] wraps one `reqwest::Client` shared across the run.
//! Redirects are capped at five hops; an uncapped chain can loop forever on a
//! misbehaving site, so the cap turns that into an ordinary fetch error the
//! caller skips past.
//!
//! Every fetch carries its own timeout: page fetches use the configured page
//! timeout, image fetches a shorter one, so a single stuck server can never
//! hang the run beyond the overall deadline.

use reqwest::redirect::Policy;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, instrument};

/// Maximum redirect hops before a fetch is treated as failed.
const MAX_REDIRECTS: usize = 5;

const USER_AGENT: &str = concat!("kindle_digest/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for listing pages, article pages, and images.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    page_timeout: Duration,
    image_timeout: Duration,
}

impl Fetcher {
    /// Build a fetcher with the run's configured timeouts.
    pub fn new(page_timeout_secs: u64, image_timeout_secs: u64) -> Result<Fetcher, Box<dyn Error>> {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Fetcher {
            client,
            page_timeout: Duration::from_secs(page_timeout_secs),
            image_timeout: Duration::from_secs(image_timeout_secs),
        })
    }

    /// Fetch a page and return its body text.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, timeout, too many redirects, or a non-2xx
    /// status. Callers skip the affected page rather than abort the run.
    #[instrument(level = "debug", skip(self))]
    pub async fn text(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let response = self
            .client
            .get(url)
            .timeout(self.page_timeout)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }

    /// Fetch an image and return its bytes plus the reported content type.
    ///
    /// Uses the shorter image timeout so one unavailable image never stalls
    /// the batch.
    #[instrument(level = "debug", skip(self))]
    pub async fn bytes(&self, url: &str) -> Result<(Vec<u8>, Option<String>), Box<dyn Error>> {
        let response = self
            .client
            .get(url)
            .timeout(self.image_timeout)
            .send()
            .await?
            .error_for_status()?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response.bytes().await?.to_vec();
        debug!(bytes = bytes.len(), content_type = ?content_type, "Fetched image");
        Ok((bytes, content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_builds() {
        let fetcher = Fetcher::new(30, 10).unwrap();
        assert_eq!(fetcher.page_timeout, Duration::from_secs(30));
        assert_eq!(fetcher.image_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_invalid_url_is_error() {
        let fetcher = Fetcher::new(5, 5).unwrap();
        assert!(fetcher.text("not a url").await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_error_not_panic() {
        let fetcher = Fetcher::new(1, 1).unwrap();
        // reserved TLD, guaranteed to fail resolution
        let result = fetcher.text("http://nonexistent.invalid/page").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stalled_server_hits_image_timeout() {
        use tokio::io::AsyncReadExt;

        // Accept the connection, read the request, and never respond.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            }
        });

        let fetcher = Fetcher::new(30, 1).unwrap();
        let start = std::time::Instant::now();
        let result = fetcher.bytes(&format!("http://{}/slow.png", addr)).await;
        assert!(result.is_err());
        // the 1 s image timeout fired, not the 30 s page timeout
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
