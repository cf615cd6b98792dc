//! Concurrent HTML retrieval.
//!
//! Every URL in a batch is fetched as its own unit of work; a failed or
//! slow URL costs only its own page, never the batch. Failures become
//! empty-content pages that fall out naturally at the content matcher's
//! minimum-length check.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use tracing::{info, warn};

use crate::types::{Page, SiteTag};

/// Trait for HTML fetch clients (to allow mocking)
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// Raw fetch result before page construction
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// HTTP fetcher over reqwest with a per-request timeout
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        // Browser-like User-Agent to avoid bot detection
        let user_agent = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        Ok(FetchedPage { status, body })
    }
}

/// Fetch every URL concurrently and build pages from the responses.
///
/// Output has the same length and order as the input. Network errors,
/// timeouts, and non-200 responses yield empty-content pages.
pub async fn scrape_pages(urls: &[String], site: SiteTag, fetcher: &dyn PageFetcher) -> Vec<Page> {
    let futures: Vec<_> = urls
        .iter()
        .map(|url| scrape_page(url, site, fetcher))
        .collect();

    let pages = join_all(futures).await;

    let failed = pages.iter().filter(|p| p.html.is_empty()).count();
    info!(
        site = %site,
        total = pages.len(),
        failed = failed,
        "Scraping complete"
    );

    pages
}

async fn scrape_page(url: &str, site: SiteTag, fetcher: &dyn PageFetcher) -> Page {
    match fetcher.fetch(url).await {
        Ok(fetched) if fetched.status == 200 => Page::new(url.to_string(), site, fetched.body),
        Ok(fetched) => {
            warn!(url = %url, status = fetched.status, "Non-200 response, treating page as empty");
            Page::empty(url.to_string(), site)
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Fetch failed, treating page as empty");
            Page::empty(url.to_string(), site)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    #[tokio::test]
    async fn test_scrape_preserves_length_and_order() {
        let fetcher = MockFetcher::new()
            .with_page("http://old.com/a", "<html><body>Alpha page content</body></html>")
            .with_page("http://old.com/b", "<html><body>Beta page content</body></html>");

        let urls = vec![
            "http://old.com/a".to_string(),
            "http://old.com/b".to_string(),
        ];
        let pages = scrape_pages(&urls, SiteTag::Old, &fetcher).await;

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].url, "http://old.com/a");
        assert_eq!(pages[1].url, "http://old.com/b");
        assert!(pages[0].html.contains("Alpha"));
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_url() {
        let fetcher = MockFetcher::new()
            .with_page("http://old.com/ok", "<html><body>Still here today</body></html>")
            .with_status("http://old.com/gone", 404)
            .with_error("http://old.com/down");

        let urls = vec![
            "http://old.com/ok".to_string(),
            "http://old.com/gone".to_string(),
            "http://old.com/down".to_string(),
        ];
        let pages = scrape_pages(&urls, SiteTag::Old, &fetcher).await;

        assert_eq!(pages.len(), 3);
        assert!(!pages[0].html.is_empty());
        assert!(pages[1].html.is_empty());
        assert!(pages[2].html.is_empty());
    }

    #[tokio::test]
    async fn test_records_fetch_calls() {
        let fetcher = MockFetcher::new().with_page("http://old.com/a", "<html></html>");

        let urls = vec!["http://old.com/a".to_string()];
        scrape_pages(&urls, SiteTag::Old, &fetcher).await;

        assert_eq!(fetcher.fetch_calls(), vec!["http://old.com/a"]);
    }
}
