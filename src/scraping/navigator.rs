//! Per-URL navigation pipeline.
//!
//! One page, strictly sequential: validate → navigate → pass the
//! verification challenge → capture rendered HTML → extract → accumulate.
//! Every failure mode logs and skips the URL; the run always completes and
//! hands back whatever was harvested.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::Page;
use chrono::{DateTime, Utc};
use scraper::Html;
use tracing::{info, warn};
use url::Url;

use crate::core::error::ScrapeError;
use crate::core::types::CompanyDetailsIndex;
use crate::extract;
use crate::scraping::challenge::{
    self, ChallengeError, ChallengeOutcome, ChallengePolicy, LiveFrameHost,
};
use crate::validate;

/// The navigation steps the crawler needs from a page. Implemented by the
/// live browser page and by canned-HTML fakes in tests.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError>;

    async fn resolve_challenge(
        &self,
        policy: &ChallengePolicy,
    ) -> Result<ChallengeOutcome, ChallengeError>;

    async fn rendered_html(&self) -> Result<String, ScrapeError>;
}

/// [`PageDriver`] over the session's live page.
pub struct LiveDriver {
    page: Arc<Page>,
}

impl LiveDriver {
    pub fn new(page: Arc<Page>) -> Self {
        Self { page }
    }
}

#[async_trait]
impl PageDriver for LiveDriver {
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        let parsed =
            Url::parse(url).map_err(|e| ScrapeError::InvalidUrl(format!("{url}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ScrapeError::InvalidUrl(format!(
                "{url}: URL must use HTTP or HTTPS"
            )));
        }

        self.page
            .goto(url)
            .await
            .map_err(|source| ScrapeError::Navigation {
                url: url.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn resolve_challenge(
        &self,
        policy: &ChallengePolicy,
    ) -> Result<ChallengeOutcome, ChallengeError> {
        let host = LiveFrameHost::new(Arc::clone(&self.page));
        challenge::resolve_challenge(&host, policy).await
    }

    async fn rendered_html(&self) -> Result<String, ScrapeError> {
        self.page.content().await.map_err(ScrapeError::Content)
    }
}

/// Counters for one crawl run, logged at completion.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CrawlSummary {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub input_urls: usize,
    pub harvested: usize,
    pub rejected_urls: usize,
    pub navigation_failures: usize,
    pub challenge_failures: usize,
    pub content_failures: usize,
}

/// Sequential crawler over one [`PageDriver`].
pub struct ReviewCrawler<D> {
    driver: D,
    policy: ChallengePolicy,
}

impl<D: PageDriver> ReviewCrawler<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            policy: ChallengePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ChallengePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Process every URL in order. A failed URL is skipped for the run;
    /// nothing here aborts the crawl.
    pub async fn run(&self, urls: &[String]) -> (CompanyDetailsIndex, CrawlSummary) {
        let started_at = Utc::now();
        let mut index = CompanyDetailsIndex::new();
        let mut harvested = 0usize;
        let mut rejected_urls = 0usize;
        let mut navigation_failures = 0usize;
        let mut challenge_failures = 0usize;
        let mut content_failures = 0usize;

        for url in urls {
            if !validate::is_supported_review_url(url) {
                rejected_urls += 1;
                continue;
            }

            info!(%url, "processing review page");

            if let Err(error) = self.driver.navigate(url).await {
                warn!(%url, %error, "navigation failed, skipping");
                navigation_failures += 1;
                continue;
            }

            match self.driver.resolve_challenge(&self.policy).await {
                Ok(outcome) if outcome.passed() => {}
                Ok(outcome) => {
                    warn!(
                        %url,
                        attempts = outcome.attempts(),
                        "could not pass bot verification, skipping"
                    );
                    challenge_failures += 1;
                    continue;
                }
                Err(error) => {
                    warn!(%url, %error, "bot verification failed, skipping");
                    challenge_failures += 1;
                    continue;
                }
            }

            let html = match self.driver.rendered_html().await {
                Ok(html) => html,
                Err(error) => {
                    warn!(%url, %error, "unable to capture page content, skipping");
                    content_failures += 1;
                    continue;
                }
            };

            // Parsed document stays inside this block: it is not Send and
            // must not be held across an await.
            let details = {
                let document = Html::parse_document(&html);
                extract::review_details(&document, url)
            };

            info!(company = %details.company_name, %url, "harvested review aggregates");
            index.insert(details);
            harvested += 1;
        }

        let summary = CrawlSummary {
            started_at,
            completed_at: Utc::now(),
            input_urls: urls.len(),
            harvested,
            rejected_urls,
            navigation_failures,
            challenge_failures,
            content_failures,
        };
        (index, summary)
    }
}
