use chromiumoxide::error::CdpError;

/// Per-URL failure taxonomy. None of these abort the run; the navigator
/// logs the failure and moves on to the next URL.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("URL is not navigable: {0}")]
    InvalidUrl(String),

    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: CdpError,
    },

    #[error("could not capture rendered page content: {0}")]
    Content(#[source] CdpError),
}
