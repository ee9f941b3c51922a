use tracing::info;

/// Domain marker every supported URL must carry.
pub const SITE_MARKER: &str = "g2.com";
/// Path segment marking a product page.
pub const PRODUCT_MARKER: &str = "product";
/// Path segment marking a review page.
pub const REVIEW_MARKER: &str = "review";

/// Gate a URL on the supported path shape: g2.com product review pages.
///
/// Checks run in order and the first miss short-circuits; each rejection is
/// logged with its reason so skipped input rows are traceable.
pub fn is_supported_review_url(url: &str) -> bool {
    if !url.contains(SITE_MARKER) {
        info!(%url, "only {SITE_MARKER} URLs are supported, skipping");
        return false;
    }
    if !url.contains(PRODUCT_MARKER) {
        info!(%url, "only product pages are supported, skipping");
        return false;
    }
    if !url.contains(REVIEW_MARKER) {
        info!(%url, "URL does not point at reviews, skipping");
        return false;
    }
    true
}
