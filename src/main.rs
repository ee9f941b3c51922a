use std::path::Path;

use tracing::{info, warn};

use review_scout::config::RunSettings;
use review_scout::navigator::{LiveDriver, ReviewCrawler};
use review_scout::scraping::browser_manager::{BrowserSession, BrowserSettings};
use review_scout::{export, input};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let settings = RunSettings::resolve(&args);

    info!(
        input = %settings.input_path,
        output = %settings.output_path,
        headless = settings.headless,
        "starting review harvest"
    );

    let urls = input::load_target_urls(Path::new(&settings.input_path))?;
    if urls.is_empty() {
        warn!("input file contains no URLs, nothing to do");
        return Ok(());
    }
    info!(count = urls.len(), "loaded target URLs");

    let browser_settings = BrowserSettings {
        headless: settings.headless,
        ..Default::default()
    };
    let session = BrowserSession::launch(&browser_settings).await?;

    let crawler = ReviewCrawler::new(LiveDriver::new(session.page()));
    let (index, summary) = crawler.run(&urls).await;

    // The session is released however many URLs were skipped.
    session.close().await;

    export::write_company_index(&index, Path::new(&settings.output_path))?;

    info!(
        harvested = summary.harvested,
        rejected = summary.rejected_urls,
        navigation_failures = summary.navigation_failures,
        challenge_failures = summary.challenge_failures,
        content_failures = summary.content_failures,
        started_at = %summary.started_at,
        completed_at = %summary.completed_at,
        "run complete, company index written"
    );

    Ok(())
}
