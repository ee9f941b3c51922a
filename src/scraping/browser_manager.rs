//! Browser session management using `chromiumoxide`.
//!
//! One browser process and one page are acquired at the start of a run and
//! released when the run completes; every target URL goes through that same
//! page sequentially. This module owns executable discovery, the launch
//! config, and the session lifecycle.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use rand::seq::IndexedRandom;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::config;

const DESKTOP_USER_AGENTS: &[&str] = &[
    // Chrome – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome – macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome – Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Firefox – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Edge – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
];

/// Returns a randomly-chosen realistic desktop User-Agent string.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    DESKTOP_USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan, which finds package-manager installs on all platforms.
/// 3. OS-specific well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Some(p) = config::chrome_executable_override() {
        return Some(p);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
            "brave-browser",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/local/bin/chromium",
            "/usr/bin/brave-browser",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

/// Launch-time knobs for the single browser session.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Headful by default; verification widgets behave better with a window.
    pub headless: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            width: 1280,
            height: 900,
        }
    }
}

/// Build a `BrowserConfig` with stealth defaults.
///
/// `--disable-blink-features=AutomationControlled` hides the
/// `navigator.webdriver` flag; the UA is drawn from `DESKTOP_USER_AGENTS`.
pub fn build_browser_config(exe: &str, settings: &BrowserSettings) -> Result<BrowserConfig> {
    let ua = random_user_agent();

    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width: settings.width,
            height: settings.height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(settings.width, settings.height)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--mute-audio")
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", ua));

    if !settings.headless {
        builder = builder.with_head();
    }

    builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

/// The run-scoped browser session: one process, one page.
///
/// Acquired once before the first URL and closed after the last, no matter
/// how many URLs were skipped along the way.
pub struct BrowserSession {
    browser: Browser,
    page: Arc<Page>,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let exe = find_chrome_executable().ok_or_else(|| {
            anyhow!("No browser found. Install Chrome or Chromium, or set CHROME_EXECUTABLE.")
        })?;

        info!(
            executable = %exe,
            headless = settings.headless,
            "launching browser session"
        );

        let cfg = build_browser_config(&exe, settings)?;
        let (browser, mut handler) = Browser::launch(cfg)
            .await
            .map_err(|e| anyhow!("Failed to launch browser ({}): {}", exe, e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to open page: {}", e))?;

        Ok(Self {
            browser,
            page: Arc::new(page),
            handler_task,
        })
    }

    /// Handle to the session's single page.
    pub fn page(&self) -> Arc<Page> {
        Arc::clone(&self.page)
    }

    /// Gracefully shut the browser down.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close error (non-fatal): {}", e);
        }
        self.handler_task.abort();
        info!("browser session closed");
    }
}
