use std::path::Path;

pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";
pub const ENV_INPUT_PATH: &str = "REVIEW_SCOUT_INPUT";
pub const ENV_OUTPUT_PATH: &str = "REVIEW_SCOUT_OUTPUT";
pub const ENV_HEADLESS: &str = "REVIEW_SCOUT_HEADLESS";

/// Default input file: a CSV with a `urls` column.
pub const DEFAULT_INPUT_PATH: &str = "g2_urls.csv";
/// Default output file: the accumulated company index as JSON.
pub const DEFAULT_OUTPUT_PATH: &str = "company_details.json";

/// Optional override for the Chromium-family browser executable.
///
/// Default behavior is auto-discovery (see
/// `scraping::browser_manager::find_chrome_executable()`). This only returns
/// a value when `CHROME_EXECUTABLE` points at an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}

/// Whether the browser runs headless.
///
/// Verification widgets are markedly less cooperative without a visible
/// window, so the default is headful. Set `REVIEW_SCOUT_HEADLESS=1` (or pass
/// `--headless`) to flip.
pub fn headless_enabled() -> bool {
    let Ok(v) = std::env::var(ENV_HEADLESS) else {
        return false;
    };
    let v = v.trim().to_ascii_lowercase();
    matches!(v.as_str(), "1" | "true" | "yes" | "on")
}

/// Scan argv for `--flag value` / `--flag=value`.
pub fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    let mut iter = args.iter().peekable();
    while let Some(a) = iter.next() {
        if a == flag {
            if let Some(v) = iter.peek() {
                return Some(v.to_string());
            }
        } else if let Some(rest) = a.strip_prefix(&prefix) {
            return Some(rest.to_string());
        }
    }
    None
}

/// Resolved run settings: CLI flag → env var → default.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub input_path: String,
    pub output_path: String,
    pub headless: bool,
}

impl RunSettings {
    pub fn resolve(args: &[String]) -> Self {
        let input_path = flag_value(args, "--input")
            .or_else(|| std::env::var(ENV_INPUT_PATH).ok())
            .unwrap_or_else(|| DEFAULT_INPUT_PATH.to_string());
        let output_path = flag_value(args, "--output")
            .or_else(|| std::env::var(ENV_OUTPUT_PATH).ok())
            .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string());
        let headless = args.iter().any(|a| a == "--headless") || headless_enabled();

        Self {
            input_path,
            output_path,
            headless,
        }
    }
}
