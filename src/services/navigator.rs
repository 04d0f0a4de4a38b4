use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::Page;
use rand::Rng;
use tokio::time::{sleep, timeout, Instant};

use crate::configuration::ScraperSettings;

const PRE_NAVIGATION_JITTER_MS: (u64, u64) = (500, 1500);
const POST_NAVIGATION_JITTER_MS: (u64, u64) = (250, 750);
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn failure_screenshot_path() -> PathBuf {
    std::env::temp_dir().join("podracer-navigation-failure.png")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Succeeded,
    /// The page loaded but the expected content never appeared.
    SoftFailed(String),
    /// Navigation itself kept failing; a diagnostic screenshot was taken.
    FatalFailed(String),
}

impl NavOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, NavOutcome::Succeeded)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            NavOutcome::Succeeded => None,
            NavOutcome::SoftFailed(reason) | NavOutcome::FatalFailed(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavPolicy {
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl NavPolicy {
    pub fn from_settings(settings: &ScraperSettings) -> Self {
        Self {
            navigation_timeout: settings.navigation_timeout(),
            selector_timeout: settings.selector_timeout(),
            retries: settings.navigation_retries,
            retry_delay: settings.retry_delay(),
        }
    }
}

/// Navigation-level failures are retried with a linearly growing delay.
/// A missing selector is a soft failure: the page answered, the expected
/// content never showed up.
pub async fn goto(
    page: &Page,
    url: &str,
    wait_selector: Option<&str>,
    policy: &NavPolicy,
) -> NavOutcome {
    pause(PRE_NAVIGATION_JITTER_MS).await;

    let mut last_error = String::new();
    let mut landed = false;
    for attempt in 1..=policy.retries + 1 {
        match navigate_once(page, url, policy.navigation_timeout).await {
            Ok(()) => {
                landed = true;
                break;
            }
            Err(reason) => {
                log::warn!("Navigation attempt {} to {} failed: {}", attempt, url, reason);
                last_error = reason;
                if attempt <= policy.retries {
                    sleep(policy.retry_delay * attempt).await;
                }
            }
        }
    }
    if !landed {
        capture_failure_screenshot(page).await;
        return NavOutcome::FatalFailed(last_error);
    }

    if let Some(selector) = wait_selector {
        if !wait_for_selector(page, selector, policy.selector_timeout).await {
            return NavOutcome::SoftFailed(format!(
                "selector {} did not appear within {:?}",
                selector, policy.selector_timeout
            ));
        }
    }

    pause(POST_NAVIGATION_JITTER_MS).await;
    NavOutcome::Succeeded
}

async fn navigate_once(page: &Page, url: &str, budget: Duration) -> Result<(), String> {
    let navigation = async {
        page.goto(url).await.map_err(|e| e.to_string())?;
        page.wait_for_navigation().await.map_err(|e| e.to_string())?;
        Ok(())
    };
    match timeout(budget, navigation).await {
        Ok(result) => result,
        Err(_) => Err(format!("page load exceeded {:?}", budget)),
    }
}

/// `find_element` answers immediately, so presence has to be polled
/// rather than awaited.
pub async fn wait_for_selector(page: &Page, selector: &str, budget: Duration) -> bool {
    let deadline = Instant::now() + budget;
    loop {
        if page.find_element(selector).await.is_ok() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(SELECTOR_POLL_INTERVAL).await;
    }
}

fn jitter_ms(range: (u64, u64)) -> u64 {
    rand::thread_rng().gen_range(range.0..=range.1)
}

async fn pause(range: (u64, u64)) {
    sleep(Duration::from_millis(jitter_ms(range))).await;
}

async fn capture_failure_screenshot(page: &Page) {
    let params = CaptureScreenshotParams {
        quality: Some(100),
        format: Some(CaptureScreenshotFormat::Png),
        capture_beyond_viewport: Some(true),
        ..Default::default()
    };
    match page.screenshot(params).await {
        Ok(bytes) => {
            let path = failure_screenshot_path();
            match tokio::fs::write(&path, bytes).await {
                Ok(()) => log::info!("Saved failure screenshot to {}", path.display()),
                Err(error) => log::warn!("Failed to write failure screenshot: {}", error),
            }
        }
        Err(error) => log::warn!("Failed to capture failure screenshot: {}", error),
    }
}
