use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::Page;
use futures::StreamExt;
use rand::seq::SliceRandom;
use serde_json::json;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::configuration::BrowserSettings;

// Registered on every new document, before any page script runs.
const MASKING_SCRIPTS: &[&str] = &[
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    r#"
    window.chrome = {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-GB', 'en'],
        configurable: true
    });
    "#,
    r#"
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications' ?
        Promise.resolve({ state: Notification.permission }) :
        originalQuery(parameters)
    );
    "#,
];

const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-first-run",
    "--no-default-browser-check",
    "--mute-audio",
    "--hide-scrollbars",
];

const PATH_LOOKUP_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("no usable browser executable found, tried: {tried:?}")]
    ExecutableNotFound { tried: Vec<String> },
    #[error("failed to download a managed browser: {0}")]
    Download(String),
    #[error("failed to assemble browser launch options: {0}")]
    LaunchOptions(String),
    #[error("browser command failed: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// One live Chromium session. `release` consumes the droid, so a
/// session cannot be torn down twice.
pub struct Droid {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl Droid {
    pub async fn acquire(
        settings: &BrowserSettings,
        request_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let executable = resolve_executable(settings).await?;
        let profile_dir =
            std::env::temp_dir().join(format!("podracer-profile-{}", Uuid::new_v4()));

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(&profile_dir)
            .window_size(settings.window_width, settings.window_height)
            .request_timeout(request_timeout);
        if !settings.headless {
            builder = builder.with_head();
        }
        if !settings.sandbox {
            builder = builder.no_sandbox().arg("--disable-setuid-sandbox");
        }
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        let config = builder.build().map_err(SessionError::LaunchOptions)?;

        let (browser, mut events) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        match prepare_page(&browser, settings).await {
            Ok(page) => {
                log::info!("Browser session ready");
                Ok(Self {
                    browser,
                    page,
                    handler,
                    profile_dir,
                })
            }
            Err(error) => {
                log::error!("Browser session setup failed: {}", error);
                shutdown(browser, handler, &profile_dir).await;
                Err(error)
            }
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Best-effort teardown; failures are logged, never propagated.
    pub async fn release(self) {
        shutdown(self.browser, self.handler, &self.profile_dir).await;
    }
}

async fn resolve_executable(settings: &BrowserSettings) -> Result<PathBuf, SessionError> {
    if let Some(configured) = &settings.executable_path {
        let path = Path::new(configured);
        if path.exists() {
            log::info!("Using configured browser executable: {}", configured);
            return Ok(path.to_path_buf());
        }
        log::warn!(
            "Configured browser executable {} does not exist, probing candidates",
            configured
        );
    }

    for candidate in &settings.executable_candidates {
        let path = Path::new(candidate);
        if path.exists() {
            log::info!("Found browser executable: {}", candidate);
            return Ok(path.to_path_buf());
        }
    }

    for name in PATH_LOOKUP_NAMES {
        if let Ok(path) = which::which(name) {
            log::info!("Found browser executable in PATH: {}", path.display());
            return Ok(path);
        }
    }

    if settings.download_fallback {
        return download_managed_browser().await;
    }

    Err(SessionError::ExecutableNotFound {
        tried: settings
            .executable_candidates
            .iter()
            .cloned()
            .chain(PATH_LOOKUP_NAMES.iter().map(|name| name.to_string()))
            .collect(),
    })
}

async fn download_managed_browser() -> Result<PathBuf, SessionError> {
    log::info!("No browser executable found, downloading a managed build");

    let cache_dir = std::env::temp_dir().join("podracer-browser");
    std::fs::create_dir_all(&cache_dir).map_err(|e| SessionError::Download(e.to_string()))?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .map_err(|e| SessionError::Download(e.to_string()))?,
    );
    let revision = fetcher
        .fetch()
        .await
        .map_err(|e| SessionError::Download(e.to_string()))?;

    log::info!(
        "Downloaded managed browser to {}",
        revision.folder_path.display()
    );
    Ok(revision.executable_path)
}

async fn prepare_page(browser: &Browser, settings: &BrowserSettings) -> Result<Page, SessionError> {
    let page = browser.new_page("about:blank").await?;

    if let Some(agent) = settings.user_agents.choose(&mut rand::thread_rng()) {
        page.execute(SetUserAgentOverrideParams::new(agent.clone()))
            .await?;
    }

    page.execute(
        SetDeviceMetricsOverrideParams::builder()
            .width(settings.window_width)
            .height(settings.window_height)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(SessionError::LaunchOptions)?,
    )
    .await?;

    page.execute(SetExtraHttpHeadersParams::new(Headers::new(json!({
        "Accept-Language": settings.accept_language,
        "Accept": settings.accept,
        "Cache-Control": settings.cache_control,
    }))))
    .await?;

    if settings.mask_automation {
        for script in MASKING_SCRIPTS {
            page.execute(AddScriptToEvaluateOnNewDocumentParams {
                source: (*script).to_string(),
                include_command_line_api: None,
                world_name: None,
                run_immediately: None,
            })
            .await?;
        }
    }

    Ok(page)
}

async fn shutdown(mut browser: Browser, handler: JoinHandle<()>, profile_dir: &Path) {
    if let Err(error) = browser.close().await {
        log::warn!("Failed to close browser cleanly: {}", error);
    }
    if let Err(error) = browser.wait().await {
        log::warn!("Failed to reap browser process: {}", error);
    }
    handler.abort();
    if profile_dir.exists() {
        if let Err(error) = std::fs::remove_dir_all(profile_dir) {
            log::warn!(
                "Failed to remove browser profile {}: {}",
                profile_dir.display(),
                error
            );
        }
    }
}

/// Caps concurrent browser sessions; a permit is held for the whole run.
pub struct SessionGate {
    permits: Semaphore,
}

impl SessionGate {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            permits: Semaphore::new(max_sessions),
        }
    }

    pub async fn enter(&self) -> SemaphorePermit<'_> {
        // The semaphore is never closed, so acquire can only succeed or wait.
        self.permits
            .acquire()
            .await
            .expect("session gate semaphore closed")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::SessionGate;

    #[tokio::test]
    async fn gate_blocks_when_all_permits_are_held() {
        let gate = SessionGate::new(1);
        let held = gate.enter().await;

        let second = tokio::time::timeout(Duration::from_millis(50), gate.enter()).await;
        assert!(second.is_err());

        drop(held);
        let third = tokio::time::timeout(Duration::from_millis(50), gate.enter()).await;
        assert!(third.is_ok());
    }
}
