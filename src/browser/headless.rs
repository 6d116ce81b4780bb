//! `headless_chrome` implementation of the browser traits. The crate is
//! synchronous, so every call hops onto the blocking pool.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::debug;

use super::stealth::stealth_script;
use super::{BrowserBackend, BrowserProcess, NavigationWait, PageDriver, PageProfile};
use crate::config::BrowserConfig;
use crate::utils::error::{AppError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Quiet period after `load` before a network-idle navigation counts as done.
const NETWORK_IDLE_GRACE: Duration = Duration::from_millis(500);

pub struct HeadlessChromeBackend {
    chrome_path: Option<PathBuf>,
    headless: bool,
}

impl HeadlessChromeBackend {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.as_ref().map(PathBuf::from),
            headless: config.headless,
        }
    }
}

#[async_trait]
impl BrowserBackend for HeadlessChromeBackend {
    async fn launch(&self) -> Result<Arc<dyn BrowserProcess>> {
        let chrome_path = self.chrome_path.clone();
        let headless = self.headless;

        let browser = tokio::task::spawn_blocking(move || -> Result<Browser> {
            let mut launch_options = LaunchOptions::default_builder()
                .headless(headless)
                .sandbox(false) // Often needed in containerized environments
                .idle_browser_timeout(Duration::from_secs(600))
                .args(vec![
                    OsStr::new("--no-sandbox"),
                    OsStr::new("--disable-setuid-sandbox"),
                    OsStr::new("--disable-dev-shm-usage"),
                    OsStr::new("--disable-accelerated-2d-canvas"),
                    OsStr::new("--no-first-run"),
                    OsStr::new("--no-zygote"),
                    OsStr::new("--disable-gpu"),
                    OsStr::new("--disable-blink-features=AutomationControlled"),
                    OsStr::new("--disable-features=VizDisplayCompositor"),
                    OsStr::new("--disable-background-timer-throttling"),
                    OsStr::new("--disable-backgrounding-occluded-windows"),
                    OsStr::new("--disable-renderer-backgrounding"),
                ])
                .build()
                .map_err(|e| AppError::Browser(format!("Failed to create launch options: {}", e)))?;

            if let Some(path) = chrome_path {
                launch_options.path = Some(path);
            }

            Browser::new(launch_options)
                .map_err(|e| AppError::Browser(format!("Failed to launch browser: {}", e)))
        })
        .await??;

        Ok(Arc::new(HeadlessProcess { browser }))
    }
}

pub struct HeadlessProcess {
    browser: Browser,
}

#[async_trait]
impl BrowserProcess for HeadlessProcess {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>> {
        let browser = self.browser.clone();
        let tab = tokio::task::spawn_blocking(move || browser.new_tab())
            .await?
            .map_err(|e| AppError::Browser(format!("Failed to create tab: {}", e)))?;

        Ok(Box::new(HeadlessPage {
            tab,
            default_timeout_ms: AtomicU64::new(90_000),
        }))
    }

    async fn close(&self) -> Result<()> {
        let browser = self.browser.clone();
        tokio::task::spawn_blocking(move || {
            // Closing every tab lets Chrome exit once the last handle drops
            let tabs = browser
                .get_tabs()
                .lock()
                .map(|tabs| tabs.clone())
                .unwrap_or_default();
            for tab in tabs {
                let _ = tab.close(false);
            }
        })
        .await?;
        Ok(())
    }
}

pub struct HeadlessPage {
    tab: Arc<Tab>,
    default_timeout_ms: AtomicU64,
}

impl HeadlessPage {
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Tab>) -> Result<T> + Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || op(tab)).await?
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms.load(Ordering::Relaxed))
    }
}

#[async_trait]
impl PageDriver for HeadlessPage {
    async fn prepare(&self, profile: &PageProfile, default_timeout: Duration) -> Result<()> {
        self.default_timeout_ms
            .store(default_timeout.as_millis() as u64, Ordering::Relaxed);

        let profile = profile.clone();
        self.blocking(move |tab| {
            tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
                source: stealth_script(),
                world_name: None,
                include_command_line_api: None,
                run_immediately: None,
            })
            .map_err(AppError::browser)?;

            tab.set_user_agent(&profile.user_agent, Some(super::profile::ACCEPT_LANGUAGE), None)
                .map_err(AppError::browser)?;

            let headers: HashMap<&str, &str> = profile
                .headers
                .iter()
                .map(|(name, value)| (*name, value.as_str()))
                .collect();
            tab.set_extra_http_headers(headers)
                .map_err(AppError::browser)?;

            // Window bounds are best effort; headless shells may refuse them
            if let Err(e) = tab.set_bounds(Bounds::Normal {
                left: Some(0),
                top: Some(0),
                width: Some(f64::from(profile.viewport.width)),
                height: Some(f64::from(profile.viewport.height)),
            }) {
                debug!(error = %e, "Could not resize window");
            }

            tab.set_default_timeout(default_timeout);
            Ok(())
        })
        .await
    }

    async fn navigate(&self, url: &str, wait: NavigationWait, timeout: Duration) -> Result<()> {
        let url = url.to_string();
        let default_timeout = self.default_timeout();

        self.blocking(move |tab| {
            tab.set_default_timeout(timeout);
            let outcome = navigate_blocking(&tab, &url, wait, timeout);
            tab.set_default_timeout(default_timeout);
            outcome
        })
        .await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            tab.wait_for_element_with_custom_timeout(&selector, timeout)
                .map(|_| ())
                .map_err(|e| AppError::Scraping(format!("Selector '{}' did not appear: {}", selector, e)))
        })
        .await
    }

    async fn wait_for_hidden(&self, selector: &str, timeout: Duration) -> Result<()> {
        let script = hidden_probe_script(selector)?;
        let selector = selector.to_string();

        self.blocking(move |tab| {
            let deadline = Instant::now() + timeout;
            loop {
                let hidden = tab
                    .evaluate(&script, false)
                    .ok()
                    .and_then(|r| r.value)
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if hidden {
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err(AppError::Scraping(format!(
                        "Selector '{}' still visible after {}ms",
                        selector,
                        timeout.as_millis()
                    )));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        })
        .await
    }

    async fn title(&self) -> Result<String> {
        self.blocking(|tab| tab.get_title().map_err(AppError::browser)).await
    }

    async fn current_url(&self) -> Result<String> {
        self.blocking(|tab| Ok(tab.get_url())).await
    }

    async fn content(&self) -> Result<String> {
        self.blocking(|tab| {
            tab.get_content()
                .map_err(|e| AppError::Browser(format!("Failed to get page content: {}", e)))
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        self.blocking(|tab| tab.close(true).map(|_| ()).map_err(AppError::browser))
            .await
    }
}

fn navigate_blocking(tab: &Tab, url: &str, wait: NavigationWait, timeout: Duration) -> Result<()> {
    tab.navigate_to(url)
        .map_err(|e| AppError::navigation(url, e))?;
    tab.wait_until_navigated()
        .map_err(|e| AppError::navigation(url, e))?;

    if wait == NavigationWait::DomContentLoaded {
        return Ok(());
    }

    let deadline = Instant::now() + timeout;
    loop {
        let complete = tab
            .evaluate("document.readyState === 'complete'", false)
            .ok()
            .and_then(|r| r.value)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if complete {
            break;
        }
        if Instant::now() >= deadline {
            return Err(AppError::navigation(
                url,
                format!("page did not finish loading within {}ms", timeout.as_millis()),
            ));
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    if wait == NavigationWait::NetworkIdle {
        std::thread::sleep(NETWORK_IDLE_GRACE);
    }
    Ok(())
}

/// Script answering whether the first element matching `selector` is absent
/// or not rendered.
fn hidden_probe_script(selector: &str) -> Result<String> {
    let quoted = serde_json::to_string(selector)?;
    Ok(format!(
        r#"(() => {{
            const el = document.querySelector({quoted});
            if (!el) return true;
            const style = window.getComputedStyle(el);
            return style.display === 'none' || style.visibility === 'hidden' || el.offsetParent === null;
        }})()"#
    ))
}
