//! Shared rendering-engine process and the hardened pages borrowed from it.

pub mod headless;
pub mod profile;
pub mod stealth;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::utils::error::Result;

pub use headless::HeadlessChromeBackend;
pub use profile::{PageProfile, Viewport};

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationWait {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

/// Starts rendering-engine processes.
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserProcess>>;
}

/// One running rendering-engine process.
#[async_trait]
pub trait BrowserProcess: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn PageDriver>>;
    async fn close(&self) -> Result<()>;
}

/// Operations a scraper performs on a single page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Applies fingerprint, stealth patches and the default operation timeout.
    async fn prepare(&self, profile: &PageProfile, default_timeout: Duration) -> Result<()>;
    async fn navigate(&self, url: &str, wait: NavigationWait, timeout: Duration) -> Result<()>;
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;
    async fn wait_for_hidden(&self, selector: &str, timeout: Duration) -> Result<()>;
    async fn title(&self) -> Result<String>;
    async fn current_url(&self) -> Result<String>;
    /// Rendered DOM serialized as HTML.
    async fn content(&self) -> Result<String>;
    async fn close(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_age: Duration,
    pub default_timeout: Duration,
    pub startup_delay_min: Duration,
    pub startup_delay_max: Duration,
}

impl From<&BrowserConfig> for SessionSettings {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            max_age: Duration::from_secs(config.max_age_secs),
            default_timeout: Duration::from_millis(config.default_timeout_ms),
            startup_delay_min: Duration::from_millis(config.startup_delay_min_ms),
            startup_delay_max: Duration::from_millis(config.startup_delay_max_ms),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(300),
            default_timeout: Duration::from_secs(90),
            startup_delay_min: Duration::from_millis(1000),
            startup_delay_max: Duration::from_millis(3000),
        }
    }
}

struct BrowserSession {
    process: Arc<dyn BrowserProcess>,
    started_at: Instant,
    generation: u64,
}

/// A page borrowed from the shared process. Hand it back through
/// [`BrowserSessionManager::release_page`].
pub struct PageLease {
    page: Box<dyn PageDriver>,
    process: Arc<dyn BrowserProcess>,
    generation: u64,
    profile: PageProfile,
}

impl PageLease {
    pub fn page(&self) -> &dyn PageDriver {
        self.page.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn profile(&self) -> &PageProfile {
        &self.profile
    }
}

impl std::ops::Deref for PageLease {
    type Target = dyn PageDriver;

    fn deref(&self) -> &Self::Target {
        self.page.as_ref()
    }
}

/// Owns the single process shared by every scrape, launching it lazily and
/// replacing it once it is older than `max_age`.
pub struct BrowserSessionManager {
    backend: Arc<dyn BrowserBackend>,
    settings: SessionSettings,
    slot: Mutex<Option<BrowserSession>>,
    generations: AtomicU64,
}

impl BrowserSessionManager {
    pub fn new(backend: Arc<dyn BrowserBackend>, settings: SessionSettings) -> Self {
        Self {
            backend,
            settings,
            slot: Mutex::new(None),
            generations: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Opens a hardened page on the current process, launching or recycling
    /// the process first when needed.
    pub async fn acquire_page(&self) -> Result<PageLease> {
        let (process, generation) = self.current_process().await?;

        let page = process.new_page().await?;
        let profile = PageProfile::random();
        if let Err(e) = page.prepare(&profile, self.settings.default_timeout).await {
            close_quietly(page.as_ref()).await;
            return Err(e);
        }

        debug!(
            generation,
            user_agent = %profile.user_agent,
            width = profile.viewport.width,
            height = profile.viewport.height,
            "Page prepared"
        );

        tokio::time::sleep(self.startup_delay()).await;

        Ok(PageLease {
            page,
            process,
            generation,
            profile,
        })
    }

    /// Closes the lease's page. Close failures are logged, never returned.
    pub async fn release_page(&self, lease: PageLease) {
        close_quietly(lease.page.as_ref()).await;

        let PageLease {
            page,
            process,
            generation,
            ..
        } = lease;
        drop(page);

        // A retired process goes away with its last borrower. The count is
        // read and our reference dropped under the slot lock, so concurrent
        // releases agree on who is last.
        let slot = self.slot.lock().await;
        let retired = slot.as_ref().map(|s| s.generation) != Some(generation);
        if !retired || Arc::strong_count(&process) > 1 {
            drop(process);
            return;
        }
        drop(slot);

        debug!(generation, "Closing retired browser after last page release");
        if let Err(e) = process.close().await {
            warn!(generation, error = %e, "Failed to close retired browser");
        }
    }

    /// Retires the process if it is stale and no page is borrowing it.
    /// Returns whether a process was closed.
    pub async fn recycle_if_idle(&self) -> bool {
        let mut slot = self.slot.lock().await;
        let idle_and_stale = slot.as_ref().is_some_and(|s| {
            s.started_at.elapsed() >= self.settings.max_age && Arc::strong_count(&s.process) == 1
        });
        if !idle_and_stale {
            return false;
        }

        if let Some(session) = slot.take() {
            info!(generation = session.generation, "Reaping idle stale browser");
            if let Err(e) = session.process.close().await {
                warn!(generation = session.generation, error = %e, "Failed to close stale browser");
            }
        }
        true
    }

    /// Closes the process, returning to the absent state.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(session) = slot.take() {
            info!(generation = session.generation, "Shutting down browser");
            if let Err(e) = session.process.close().await {
                warn!(error = %e, "Failed to close browser on shutdown");
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    pub async fn current_generation(&self) -> Option<u64> {
        self.slot.lock().await.as_ref().map(|s| s.generation)
    }

    async fn current_process(&self) -> Result<(Arc<dyn BrowserProcess>, u64)> {
        let mut slot = self.slot.lock().await;

        if let Some(session) = slot.as_ref() {
            if session.started_at.elapsed() < self.settings.max_age {
                return Ok((session.process.clone(), session.generation));
            }
        }

        if let Some(stale) = slot.take() {
            info!(
                generation = stale.generation,
                age_secs = stale.started_at.elapsed().as_secs(),
                "Recycling stale browser"
            );
            // Pages still borrowing it keep it alive until they are released
            if Arc::strong_count(&stale.process) == 1 {
                if let Err(e) = stale.process.close().await {
                    warn!(generation = stale.generation, error = %e, "Failed to close stale browser");
                }
            }
        }

        let process = self.backend.launch().await?;
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::counter!("browser_launches_total").increment(1);
        info!(generation, "Browser launched");

        *slot = Some(BrowserSession {
            process: process.clone(),
            started_at: Instant::now(),
            generation,
        });

        Ok((process, generation))
    }

    fn startup_delay(&self) -> Duration {
        let min = self.settings.startup_delay_min.as_millis() as u64;
        let max = self.settings.startup_delay_max.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

async fn close_quietly(page: &dyn PageDriver) {
    if let Err(e) = page.close().await {
        debug!(error = %e, "Page already closed or failed to close");
    }
}
