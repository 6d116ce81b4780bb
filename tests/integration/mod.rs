// Integration tests for Price Scout
// These drive the real scrape engine, store and router against an in-memory
// stand-in for the browser.

pub mod api_tests;
pub mod orchestrator_tests;
pub mod scraper_tests;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use tempfile::TempDir;
use tower::ServiceExt;

use price_scout::{
    browser::{
        BrowserBackend, BrowserProcess, BrowserSessionManager, NavigationWait, PageDriver, PageProfile,
        SessionSettings,
    },
    config::AppConfig,
    orchestrator::{OrchestratorSettings, PriceOrchestrator},
    rate_limiter::RateLimiter,
    store::SqliteStore,
    suppliers::{catalog, SiteDescriptor, SiteScraper, SupplierRegistry},
    utils::{AppError, RetryPolicy},
    web::AppState,
};

pub const AMAZON_RESULTS: &str = r#"
<html><head><title>Amazon.ca : 3M 2091</title></head><body>
  <div data-component-type="s-search-result">
    <h2><a href="/dp/OTHER"><span>Generic Dust Mask 50 Pack</span></a></h2>
    <span class="a-price"><span class="a-offscreen">$5.00</span></span>
  </div>
  <div data-component-type="s-search-result">
    <h2><a href="/dp/B0001"><span>3M Particulate Filter 2091, P100</span></a></h2>
    <span class="a-price"><span class="a-offscreen">$19.99</span></span>
  </div>
</body></html>
"#;

pub const BROGAN_RESULTS: &str = r#"
<html><body>
  <div class="product-item">
    <h3 class="product-title">3M 2091 P100 Particulate Filter (Pair)</h3>
    <span class="price">CAD 24.50</span>
    <a href="/product/3m-2091-p100">View</a>
  </div>
</body></html>
"#;

pub const HAZMASTERS_EMPTY: &str = r#"
<html><body>
  <div class="no-results">Sorry, no products matched your search.</div>
</body></html>
"#;

/// What the fake browser serves for URLs containing a given fragment.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Page { title: String, html: String },
    NavigationFails,
    /// Navigation succeeds but the page title cannot be read.
    TitleFails,
    /// Navigation takes this long, then lands on an empty page.
    Stalls(Duration),
}

/// In-memory web: every page is looked up by URL fragment.
#[derive(Clone, Default)]
pub struct FakeWeb {
    routes: Arc<Mutex<Vec<(String, FakeResponse)>>>,
    launches: Arc<AtomicUsize>,
    navigations: Arc<Mutex<Vec<String>>>,
    pages_opened: Arc<AtomicUsize>,
    pages_closed: Arc<AtomicUsize>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, fragment: &str, title: &str, html: &str) -> Self {
        self.route(
            fragment,
            FakeResponse::Page {
                title: title.to_string(),
                html: html.to_string(),
            },
        )
    }

    pub fn failing(self, fragment: &str) -> Self {
        self.route(fragment, FakeResponse::NavigationFails)
    }

    pub fn untitled(self, fragment: &str) -> Self {
        self.route(fragment, FakeResponse::TitleFails)
    }

    pub fn stalling(self, fragment: &str, delay: Duration) -> Self {
        self.route(fragment, FakeResponse::Stalls(delay))
    }

    fn route(self, fragment: &str, response: FakeResponse) -> Self {
        self.routes.lock().unwrap().push((fragment.to_string(), response));
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.pages_closed.load(Ordering::SeqCst)
    }

    fn lookup(&self, url: &str) -> FakeResponse {
        self.routes
            .lock()
            .unwrap()
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or(FakeResponse::Page {
                title: String::new(),
                html: "<html><body></body></html>".to_string(),
            })
    }
}

#[async_trait]
impl BrowserBackend for FakeWeb {
    async fn launch(&self) -> price_scout::Result<Arc<dyn BrowserProcess>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeProcess { web: self.clone() }))
    }
}

struct FakeProcess {
    web: FakeWeb,
}

#[async_trait]
impl BrowserProcess for FakeProcess {
    async fn new_page(&self) -> price_scout::Result<Box<dyn PageDriver>> {
        self.web.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            web: self.web.clone(),
            url: Mutex::new(String::from("about:blank")),
        }))
    }

    async fn close(&self) -> price_scout::Result<()> {
        Ok(())
    }
}

struct FakePage {
    web: FakeWeb,
    url: Mutex<String>,
}

impl FakePage {
    fn current(&self) -> (String, String) {
        let url = self.url.lock().unwrap().clone();
        match self.web.lookup(&url) {
            FakeResponse::Page { title, html } => (title, html),
            _ => (String::new(), String::new()),
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn prepare(&self, _profile: &PageProfile, _default_timeout: Duration) -> price_scout::Result<()> {
        Ok(())
    }

    async fn navigate(&self, url: &str, _wait: NavigationWait, _timeout: Duration) -> price_scout::Result<()> {
        self.web.navigations.lock().unwrap().push(url.to_string());
        match self.web.lookup(url) {
            FakeResponse::NavigationFails => {
                return Err(AppError::Navigation {
                    url: url.to_string(),
                    message: "net::ERR_CONNECTION_RESET".to_string(),
                });
            }
            FakeResponse::Stalls(delay) => tokio::time::sleep(delay).await,
            _ => {}
        }
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn wait_for_selector(&self, _selector: &str, _timeout: Duration) -> price_scout::Result<()> {
        Ok(())
    }

    async fn wait_for_hidden(&self, _selector: &str, _timeout: Duration) -> price_scout::Result<()> {
        Ok(())
    }

    async fn title(&self) -> price_scout::Result<String> {
        let url = self.url.lock().unwrap().clone();
        if let FakeResponse::TitleFails = self.web.lookup(&url) {
            return Err(AppError::Browser("Execution context was destroyed".to_string()));
        }
        Ok(self.current().0)
    }

    async fn current_url(&self) -> price_scout::Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn content(&self) -> price_scout::Result<String> {
        Ok(self.current().1)
    }

    async fn close(&self) -> price_scout::Result<()> {
        self.web.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Session manager over the fake web with no startup jitter.
pub fn fake_sessions(web: &FakeWeb) -> Arc<BrowserSessionManager> {
    let settings = SessionSettings {
        max_age: Duration::from_secs(300),
        default_timeout: Duration::from_secs(5),
        startup_delay_min: Duration::ZERO,
        startup_delay_max: Duration::ZERO,
    };
    Arc::new(BrowserSessionManager::new(Arc::new(web.clone()), settings))
}

pub fn site_scraper(descriptor: SiteDescriptor, sessions: &Arc<BrowserSessionManager>) -> SiteScraper {
    SiteScraper::new(descriptor, Arc::clone(sessions), RetryPolicy::none())
}

/// Registry of descriptor-driven scrapers for the given sites, in order.
pub fn site_registry(descriptors: Vec<SiteDescriptor>, sessions: &Arc<BrowserSessionManager>) -> SupplierRegistry {
    let mut registry = SupplierRegistry::new();
    for descriptor in descriptors {
        registry.register(Arc::new(site_scraper(descriptor, sessions)));
    }
    registry
}

pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        stagger: Duration::ZERO,
        task_timeout: Duration::from_secs(10),
        require_supplier_directory: false,
    }
}

/// File-backed store in a fresh temporary directory.
pub async fn temp_store() -> anyhow::Result<(Arc<SqliteStore>, TempDir)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}", dir.path().join("scout.db").display());
    let store = SqliteStore::connect(&url, 2).await?;
    Ok((Arc::new(store), dir))
}

/// Orchestrator wired to the store for directory, persistence and audit.
pub fn stored_orchestrator(registry: SupplierRegistry, store: &Arc<SqliteStore>) -> PriceOrchestrator {
    PriceOrchestrator::new(registry, fast_settings())
        .with_directory(store.clone())
        .with_store(store.clone())
        .with_audit(store.clone())
}

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 3999;
    config.server.request_timeout = 30;
    config.database.url = "sqlite::memory:".to_string();
    config.scraper.retry_attempts = 0;
    config.scraper.retry_delay_ms = 0;
    config.orchestrator.stagger_ms = 0;
    config.orchestrator.task_timeout_ms = 10_000;
    config.rate_limit.requests_per_window = 1000;
    config
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<SqliteStore>,
    pub web: FakeWeb,
    _dir: TempDir,
}

/// Full application state over a temporary database, scraping Amazon.ca,
/// Brogan Safety and Hazmasters through the fake web.
pub async fn create_test_app(web: FakeWeb) -> anyhow::Result<TestApp> {
    let config = get_test_config();
    let (store, dir) = temp_store().await?;
    let sessions = fake_sessions(&web);
    let registry = site_registry(
        vec![catalog::amazon_ca(), catalog::brogan_safety(), catalog::hazmasters()],
        &sessions,
    );

    let state = AppState {
        orchestrator: Arc::new(stored_orchestrator(registry, &store)),
        store: Some(store.clone()),
        rate_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
        sessions,
        config,
    };

    Ok(TestApp {
        state,
        store,
        web,
        _dir: dir,
    })
}

/// Database-less state holding every built-in site, for diagnostic probes.
pub fn create_probe_state(web: &FakeWeb) -> AppState {
    let config = get_test_config();
    let sessions = fake_sessions(web);
    let registry = SupplierRegistry::with_builtin(Arc::clone(&sessions), RetryPolicy::none());

    AppState {
        orchestrator: Arc::new(PriceOrchestrator::new(registry, fast_settings())),
        store: None,
        rate_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
        sessions,
        config,
    }
}

pub async fn make_request(app: &Router, method: Method, uri: &str, body: Option<String>) -> anyhow::Result<Response> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "198.51.100.20")
        .header("user-agent", "price-scout-tests");

    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json)
        }
        None => Body::empty(),
    };

    Ok(app.clone().oneshot(request.body(body)?).await?)
}

pub async fn body_json(response: Response) -> anyhow::Result<serde_json::Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
