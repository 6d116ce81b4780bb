use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::suppliers::catalog;
use crate::utils::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub browser: BrowserConfig,
    pub scraper: ScraperConfig,
    pub orchestrator: OrchestratorConfig,
    pub rate_limit: RateLimitConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds before an inbound request is abandoned; must outlast a full
    /// staggered orchestration.
    pub request_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub enabled: bool,
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "sqlite://data/price-scout.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub max_age_secs: u64,
    pub default_timeout_ms: u64,
    pub startup_delay_min_ms: u64,
    pub startup_delay_max_ms: u64,
    /// Six-field cron for the idle-process reaper.
    pub reap_cron: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            max_age_secs: 300,
            default_timeout_ms: 90_000,
            startup_delay_min_ms: 1000,
            startup_delay_max_ms: 3000,
            reap_cron: "0 * * * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub retry_attempts: usize,
    pub retry_delay_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            retry_delay_ms: 3000,
        }
    }
}

impl ScraperConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_delay_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub stagger_ms: u64,
    pub task_timeout_ms: u64,
    pub require_supplier_directory: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stagger_ms: 3000,
            task_timeout_ms: 120_000,
            require_supplier_directory: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_window: u32,
    pub window_secs: u64,
    pub sweep_cron: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 10,
            window_secs: 60,
            sweep_cron: "0 */5 * * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    /// Write a daily rolling log file here in addition to stdout.
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "price_scout=debug,tower_http=info".to_string(),
            directory: None,
            file_prefix: "price-scout.log".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Built-in defaults
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Environment variables prefixed "SCOUT_"
            .add_source(Environment::with_prefix("SCOUT").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.database.enabled && self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.browser.max_age_secs == 0 {
            return Err(ConfigError::Message("Browser max_age_secs must be greater than 0".into()));
        }

        if self.browser.startup_delay_min_ms > self.browser.startup_delay_max_ms {
            return Err(ConfigError::Message(
                "Browser startup_delay_min_ms cannot exceed startup_delay_max_ms".into(),
            ));
        }

        if self.orchestrator.task_timeout_ms == 0 {
            return Err(ConfigError::Message("Orchestrator task_timeout_ms must be greater than 0".into()));
        }

        // The last supplier starts after every stagger and may use its whole timeout
        let suppliers = catalog::SUPPLIER_NAMES.len() as u64;
        let fetch_budget_ms = self
            .orchestrator
            .stagger_ms
            .saturating_mul(suppliers.saturating_sub(1))
            .saturating_add(self.orchestrator.task_timeout_ms);
        if self.server.request_timeout.saturating_mul(1000) < fetch_budget_ms {
            return Err(ConfigError::Message(format!(
                "Server request_timeout ({}s) is shorter than a full price fetch ({}ms)",
                self.server.request_timeout, fetch_budget_ms
            )));
        }

        if self.rate_limit.enabled && self.rate_limit.requests_per_window == 0 {
            return Err(ConfigError::Message("Rate limit requests_per_window must be greater than 0".into()));
        }

        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Message("Rate limit window_secs must be greater than 0".into()));
        }

        if !is_valid_cron(&self.rate_limit.sweep_cron) {
            return Err(ConfigError::Message("Invalid cron expression in rate_limit.sweep_cron".into()));
        }

        if !is_valid_cron(&self.browser.reap_cron) {
            return Err(ConfigError::Message("Invalid cron expression in browser.reap_cron".into()));
        }

        if self.metrics.enabled && self.metrics.port == self.server.port {
            return Err(ConfigError::Message("Metrics port must differ from the server port".into()));
        }

        Ok(())
    }
}

/// Basic shape check for the scheduler's six-field cron (seconds first).
pub fn is_valid_cron(cron_expr: &str) -> bool {
    let parts: Vec<&str> = cron_expr.split_whitespace().collect();
    if parts.len() != 6 {
        return false;
    }

    parts.iter().all(|part| {
        part.chars()
            .all(|c| c.is_ascii_digit() || c == '*' || c == '-' || c == ',' || c == '/')
    })
}
