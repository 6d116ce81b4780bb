pub mod browser;
pub mod config;
pub mod extract;
pub mod models;
pub mod orchestrator;
pub mod rate_limiter;
pub mod scheduler;
pub mod store;
pub mod suppliers;
pub mod telemetry;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{PriceComparisonResponse, Product, ScrapedData, SupplierResult};
pub use orchestrator::{OrchestratorSettings, PriceOrchestrator};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
