//! Per-supplier scraping: one descriptor-driven engine and the built-in
//! site catalog.

pub mod catalog;
pub mod descriptor;
pub mod engine;
pub mod listing;
pub mod registry;
pub mod traits;

pub use descriptor::{ExtractionStrategy, ReadySignal, SiteDescriptor};
pub use engine::{ProbeReport, SiteScraper};
pub use registry::SupplierRegistry;
pub use traits::SupplierScraper;
