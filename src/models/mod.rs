pub mod comparison;
pub mod product;
pub mod scraped;
pub mod stats;

// Re-exports for convenience
pub use comparison::*;
pub use product::*;
pub use scraped::*;
pub use stats::*;
