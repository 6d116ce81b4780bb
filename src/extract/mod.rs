//! Pure text helpers run on HTML pulled out of the browser.

pub mod matcher;
pub mod price;

pub use matcher::{is_match, ProductMatcher};
pub use price::{extract_price, PriceExtractor};
