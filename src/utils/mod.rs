pub mod clock;
pub mod error;
pub mod retry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AppError;
pub use retry::{with_retry, LinearBackoff, RetryPolicy};
