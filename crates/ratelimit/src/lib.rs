pub mod bucket;
pub mod limiter;
pub mod presets;

pub use bucket::{BucketParams, BucketState};
pub use limiter::RateLimiter;
