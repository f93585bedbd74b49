//! CLI command implementations

pub mod cache;
pub mod review;

pub use cache::CacheArgs;
pub use review::ReviewArgs;
