//! Metric fetch-and-extract pipeline
//!
//! This module fetches Prometheus text exposition from a target (through an
//! on-disk freshness cache), parses it, selects samples by name and labels and
//! reduces them to one scalar.

pub mod aggregate;
pub mod cache;
pub mod fetcher;
pub mod parser;
pub mod selector;
pub mod version;

// Re-export commonly used types
pub use cache::{CacheKey, FreshnessCache};
pub use fetcher::{Auth, HttpTransport};
pub use parser::{Exposition, MetricFamily, MetricType, Sample};
