//! Cache module for fetched AEMET reports
//!
//! This module provides an in-memory query cache keyed by view mode and
//! location. Entries expire after a per-key TTL, and concurrent requests for
//! the same key share a single in-flight load.

mod manager;

pub use manager::{CachedData, QueryCache, QueryKey, MUNICIPALITIES_TTL, REPORT_TTL};
