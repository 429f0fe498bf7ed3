//! Local caching module for offline data access.
//!
//! This module provides the persistent entity cache and the data-access
//! strategies built on top of it. Records are mirrored into one named
//! partition per entity type, keyed by id, and considered stale after
//! 60 minutes.
//!
//! The cache is never authoritative: the server is the source of truth,
//! and cached data only reaches the screen tagged as a fallback.

pub mod store;
pub mod strategy;

pub use store::{CacheError, CachePartition, CacheStore, Entity};
pub use strategy::{DataSource, Fetched};
