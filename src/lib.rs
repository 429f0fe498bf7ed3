//! Core data layer for the MedCart medicine storefront.
//!
//! This crate is everything below the UI: the REST client for the MedCart
//! backend, a local persistent cache mirroring server entities for offline
//! and instant-first-paint reads, the read-through and optimistic-mutation
//! strategies that tie the two together, and the authenticated session.
//!
//! Front ends (storefront, seller dashboard, regional- and super-admin
//! dashboards) call [`ApiClient`] operations and receive results tagged
//! with their origin ([`Fetched`]); they never touch the cache directly.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{Session, SessionData};
pub use cache::{CacheError, CachePartition, CacheStore, DataSource, Entity, Fetched};
pub use config::Config;
