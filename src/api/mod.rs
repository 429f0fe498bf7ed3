//! REST API client module for the MedCart backend.
//!
//! This module provides the `ApiClient` for communicating with the backend
//! to fetch and mutate catalog, order, user, and seller data.
//!
//! The API uses JWT bearer token authentication obtained through the
//! `/users/login` endpoint; the token travels in the `Authorization` header.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
