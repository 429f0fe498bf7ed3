//! Authentication module for managing user sessions.
//!
//! This module provides `Session`: token-based session management with
//! automatic expiry. Identity itself is owned by the backend; the client
//! only stores the issued token and profile data.
//!
//! Sessions are persisted to disk and tokens expire after 12 hours.

pub mod session;

pub use session::{Session, SessionData};
