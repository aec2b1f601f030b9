//! Remote API surface shared by the ExeMeta crates
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure route construction (no HTTP client dependencies)
//! - Shared wire types
//!
//! The client crate wraps these with its reqwest-based transport.

pub mod routes;
pub mod types;

pub use routes::{ApiRoutes, CALLBACK_HOST, DEBUG_BASE_URL, RELEASE_BASE_URL};
pub use types::{DisplayNameResponse, UploadMetadataRequest};
