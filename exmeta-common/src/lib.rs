//! # ExeMeta Common Library
//!
//! Shared code for the ExeMeta desktop client crates:
//! - Error type and result alias
//! - Bootstrap configuration loading (TOML + environment + CLI)
//! - Remote API routes and wire DTOs
//! - Client event types and the broadcast EventBus

pub mod api;
pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
