//! # Router Core
//!
//! Core types, configuration, and error handling for the bandit router.
//!
//! This crate provides the foundational types used throughout the router:
//! - Error types and handling
//! - The tagged-union request context model
//! - Router configuration and operating modes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;

// Re-export commonly used types
pub use config::{RouterConfig, RouterMode};
pub use context::{Context, ContextValue};
pub use error::{RouterError, RouterResult};
