//! Shared utilities for lanbeacon.
//!
//! This crate provides common utilities used across the lanbeacon workspace:
//! - Logging setup with tracing
//! - ULID-based identifiers for advertised servers and probers

pub mod id;
pub mod log;

pub use id::{IdPrefix, Identifier};
pub use log::{LogConfig, LogLevel};
