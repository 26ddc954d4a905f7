//! # pearl-config
//!
//! Configuration for the Pearl runtime. Reads `pearl.toml`, then environment
//! variables, then CLI overrides, in that precedence order.
//!
//! Supports hot-reload via filesystem watcher.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::PearlConfig;
pub use schema::{ConfigWarning, WarningSeverity};
