//! # pearl-core
//!
//! Core types and errors shared by every crate in the Pearl workspace: the
//! collection namespaces, rule priorities, precedent kinds, and the unified
//! error type.

pub mod error;
pub mod types;

pub use error::{PearlError, Result};
pub use types::*;
