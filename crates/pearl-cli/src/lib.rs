//! # pearl-cli
//!
//! Command-line interface for the Pearl triage memory.
//!
//! ## Commands
//!
//! - `pearl serve`: start the HTTP API (with config hot-reload)
//! - `pearl seed`: load the built-in triage and radiology rules
//! - `pearl recall`: show the memory context a complaint would retrieve
//! - `pearl stats`: count entries per collection
//! - `pearl config`: show the effective configuration

pub mod commands;

pub use commands::Cli;
