//! # quest-cli
//!
//! Command-line interface for the quest session engine.
//!
//! ## Commands
//!
//! - `quest serve`: Start the HTTP surface and launch sessions on `POST /solve`
//! - `quest run`: Run one session in the foreground and print its outcome
//! - `quest tools`: List the built-in tools and their timeouts
//! - `quest config`: Show the effective configuration
//! - `quest version`: Show version info

pub mod commands;

pub use commands::Cli;
