//! imagebed - Minimal self-hosted image hosting
//!
//! This library crate exposes the server and configuration for integration testing.
//! Storage lives in the `imagebed-store` crate.

pub mod config;
pub mod server;
