//! ce-core - Core library for Context Engine
//!
//! This crate provides the lifecycle machinery behind the `ce` CLI:
//!
//! - **config**: Explicit configuration loaded once per invocation
//! - **registry**: Pid files for managed services
//! - **process** / **port**: Signals, detached spawns and port conflicts
//! - **service**: Idempotent start/stop of background services
//! - **session**: Session creation and archival
//! - **lock** / **hooks**: Instance lock and hook installation
//! - **orchestrator**: activate, deactivate and status

pub mod config;
pub mod error;
pub mod git;
pub mod hooks;
pub mod lock;
pub mod orchestrator;
pub mod port;
pub mod process;
pub mod registry;
pub mod service;
pub mod session;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
