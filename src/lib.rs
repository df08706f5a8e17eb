//! brewctl: local development-environment orchestration.
//!
//! - [`runtime`]: idempotent container, network and image primitives over
//!   the Docker daemon.
//! - [`health`]: per-container health evaluation and a background monitor
//!   with threshold alerts.
//! - [`deps`]: profile-driven startup and teardown of dependency services,
//!   through the compose tool or directly through the runtime.
//! - [`sync`]: debounced file watching that mirrors plugin sources into a
//!   running container.

pub mod cli;
pub mod config;
pub mod deps;
pub mod error;
pub mod health;
pub mod runtime;
pub mod sync;
pub mod testing;

pub use config::Config;
pub use error::{ConfigError, DependencyError, HealthError, RuntimeError, SyncError};
