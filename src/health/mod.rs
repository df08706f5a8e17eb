//! Health evaluation and monitoring.
//!
//! - [`HealthEvaluator`] runs the [`HealthStrategy`] cached on each
//!   `ContainerRecord` and always returns a [`HealthStatus`].
//! - [`HealthSummary`] aggregates verdicts into an [`OverallStatus`].
//! - [`HealthMonitor`] polls a registered set in the background and alerts
//!   subscribers after consecutive failures.
//! - [`HealthReporter`] renders summaries and alerts as text.

mod evaluator;
mod monitor;
mod report;
mod status;
mod strategy;
mod summary;

pub use evaluator::HealthEvaluator;
pub use monitor::{AlertCallback, HealthAlert, HealthMonitor};
pub use report::HealthReporter;
pub use status::{HealthState, HealthStatus};
pub use strategy::{HealthStrategy, ProbeKind};
pub use summary::{HealthSummary, OverallStatus};
