//! Aggregated container status.
//!
//! [`StatusCollector`] produces a [`MonitorReport`] on demand: it lists every
//! container known to the runtime, inspects each one and samples resource
//! usage for running containers. Collection is best-effort; a container that
//! fails individually ends up in [`MonitorReport::collection_errors`] and never
//! fails the whole report.
//!
//! # Key Components
//!
//! - [`StatusCollector`]: Drives one collection pass against a [`Runtime`](crate::runtime::Runtime).
//! - [`MonitorReport`]: The serialized result of a pass.
//! - [`cpu`]: Derivation of CPU percentages from cumulative counters.
mod collector;
pub mod cpu;
mod error;
mod models;

pub use collector::StatusCollector;
pub use error::{Error, Result};
pub use models::{ContainerCollectionError, ContainerSnapshot, MonitorReport, ResourceUsage};
