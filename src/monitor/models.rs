use chrono::{DateTime, Utc};

use crate::container::ContainerState;

/// Resource usage of a single container.
///
/// All fields are `None` when metrics could not be sampled, e.g. because the
/// container is not running.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ResourceUsage {
    pub cpu_percent: Option<f64>,
    pub memory_bytes: Option<u64>,
    pub memory_limit_bytes: Option<u64>,
}

/// Point-in-time view of one container.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ContainerSnapshot {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    #[serde(flatten)]
    pub resource_usage: ResourceUsage,
    pub started_at: Option<DateTime<Utc>>,
}

/// A container that was listed but could not be collected.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContainerCollectionError {
    pub container_id: String,
    pub message: String,
}

impl ContainerCollectionError {
    pub fn new(container_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MonitorReport {
    pub generated_at: DateTime<Utc>,
    pub containers: Vec<ContainerSnapshot>,
    pub collection_errors: Vec<ContainerCollectionError>,
}
