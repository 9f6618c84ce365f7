use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio::time::Instant;

use super::{
    ContainerCollectionError, ContainerSnapshot, Error, MonitorReport, ResourceUsage, Result,
};
use crate::config::Config;
use crate::runtime::{self, RawContainerInfo, Runtime};

/// Maximum number of containers inspected at the same time during one pass.
const MAX_CONCURRENT_INSPECTIONS: usize = 16;

/// Builds [`MonitorReport`]s from the containers known to a [`Runtime`].
#[derive(Debug)]
pub struct StatusCollector<R> {
    runtime: Arc<R>,
    timeout: Duration,
    include_stopped: bool,
}

impl<R: Runtime> StatusCollector<R> {
    pub fn new(runtime: Arc<R>, config: &Config) -> Self {
        Self {
            runtime,
            timeout: config.collect_timeout,
            include_stopped: config.include_stopped,
        }
    }

    /// Runs one collection pass.
    ///
    /// The whole pass is bounded by the configured collection timeout. Containers
    /// that have not been collected when it expires are reported in
    /// `collection_errors`, so every listed container appears exactly once in the
    /// report.
    ///
    /// # Errors
    ///
    /// Fails only if the container list itself cannot be obtained:
    /// [`Error::Unavailable`] if the runtime is unreachable, [`Error::List`] or
    /// [`Error::Timeout`] otherwise.
    pub async fn collect(&self) -> Result<MonitorReport> {
        let generated_at = Utc::now();
        let started = Instant::now();
        let deadline = started + self.timeout;

        let listed = match tokio::time::timeout_at(
            deadline,
            self.runtime.list_containers(self.include_stopped),
        )
        .await
        {
            Ok(Ok(listed)) => listed,
            Ok(Err(runtime::Error::Unavailable(reason))) => return Err(Error::Unavailable(reason)),
            Ok(Err(err)) => return Err(Error::List(err)),
            Err(_) => return Err(Error::Timeout(self.timeout)),
        };
        log::trace!("Listed {} containers", listed.len());

        let outcomes: Vec<_> = futures::stream::iter(listed)
            .map(|info| async move {
                match tokio::time::timeout_at(deadline, self.snapshot(&info)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ContainerCollectionError::new(
                        info.id.as_str(),
                        "timed out while collecting container status",
                    )),
                }
            })
            .buffered(MAX_CONCURRENT_INSPECTIONS)
            .collect()
            .await;

        let mut containers = Vec::with_capacity(outcomes.len());
        let mut collection_errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(snapshot) => containers.push(snapshot),
                Err(err) => collection_errors.push(err),
            }
        }
        log::debug!(
            "Collected {} containers ({} failed) in {} ms",
            containers.len(),
            collection_errors.len(),
            started.elapsed().as_millis()
        );

        Ok(MonitorReport {
            generated_at,
            containers,
            collection_errors,
        })
    }

    async fn snapshot(
        &self,
        listed: &RawContainerInfo,
    ) -> std::result::Result<ContainerSnapshot, ContainerCollectionError> {
        let info = self.runtime.inspect(&listed.id).await.map_err(|err| {
            log::warn!("failed to inspect container `{}`: {}", listed.id, err);
            ContainerCollectionError::new(listed.id.as_str(), describe(&err))
        })?;

        let resource_usage = if info.state.is_running() {
            match self.runtime.stats(&info.id).await {
                Ok(stats) => ResourceUsage::from_stats(&stats),
                Err(err @ runtime::Error::NotFound(_)) => {
                    return Err(ContainerCollectionError::new(
                        listed.id.as_str(),
                        describe(&err),
                    ));
                }
                Err(err) => {
                    log::warn!("metrics unavailable for container `{}`: {}", info.id, err);
                    ResourceUsage::default()
                }
            }
        } else {
            ResourceUsage::default()
        };

        Ok(ContainerSnapshot {
            id: info.id,
            name: info.name,
            image: info.image,
            state: info.state,
            resource_usage,
            started_at: info.started_at,
        })
    }
}

/// Short, caller-facing description of a per-container failure.
fn describe(err: &runtime::Error) -> &'static str {
    match err {
        runtime::Error::NotFound(_) => "container was removed during collection",
        runtime::Error::Timeout(_) => "runtime did not respond in time",
        runtime::Error::Unavailable(_) => "container runtime unavailable",
        runtime::Error::Api(_) => "failed to inspect container",
    }
}
