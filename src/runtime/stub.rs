//! In-memory [`Runtime`] used by unit tests.
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Error, RawContainerInfo, RawStats, Result, Runtime};
use crate::container::ContainerState;

#[derive(Debug, Clone)]
pub(crate) enum Failure {
    NotFound,
    Api,
    Unavailable,
}

impl Failure {
    fn into_error(self, id: &str) -> Error {
        match self {
            Failure::NotFound => Error::NotFound(id.to_owned()),
            Failure::Api => Error::Api(bollard::errors::Error::DockerResponseServerError {
                status_code: 500,
                message: "stub failure".to_owned(),
            }),
            Failure::Unavailable => Error::Unavailable("stub runtime offline".to_owned()),
        }
    }
}

/// Configurable runtime stub. Containers are listed in insertion order.
#[derive(Debug, Default)]
pub(crate) struct StubRuntime {
    containers: Vec<RawContainerInfo>,
    stats: HashMap<String, RawStats>,
    logs: HashMap<String, Vec<String>>,
    list_failure: Option<Failure>,
    inspect_failures: HashMap<String, Failure>,
    stats_failures: HashMap<String, Failure>,
    delays: HashMap<String, Duration>,
    log_delay: Option<Duration>,
    ignores_tail: bool,
    pub(crate) requested_tails: Mutex<Vec<usize>>,
    pub(crate) stats_calls: AtomicUsize,
}

pub(crate) fn container(id: &str, state: ContainerState) -> RawContainerInfo {
    RawContainerInfo {
        id: id.to_owned(),
        name: format!("{}-name", id),
        image: "alpine:3.20".to_owned(),
        state,
        started_at: None,
    }
}

impl StubRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_container(mut self, info: RawContainerInfo) -> Self {
        self.containers.push(info);
        self
    }

    pub(crate) fn with_stats(mut self, id: &str, stats: RawStats) -> Self {
        self.stats.insert(id.to_owned(), stats);
        self
    }

    pub(crate) fn with_logs(mut self, id: &str, lines: &[&str]) -> Self {
        self.logs.insert(
            id.to_owned(),
            lines.iter().map(|line| (*line).to_owned()).collect(),
        );
        self
    }

    pub(crate) fn failing_list(mut self, failure: Failure) -> Self {
        self.list_failure = Some(failure);
        self
    }

    pub(crate) fn failing_inspect(mut self, id: &str, failure: Failure) -> Self {
        self.inspect_failures.insert(id.to_owned(), failure);
        self
    }

    pub(crate) fn failing_stats(mut self, id: &str, failure: Failure) -> Self {
        self.stats_failures.insert(id.to_owned(), failure);
        self
    }

    /// Delays inspect calls for `id`.
    pub(crate) fn slow_inspect(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_owned(), delay);
        self
    }

    /// Delays every log fetch, ignoring the timeout passed by the caller.
    pub(crate) fn slow_logs(mut self, delay: Duration) -> Self {
        self.log_delay = Some(delay);
        self
    }

    /// Returns every log line regardless of the requested tail.
    pub(crate) fn ignoring_tail(mut self) -> Self {
        self.ignores_tail = true;
        self
    }
}

impl Runtime for StubRuntime {
    async fn list_containers(&self, all: bool) -> Result<Vec<RawContainerInfo>> {
        if let Some(failure) = &self.list_failure {
            return Err(failure.clone().into_error(""));
        }
        Ok(self
            .containers
            .iter()
            .filter(|c| all || c.state.is_running())
            .cloned()
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<RawContainerInfo> {
        if let Some(delay) = self.delays.get(id) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(failure) = self.inspect_failures.get(id) {
            return Err(failure.clone().into_error(id));
        }
        self.containers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_owned()))
    }

    async fn stats(&self, id: &str) -> Result<RawStats> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.stats_failures.get(id) {
            return Err(failure.clone().into_error(id));
        }
        Ok(self.stats.get(id).cloned().unwrap_or_default())
    }

    async fn fetch_logs(&self, id: &str, tail_lines: usize, _timeout: Duration) -> Result<Vec<String>> {
        self.requested_tails.lock().unwrap().push(tail_lines);
        if let Some(delay) = self.log_delay {
            tokio::time::sleep(delay).await;
        }
        if !self.containers.iter().any(|c| c.id == id) {
            return Err(Error::NotFound(id.to_owned()));
        }
        let lines = self.logs.get(id).cloned().unwrap_or_default();
        if self.ignores_tail {
            return Ok(lines);
        }
        let skip = lines.len().saturating_sub(tail_lines);
        Ok(lines.into_iter().skip(skip).collect())
    }
}
