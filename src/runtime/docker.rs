use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bollard::Docker;
use bollard::models::{
    ContainerInspectResponse, ContainerStateStatusEnum, ContainerStatsResponse, ContainerSummary,
    ContainerSummaryStateEnum,
};
use bollard::query_parameters::{
    InspectContainerOptions, ListContainersOptionsBuilder, LogsOptionsBuilder, StatsOptionsBuilder,
};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::sync::RwLock;

use super::error::{ConnectError, Error, Result, is_connection_error};
use super::{RawContainerInfo, RawStats, Runtime};
use crate::config::Config;
use crate::container::ContainerState;

/// Request timeout handed to the bollard client itself. Calls are additionally
/// bounded by the (shorter) per-call timeouts of [`DockerRuntime`].
const CLIENT_TIMEOUT_SECS: u64 = 120;

/// Opens a fresh, verified client handle.
type Connector =
    Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<Docker, ConnectError>> + Send + Sync>;

#[derive(Debug, Default)]
struct Session {
    /// Incremented on every reconnect attempt, successful or not.
    generation: u64,
    docker: Option<Docker>,
}

/// [`Runtime`] backed by the Docker Engine API.
///
/// The client handle is created once and shared by all requests. When a call
/// fails because the transport broke, the handle is replaced under the write
/// lock and the call is retried once. Concurrent callers that observed the same
/// broken handle wait for that single reconnect instead of starting their own.
pub struct DockerRuntime {
    host: Option<String>,
    timeout: Duration,
    connector: Connector,
    session: RwLock<Session>,
    closed: AtomicBool,
}

impl fmt::Debug for DockerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerRuntime")
            .field("host", &self.host)
            .field("timeout", &self.timeout)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl DockerRuntime {
    /// Connects to the runtime configured in `config` and verifies it answers a ping.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] if the client cannot be created or the ping fails.
    pub async fn connect(config: &Config) -> std::result::Result<Self, ConnectError> {
        let docker = open(config.docker_host.as_deref(), config.runtime_timeout).await?;
        log::info!(
            "Connected to container runtime at {}",
            config.docker_host.as_deref().unwrap_or("local defaults")
        );
        Ok(Self::with_docker(config, Some(docker)))
    }

    /// Creates a runtime without a live session.
    ///
    /// Every call attempts a single reconnect first and yields
    /// [`Error::Unavailable`] while the runtime stays unreachable.
    pub fn disconnected(config: &Config) -> Self {
        Self::with_docker(config, None)
    }

    /// Connects like [`DockerRuntime::connect`], but degrades to
    /// [`DockerRuntime::disconnected`] instead of failing.
    pub async fn connect_or_degrade(config: &Config) -> Self {
        match Self::connect(config).await {
            Ok(runtime) => runtime,
            Err(err) => {
                log::error!(
                    "Container runtime unavailable, serving degraded responses: {}",
                    err
                );
                Self::disconnected(config)
            }
        }
    }

    fn with_docker(config: &Config, docker: Option<Docker>) -> Self {
        let host = config.docker_host.clone();
        let timeout = config.runtime_timeout;
        let connector: Connector = Arc::new(move || {
            let host = host.clone();
            async move { open(host.as_deref(), timeout).await }.boxed()
        });
        Self::with_connector(config, docker, connector)
    }

    fn with_connector(config: &Config, docker: Option<Docker>, connector: Connector) -> Self {
        Self {
            host: config.docker_host.clone(),
            timeout: config.runtime_timeout,
            connector,
            session: RwLock::new(Session {
                generation: 0,
                docker,
            }),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns `true` if a client handle is currently held.
    pub async fn is_connected(&self) -> bool {
        self.session.read().await.docker.is_some()
    }

    /// Drops the client handle. Subsequent calls fail with [`Error::Unavailable`].
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.session.write().await.docker = None;
        log::debug!("Closed container runtime session");
    }

    async fn handle(&self) -> Result<(u64, Docker)> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("runtime session closed".to_owned()));
        }
        let generation = {
            let session = self.session.read().await;
            if let Some(docker) = &session.docker {
                return Ok((session.generation, docker.clone()));
            }
            session.generation
        };

        self.reconnect(generation).await
    }

    /// Replaces the client handle unless another task already did so since
    /// `observed` was read.
    async fn reconnect(&self, observed: u64) -> Result<(u64, Docker)> {
        let mut session = self.session.write().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("runtime session closed".to_owned()));
        }
        if session.generation != observed {
            return match &session.docker {
                Some(docker) => Ok((session.generation, docker.clone())),
                None => Err(Error::Unavailable("reconnect failed".to_owned())),
            };
        }

        session.generation += 1;
        log::debug!(
            "Reconnecting to container runtime (generation {})",
            session.generation
        );
        match (self.connector)().await {
            Ok(docker) => {
                log::info!("Reconnected to container runtime");
                session.docker = Some(docker.clone());
                Ok((session.generation, docker))
            }
            Err(err) => {
                log::warn!("Failed to reconnect to container runtime: {}", err);
                session.docker = None;
                Err(Error::Unavailable(err.to_string()))
            }
        }
    }

    /// Runs `op` against the current handle, bounded by `timeout`, and retries it
    /// once on a fresh handle if the transport broke.
    async fn call<T, F, Fut>(&self, id: &str, timeout: Duration, op: F) -> Result<T>
    where
        F: Fn(Docker) -> Fut,
        Fut: Future<Output = std::result::Result<T, bollard::errors::Error>>,
    {
        let (generation, docker) = self.handle().await?;
        match tokio::time::timeout(timeout, op(docker)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) if is_connection_error(&err) => {
                log::warn!("Lost connection to container runtime: {}", err);
                let (_, docker) = self.reconnect(generation).await?;
                match tokio::time::timeout(timeout, op(docker)).await {
                    Ok(result) => result.map_err(|err| classify(id, timeout, err)),
                    Err(_) => Err(Error::Timeout(timeout)),
                }
            }
            Ok(Err(err)) => Err(classify(id, timeout, err)),
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }
}

impl Runtime for DockerRuntime {
    async fn list_containers(&self, all: bool) -> Result<Vec<RawContainerInfo>> {
        let summaries = self
            .call("", self.timeout, |docker| async move {
                let options = ListContainersOptionsBuilder::new().all(all).build();
                docker.list_containers(Some(options)).await
            })
            .await?;

        Ok(summaries
            .into_iter()
            .filter_map(|summary| {
                let info = from_summary(summary);
                if info.is_none() {
                    log::warn!("Skipping container summary without id");
                }
                info
            })
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<RawContainerInfo> {
        let response = self
            .call(id, self.timeout, |docker| async move {
                docker
                    .inspect_container(id, None::<InspectContainerOptions>)
                    .await
            })
            .await?;
        Ok(from_inspect(id, response))
    }

    async fn stats(&self, id: &str) -> Result<RawStats> {
        let sample = self
            .call(id, self.timeout, |docker| async move {
                // one_shot=false makes the daemon wait for a second sample so
                // that `precpu_stats` is populated.
                let options = StatsOptionsBuilder::new()
                    .stream(false)
                    .one_shot(false)
                    .build();
                let mut stream = pin!(docker.stats(id, Some(options)));
                stream.next().await.transpose()
            })
            .await?;

        sample
            .map(from_stats)
            .ok_or_else(|| Error::Unavailable(format!("no stats returned for `{}`", id)))
    }

    async fn fetch_logs(&self, id: &str, tail_lines: usize, timeout: Duration) -> Result<Vec<String>> {
        let tail = tail_lines.to_string();
        let raw = self
            .call(id, timeout, |docker| {
                let tail = tail.as_str();
                async move {
                    let options = LogsOptionsBuilder::new()
                        .stdout(true)
                        .stderr(true)
                        .follow(false)
                        .tail(tail)
                        .build();
                    let mut stream = pin!(docker.logs(id, Some(options)));
                    let mut raw = Vec::new();
                    while let Some(frame) = stream.next().await {
                        raw.extend_from_slice(&frame?.into_bytes());
                    }
                    Ok::<_, bollard::errors::Error>(raw)
                }
            })
            .await?;

        Ok(super::decode_lines(&raw))
    }
}

async fn open(host: Option<&str>, timeout: Duration) -> std::result::Result<Docker, ConnectError> {
    let docker = match host {
        None => Docker::connect_with_local_defaults(),
        Some(host) if host.starts_with("unix://") || host.starts_with('/') => {
            Docker::connect_with_socket(host, CLIENT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        }
        Some(host) => {
            Docker::connect_with_http(host, CLIENT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        }
    }
    .map_err(|source| ConnectError::Client {
        host: host.unwrap_or("local defaults").to_owned(),
        source,
    })?;

    match tokio::time::timeout(timeout, docker.ping()).await {
        Ok(Ok(_)) => Ok(docker),
        Ok(Err(err)) => Err(ConnectError::Ping(err)),
        Err(_) => Err(ConnectError::Timeout(timeout)),
    }
}

fn classify(id: &str, timeout: Duration, err: bollard::errors::Error) -> Error {
    match err {
        bollard::errors::Error::RequestTimeoutError => Error::Timeout(timeout),
        err => Error::from_bollard(id, err),
    }
}

fn from_summary(summary: ContainerSummary) -> Option<RawContainerInfo> {
    let id = summary.id?;
    let name = summary
        .names
        .and_then(|names| names.into_iter().next())
        .map(|name| name.trim_start_matches('/').to_owned())
        .unwrap_or_else(|| id.clone());
    let state = match summary.state {
        Some(ContainerSummaryStateEnum::RUNNING) => ContainerState::Running,
        Some(ContainerSummaryStateEnum::CREATED) => ContainerState::Stopped,
        Some(ContainerSummaryStateEnum::PAUSED) => ContainerState::Paused,
        Some(ContainerSummaryStateEnum::RESTARTING) => ContainerState::Restarting,
        Some(ContainerSummaryStateEnum::EXITED) | Some(ContainerSummaryStateEnum::DEAD) => {
            ContainerState::Exited
        }
        _ => ContainerState::Unknown,
    };

    Some(RawContainerInfo {
        id,
        name,
        image: summary.image.unwrap_or_default(),
        state,
        started_at: None,
    })
}

fn from_inspect(requested: &str, response: ContainerInspectResponse) -> RawContainerInfo {
    let id = response.id.unwrap_or_else(|| requested.to_owned());
    let name = response
        .name
        .map(|name| name.trim_start_matches('/').to_owned())
        .unwrap_or_else(|| id.clone());
    let image = response
        .config
        .and_then(|config| config.image)
        .or(response.image)
        .unwrap_or_default();
    let (state, started_at) = match response.state {
        Some(state) => {
            let status = match state.status {
                Some(ContainerStateStatusEnum::RUNNING) => ContainerState::Running,
                Some(ContainerStateStatusEnum::CREATED) => ContainerState::Stopped,
                Some(ContainerStateStatusEnum::PAUSED) => ContainerState::Paused,
                Some(ContainerStateStatusEnum::RESTARTING) => ContainerState::Restarting,
                Some(ContainerStateStatusEnum::EXITED) | Some(ContainerStateStatusEnum::DEAD) => {
                    ContainerState::Exited
                }
                _ => ContainerState::Unknown,
            };
            (status, super::parse_timestamp(state.started_at.as_deref()))
        }
        None => (ContainerState::Unknown, None),
    };

    RawContainerInfo {
        id,
        name,
        image,
        state,
        started_at,
    }
}

fn from_stats(stats: ContainerStatsResponse) -> RawStats {
    let (cpu_total_usage, system_cpu_usage, online_cpus) = stats
        .cpu_stats
        .map(|cpu| {
            (
                cpu.cpu_usage.and_then(|usage| usage.total_usage),
                cpu.system_cpu_usage,
                cpu.online_cpus.map(u64::from),
            )
        })
        .unwrap_or_default();
    let (precpu_total_usage, presystem_cpu_usage) = stats
        .precpu_stats
        .map(|cpu| {
            (
                cpu.cpu_usage.and_then(|usage| usage.total_usage),
                cpu.system_cpu_usage,
            )
        })
        .unwrap_or_default();
    let (memory_usage, memory_limit) = stats
        .memory_stats
        .map(|mem| (mem.usage, mem.limit))
        .unwrap_or_default();

    RawStats {
        cpu_total_usage,
        precpu_total_usage,
        system_cpu_usage,
        presystem_cpu_usage,
        online_cpus,
        memory_usage,
        memory_limit,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_from_summary() {
        let summary = ContainerSummary {
            id: Some("abc123".to_owned()),
            names: Some(vec!["/web".to_owned()]),
            image: Some("nginx:1.27".to_owned()),
            state: Some(ContainerSummaryStateEnum::EXITED),
            ..Default::default()
        };
        let info = from_summary(summary).unwrap();
        assert_eq!(info.id, "abc123");
        assert_eq!(info.name, "web");
        assert_eq!(info.image, "nginx:1.27");
        assert_eq!(info.state, ContainerState::Exited);
    }

    #[test]
    fn test_from_summary_without_id() {
        assert!(from_summary(ContainerSummary::default()).is_none());
    }

    #[test]
    fn test_from_inspect_missing_state() {
        let info = from_inspect("abc", ContainerInspectResponse::default());
        assert_eq!(info.id, "abc");
        assert_eq!(info.name, "abc");
        assert_eq!(info.state, ContainerState::Unknown);
        assert_eq!(info.started_at, None);
    }

    #[test]
    fn test_from_stats_empty() {
        assert_eq!(from_stats(ContainerStatsResponse::default()), RawStats::default());
    }

    fn lazy_client() -> Docker {
        Docker::connect_with_http("http://127.0.0.1:1", 1, bollard::API_DEFAULT_VERSION).unwrap()
    }

    fn broken_pipe() -> bollard::errors::Error {
        bollard::errors::Error::IOError {
            err: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe"),
        }
    }

    /// Counts connection attempts. A successful attempt clears `broken` if `heals` is set.
    fn counting_connector(
        connects: Arc<AtomicUsize>,
        broken: Arc<AtomicBool>,
        heals: bool,
    ) -> Connector {
        Arc::new(move || {
            let connects = Arc::clone(&connects);
            let broken = Arc::clone(&broken);
            async move {
                connects.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                if heals {
                    broken.store(false, Ordering::SeqCst);
                }
                Ok::<_, ConnectError>(lazy_client())
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_reconnect() {
        let connects = Arc::new(AtomicUsize::new(0));
        let broken = Arc::new(AtomicBool::new(true));
        let runtime = DockerRuntime::with_connector(
            &Config::default(),
            Some(lazy_client()),
            counting_connector(Arc::clone(&connects), Arc::clone(&broken), true),
        );
        let attempts = AtomicUsize::new(0);

        let runtime = &runtime;
        let attempts_ref = &attempts;
        let broken_ref = &*broken;
        let calls = (0..8).map(|_| {
            runtime.call("abc", Duration::from_secs(5), move |_docker| async move {
                attempts_ref.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                if broken_ref.load(Ordering::SeqCst) {
                    Err(broken_pipe())
                } else {
                    Ok(())
                }
            })
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|result| result.is_ok()));
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert!(attempts.load(Ordering::SeqCst) <= 16);
        assert_eq!(runtime.session.read().await.generation, 1);
    }

    #[tokio::test]
    async fn test_disconnected_handle_reconnects_once_for_concurrent_callers() {
        let connects = Arc::new(AtomicUsize::new(0));
        let runtime = DockerRuntime::with_connector(
            &Config::default(),
            None,
            counting_connector(Arc::clone(&connects), Arc::new(AtomicBool::new(false)), true),
        );

        let handles = futures::future::join_all((0..8).map(|_| runtime.handle())).await;

        assert!(handles.iter().all(|handle| handle.is_ok()));
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert!(runtime.is_connected().await);
    }

    #[tokio::test]
    async fn test_broken_connection_is_retried_once() {
        let connects = Arc::new(AtomicUsize::new(0));
        let broken = Arc::new(AtomicBool::new(true));
        let runtime = DockerRuntime::with_connector(
            &Config::default(),
            Some(lazy_client()),
            counting_connector(Arc::clone(&connects), Arc::clone(&broken), false),
        );
        let attempts = AtomicUsize::new(0);

        let result = runtime
            .call("abc", Duration::from_secs(5), |_docker| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(broken_pipe()) }
            })
            .await;

        assert!(matches!(result, Err(Error::Api(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_daemon_errors_are_not_retried() {
        let connects = Arc::new(AtomicUsize::new(0));
        let runtime = DockerRuntime::with_connector(
            &Config::default(),
            Some(lazy_client()),
            counting_connector(Arc::clone(&connects), Arc::new(AtomicBool::new(false)), true),
        );
        let attempts = AtomicUsize::new(0);

        let result = runtime
            .call("abc", Duration::from_secs(5), |_docker| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(bollard::errors::Error::DockerResponseServerError {
                        status_code: 404,
                        message: "No such container: abc".to_owned(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(Error::NotFound(id)) if id == "abc"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_closed_runtime_is_unavailable() {
        let runtime = DockerRuntime::disconnected(&Config::default());
        runtime.close().await;
        assert!(!runtime.is_connected().await);
        let err = runtime.inspect("abc").await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_runtime_is_unavailable() {
        let config = Config {
            docker_host: Some("unix:///nonexistent/dockmon-test.sock".to_owned()),
            runtime_timeout: Duration::from_secs(1),
            ..Config::default()
        };
        let runtime = DockerRuntime::connect_or_degrade(&config).await;
        assert!(!runtime.is_connected().await);
        let err = runtime.list_containers(true).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }
}
