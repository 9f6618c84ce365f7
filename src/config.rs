//! Service configuration read from environment variables at startup.
//!
//! | Variable | Default |
//! |---|---|
//! | `DOCKMON_LISTEN_ADDR` | `0.0.0.0:8000` |
//! | `DOCKMON_DOCKER_HOST` | bollard local defaults (honors `DOCKER_HOST`) |
//! | `DOCKMON_RUNTIME_TIMEOUT_SECS` | `10` |
//! | `DOCKMON_COLLECT_TIMEOUT_SECS` | `30` |
//! | `DOCKMON_LOG_TIMEOUT_SECS` | `15` |
//! | `DOCKMON_LOG_TAIL` | `200` |
//! | `DOCKMON_LOG_TAIL_MAX` | `2000` |
//! | `DOCKMON_INCLUDE_STOPPED` | `true` |
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_RUNTIME_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOG_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_LOG_TAIL: usize = 200;
pub const DEFAULT_LOG_TAIL_MAX: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for `{key}`: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("`DOCKMON_LOG_TAIL` ({tail}) must not exceed `DOCKMON_LOG_TAIL_MAX` ({max})")]
    TailExceedsMax { tail: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen_addr: String,
    /// Docker endpoint, e.g. `unix:///var/run/docker.sock` or `tcp://10.0.0.2:2375`.
    pub docker_host: Option<String>,
    /// Upper bound for a single list/inspect/stats call against the runtime.
    pub runtime_timeout: Duration,
    /// Upper bound for a whole status collection pass.
    pub collect_timeout: Duration,
    pub log_timeout: Duration,
    pub log_tail: usize,
    pub log_tail_max: usize,
    pub include_stopped: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_owned(),
            docker_host: None,
            runtime_timeout: DEFAULT_RUNTIME_TIMEOUT,
            collect_timeout: DEFAULT_COLLECT_TIMEOUT,
            log_timeout: DEFAULT_LOG_TIMEOUT,
            log_tail: DEFAULT_LOG_TAIL,
            log_tail_max: DEFAULT_LOG_TAIL_MAX,
            include_stopped: true,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if a variable is set to a value that cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Unset or blank keys fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            listen_addr: get("DOCKMON_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            docker_host: get("DOCKMON_DOCKER_HOST"),
            runtime_timeout: parse_secs(&get, "DOCKMON_RUNTIME_TIMEOUT_SECS")?
                .unwrap_or(defaults.runtime_timeout),
            collect_timeout: parse_secs(&get, "DOCKMON_COLLECT_TIMEOUT_SECS")?
                .unwrap_or(defaults.collect_timeout),
            log_timeout: parse_secs(&get, "DOCKMON_LOG_TIMEOUT_SECS")?
                .unwrap_or(defaults.log_timeout),
            log_tail: parse_positive(&get, "DOCKMON_LOG_TAIL")?.unwrap_or(defaults.log_tail),
            log_tail_max: parse_positive(&get, "DOCKMON_LOG_TAIL_MAX")?
                .unwrap_or(defaults.log_tail_max),
            include_stopped: parse(&get, "DOCKMON_INCLUDE_STOPPED")?
                .unwrap_or(defaults.include_stopped),
        };

        if config.log_tail > config.log_tail_max {
            return Err(Error::TailExceedsMax {
                tail: config.log_tail,
                max: config.log_tail_max,
            });
        }

        Ok(config)
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|err| Error::InvalidValue {
                    key,
                    reason: err.to_string(),
                    value,
                })
        })
        .transpose()
}

fn parse_positive(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<usize>> {
    match parse::<usize>(get, key)? {
        Some(0) => Err(Error::InvalidValue {
            key,
            value: "0".to_owned(),
            reason: "must be greater than zero".to_owned(),
        }),
        other => Ok(other),
    }
}

fn parse_secs(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<Duration>> {
    Ok(parse_positive(get, key)?.map(|secs| Duration::from_secs(secs as u64)))
}
