//! Access to the container runtime.
//!
//! The [`Runtime`] trait is the only way the rest of the crate talks to the
//! container engine. [`DockerRuntime`] implements it on top of the Docker
//! Engine API and owns the long-lived client handle, including reconnection.
//!
//! Types in this module are deliberately smaller than the engine's native
//! models: they carry exactly what status collection and log retrieval need.
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::container::ContainerState;

mod docker;
mod error;
#[cfg(test)]
pub(crate) mod stub;

pub use docker::DockerRuntime;
pub use error::{ConnectError, Error, Result};

/// Container metadata as reported by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct RawContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub started_at: Option<DateTime<Utc>>,
}

/// A single resource usage sample together with the sample preceding it.
///
/// CPU counters are cumulative nanoseconds; percentages are derived from the
/// difference between the two samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStats {
    pub cpu_total_usage: Option<u64>,
    pub precpu_total_usage: Option<u64>,
    pub system_cpu_usage: Option<u64>,
    pub presystem_cpu_usage: Option<u64>,
    pub online_cpus: Option<u64>,
    pub memory_usage: Option<u64>,
    pub memory_limit: Option<u64>,
}

/// Primitives offered by a container runtime.
///
/// Implementations must be safe to share between concurrently running requests.
pub trait Runtime: Send + Sync + 'static {
    /// Lists containers, including stopped ones if `all` is set.
    fn list_containers(
        &self,
        all: bool,
    ) -> impl Future<Output = Result<Vec<RawContainerInfo>>> + Send;

    /// Returns metadata for one container.
    ///
    /// Fails with [`Error::NotFound`] if the runtime does not know `id`.
    fn inspect(&self, id: &str) -> impl Future<Output = Result<RawContainerInfo>> + Send;

    /// Takes one resource usage sample for a running container.
    fn stats(&self, id: &str) -> impl Future<Output = Result<RawStats>> + Send;

    /// Returns at most `tail_lines` of the most recent output lines, oldest first.
    ///
    /// Fails with [`Error::NotFound`] for unknown ids and [`Error::Timeout`] if the
    /// runtime does not finish within `timeout`.
    fn fetch_logs(
        &self,
        id: &str,
        tail_lines: usize,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Decodes raw log output into lines.
///
/// Invalid UTF-8 sequences are replaced with U+FFFD. A trailing newline does not
/// produce an empty last line, and `\r\n` line endings are normalized.
pub fn decode_lines(raw: &[u8]) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    let text = String::from_utf8_lossy(raw);
    let text = text.strip_suffix('\n').unwrap_or(&text);
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_owned())
        .collect()
}

/// Parses a runtime timestamp, treating the zero time used for never-started containers as absent.
pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    if raw.is_empty() || raw.starts_with("0001-01-01") {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(err) => {
            log::debug!("ignoring unparsable timestamp `{}`: {}", raw, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_lines_basic() {
        let lines = decode_lines(b"first\nsecond\r\nthird\n");
        assert_eq!(lines, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_decode_lines_without_trailing_newline() {
        assert_eq!(decode_lines(b"a\nb"), vec!["a", "b"]);
    }

    #[test]
    fn test_decode_lines_keeps_blank_lines() {
        assert_eq!(decode_lines(b"a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_decode_lines_empty() {
        assert!(decode_lines(b"").is_empty());
    }

    #[test]
    fn test_decode_lines_replaces_invalid_utf8() {
        let lines = decode_lines(b"ok\nbad \xff\xfe byte\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "ok");
        assert_eq!(lines[1], "bad \u{FFFD}\u{FFFD} byte");
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp(Some("2024-05-01T12:30:00.123456789Z")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T12:30:00.123456789+00:00");
        assert_eq!(parse_timestamp(Some("0001-01-01T00:00:00Z")), None);
        assert_eq!(parse_timestamp(Some("yesterday")), None);
        assert_eq!(parse_timestamp(None), None);
    }
}
