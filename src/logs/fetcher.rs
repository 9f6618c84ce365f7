use std::sync::Arc;
use std::time::Duration;

use super::{Error, Result};
use crate::config::Config;
use crate::container::ContainerID;
use crate::runtime::{self, Runtime};

/// Text returned in place of an empty log window.
pub fn no_output_marker(tail: usize) -> String {
    format!("No log output in the last {} lines.", tail)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogContent {
    /// Output lines, oldest first. Contains at least one non-blank line.
    Lines(Vec<String>),
    /// The fetch succeeded but the container produced no output, or only empty lines.
    NoOutput,
}

/// The most recent output of one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogWindow {
    pub container_id: ContainerID,
    /// Number of lines that were requested from the runtime.
    pub tail: usize,
    pub content: LogContent,
    /// `true` if older output may exist beyond this window.
    pub truncated: bool,
}

impl LogWindow {
    /// Returns the fetched lines; empty for [`LogContent::NoOutput`].
    pub fn lines(&self) -> &[String] {
        match &self.content {
            LogContent::Lines(lines) => lines,
            LogContent::NoOutput => &[],
        }
    }

    /// Renders the window as plain text, lines joined by `\n`.
    pub fn to_text(&self) -> String {
        match &self.content {
            LogContent::Lines(lines) => lines.join("\n"),
            LogContent::NoOutput => no_output_marker(self.tail),
        }
    }
}

/// Fetches bounded log windows from a [`Runtime`].
#[derive(Debug)]
pub struct LogFetcher<R> {
    runtime: Arc<R>,
    default_tail: usize,
    max_tail: usize,
    timeout: Duration,
}

impl<R: Runtime> LogFetcher<R> {
    pub fn new(runtime: Arc<R>, config: &Config) -> Self {
        Self {
            runtime,
            default_tail: config.log_tail,
            max_tail: config.log_tail_max,
            timeout: config.log_timeout,
        }
    }

    /// Fetches the last `tail` lines (or the configured default) of `container_id`.
    ///
    /// A `tail` above the configured maximum is clamped to the maximum and the
    /// window is marked as truncated.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidId`] if `container_id` is empty.
    /// * [`Error::InvalidTail`] if `tail` is zero.
    /// * [`Error::NotFound`] if the runtime does not know the container.
    /// * [`Error::Timeout`] if the runtime does not answer within the log timeout.
    /// * [`Error::Unavailable`] or [`Error::Runtime`] for other runtime failures.
    pub async fn fetch(&self, container_id: &str, tail: Option<usize>) -> Result<LogWindow> {
        let container_id = ContainerID::new(container_id)?;
        let requested = tail.unwrap_or(self.default_tail);
        if requested == 0 {
            return Err(Error::InvalidTail(requested));
        }
        let tail = requested.min(self.max_tail);

        let fetched = tokio::time::timeout(
            self.timeout,
            self.runtime
                .fetch_logs(container_id.as_str(), tail, self.timeout),
        )
        .await;
        let mut lines = match fetched {
            Ok(Ok(lines)) => lines,
            Ok(Err(runtime::Error::NotFound(_))) => return Err(Error::NotFound(container_id)),
            Ok(Err(runtime::Error::Timeout(_))) | Err(_) => {
                return Err(Error::Timeout(self.timeout));
            }
            Ok(Err(runtime::Error::Unavailable(reason))) => return Err(Error::Unavailable(reason)),
            Ok(Err(err)) => return Err(Error::Runtime(err)),
        };

        let truncated = requested > tail || lines.len() >= tail;
        if lines.len() > tail {
            lines.drain(..lines.len() - tail);
        }
        log::trace!(
            "Fetched {} log lines for container `{}` (tail={}, truncated={})",
            lines.len(),
            container_id,
            tail,
            truncated
        );

        let content = if lines.iter().all(|line| line.is_empty()) {
            LogContent::NoOutput
        } else {
            LogContent::Lines(lines)
        };
        Ok(LogWindow {
            container_id,
            tail,
            content,
            truncated,
        })
    }
}
