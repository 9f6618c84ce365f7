//! Retrieval of recent container output.
//!
//! [`LogFetcher`] returns a bounded window of the most recent log lines of one
//! container, oldest first. Lines are passed through verbatim apart from
//! invalid UTF-8, which is replaced. A fetch that succeeds without any output
//! yields [`LogContent::NoOutput`] instead of an empty window.
mod error;
mod fetcher;

pub use error::{Error, Result};
pub use fetcher::{LogContent, LogFetcher, LogWindow, no_output_marker};
