use std::time::Duration;

use crate::container::{self, ContainerID};
use crate::runtime;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    InvalidId(#[from] container::Error),
    #[error("tail must be at least 1, got {0}")]
    InvalidTail(usize),
    #[error("container `{0}` not found")]
    NotFound(ContainerID),
    #[error("fetching logs did not finish within {0:?}")]
    Timeout(Duration),
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),
    #[error("failed to fetch logs: {0}")]
    Runtime(#[source] runtime::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
