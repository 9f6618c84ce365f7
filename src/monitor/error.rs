use std::time::Duration;

use crate::runtime;

/// Failure of a whole collection pass.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),
    #[error("failed to list containers: {0}")]
    List(#[source] runtime::Error),
    #[error("listing containers did not finish within {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
