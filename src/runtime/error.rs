use std::time::Duration;

/// Errors raised while establishing the runtime session at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("failed to create runtime client for `{host}`: {source}")]
    Client {
        host: String,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("runtime did not answer ping: {0}")]
    Ping(#[source] bollard::errors::Error),
    #[error("runtime did not answer ping within {0:?}")]
    Timeout(Duration),
}

/// Errors returned by the [`Runtime`](super::Runtime) primitives.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no such container: {0}")]
    NotFound(String),
    #[error("runtime did not respond within {0:?}")]
    Timeout(Duration),
    #[error("runtime unavailable: {0}")]
    Unavailable(String),
    #[error("runtime request failed: {0}")]
    Api(#[source] bollard::errors::Error),
}

impl Error {
    /// Classifies a bollard error for the container `id`.
    ///
    /// A 404 from the daemon is the only response that maps to [`Error::NotFound`].
    pub fn from_bollard(id: &str, err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => Error::NotFound(id.to_owned()),
            err => Error::Api(err),
        }
    }
}

/// Returns `true` if the error indicates a broken transport rather than a daemon answer.
pub(super) fn is_connection_error(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::IOError { .. }
            | bollard::errors::Error::HyperResponseError { .. }
            | bollard::errors::Error::HyperLegacyError { .. }
    )
}

pub type Result<T> = std::result::Result<T, Error>;
