use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// An opaque container reference as given by a caller.
///
/// The value may be a full id, a short id prefix or a container name; the
/// runtime resolves it. Only emptiness is validated here.
///
/// # Examples
///
/// ```
/// # use dockmon::container::{ContainerID, Error};
/// let container_id = ContainerID::new("3f4e2a").unwrap();
/// assert_eq!(container_id.as_ref(), "3f4e2a");
/// assert!(matches!(ContainerID::new(""), Err(Error::EmptyContainerID)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id, keeping it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyContainerID`] if the input is empty or whitespace only.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.trim().is_empty() {
            return Err(Error::EmptyContainerID);
        }

        Ok(Self(src.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized lifecycle state of a container, independent of the runtime's own naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Running,
    Stopped,
    Paused,
    Restarting,
    Exited,
    Unknown,
}

impl ContainerState {
    /// Returns `true` if resource metrics can be sampled for a container in this state.
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Running => "running",
            ContainerState::Stopped => "stopped",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Exited => "exited",
            ContainerState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
