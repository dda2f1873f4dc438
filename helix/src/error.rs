//! Application-level errors.

use helix_container::error::{BootError, ContainerError};
use helix_routing::RoutingError;

/// Anything that can stop an application from starting.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Boot(#[from] BootError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl Error {
    /// Unwraps a routing error that surfaced while building a service.
    pub(crate) fn from_build(err: ContainerError) -> Self {
        match err {
            ContainerError::InitializationFailure { id, source } => {
                match source.downcast::<RoutingError>() {
                    Ok(routing) => Error::Routing(*routing),
                    Err(source) => {
                        Error::Container(ContainerError::InitializationFailure { id, source })
                    }
                }
            }
            other => Error::Container(other),
        }
    }
}

/// Convenient Result type for application set-up.
pub type Result<T> = std::result::Result<T, Error>;
