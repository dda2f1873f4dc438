//! Error types for container and boot operations.
//!
//! Every error carries the service id (and where known, the consumer and
//! the parameter) so the message alone points at the broken wiring.

use std::fmt;

use helix_support::rendering::render_chain;

use crate::id::ServiceId;

/// Error type returned by declarators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// No definition or alias resolves the requested id.
    #[error("{}", .0)]
    ServiceNotFound(ServiceNotFoundError),

    /// The declarator of a service failed. The cause is kept as `source`.
    #[error("Failed to initialize {id}: {source}")]
    InitializationFailure {
        id: ServiceId,
        #[source]
        source: BoxError,
    },

    /// A service was re-entered while it was still being built.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// No value resolver could supply a declared parameter.
    #[error("{}", .0)]
    UnresolvableParameter(UnresolvableParameterError),

    /// A resolved value did not have the type the consumer asked for.
    #[error("Type mismatch for {subject}: expected {expected}")]
    ArgumentMismatch {
        subject: String,
        expected: &'static str,
    },
}

impl ContainerError {
    /// Returns the id this error is about, if it is about a single service.
    pub fn service_id(&self) -> Option<&ServiceId> {
        match self {
            ContainerError::ServiceNotFound(e) => Some(&e.requested),
            ContainerError::InitializationFailure { id, .. } => Some(id),
            ContainerError::UnresolvableParameter(e) => Some(&e.service),
            ContainerError::CircularDependency(e) => e.chain.first(),
            ContainerError::ArgumentMismatch { .. } => None,
        }
    }
}

/// Error when an id has no definition.
#[derive(Debug)]
pub struct ServiceNotFoundError {
    /// The id that was requested
    pub requested: ServiceId,
    /// The service whose parameter needed it, if any
    pub required_by: Option<ServiceId>,
    /// Registered ids that look alike
    pub suggestions: Vec<String>,
}

impl fmt::Display for ServiceNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not found: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        Ok(())
    }
}

/// Error when a service depends on itself through its parameters.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Ids from the first occurrence of the repeated service to its re-entry.
    pub chain: Vec<ServiceId>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.chain.iter().map(ServiceId::short_name).collect();
        write!(f, "Circular dependency detected:\n  {}", render_chain(&names))?;
        write!(
            f,
            "\n  Hint: resolve one side lazily through the container instead of a parameter"
        )
    }
}

/// Error when a declared parameter could not be supplied.
#[derive(Debug)]
pub struct UnresolvableParameterError {
    pub service: ServiceId,
    pub parameter: String,
}

impl fmt::Display for UnresolvableParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot resolve parameter `{}` of {}",
            self.parameter, self.service
        )?;
        write!(
            f,
            "\n  Hint: declare its service type, an attribute or a default value"
        )
    }
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors raised while booting extensions.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    /// Configuration named an extension nobody provided.
    #[error("Unknown extension `{0}`")]
    UnknownExtension(String),

    /// Configuration named the same extension twice.
    #[error("Extension `{0}` is listed more than once")]
    DuplicateExtension(String),

    /// A registration action of an extension failed.
    #[error("Registration in extension {extension} failed: {source}")]
    Registration {
        extension: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Container(#[from] ContainerError),
}
