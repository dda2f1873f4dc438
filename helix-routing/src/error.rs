//! Error types for route compilation, matching and URL generation.

use std::fmt;

use helix_support::rendering::render_list;

use crate::method::Method;

/// Main error type for routing operations.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// A route could not be compiled. Fatal at boot.
    #[error("{}", .0)]
    BadRouteDefinition(BadRouteDefinitionError),

    /// No route matches the path, whatever the method (404).
    #[error("No route matches {method} {path}")]
    RouteNotFound { method: Method, path: String },

    /// Routes match the path but none for this method (405).
    #[error("Method {method} is not allowed for {path}; allowed: {}", render_list(.allowed))]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    /// URL generation was asked for a name no route carries.
    #[error("{}", .0)]
    InvalidRouteName(InvalidRouteNameError),

    /// URL generation received a parameter the route does not declare.
    #[error("Route `{route}` has no parameter `{parameter}`")]
    InvalidRouteParameter { route: String, parameter: String },
}

impl RoutingError {
    /// The HTTP status this error maps to, for runtime routing outcomes.
    pub fn status(&self) -> Option<u16> {
        match self {
            RoutingError::RouteNotFound { .. } => Some(404),
            RoutingError::MethodNotAllowed { .. } => Some(405),
            _ => None,
        }
    }
}

/// Error when a route template or route set is malformed.
#[derive(Debug)]
pub struct BadRouteDefinitionError {
    /// Name, or `METHOD path` of unnamed routes.
    pub route: String,
    /// Byte offset in the normalized path template.
    pub offset: usize,
    pub reason: String,
}

impl fmt::Display for BadRouteDefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bad route definition {} at offset {}: {}",
            self.route, self.offset, self.reason
        )
    }
}

/// Error when no route carries the requested name.
#[derive(Debug)]
pub struct InvalidRouteNameError {
    pub name: String,
    pub suggestions: Vec<String>,
}

impl fmt::Display for InvalidRouteNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No route named `{}`", self.name)?;
        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean: {}", render_list(&self.suggestions))?;
        }
        Ok(())
    }
}

/// Convenient Result type for routing operations.
pub type Result<T> = std::result::Result<T, RoutingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_not_allowed_lists_methods() {
        let err = RoutingError::MethodNotAllowed {
            method: Method::Delete,
            path: "/users/42".into(),
            allowed: vec![Method::Get, Method::Put],
        };
        assert_eq!(
            err.to_string(),
            "Method DELETE is not allowed for /users/42; allowed: GET, PUT"
        );
        assert_eq!(err.status(), Some(405));
    }

    #[test]
    fn bad_definition_mentions_offset() {
        let err = RoutingError::BadRouteDefinition(BadRouteDefinitionError {
            route: "GET /{2bad}".into(),
            offset: 2,
            reason: "parameter name must not start with a digit".into(),
        });
        let msg = err.to_string();
        assert!(msg.contains("offset 2"));
        assert!(msg.contains("GET /{2bad}"));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn invalid_name_suggests() {
        let err = RoutingError::InvalidRouteName(InvalidRouteNameError {
            name: "user.shw".into(),
            suggestions: vec!["user.show".into()],
        });
        assert!(err.to_string().contains("Did you mean: user.show"));
    }
}
