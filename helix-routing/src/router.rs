//! Request matching against a compiled route table.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::compiler::{CompiledRouteTable, Lookup, RouteCompiler};
use crate::error::{Result, RoutingError};
use crate::method::Method;
use crate::path::normalize_request_path;
use crate::route::{Route, RouteCollection};

/// What the router needs from an inbound request.
pub trait RequestLike {
    fn method(&self) -> Method;

    /// Request target; query string and fragment are ignored.
    fn path(&self) -> &str;
}

/// Matches requests against an immutable route table.
///
/// Cloning is cheap and clones share the table.
///
/// ```
/// use helix_routing::{Handler, Method, Route, RouteCollection, Router, RoutingError};
///
/// let mut routes = RouteCollection::new();
/// routes.add(Route::get("/users/{id}", Handler::action("users", "show")).named("user.show"));
/// routes.add(Route::post("/users", Handler::action("users", "store")));
/// let router = Router::new(routes).unwrap();
///
/// let matched = router.match_route(Method::Get, "/users/42").unwrap();
/// assert_eq!(matched.parameter("id"), Some("42"));
///
/// let err = router.match_route(Method::Delete, "/users/42").unwrap_err();
/// match err {
///     RoutingError::MethodNotAllowed { allowed, .. } => assert_eq!(allowed, vec![Method::Get]),
///     other => panic!("Expected MethodNotAllowed, got: {other:?}"),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Router {
    table: Arc<CompiledRouteTable>,
}

impl Router {
    /// Compiles `routes`.
    ///
    /// # Errors
    /// [`RoutingError::BadRouteDefinition`], see [`RouteCompiler::compile`].
    pub fn new(routes: RouteCollection) -> Result<Self> {
        Ok(Self::from_table(RouteCompiler.compile(routes)?))
    }

    pub fn from_table(table: CompiledRouteTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &Arc<CompiledRouteTable> {
        &self.table
    }

    /// Matches a method and path.
    ///
    /// `HEAD` falls back to `GET` routes. The allowed list of a 405 only
    /// holds methods of routes declared for the path.
    ///
    /// # Errors
    /// - [`RoutingError::RouteNotFound`] if no route matches the path
    /// - [`RoutingError::MethodNotAllowed`] if routes match the path but
    ///   none for `method`
    pub fn match_route(&self, method: Method, path: &str) -> Result<RouteMatch> {
        let path = normalize_request_path(path);

        let mut lookup = self.table.lookup(method, &path);
        if method == Method::Head && !matches!(lookup, Lookup::Found { .. }) {
            if let found @ Lookup::Found { .. } = self.table.lookup(Method::Get, &path) {
                lookup = found;
            }
        }

        match lookup {
            Lookup::Found { route, parameters } => {
                trace!(%method, %path, route = %route.label(), "Route matched");
                Ok(RouteMatch {
                    route: route.clone(),
                    parameters,
                })
            }
            Lookup::NotAllowed(allowed) => {
                trace!(%method, %path, ?allowed, "Method not allowed");
                Err(RoutingError::MethodNotAllowed { method, path, allowed })
            }
            Lookup::NotFound => {
                trace!(%method, %path, "No route matched");
                Err(RoutingError::RouteNotFound { method, path })
            }
        }
    }

    /// Matches `request`, keeping a reference to it in the result.
    ///
    /// # Errors
    /// See [`Router::match_route`].
    pub fn route<'r, R: RequestLike>(&self, request: &'r R) -> Result<MatchedRoute<'r, R>> {
        let found = self.match_route(request.method(), request.path())?;
        Ok(MatchedRoute { found, request })
    }
}

/// A route and the raw parameter values extracted for it.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    route: Arc<Route>,
    parameters: BTreeMap<String, String>,
}

impl RouteMatch {
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn name(&self) -> Option<&str> {
        self.route.name()
    }

    pub fn method(&self) -> Method {
        self.route.method()
    }

    /// The route's path template.
    pub fn path(&self) -> &str {
        self.route.path()
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn into_parameters(self) -> BTreeMap<String, String> {
        self.parameters
    }
}

/// A [`RouteMatch`] plus the request it was made for.
#[derive(Debug)]
pub struct MatchedRoute<'r, R> {
    found: RouteMatch,
    request: &'r R,
}

impl<'r, R> MatchedRoute<'r, R> {
    pub fn request(&self) -> &'r R {
        self.request
    }

    pub fn into_match(self) -> RouteMatch {
        self.found
    }
}

impl<R> std::ops::Deref for MatchedRoute<'_, R> {
    type Target = RouteMatch;

    fn deref(&self) -> &RouteMatch {
        &self.found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Handler;

    struct Request {
        method: Method,
        target: String,
    }

    impl RequestLike for Request {
        fn method(&self) -> Method {
            self.method
        }

        fn path(&self) -> &str {
            &self.target
        }
    }

    fn router() -> Router {
        let mut routes = RouteCollection::new();
        routes.add(Route::get("/users/{id}", Handler::action("users", "show")).named("user.show"));
        routes.add(Route::post("/users", Handler::action("users", "store")));
        Router::new(routes).unwrap()
    }

    #[test]
    fn matches_with_parameters() {
        let matched = router().match_route(Method::Get, "/users/42").unwrap();
        assert_eq!(matched.name(), Some("user.show"));
        assert_eq!(matched.path(), "/users/{id}");
        assert_eq!(matched.method(), Method::Get);
        let expected: BTreeMap<String, String> = [("id".to_string(), "42".to_string())].into();
        assert_eq!(matched.parameters(), &expected);
    }

    #[test]
    fn wrong_method_is_405_with_allowed() {
        let err = router().match_route(Method::Delete, "/users/42").unwrap_err();
        match err {
            RoutingError::MethodNotAllowed { method, allowed, .. } => {
                assert_eq!(method, Method::Delete);
                assert_eq!(allowed, vec![Method::Get]);
            }
            other => panic!("Expected MethodNotAllowed, got: {other:?}"),
        }

        let err = router().match_route(Method::Get, "/users").unwrap_err();
        assert!(matches!(
            err,
            RoutingError::MethodNotAllowed { ref allowed, .. } if allowed == &[Method::Post]
        ));
    }

    #[test]
    fn unknown_path_is_404() {
        let err = router().match_route(Method::Get, "/unknown").unwrap_err();
        assert!(matches!(err, RoutingError::RouteNotFound { ref path, .. } if path == "/unknown"));
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn head_falls_back_to_get() {
        let matched = router().match_route(Method::Head, "/users/1").unwrap();
        assert_eq!(matched.name(), Some("user.show"));

        let err = router().match_route(Method::Head, "/users").unwrap_err();
        assert!(matches!(
            err,
            RoutingError::MethodNotAllowed { ref allowed, .. } if allowed == &[Method::Post]
        ));
    }

    #[test]
    fn request_path_is_normalized() {
        let matched = router().match_route(Method::Get, "//users/7/?tab=1").unwrap();
        assert_eq!(matched.parameter("id"), Some("7"));
    }

    #[test]
    fn route_keeps_the_request() {
        let request = Request {
            method: Method::Post,
            target: "/users".into(),
        };
        let matched = router().route(&request).unwrap();
        assert!(std::ptr::eq(matched.request(), &request));
        assert!(matched.parameters().is_empty());
    }

    #[test]
    fn clones_share_the_table() {
        let router = router();
        let clone = router.clone();
        assert!(Arc::ptr_eq(router.table(), clone.table()));
    }
}
