//! Route declarations.
//!
//! A [`Route`] maps a method and a path template to an opaque [`Handler`].
//! Routes are collected in a [`RouteCollection`], optionally inside
//! [`RouteGroup`]s sharing a path prefix, a name prefix and middleware.
//!
//! # Examples
//! ```rust
//! use helix_routing::route::{Handler, Route, RouteCollection, RouteGroup};
//!
//! let mut routes = RouteCollection::new();
//! routes.add(Route::get("/", Handler::action("home", "index")).named("home"));
//! routes.group(RouteGroup::new("/admin").name_prefix("admin."), |admin| {
//!     admin.add(
//!         Route::get("/users/{id}", Handler::action("users", "show"))
//!             .named("user.show")
//!             .where_("id", "\\d+"),
//!     );
//! });
//!
//! let show = routes.iter().find(|r| r.name() == Some("admin.user.show")).unwrap();
//! assert_eq!(show.path(), "/admin/users/{id}");
//! ```

use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::method::Method;
use crate::path::normalize;

/// Opaque middleware reference, interpreted by the HTTP kernel.
pub type Middleware = Arc<dyn Any + Send + Sync>;

/// What a matched route dispatches to. The router never looks inside.
#[derive(Clone)]
pub enum Handler {
    /// A controller service and one of its actions.
    Action {
        controller: Cow<'static, str>,
        action: Cow<'static, str>,
    },
    /// Any callable value, downcast by whoever executes it.
    Callable(Arc<dyn Any + Send + Sync>),
}

impl Handler {
    pub fn action(
        controller: impl Into<Cow<'static, str>>,
        action: impl Into<Cow<'static, str>>,
    ) -> Self {
        Handler::Action {
            controller: controller.into(),
            action: action.into(),
        }
    }

    pub fn callable<T: Any + Send + Sync>(callable: T) -> Self {
        Handler::Callable(Arc::new(callable))
    }

    /// Returns the callable as `T`, if this is a callable of that type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Handler::Callable(callable) => callable.downcast_ref::<T>(),
            Handler::Action { .. } => None,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Action { controller, action } => write!(f, "{controller}::{action}"),
            Handler::Callable(_) => f.write_str("<callable>"),
        }
    }
}

/// A declared route.
///
/// The path is normalized on construction: leading slash, no repeated or
/// trailing slashes.
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: String,
    name: Option<String>,
    wheres: BTreeMap<String, String>,
    middleware: Vec<Middleware>,
    handler: Handler,
}

impl Route {
    pub fn new(method: Method, path: &str, handler: Handler) -> Self {
        Self {
            method,
            path: normalize(path),
            name: None,
            wheres: BTreeMap::new(),
            middleware: Vec::new(),
            handler,
        }
    }

    pub fn get(path: &str, handler: Handler) -> Self {
        Self::new(Method::Get, path, handler)
    }

    pub fn head(path: &str, handler: Handler) -> Self {
        Self::new(Method::Head, path, handler)
    }

    pub fn post(path: &str, handler: Handler) -> Self {
        Self::new(Method::Post, path, handler)
    }

    pub fn put(path: &str, handler: Handler) -> Self {
        Self::new(Method::Put, path, handler)
    }

    pub fn patch(path: &str, handler: Handler) -> Self {
        Self::new(Method::Patch, path, handler)
    }

    pub fn delete(path: &str, handler: Handler) -> Self {
        Self::new(Method::Delete, path, handler)
    }

    pub fn options(path: &str, handler: Handler) -> Self {
        Self::new(Method::Options, path, handler)
    }

    /// Names the route for URL generation.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Constrains a parameter with a regex fragment.
    ///
    /// An inline `{name:regex}` in the path takes precedence.
    pub fn where_(mut self, parameter: impl Into<String>, regex: impl Into<String>) -> Self {
        self.wheres.insert(parameter.into(), regex.into());
        self
    }

    /// Appends a middleware.
    pub fn middleware<M: Any + Send + Sync>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The normalized path template.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn wheres(&self) -> &BTreeMap<String, String> {
        &self.wheres
    }

    pub fn middlewares(&self) -> &[Middleware] {
        &self.middleware
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// `name` or `METHOD path`, for diagnostics.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{} {}", self.method, self.path),
        }
    }

    fn within(mut self, group: &RouteGroup) -> Self {
        self.path = normalize(&format!("{}/{}", group.prefix, self.path));
        if let Some(name) = self.name.take() {
            self.name = Some(format!("{}{}", group.name_prefix, name));
        }
        let mut middleware = group.middleware.clone();
        middleware.append(&mut self.middleware);
        self.middleware = middleware;
        self
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("wheres", &self.wheres)
            .field("middleware", &self.middleware.len())
            .field("handler", &self.handler)
            .finish()
    }
}

/// Attributes shared by every route declared inside a group.
#[derive(Clone, Default)]
pub struct RouteGroup {
    prefix: String,
    name_prefix: String,
    middleware: Vec<Middleware>,
}

impl RouteGroup {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Prepended to the names of named routes.
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Runs before the middleware of each route in the group.
    pub fn middleware<M: Any + Send + Sync>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }
}

impl fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteGroup")
            .field("prefix", &self.prefix)
            .field("name_prefix", &self.name_prefix)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// An ordered set of routes, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RouteCollection {
    routes: Vec<Route>,
}

impl RouteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, route: Route) -> &mut Self {
        self.routes.push(route);
        self
    }

    /// Declares routes inside `group`; nested groups stack their prefixes.
    pub fn group(
        &mut self,
        group: RouteGroup,
        declare: impl FnOnce(&mut RouteCollection),
    ) -> &mut Self {
        let mut inner = RouteCollection::new();
        declare(&mut inner);
        self.routes
            .extend(inner.routes.into_iter().map(|route| route.within(&group)));
        self
    }

    /// Appends every route of `other`.
    pub fn extend(&mut self, other: RouteCollection) -> &mut Self {
        self.routes.extend(other.routes);
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub(crate) fn into_routes(self) -> Vec<Route> {
        self.routes
    }
}

impl FromIterator<Route> for RouteCollection {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}
