//! HTTP kernel.
//!
//! The [`Kernel`] routes a [`Request`], runs the route's middleware and
//! dispatches to its handler:
//!
//! - [`Handler::Callable`] holding a [`HandlerFn`] (see [`handler`])
//! - [`Handler::Action`] naming a controller service (registered with
//!   [`controller`]) and one of its actions
//!
//! Routing failures become 404 and 405 responses, handler errors a 500.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, instrument, trace, warn};

use helix_container::prelude::{
    Arguments, BoxError, Container, Declarator, Extension, ExtensionMetadata, Parameter, ServiceId,
};
use helix_routing::{
    Handler, MatchedRoute, Method, RequestLike, Route, RouteCollection, RouteGroup, Router,
    RoutingError, UrlGenerator,
};
use helix_support::rendering::render_list;

use crate::config::AppConfig;

// ═══════════════════════════════════════════
// Messages
// ═══════════════════════════════════════════

/// An inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    target: String,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl Request {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::Post, target)
    }

    /// Header names are case-insensitive.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Path plus query string, as received.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn query(&self) -> Option<&str> {
        let (_, query) = self.target.split_once('?')?;
        Some(query.split('#').next().unwrap_or(query))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl RequestLike for Request {
    fn method(&self) -> Method {
        self.method
    }

    fn path(&self) -> &str {
        &self.target
    }
}

/// An outbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    body: String,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }

    /// `200 OK` with a body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200).with_body(body)
    }

    /// Header names are case-insensitive.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

// ═══════════════════════════════════════════
// Handlers
// ═══════════════════════════════════════════

/// A matched request, as seen by middleware and handlers.
pub struct RequestContext<'r> {
    matched: MatchedRoute<'r, Request>,
    container: &'r Container,
}

impl<'r> RequestContext<'r> {
    pub fn request(&self) -> &'r Request {
        self.matched.request()
    }

    pub fn route(&self) -> &Route {
        self.matched.route()
    }

    /// Raw value of a path parameter.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.matched.parameter(name)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        self.matched.parameters()
    }

    pub fn container(&self) -> &'r Container {
        self.container
    }
}

impl fmt::Debug for RequestContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("route", &self.route().label())
            .field("parameters", self.parameters())
            .finish()
    }
}

/// Callable stored in [`Handler::Callable`].
pub type HandlerFn = Arc<dyn Fn(&RequestContext<'_>) -> Result<Response, BoxError> + Send + Sync>;

/// Middleware stored in a route's middleware list. Call `next.run(context)`
/// to continue, or return a response to short-circuit.
pub type MiddlewareFn =
    Arc<dyn Fn(&RequestContext<'_>, Next<'_>) -> Result<Response, BoxError> + Send + Sync>;

type Endpoint<'a> = dyn Fn(&RequestContext<'_>) -> Result<Response, BoxError> + 'a;

/// Wraps a closure as a route handler.
pub fn handler<F>(handle: F) -> Handler
where
    F: Fn(&RequestContext<'_>) -> Result<Response, BoxError> + Send + Sync + 'static,
{
    Handler::callable(Arc::new(handle) as HandlerFn)
}

/// Wraps a closure as route middleware.
pub fn middleware<F>(handle: F) -> MiddlewareFn
where
    F: Fn(&RequestContext<'_>, Next<'_>) -> Result<Response, BoxError> + Send + Sync + 'static,
{
    Arc::new(handle)
}

/// The rest of a middleware chain.
pub struct Next<'a> {
    chain: &'a [MiddlewareFn],
    endpoint: &'a Endpoint<'a>,
}

impl Next<'_> {
    pub fn run(self, context: &RequestContext<'_>) -> Result<Response, BoxError> {
        match self.chain.split_first() {
            Some((first, rest)) => first(
                context,
                Next {
                    chain: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(context),
        }
    }
}

/// A service whose actions handle [`Handler::Action`] routes.
pub trait Controller: Send + Sync {
    /// Runs `action`; unknown actions should fail with
    /// [`HttpError::UnknownAction`].
    fn call(&self, action: &str, context: &RequestContext<'_>) -> Result<Response, BoxError>;
}

/// How controllers are stored in the container.
pub type ControllerRef = Arc<dyn Controller>;

/// Declarator registering a controller so the kernel can find it.
///
/// ```rust,ignore
/// metadata.singleton("users", controller(|_| Ok(UserController)));
/// ```
pub fn controller<C, F>(build: F) -> Declarator
where
    C: Controller + 'static,
    F: Fn(&Arguments) -> Result<C, BoxError> + Send + Sync + 'static,
{
    Declarator::new(move |args| Ok(Arc::new(build(args)?) as ControllerRef))
}

/// Dispatch failures that are not the handler's own.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Controller `{controller}` has no action `{action}`")]
    UnknownAction { controller: String, action: String },

    #[error("Route {route} has a callable handler that is not a HandlerFn")]
    UnsupportedHandler { route: String },
}

// ═══════════════════════════════════════════
// Kernel
// ═══════════════════════════════════════════

/// Turns requests into responses.
#[derive(Clone)]
pub struct Kernel {
    router: Arc<Router>,
    container: Arc<Container>,
}

impl Kernel {
    pub fn new(router: Arc<Router>, container: Arc<Container>) -> Self {
        Self { router, container }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handles one request to completion. Never fails: errors become
    /// responses.
    #[instrument(
        skip_all,
        name = "http",
        fields(method = %request.method(), target = %request.target())
    )]
    pub fn handle(&self, request: Request) -> Response {
        let matched = match self.router.route(&request) {
            Ok(matched) => matched,
            Err(err) => {
                debug!(error = %err, "Routing failed");
                return routing_response(&err);
            }
        };

        let chain: Vec<MiddlewareFn> = matched
            .route()
            .middlewares()
            .iter()
            .filter_map(|m| {
                let found = m.downcast_ref::<MiddlewareFn>().cloned();
                if found.is_none() {
                    warn!(
                        route = %matched.route().label(),
                        "Skipping middleware that is not a MiddlewareFn"
                    );
                }
                found
            })
            .collect();

        let context = RequestContext {
            matched,
            container: &self.container,
        };
        let endpoint = |context: &RequestContext<'_>| self.dispatch(context);
        let next = Next {
            chain: &chain,
            endpoint: &endpoint,
        };

        match next.run(&context) {
            Ok(response) => {
                trace!(status = response.status(), "Request handled");
                response
            }
            Err(err) => {
                error!(error = %err, route = %context.route().label(), "Handler failed");
                Response::new(500).with_body("Internal Server Error")
            }
        }
    }

    fn dispatch(&self, context: &RequestContext<'_>) -> Result<Response, BoxError> {
        match context.route().handler() {
            Handler::Action { controller, action } => {
                let instance = self
                    .container
                    .get_as::<ControllerRef>(&ServiceId::new(controller.clone()))?;
                instance.call(action, context)
            }
            callable @ Handler::Callable(_) => {
                let Some(handle) = callable.downcast_ref::<HandlerFn>() else {
                    return Err(HttpError::UnsupportedHandler {
                        route: context.route().label(),
                    }
                    .into());
                };
                handle(context)
            }
        }
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("routes", &self.router.table().len())
            .finish()
    }
}

fn routing_response(err: &RoutingError) -> Response {
    let response = Response::new(err.status().unwrap_or(500)).with_body(err.to_string());
    match err {
        RoutingError::MethodNotAllowed { allowed, .. } => {
            response.with_header("Allow", render_list(allowed))
        }
        _ => response,
    }
}

// ═══════════════════════════════════════════
// Extension
// ═══════════════════════════════════════════

/// Routes contributed during boot, before the router is built.
#[derive(Default)]
pub struct RouteRegistry {
    routes: Mutex<RouteCollection>,
}

impl RouteRegistry {
    pub fn add(&self, route: Route) {
        self.routes.lock().add(route);
    }

    pub fn group(&self, group: RouteGroup, declare: impl FnOnce(&mut RouteCollection)) {
        self.routes.lock().group(group, declare);
    }

    pub fn extend(&self, routes: RouteCollection) {
        self.routes.lock().extend(routes);
    }

    /// A copy of the routes added so far.
    pub fn snapshot(&self) -> RouteCollection {
        self.routes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.routes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RouteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRegistry")
            .field("routes", &self.len())
            .finish()
    }
}

/// Declares the routing services.
///
/// Other extensions add routes from a registration gated on
/// [`RouteRegistry`]:
///
/// ```rust,ignore
/// metadata
///     .registration("routes", |container| {
///         let routes = container.resolve::<RouteRegistry>()?;
///         routes.add(Route::get("/", handler(|_| Ok(Response::ok("home")))));
///         Ok(())
///     })
///     .if_service_exists(ServiceId::of::<RouteRegistry>());
/// ```
///
/// The router is compiled from the registry the first time it is resolved.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpExtension;

impl Extension for HttpExtension {
    fn name(&self) -> &str {
        "http"
    }

    fn declare(&self, metadata: &mut ExtensionMetadata) {
        metadata.singleton(
            ServiceId::of::<RouteRegistry>(),
            Declarator::new(|_| Ok(RouteRegistry::default())),
        );

        metadata.singleton(
            ServiceId::of::<Router>(),
            Declarator::new(|args| {
                let routes = args.get::<RouteRegistry>("routes")?;
                Ok(Router::new(routes.snapshot())?)
            })
            .param(Parameter::service::<RouteRegistry>("routes")),
        );

        metadata.singleton(
            ServiceId::of::<UrlGenerator>(),
            Declarator::new(|args| {
                let router = args.get::<Router>("router")?;
                let config = args.get::<AppConfig>("config")?;
                Ok(UrlGenerator::new(&router).with_base_url(config.app.url.clone()))
            })
            .param(Parameter::service::<Router>("router"))
            .param(Parameter::service::<AppConfig>("config")),
        );
    }
}
