//! HTTP routing for Helix.
//!
//! Routes are declared in a [`RouteCollection`], compiled once into an
//! immutable prefix tree and shared by a [`Router`] (matching) and a
//! [`UrlGenerator`] (reverse routing). Matching never coerces parameter
//! values: they come out as the raw strings found in the path.

pub mod compiler;
pub mod error;
pub mod generator;
pub mod method;
pub mod path;
pub mod route;
pub mod router;

pub use compiler::{CompiledRouteTable, RouteCompiler};
pub use error::{Result, RoutingError};
pub use generator::UrlGenerator;
pub use method::Method;
pub use route::{Handler, Middleware, Route, RouteCollection, RouteGroup};
pub use router::{MatchedRoute, RequestLike, RouteMatch, Router};
