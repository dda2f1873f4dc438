//! # Helix
//!
//! A small application core: a service container booted from ordered
//! extensions, and a compiled HTTP router with reverse routing.
//!
//! ```rust,no_run
//! use helix::prelude::*;
//!
//! struct Blog;
//!
//! impl Extension for Blog {
//!     fn name(&self) -> &str {
//!         "blog"
//!     }
//!
//!     fn declare(&self, metadata: &mut ExtensionMetadata) {
//!         metadata
//!             .registration("routes", |container| {
//!                 let routes = container.resolve::<RouteRegistry>()?;
//!                 let home = handler(|_| Ok(Response::ok("home")));
//!                 routes.add(Route::get("/", home).named("home"));
//!                 Ok(())
//!             })
//!             .if_service_exists(ServiceId::of::<RouteRegistry>());
//!     }
//! }
//!
//! let app = Application::builder()
//!     .extension(HttpExtension)
//!     .extension(Blog)
//!     .with_logging()
//!     .build()?;
//! let response = app.kernel()?.handle(Request::get("/"));
//! assert_eq!(response.body(), "home");
//! # Ok::<(), helix::Error>(())
//! ```

pub mod application;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;

pub use application::{Application, ApplicationBuilder};
pub use config::{AppConfig, ConfigLoader, LoggingConfig};
pub use error::{Error, Result};

pub use helix_container as container;
pub use helix_routing as routing;

pub mod prelude {
    pub use crate::application::{Application, ApplicationBuilder};
    pub use crate::config::{AppConfig, ConfigLoader};
    pub use crate::http::{
        Controller, HttpExtension, Kernel, Request, RequestContext, Response, RouteRegistry,
        controller, handler, middleware,
    };
    pub use helix_container::prelude::{
        Arguments, BoxError, Container, Declarator, Definition, Extension, ExtensionMetadata,
        Parameter, ServiceId, Strategy,
    };
    pub use helix_routing::{
        Handler, Method, Route, RouteCollection, RouteGroup, Router, UrlGenerator,
    };
}
