use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use helix::prelude::*;
use helix::routing::RoutingError;

struct Clock;

struct Connection {
    serial: u32,
}

struct UserController;

impl Controller for UserController {
    fn call(&self, action: &str, context: &RequestContext<'_>) -> Result<Response, BoxError> {
        match action {
            "show" => {
                let id = context.parameter("id").unwrap_or_default();
                Ok(Response::ok(format!("user {id}")))
            }
            "store" => Ok(Response::new(201)),
            other => Err(format!("no action {other}").into()),
        }
    }
}

/// Core services plus the user routes.
struct AppExtension {
    connections: Arc<AtomicU32>,
}

impl Extension for AppExtension {
    fn name(&self) -> &str {
        "app"
    }

    fn declare(&self, metadata: &mut ExtensionMetadata) {
        metadata
            .singleton(ServiceId::of::<Clock>(), Declarator::new(|_| Ok(Clock)))
            .alias("clock");

        let connections = self.connections.clone();
        metadata.factory(
            ServiceId::of::<Connection>(),
            Declarator::new(move |_| {
                Ok(Connection {
                    serial: connections.fetch_add(1, Ordering::SeqCst),
                })
            }),
        );

        metadata.singleton("users", controller(|_| Ok(UserController)));

        metadata
            .registration("routes", |container| {
                let routes = container.resolve::<RouteRegistry>()?;
                let show = Handler::action("users", "show");
                routes.add(Route::get("/users/{id}", show).named("user.show"));
                routes.add(Route::post("/users", Handler::action("users", "store")));
                Ok(())
            })
            .if_service_exists(ServiceId::of::<RouteRegistry>());
    }
}

/// Wiring that only applies when a session store is registered.
struct SessionWiring {
    runs: Arc<AtomicU32>,
}

struct SessionStore;

impl Extension for SessionWiring {
    fn name(&self) -> &str {
        "session"
    }

    fn declare(&self, metadata: &mut ExtensionMetadata) {
        let runs = self.runs.clone();
        metadata
            .registration("middleware", move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .if_service_exists(ServiceId::of::<SessionStore>());
    }
}

fn app(extensions: &[&str]) -> (Application, Arc<AtomicU32>, Arc<AtomicU32>) {
    let connections = Arc::new(AtomicU32::new(0));
    let session_runs = Arc::new(AtomicU32::new(0));
    let config = AppConfig {
        extensions: extensions.iter().map(|e| e.to_string()).collect(),
        ..AppConfig::default()
    };

    let app = Application::builder()
        .config(config)
        .extension(HttpExtension)
        .extension(AppExtension {
            connections: connections.clone(),
        })
        .extension(SessionWiring {
            runs: session_runs.clone(),
        })
        .build()
        .unwrap();
    (app, connections, session_runs)
}

#[test]
fn singleton_is_shared_and_factory_is_fresh() {
    let (app, connections, _) = app(&[]);

    let a = app.get::<Clock>().unwrap();
    let b = app.get::<Clock>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let first = app.get::<Connection>().unwrap();
    let second = app.get::<Connection>().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(first.serial, second.serial);
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[test]
fn alias_resolves_to_the_same_singleton() {
    let (app, _, _) = app(&[]);
    let container = app.container();

    let by_type = container.get(&ServiceId::of::<Clock>()).unwrap();
    let by_alias = container.get(&ServiceId::new("clock")).unwrap();
    assert!(Arc::ptr_eq(&by_type, &by_alias));
}

#[test]
fn routes_match_with_404_and_405() {
    let (app, _, _) = app(&[]);
    let router = app.get::<Router>().unwrap();

    let matched = router.match_route(Method::Get, "/users/42").unwrap();
    let expected = BTreeMap::from([("id".to_string(), "42".to_string())]);
    assert_eq!(matched.parameters(), &expected);
    assert_eq!(matched.name(), Some("user.show"));

    match router.match_route(Method::Delete, "/users/42").unwrap_err() {
        RoutingError::MethodNotAllowed { allowed, .. } => assert_eq!(allowed, vec![Method::Get]),
        other => panic!("Expected MethodNotAllowed, got: {other:?}"),
    }

    assert!(matches!(
        router.match_route(Method::Get, "/unknown").unwrap_err(),
        RoutingError::RouteNotFound { .. }
    ));
}

#[test]
fn kernel_serves_requests() {
    let (app, _, _) = app(&[]);
    let kernel = app.kernel().unwrap();

    let response = kernel.handle(Request::get("/users/42"));
    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), "user 42");

    assert_eq!(kernel.handle(Request::post("/users")).status(), 201);

    let response = kernel.handle(Request::new(Method::Delete, "/users/42"));
    assert_eq!(response.status(), 405);
    assert_eq!(response.header("Allow"), Some("GET"));

    assert_eq!(kernel.handle(Request::get("/unknown")).status(), 404);
}

#[test]
fn generator_round_trip() {
    let (app, _, _) = app(&[]);
    let urls = app.urls().unwrap();

    let id = BTreeMap::from([("id", "42")]);
    assert_eq!(urls.generate("user.show", &id).unwrap(), "/users/42");
    assert_eq!(urls.generate("user.show", &BTreeMap::<&str, &str>::new()).unwrap(), "/users/");
    assert_eq!(urls.generate_absolute("user.show", &id).unwrap(), "http://localhost/users/42");
}

#[test]
fn bad_parameter_name_aborts_boot() {
    struct Broken;

    impl Extension for Broken {
        fn declare(&self, metadata: &mut ExtensionMetadata) {
            metadata
                .registration("routes", |container| {
                    container
                        .resolve::<RouteRegistry>()?
                        .add(Route::get("/{2bad}", Handler::action("users", "show")));
                    Ok(())
                })
                .if_service_exists(ServiceId::of::<RouteRegistry>());
        }
    }

    let err = Application::builder()
        .config(AppConfig::default())
        .extension(HttpExtension)
        .extension(Broken)
        .build()
        .unwrap_err();

    match err {
        helix::Error::Routing(RoutingError::BadRouteDefinition(e)) => {
            assert_eq!(&"/{2bad}"[e.offset..e.offset + 1], "2");
        }
        other => panic!("Expected BadRouteDefinition, got: {other:?}"),
    }
}

#[test]
fn conditional_registration_never_runs_without_prerequisite() {
    let (app, _, session_runs) = app(&[]);
    assert_eq!(session_runs.load(Ordering::SeqCst), 0);
    assert_eq!(app.boot_report().skipped, vec!["session::middleware".to_string()]);
    assert!(app.boot_report().loaded.contains(&"app::routes".to_string()));
}

#[test]
fn routes_are_skipped_without_http_extension() {
    let (app, _, _) = app(&["app", "session"]);
    assert!(app.boot_report().skipped.contains(&"app::routes".to_string()));
    assert!(app.kernel().is_err());
    assert!(app.get::<Clock>().is_ok());
}
