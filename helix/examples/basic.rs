//! Boots an application with a couple of routes and serves a few requests.
//!
//! ```sh
//! HELIX_LOG=debug cargo run -p helix --example basic
//! ```

use std::collections::BTreeMap;

use helix::prelude::*;

struct Greeter {
    greeting: String,
}

struct GreeterController;

impl Controller for GreeterController {
    fn call(&self, action: &str, context: &RequestContext<'_>) -> Result<Response, BoxError> {
        let greeter = context.container().resolve::<Greeter>()?;
        match action {
            "hello" => {
                let name = context.parameter("name").unwrap_or("world");
                Ok(Response::ok(format!("{}, {name}!", greeter.greeting)))
            }
            other => Err(format!("unknown action {other}").into()),
        }
    }
}

struct GreeterExtension;

impl Extension for GreeterExtension {
    fn name(&self) -> &str {
        "greeter"
    }

    fn declare(&self, metadata: &mut ExtensionMetadata) {
        metadata.singleton(
            ServiceId::of::<Greeter>(),
            Declarator::new(|args| {
                Ok(Greeter {
                    greeting: args.value::<String>("greeting")?,
                })
            })
            .param(Parameter::new("greeting").env("greeting").default_value(String::from("Hello"))),
        );
        metadata.singleton("greeter", controller(|_| Ok(GreeterController)));

        metadata
            .registration("routes", |container| {
                let routes = container.resolve::<RouteRegistry>()?;
                let hello = Handler::action("greeter", "hello");
                routes.add(Route::get("/hello/{name:[a-z]+}", hello).named("hello"));
                routes.add(Route::get("/health", handler(|_| Ok(Response::ok("ok")))));
                Ok(())
            })
            .if_service_exists(ServiceId::of::<RouteRegistry>());
    }
}

fn main() -> Result<(), helix::Error> {
    let mut config = AppConfig::default();
    config.parameters.insert("greeting".into(), "Salaam".into());

    let app = Application::builder()
        .config(config)
        .extension(HttpExtension)
        .extension(GreeterExtension)
        .with_logging()
        .build()?;

    let kernel = app.kernel()?;
    for request in [
        Request::get("/hello/amal"),
        Request::get("/hello/42"),
        Request::get("/health"),
        Request::post("/health"),
    ] {
        let target = request.target().to_string();
        let response = kernel.handle(request);
        println!("{target} -> {} {}", response.status(), response.body());
    }

    let urls = app.urls()?;
    println!("{}", urls.generate_absolute("hello", &BTreeMap::from([("name", "sara")]))?);
    Ok(())
}
