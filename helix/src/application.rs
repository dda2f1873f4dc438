//! Application bootstrap.
//!
//! [`ApplicationBuilder::build`] runs the whole start-up sequence:
//!
//! 1. load the configuration (unless one was given)
//! 2. install logging, if asked to
//! 3. create the container with the standard resolver chain, `Env`
//!    parameters answered from `config.parameters`
//! 4. select the configured extensions and boot them
//! 5. validate the service graph
//! 6. compile the routes, if the HTTP extension was booted
//!
//! Any failure aborts start-up.

use std::sync::Arc;

use tracing::{info, instrument};

use helix_container::prelude::{
    BootRepository, Container, Extension, ResolverChain, ServiceId, ValueResolver,
};
use helix_container::BootReport;
use helix_routing::{Router, UrlGenerator};

use crate::config::{AppConfig, ConfigLoader};
use crate::error::{Error, Result};
use crate::http::Kernel;
use crate::logging::init_logging;

/// A booted application.
pub struct Application {
    config: Arc<AppConfig>,
    container: Arc<Container>,
    report: BootReport,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn boot_report(&self) -> &BootReport {
        &self.report
    }

    /// Resolves the service keyed by `T`.
    ///
    /// # Errors
    /// Any [`ContainerError`](helix_container::ContainerError) of the resolution.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        Ok(self.container.resolve::<T>()?)
    }

    /// The HTTP kernel over the compiled router.
    ///
    /// # Errors
    /// [`ContainerError::ServiceNotFound`](helix_container::ContainerError::ServiceNotFound)
    /// if the HTTP extension was not booted.
    pub fn kernel(&self) -> Result<Kernel> {
        let router = self.container.resolve::<Router>().map_err(Error::from_build)?;
        Ok(Kernel::new(router, self.container.clone()))
    }

    /// The URL generator of the HTTP extension.
    ///
    /// # Errors
    /// See [`Application::kernel`].
    pub fn urls(&self) -> Result<Arc<UrlGenerator>> {
        self.container.resolve::<UrlGenerator>().map_err(Error::from_build)
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.config.app.name)
            .field("extensions", &self.report.extensions)
            .field("container", &self.container)
            .finish()
    }
}

/// Configures and builds an [`Application`].
#[derive(Default)]
pub struct ApplicationBuilder {
    config: Option<AppConfig>,
    loader: Option<ConfigLoader>,
    extensions: Vec<Box<dyn Extension>>,
    resolvers: Vec<Arc<dyn ValueResolver>>,
    logging: bool,
}

impl ApplicationBuilder {
    /// Uses `config` as is instead of loading one.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads the configuration with `loader` instead of the default one.
    pub fn loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Makes an extension known. Which known extensions boot, and in which
    /// order, is decided by `config.extensions`.
    pub fn extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// Adds a value resolver consulted before the standard ones. Resolvers
    /// added later are consulted earlier.
    pub fn resolver(mut self, resolver: impl ValueResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// Installs the global log subscriber during `build`.
    pub fn with_logging(mut self) -> Self {
        self.logging = true;
        self
    }

    /// Runs the start-up sequence.
    ///
    /// # Errors
    /// - [`Error::Config`] / [`Error::InvalidConfig`] for a bad configuration
    /// - [`Error::Logging`] if logging cannot be installed
    /// - [`Error::Boot`] for an unknown extension name or a failed registration
    /// - [`Error::Container`] if the service graph does not validate
    /// - [`Error::Routing`] for a bad route definition
    #[instrument(skip_all, name = "application_build")]
    pub fn build(self) -> Result<Application> {
        let config = match self.config {
            Some(config) => config,
            None => self.loader.unwrap_or_default().load()?,
        };

        if self.logging {
            init_logging(&config.logging)?;
        }

        let standard = ResolverChain::with_env(config.parameters.clone());
        let chain = self
            .resolvers
            .into_iter()
            .fold(standard, ResolverChain::prepend_shared);
        let container = Arc::new(Container::with_resolvers(chain));
        container.set(ServiceId::of::<AppConfig>(), config.clone());

        let repository = BootRepository::from_config(self.extensions, &config.extensions)?;
        let report = repository.boot(&container)?;
        container.validate()?;

        if container.has(&ServiceId::of::<Router>()) {
            container.resolve::<Router>().map_err(Error::from_build)?;
        }

        info!(
            name = %config.app.name,
            env = %config.app.env,
            services = container.len(),
            "Application ready"
        );

        Ok(Application {
            config: Arc::new(config),
            container,
            report,
        })
    }
}
