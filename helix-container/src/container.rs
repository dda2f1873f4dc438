//! # The Container
//!
//! Resolves service ids to instances, building them through their
//! [`Definition`]s and caching them according to their [`Strategy`].
//!
//! # Architecture
//! ```text
//! define()/alias()  ──>  Registry (RwLock)
//!                            │
//!        get(id) ──> canonical id ──> resolver chain ──> declarator
//!                            │
//!             Singleton: DashMap<id, OnceCell<Instance>>
//!         WeakSingleton: DashMap<id, Mutex<Option<Weak<_>>>>
//!               Factory: no cache
//! ```
//!
//! The container is `Send + Sync`. Definitions change during boot only;
//! after that concurrent `get` calls race safely: each singleton is built
//! by exactly one caller while the others wait for it.
//!
//! # Examples
//! ```rust
//! use helix_container::prelude::*;
//! use std::sync::Arc;
//!
//! struct Config { dsn: String }
//! struct Database { dsn: String }
//!
//! let container = Container::new();
//! container.set(ServiceId::of::<Config>(), Config { dsn: "sqlite::memory:".into() });
//! container
//!     .define(
//!         ServiceId::of::<Database>(),
//!         Definition::singleton(
//!             Declarator::new(|args| {
//!                 let config = args.get::<Config>("config")?;
//!                 Ok(Database { dsn: config.dsn.clone() })
//!             })
//!             .param(Parameter::service::<Config>("config")),
//!         ),
//!     )
//!     .alias("db")
//!     .expect("target exists");
//!
//! let db: Arc<Database> = container.resolve().expect("resolvable");
//! let same = container.get_as::<Database>(&ServiceId::new("db")).expect("alias");
//! assert!(Arc::ptr_eq(&db, &same));
//! ```

use std::any::{Any, type_name};
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, trace};

use crate::definition::{Arguments, Declarator, Definition, Instance};
use crate::error::{BoxError, CircularDependencyError, ContainerError, Result};
use crate::graph::GraphValidator;
use crate::id::ServiceId;
use crate::registry::Registry;
use crate::resolver::{ResolutionContext, ResolverChain};
use crate::strategy::Strategy;

type WeakSlot = Arc<Mutex<Option<Weak<dyn Any + Send + Sync>>>>;

/// Thread-safe dependency injection container.
pub struct Container {
    registry: RwLock<Registry>,
    singletons: DashMap<ServiceId, Arc<OnceCell<Instance>>>,
    weak_singletons: DashMap<ServiceId, WeakSlot>,
    resolvers: RwLock<Arc<ResolverChain>>,
}

impl Container {
    /// A container using the standard resolver chain.
    pub fn new() -> Self {
        Self::with_resolvers(ResolverChain::standard())
    }

    /// A container using `resolvers` for every `get`.
    pub fn with_resolvers(resolvers: ResolverChain) -> Self {
        Self {
            registry: RwLock::new(Registry::new()),
            singletons: DashMap::new(),
            weak_singletons: DashMap::new(),
            resolvers: RwLock::new(Arc::new(resolvers)),
        }
    }

    /// Replaces the default resolver chain.
    pub fn set_resolvers(&self, resolvers: ResolverChain) {
        *self.resolvers.write() = Arc::new(resolvers);
    }

    pub fn resolvers(&self) -> Arc<ResolverChain> {
        self.resolvers.read().clone()
    }

    // ── Registration ──

    /// Registers or overwrites the definition for `id`.
    ///
    /// The last definition for an id wins; any instance cached for the
    /// previous definition is dropped.
    pub fn define(&self, id: impl Into<ServiceId>, definition: Definition) -> DefinitionHandle<'_> {
        let id = id.into();
        let replaced = self.registry.write().define(id.clone(), definition);
        if replaced {
            debug!(id = %id, "Replaced earlier definition");
        }
        self.forget(&id);
        DefinitionHandle { container: self, id }
    }

    /// Registers a pre-built value as a singleton.
    pub fn set<T: Send + Sync + 'static>(
        &self,
        id: impl Into<ServiceId>,
        value: T,
    ) -> DefinitionHandle<'_> {
        self.define(id, Definition::instance(value))
    }

    /// Registers a parameterless singleton keyed by `T`.
    pub fn singleton<T, F>(&self, build: F) -> DefinitionHandle<'_>
    where
        T: Send + Sync + 'static,
        F: Fn(&Arguments) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        self.define(ServiceId::of::<T>(), Definition::singleton(Declarator::new(build)))
    }

    /// Registers a parameterless weak singleton keyed by `T`.
    pub fn weak_singleton<T, F>(&self, build: F) -> DefinitionHandle<'_>
    where
        T: Send + Sync + 'static,
        F: Fn(&Arguments) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        self.define(ServiceId::of::<T>(), Definition::weak_singleton(Declarator::new(build)))
    }

    /// Registers a parameterless factory keyed by `T`.
    pub fn factory<T, F>(&self, build: F) -> DefinitionHandle<'_>
    where
        T: Send + Sync + 'static,
        F: Fn(&Arguments) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        self.define(ServiceId::of::<T>(), Definition::factory(Declarator::new(build)))
    }

    /// Makes `alias` resolve to the same definition as `id`.
    ///
    /// # Errors
    /// [`ContainerError::ServiceNotFound`] if `id` does not resolve yet.
    pub fn alias(&self, id: impl Into<ServiceId>, alias: impl Into<ServiceId>) -> Result<()> {
        let alias = alias.into();
        if self.registry.write().alias(&id.into(), alias.clone())? {
            self.forget(&alias);
        }
        Ok(())
    }

    // ── Lookup ──

    /// Returns `true` if `id` resolves to a definition. No side effects.
    pub fn has(&self, id: &ServiceId) -> bool {
        self.registry.read().canonical(id).is_some()
    }

    /// Resolves `id` through the default resolver chain.
    pub fn get(&self, id: &ServiceId) -> Result<Instance> {
        let chain = self.resolvers();
        let mut context = ResolutionContext::new(self, chain);
        self.resolve_in(id, &mut context)
    }

    /// Resolves `id`, resolving parameters through `resolvers` instead of the
    /// default chain.
    pub fn get_with(&self, id: &ServiceId, resolvers: &ResolverChain) -> Result<Instance> {
        let mut context = ResolutionContext::new(self, Arc::new(resolvers.clone()));
        self.resolve_in(id, &mut context)
    }

    /// Resolves `id` and downcasts the instance to `T`.
    pub fn get_as<T: Send + Sync + 'static>(&self, id: &ServiceId) -> Result<Arc<T>> {
        downcast(id, self.get(id)?)
    }

    /// Resolves the service keyed by the type `T`.
    ///
    /// ```rust,ignore
    /// let router: Arc<Router> = container.resolve()?;
    /// ```
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get_as(&ServiceId::of::<T>())
    }

    /// Drops the cached instance of `id`, if any; the next `get` rebuilds it.
    ///
    /// Returns `true` if something was cached.
    pub fn release(&self, id: &ServiceId) -> bool {
        let Some(canonical) = self.registry.read().canonical(id) else {
            return false;
        };
        let released = self.forget(&canonical);
        if released {
            debug!(id = %canonical, "Released cached instance");
        }
        released
    }

    /// Number of definitions (aliases excluded).
    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every id that resolves, aliases included.
    pub fn ids(&self) -> Vec<ServiceId> {
        self.registry.read().ids()
    }

    /// Validates the declared parameter graph without building anything.
    ///
    /// # Errors
    /// - [`ContainerError::ServiceNotFound`]: a required dependency is missing
    /// - [`ContainerError::CircularDependency`]: declarations form a cycle
    #[instrument(skip(self), name = "container_validate")]
    pub fn validate(&self) -> Result<()> {
        let registry = self.registry.read();
        info!(definitions = registry.len(), "Validating container");
        GraphValidator::new(&registry).validate()
    }

    // ── Internal ──

    /// Resolves `id` as part of the resolution tracked by `context`.
    pub(crate) fn resolve_in(
        &self,
        id: &ServiceId,
        context: &mut ResolutionContext<'_>,
    ) -> Result<Instance> {
        let (canonical, definition) = {
            let registry = self.registry.read();
            let canonical = registry
                .canonical(id)
                .ok_or_else(|| registry.not_found(id, context.consumer().cloned()))?;
            let definition = registry
                .get(&canonical)
                .cloned()
                .ok_or_else(|| registry.not_found(id, context.consumer().cloned()))?;
            (canonical, definition)
        };

        if let Some(start) = context.path().iter().position(|p| p == &canonical) {
            let mut chain = context.path()[start..].to_vec();
            chain.push(canonical);
            return Err(ContainerError::CircularDependency(CircularDependencyError { chain }));
        }

        match definition.strategy() {
            Strategy::Singleton => {
                let cell = self
                    .singletons
                    .entry(canonical.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new()))
                    .clone();
                if let Some(instance) = cell.get() {
                    trace!(id = %canonical, "Singleton cache hit");
                    return Ok(instance.clone());
                }
                cell.get_or_try_init(|| self.build(&canonical, &definition, context))
                    .cloned()
            }
            Strategy::WeakSingleton => {
                let slot = self
                    .weak_singletons
                    .entry(canonical.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(None)))
                    .clone();
                let mut cached = slot.lock();
                if let Some(instance) = cached.as_ref().and_then(Weak::upgrade) {
                    trace!(id = %canonical, "Weak singleton still alive");
                    return Ok(instance);
                }
                let instance = self.build(&canonical, &definition, context)?;
                *cached = Some(Arc::downgrade(&instance));
                Ok(instance)
            }
            Strategy::Factory => self.build(&canonical, &definition, context),
        }
    }

    fn build(
        &self,
        id: &ServiceId,
        definition: &Definition,
        context: &mut ResolutionContext<'_>,
    ) -> Result<Instance> {
        trace!(id = %id, strategy = %definition.strategy(), "Building service");
        context.push(id.clone());
        let values = context.arguments(id, definition.declarator().parameters());
        context.pop();

        let arguments = Arguments::new(id.clone(), values?);
        definition
            .declarator()
            .invoke(&arguments)
            .map_err(|source| ContainerError::InitializationFailure {
                id: id.clone(),
                source,
            })
    }

    fn forget(&self, id: &ServiceId) -> bool {
        let singleton = self
            .singletons
            .remove(id)
            .is_some_and(|(_, cell)| cell.get().is_some());
        let weak = self
            .weak_singletons
            .remove(id)
            .is_some_and(|(_, slot)| {
                let cached = slot.lock();
                cached.as_ref().is_some_and(|w| w.strong_count() > 0)
            });
        singleton || weak
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("Container")
            .field("definitions", &registry.len())
            .field("aliases", &registry.alias_count())
            .field("singletons", &self.singletons.len())
            .finish()
    }
}

/// Returned by [`Container::define`] to chain alias registration.
#[derive(Debug)]
pub struct DefinitionHandle<'c> {
    container: &'c Container,
    id: ServiceId,
}

impl<'c> DefinitionHandle<'c> {
    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    /// Adds an alias for the defined service.
    pub fn alias(self, alias: impl Into<ServiceId>) -> Result<Self> {
        self.container.alias(self.id.clone(), alias)?;
        Ok(self)
    }
}

fn downcast<T: Send + Sync + 'static>(id: &ServiceId, instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| ContainerError::ArgumentMismatch {
            subject: format!("service {id}"),
            expected: type_name::<T>(),
        })
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, DefinitionHandle};
    pub use crate::boot::BootRepository;
    pub use crate::definition::{Arguments, Attribute, Declarator, Definition, Instance, Parameter};
    pub use crate::error::{BootError, BoxError, ContainerError, Result};
    pub use crate::extension::{Extension, ExtensionMetadata, MetadataReader};
    pub use crate::id::ServiceId;
    pub use crate::resolver::{ResolverChain, ValueResolver};
    pub use crate::strategy::Strategy;
}
