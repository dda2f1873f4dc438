//! Value resolvers.
//!
//! Before a declarator runs, each of its [`Parameter`]s is offered to a
//! chain of [`ValueResolver`]s. The first resolver that answers decides the
//! argument. The standard chain is:
//!
//! 1. [`AttributeResolver`]: `Inject(id)` attributes
//! 2. [`EnvResolver`]: `Env(key)` attributes, from configured parameters
//! 3. [`ServiceResolver`]: the declared service type
//! 4. [`DefaultValueResolver`]: default values and optional parameters

use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::container::Container;
use crate::definition::{Attribute, Instance, Parameter};
use crate::error::{ContainerError, Result, UnresolvableParameterError};
use crate::id::ServiceId;

/// Outcome of a resolver that accepted a parameter.
#[derive(Clone)]
pub enum Resolved {
    Value(Instance),
    /// The parameter is intentionally left empty.
    Absent,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Value(_) => f.write_str("Resolved::Value(..)"),
            Resolved::Absent => f.write_str("Resolved::Absent"),
        }
    }
}

/// A strategy that may supply the value of a declared parameter.
///
/// Return `Ok(None)` to let the next resolver in the chain try.
pub trait ValueResolver: Send + Sync {
    fn resolve(
        &self,
        parameter: &Parameter,
        context: &mut ResolutionContext<'_>,
    ) -> Result<Option<Resolved>>;

    /// Human-readable name for tracing.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// State carried through one (possibly nested) resolution.
///
/// Holds the ids currently being built so that re-entering one of them is
/// reported as a cycle.
pub struct ResolutionContext<'a> {
    container: &'a Container,
    chain: Arc<ResolverChain>,
    path: Vec<ServiceId>,
}

impl<'a> ResolutionContext<'a> {
    pub(crate) fn new(container: &'a Container, chain: Arc<ResolverChain>) -> Self {
        Self {
            container,
            chain,
            path: Vec::new(),
        }
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    /// The service whose parameters are being resolved, if any.
    pub fn consumer(&self) -> Option<&ServiceId> {
        self.path.last()
    }

    /// Ids currently under construction, outermost first.
    pub fn path(&self) -> &[ServiceId] {
        &self.path
    }

    pub fn has(&self, id: &ServiceId) -> bool {
        self.container.has(id)
    }

    /// Resolves a nested service within this resolution.
    pub fn service(&mut self, id: &ServiceId) -> Result<Instance> {
        let container = self.container;
        container.resolve_in(id, self)
    }

    pub(crate) fn push(&mut self, id: ServiceId) {
        self.path.push(id);
    }

    pub(crate) fn pop(&mut self) {
        self.path.pop();
    }

    /// Runs the resolver chain for every parameter of `service`.
    pub(crate) fn arguments(
        &mut self,
        service: &ServiceId,
        parameters: &[Parameter],
    ) -> Result<Vec<(String, Option<Instance>)>> {
        let chain = self.chain.clone();
        parameters
            .iter()
            .map(|parameter| {
                let resolved = chain.resolve(parameter, self)?.ok_or_else(|| {
                    ContainerError::UnresolvableParameter(UnresolvableParameterError {
                        service: service.clone(),
                        parameter: parameter.name().to_string(),
                    })
                })?;
                let value = match resolved {
                    Resolved::Value(instance) => Some(instance),
                    Resolved::Absent => None,
                };
                Ok((parameter.name().to_string(), value))
            })
            .collect()
    }
}

impl fmt::Debug for ResolutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// An ordered list of value resolvers.
#[derive(Clone, Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn ValueResolver>>,
}

impl ResolverChain {
    /// A chain without any resolvers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard chain with no configured `Env` values.
    pub fn standard() -> Self {
        Self::with_env(BTreeMap::new())
    }

    /// The standard chain, answering `Env` attributes from `values`.
    pub fn with_env(values: BTreeMap<String, String>) -> Self {
        Self::empty()
            .push(AttributeResolver)
            .push(EnvResolver::new(values))
            .push(ServiceResolver)
            .push(DefaultValueResolver)
    }

    /// Appends a resolver at the end.
    pub fn push(mut self, resolver: impl ValueResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// Inserts a resolver in front so it is consulted first.
    pub fn prepend(mut self, resolver: impl ValueResolver + 'static) -> Self {
        self.resolvers.insert(0, Arc::new(resolver));
        self
    }

    /// Like [`ResolverChain::prepend`], for a resolver that is already shared.
    pub fn prepend_shared(mut self, resolver: Arc<dyn ValueResolver>) -> Self {
        self.resolvers.insert(0, resolver);
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    fn resolve(
        &self,
        parameter: &Parameter,
        context: &mut ResolutionContext<'_>,
    ) -> Result<Option<Resolved>> {
        for resolver in &self.resolvers {
            if let Some(resolved) = resolver.resolve(parameter, context)? {
                trace!(
                    parameter = parameter.name(),
                    resolver = resolver.name(),
                    "Parameter resolved"
                );
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.resolvers.iter().map(|r| r.name()))
            .finish()
    }
}

/// Resolves `Inject(id)` attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttributeResolver;

impl ValueResolver for AttributeResolver {
    fn resolve(
        &self,
        parameter: &Parameter,
        context: &mut ResolutionContext<'_>,
    ) -> Result<Option<Resolved>> {
        let Some(Attribute::Inject(id)) = parameter.attribute() else {
            return Ok(None);
        };
        resolve_service(id, parameter, context)
    }
}

/// Resolves `Env(key)` attributes from configured string parameters.
#[derive(Debug, Default, Clone)]
pub struct EnvResolver {
    values: BTreeMap<String, String>,
}

impl EnvResolver {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }
}

impl ValueResolver for EnvResolver {
    fn resolve(
        &self,
        parameter: &Parameter,
        _context: &mut ResolutionContext<'_>,
    ) -> Result<Option<Resolved>> {
        let Some(Attribute::Env(key)) = parameter.attribute() else {
            return Ok(None);
        };
        Ok(self
            .values
            .get(key)
            .map(|value| Resolved::Value(Arc::new(value.clone()))))
    }
}

/// Resolves parameters by their declared service type.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceResolver;

impl ValueResolver for ServiceResolver {
    fn resolve(
        &self,
        parameter: &Parameter,
        context: &mut ResolutionContext<'_>,
    ) -> Result<Option<Resolved>> {
        if parameter.attribute().is_some() {
            return Ok(None);
        }
        match parameter.service_id() {
            Some(id) => resolve_service(id, parameter, context),
            None => Ok(None),
        }
    }
}

/// Falls back to the default value, or to absent for optional parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValueResolver;

impl ValueResolver for DefaultValueResolver {
    fn resolve(
        &self,
        parameter: &Parameter,
        _context: &mut ResolutionContext<'_>,
    ) -> Result<Option<Resolved>> {
        if let Some(default) = parameter.default() {
            return Ok(Some(Resolved::Value(default.clone())));
        }
        Ok(parameter.is_optional().then_some(Resolved::Absent))
    }
}

/// Unregistered services fall through when a default or `optional` can
/// still fill the parameter; otherwise the lookup error surfaces.
fn resolve_service(
    id: &ServiceId,
    parameter: &Parameter,
    context: &mut ResolutionContext<'_>,
) -> Result<Option<Resolved>> {
    if !context.has(id) && (parameter.default().is_some() || parameter.is_optional()) {
        return Ok(None);
    }
    context.service(id).map(|instance| Some(Resolved::Value(instance)))
}
