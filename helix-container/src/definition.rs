//! Service definitions.
//!
//! A [`Definition`] pairs a [`Strategy`] with a [`Declarator`]: the closure
//! that builds the service plus the [`Parameter`]s it needs. Parameters are
//! declared up front so the container can supply them through its value
//! resolvers and validate the graph before anything is built.
//!
//! # Examples
//! ```rust
//! use helix_container::definition::{Declarator, Definition, Parameter};
//! use helix_container::strategy::Strategy;
//!
//! struct Config { dsn: String }
//! struct Database { dsn: String }
//!
//! let definition = Definition::singleton(
//!     Declarator::new(|args| {
//!         let config = args.get::<Config>("config")?;
//!         Ok(Database { dsn: config.dsn.clone() })
//!     })
//!     .param(Parameter::service::<Config>("config")),
//! );
//!
//! assert_eq!(definition.strategy(), Strategy::Singleton);
//! assert_eq!(definition.declarator().parameters().len(), 1);
//! ```

use std::any::{Any, type_name};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, ContainerError, Result, UnresolvableParameterError};
use crate::id::ServiceId;
use crate::strategy::Strategy;

/// A built service, type-erased.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// The closure behind a [`Declarator`].
pub type DeclaratorFn =
    Arc<dyn Fn(&Arguments) -> std::result::Result<Instance, BoxError> + Send + Sync>;

/// Metadata attached to a parameter that steers value resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// Inject the service with this id, whatever the declared type.
    Inject(ServiceId),
    /// Inject the configured string parameter with this key.
    Env(String),
}

/// A declared declarator parameter.
#[derive(Clone)]
pub struct Parameter {
    name: Cow<'static, str>,
    service: Option<ServiceId>,
    attribute: Option<Attribute>,
    default: Option<Instance>,
    optional: bool,
}

impl Parameter {
    /// An untyped parameter. Only attributes or a default can fill it.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            service: None,
            attribute: None,
            default: None,
            optional: false,
        }
    }

    /// A parameter declared with type `T`, filled by the service `T`.
    pub fn service<T: ?Sized + 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            service: Some(ServiceId::of::<T>()),
            ..Self::new(name)
        }
    }

    /// Fill this parameter from the service with the given id.
    pub fn inject(mut self, id: impl Into<ServiceId>) -> Self {
        self.attribute = Some(Attribute::Inject(id.into()));
        self
    }

    /// Fill this parameter from the configured string `key`.
    pub fn env(mut self, key: impl Into<String>) -> Self {
        self.attribute = Some(Attribute::Env(key.into()));
        self
    }

    /// Value used when nothing else resolves the parameter.
    pub fn default_value<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.default = Some(Arc::new(value));
        self
    }

    /// Resolve to "absent" instead of failing when nothing supplies a value.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The service id of the declared type, if any.
    pub fn service_id(&self) -> Option<&ServiceId> {
        self.service.as_ref()
    }

    pub fn attribute(&self) -> Option<&Attribute> {
        self.attribute.as_ref()
    }

    pub fn default(&self) -> Option<&Instance> {
        self.default.as_ref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// The service this parameter must be wired to, if it is required.
    ///
    /// `None` for optional or defaulted parameters and for `Env` ones.
    pub fn required_service(&self) -> Option<&ServiceId> {
        if self.optional || self.default.is_some() {
            return None;
        }
        match &self.attribute {
            Some(Attribute::Inject(id)) => Some(id),
            Some(Attribute::Env(_)) => None,
            None => self.service.as_ref(),
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("service", &self.service)
            .field("attribute", &self.attribute)
            .field("has_default", &self.default.is_some())
            .field("optional", &self.optional)
            .finish()
    }
}

/// Builds a service from resolved [`Arguments`].
#[derive(Clone)]
pub struct Declarator {
    parameters: Vec<Parameter>,
    build: DeclaratorFn,
}

impl Declarator {
    /// Wraps a closure producing `T`.
    pub fn new<T, F>(build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Arguments) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            parameters: Vec::new(),
            build: Arc::new(move |args: &Arguments| {
                build(args).map(|value| Arc::new(value) as Instance)
            }),
        }
    }

    /// Wraps a closure that already returns a type-erased instance.
    pub fn from_fn(build: DeclaratorFn) -> Self {
        Self {
            parameters: Vec::new(),
            build,
        }
    }

    /// A declarator that always hands out the same pre-built instance.
    pub fn from_instance(instance: Instance) -> Self {
        Self::from_fn(Arc::new(move |_: &Arguments| Ok(instance.clone())))
    }

    /// Declares the next parameter.
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn invoke(&self, args: &Arguments) -> std::result::Result<Instance, BoxError> {
        (self.build)(args)
    }
}

impl fmt::Debug for Declarator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declarator")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// A construction strategy bound to a declarator.
#[derive(Debug, Clone)]
pub struct Definition {
    strategy: Strategy,
    declarator: Declarator,
}

impl Definition {
    pub fn new(strategy: Strategy, declarator: Declarator) -> Self {
        Self { strategy, declarator }
    }

    pub fn singleton(declarator: Declarator) -> Self {
        Self::new(Strategy::Singleton, declarator)
    }

    pub fn weak_singleton(declarator: Declarator) -> Self {
        Self::new(Strategy::WeakSingleton, declarator)
    }

    pub fn factory(declarator: Declarator) -> Self {
        Self::new(Strategy::Factory, declarator)
    }

    /// A singleton holding an already built value.
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        Self::singleton(Declarator::from_instance(Arc::new(value)))
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn declarator(&self) -> &Declarator {
        &self.declarator
    }
}

/// Values resolved for a declarator's parameters, in declaration order.
#[derive(Debug)]
pub struct Arguments {
    service: ServiceId,
    values: Vec<(String, Option<Instance>)>,
}

impl Arguments {
    pub(crate) fn new(service: ServiceId, values: Vec<(String, Option<Instance>)>) -> Self {
        Self { service, values }
    }

    /// An argument list with no values, for invoking declarators directly.
    pub fn empty(service: ServiceId) -> Self {
        Self::new(service, Vec::new())
    }

    /// The service being built.
    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the argument `name` as `Arc<T>`.
    ///
    /// # Errors
    /// [`ContainerError::UnresolvableParameter`] when the argument is absent,
    /// [`ContainerError::ArgumentMismatch`] when it holds another type.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.get_optional(name)?.ok_or_else(|| {
            ContainerError::UnresolvableParameter(UnresolvableParameterError {
                service: self.service.clone(),
                parameter: name.to_string(),
            })
        })
    }

    /// Like [`get`](Self::get) but `Ok(None)` for an absent optional argument.
    pub fn get_optional<T: Send + Sync + 'static>(&self, name: &str) -> Result<Option<Arc<T>>> {
        let Some((_, slot)) = self.values.iter().find(|(n, _)| n == name) else {
            return Err(ContainerError::UnresolvableParameter(UnresolvableParameterError {
                service: self.service.clone(),
                parameter: name.to_string(),
            }));
        };

        match slot {
            None => Ok(None),
            Some(instance) => instance
                .clone()
                .downcast::<T>()
                .map(Some)
                .map_err(|_| ContainerError::ArgumentMismatch {
                    subject: format!("parameter `{name}` of {}", self.service),
                    expected: type_name::<T>(),
                }),
        }
    }

    /// Clones the argument `name` out of its `Arc`.
    pub fn value<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T> {
        self.get::<T>(name).map(|value| (*value).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Config;

    #[test]
    fn parameter_service_uses_type_id() {
        let p = Parameter::service::<Config>("config");
        assert_eq!(p.service_id(), Some(&ServiceId::of::<Config>()));
        assert_eq!(p.required_service(), Some(&ServiceId::of::<Config>()));
    }

    #[test]
    fn inject_attribute_overrides_declared_type() {
        let p = Parameter::service::<Config>("config").inject("config.cached");
        assert_eq!(p.required_service(), Some(&ServiceId::new("config.cached")));
    }

    #[test]
    fn defaulted_and_optional_are_not_required() {
        assert!(Parameter::service::<Config>("c").default_value(1u8).required_service().is_none());
        assert!(Parameter::service::<Config>("c").optional().required_service().is_none());
        assert!(Parameter::new("key").env("APP_KEY").required_service().is_none());
    }

    #[test]
    fn arguments_typed_access() {
        let args = Arguments::new(
            ServiceId::new("svc"),
            vec![
                ("port".to_string(), Some(Arc::new(8080u16) as Instance)),
                ("name".to_string(), Some(Arc::new(String::from("helix")) as Instance)),
                ("cache".to_string(), None),
            ],
        );

        assert_eq!(*args.get::<u16>("port").unwrap(), 8080);
        assert_eq!(args.value::<String>("name").unwrap(), "helix");
        assert!(args.get_optional::<u32>("cache").unwrap().is_none());
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn arguments_type_mismatch() {
        let args = Arguments::new(
            ServiceId::new("svc"),
            vec![("port".to_string(), Some(Arc::new(8080u16) as Instance))],
        );

        match args.get::<String>("port").unwrap_err() {
            ContainerError::ArgumentMismatch { subject, .. } => assert!(subject.contains("port")),
            other => panic!("Expected ArgumentMismatch, got: {other:?}"),
        }
    }

    #[test]
    fn arguments_unknown_name() {
        let args = Arguments::empty(ServiceId::new("svc"));
        assert!(matches!(
            args.get::<u8>("missing"),
            Err(ContainerError::UnresolvableParameter(_))
        ));
    }

    #[test]
    fn instance_definition_returns_same_arc() {
        let definition = Definition::instance(String::from("x"));
        let args = Arguments::empty(ServiceId::new("x"));
        let a = definition.declarator().invoke(&args).unwrap();
        let b = definition.declarator().invoke(&args).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
