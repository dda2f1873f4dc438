//! Static validation of the declared service graph.
//!
//! Walks the declared parameters of every definition (nothing is built):
//! - every required dependency must resolve
//! - declarations must not form a cycle
//!
//! A singleton capturing a factory-strategy dependency is legal but keeps a
//! single instance of something meant to be fresh, so it is only warned about.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::error::{CircularDependencyError, ContainerError};
use crate::id::ServiceId;
use crate::registry::Registry;
use crate::strategy::Strategy;

/// Depth-first walk over the definitions of a registry.
///
/// Maintains the current path to detect and report cycles.
pub(crate) struct GraphValidator<'r> {
    registry: &'r Registry,
    /// Currently being visited (for cycle detection)
    visiting: HashSet<ServiceId>,
    /// Already validated
    validated: HashSet<ServiceId>,
    /// Current DFS path (for error reporting)
    path: Vec<ServiceId>,
}

impl<'r> GraphValidator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Validates every definition of the registry.
    ///
    /// Ids are visited in sorted order so that the reported error does not
    /// depend on hash order.
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<(), ContainerError> {
        let mut ids: Vec<ServiceId> = self.registry.definitions().keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        debug!(definition_count = ids.len(), "Starting service graph validation");

        for id in ids {
            self.validate_id(&id)?;
        }

        debug!("Service graph validation passed");
        Ok(())
    }

    fn validate_id(&mut self, canonical: &ServiceId) -> Result<(), ContainerError> {
        if self.validated.contains(canonical) {
            return Ok(());
        }

        if self.visiting.contains(canonical) {
            let start = self.path.iter().position(|p| p == canonical).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(canonical.clone());

            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(ContainerError::CircularDependency(CircularDependencyError { chain }));
        }

        let Some(definition) = self.registry.get(canonical) else {
            return Err(self.registry.not_found(canonical, self.path.last().cloned()));
        };
        let consumer_strategy = definition.strategy();
        let dependencies: Vec<ServiceId> = definition
            .declarator()
            .parameters()
            .iter()
            .filter_map(|p| p.required_service().cloned())
            .collect();

        self.visiting.insert(canonical.clone());
        self.path.push(canonical.clone());

        for dependency in &dependencies {
            let target = self
                .registry
                .canonical(dependency)
                .ok_or_else(|| self.registry.not_found(dependency, Some(canonical.clone())))?;

            if let Some(target_definition) = self.registry.get(&target) {
                check_captive(canonical, consumer_strategy, &target, target_definition.strategy());
            }

            self.validate_id(&target)?;
        }

        self.path.pop();
        self.visiting.remove(canonical);
        self.validated.insert(canonical.clone());

        Ok(())
    }
}

fn check_captive(
    consumer: &ServiceId,
    consumer_strategy: Strategy,
    dependency: &ServiceId,
    dependency_strategy: Strategy,
) {
    if consumer_strategy == Strategy::Singleton && dependency_strategy == Strategy::Factory {
        warn!(
            consumer = %consumer,
            dependency = %dependency,
            "Singleton captures a factory-built dependency; it will never be rebuilt"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Declarator, Definition, Parameter};

    fn depends_on(strategy: Strategy, deps: &[&'static str]) -> Definition {
        let declarator = deps.iter().fold(Declarator::new(|_| Ok(())), |d, dep| {
            d.param(Parameter::new(*dep).inject(*dep))
        });
        Definition::new(strategy, declarator)
    }

    fn registry(entries: Vec<(&'static str, Strategy, Vec<&'static str>)>) -> Registry {
        let mut registry = Registry::new();
        for (id, strategy, deps) in entries {
            registry.define(ServiceId::new(id), depends_on(strategy, &deps));
        }
        registry
    }

    #[test]
    fn valid_simple_graph() {
        let reg = registry(vec![
            ("database", Strategy::Singleton, vec![]),
            ("users", Strategy::Singleton, vec!["database"]),
            ("controller", Strategy::Factory, vec!["users"]),
        ]);
        assert!(GraphValidator::new(&reg).validate().is_ok());
    }

    #[test]
    fn detect_circular_dependency() {
        let reg = registry(vec![
            ("a", Strategy::Factory, vec!["b"]),
            ("b", Strategy::Factory, vec!["c"]),
            ("c", Strategy::Factory, vec!["a"]),
        ]);

        match GraphValidator::new(&reg).validate().unwrap_err() {
            ContainerError::CircularDependency(err) => {
                let chain: Vec<&str> = err.chain.iter().map(ServiceId::as_str).collect();
                assert_eq!(chain, vec!["a", "b", "c", "a"]);
            }
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }

    #[test]
    fn detect_self_dependency() {
        let reg = registry(vec![("a", Strategy::Factory, vec!["a"])]);
        assert!(GraphValidator::new(&reg).validate().is_err());
    }

    #[test]
    fn detect_missing_dependency() {
        let reg = registry(vec![("a", Strategy::Factory, vec!["b"])]);

        match GraphValidator::new(&reg).validate().unwrap_err() {
            ContainerError::ServiceNotFound(err) => {
                assert_eq!(err.requested.as_str(), "b");
                assert_eq!(err.required_by, Some(ServiceId::new("a")));
            }
            other => panic!("Expected ServiceNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn dependencies_through_aliases() {
        let mut reg = registry(vec![
            ("db.pdo", Strategy::Singleton, vec![]),
            ("users", Strategy::Singleton, vec!["db"]),
        ]);
        reg.alias(&ServiceId::new("db.pdo"), ServiceId::new("db")).unwrap();
        assert!(GraphValidator::new(&reg).validate().is_ok());
    }

    #[test]
    fn optional_missing_dependency_is_fine() {
        let mut reg = Registry::new();
        reg.define(
            ServiceId::new("report"),
            Definition::factory(
                Declarator::new(|_| Ok(()))
                    .param(Parameter::new("cache").inject("cache").optional()),
            ),
        );
        assert!(GraphValidator::new(&reg).validate().is_ok());
    }

    #[test]
    fn singleton_over_factory_only_warns() {
        let reg = registry(vec![
            ("clock", Strategy::Factory, vec![]),
            ("scheduler", Strategy::Singleton, vec!["clock"]),
        ]);
        assert!(GraphValidator::new(&reg).validate().is_ok());
    }

    #[test]
    fn diamond_dependency_ok() {
        let reg = registry(vec![
            ("d", Strategy::Singleton, vec![]),
            ("b", Strategy::Singleton, vec!["d"]),
            ("c", Strategy::Singleton, vec!["d"]),
            ("a", Strategy::Singleton, vec!["b", "c"]),
        ]);
        assert!(GraphValidator::new(&reg).validate().is_ok());
    }
}
