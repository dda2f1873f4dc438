//! Definition registry: the id → definition table behind the container.
//!
//! Aliases are kept apart from definitions and followed on lookup, so an
//! alias keeps pointing at its target even if the target is redefined.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::definition::Definition;
use crate::error::{ContainerError, ServiceNotFoundError};
use crate::id::ServiceId;

use helix_support::rendering::suggest_similar;

const MAX_SUGGESTIONS: usize = 3;

/// Stores definitions and aliases.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    definitions: HashMap<ServiceId, Definition>,
    aliases: HashMap<ServiceId, ServiceId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the definition for `id`.
    ///
    /// Returns `true` if an earlier definition or alias was replaced.
    pub fn define(&mut self, id: ServiceId, definition: Definition) -> bool {
        let shadowed_alias = self.aliases.remove(&id).is_some();
        debug!(id = %id, strategy = %definition.strategy(), "Defined service");
        let replaced = self.definitions.insert(id, definition).is_some();
        replaced || shadowed_alias
    }

    /// Makes `alias` resolve to whatever `target` resolves to.
    ///
    /// Aliasing an id that `target` already resolves through is a no-op.
    /// Returns `true` if the alias table changed.
    ///
    /// # Errors
    /// [`ContainerError::ServiceNotFound`] if `target` is unknown right now.
    pub fn alias(&mut self, target: &ServiceId, alias: ServiceId) -> Result<bool, ContainerError> {
        if self.canonical(target).is_none() {
            return Err(self.not_found(target, None));
        }
        if self.resolves_through(target, &alias) {
            trace!(alias = %alias, target = %target, "Alias already on the target's chain");
            return Ok(false);
        }

        debug!(alias = %alias, target = %target, "Registered alias");
        self.definitions.remove(&alias);
        self.aliases.insert(alias, target.clone());
        Ok(true)
    }

    /// Follows aliases to the id that owns a definition.
    pub fn canonical(&self, id: &ServiceId) -> Option<ServiceId> {
        let mut current = id;
        // An alias chain can never be longer than the alias table.
        for _ in 0..=self.aliases.len() {
            if self.definitions.contains_key(current) {
                return Some(current.clone());
            }
            let next = self.aliases.get(current)?;
            trace!(from = %current, to = %next, "Following alias");
            current = next;
        }
        None
    }

    /// `true` if resolving `id` passes through `via`, `id` itself included.
    fn resolves_through(&self, id: &ServiceId, via: &ServiceId) -> bool {
        let mut current = id;
        for _ in 0..=self.aliases.len() {
            if current == via {
                return true;
            }
            match self.aliases.get(current) {
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    pub fn get(&self, canonical: &ServiceId) -> Option<&Definition> {
        self.definitions.get(canonical)
    }

    pub fn definitions(&self) -> &HashMap<ServiceId, Definition> {
        &self.definitions
    }

    /// Returns the number of definitions (aliases excluded).
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// All ids that resolve to something, aliases included.
    pub fn ids(&self) -> Vec<ServiceId> {
        let mut ids: Vec<_> = self.definitions.keys().cloned().collect();
        ids.extend(self.aliases.keys().cloned());
        ids
    }

    pub fn not_found(&self, id: &ServiceId, required_by: Option<ServiceId>) -> ContainerError {
        let ids = self.ids();
        ContainerError::ServiceNotFound(ServiceNotFoundError {
            requested: id.clone(),
            required_by,
            suggestions: suggest_similar(id.as_str(), &ids, MAX_SUGGESTIONS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> Definition {
        Definition::instance(42i32)
    }

    #[test]
    fn define_and_get() {
        let mut reg = Registry::new();
        let id = ServiceId::new("answer");
        assert!(!reg.define(id.clone(), definition()));
        assert!(reg.get(&id).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn redefine_reports_replacement() {
        let mut reg = Registry::new();
        let id = ServiceId::new("answer");
        reg.define(id.clone(), definition());
        assert!(reg.define(id, definition()));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn alias_requires_existing_target() {
        let mut reg = Registry::new();
        let err = reg
            .alias(&ServiceId::new("missing"), ServiceId::new("alias"))
            .unwrap_err();
        assert!(matches!(err, ContainerError::ServiceNotFound(_)));
    }

    #[test]
    fn alias_chain_resolves_to_definition() {
        let mut reg = Registry::new();
        reg.define(ServiceId::new("db.pdo"), definition());
        reg.alias(&ServiceId::new("db.pdo"), ServiceId::new("db")).unwrap();
        reg.alias(&ServiceId::new("db"), ServiceId::new("database")).unwrap();

        assert_eq!(
            reg.canonical(&ServiceId::new("database")),
            Some(ServiceId::new("db.pdo"))
        );
        assert_eq!(reg.alias_count(), 2);
    }

    #[test]
    fn define_over_alias_wins() {
        let mut reg = Registry::new();
        reg.define(ServiceId::new("a"), definition());
        reg.alias(&ServiceId::new("a"), ServiceId::new("b")).unwrap();
        assert!(reg.define(ServiceId::new("b"), definition()));
        assert_eq!(reg.canonical(&ServiceId::new("b")), Some(ServiceId::new("b")));
    }

    #[test]
    fn aliasing_back_onto_the_chain_keeps_the_definition() {
        let mut reg = Registry::new();
        let (a, b, c) = (ServiceId::new("a"), ServiceId::new("b"), ServiceId::new("c"));
        reg.define(a.clone(), definition());
        reg.alias(&a, b.clone()).unwrap();
        reg.alias(&b, c.clone()).unwrap();

        assert!(!reg.alias(&b, a.clone()).unwrap());
        assert!(!reg.alias(&c, b.clone()).unwrap());
        assert!(!reg.alias(&a, a.clone()).unwrap());

        assert!(reg.get(&a).is_some());
        assert_eq!(reg.canonical(&a), Some(a.clone()));
        assert_eq!(reg.canonical(&b), Some(a.clone()));
        assert_eq!(reg.canonical(&c), Some(a));
        assert_eq!(reg.alias_count(), 2);
    }

    #[test]
    fn not_found_suggests_close_ids() {
        let mut reg = Registry::new();
        reg.define(ServiceId::new("session.manager"), definition());
        match reg.not_found(&ServiceId::new("session.manger"), None) {
            ContainerError::ServiceNotFound(e) => {
                assert_eq!(e.suggestions, vec!["session.manager".to_string()]);
            }
            other => panic!("Expected ServiceNotFound, got: {other:?}"),
        }
    }
}
