//! Extensions: declarative units of service registration.
//!
//! An extension describes, through [`ExtensionMetadata`], the services it
//! defines and the registration actions it wants to run once every
//! extension's services are known. Extensions hold no state of their own;
//! the [`BootRepository`](crate::boot::BootRepository) reads them once and
//! drops them.
//!
//! # Examples
//! ```rust
//! use helix_container::prelude::*;
//!
//! struct Mailer { transport: String }
//! struct Newsletter;
//!
//! struct MailExtension;
//!
//! impl Extension for MailExtension {
//!     fn name(&self) -> &str {
//!         "mail"
//!     }
//!
//!     fn declare(&self, metadata: &mut ExtensionMetadata) {
//!         metadata
//!             .singleton(
//!                 ServiceId::of::<Mailer>(),
//!                 Declarator::new(|_| Ok(Mailer { transport: "smtp".into() })),
//!             )
//!             .alias("mailer");
//!
//!         metadata
//!             .registration("newsletter", |container| {
//!                 container.set(ServiceId::of::<Newsletter>(), Newsletter);
//!                 Ok(())
//!             })
//!             .if_service_exists("queue");
//!     }
//! }
//!
//! let metadata = MetadataReader.read(&MailExtension);
//! assert_eq!(metadata.services().len(), 1);
//! assert_eq!(metadata.registrations().len(), 1);
//! ```

use std::any::type_name;
use std::fmt;

use tracing::debug;

use crate::container::Container;
use crate::definition::{Declarator, Definition};
use crate::error::BoxError;
use crate::id::ServiceId;
use crate::strategy::Strategy;

/// Action run by a [`Registration`].
pub type RegistrationFn = Box<dyn FnOnce(&Container) -> Result<(), BoxError> + Send>;

/// A module of related service definitions and conditional wiring.
pub trait Extension: Send + Sync {
    /// Name used in configuration and diagnostics.
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Describes the services and registrations of this extension.
    fn declare(&self, metadata: &mut ExtensionMetadata);
}

/// A service definition declared by an extension.
#[derive(Debug)]
pub struct ServiceDeclaration {
    id: ServiceId,
    aliases: Vec<ServiceId>,
    definition: Definition,
}

impl ServiceDeclaration {
    /// Adds an alias, applied right after the definition.
    pub fn alias(&mut self, alias: impl Into<ServiceId>) -> &mut Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    pub fn aliases(&self) -> &[ServiceId] {
        &self.aliases
    }

    pub fn strategy(&self) -> Strategy {
        self.definition.strategy()
    }

    pub(crate) fn into_parts(self) -> (ServiceId, Definition, Vec<ServiceId>) {
        (self.id, self.definition, self.aliases)
    }
}

/// A conditional action run during the second boot phase.
pub struct Registration {
    name: String,
    requires: Vec<ServiceId>,
    action: RegistrationFn,
}

impl Registration {
    /// Only run if `id` resolves when the registration's turn comes.
    pub fn if_service_exists(&mut self, id: impl Into<ServiceId>) -> &mut Self {
        self.requires.push(id.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requires(&self) -> &[ServiceId] {
        &self.requires
    }

    /// `true` if every prerequisite id resolves in `container` right now.
    pub fn should_load(&self, container: &Container) -> bool {
        self.requires.iter().all(|id| container.has(id))
    }

    pub(crate) fn run(self, container: &Container) -> Result<(), BoxError> {
        (self.action)(container)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

/// Everything an extension declared.
#[derive(Debug)]
pub struct ExtensionMetadata {
    extension: String,
    services: Vec<ServiceDeclaration>,
    registrations: Vec<Registration>,
}

impl ExtensionMetadata {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            services: Vec::new(),
            registrations: Vec::new(),
        }
    }

    /// Declares a service with an explicit definition.
    pub fn service(
        &mut self,
        id: impl Into<ServiceId>,
        definition: Definition,
    ) -> &mut ServiceDeclaration {
        self.services.push(ServiceDeclaration {
            id: id.into(),
            aliases: Vec::new(),
            definition,
        });
        let last = self.services.len() - 1;
        &mut self.services[last]
    }

    pub fn singleton(
        &mut self,
        id: impl Into<ServiceId>,
        declarator: Declarator,
    ) -> &mut ServiceDeclaration {
        self.service(id, Definition::singleton(declarator))
    }

    pub fn weak_singleton(
        &mut self,
        id: impl Into<ServiceId>,
        declarator: Declarator,
    ) -> &mut ServiceDeclaration {
        self.service(id, Definition::weak_singleton(declarator))
    }

    pub fn factory(
        &mut self,
        id: impl Into<ServiceId>,
        declarator: Declarator,
    ) -> &mut ServiceDeclaration {
        self.service(id, Definition::factory(declarator))
    }

    /// Declares an action for the second boot phase.
    pub fn registration<F>(&mut self, name: impl Into<String>, action: F) -> &mut Registration
    where
        F: FnOnce(&Container) -> Result<(), BoxError> + Send + 'static,
    {
        self.registrations.push(Registration {
            name: name.into(),
            requires: Vec::new(),
            action: Box::new(action),
        });
        let last = self.registrations.len() - 1;
        &mut self.registrations[last]
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn services(&self) -> &[ServiceDeclaration] {
        &self.services
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub(crate) fn into_parts(self) -> (String, Vec<ServiceDeclaration>, Vec<Registration>) {
        (self.extension, self.services, self.registrations)
    }
}

/// Reads the metadata an extension declares.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataReader;

impl MetadataReader {
    pub fn read(&self, extension: &dyn Extension) -> ExtensionMetadata {
        let mut metadata = ExtensionMetadata::new(extension.name());
        extension.declare(&mut metadata);
        debug!(
            extension = extension.name(),
            services = metadata.services.len(),
            registrations = metadata.registrations.len(),
            "Read extension metadata"
        );
        metadata
    }
}
