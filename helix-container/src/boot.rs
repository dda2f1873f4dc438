//! Boot repository: applies extensions to a container.
//!
//! Boot runs in two phases over the extensions, strictly in the order they
//! were given:
//!
//! 1. every service declaration is defined (aliases right after their
//!    definition); later extensions overwrite earlier ids
//! 2. every registration whose prerequisites resolve at that moment runs
//!
//! Splitting the phases lets a registration probe for services declared by
//! any extension, including later ones, without building anything.

use tracing::{debug, info, instrument};

use helix_support::rendering::shorten_type_name;

use crate::container::Container;
use crate::error::BootError;
use crate::extension::{Extension, MetadataReader};

/// What a boot did, mostly for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootReport {
    /// Extension names, in processing order.
    pub extensions: Vec<String>,
    /// Number of service declarations applied.
    pub services: usize,
    /// `extension::registration` names that ran.
    pub loaded: Vec<String>,
    /// `extension::registration` names whose prerequisites were missing.
    pub skipped: Vec<String>,
}

/// An ordered list of extensions to boot.
#[derive(Default)]
pub struct BootRepository {
    extensions: Vec<Box<dyn Extension>>,
    reader: MetadataReader,
}

impl BootRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an extension.
    pub fn with(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn push(&mut self, extension: Box<dyn Extension>) {
        self.extensions.push(extension);
    }

    /// Selects and orders `available` extensions by the configured names.
    ///
    /// A name matches an extension's full or shortened name. An empty
    /// `order` keeps every available extension in its given order.
    ///
    /// # Errors
    /// - [`BootError::UnknownExtension`] for a name no extension answers to
    /// - [`BootError::DuplicateExtension`] for a name whose extension was
    ///   already selected
    pub fn from_config(
        available: Vec<Box<dyn Extension>>,
        order: &[String],
    ) -> Result<Self, BootError> {
        if order.is_empty() {
            return Ok(Self {
                extensions: available,
                reader: MetadataReader,
            });
        }

        let mut pool: Vec<Option<Box<dyn Extension>>> = available.into_iter().map(Some).collect();
        let mut extensions = Vec::with_capacity(order.len());

        for name in order {
            let position = pool
                .iter()
                .position(|slot| slot.as_ref().is_some_and(|e| answers_to(e.as_ref(), name)));
            match position.and_then(|position| pool[position].take()) {
                Some(extension) => extensions.push(extension),
                None if extensions.iter().any(|e| answers_to(e.as_ref(), name)) => {
                    return Err(BootError::DuplicateExtension(name.clone()));
                }
                None => return Err(BootError::UnknownExtension(name.clone())),
            }
        }

        Ok(Self {
            extensions,
            reader: MetadataReader,
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.extensions.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Runs both boot phases against `container`. Extensions are dropped
    /// afterwards.
    ///
    /// # Errors
    /// - [`BootError::Container`] if an alias targets an unknown id
    /// - [`BootError::Registration`] if a registration action fails
    #[instrument(skip_all, name = "boot", fields(extensions = self.extensions.len()))]
    pub fn boot(self, container: &Container) -> Result<BootReport, BootError> {
        let mut report = BootReport::default();
        let metadata: Vec<_> = self
            .extensions
            .iter()
            .map(|extension| self.reader.read(extension.as_ref()))
            .collect();
        drop(self.extensions);

        let mut pending = Vec::new();
        for entry in metadata {
            let (extension, services, registrations) = entry.into_parts();
            debug!(extension = %extension, services = services.len(), "Registering services");

            for declaration in services {
                let (id, definition, aliases) = declaration.into_parts();
                let handle = container.define(id, definition);
                for alias in aliases {
                    container.alias(handle.id().clone(), alias)?;
                }
                report.services += 1;
            }

            pending.push((extension.clone(), registrations));
            report.extensions.push(extension);
        }

        for (extension, registrations) in pending {
            for registration in registrations {
                let label = format!("{extension}::{}", registration.name());
                if !registration.should_load(container) {
                    debug!(
                        registration = %label,
                        requires = ?registration.requires(),
                        "Skipping registration"
                    );
                    report.skipped.push(label);
                    continue;
                }

                debug!(registration = %label, "Running registration");
                registration
                    .run(container)
                    .map_err(|source| BootError::Registration {
                        extension: extension.clone(),
                        source,
                    })?;
                report.loaded.push(label);
            }
        }

        info!(
            services = report.services,
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "Extensions booted"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for BootRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootRepository")
            .field("extensions", &self.names())
            .finish()
    }
}

fn answers_to(extension: &dyn Extension, name: &str) -> bool {
    extension.name() == name || shorten_type_name(extension.name()) == name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Declarator, Definition};
    use crate::extension::ExtensionMetadata;
    use crate::id::ServiceId;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Kernel;

    struct CoreExtension;

    impl Extension for CoreExtension {
        fn name(&self) -> &str {
            "core"
        }

        fn declare(&self, metadata: &mut ExtensionMetadata) {
            metadata
                .singleton("greeting", Declarator::new(|_| Ok(String::from("hello"))))
                .alias("salutation");
        }
    }

    struct OverrideExtension;

    impl Extension for OverrideExtension {
        fn name(&self) -> &str {
            "override"
        }

        fn declare(&self, metadata: &mut ExtensionMetadata) {
            metadata.singleton("greeting", Declarator::new(|_| Ok(String::from("bonjour"))));
        }
    }

    /// Wires routes only when a kernel exists.
    struct RoutesExtension {
        ran: Arc<AtomicBool>,
    }

    impl Extension for RoutesExtension {
        fn name(&self) -> &str {
            "routes"
        }

        fn declare(&self, metadata: &mut ExtensionMetadata) {
            let ran = self.ran.clone();
            metadata
                .registration("routes", move |container| {
                    ran.store(true, Ordering::SeqCst);
                    container.set("routes.loaded", true);
                    Ok(())
                })
                .if_service_exists(ServiceId::of::<Kernel>());
        }
    }

    struct KernelExtension;

    impl Extension for KernelExtension {
        fn name(&self) -> &str {
            "kernel"
        }

        fn declare(&self, metadata: &mut ExtensionMetadata) {
            metadata.singleton(ServiceId::of::<Kernel>(), Declarator::new(|_| Ok(Kernel)));
        }
    }

    struct FailingExtension;

    impl Extension for FailingExtension {
        fn name(&self) -> &str {
            "failing"
        }

        fn declare(&self, metadata: &mut ExtensionMetadata) {
            metadata.registration("explode", |_| Err("boom".into()));
        }
    }

    #[test]
    fn later_extension_overrides_earlier() {
        let container = Container::new();
        BootRepository::new()
            .with(CoreExtension)
            .with(OverrideExtension)
            .boot(&container)
            .unwrap();

        let greeting = container.get_as::<String>(&ServiceId::new("greeting")).unwrap();
        assert_eq!(*greeting, "bonjour");
        // The alias follows the id, so it sees the override too.
        let alias = container.get_as::<String>(&ServiceId::new("salutation")).unwrap();
        assert!(Arc::ptr_eq(&greeting, &alias));
    }

    #[test]
    fn registration_skipped_without_prerequisite() {
        let ran = Arc::new(AtomicBool::new(false));
        let container = Container::new();
        let report = BootRepository::new()
            .with(RoutesExtension { ran: ran.clone() })
            .boot(&container)
            .unwrap();

        assert!(!ran.load(Ordering::SeqCst));
        assert!(!container.has(&ServiceId::new("routes.loaded")));
        assert_eq!(report.skipped, vec!["routes::routes".to_string()]);
    }

    #[test]
    fn registration_sees_services_of_later_extensions() {
        let ran = Arc::new(AtomicBool::new(false));
        let container = Container::new();
        let report = BootRepository::new()
            .with(RoutesExtension { ran: ran.clone() })
            .with(KernelExtension)
            .boot(&container)
            .unwrap();

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(report.loaded, vec!["routes::routes".to_string()]);
        assert_eq!(report.extensions, vec!["routes".to_string(), "kernel".to_string()]);
    }

    #[test]
    fn registration_probe_does_not_build_services() {
        let ran = Arc::new(AtomicBool::new(false));
        let built = Arc::new(AtomicBool::new(false));
        let container = Container::new();
        container.define(
            ServiceId::of::<Kernel>(),
            Definition::singleton(Declarator::new({
                let built = built.clone();
                move |_| {
                    built.store(true, Ordering::SeqCst);
                    Ok(Kernel)
                }
            })),
        );

        BootRepository::new()
            .with(RoutesExtension { ran: ran.clone() })
            .boot(&container)
            .unwrap();

        assert!(ran.load(Ordering::SeqCst));
        assert!(!built.load(Ordering::SeqCst));
    }

    #[test]
    fn failing_registration_aborts_boot() {
        let container = Container::new();
        let err = BootRepository::new()
            .with(FailingExtension)
            .boot(&container)
            .unwrap_err();

        match err {
            BootError::Registration { extension, source } => {
                assert_eq!(extension, "failing");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("Expected Registration, got: {other:?}"),
        }
    }

    #[test]
    fn from_config_orders_by_name() {
        let available: Vec<Box<dyn Extension>> = vec![
            Box::new(KernelExtension),
            Box::new(CoreExtension),
            Box::new(OverrideExtension),
        ];
        let repo = BootRepository::from_config(
            available,
            &["override".to_string(), "core".to_string()],
        )
        .unwrap();

        assert_eq!(repo.names(), vec!["override".to_string(), "core".to_string()]);
    }

    #[test]
    fn from_config_rejects_unknown_name() {
        let available: Vec<Box<dyn Extension>> = vec![Box::new(CoreExtension)];
        let err = BootRepository::from_config(available, &["session".to_string()]).unwrap_err();
        assert!(matches!(err, BootError::UnknownExtension(name) if name == "session"));
    }

    #[test]
    fn from_config_rejects_repeated_name() {
        let available: Vec<Box<dyn Extension>> =
            vec![Box::new(CoreExtension), Box::new(KernelExtension)];
        let err = BootRepository::from_config(
            available,
            &["core".to_string(), "kernel".to_string(), "core".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, BootError::DuplicateExtension(name) if name == "core"));
    }

    #[test]
    fn from_config_empty_keeps_all() {
        let available: Vec<Box<dyn Extension>> =
            vec![Box::new(CoreExtension), Box::new(KernelExtension)];
        let repo = BootRepository::from_config(available, &[]).unwrap();
        assert_eq!(repo.len(), 2);
    }
}
