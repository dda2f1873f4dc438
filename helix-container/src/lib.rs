//! Service container and extension boot for Helix.
//!
//! Services are declared as [`Definition`](definition::Definition)s under a
//! [`ServiceId`] and built on demand; [`Extension`](extension::Extension)s
//! bundle declarations and are applied by the [`BootRepository`].

pub mod boot;
pub mod container;
pub mod definition;
pub mod error;
pub mod extension;
mod graph;
pub mod id;
mod registry;
pub mod resolver;
pub mod strategy;

pub use boot::{BootReport, BootRepository};
pub use container::{Container, DefinitionHandle, prelude};
pub use error::{BootError, ContainerError, Result};
pub use id::ServiceId;
pub use strategy::Strategy;
