//! Service identifiers.
//!
//! A [`ServiceId`] is a case-sensitive string key. Ids built from a Rust type
//! use the full type name, so `ServiceId::of::<Kernel>()` and
//! `ServiceId::new(std::any::type_name::<Kernel>())` are the same key.

use std::any::type_name;
use std::borrow::{Borrow, Cow};
use std::fmt;
use std::hash::{Hash, Hasher};

use helix_support::rendering::shorten_type_name;

/// Identifies a service in the container.
///
/// # Examples
/// ```
/// use helix_container::id::ServiceId;
///
/// struct SessionManager;
///
/// let by_type = ServiceId::of::<SessionManager>();
/// assert!(by_type.as_str().ends_with("SessionManager"));
///
/// let by_name = ServiceId::new("session.manager");
/// assert_eq!(by_name.as_str(), "session.manager");
/// assert_ne!(by_type, by_name);
/// ```
#[derive(Clone)]
pub struct ServiceId(Cow<'static, str>);

impl ServiceId {
    /// Creates an id from an arbitrary string key.
    #[inline]
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    /// Creates an id from the type name of `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Cow::Borrowed(type_name::<T>()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used in diagnostics (module paths stripped).
    pub fn short_name(&self) -> String {
        shorten_type_name(&self.0)
    }
}

impl PartialEq for ServiceId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for ServiceId {}

impl Hash for ServiceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Borrow<str> for ServiceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for ServiceId {
    fn from(id: &'static str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({})", self.0)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
