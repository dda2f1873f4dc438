//! Construction strategies.
//!
//! A strategy decides how long a built service lives:
//! - [`Strategy::Singleton`]: built once, cached for the container lifetime
//! - [`Strategy::WeakSingleton`]: built once, rebuilt after every holder let go
//! - [`Strategy::Factory`]: built fresh on every `get`
//!
//! # Ordering
//! Strategies order by lifetime: `Singleton > WeakSingleton > Factory`.
use std::fmt;

/// How the container constructs and caches a service.
///
/// # Examples
/// ```
/// use helix_container::strategy::Strategy;
///
/// assert!(Strategy::Singleton > Strategy::WeakSingleton);
/// assert!(Strategy::WeakSingleton > Strategy::Factory);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// One instance for the lifetime of the container.
    ///
    /// Built on first `get`, kept until the container drops or the id is
    /// released or redefined.
    Singleton,

    /// One instance while anyone outside the container holds it.
    ///
    /// The container keeps only a weak reference. Once the last `Arc`
    /// handed out is dropped the next `get` builds a new one. Suited for
    /// expensive resources that can be recreated, such as a session
    /// manager.
    WeakSingleton,

    /// New instance on every `get`. Never cached.
    Factory,
}

impl Strategy {
    /// Returns `true` if this strategy keeps instances around.
    #[inline]
    pub fn is_cached(&self) -> bool {
        !matches!(self, Strategy::Factory)
    }

    #[inline]
    fn ordering(&self) -> u8 {
        match self {
            Strategy::Singleton => 2,
            Strategy::WeakSingleton => 1,
            Strategy::Factory => 0,
        }
    }
}

impl PartialOrd for Strategy {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Strategy {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ordering().cmp(&other.ordering())
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Singleton => write!(f, "Singleton"),
            Strategy::WeakSingleton => write!(f, "WeakSingleton"),
            Strategy::Factory => write!(f, "Factory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_ordering() {
        assert!(Strategy::Singleton > Strategy::WeakSingleton);
        assert!(Strategy::WeakSingleton > Strategy::Factory);
        assert!(Strategy::Singleton > Strategy::Factory);
    }

    #[test]
    fn strategy_is_cached() {
        assert!(Strategy::Singleton.is_cached());
        assert!(Strategy::WeakSingleton.is_cached());
        assert!(!Strategy::Factory.is_cached());
    }

    #[test]
    fn strategy_display() {
        assert_eq!(format!("{}", Strategy::Singleton), "Singleton");
        assert_eq!(format!("{}", Strategy::WeakSingleton), "WeakSingleton");
        assert_eq!(format!("{}", Strategy::Factory), "Factory");
    }
}
