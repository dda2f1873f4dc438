//! Reverse routing: named route + parameters → URI.

use std::collections::BTreeMap;
use std::sync::Arc;

use helix_support::rendering::suggest_similar;

use crate::compiler::CompiledRouteTable;
use crate::error::{InvalidRouteNameError, Result, RoutingError};
use crate::path::Token;
use crate::router::Router;

/// Builds URIs for named routes.
///
/// Values are substituted as given: they are neither percent-encoded nor
/// checked against the parameter's constraint. A parameter left out
/// becomes an empty string.
///
/// ```
/// use std::collections::BTreeMap;
/// use helix_routing::{Handler, Route, RouteCollection, Router, UrlGenerator};
///
/// let mut routes = RouteCollection::new();
/// routes.add(Route::get("/users/{id:\\d+}", Handler::action("users", "show")).named("user.show"));
/// let generator = UrlGenerator::new(&Router::new(routes).unwrap());
///
/// let id = BTreeMap::from([("id", "42")]);
/// assert_eq!(generator.generate("user.show", &id).unwrap(), "/users/42");
/// assert_eq!(generator.generate("user.show", &BTreeMap::<&str, &str>::new()).unwrap(), "/users/");
/// ```
#[derive(Debug, Clone)]
pub struct UrlGenerator {
    table: Arc<CompiledRouteTable>,
    base_url: String,
}

impl UrlGenerator {
    pub fn new(router: &Router) -> Self {
        Self {
            table: router.table().clone(),
            base_url: String::new(),
        }
    }

    /// Sets the scheme and host used by [`UrlGenerator::generate_absolute`].
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the path of the route named `name`.
    ///
    /// # Errors
    /// - [`RoutingError::InvalidRouteName`] if no route has this name
    /// - [`RoutingError::InvalidRouteParameter`] if `parameters` holds a key
    ///   the route does not declare
    pub fn generate<K, V>(&self, name: &str, parameters: &BTreeMap<K, V>) -> Result<String>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let Some((route, template)) = self.table.named(name) else {
            return Err(RoutingError::InvalidRouteName(InvalidRouteNameError {
                name: name.to_string(),
                suggestions: suggest_similar(name, &self.table.names(), 3),
            }));
        };

        let values: BTreeMap<&str, &str> = parameters
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_ref()))
            .collect();

        for key in values.keys() {
            let declared = template
                .iter()
                .flatten()
                .any(|token| matches!(token, Token::Param { name, .. } if name.as_str() == *key));
            if !declared {
                return Err(RoutingError::InvalidRouteParameter {
                    route: route.label(),
                    parameter: key.to_string(),
                });
            }
        }

        let mut uri = String::new();
        for segment in template {
            uri.push('/');
            for token in segment {
                match token {
                    Token::Literal(literal) => uri.push_str(literal),
                    Token::Param { name, .. } => {
                        uri.push_str(values.get(name.as_str()).copied().unwrap_or_default())
                    }
                }
            }
        }
        if uri.is_empty() {
            uri.push('/');
        }
        Ok(uri)
    }

    /// Like [`UrlGenerator::generate`], prefixed with the base URL.
    ///
    /// # Errors
    /// See [`UrlGenerator::generate`].
    pub fn generate_absolute<K, V>(&self, name: &str, parameters: &BTreeMap<K, V>) -> Result<String>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(format!("{}{}", self.base_url, self.generate(name, parameters)?))
    }
}
