//! Route compiler: turns a [`RouteCollection`] into a dispatch tree.
//!
//! The tree is keyed by path segment:
//!
//! - static segments are looked up by hash
//! - segments holding only unconstrained parameters (possibly mixed with
//!   literal text) are tried in declaration order; a bare `{x}` takes the
//!   whole segment, anything else goes through an anchored regex
//! - from the first segment carrying a custom constraint, the rest of the
//!   path is matched by one anchored tail regex, so a constraint may span `/`
//!
//! Below a node, static children come first; dynamic and tail branches are
//! then tried in the order routes first declared them.
//!
//! Routes whose templates have the same shape share nodes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use regex::{Captures, Regex};
use tracing::{debug, instrument, warn};

use crate::error::{BadRouteDefinitionError, Result, RoutingError};
use crate::method::Method;
use crate::path::{Token, parse};
use crate::route::{Route, RouteCollection};

/// Pattern of an unconstrained parameter.
pub const DEFAULT_CONSTRAINT: &str = "[^/]+";

/// Compiles route collections.
#[derive(Debug, Default, Clone, Copy)]
pub struct RouteCompiler;

impl RouteCompiler {
    /// Compiles `routes` into an immutable table.
    ///
    /// # Errors
    /// [`RoutingError::BadRouteDefinition`] for a malformed template, an
    /// invalid constraint regex, a duplicate route name, or two routes with
    /// the same method and template shape.
    #[instrument(skip_all, name = "compile_routes", fields(routes = routes.len()))]
    pub fn compile(&self, routes: RouteCollection) -> Result<CompiledRouteTable> {
        let mut table = CompiledRouteTable::default();

        for route in routes.into_routes() {
            let index = table.routes.len();
            let template = parse(route.path()).map_err(|e| bad(&route, e.offset, e.reason))?;

            if let Some(name) = route.name() {
                if table.names.contains_key(name) {
                    return Err(bad(&route, 0, format!("duplicate route name `{name}`")));
                }
                table.names.insert(name.to_string(), index);
            }

            insert(&mut table.root, &route, index, &template)?;
            table.templates.push(template);
            table.routes.push(Arc::new(route));
        }

        debug!(
            routes = table.routes.len(),
            named = table.names.len(),
            "Route table compiled"
        );
        Ok(table)
    }
}

/// The immutable dispatch structure built from every route.
#[derive(Debug, Default)]
pub struct CompiledRouteTable {
    routes: Vec<Arc<Route>>,
    templates: Vec<Vec<Vec<Token>>>,
    names: HashMap<String, usize>,
    root: Node,
}

impl CompiledRouteTable {
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Names of every named route, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The route with this name and its parsed template.
    pub(crate) fn named(&self, name: &str) -> Option<(&Arc<Route>, &[Vec<Token>])> {
        let index = *self.names.get(name)?;
        Some((&self.routes[index], &self.templates[index]))
    }

    /// Looks a normalized request path up for `method`.
    pub(crate) fn lookup(&self, method: Method, path: &str) -> Lookup<'_> {
        let segments = crate::path::segments(path);
        let mut search = Search {
            segments: &segments,
            method,
            allowed: Vec::new(),
        };
        let mut values = Vec::new();

        match search.walk(&self.root, 0, &mut values) {
            Some((endpoint, values)) => {
                let parameters = endpoint.names.iter().cloned().zip(values).collect();
                Lookup::Found {
                    route: &self.routes[endpoint.route],
                    parameters,
                }
            }
            None if search.allowed.is_empty() => Lookup::NotFound,
            None => {
                let mut allowed = search.allowed;
                allowed.sort_unstable();
                allowed.dedup();
                Lookup::NotAllowed(allowed)
            }
        }
    }
}

pub(crate) enum Lookup<'t> {
    Found {
        route: &'t Arc<Route>,
        parameters: BTreeMap<String, String>,
    },
    NotAllowed(Vec<Method>),
    NotFound,
}

#[derive(Debug, Default)]
struct Node {
    statics: HashMap<String, Node>,
    dynamics: Vec<Dynamic>,
    tails: Vec<Tail>,
    /// Dynamic and tail children, in declaration order.
    branches: Vec<Branch>,
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Copy)]
enum Branch {
    Dynamic(usize),
    Tail(usize),
}

#[derive(Debug)]
struct Dynamic {
    /// Template shape with parameter names erased, e.g. `{}.{}`.
    shape: String,
    matcher: SegmentMatcher,
    node: Node,
}

#[derive(Debug)]
enum SegmentMatcher {
    Any,
    Pattern { regex: Regex, groups: Vec<String> },
}

impl SegmentMatcher {
    fn capture(&self, segment: &str, values: &mut Vec<String>) -> bool {
        match self {
            SegmentMatcher::Any => {
                values.push(segment.to_string());
                true
            }
            SegmentMatcher::Pattern { regex, groups } => {
                let Some(captures) = regex.captures(segment) else {
                    return false;
                };
                values.extend(captured(&captures, groups));
                true
            }
        }
    }
}

#[derive(Debug)]
struct Tail {
    regex: Regex,
    groups: Vec<String>,
    endpoints: Vec<Endpoint>,
}

#[derive(Debug)]
struct Endpoint {
    method: Method,
    route: usize,
    /// Parameter names, in capture order.
    names: Vec<String>,
}

fn bad(route: &Route, offset: usize, reason: impl Into<String>) -> RoutingError {
    RoutingError::BadRouteDefinition(BadRouteDefinitionError {
        route: route.label(),
        offset,
        reason: reason.into(),
    })
}

/// Values of the named `groups`, empty for a group that did not take part.
fn captured<'c>(
    captures: &'c Captures<'_>,
    groups: &'c [String],
) -> impl Iterator<Item = String> + 'c {
    groups
        .iter()
        .map(|g| captures.name(g).map_or_else(String::new, |m| m.as_str().to_string()))
}

fn group_name(index: usize) -> String {
    format!("__hx{index}")
}

/// Effective constraint of a parameter: inline, then `where`, then none.
fn constraint_of<'r>(route: &'r Route, name: &str, inline: &'r Option<String>) -> Option<&'r str> {
    inline
        .as_deref()
        .or_else(|| route.wheres().get(name).map(String::as_str))
}

fn is_constrained(route: &Route, segment: &[Token]) -> bool {
    segment.iter().any(|token| match token {
        Token::Param { name, constraint, .. } => constraint_of(route, name, constraint).is_some(),
        Token::Literal(_) => false,
    })
}

fn param_names(template: &[Vec<Token>]) -> Vec<String> {
    template
        .iter()
        .flatten()
        .filter_map(|token| match token {
            Token::Param { name, .. } => Some(name.clone()),
            Token::Literal(_) => None,
        })
        .collect()
}

fn insert(root: &mut Node, route: &Route, index: usize, template: &[Vec<Token>]) -> Result<()> {
    let names = param_names(template);
    for name in route.wheres().keys() {
        if !names.contains(name) {
            warn!(
                route = %route.label(),
                parameter = %name,
                "Constraint names no parameter of the route"
            );
        }
    }

    let endpoint = Endpoint {
        method: route.method(),
        route: index,
        names,
    };

    let mut node = root;
    for (depth, segment) in template.iter().enumerate() {
        if is_constrained(route, segment) {
            let (source, groups) = tail_regex(route, &template[depth..])?;
            let position = match node.tails.iter().position(|t| t.regex.as_str() == source) {
                Some(position) => position,
                None => {
                    let regex = Regex::new(&source)
                        .map_err(|e| bad(route, first_offset(segment), e.to_string()))?;
                    node.tails.push(Tail {
                        regex,
                        groups,
                        endpoints: Vec::new(),
                    });
                    node.branches.push(Branch::Tail(node.tails.len() - 1));
                    node.tails.len() - 1
                }
            };
            return push_endpoint(&mut node.tails[position].endpoints, route, endpoint);
        }

        node = match segment.as_slice() {
            [Token::Literal(literal)] => node.statics.entry(literal.clone()).or_default(),
            _ => {
                let shape = shape_of(segment);
                let position = match node.dynamics.iter().position(|d| d.shape == shape) {
                    Some(position) => position,
                    None => {
                        let matcher = segment_matcher(route, segment)?;
                        node.dynamics.push(Dynamic {
                            shape,
                            matcher,
                            node: Node::default(),
                        });
                        node.branches.push(Branch::Dynamic(node.dynamics.len() - 1));
                        node.dynamics.len() - 1
                    }
                };
                &mut node.dynamics[position].node
            }
        };
    }

    push_endpoint(&mut node.endpoints, route, endpoint)
}

fn push_endpoint(endpoints: &mut Vec<Endpoint>, route: &Route, endpoint: Endpoint) -> Result<()> {
    if endpoints.iter().any(|e| e.method == endpoint.method) {
        return Err(bad(
            route,
            0,
            format!("another {} route already matches the same paths", endpoint.method),
        ));
    }
    endpoints.push(endpoint);
    Ok(())
}

fn first_offset(segment: &[Token]) -> usize {
    segment
        .iter()
        .find_map(|token| match token {
            Token::Param { offset, .. } => Some(*offset),
            Token::Literal(_) => None,
        })
        .unwrap_or(0)
}

fn shape_of(segment: &[Token]) -> String {
    segment
        .iter()
        .map(|token| match token {
            Token::Literal(literal) => regex::escape(literal),
            Token::Param { .. } => "{}".to_string(),
        })
        .collect()
}

fn segment_matcher(route: &Route, segment: &[Token]) -> Result<SegmentMatcher> {
    if let [Token::Param { .. }] = segment {
        return Ok(SegmentMatcher::Any);
    }

    let mut source = String::from("^");
    let mut groups = Vec::new();
    for token in segment {
        match token {
            Token::Literal(literal) => source.push_str(&regex::escape(literal)),
            Token::Param { .. } => {
                let group = group_name(groups.len());
                source.push_str(&format!("(?P<{group}>{DEFAULT_CONSTRAINT})"));
                groups.push(group);
            }
        }
    }
    source.push('$');

    let regex = Regex::new(&source).map_err(|e| bad(route, first_offset(segment), e.to_string()))?;
    Ok(SegmentMatcher::Pattern { regex, groups })
}

/// Builds the anchored regex matching `segments` joined by `/`.
fn tail_regex(route: &Route, segments: &[Vec<Token>]) -> Result<(String, Vec<String>)> {
    let mut parts = Vec::with_capacity(segments.len());
    let mut groups = Vec::new();

    for segment in segments {
        let mut part = String::new();
        for token in segment {
            match token {
                Token::Literal(literal) => part.push_str(&regex::escape(literal)),
                Token::Param {
                    name,
                    constraint,
                    offset,
                } => {
                    let pattern =
                        constraint_of(route, name, constraint).unwrap_or(DEFAULT_CONSTRAINT);
                    // Checked alone so the error points at the parameter.
                    Regex::new(pattern).map_err(|e| bad(route, *offset, e.to_string()))?;
                    let group = group_name(groups.len());
                    part.push_str(&format!("(?P<{group}>(?:{pattern}))"));
                    groups.push(group);
                }
            }
        }
        parts.push(part);
    }

    Ok((format!("^(?:{})$", parts.join("/")), groups))
}

struct Search<'s> {
    segments: &'s [&'s str],
    method: Method,
    allowed: Vec<Method>,
}

impl<'s> Search<'s> {
    /// Depth-first walk: the static child, then dynamic and tail branches
    /// in declaration order. The first endpoint answering to the method
    /// wins; the methods of other endpoints matching the path are recorded
    /// for a 405.
    fn walk<'t>(
        &mut self,
        node: &'t Node,
        depth: usize,
        values: &mut Vec<String>,
    ) -> Option<(&'t Endpoint, Vec<String>)> {
        let segment = self.segments.get(depth).copied();
        match segment {
            None => {
                if let Some(endpoint) = self.pick(&node.endpoints) {
                    return Some((endpoint, values.clone()));
                }
            }
            Some(segment) => {
                if let Some(child) = node.statics.get(segment) {
                    if let Some(found) = self.walk(child, depth + 1, values) {
                        return Some(found);
                    }
                }
            }
        }

        let mut rest: Option<String> = None;
        for branch in &node.branches {
            let found = match *branch {
                Branch::Dynamic(index) => {
                    let Some(segment) = segment else {
                        continue;
                    };
                    let dynamic = &node.dynamics[index];
                    let mark = values.len();
                    let found = if dynamic.matcher.capture(segment, values) {
                        self.walk(&dynamic.node, depth + 1, values)
                    } else {
                        None
                    };
                    values.truncate(mark);
                    found
                }
                Branch::Tail(index) => {
                    let tail = &node.tails[index];
                    let rest = rest.get_or_insert_with(|| self.segments[depth..].join("/"));
                    self.tail(tail, rest, values)
                }
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn tail<'t>(
        &mut self,
        tail: &'t Tail,
        rest: &str,
        values: &[String],
    ) -> Option<(&'t Endpoint, Vec<String>)> {
        let captures = tail.regex.captures(rest)?;
        let endpoint = self.pick(&tail.endpoints)?;
        let mut values = values.to_vec();
        values.extend(captured(&captures, &tail.groups));
        Some((endpoint, values))
    }

    fn pick<'t>(&mut self, endpoints: &'t [Endpoint]) -> Option<&'t Endpoint> {
        let found = endpoints.iter().find(|e| e.method == self.method);
        if found.is_none() {
            self.allowed.extend(endpoints.iter().map(|e| e.method));
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Handler;

    fn compile(routes: Vec<Route>) -> Result<CompiledRouteTable> {
        RouteCompiler.compile(routes.into_iter().collect())
    }

    fn h(action: &'static str) -> Handler {
        Handler::action("test", action)
    }

    fn found(
        table: &CompiledRouteTable,
        method: Method,
        path: &str,
    ) -> (String, BTreeMap<String, String>) {
        match table.lookup(method, path) {
            Lookup::Found { route, parameters } => (route.label(), parameters),
            Lookup::NotAllowed(allowed) => {
                panic!("Expected a match for {path}, got 405 {allowed:?}")
            }
            Lookup::NotFound => panic!("Expected a match for {path}, got 404"),
        }
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn digit_leading_parameter_is_rejected() {
        let err = compile(vec![Route::get("/users/{2bad}", h("show"))]).unwrap_err();
        match err {
            RoutingError::BadRouteDefinition(e) => {
                assert_eq!(e.offset, 8);
                assert_eq!(e.route, "GET /users/{2bad}");
            }
            other => panic!("Expected BadRouteDefinition, got: {other:?}"),
        }
    }

    #[test]
    fn invalid_constraint_regex_is_rejected() {
        let err = compile(vec![Route::get("/a/{id:(}", h("a"))]).unwrap_err();
        assert!(matches!(err, RoutingError::BadRouteDefinition(ref e) if e.offset == 4));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let err = compile(vec![
            Route::get("/a", h("a")).named("same"),
            Route::get("/b", h("b")).named("same"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate route name"));
    }

    #[test]
    fn same_shape_same_method_is_rejected() {
        let err = compile(vec![
            Route::get("/users/{id}", h("a")),
            Route::get("/users/{user}", h("b")),
        ])
        .unwrap_err();
        assert!(matches!(err, RoutingError::BadRouteDefinition(_)));

        // A different method on the same shape is fine.
        compile(vec![
            Route::get("/users/{id}", h("a")),
            Route::put("/users/{user}", h("b")),
        ])
        .unwrap();
    }

    #[test]
    fn static_wins_over_dynamic() {
        let table = compile(vec![
            Route::get("/users/{id}", h("show")).named("show"),
            Route::get("/users/new", h("new")).named("new"),
        ])
        .unwrap();

        assert_eq!(found(&table, Method::Get, "/users/new").0, "new");
        let (label, parameters) = found(&table, Method::Get, "/users/7");
        assert_eq!(label, "show");
        assert_eq!(parameters, params(&[("id", "7")]));
    }

    #[test]
    fn dynamic_backtracks_when_deeper_segments_miss() {
        let table = compile(vec![
            Route::get("/{a}/edit", h("edit")).named("edit"),
            Route::get("/{a}.{b}/{c}", h("file")).named("file"),
        ])
        .unwrap();

        let (label, parameters) = found(&table, Method::Get, "/x.y/z");
        assert_eq!(label, "file");
        assert_eq!(parameters, params(&[("a", "x"), ("b", "y"), ("c", "z")]));
        assert_eq!(found(&table, Method::Get, "/x.y/edit").0, "edit");
    }

    #[test]
    fn constraints_route_through_tails() {
        let table = compile(vec![
            Route::get("/posts/{id:\\d+}", h("by_id")).named("by_id"),
            Route::get("/posts/{slug}", h("by_slug")).named("by_slug"),
        ])
        .unwrap();

        assert_eq!(found(&table, Method::Get, "/posts/12").0, "by_id");
        assert_eq!(found(&table, Method::Get, "/posts/hello").0, "by_slug");

        let table = compile(vec![Route::get("/posts/{id:\\d+}", h("by_id"))]).unwrap();
        assert!(matches!(table.lookup(Method::Get, "/posts/abc"), Lookup::NotFound));
    }

    #[test]
    fn dynamic_and_tail_branches_keep_declaration_order() {
        let table = compile(vec![
            Route::get("/posts/{slug}", h("by_slug")).named("by_slug"),
            Route::get("/posts/{id:\\d+}", h("by_id")).named("by_id"),
        ])
        .unwrap();
        assert_eq!(found(&table, Method::Get, "/posts/12").0, "by_slug");

        let table = compile(vec![
            Route::get("/posts/{id:\\d+}", h("by_id")).named("by_id"),
            Route::post("/posts/{slug}", h("touch")).named("touch"),
        ])
        .unwrap();
        assert_eq!(found(&table, Method::Post, "/posts/12").0, "touch");
        match table.lookup(Method::Delete, "/posts/12") {
            Lookup::NotAllowed(allowed) => assert_eq!(allowed, vec![Method::Get, Method::Post]),
            _ => panic!("Expected NotAllowed"),
        }
    }

    #[test]
    fn tail_constraint_may_span_slashes() {
        let table = compile(vec![
            Route::get("/files/{path:.+}", h("file")).named("file"),
            Route::get("/years/{year}/{month}", h("month")).where_("month", "\\d{2}"),
        ])
        .unwrap();

        let (_, parameters) = found(&table, Method::Get, "/files/a/b/c.txt");
        assert_eq!(parameters, params(&[("path", "a/b/c.txt")]));

        let (_, parameters) = found(&table, Method::Get, "/years/2024/05");
        assert_eq!(parameters, params(&[("month", "05"), ("year", "2024")]));
        assert!(matches!(table.lookup(Method::Get, "/years/2024/5"), Lookup::NotFound));
    }

    #[test]
    fn inline_constraint_wins_over_where() {
        let table = compile(vec![
            Route::get("/n/{id:[a-z]+}", h("n")).where_("id", "\\d+"),
        ])
        .unwrap();

        found(&table, Method::Get, "/n/abc");
        assert!(matches!(table.lookup(Method::Get, "/n/123"), Lookup::NotFound));
    }

    #[test]
    fn method_mismatch_collects_allowed() {
        let table = compile(vec![
            Route::get("/users/{id}", h("show")),
            Route::put("/users/{id}", h("update")),
            Route::post("/users", h("store")),
        ])
        .unwrap();

        match table.lookup(Method::Delete, "/users/1") {
            Lookup::NotAllowed(allowed) => assert_eq!(allowed, vec![Method::Get, Method::Put]),
            _ => panic!("Expected NotAllowed"),
        }
    }

    #[test]
    fn later_branch_can_serve_the_method() {
        let table = compile(vec![
            Route::get("/users/new", h("new")),
            Route::post("/users/{id}", h("touch")).named("touch"),
        ])
        .unwrap();

        assert_eq!(found(&table, Method::Post, "/users/new").0, "touch");
    }

    #[test]
    fn root_route() {
        let table = compile(vec![Route::get("/", h("home")).named("home")]).unwrap();
        assert_eq!(found(&table, Method::Get, "/").0, "home");
        assert!(matches!(table.lookup(Method::Get, "/x"), Lookup::NotFound));
    }

    #[test]
    fn names_are_sorted() {
        let table = compile(vec![
            Route::get("/b", h("b")).named("b"),
            Route::get("/a", h("a")).named("a"),
            Route::get("/c", h("c")),
        ])
        .unwrap();
        assert_eq!(table.names(), vec!["a", "b"]);
        assert_eq!(table.len(), 3);
    }
}
