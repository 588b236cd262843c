//! Route registry: O(1) exact-path lookup plus pre-compiled parameterized
//! patterns scanned in registration order.
//!
//! Conflicts are caught at registration. Two parameterized routes collide
//! when their structural keys match, so `/users/:id` and `/users/:userId`
//! cannot coexist under one method.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{RavelError, RavelResult};
use crate::hooks::{HandlerFn, HookFn};
use crate::request::Method;

/// Sentinel that replaces every `:name` segment in a structural key.
const PARAM_SENTINEL: &str = ":*";

/// One registered route. Immutable after registration; the before/after
/// lists already contain any group hooks, merged at registration time.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    /// Normalized pattern.
    pub pattern: String,
    pub handler: HandlerFn,
    pub before: Vec<HookFn>,
    pub after: Vec<HookFn>,
    /// Skip body decoding and deliver the raw bytes.
    pub raw_body: bool,
}

/// Normalize a path: leading slash, collapsed slash runs, no trailing
/// slash except for the root.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    let mut prev_slash = true;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A pattern compiled at registration: ordered segments, the ordered
/// parameter names, and the structural key used for conflict detection.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    segments: Vec<Segment>,
    param_names: Vec<String>,
    structural_key: String,
}

impl CompiledPattern {
    /// Compile a normalized pattern, validating parameter-name uniqueness.
    pub fn compile(pattern: &str) -> RavelResult<Self> {
        let mut segments = Vec::new();
        let mut param_names: Vec<String> = Vec::new();
        let mut duplicates: Vec<String> = Vec::new();
        let mut structural = String::new();

        for seg in pattern.split('/').filter(|s| !s.is_empty()) {
            structural.push('/');
            match seg.strip_prefix(':') {
                Some(name) if !name.is_empty() => {
                    if param_names.iter().any(|n| n == name) && !duplicates.iter().any(|d| d == name)
                    {
                        duplicates.push(name.to_string());
                    }
                    param_names.push(name.to_string());
                    segments.push(Segment::Param(name.to_string()));
                    structural.push_str(PARAM_SENTINEL);
                }
                _ => {
                    segments.push(Segment::Literal(seg.to_string()));
                    structural.push_str(seg);
                }
            }
        }

        if !duplicates.is_empty() {
            return Err(RavelError::DuplicateParams {
                pattern: pattern.to_string(),
                names: duplicates,
            });
        }

        if structural.is_empty() {
            structural.push('/');
        }

        Ok(CompiledPattern {
            segments,
            param_names,
            structural_key: structural,
        })
    }

    pub fn structural_key(&self) -> &str {
        &self.structural_key
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match a normalized request path. Segment counts must agree exactly;
    /// literals compare byte-for-byte; parameters capture their non-empty
    /// segment.
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segs.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::with_capacity(self.param_names.len());
        for (pattern_seg, &request_seg) in self.segments.iter().zip(&segs) {
            match pattern_seg {
                Segment::Literal(lit) => {
                    if lit != request_seg {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), request_seg.to_string());
                }
            }
        }
        Some(params)
    }
}

struct ParamRoute {
    compiled: CompiledPattern,
    route: Arc<Route>,
}

/// Route storage keyed by method: an exact-path map and an ordered list of
/// parameterized routes. Read-only once the server starts serving.
#[derive(Default)]
pub struct RouteRegistry {
    exact: HashMap<Method, HashMap<String, Arc<Route>>>,
    patterned: HashMap<Method, Vec<ParamRoute>>,
}

fn is_parameterized(pattern: &str) -> bool {
    pattern
        .split('/')
        .any(|s| s.len() > 1 && s.starts_with(':'))
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. A GET registration also derives a HEAD route for
    /// the same pattern unless HEAD is already registered there.
    pub fn register(&mut self, route: Route) -> RavelResult<()> {
        let mut route = route;
        route.pattern = normalize_path(&route.pattern);
        let method = route.method;
        let route = Arc::new(route);

        self.insert(method, route.clone(), false)?;

        if method == Method::Get {
            let derived = Arc::new(Route {
                method: Method::Head,
                pattern: route.pattern.clone(),
                handler: route.handler.clone(),
                before: route.before.clone(),
                after: route.after.clone(),
                raw_body: route.raw_body,
            });
            self.insert(Method::Head, derived, true)?;
        }
        Ok(())
    }

    fn insert(&mut self, method: Method, route: Arc<Route>, skip_if_present: bool) -> RavelResult<()> {
        if is_parameterized(&route.pattern) {
            let compiled = CompiledPattern::compile(&route.pattern)?;
            let list = self.patterned.entry(method).or_default();
            if list
                .iter()
                .any(|p| p.compiled.structural_key() == compiled.structural_key())
            {
                if skip_if_present {
                    return Ok(());
                }
                return Err(RavelError::RouteConflict {
                    method,
                    pattern: route.pattern.clone(),
                });
            }
            list.push(ParamRoute { compiled, route });
        } else {
            let map = self.exact.entry(method).or_default();
            if map.contains_key(&route.pattern) {
                if skip_if_present {
                    return Ok(());
                }
                return Err(RavelError::RouteConflict {
                    method,
                    pattern: route.pattern.clone(),
                });
            }
            map.insert(route.pattern.clone(), route);
        }
        Ok(())
    }

    /// Look up a route for a request. Exact paths win; parameterized
    /// routes are scanned in registration order. Allocates only the params
    /// map on a parameterized hit.
    pub fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(Arc<Route>, HashMap<String, String>)> {
        let path = normalize_path(path);

        if let Some(route) = self.exact.get(&method).and_then(|m| m.get(&path)) {
            return Some((route.clone(), HashMap::new()));
        }

        self.patterned.get(&method)?.iter().find_map(|p| {
            p.compiled
                .match_path(&path)
                .map(|params| (p.route.clone(), params))
        })
    }
}
