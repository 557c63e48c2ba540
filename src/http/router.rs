//! Route patterns and per-method route tables
//!
//! Patterns are `/`-separated templates with three segment kinds:
//!
//! - literal segments match byte-for-byte;
//! - `:name` captures one segment, optionally constrained by a regex written
//!   as `:name(regex)` which must match the whole segment;
//! - a trailing `*` or `*name` captures the rest of the path.
//!
//! Lookup walks the routes of one method in registration order and returns
//! the first match; there is no specificity ranking. This is a deliberate
//! simplification: register the more specific route first.

use crate::http::{request::Request, response::Response, types::Method};
use regex::Regex;
use std::{
    collections::HashMap,
    error, fmt,
    sync::{Arc, Mutex},
};

/// A registered route handler.
pub type RouteHandler = Arc<dyn Fn(&Request, &mut Response) + Send + Sync>;

const METHOD_TABLES: usize = 4;

#[derive(Debug)]
enum Segment {
    Literal(String),
    Param {
        name: String,
        constraint: Option<Regex>,
    },
    Wildcard {
        name: String,
    },
}

/// A compiled route pattern, frozen at registration.
#[derive(Debug)]
pub(crate) struct Pattern {
    segments: Vec<Segment>,
}

/// Rejected route pattern at registration time.
#[derive(Debug)]
pub enum PatternError {
    /// A wildcard segment may only appear in last position.
    WildcardNotLast(String),
    /// A `:name(` segment without the closing parenthesis.
    UnclosedConstraint(String),
    /// The `(regex)` constraint failed to compile.
    BadConstraint(String, regex::Error),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::WildcardNotLast(pattern) => {
                write!(f, "wildcard must be the last segment in {pattern:?}")
            }
            PatternError::UnclosedConstraint(segment) => {
                write!(f, "unclosed regex constraint in segment {segment:?}")
            }
            PatternError::BadConstraint(segment, err) => {
                write!(f, "invalid regex constraint in segment {segment:?}: {err}")
            }
        }
    }
}

impl error::Error for PatternError {}

impl Pattern {
    pub(crate) fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();

        for raw in pattern.split('/').filter(|s| !s.is_empty()) {
            let segment = if let Some(rest) = raw.strip_prefix(':') {
                match rest.find('(') {
                    Some(open) => {
                        if !rest.ends_with(')') {
                            return Err(PatternError::UnclosedConstraint(raw.to_owned()));
                        }

                        let expr = &rest[open + 1..rest.len() - 1];
                        let constraint = match expr {
                            // `:name()` is just an unconstrained parameter
                            "" => None,
                            expr => Some(
                                // anchored so the constraint covers the whole segment
                                Regex::new(&format!("^(?:{expr})$")).map_err(|err| {
                                    PatternError::BadConstraint(raw.to_owned(), err)
                                })?,
                            ),
                        };

                        Segment::Param {
                            name: rest[..open].to_owned(),
                            constraint,
                        }
                    }
                    None => Segment::Param {
                        name: rest.to_owned(),
                        constraint: None,
                    },
                }
            } else if raw == "*" {
                Segment::Wildcard { name: "*".to_owned() }
            } else if let Some(name) = raw.strip_prefix('*') {
                Segment::Wildcard {
                    name: name.to_owned(),
                }
            } else {
                Segment::Literal(raw.to_owned())
            };

            segments.push(segment);
        }

        let last = segments.len().saturating_sub(1);
        for (index, segment) in segments.iter().enumerate() {
            if matches!(segment, Segment::Wildcard { .. }) && index != last {
                return Err(PatternError::WildcardNotLast(pattern.to_owned()));
            }
        }

        Ok(Self { segments })
    }

    /// Matches `path` against the pattern; on success `params` holds exactly
    /// the captures declared by the pattern. `params` is cleared on entry, so
    /// a failed attempt never leaks captures from a previous one.
    pub(crate) fn matches(&self, path: &str, params: &mut HashMap<String, String>) -> bool {
        params.clear();

        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut pi = 0;

        for segment in &self.segments {
            match segment {
                Segment::Wildcard { name } => {
                    params.insert(name.clone(), parts[pi..].join("/"));
                    return true;
                }
                Segment::Literal(literal) => {
                    if pi >= parts.len() || parts[pi] != literal {
                        return false;
                    }
                    pi += 1;
                }
                Segment::Param { name, constraint } => {
                    if pi >= parts.len() {
                        return false;
                    }
                    if let Some(regex) = constraint {
                        if !regex.is_match(parts[pi]) {
                            return false;
                        }
                    }
                    params.insert(name.clone(), parts[pi].to_owned());
                    pi += 1;
                }
            }
        }

        pi == parts.len()
    }
}

struct Route {
    pattern: Pattern,
    handler: RouteHandler,
}

/// Per-method route tables.
///
/// Registration and lookup are linearized by a single mutex; the lock is not
/// held while a handler runs.
pub(crate) struct Router {
    tables: Mutex<[Vec<Route>; METHOD_TABLES]>,
}

impl Router {
    pub(crate) fn new() -> Self {
        Self {
            tables: Mutex::new([Vec::new(), Vec::new(), Vec::new(), Vec::new()]),
        }
    }

    pub(crate) fn register(&self, method: Method, pattern: Pattern, handler: RouteHandler) {
        let mut tables = self.tables.lock().expect("route table lock poisoned");
        tables[method.index()].push(Route { pattern, handler });
    }

    /// First route of the request's method whose pattern matches, in
    /// registration order. Populates `req.params` from the winning pattern;
    /// the query string does not take part in matching.
    pub(crate) fn lookup(&self, req: &mut Request) -> Option<RouteHandler> {
        let tables = self.tables.lock().expect("route table lock poisoned");

        let path = req.path.split('?').next().unwrap_or("");
        for route in &tables[req.method.index()] {
            if route.pattern.matches(path, &mut req.params) {
                return Some(Arc::clone(&route.handler));
            }
        }

        req.params.clear();
        None
    }
}
