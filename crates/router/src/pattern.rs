//! Path pattern compilation and matching.
//!
//! Patterns use brace placeholders:
//!
//! - `{name}` or `{name:string}` captures one path segment
//! - `{name:number}` captures one segment that must parse as a finite number
//! - `{*name}` captures the remainder of the path and must come last
//!
//! A trailing slash is not significant, neither on patterns nor on request paths.
//! Literal braces are written `{{` and `}}`.
//!
//! Matching is delegated to [`matchit`]. Each pattern compiles to an exact router and,
//! for namespace prefixes, a second router that captures whatever follows the prefix.

use crate::error::RouteError;
use crate::request::PathParams;
use std::fmt;
use std::sync::Arc;

const REST: &str = "__rest";

/// Something that can match request paths, fully or by prefix.
///
/// [`Pattern`] is the built-in implementation. A custom matcher can be registered
/// anywhere a pattern string is accepted.
pub trait PathMatcher: Send + Sync + 'static {
    /// The canonical text of the matcher.
    fn source(&self) -> &str;

    /// A key that two matchers share exactly when they match the same paths, used to
    /// detect duplicate routes. Defaults to [`source`](Self::source).
    fn shape(&self) -> &str {
        self.source()
    }

    /// Names of the parameters this matcher captures.
    fn param_names(&self) -> &[String];

    /// Matches the whole path.
    fn match_exact(&self, path: &str) -> Option<PathParams>;

    /// Matches a leading part of the path and hands back what is left of it.
    fn match_prefix(&self, path: &str) -> Option<PrefixMatch>;
}

/// A successful prefix match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatch {
    pub params: PathParams,
    /// The unmatched part of the path, always starting with `/`.
    pub rest: String,
}

/// Conversion into a shared [`PathMatcher`] at registration time.
pub trait IntoMatcher {
    fn into_matcher(self) -> Result<Arc<dyn PathMatcher>, RouteError>;
}

impl IntoMatcher for &str {
    fn into_matcher(self) -> Result<Arc<dyn PathMatcher>, RouteError> {
        Ok(Arc::new(Pattern::compile(self)?))
    }
}

impl IntoMatcher for String {
    fn into_matcher(self) -> Result<Arc<dyn PathMatcher>, RouteError> {
        self.as_str().into_matcher()
    }
}

impl IntoMatcher for Pattern {
    fn into_matcher(self) -> Result<Arc<dyn PathMatcher>, RouteError> {
        Ok(Arc::new(self))
    }
}

impl IntoMatcher for Arc<dyn PathMatcher> {
    fn into_matcher(self) -> Result<Arc<dyn PathMatcher>, RouteError> {
        Ok(self)
    }
}

/// Strips trailing slashes, mapping the empty path to `/`.
pub fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// A compiled path pattern.
pub struct Pattern {
    source: String,
    shape: String,
    params: Vec<String>,
    numeric: Vec<String>,
    exact: matchit::Router<()>,
    nested: Option<matchit::Router<()>>,
}

struct Translated {
    canonical: String,
    shape: String,
    route: String,
    params: Vec<String>,
    numeric: Vec<String>,
    greedy: bool,
}

impl Pattern {
    pub fn compile(source: &str) -> Result<Self, RouteError> {
        let Translated { canonical, shape, route, params, numeric, greedy } = translate(source)?;

        let mut exact = matchit::Router::new();
        exact.insert(route.as_str(), ()).map_err(|e| RouteError::invalid_pattern(source, e))?;

        // a trailing wildcard already swallows everything, so it cannot prefix anything
        let nested = if greedy {
            None
        } else {
            let mut nested_route = if route == "/" { String::new() } else { route };
            nested_route.push_str("/{*");
            nested_route.push_str(REST);
            nested_route.push('}');

            let mut nested = matchit::Router::new();
            nested.insert(nested_route, ()).map_err(|e| RouteError::invalid_pattern(source, e))?;
            Some(nested)
        };

        Ok(Self { source: canonical, shape, params, numeric, exact, nested })
    }

    fn collect<'a, I>(&self, captured: I) -> Option<PathParams>
    where
        I: Iterator<Item = (&'a str, &'a str)>,
    {
        let mut params = PathParams::empty();
        for (name, value) in captured {
            if name == REST {
                continue;
            }
            if self.numeric.iter().any(|n| n == name) && !is_number(value) {
                return None;
            }
            params.push(name, value);
        }
        Some(params)
    }
}

impl PathMatcher for Pattern {
    fn source(&self) -> &str {
        &self.source
    }

    fn shape(&self) -> &str {
        &self.shape
    }

    fn param_names(&self) -> &[String] {
        &self.params
    }

    fn match_exact(&self, path: &str) -> Option<PathParams> {
        let matched = self.exact.at(normalize_path(path)).ok()?;
        self.collect(matched.params.iter())
    }

    fn match_prefix(&self, path: &str) -> Option<PrefixMatch> {
        if let Some(params) = self.match_exact(path) {
            return Some(PrefixMatch { params, rest: "/".to_owned() });
        }

        let matched = self.nested.as_ref()?.at(normalize_path(path)).ok()?;
        let rest = format!("/{}", matched.params.get(REST)?);
        let params = self.collect(matched.params.iter())?;
        Some(PrefixMatch { params, rest })
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern").field("source", &self.source).field("params", &self.params).finish()
    }
}

fn is_number(value: &str) -> bool {
    value.parse::<f64>().is_ok_and(f64::is_finite)
}

fn translate(source: &str) -> Result<Translated, RouteError> {
    let invalid = |reason: &str| RouteError::invalid_pattern(source, reason);

    let mut normalized = String::with_capacity(source.len() + 1);
    if !source.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(source);
    let normalized = normalize_path(&normalized);

    let mut translated = Translated {
        canonical: normalized.to_owned(),
        shape: String::with_capacity(normalized.len()),
        route: String::with_capacity(normalized.len()),
        params: vec![],
        numeric: vec![],
        greedy: false,
    };

    let mut chars = normalized.chars().peekable();
    while let Some(c) = chars.next() {
        if translated.greedy {
            return Err(invalid("a wildcard parameter must come last"));
        }
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                translated.route.push_str("{{");
                translated.shape.push_str("{{");
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                translated.route.push_str("}}");
                translated.shape.push_str("}}");
            }
            '{' => {
                let mut inner = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => inner.push(ch),
                        None => return Err(invalid("unclosed '{'")),
                    }
                }

                // parameter names are erased from the shape, their kind is kept
                let (name, greedy, shape) = match inner.strip_prefix('*') {
                    Some(name) => (name, true, "{*}"),
                    None => match inner.split_once(':') {
                        None | Some((_, "string")) => (inner.split(':').next().unwrap_or_default(), false, "{}"),
                        Some((name, "number")) => {
                            translated.numeric.push(name.to_owned());
                            (name, false, "{:number}")
                        }
                        Some((_, kind)) => return Err(invalid(&format!("unknown parameter type '{kind}'"))),
                    },
                };

                if name.is_empty() || name == REST || !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
                    return Err(invalid(&format!("invalid parameter name '{name}'")));
                }
                if translated.params.iter().any(|p| p == name) {
                    return Err(invalid(&format!("parameter '{name}' appears twice")));
                }

                translated.route.push_str(if greedy { "{*" } else { "{" });
                translated.route.push_str(name);
                translated.route.push('}');
                translated.shape.push_str(shape);
                translated.params.push(name.to_owned());
                translated.greedy = greedy;
            }
            '}' => return Err(invalid("unmatched '}'")),
            other => {
                translated.route.push(other);
                translated.shape.push(other);
            }
        }
    }

    Ok(translated)
}
