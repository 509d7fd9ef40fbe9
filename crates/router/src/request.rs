//! Request types seen by handlers.
//!
//! - [`Request`]: an `http::Request` carrying a shareable [`RequestBody`]
//! - [`PathParams`]: the named path segments captured while resolving a route

use crate::body::RequestBody;
use std::str::FromStr;

/// The request type flowing through a chain.
pub type Request = http::Request<RequestBody>;

/// Builds a copy of `request` with a different body.
///
/// Method, uri, version and headers are carried over. Extensions are not.
pub fn with_body(request: &Request, body: RequestBody) -> Request {
    let mut rebuilt = http::Request::new(body);
    *rebuilt.method_mut() = request.method().clone();
    *rebuilt.uri_mut() = request.uri().clone();
    *rebuilt.version_mut() = request.version();
    *rebuilt.headers_mut() = request.headers().clone();
    rebuilt
}

/// Represents path parameters extracted from the URL path of an HTTP request.
///
/// Parameters captured by enclosing namespaces come first, followed by the ones
/// captured by the route itself. For example, resolving "/users/42/posts/7" against a
/// "/users/{id}" namespace holding "/posts/{post}" yields `id = 42, post = 7`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.entries.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    /// Parses a parameter, returning None when it is missing or malformed.
    pub fn parse<T: FromStr>(&self, key: impl AsRef<str>) -> Option<T> {
        self.get(key)?.parse().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Appends the parameters captured further down the graph.
    pub(crate) fn merge(mut self, inner: PathParams) -> Self {
        self.entries.extend(inner.entries);
        self
    }
}

impl FromIterator<(String, String)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}
