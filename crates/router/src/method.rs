//! HTTP method normalization and the method sets routes are registered under.

use crate::error::RouteError;
use http::Method;
use std::fmt;

/// Uppercases a method so that `get` and `GET` address the same routes.
pub fn normalize(method: &Method) -> Method {
    let name = method.as_str();
    if !name.bytes().any(|b| b.is_ascii_lowercase()) {
        return method.clone();
    }
    Method::from_bytes(name.to_ascii_uppercase().as_bytes()).unwrap_or_else(|_| method.clone())
}

/// The methods a route answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    Any,
    Only(Vec<Method>),
}

impl MethodSet {
    pub fn contains(&self, method: &Method) -> bool {
        match self {
            MethodSet::Any => true,
            MethodSet::Only(methods) => methods.contains(method),
        }
    }

    /// The methods both sets answer to, `None` when they are disjoint.
    pub fn overlap(&self, other: &MethodSet) -> Option<MethodSet> {
        match (self, other) {
            (MethodSet::Any, set) | (set, MethodSet::Any) => Some(set.clone()),
            (MethodSet::Only(left), MethodSet::Only(right)) => {
                let shared: Vec<_> = left.iter().filter(|m| right.contains(m)).cloned().collect();
                if shared.is_empty() { None } else { Some(MethodSet::Only(shared)) }
            }
        }
    }

    /// The listed methods, empty for [`MethodSet::Any`].
    pub fn methods(&self) -> &[Method] {
        match self {
            MethodSet::Any => &[],
            MethodSet::Only(methods) => methods,
        }
    }

    fn only<I: IntoIterator<Item = Method>>(methods: I) -> Self {
        let mut normalized: Vec<Method> = Vec::new();
        for method in methods {
            let method = normalize(&method);
            if !normalized.contains(&method) {
                normalized.push(method);
            }
        }
        MethodSet::Only(normalized)
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodSet::Any => f.write_str("*"),
            MethodSet::Only(methods) => {
                let names: Vec<_> = methods.iter().map(Method::as_str).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

/// Conversion into a [`MethodSet`] at registration time.
///
/// The string `"*"` stands for any method.
pub trait IntoMethodSet {
    fn into_method_set(self) -> Result<MethodSet, RouteError>;
}

impl IntoMethodSet for MethodSet {
    fn into_method_set(self) -> Result<MethodSet, RouteError> {
        match self {
            MethodSet::Any => Ok(MethodSet::Any),
            MethodSet::Only(methods) => Ok(MethodSet::only(methods)),
        }
    }
}

impl IntoMethodSet for Method {
    fn into_method_set(self) -> Result<MethodSet, RouteError> {
        Ok(MethodSet::only([self]))
    }
}

impl IntoMethodSet for &str {
    fn into_method_set(self) -> Result<MethodSet, RouteError> {
        if self == "*" {
            return Ok(MethodSet::Any);
        }
        let method = Method::from_bytes(self.to_ascii_uppercase().as_bytes()).map_err(|_| RouteError::invalid_method(self))?;
        Ok(MethodSet::only([method]))
    }
}

impl IntoMethodSet for Vec<Method> {
    fn into_method_set(self) -> Result<MethodSet, RouteError> {
        Ok(MethodSet::only(self))
    }
}

impl<const N: usize> IntoMethodSet for [Method; N] {
    fn into_method_set(self) -> Result<MethodSet, RouteError> {
        Ok(MethodSet::only(self))
    }
}

impl<const N: usize> IntoMethodSet for [&str; N] {
    fn into_method_set(self) -> Result<MethodSet, RouteError> {
        let mut methods = Vec::with_capacity(N);
        for name in self {
            match name.into_method_set()? {
                MethodSet::Any => return Ok(MethodSet::Any),
                MethodSet::Only(only) => methods.extend(only),
            }
        }
        Ok(MethodSet::only(methods))
    }
}
