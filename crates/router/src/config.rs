//! Router behavior switches.
//!
//! [`RouterConfig`] can be built in code or deserialized from any serde format:
//!
//! ```
//! # use micro_router::{DuplicateRoutePolicy, RouterConfig};
//! let config: RouterConfig = serde_json::from_str(r#"{ "method_not_allowed": true }"#).unwrap();
//! assert!(config.catch_errors());
//! assert!(config.method_not_allowed());
//! assert_eq!(config.duplicate_routes(), DuplicateRoutePolicy::Reject);
//! ```

use serde::Deserialize;

/// What registering the same pattern and method twice in one namespace does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateRoutePolicy {
    /// fail with [`RouteError::DuplicateRoute`](crate::RouteError::DuplicateRoute)
    #[default]
    Reject,
    /// log a warning, the route registered first keeps matching
    Warn,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    catch_errors: bool,
    method_not_allowed: bool,
    duplicate_routes: DuplicateRoutePolicy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { catch_errors: true, method_not_allowed: false, duplicate_routes: DuplicateRoutePolicy::Reject }
    }
}

impl RouterConfig {
    /// Whether a chain that fails without responding is answered with a 500.
    /// When off, the failure is returned to the caller of `Router::handle`.
    pub fn catch_errors(&self) -> bool {
        self.catch_errors
    }

    /// Whether a path that matches only under other methods is answered with a 405
    /// instead of going to the not-found handler.
    pub fn method_not_allowed(&self) -> bool {
        self.method_not_allowed
    }

    pub fn duplicate_routes(&self) -> DuplicateRoutePolicy {
        self.duplicate_routes
    }

    pub fn with_catch_errors(mut self, catch_errors: bool) -> Self {
        self.catch_errors = catch_errors;
        self
    }

    pub fn with_method_not_allowed(mut self, method_not_allowed: bool) -> Self {
        self.method_not_allowed = method_not_allowed;
        self
    }

    pub fn with_duplicate_routes(mut self, policy: DuplicateRoutePolicy) -> Self {
        self.duplicate_routes = policy;
        self
    }
}
