//! Error types for route registration, request chain execution and body access.
//!
//! [`ChainError`] covers everything that can surface from a running chain: the usage
//! faults raised by the lifecycle engine itself and the errors returned by handlers.
//! [`RouteError`] is returned while a [`Router`](crate::Router) is being assembled.

use std::any::Any;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

/// The error type handler and middleware bodies return.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Faults and errors observed while a request chain runs.
///
/// The type is `Clone` because a settlement can be read by several parties
/// (the enclosing layer, its own implicit settlement and the dispatcher).
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    #[error("a response has already been committed for this context")]
    ResponseAlreadyCommitted,

    #[error("the context has already settled without a response")]
    ContextSettled,

    #[error("the handler must respond before exiting")]
    HandlerDidNotRespond,

    #[error("the middleware must call proceed or respond before exiting")]
    MiddlewareDidNotProceed,

    #[error("proceed was called more than once")]
    TooManyProceedCalls,

    #[error("await_downstream_settled was called before proceed")]
    ProceedNotYetCalled,

    #[error("data key '{key}' has already been set by an enclosing layer")]
    DataKeyConflict { key: String },

    #[error("control flow break")]
    ControlFlowBreak,

    #[error("handler panicked: {message}")]
    Panicked { message: String },

    #[error("handler error: {source}")]
    Handler { source: Arc<dyn Error + Send + Sync> },
}

impl ChainError {
    /// Wraps an arbitrary handler error.
    ///
    /// A `ChainError` that was boxed on its way out of a handler (e.g. through `?`)
    /// is recovered as itself instead of being nested.
    pub fn from_boxed(error: BoxError) -> Self {
        match error.downcast::<ChainError>() {
            Ok(chain_error) => *chain_error,
            Err(other) => Self::Handler { source: Arc::from(other) },
        }
    }

    pub fn handler<E: Into<BoxError>>(error: E) -> Self {
        Self::from_boxed(error.into())
    }

    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_owned()
        };
        Self::Panicked { message }
    }

    pub(crate) fn data_key_conflict<S: ToString>(key: S) -> Self {
        Self::DataKeyConflict { key: key.to_string() }
    }

    /// Returns true for the usage faults raised by the engine itself, as opposed to
    /// errors produced by handler code.
    pub fn is_usage_fault(&self) -> bool {
        !matches!(self, Self::Handler { .. } | Self::Panicked { .. } | Self::ControlFlowBreak)
    }
}

impl From<BoxError> for ChainError {
    fn from(error: BoxError) -> Self {
        Self::from_boxed(error)
    }
}

/// Errors raised while registering routes, middleware and namespaces.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("namespace '{prefix}' is locked: middleware must be added before any route or namespace")]
    LockedNamespace { prefix: String },

    #[error("duplicate route: {method} {pattern}")]
    DuplicateRoute { method: String, pattern: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("parameter '{name}' in '{pattern}' is already captured by an enclosing namespace")]
    DuplicateParam { name: String, pattern: String },

    #[error("invalid http method: {method}")]
    InvalidMethod { method: String },
}

impl RouteError {
    pub fn locked_namespace<S: ToString>(prefix: S) -> Self {
        Self::LockedNamespace { prefix: prefix.to_string() }
    }

    pub fn duplicate_route<M: ToString, P: ToString>(method: M, pattern: P) -> Self {
        Self::DuplicateRoute { method: method.to_string(), pattern: pattern.to_string() }
    }

    pub fn invalid_pattern<P: ToString, R: ToString>(pattern: P, reason: R) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }

    pub fn duplicate_param<N: ToString, P: ToString>(name: N, pattern: P) -> Self {
        Self::DuplicateParam { name: name.to_string(), pattern: pattern.to_string() }
    }

    pub fn invalid_method<S: ToString>(method: S) -> Self {
        Self::InvalidMethod { method: method.to_string() }
    }
}

/// Errors raised while consuming a request body.
#[derive(Error, Debug)]
pub enum BodyError {
    #[error("body has been consumed")]
    Consumed,

    #[error("failed to read body: {source}")]
    Read { source: BoxError },

    #[error("request body is not utf8")]
    NotUtf8,

    #[error("expected content type application/json")]
    NotJson,

    #[error("invalid json body: {source}")]
    Json { source: serde_json::Error },
}

impl BodyError {
    pub fn read<E: Into<BoxError>>(e: E) -> Self {
        Self::Read { source: e.into() }
    }

    pub fn json(source: serde_json::Error) -> Self {
        Self::Json { source }
    }
}
