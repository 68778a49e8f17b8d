//! The error type shared by every fallible operation in the crate.

use crate::value::Value;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by interception, invocation and the timer host.
#[derive(Debug, Error)]
pub enum Error {
    /// A programmer error detected before any mutation took place.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A value that is not a function was invoked.
    #[error("{0} is not callable")]
    NotCallable(String),

    /// `call_method` was asked for a member the object does not have.
    #[error("object has no member `{0}`")]
    MissingMember(String),

    /// A timer was scheduled while no tokio runtime was running.
    #[error("no tokio runtime is available to drive timers")]
    NoRuntime,

    /// An error raised by user code. It travels through wrappers untouched.
    #[error("uncaught: {0:?}")]
    Thrown(Value),

    /// The configuration could not be loaded or deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Raises an arbitrary value from user code.
    pub fn thrown(value: impl Into<Value>) -> Self {
        Error::Thrown(value.into())
    }

    /// Returns `true` for the validation failures of `intercept`.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}
