//! Error kinds for configuration transformation.
//!
//! Public entrypoints return `failure::Fallible`, layering context on top
//! of a `ConfigError`. Callers that need to react to a specific kind can
//! recover it from the chain with `config_error`.

use failure::Fail;

/// Failure kinds surfaced by readers, enricher and serializer.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum ConfigError {
    /// Topology facts describe a platform this transformer does not handle.
    #[fail(display = "invalid platform, expected to be {}, found '{}'", expected, found)]
    Boundary { expected: String, found: String },

    /// Raw configuration is zero-length.
    #[fail(display = "vSphere config is empty")]
    EmptyInput,

    /// Malformed text, in either format.
    #[fail(display = "line {}: {}: '{}'", line, reason, token)]
    Parse {
        line: usize,
        token: String,
        reason: String,
    },

    /// A scalar field failed type or range coercion.
    #[fail(display = "{}: {}", scope, reason)]
    FieldCoercion { scope: String, reason: String },

    /// Canonical model could not be serialized.
    #[fail(display = "can not marshal config into yaml: {}", _0)]
    Serialization(String),
}

impl ConfigError {
    pub(crate) fn parse<T, R>(line: usize, token: T, reason: R) -> Self
    where
        T: Into<String>,
        R: Into<String>,
    {
        ConfigError::Parse {
            line,
            token: token.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn coercion<S, R>(scope: S, reason: R) -> Self
    where
        S: Into<String>,
        R: Into<String>,
    {
        ConfigError::FieldCoercion {
            scope: scope.into(),
            reason: reason.into(),
        }
    }
}

/// Find the innermost `ConfigError` in an error chain, if any.
pub fn config_error(err: &failure::Error) -> Option<&ConfigError> {
    err.iter_chain()
        .filter_map(|cause| cause.downcast_ref::<ConfigError>())
        .last()
}
