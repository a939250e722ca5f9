//! Error types.
//!
//! Client-input failures (missing or malformed parameters) never leave the
//! router as `Error`s: [`Router::resolve`](crate::Router::resolve) turns them
//! into `400` responses. The types here describe *why* binding failed, why a
//! route could not be registered, or why the server could not start.

use thiserror::Error;

use crate::bundle::ParamSource;

/// Infrastructure failure: binding the listener, accepting a connection or
/// loading configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

/// Failure to convert a raw value into its declared type.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum CoercionError {
    /// The value does not have the shape of the declared type, or the type
    /// name does not resolve to a known descriptor.
    #[error("wrong type")]
    WrongType,

    #[error("invalid json")]
    InvalidJson,

    /// A required field of a composite type is absent.
    #[error("missing field `{0}`")]
    MissingField(String),
}

/// Outcome of a route that did not produce a handler result.
///
/// The first two variants are structural mismatches: the router silently
/// moves on to the next route. The last two are client errors that stop the
/// search.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RouteError {
    #[error("wrong method")]
    WrongMethod,

    #[error("wrong path")]
    WrongPath,

    #[error("missing {location} parameter `{name}`")]
    MissingParam { location: ParamSource, name: String },

    #[error("wrong type for {location} parameter `{name}`: {cause}")]
    WrongParamType {
        location: ParamSource,
        name: String,
        #[source]
        cause: CoercionError,
    },
}

impl RouteError {
    /// `true` when the route simply does not apply to the request.
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::WrongMethod | Self::WrongPath)
    }
}

/// A route template that cannot be registered.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RegistrationError {
    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("invalid placeholder `{0}`")]
    InvalidPlaceholder(String),

    #[error("placeholder `{0}` appears more than once")]
    DuplicatePlaceholder(String),

    #[error("constraint for `{name}` is not a valid pattern: {reason}")]
    InvalidPattern { name: String, reason: String },
}

/// Configuration that could not be read or parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
