//! Request validation against the [`ParameterSchema`].
//!
//! Validation is pure gatekeeping: typed values are parsed only to be
//! checked and are then discarded. Handlers re-parse the raw query with
//! their own defaults.

use thiserror::Error;

use crate::schema::{ParameterKind, ParameterSchema, ParameterSpec};

/// A contract violation in an inbound request.
///
/// Every variant except [`ValidationError::RouteNotFound`] is a client
/// error on a known route (HTTP 400).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Not found")]
    RouteNotFound,

    #[error("Parameter {0} is not recognized")]
    UnknownParameter(String),

    #[error("Parameter {0} is not a valid integer")]
    InvalidInteger(String),

    #[error("Parameter {0} is outside of permitted range")]
    OutOfRange(String),

    #[error("Parameter {0} doesn't match pattern")]
    PatternMismatch(String),

    #[error("Parameter {0} should be true or false")]
    NotABoolean(String),
}

impl ValidationError {
    /// Whether this maps to 404 rather than 400.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ValidationError::RouteNotFound)
    }
}

/// Check `query` against the parameters declared for `(route, method)`.
///
/// Parameters are checked in the order received and the first failure is
/// returned.
pub fn validate(
    schema: &ParameterSchema,
    route: &str,
    method: &str,
    query: &[(String, String)],
) -> Result<(), ValidationError> {
    let params = schema
        .lookup(route, method)
        .ok_or(ValidationError::RouteNotFound)?;

    for (name, raw) in query {
        let spec = params
            .get(name)
            .ok_or_else(|| ValidationError::UnknownParameter(name.clone()))?;
        validate_value(spec, raw)?;
    }

    Ok(())
}

fn validate_value(spec: &ParameterSpec, raw: &str) -> Result<(), ValidationError> {
    match spec.kind {
        ParameterKind::Integer => validate_integer(spec, raw),
        ParameterKind::String => validate_string(spec, raw),
        ParameterKind::Bool => validate_bool(spec, raw),
    }
}

fn validate_integer(spec: &ParameterSpec, raw: &str) -> Result<(), ValidationError> {
    let value: i64 = raw
        .parse()
        .map_err(|_| ValidationError::InvalidInteger(spec.name.clone()))?;
    match spec.minimum {
        Some(minimum) if value < minimum => Err(ValidationError::OutOfRange(spec.name.clone())),
        _ => Ok(()),
    }
}

fn validate_string(spec: &ParameterSpec, raw: &str) -> Result<(), ValidationError> {
    match &spec.pattern {
        Some(pattern) if !pattern.is_match(raw) => {
            Err(ValidationError::PatternMismatch(spec.name.clone()))
        }
        _ => Ok(()),
    }
}

fn validate_bool(spec: &ParameterSpec, raw: &str) -> Result<(), ValidationError> {
    match raw {
        "true" | "false" => Ok(()),
        _ => Err(ValidationError::NotABoolean(spec.name.clone())),
    }
}
