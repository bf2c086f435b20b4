use thiserror::Error;

use crate::models::UnknownModeError;

/// Errors surfaced to callers of the route service.
///
/// Provider and gateway failures never appear here: they are recovered
/// inside the service with synthesized geometry or a base score.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
}

impl From<UnknownModeError> for RouteError {
    fn from(err: UnknownModeError) -> Self {
        RouteError::InvalidInput(err.to_string())
    }
}
