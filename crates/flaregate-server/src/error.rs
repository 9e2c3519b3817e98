//! The pipeline's unified error type and its mapping onto HTTP status
//! codes and the FlareSolverr response envelope.

use crate::pipeline::V1Response;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("pool exhausted while waiting for a browser")]
    PoolExhausted,

    #[error("no solver available for this challenge")]
    SolverUnavailable,

    #[error("solver timed out")]
    SolverTimeout,

    #[error("solver failed: {0}")]
    SolverFailed(String),

    #[error("solver reported insufficient funds")]
    InsufficientFunds,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("driver error: {0}")]
    DriverError(String),

    #[error("component closed during operation")]
    Closed,
}

impl GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
            Self::SolverUnavailable
            | Self::SolverFailed(_)
            | Self::InsufficientFunds
            | Self::DriverError(_)
            | Self::Closed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SolverTimeout | Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<flaregate_pool::PoolError> for GatewayError {
    fn from(e: flaregate_pool::PoolError) -> Self {
        match e {
            flaregate_pool::PoolError::Closed => Self::Closed,
            flaregate_pool::PoolError::Cancelled => Self::DeadlineExceeded,
            flaregate_pool::PoolError::Driver(e) => Self::DriverError(e.to_string()),
        }
    }
}

impl From<flaregate_session::SessionError> for GatewayError {
    fn from(e: flaregate_session::SessionError) -> Self {
        use flaregate_session::SessionError as S;
        match e {
            S::Closed => Self::Closed,
            S::Cancelled => Self::DeadlineExceeded,
            S::MaxSessionsReached => Self::Conflict("maximum session count reached".to_string()),
            S::SessionExists(name) => Self::Conflict(format!("session '{name}' already exists")),
            S::SessionNotFound(name) => Self::NotFound(format!("session '{name}' not found")),
            S::SessionInUse(name) => Self::Conflict(format!("session '{name}' is in use")),
            S::Driver(e) => Self::DriverError(e.to_string()),
            S::Db(e) => Self::DriverError(e.to_string()),
        }
    }
}

impl From<flaregate_challenge::ChallengeError> for GatewayError {
    fn from(e: flaregate_challenge::ChallengeError) -> Self {
        use flaregate_challenge::ChallengeError as C;
        match e {
            C::Driver(e) => Self::DriverError(e.to_string()),
            C::NoSolverAvailable(_) => Self::SolverUnavailable,
            C::SolverTimeout(_) => Self::SolverTimeout,
            C::SolverFailed { solver, reason } => {
                Self::SolverFailed(format!("{solver}: {reason}"))
            }
            C::InsufficientFunds(_) => Self::InsufficientFunds,
            C::ProviderTerminal { provider, message } => {
                Self::SolverFailed(format!("{provider}: {message}"))
            }
            C::ProviderTransient { provider, message } => {
                Self::SolverFailed(format!("{provider}: {message}"))
            }
            C::Http(e) => Self::DriverError(e.to_string()),
        }
    }
}

impl From<flaregate_auth::AuthError> for GatewayError {
    fn from(e: flaregate_auth::AuthError) -> Self {
        Self::Unauthenticated(e.to_string())
    }
}

impl From<flaregate_core::Error> for GatewayError {
    fn from(e: flaregate_core::Error) -> Self {
        Self::DriverError(e.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = V1Response::error(self.to_string());
        (status, Json(body)).into_response()
    }
}
