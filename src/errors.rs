// Error types and error handling module
// This file defines the router error taxonomy, the pool capability errors
// and the enumerated route overwrite violations
//
// Numan Thabit 2025 Nov

use std::fmt;
use thiserror::Error;

/// Coarse error class used by callers (transport, metrics) to decide handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Validation,
    NotFound,
    Computation,
    Cancelled,
    Internal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Validation => "validation",
            ErrorClass::NotFound => "not_found",
            ErrorClass::Computation => "computation",
            ErrorClass::Cancelled => "cancelled",
            ErrorClass::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid route overwrite: {}", OverwriteViolations(.0))]
    InvalidOverwrite(Vec<OverwriteViolation>),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("cache miss for {token_in} -> {token_out}")]
    CacheMiss { token_in: String, token_out: String },
    #[error("computation error: {0}")]
    Computation(String),
    #[error("request cancelled: {0}")]
    Cancelled(String),
    #[error("internal invariant violated: {0}")]
    Internal(String),
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl RouterError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RouterError::Validation(_) | RouterError::InvalidOverwrite(_) => ErrorClass::Validation,
            RouterError::NotFound(_) | RouterError::CacheMiss { .. } => ErrorClass::NotFound,
            RouterError::Computation(_) => ErrorClass::Computation,
            RouterError::Cancelled(_) => ErrorClass::Cancelled,
            RouterError::Internal(_) | RouterError::Persistence(_) => ErrorClass::Internal,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RouterError::Cancelled(_))
    }

    /// Logs and builds an internal invariant error. These indicate bugs and are
    /// never swallowed.
    pub fn internal(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!(error = %msg, "internal invariant violated");
        RouterError::Internal(msg)
    }
}

impl From<PoolError> for RouterError {
    fn from(err: PoolError) -> Self {
        RouterError::Computation(err.to_string())
    }
}

impl From<std::io::Error> for RouterError {
    fn from(err: std::io::Error) -> Self {
        RouterError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::Persistence(err.to_string())
    }
}

/// Failures raised by a pool's swap capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool {pool_id}: insufficient liquidity for {denom}")]
    InsufficientLiquidity { pool_id: u64, denom: String },
    #[error("pool {pool_id}: denom {denom} not in pool")]
    DenomNotInPool { pool_id: u64, denom: String },
    #[error("pool {pool_id}: arithmetic overflow")]
    Overflow { pool_id: u64 },
    #[error("pool {pool_id}: {reason}")]
    Other { pool_id: u64, reason: String },
}

/// A single reason an overwrite submission was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverwriteViolation {
    NoRoutes,
    EmptyRoute { route_index: usize },
    PoolNotFound { route_index: usize, pool_id: u64 },
    DenomNotInPool { route_index: usize, pool_id: u64, denom: String },
    RepeatedPool { route_index: usize, pool_id: u64 },
    TokenOutMismatch { route_index: usize, expected: String, actual: String },
}

impl fmt::Display for OverwriteViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverwriteViolation::NoRoutes => write!(f, "routes cannot be empty"),
            OverwriteViolation::EmptyRoute { route_index } => {
                write!(f, "route {route_index} has no pools")
            }
            OverwriteViolation::PoolNotFound { route_index, pool_id } => {
                write!(f, "pool {pool_id} of route {route_index} not found")
            }
            OverwriteViolation::DenomNotInPool { route_index, pool_id, denom } => {
                write!(f, "denom {denom} not found in pool {pool_id} of route {route_index}")
            }
            OverwriteViolation::RepeatedPool { route_index, pool_id } => {
                write!(f, "pool {pool_id} repeats within route {route_index}")
            }
            OverwriteViolation::TokenOutMismatch { route_index, expected, actual } => write!(
                f,
                "route {route_index} ends in {actual}, expected {expected}"
            ),
        }
    }
}

struct OverwriteViolations<'a>(&'a [OverwriteViolation]);

impl fmt::Display for OverwriteViolations<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

pub type RouterResult<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_violations_render_in_order() {
        let err = RouterError::InvalidOverwrite(vec![
            OverwriteViolation::PoolNotFound { route_index: 0, pool_id: 7 },
            OverwriteViolation::TokenOutMismatch {
                route_index: 1,
                expected: "uusdc".into(),
                actual: "uatom".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "invalid route overwrite: pool 7 of route 0 not found; route 1 ends in uatom, expected uusdc"
        );
        assert_eq!(err.class(), ErrorClass::Validation);
    }

    #[test]
    fn pool_errors_become_computation_errors() {
        let err: RouterError = PoolError::InsufficientLiquidity {
            pool_id: 3,
            denom: "uosmo".into(),
        }
        .into();
        assert_eq!(err.class(), ErrorClass::Computation);
    }
}
