//! Error types for the Adwuma core
//!
//! Provides a unified error type and domain-specific error variants

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::types::actor::ActorRole;

/// Result type alias using AdwumaError
pub type Result<T> = std::result::Result<T, AdwumaError>;

/// Unified error type for Adwuma operations
#[derive(Debug, Error)]
pub enum AdwumaError {
    // Task lifecycle errors
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    // Escrow ledger errors
    #[error("Escrow error: {0}")]
    Escrow(#[from] EscrowError),

    // Payout errors
    #[error("Payout error: {0}")]
    Payout(#[from] PayoutError),

    // Payment gateway errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Task lifecycle errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Stale version: expected {expected}, found {found}")]
    StaleVersion { expected: u64, found: u64 },

    #[error("Actor {actor} ({role}) is not authorized for this transition")]
    UnauthorizedActor { actor: Uuid, role: ActorRole },

    #[error("Invalid task: {0}")]
    Invalid(String),
}

/// Escrow ledger errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EscrowError {
    #[error("Escrow not found for task {0}")]
    NotFound(Uuid),

    #[error("Escrow already exists for task {0}")]
    DuplicateEscrow(Uuid),

    #[error("Escrow for task {task_id} is {status}, cannot {operation}")]
    InvalidEscrowState {
        task_id: Uuid,
        status: String,
        operation: &'static str,
    },

    #[error("Balance conservation violated for task {task_id}: gross {gross}, parts {parts}")]
    ConservationViolated {
        task_id: Uuid,
        gross: Decimal,
        parts: Decimal,
    },
}

/// Payout processing errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PayoutError {
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Payout amount {requested} is below the minimum of {minimum}")]
    BelowMinimumPayout {
        requested: Decimal,
        minimum: Decimal,
    },

    #[error("Payout request not found: {0}")]
    NotFound(Uuid),

    #[error("Payout {0} is still in flight and cannot be retried")]
    NotRetryable(Uuid),

    #[error("Amount must be positive")]
    InvalidAmount,
}

/// Payment gateway errors
///
/// Timeouts are retryable with the same idempotency reference; rejections
/// are terminal and require manual intervention.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Gateway call timed out after {elapsed_ms}ms (reference {reference})")]
    Timeout { reference: String, elapsed_ms: u64 },

    #[error("Gateway rejected {reference}: {reason}")]
    Rejected { reference: String, reason: String },
}

impl GatewayError {
    /// Whether a caller may retry the call with the same reference
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }
}

// Implement From for common external error types
impl From<serde_json::Error> for AdwumaError {
    fn from(err: serde_json::Error) -> Self {
        AdwumaError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AdwumaError {
    fn from(err: std::io::Error) -> Self {
        AdwumaError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for AdwumaError {
    fn from(err: anyhow::Error) -> Self {
        AdwumaError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let id = Uuid::now_v7();
        let err = AdwumaError::Task(TaskError::NotFound(id));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_stale_version_display() {
        let err = TaskError::StaleVersion {
            expected: 3,
            found: 4,
        };
        assert!(err.to_string().contains("expected 3"));
        assert!(err.to_string().contains("found 4"));
    }

    #[test]
    fn test_payout_balance_display() {
        let err = PayoutError::InsufficientBalance {
            requested: dec!(200),
            available: dec!(132.75),
        };
        assert!(err.to_string().contains("132.75"));
    }

    #[test]
    fn test_gateway_retryability() {
        let timeout = GatewayError::Timeout {
            reference: "ref-1".into(),
            elapsed_ms: 5000,
        };
        let rejected = GatewayError::Rejected {
            reference: "ref-1".into(),
            reason: "insufficient funds".into(),
        };
        assert!(timeout.is_retryable());
        assert!(!rejected.is_retryable());
    }
}
