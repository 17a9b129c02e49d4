//! Money-movement records
//!
//! Every gateway interaction is mirrored by a `Transaction` row keyed by a
//! deterministic idempotency reference, so an explicit retry of the same
//! logical movement reuses the same reference and the provider deduplicates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adwuma_common::PaymentProvider;

/// What a transaction moves money for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Client charge funding an escrow lock
    Payment,
    /// Transfer of released earnings to a tasker
    Payout,
    /// Return of a charge to the client
    Refund,
    /// Platform commission sweep
    PlatformFee,
}

impl TransactionKind {
    fn tag(self) -> &'static str {
        match self {
            TransactionKind::Payment => "payment",
            TransactionKind::Payout => "payout",
            TransactionKind::Refund => "refund",
            TransactionKind::PlatformFee => "platform_fee",
        }
    }
}

/// Transaction processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// A single money movement against the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub status: TransactionStatus,
    /// Absent for payouts spanning multiple tasks
    pub task_id: Option<Uuid>,
    /// The client or tasker the movement is for
    pub actor_id: Uuid,
    pub provider: PaymentProvider,
    /// Idempotency key; stable across retries of the same movement
    pub reference: String,
    /// Provider-side id, set on completion
    pub provider_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(
        kind: TransactionKind,
        amount: Decimal,
        task_id: Option<Uuid>,
        actor_id: Uuid,
        provider: PaymentProvider,
        reference: String,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            amount,
            status: TransactionStatus::Pending,
            task_id,
            actor_id,
            provider,
            reference,
            provider_ref: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn mark_processing(&mut self) {
        self.status = TransactionStatus::Processing;
    }

    pub fn complete(&mut self, provider_ref: String) {
        self.status = TransactionStatus::Completed;
        self.provider_ref = Some(provider_ref);
        self.completed_at = Some(Utc::now());
    }

    /// Complete a movement that never leaves the platform account
    /// (commission retention has no gateway leg)
    pub fn settle_internal(&mut self) {
        self.status = TransactionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.status = TransactionStatus::Failed;
    }
}

/// Deterministic idempotency reference for a logical money movement
///
/// Derived from the movement kind and its owning entity id, so every retry
/// of the same movement lands on the same reference.
pub fn reference_for(kind: TransactionKind, id: Uuid) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.tag().as_bytes());
    hasher.update(id.as_bytes());
    hex::encode(&hasher.finalize().as_bytes()[..16])
}
