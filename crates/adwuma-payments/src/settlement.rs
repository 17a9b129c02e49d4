//! Escrow settlement against the gateway
//!
//! Lifecycle state commits first; this processor mirrors the money side.
//! The charge funding an escrow lock and the refund unwinding one are each
//! a `Transaction` under a deterministic reference, so a failed or
//! timed-out call is retried later under the same reference and the
//! provider deduplicates. A gateway failure here never unwinds the
//! lifecycle transition that triggered it.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use adwuma_common::{AdwumaError, Result};
use adwuma_engine::{MarketStore, Task, TaskEvent, TaskEventKind};

use crate::gateway::PaymentGateway;
use crate::store::PaymentStore;
use crate::transaction::{reference_for, Transaction, TransactionKind, TransactionStatus};

/// Drives gateway charges and refunds for escrow state changes
pub struct SettlementProcessor {
    market: Arc<dyn MarketStore>,
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl SettlementProcessor {
    pub fn new(
        market: Arc<dyn MarketStore>,
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            market,
            payments,
            gateway,
        }
    }

    /// Charge the client's rail for a freshly locked escrow
    ///
    /// Idempotent: a completed charge for the task returns the existing
    /// transaction without touching the gateway again.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn charge_for_assignment(&self, task: &Task) -> Result<Transaction> {
        let reference = reference_for(TransactionKind::Payment, task.id);
        self.run(
            task,
            TransactionKind::Payment,
            task.price_gross,
            task.client_id,
            reference,
        )
        .await
    }

    /// Return the full gross to the client for a refunded escrow
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn refund_for_cancellation(&self, task: &Task) -> Result<Transaction> {
        let escrow = self
            .market
            .escrow(task.id)
            .await?
            .ok_or_else(|| AdwumaError::Internal(format!("no escrow to refund for {}", task.id)))?;

        let reference = reference_for(TransactionKind::Refund, task.id);
        self.run(
            task,
            TransactionKind::Refund,
            escrow.amount_gross,
            task.client_id,
            reference,
        )
        .await
    }

    /// Record the platform's commission retained at escrow release
    ///
    /// The commission never leaves the platform account, so this is a
    /// gateway-free transaction that completes immediately. Idempotent per
    /// task.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn record_platform_fee(&self, task: &Task) -> Result<Transaction> {
        let reference = reference_for(TransactionKind::PlatformFee, task.id);
        if let Some(existing) = self.payments.transaction_by_reference(&reference).await? {
            return Ok(existing);
        }

        let escrow = self
            .market
            .escrow(task.id)
            .await?
            .ok_or_else(|| AdwumaError::Internal(format!("no escrow released for {}", task.id)))?;

        let mut tx = Transaction::new(
            TransactionKind::PlatformFee,
            escrow.platform_fee,
            Some(task.id),
            task.client_id,
            task.payment_method.provider,
            reference,
        );
        tx.settle_internal();
        self.payments.upsert_transaction(tx.clone()).await?;

        info!(task_id = %task.id, amount = %tx.amount, "Platform fee recorded");
        Ok(tx)
    }

    /// Retry a previously failed charge or refund under its original reference
    pub async fn retry(&self, task: &Task, kind: TransactionKind) -> Result<Transaction> {
        match kind {
            TransactionKind::Payment => self.charge_for_assignment(task).await,
            TransactionKind::Refund => self.refund_for_cancellation(task).await,
            _ => Err(AdwumaError::Internal(format!(
                "settlement does not own {kind:?} movements"
            ))),
        }
    }

    async fn run(
        &self,
        task: &Task,
        kind: TransactionKind,
        amount: Decimal,
        actor_id: Uuid,
        reference: String,
    ) -> Result<Transaction> {
        // A completed movement under this reference is already settled
        let mut tx = match self.payments.transaction_by_reference(&reference).await? {
            Some(existing) if existing.status == TransactionStatus::Completed => {
                return Ok(existing);
            }
            Some(existing) => existing,
            None => Transaction::new(
                kind,
                amount,
                Some(task.id),
                actor_id,
                task.payment_method.provider,
                reference.clone(),
            ),
        };

        tx.mark_processing();
        self.payments.upsert_transaction(tx.clone()).await?;

        let outcome = match kind {
            TransactionKind::Payment => {
                self.gateway
                    .charge(amount, &task.payment_method, &reference)
                    .await
            }
            TransactionKind::Refund => self.gateway.refund(amount, &reference).await,
            _ => unreachable!("settlement only runs payments and refunds"),
        };

        match outcome {
            Ok(receipt) => {
                tx.complete(receipt.provider_ref);
                self.payments.upsert_transaction(tx.clone()).await?;

                let kind_event = match kind {
                    TransactionKind::Payment => TaskEventKind::ChargeCompleted {
                        reference: reference.clone(),
                        amount,
                    },
                    _ => TaskEventKind::RefundCompleted {
                        reference: reference.clone(),
                        amount,
                    },
                };
                self.market
                    .append_event(TaskEvent::new(task.id, kind_event, actor_id))
                    .await?;
                Ok(tx)
            }
            Err(error) => {
                tx.fail();
                self.payments.upsert_transaction(tx).await?;

                let kind_event = match kind {
                    TransactionKind::Payment => TaskEventKind::ChargeFailed {
                        reference: reference.clone(),
                        reason: error.to_string(),
                    },
                    _ => TaskEventKind::RefundFailed {
                        reference: reference.clone(),
                        reason: error.to_string(),
                    },
                };
                self.market
                    .append_event(TaskEvent::new(task.id, kind_event, actor_id))
                    .await?;

                warn!(
                    task_id = %task.id,
                    reference = %reference,
                    error = %error,
                    "Settlement call failed; transaction left FAILED for retry"
                );
                Err(error.into())
            }
        }
    }
}
