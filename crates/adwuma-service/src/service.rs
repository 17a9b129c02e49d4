//! The Marketplace facade
//!
//! Wires the lifecycle, settlement, and payout components over shared
//! stores and exposes the operations the UI/API layer consumes. Lifecycle
//! state always commits before money moves: a gateway failure after a
//! transition is logged and left as a FAILED transaction for retry, never
//! unwound.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use adwuma_common::{Actor, PaymentMethodRef, Result};
use adwuma_engine::{
    DisputeDecision, EscrowAccount, EscrowStatus, MarketStore, MemoryStore, NewTask,
    NotificationSink, Task, TaskEvent, TaskLifecycle, TaskStatus,
};
use adwuma_payments::{
    MemoryPaymentStore, MockGateway, PaymentGateway, PaymentStore, PayoutProcessor, PayoutRequest,
    SettlementProcessor, TimeoutGateway, Transaction, TransactionKind,
};
use rust_decimal::Decimal;

use crate::config::AdwumaConfig;

/// The assembled settlement core
pub struct Marketplace {
    lifecycle: TaskLifecycle,
    settlement: SettlementProcessor,
    payouts: PayoutProcessor,
    payments: Arc<dyn PaymentStore>,
}

impl Marketplace {
    /// Assemble the core over caller-provided stores, gateway, and sink
    pub fn new(
        config: &AdwumaConfig,
        market: Arc<dyn MarketStore>,
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(TimeoutGateway::new(
            gateway,
            Duration::from_millis(config.gateway_timeout_ms),
        ));

        Self {
            lifecycle: TaskLifecycle::new(market.clone(), sink),
            settlement: SettlementProcessor::new(market.clone(), payments.clone(), gateway.clone()),
            payouts: PayoutProcessor::new(market, payments.clone(), gateway, config.min_payout),
            payments,
        }
    }

    /// Fully in-memory assembly: memory stores and a mock gateway
    ///
    /// Returns the mock handle so tests can script outcomes and count
    /// transfers.
    pub fn in_memory(
        config: &AdwumaConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> (Self, Arc<MockGateway>) {
        let gateway = MockGateway::shared();
        let marketplace = Self::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryPaymentStore::new()),
            Arc::new(gateway.clone()),
            sink,
        );
        (marketplace, gateway)
    }

    /// Post a new task
    pub async fn create_task(&self, new: NewTask) -> Result<Task> {
        self.lifecycle.create_task(new).await
    }

    /// Apply a status transition, then settle any money movement it implies
    ///
    /// The returned task reflects the committed transition even when the
    /// settlement call fails; the failed transaction stays retryable under
    /// its reference via [`Self::retry_settlement`].
    pub async fn transition_task(
        &self,
        task_id: Uuid,
        target: TaskStatus,
        actor: Actor,
        expected_version: u64,
        note: Option<String>,
    ) -> Result<Task> {
        let task = self
            .lifecycle
            .transition(task_id, target, actor, expected_version, note)
            .await?;

        self.settle_after_transition(&task).await;
        Ok(task)
    }

    /// Resolve a disputed task by admin decision
    pub async fn review_dispute(
        &self,
        task_id: Uuid,
        decision: DisputeDecision,
        admin: Actor,
    ) -> Result<Task> {
        let task = self.lifecycle.review_dispute(task_id, decision, admin).await?;
        self.settle_after_transition(&task).await;
        Ok(task)
    }

    /// Request a payout of released earnings
    pub async fn request_payout(
        &self,
        tasker_id: Uuid,
        amount: Decimal,
        method: PaymentMethodRef,
    ) -> Result<PayoutRequest> {
        self.payouts.request_payout(tasker_id, amount, method).await
    }

    /// Retry a FAILED payout under its original reference
    pub async fn retry_payout(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        self.payouts.retry_payout(payout_id).await
    }

    /// Retry a failed escrow charge or refund for a task
    pub async fn retry_settlement(
        &self,
        task_id: Uuid,
        kind: TransactionKind,
    ) -> Result<Transaction> {
        let task = self.lifecycle.task(task_id).await?;
        self.settlement.retry(&task, kind).await
    }

    /// Full audit history for a task
    pub async fn task_history(&self, task_id: Uuid) -> Result<Vec<TaskEvent>> {
        self.lifecycle.task_history(task_id).await
    }

    /// Read-side accessors consumed by the UI layer
    pub async fn task(&self, task_id: Uuid) -> Result<Task> {
        self.lifecycle.task(task_id).await
    }

    pub async fn escrow(&self, task_id: Uuid) -> Result<Option<EscrowAccount>> {
        self.lifecycle.escrow(task_id).await
    }

    pub async fn available_balance(&self, tasker_id: Uuid) -> Result<Decimal> {
        self.payouts.available_balance(tasker_id).await
    }

    pub async fn payouts_for(&self, tasker_id: Uuid) -> Result<Vec<PayoutRequest>> {
        self.payouts.payouts_for(tasker_id).await
    }

    pub async fn transactions_for_task(&self, task_id: Uuid) -> Result<Vec<Transaction>> {
        self.payments.transactions_for_task(task_id).await
    }

    /// Mirror a committed transition into the gateway, without unwinding it
    async fn settle_after_transition(&self, task: &Task) {
        let outcome = match task.status {
            TaskStatus::Assigned => Some(self.settlement.charge_for_assignment(task).await),
            TaskStatus::Completed => Some(self.settlement.record_platform_fee(task).await),
            TaskStatus::Cancelled => match self.lifecycle.escrow(task.id).await {
                Ok(Some(escrow)) if escrow.status == EscrowStatus::Refunded => {
                    Some(self.settlement.refund_for_cancellation(task).await)
                }
                // Cancelled from CREATED: nothing was ever charged
                Ok(_) => None,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Escrow lookup failed after cancel");
                    None
                }
            },
            _ => None,
        };

        if let Some(Err(error)) = outcome {
            warn!(
                task_id = %task.id,
                status = %task.status,
                error = %error,
                "Settlement failed after committed transition; retry later"
            );
        }
    }
}
