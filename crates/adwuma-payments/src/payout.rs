//! Payout processing
//!
//! A tasker's available balance is the sum of released escrow nets not yet
//! held by or paid through a payout request. Accepting a request reserves
//! that balance oldest-escrow-first, atomically with the balance check, so
//! two concurrent requests cannot spend the same cedi. The gateway call
//! happens after the reservation; a failure returns the hold and leaves the
//! request FAILED for an explicit retry under the same reference. There is
//! no automatic retry, a duplicate transfer costs more than a support
//! ticket.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use adwuma_common::money::is_valid_amount;
use adwuma_common::{PaymentMethodRef, PayoutError, Result};
use adwuma_engine::{MarketStore, PayoutAllocation, TaskEvent, TaskEventKind};

use crate::gateway::PaymentGateway;
use crate::store::PaymentStore;
use crate::transaction::{reference_for, TransactionKind, TransactionStatus};

/// A tasker's request to move released earnings to their payout method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: Uuid,
    pub tasker_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethodRef,
    pub status: TransactionStatus,
    /// Idempotency key; stable across retries of this request
    pub reference: String,
    /// Which escrows the amount was reserved from
    pub allocations: Vec<PayoutAllocation>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Aggregates released balances and turns payout requests into gateway calls
pub struct PayoutProcessor {
    market: Arc<dyn MarketStore>,
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    min_payout: Decimal,
    /// Per-tasker mutual exclusion across the reserve-call-settle sequence
    tasker_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl PayoutProcessor {
    pub fn new(
        market: Arc<dyn MarketStore>,
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        min_payout: Decimal,
    ) -> Self {
        Self {
            market,
            payments,
            gateway,
            min_payout,
            tasker_locks: DashMap::new(),
        }
    }

    fn tasker_lock(&self, tasker_id: Uuid) -> Arc<Mutex<()>> {
        self.tasker_locks
            .entry(tasker_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Released, unreserved, unpaid net available to a tasker right now
    pub async fn available_balance(&self, tasker_id: Uuid) -> Result<Decimal> {
        let escrows = self.market.released_escrows(tasker_id).await?;
        Ok(escrows.iter().map(|e| e.available_net()).sum())
    }

    /// Accept and execute a payout request
    ///
    /// Fails with `InsufficientBalance` or `BelowMinimumPayout` before any
    /// state changes. On a gateway failure the reservation is returned and
    /// the FAILED request surfaces through [`Self::payout`] for retry.
    #[instrument(skip(self, method), fields(tasker_id = %tasker_id, amount = %amount))]
    pub async fn request_payout(
        &self,
        tasker_id: Uuid,
        amount: Decimal,
        method: PaymentMethodRef,
    ) -> Result<PayoutRequest> {
        if !is_valid_amount(amount) {
            return Err(PayoutError::InvalidAmount.into());
        }
        if amount < self.min_payout {
            return Err(PayoutError::BelowMinimumPayout {
                requested: amount,
                minimum: self.min_payout,
            }
            .into());
        }

        let lock = self.tasker_lock(tasker_id);
        let _guard = lock.lock().await;

        let payout_id = Uuid::now_v7();
        let allocations = self
            .market
            .reserve_for_payout(tasker_id, payout_id, amount)
            .await?;

        let mut request = PayoutRequest {
            id: payout_id,
            tasker_id,
            amount,
            method: method.clone(),
            status: TransactionStatus::Pending,
            reference: reference_for(TransactionKind::Payout, payout_id),
            allocations: allocations.clone(),
            requested_at: Utc::now(),
            processed_at: None,
        };
        self.payments.upsert_payout(request.clone()).await?;

        for alloc in &allocations {
            self.market
                .append_event(TaskEvent::new(
                    alloc.task_id,
                    TaskEventKind::EscrowReserved {
                        payout_id,
                        amount: alloc.amount,
                    },
                    tasker_id,
                ))
                .await?;
        }

        self.execute(&mut request).await?;
        Ok(request)
    }

    /// Retry a FAILED payout request under its original reference
    #[instrument(skip(self))]
    pub async fn retry_payout(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        let mut request = self.payments.payout(payout_id).await?;
        match request.status {
            TransactionStatus::Failed => {}
            // A settled request is already done; replay is a no-op
            TransactionStatus::Completed => return Ok(request),
            _ => return Err(PayoutError::NotRetryable(payout_id).into()),
        }

        let lock = self.tasker_lock(request.tasker_id);
        let _guard = lock.lock().await;

        // Re-hold the balance that was returned when the request failed
        let allocations = self
            .market
            .reserve_for_payout(request.tasker_id, request.id, request.amount)
            .await?;
        request.allocations = allocations.clone();
        for alloc in &allocations {
            self.market
                .append_event(TaskEvent::new(
                    alloc.task_id,
                    TaskEventKind::EscrowReserved {
                        payout_id: request.id,
                        amount: alloc.amount,
                    },
                    request.tasker_id,
                ))
                .await?;
        }

        self.execute(&mut request).await?;
        Ok(request)
    }

    /// Fetch a payout request
    pub async fn payout(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        self.payments.payout(payout_id).await
    }

    /// A tasker's payout history, newest first
    pub async fn payouts_for(&self, tasker_id: Uuid) -> Result<Vec<PayoutRequest>> {
        self.payments.payouts_for_tasker(tasker_id).await
    }

    /// Call the gateway and finalize or unwind the reservation
    async fn execute(&self, request: &mut PayoutRequest) -> Result<()> {
        request.status = TransactionStatus::Processing;
        self.payments.upsert_payout(request.clone()).await?;

        let outcome = self
            .gateway
            .payout(request.amount, &request.method, &request.reference)
            .await;

        match outcome {
            Ok(receipt) => {
                self.market
                    .settle_reservation(request.id, &request.allocations)
                    .await?;
                request.status = TransactionStatus::Completed;
                request.processed_at = Some(Utc::now());
                self.payments.upsert_payout(request.clone()).await?;

                for alloc in &request.allocations {
                    self.market
                        .append_event(TaskEvent::new(
                            alloc.task_id,
                            TaskEventKind::EscrowPaidOut {
                                payout_id: request.id,
                                amount: alloc.amount,
                            },
                            request.tasker_id,
                        ))
                        .await?;
                }

                info!(
                    payout_id = %request.id,
                    tasker_id = %request.tasker_id,
                    amount = %request.amount,
                    provider_ref = %receipt.provider_ref,
                    "Payout completed"
                );
                Ok(())
            }
            Err(error) => {
                self.market
                    .return_reservation(request.id, &request.allocations)
                    .await?;
                request.status = TransactionStatus::Failed;
                self.payments.upsert_payout(request.clone()).await?;

                for alloc in &request.allocations {
                    self.market
                        .append_event(TaskEvent::new(
                            alloc.task_id,
                            TaskEventKind::EscrowReservationReturned {
                                payout_id: request.id,
                                amount: alloc.amount,
                            },
                            request.tasker_id,
                        ))
                        .await?;
                }

                warn!(
                    payout_id = %request.id,
                    tasker_id = %request.tasker_id,
                    reference = %request.reference,
                    error = %error,
                    "Payout failed; reservation returned"
                );
                Err(error.into())
            }
        }
    }
}
