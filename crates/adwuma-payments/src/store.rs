//! Payment-side storage
//!
//! Transactions are keyed by their idempotency reference, which is what a
//! retry looks up; payout requests by id.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use adwuma_common::{PayoutError, Result};

use crate::payout::PayoutRequest;
use crate::transaction::Transaction;

/// Store for money-movement records
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert or update a transaction (keyed by reference)
    async fn upsert_transaction(&self, tx: Transaction) -> Result<()>;

    /// Look up the transaction for an idempotency reference
    async fn transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>>;

    /// All transactions recorded against a task
    async fn transactions_for_task(&self, task_id: Uuid) -> Result<Vec<Transaction>>;

    /// Insert or update a payout request
    async fn upsert_payout(&self, payout: PayoutRequest) -> Result<()>;

    /// Fetch a payout request by id
    async fn payout(&self, payout_id: Uuid) -> Result<PayoutRequest>;

    /// All payout requests a tasker has made, newest first
    async fn payouts_for_tasker(&self, tasker_id: Uuid) -> Result<Vec<PayoutRequest>>;
}

/// In-memory payment store for tests and embedding
#[derive(Default)]
pub struct MemoryPaymentStore {
    transactions: DashMap<String, Transaction>,
    payouts: DashMap<Uuid, PayoutRequest>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn upsert_transaction(&self, tx: Transaction) -> Result<()> {
        self.transactions.insert(tx.reference.clone(), tx);
        Ok(())
    }

    async fn transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        Ok(self.transactions.get(reference).map(|tx| tx.clone()))
    }

    async fn transactions_for_task(&self, task_id: Uuid) -> Result<Vec<Transaction>> {
        let mut txs: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|tx| tx.task_id == Some(task_id))
            .map(|tx| tx.clone())
            .collect();
        txs.sort_by_key(|tx| tx.created_at);
        Ok(txs)
    }

    async fn upsert_payout(&self, payout: PayoutRequest) -> Result<()> {
        self.payouts.insert(payout.id, payout);
        Ok(())
    }

    async fn payout(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        self.payouts
            .get(&payout_id)
            .map(|p| p.clone())
            .ok_or_else(|| PayoutError::NotFound(payout_id).into())
    }

    async fn payouts_for_tasker(&self, tasker_id: Uuid) -> Result<Vec<PayoutRequest>> {
        let mut payouts: Vec<PayoutRequest> = self
            .payouts
            .iter()
            .filter(|p| p.tasker_id == tasker_id)
            .map(|p| p.clone())
            .collect();
        payouts.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(payouts)
    }
}
