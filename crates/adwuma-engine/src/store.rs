//! Market storage
//!
//! The task, escrow, and event stores are the only shared mutable resource
//! in the engine; all writes go through [`MarketStore`]. The trait's commit
//! surface gives per-task linearizability: a transition commit carries the
//! updated task, its events, and the escrow side effect, and either fully
//! applies under the version check or fails with no observable effect.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use adwuma_common::{AdwumaError, PayoutError, Result, TaskError};

use crate::escrow::{EscrowAccount, PayoutAllocation};
use crate::event::TaskEvent;
use crate::task::Task;

/// One atomic unit of lifecycle work: task update + events + escrow upsert
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    /// The updated task (version already incremented by the lifecycle)
    pub task: Task,
    /// Version the caller read; the stored task must still carry it
    pub expected_version: u64,
    /// Events to append, in order; `seq` is assigned at append
    pub events: Vec<TaskEvent>,
    /// Escrow side effect, when the transition has one
    pub escrow: Option<EscrowAccount>,
}

/// Transactional store for tasks, escrows, and events
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Persist a newly created task with its creation event
    async fn insert_task(&self, task: Task, event: TaskEvent) -> Result<()>;

    /// Fetch a task by id
    async fn task(&self, task_id: Uuid) -> Result<Task>;

    /// Atomically apply a transition commit under the version check
    ///
    /// Fails with `TaskError::StaleVersion` when the stored version no
    /// longer matches `expected_version`; nothing is written in that case.
    /// Returns the appended events with their assigned sequence numbers.
    async fn commit_transition(&self, commit: TransitionCommit) -> Result<Vec<TaskEvent>>;

    /// Current escrow account for a task, if any
    async fn escrow(&self, task_id: Uuid) -> Result<Option<EscrowAccount>>;

    /// All released escrows payable to a tasker, oldest lock first
    async fn released_escrows(&self, tasker_id: Uuid) -> Result<Vec<EscrowAccount>>;

    /// Atomically check the tasker's available released balance and hold
    /// `amount` of it for `payout_id`, consuming escrows oldest-first
    ///
    /// The check and the holds happen under one reservation lock so two
    /// concurrent payout requests cannot double-spend the same balance.
    async fn reserve_for_payout(
        &self,
        tasker_id: Uuid,
        payout_id: Uuid,
        amount: Decimal,
    ) -> Result<Vec<PayoutAllocation>>;

    /// Convert a payout's holds into paid-out amounts
    async fn settle_reservation(
        &self,
        payout_id: Uuid,
        allocations: &[PayoutAllocation],
    ) -> Result<()>;

    /// Return a failed payout's holds to the available balance
    async fn return_reservation(
        &self,
        payout_id: Uuid,
        allocations: &[PayoutAllocation],
    ) -> Result<()>;

    /// Append one event to a task's stream, assigning its sequence number
    async fn append_event(&self, event: TaskEvent) -> Result<TaskEvent>;

    /// Full event stream for a task, in sequence order
    async fn events(&self, task_id: Uuid) -> Result<Vec<TaskEvent>>;
}

/// In-memory store for tests and embedding
///
/// DashMap-backed; per-task commit mutexes provide the linearizability the
/// trait promises, and per-tasker reservation mutexes make the payout
/// check-and-hold atomic without locking the whole ledger.
pub struct MemoryStore {
    tasks: DashMap<Uuid, Task>,
    escrows: DashMap<Uuid, EscrowAccount>,
    events: DashMap<Uuid, Vec<TaskEvent>>,
    commit_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    reservation_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            escrows: DashMap::new(),
            events: DashMap::new(),
            commit_locks: DashMap::new(),
            reservation_locks: DashMap::new(),
        }
    }

    fn commit_lock(&self, task_id: Uuid) -> Arc<Mutex<()>> {
        self.commit_locks
            .entry(task_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn reservation_lock(&self, tasker_id: Uuid) -> Arc<Mutex<()>> {
        self.reservation_locks
            .entry(tasker_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn append_with_seq(&self, mut event: TaskEvent) -> TaskEvent {
        let mut stream = self.events.entry(event.task_id).or_default();
        event.seq = stream.len() as u64;
        stream.push(event.clone());
        event
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn insert_task(&self, task: Task, event: TaskEvent) -> Result<()> {
        let lock = self.commit_lock(task.id);
        let _guard = lock.lock();

        if self.tasks.contains_key(&task.id) {
            return Err(AdwumaError::Storage(format!(
                "task {} already exists",
                task.id
            )));
        }

        self.append_with_seq(event);
        self.tasks.insert(task.id, task);
        Ok(())
    }

    async fn task(&self, task_id: Uuid) -> Result<Task> {
        self.tasks
            .get(&task_id)
            .map(|t| t.clone())
            .ok_or_else(|| TaskError::NotFound(task_id).into())
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<Vec<TaskEvent>> {
        let lock = self.commit_lock(commit.task.id);
        let _guard = lock.lock();

        let stored = self
            .tasks
            .get(&commit.task.id)
            .map(|t| t.clone())
            .ok_or(TaskError::NotFound(commit.task.id))?;

        if stored.version != commit.expected_version {
            return Err(TaskError::StaleVersion {
                expected: commit.expected_version,
                found: stored.version,
            }
            .into());
        }

        let mut appended = Vec::with_capacity(commit.events.len());
        for event in commit.events {
            appended.push(self.append_with_seq(event));
        }
        if let Some(escrow) = commit.escrow {
            self.escrows.insert(escrow.task_id, escrow);
        }
        self.tasks.insert(commit.task.id, commit.task.clone());

        debug!(task_id = %commit.task.id, version = commit.task.version, "Transition committed");
        Ok(appended)
    }

    async fn escrow(&self, task_id: Uuid) -> Result<Option<EscrowAccount>> {
        Ok(self.escrows.get(&task_id).map(|e| e.clone()))
    }

    async fn released_escrows(&self, tasker_id: Uuid) -> Result<Vec<EscrowAccount>> {
        let mut accounts: Vec<EscrowAccount> = self
            .escrows
            .iter()
            .filter(|e| e.tasker_id == Some(tasker_id))
            .map(|e| e.clone())
            .collect();
        accounts.sort_by_key(|e| e.locked_at);
        Ok(accounts)
    }

    async fn reserve_for_payout(
        &self,
        tasker_id: Uuid,
        payout_id: Uuid,
        amount: Decimal,
    ) -> Result<Vec<PayoutAllocation>> {
        let lock = self.reservation_lock(tasker_id);
        let _guard = lock.lock();

        let mut candidates: Vec<(Uuid, Decimal, chrono::DateTime<chrono::Utc>)> = self
            .escrows
            .iter()
            .filter(|e| e.tasker_id == Some(tasker_id) && e.available_net() > Decimal::ZERO)
            .map(|e| (e.task_id, e.available_net(), e.locked_at))
            .collect();
        candidates.sort_by_key(|(_, _, locked_at)| *locked_at);

        let available: Decimal = candidates.iter().map(|(_, net, _)| *net).sum();
        if available < amount {
            return Err(PayoutError::InsufficientBalance {
                requested: amount,
                available,
            }
            .into());
        }

        let mut allocations = Vec::new();
        let mut remaining = amount;
        for (task_id, net, _) in candidates {
            if remaining == Decimal::ZERO {
                break;
            }
            let take = remaining.min(net);
            let mut escrow = self
                .escrows
                .get_mut(&task_id)
                .ok_or_else(|| AdwumaError::Storage(format!("escrow {task_id} vanished")))?;
            escrow.reserve(take)?;
            allocations.push(PayoutAllocation { task_id, amount: take });
            remaining -= take;
        }

        debug!(
            tasker_id = %tasker_id,
            payout_id = %payout_id,
            amount = %amount,
            escrows = allocations.len(),
            "Released balance reserved"
        );
        Ok(allocations)
    }

    async fn settle_reservation(
        &self,
        payout_id: Uuid,
        allocations: &[PayoutAllocation],
    ) -> Result<()> {
        for alloc in allocations {
            let mut escrow = self.escrows.get_mut(&alloc.task_id).ok_or_else(|| {
                AdwumaError::Storage(format!(
                    "escrow {} missing while settling payout {payout_id}",
                    alloc.task_id
                ))
            })?;
            escrow.settle(alloc.amount)?;
        }
        Ok(())
    }

    async fn return_reservation(
        &self,
        payout_id: Uuid,
        allocations: &[PayoutAllocation],
    ) -> Result<()> {
        // Holds only shrink or convert to paid here; per-escrow entry
        // locking keeps each adjustment atomic
        for alloc in allocations {
            let mut escrow = self.escrows.get_mut(&alloc.task_id).ok_or_else(|| {
                AdwumaError::Storage(format!(
                    "escrow {} missing while unwinding payout {payout_id}",
                    alloc.task_id
                ))
            })?;
            escrow.unreserve(alloc.amount)?;
        }
        Ok(())
    }

    async fn append_event(&self, event: TaskEvent) -> Result<TaskEvent> {
        Ok(self.append_with_seq(event))
    }

    async fn events(&self, task_id: Uuid) -> Result<Vec<TaskEvent>> {
        Ok(self
            .events
            .get(&task_id)
            .map(|stream| stream.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escrow::EscrowLedger;
    use crate::event::TaskEventKind;
    use crate::task::{NewTask, TaskCategory, TaskPriority, TaskStatus};
    use adwuma_common::{Actor, PaymentMethodRef, PaymentProvider};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    async fn stored_task(store: &MemoryStore) -> Task {
        let task = Task::create(NewTask {
            client_id: Uuid::now_v7(),
            category: TaskCategory::Delivery,
            title: "Collect parcel from Osu".into(),
            description: "Pick up a parcel from the Osu post office branch.".into(),
            price_gross: dec!(60.00),
            priority: TaskPriority::Medium,
            is_urgent: false,
            payment_method: PaymentMethodRef::new("pm_1", PaymentProvider::MtnMomo),
            scheduled_at: Utc::now(),
        })
        .unwrap();

        let event = TaskEvent::new(
            task.id,
            TaskEventKind::TaskCreated {
                client_id: task.client_id,
                price_gross: task.price_gross,
            },
            task.client_id,
        );

        store.insert_task(task.clone(), event).await.unwrap();
        task
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let store = MemoryStore::new();
        let task = stored_task(&store).await;

        let fetched = store.task(task.id).await.unwrap();
        assert_eq!(fetched.id, task.id);
        assert_eq!(fetched.version, 0);

        let events = store.events(task.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seq, 0);
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_version() {
        let store = MemoryStore::new();
        let task = stored_task(&store).await;
        let tasker = Actor::tasker(Uuid::now_v7());

        let mut first = task.clone();
        first.apply_transition(TaskStatus::Assigned, tasker);
        store
            .commit_transition(TransitionCommit {
                task: first,
                expected_version: 0,
                events: vec![],
                escrow: None,
            })
            .await
            .unwrap();

        // A second writer that read version 0 must lose
        let mut second = task.clone();
        second.apply_transition(TaskStatus::Assigned, Actor::tasker(Uuid::now_v7()));
        let result = store
            .commit_transition(TransitionCommit {
                task: second,
                expected_version: 0,
                events: vec![],
                escrow: None,
            })
            .await;

        assert!(matches!(
            result,
            Err(AdwumaError::Task(TaskError::StaleVersion { expected: 0, found: 1 }))
        ));
    }

    #[tokio::test]
    async fn test_event_seq_is_monotonic() {
        let store = MemoryStore::new();
        let task = stored_task(&store).await;

        for _ in 0..3 {
            store
                .append_event(TaskEvent::new(
                    task.id,
                    TaskEventKind::EscrowFrozen,
                    task.client_id,
                ))
                .await
                .unwrap();
        }

        let events = store.events(task.id).await.unwrap();
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_reserve_is_atomic_with_balance_check() {
        let store = MemoryStore::new();
        let ledger = EscrowLedger::new();
        let tasker_id = Uuid::now_v7();

        // Two released escrows worth 132.75 and 88.50 net
        for gross in [dec!(150.00), dec!(100.00)] {
            let task_id = Uuid::now_v7();
            let locked = ledger.lock(None, task_id, gross).unwrap();
            let released = ledger
                .release(Some(&locked), task_id, tasker_id, PaymentProvider::MtnMomo)
                .unwrap();
            store.escrows.insert(task_id, released);
        }

        let payout_id = Uuid::now_v7();
        let allocations = store
            .reserve_for_payout(tasker_id, payout_id, dec!(200.00))
            .await
            .unwrap();

        // Oldest escrow consumed fully, remainder from the second
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].amount, dec!(132.75));
        assert_eq!(allocations[1].amount, dec!(67.25));

        // Remaining balance cannot cover a second 200 payout
        let second = store
            .reserve_for_payout(tasker_id, Uuid::now_v7(), dec!(200.00))
            .await;
        assert!(matches!(
            second,
            Err(AdwumaError::Payout(PayoutError::InsufficientBalance { .. }))
        ));

        // Returning the holds restores the full balance
        store
            .return_reservation(payout_id, &allocations)
            .await
            .unwrap();
        let restored = store
            .reserve_for_payout(tasker_id, Uuid::now_v7(), dec!(221.25))
            .await
            .unwrap();
        let total: Decimal = restored.iter().map(|a| a.amount).sum();
        assert_eq!(total, dec!(221.25));
    }

    #[tokio::test]
    async fn test_settle_moves_reserved_to_paid() {
        let store = MemoryStore::new();
        let ledger = EscrowLedger::new();
        let tasker_id = Uuid::now_v7();
        let task_id = Uuid::now_v7();

        let locked = ledger.lock(None, task_id, dec!(150.00)).unwrap();
        let released = ledger
            .release(Some(&locked), task_id, tasker_id, PaymentProvider::MtnMomo)
            .unwrap();
        store.escrows.insert(task_id, released);

        let payout_id = Uuid::now_v7();
        let allocations = store
            .reserve_for_payout(tasker_id, payout_id, dec!(132.75))
            .await
            .unwrap();
        store
            .settle_reservation(payout_id, &allocations)
            .await
            .unwrap();

        let escrow = store.escrow(task_id).await.unwrap().unwrap();
        assert_eq!(escrow.net_paid, dec!(132.75));
        assert_eq!(escrow.net_reserved, Decimal::ZERO);
        assert_eq!(escrow.available_net(), Decimal::ZERO);
    }
}
