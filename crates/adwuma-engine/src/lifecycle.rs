//! Task lifecycle service
//!
//! Validates and applies status transitions and triggers the matching
//! escrow operation in the same atomic commit:
//!
//! | target      | escrow side effect |
//! |-------------|--------------------|
//! | ASSIGNED    | lock               |
//! | COMPLETED   | release            |
//! | CANCELLED   | refund (if locked) |
//! | DISPUTED    | freeze             |
//!
//! Concurrency follows optimistic versioning: the caller supplies the task
//! version it read, the commit re-checks it under the store's per-task lock,
//! and a loser surfaces `StaleVersion` to re-fetch and retry.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use adwuma_common::{Actor, AdwumaError, Result, TaskError};

use crate::escrow::{EscrowAccount, EscrowLedger};
use crate::event::{TaskEvent, TaskEventKind};
use crate::notify::NotificationSink;
use crate::store::{MarketStore, TransitionCommit};
use crate::task::{NewTask, Task, TaskStatus};

/// Admin resolution of a disputed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeDecision {
    /// Tasker prevails: complete the task and release the escrow
    Release,
    /// Client prevails: cancel the task and refund the full gross
    Refund,
}

/// The task state machine service
pub struct TaskLifecycle {
    store: Arc<dyn MarketStore>,
    ledger: EscrowLedger,
    sink: Arc<dyn NotificationSink>,
}

impl TaskLifecycle {
    pub fn new(store: Arc<dyn MarketStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            ledger: EscrowLedger::new(),
            sink,
        }
    }

    /// Post a new task in CREATED; no escrow exists until assignment
    #[instrument(skip(self, new), fields(client_id = %new.client_id))]
    pub async fn create_task(&self, new: NewTask) -> Result<Task> {
        let task = Task::create(new)?;
        let event = TaskEvent::new(
            task.id,
            TaskEventKind::TaskCreated {
                client_id: task.client_id,
                price_gross: task.price_gross,
            },
            task.client_id,
        );

        self.store.insert_task(task.clone(), event.clone()).await?;
        self.sink.emit(&event).await;

        info!(task_id = %task.id, price = %task.price_gross, "Task created");
        Ok(task)
    }

    /// Apply one status transition on behalf of `actor`
    ///
    /// `expected_version` is the version the caller last read; a mismatch
    /// (before or during commit) fails with `StaleVersion` and writes
    /// nothing.
    #[instrument(skip(self, note), fields(actor_id = %actor.id))]
    pub async fn transition(
        &self,
        task_id: Uuid,
        target: TaskStatus,
        actor: Actor,
        expected_version: u64,
        note: Option<String>,
    ) -> Result<Task> {
        let task = self.store.task(task_id).await?;

        if task.version != expected_version {
            return Err(TaskError::StaleVersion {
                expected: expected_version,
                found: task.version,
            }
            .into());
        }

        let edge = task.status.edge(target).ok_or(TaskError::InvalidTransition {
            from: task.status.to_string(),
            to: target.to_string(),
        })?;
        task.authorize(actor, edge)?;

        let escrow_current = self.store.escrow(task_id).await?;

        let mut updated = task.clone();
        updated.apply_transition(target, actor);

        let mut events = vec![TaskEvent::new(
            task_id,
            TaskEventKind::StatusChanged {
                from: task.status,
                to: target,
                note,
            },
            actor.id,
        )];
        let escrow_next =
            self.escrow_side_effect(&task, &updated, escrow_current.as_ref(), actor, &mut events)?;

        let committed = self
            .store
            .commit_transition(TransitionCommit {
                task: updated.clone(),
                expected_version: task.version,
                events,
                escrow: escrow_next,
            })
            .await?;

        for event in &committed {
            self.sink.emit(event).await;
        }

        info!(
            task_id = %task_id,
            from = %task.status,
            to = %target,
            version = updated.version,
            "Task transitioned"
        );
        Ok(updated)
    }

    /// Resolve a disputed task by admin decision
    #[instrument(skip(self), fields(admin_id = %admin.id))]
    pub async fn review_dispute(
        &self,
        task_id: Uuid,
        decision: DisputeDecision,
        admin: Actor,
    ) -> Result<Task> {
        let target = match decision {
            DisputeDecision::Release => TaskStatus::Completed,
            DisputeDecision::Refund => TaskStatus::Cancelled,
        };

        // Admin review is a fresh read; the console has no long-held version
        let current = self.store.task(task_id).await?;
        self.transition(task_id, target, admin, current.version, None)
            .await
    }

    /// Fetch a task
    pub async fn task(&self, task_id: Uuid) -> Result<Task> {
        self.store.task(task_id).await
    }

    /// Current escrow account for a task, if any
    pub async fn escrow(&self, task_id: Uuid) -> Result<Option<EscrowAccount>> {
        self.store.escrow(task_id).await
    }

    /// Full audit history for a task, in order
    pub async fn task_history(&self, task_id: Uuid) -> Result<Vec<TaskEvent>> {
        // Surface NotFound rather than an empty stream for unknown ids
        self.store.task(task_id).await?;
        self.store.events(task_id).await
    }

    /// Compute the escrow mutation a transition requires, if any
    fn escrow_side_effect(
        &self,
        before: &Task,
        after: &Task,
        current: Option<&EscrowAccount>,
        actor: Actor,
        events: &mut Vec<TaskEvent>,
    ) -> Result<Option<EscrowAccount>> {
        let next = match after.status {
            TaskStatus::Assigned => {
                let locked = self.ledger.lock(current, before.id, before.price_gross)?;
                events.push(TaskEvent::new(
                    before.id,
                    TaskEventKind::EscrowLocked {
                        amount: locked.amount_gross,
                    },
                    actor.id,
                ));
                Some(locked)
            }
            TaskStatus::Completed => {
                let tasker_id = after.tasker_id.ok_or_else(|| {
                    AdwumaError::Internal(format!("task {} completed without a tasker", before.id))
                })?;
                let released = self.ledger.release(
                    current,
                    before.id,
                    tasker_id,
                    before.payment_method.provider,
                )?;
                events.push(TaskEvent::new(
                    before.id,
                    TaskEventKind::EscrowReleased {
                        tasker_id,
                        platform_fee: released.platform_fee,
                        processing_fee: released.processing_fee,
                        net_amount: released.net_amount,
                    },
                    actor.id,
                ));
                Some(released)
            }
            TaskStatus::Cancelled => match current {
                // Cancelled before assignment: no escrow was ever locked
                None => None,
                Some(account) => {
                    let refunded = self.ledger.refund(Some(account), before.id)?;
                    events.push(TaskEvent::new(
                        before.id,
                        TaskEventKind::EscrowRefunded {
                            amount: refunded.amount_gross,
                        },
                        actor.id,
                    ));
                    Some(refunded)
                }
            },
            TaskStatus::Disputed => {
                let frozen = self.ledger.freeze(current, before.id)?;
                events.push(TaskEvent::new(before.id, TaskEventKind::EscrowFrozen, actor.id));
                Some(frozen)
            }
            _ => None,
        };
        Ok(next)
    }
}
