//! Append-only task event log
//!
//! Every transition and money movement appends one event. Events are never
//! mutated or deleted; the sequence for a task is the authoritative history
//! from which current task and escrow state can be rebuilt by [`replay`],
//! and what dispute review renders as the causal timeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::escrow::EscrowStatus;
use crate::task::TaskStatus;

/// Event payloads, adjacently tagged for stable wire form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskEventKind {
    /// Task posted by a client
    TaskCreated {
        client_id: Uuid,
        price_gross: Decimal,
    },
    /// Lifecycle transition applied
    StatusChanged {
        from: TaskStatus,
        to: TaskStatus,
        note: Option<String>,
    },
    /// Funds locked against the task
    EscrowLocked { amount: Decimal },
    /// Funds released to the tasker with the fee split
    EscrowReleased {
        tasker_id: Uuid,
        platform_fee: Decimal,
        processing_fee: Decimal,
        net_amount: Decimal,
    },
    /// Full gross returned to the client
    EscrowRefunded { amount: Decimal },
    /// Funds frozen pending dispute review
    EscrowFrozen,
    /// Part of the released net held for a payout request
    EscrowReserved { payout_id: Uuid, amount: Decimal },
    /// A failed payout returned its hold to the available balance
    EscrowReservationReturned { payout_id: Uuid, amount: Decimal },
    /// A completed payout consumed part of the released net
    EscrowPaidOut { payout_id: Uuid, amount: Decimal },
    /// Gateway charge for the escrow lock settled
    ChargeCompleted { reference: String, amount: Decimal },
    /// Gateway charge failed; retryable under the same reference
    ChargeFailed { reference: String, reason: String },
    /// Gateway refund to the client settled
    RefundCompleted { reference: String, amount: Decimal },
    /// Gateway refund failed; retryable under the same reference
    RefundFailed { reference: String, reason: String },
}

impl TaskEventKind {
    /// Stable event-type name for logs and audit rendering
    pub fn type_name(&self) -> &'static str {
        match self {
            TaskEventKind::TaskCreated { .. } => "TaskCreated",
            TaskEventKind::StatusChanged { .. } => "StatusChanged",
            TaskEventKind::EscrowLocked { .. } => "EscrowLocked",
            TaskEventKind::EscrowReleased { .. } => "EscrowReleased",
            TaskEventKind::EscrowRefunded { .. } => "EscrowRefunded",
            TaskEventKind::EscrowFrozen => "EscrowFrozen",
            TaskEventKind::EscrowReserved { .. } => "EscrowReserved",
            TaskEventKind::EscrowReservationReturned { .. } => "EscrowReservationReturned",
            TaskEventKind::EscrowPaidOut { .. } => "EscrowPaidOut",
            TaskEventKind::ChargeCompleted { .. } => "ChargeCompleted",
            TaskEventKind::ChargeFailed { .. } => "ChargeFailed",
            TaskEventKind::RefundCompleted { .. } => "RefundCompleted",
            TaskEventKind::RefundFailed { .. } => "RefundFailed",
        }
    }
}

/// One entry in a task's append-only history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: Uuid,
    pub task_id: Uuid,
    /// Position within the task's stream; assigned by the store at append
    pub seq: u64,
    pub kind: TaskEventKind,
    /// Who caused the event (system-driven settlement uses the task's client
    /// or tasker as appropriate)
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl TaskEvent {
    pub fn new(task_id: Uuid, kind: TaskEventKind, actor_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            task_id,
            seq: 0,
            kind,
            actor_id,
            created_at: Utc::now(),
        }
    }
}

/// Task/escrow state reconstructed from an event sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayedState {
    pub status: TaskStatus,
    pub version: u64,
    pub escrow: Option<EscrowStatus>,
}

/// Rebuild current status, version, and escrow status by folding events
///
/// Returns `None` for an empty or headless sequence (no `TaskCreated`).
pub fn replay(events: &[TaskEvent]) -> Option<ReplayedState> {
    let mut state: Option<ReplayedState> = None;

    for event in events {
        if let TaskEventKind::TaskCreated { .. } = event.kind {
            if state.is_none() {
                state = Some(ReplayedState {
                    status: TaskStatus::Created,
                    version: 0,
                    escrow: None,
                });
            }
            continue;
        }

        let Some(s) = state.as_mut() else {
            // Headless stream: events before TaskCreated carry no state
            continue;
        };
        match &event.kind {
            TaskEventKind::StatusChanged { to, .. } => {
                s.status = *to;
                s.version += 1;
            }
            TaskEventKind::EscrowLocked { .. } => s.escrow = Some(EscrowStatus::Locked),
            TaskEventKind::EscrowReleased { .. } => s.escrow = Some(EscrowStatus::Released),
            TaskEventKind::EscrowRefunded { .. } => s.escrow = Some(EscrowStatus::Refunded),
            TaskEventKind::EscrowFrozen => s.escrow = Some(EscrowStatus::Disputed),
            // Reservation and settlement events do not move lifecycle state
            _ => {}
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(task_id: Uuid, kind: TaskEventKind) -> TaskEvent {
        TaskEvent::new(task_id, kind, Uuid::now_v7())
    }

    #[test]
    fn test_replay_happy_path() {
        let task_id = Uuid::now_v7();
        let tasker_id = Uuid::now_v7();
        use TaskStatus::*;

        let events = vec![
            event(
                task_id,
                TaskEventKind::TaskCreated {
                    client_id: Uuid::now_v7(),
                    price_gross: dec!(150.00),
                },
            ),
            event(
                task_id,
                TaskEventKind::StatusChanged {
                    from: Created,
                    to: Assigned,
                    note: None,
                },
            ),
            event(task_id, TaskEventKind::EscrowLocked { amount: dec!(150.00) }),
            event(
                task_id,
                TaskEventKind::StatusChanged {
                    from: Assigned,
                    to: EnRoute,
                    note: None,
                },
            ),
            event(
                task_id,
                TaskEventKind::StatusChanged {
                    from: EnRoute,
                    to: OnSite,
                    note: None,
                },
            ),
            event(
                task_id,
                TaskEventKind::StatusChanged {
                    from: OnSite,
                    to: InProgress,
                    note: None,
                },
            ),
            event(
                task_id,
                TaskEventKind::StatusChanged {
                    from: InProgress,
                    to: Completed,
                    note: Some("done".into()),
                },
            ),
            event(
                task_id,
                TaskEventKind::EscrowReleased {
                    tasker_id,
                    platform_fee: dec!(15.00),
                    processing_fee: dec!(2.25),
                    net_amount: dec!(132.75),
                },
            ),
        ];

        let state = replay(&events).unwrap();
        assert_eq!(state.status, Completed);
        assert_eq!(state.version, 5);
        assert_eq!(state.escrow, Some(EscrowStatus::Released));
    }

    #[test]
    fn test_replay_dispute_refund() {
        let task_id = Uuid::now_v7();
        use TaskStatus::*;

        let events = vec![
            event(
                task_id,
                TaskEventKind::TaskCreated {
                    client_id: Uuid::now_v7(),
                    price_gross: dec!(100),
                },
            ),
            event(
                task_id,
                TaskEventKind::StatusChanged {
                    from: InProgress,
                    to: Disputed,
                    note: None,
                },
            ),
            event(task_id, TaskEventKind::EscrowFrozen),
            event(
                task_id,
                TaskEventKind::StatusChanged {
                    from: Disputed,
                    to: Cancelled,
                    note: Some("refund approved".into()),
                },
            ),
            event(task_id, TaskEventKind::EscrowRefunded { amount: dec!(100) }),
        ];

        let state = replay(&events).unwrap();
        assert_eq!(state.status, Cancelled);
        assert_eq!(state.escrow, Some(EscrowStatus::Refunded));
    }

    #[test]
    fn test_replay_empty_is_none() {
        assert!(replay(&[]).is_none());
    }

    #[test]
    fn test_event_kind_serde_round_trip() {
        let kind = TaskEventKind::EscrowReleased {
            tasker_id: Uuid::now_v7(),
            platform_fee: dec!(15.00),
            processing_fee: dec!(2.25),
            net_amount: dec!(132.75),
        };

        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"type\":\"EscrowReleased\""));

        let back: TaskEventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }
}
