//! Task model and status state machine
//!
//! The status graph is owned here, as a single exhaustive table. UI-facing
//! concerns (labels, badge colors, allowed actions) are derived from the
//! same table rather than re-encoded per screen.
//!
//! ```text
//! CREATED -> ASSIGNED -> EN_ROUTE -> ON_SITE -> IN_PROGRESS -> COMPLETED
//!    |           |           |           |           |
//!    +-----------+-----------+-----------+           +-> DISPUTED -> COMPLETED
//!                      |                                     |
//!                  CANCELLED  <------------------------------+
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adwuma_common::money::is_valid_amount;
use adwuma_common::{Actor, ActorRole, PaymentMethodRef, TaskError, MIN_TASK_PRICE};

/// Task status, one variant per lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Created,
    Assigned,
    EnRoute,
    OnSite,
    InProgress,
    Completed,
    Cancelled,
    Disputed,
}

/// Who may drive a given edge of the status graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeActor {
    /// Any tasker other than the task's client (the claim edge)
    ClaimingTasker,
    /// The tasker currently assigned to the task
    AssignedTasker,
    /// The client who posted the task
    OwningClient,
    /// Either side of the task (owning client or assigned tasker)
    Party,
    /// Platform admin (dispute resolution)
    Admin,
}

impl TaskStatus {
    /// The allowed-edge table: who may move a task from `self` to `to`
    ///
    /// Returns `None` for edges that do not exist.
    pub fn edge(self, to: TaskStatus) -> Option<EdgeActor> {
        use TaskStatus::*;
        match (self, to) {
            (Created, Assigned) => Some(EdgeActor::ClaimingTasker),
            (Created, Cancelled) => Some(EdgeActor::OwningClient),
            (Assigned, EnRoute) => Some(EdgeActor::AssignedTasker),
            (Assigned, Cancelled) => Some(EdgeActor::Party),
            (EnRoute, OnSite) => Some(EdgeActor::AssignedTasker),
            (EnRoute, Cancelled) => Some(EdgeActor::Party),
            (OnSite, InProgress) => Some(EdgeActor::AssignedTasker),
            (OnSite, Cancelled) => Some(EdgeActor::Party),
            (InProgress, Completed) => Some(EdgeActor::Party),
            (InProgress, Disputed) => Some(EdgeActor::Party),
            (Disputed, Completed) => Some(EdgeActor::Admin),
            (Disputed, Cancelled) => Some(EdgeActor::Admin),
            _ => None,
        }
    }

    /// Terminal for the task itself
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// Statuses a task in this state can move into
    pub fn allowed_targets(self) -> Vec<TaskStatus> {
        use TaskStatus::*;
        [
            Created, Assigned, EnRoute, OnSite, InProgress, Completed, Cancelled, Disputed,
        ]
        .into_iter()
        .filter(|to| self.edge(*to).is_some())
        .collect()
    }

    /// Human-readable label for UI surfaces
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Created => "Open",
            TaskStatus::Assigned => "Assigned",
            TaskStatus::EnRoute => "Tasker en route",
            TaskStatus::OnSite => "Tasker on site",
            TaskStatus::InProgress => "In progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Cancelled => "Cancelled",
            TaskStatus::Disputed => "In dispute",
        }
    }

    /// Badge color token for UI surfaces
    pub fn badge_color(self) -> &'static str {
        match self {
            TaskStatus::Created => "gray",
            TaskStatus::Assigned | TaskStatus::EnRoute | TaskStatus::OnSite => "blue",
            TaskStatus::InProgress => "amber",
            TaskStatus::Completed => "green",
            TaskStatus::Cancelled => "red",
            TaskStatus::Disputed => "purple",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Created => "CREATED",
            TaskStatus::Assigned => "ASSIGNED",
            TaskStatus::EnRoute => "EN_ROUTE",
            TaskStatus::OnSite => "ON_SITE",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Cancelled => "CANCELLED",
            TaskStatus::Disputed => "DISPUTED",
        };
        f.write_str(s)
    }
}

/// Task category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskCategory {
    Cleaning,
    Maintenance,
    Delivery,
    Transport,
    Consultation,
    Other,
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub client_id: Uuid,
    pub category: TaskCategory,
    pub title: String,
    pub description: String,
    pub price_gross: Decimal,
    pub priority: TaskPriority,
    pub is_urgent: bool,
    pub payment_method: PaymentMethodRef,
    pub scheduled_at: DateTime<Utc>,
}

/// A unit of paid work connecting a client and a tasker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub client_id: Uuid,
    /// Set on claim; `None` only while CREATED (or cancelled from CREATED)
    pub tasker_id: Option<Uuid>,
    pub category: TaskCategory,
    pub title: String,
    pub description: String,
    /// Gross price in GHS; immutable once the escrow is locked
    pub price_gross: Decimal,
    pub priority: TaskPriority,
    pub is_urgent: bool,
    /// Rail the client funds the escrow through
    pub payment_method: PaymentMethodRef,
    pub scheduled_at: DateTime<Utc>,
    pub status: TaskStatus,
    /// Monotonic counter for optimistic concurrency
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Validate and build a new task in CREATED at version 0
    pub fn create(new: NewTask) -> Result<Self, TaskError> {
        if new.title.trim().len() < 5 {
            return Err(TaskError::Invalid(
                "title must be at least 5 characters".into(),
            ));
        }
        if new.description.trim().len() < 20 {
            return Err(TaskError::Invalid(
                "description must be at least 20 characters".into(),
            ));
        }
        if !is_valid_amount(new.price_gross) {
            return Err(TaskError::Invalid(format!(
                "price {} is not a valid GHS amount",
                new.price_gross
            )));
        }
        if new.price_gross < MIN_TASK_PRICE {
            return Err(TaskError::Invalid(format!(
                "minimum task price is GHS {}",
                MIN_TASK_PRICE
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            client_id: new.client_id,
            tasker_id: None,
            category: new.category,
            title: new.title,
            description: new.description,
            price_gross: new.price_gross,
            priority: new.priority,
            is_urgent: new.is_urgent,
            payment_method: new.payment_method,
            scheduled_at: new.scheduled_at,
            status: TaskStatus::Created,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check that `actor` satisfies the edge's actor requirement
    pub fn authorize(&self, actor: Actor, edge: EdgeActor) -> Result<(), TaskError> {
        let ok = match edge {
            EdgeActor::ClaimingTasker => {
                actor.role == ActorRole::Tasker && actor.id != self.client_id
            }
            EdgeActor::AssignedTasker => {
                actor.role == ActorRole::Tasker && self.tasker_id == Some(actor.id)
            }
            EdgeActor::OwningClient => {
                actor.role == ActorRole::Client && actor.id == self.client_id
            }
            EdgeActor::Party => {
                (actor.role == ActorRole::Client && actor.id == self.client_id)
                    || (actor.role == ActorRole::Tasker && self.tasker_id == Some(actor.id))
            }
            EdgeActor::Admin => actor.role == ActorRole::Admin,
        };

        if ok {
            Ok(())
        } else {
            Err(TaskError::UnauthorizedActor {
                actor: actor.id,
                role: actor.role,
            })
        }
    }

    /// Apply a validated transition: set status, bump version, touch timestamps
    ///
    /// The claim edge also records the claiming tasker.
    pub fn apply_transition(&mut self, to: TaskStatus, actor: Actor) {
        if self.status == TaskStatus::Created && to == TaskStatus::Assigned {
            self.tasker_id = Some(actor.id);
        }
        self.status = to;
        self.version += 1;
        self.updated_at = Utc::now();
    }
}
