//! # Adwuma Engine
//!
//! Task lifecycle state machine coupled to escrow-based settlement.
//!
//! ## Components
//!
//! - [`TaskLifecycle`]: validates status transitions and applies the
//!   matching escrow operation in one atomic commit
//! - [`EscrowLedger`]: per-task fund state with monotonic transitions and
//!   balance conservation
//! - [`event`]: append-only per-task history with state reconstruction by
//!   replay
//! - [`MarketStore`]: transactional storage seam with optimistic versioning
//!   ([`MemoryStore`] for tests and embedding)
//! - [`NotificationSink`]: fire-and-forget lifecycle event delivery

pub mod escrow;
pub mod event;
pub mod lifecycle;
pub mod notify;
pub mod store;
pub mod task;

// Re-export commonly used types at crate root
pub use escrow::{EscrowAccount, EscrowLedger, EscrowStatus, PayoutAllocation};
pub use event::{replay, ReplayedState, TaskEvent, TaskEventKind};
pub use lifecycle::{DisputeDecision, TaskLifecycle};
pub use notify::{ChannelSink, NotificationSink, NullSink, TracingSink};
pub use store::{MarketStore, MemoryStore, TransitionCommit};
pub use task::{EdgeActor, NewTask, Task, TaskCategory, TaskPriority, TaskStatus};
