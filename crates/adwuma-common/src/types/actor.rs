//! Actor identity and roles
//!
//! The engine assumes a caller already carries an authenticated identity;
//! authorization here is purely role + relationship checks against a task.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role an authenticated actor acts under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorRole {
    /// Posts tasks and funds escrows
    Client,
    /// Claims and performs tasks, receives payouts
    Tasker,
    /// Resolves disputes
    Admin,
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActorRole::Client => "CLIENT",
            ActorRole::Tasker => "TASKER",
            ActorRole::Admin => "ADMIN",
        };
        f.write_str(s)
    }
}

/// An authenticated actor invoking a core operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: Uuid, role: ActorRole) -> Self {
        Self { id, role }
    }

    pub fn client(id: Uuid) -> Self {
        Self::new(id, ActorRole::Client)
    }

    pub fn tasker(id: Uuid) -> Self {
        Self::new(id, ActorRole::Tasker)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, ActorRole::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(ActorRole::Tasker.to_string(), "TASKER");
        assert_eq!(ActorRole::Admin.to_string(), "ADMIN");
    }
}
