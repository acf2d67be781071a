//! Host-provided collaborators the access rules depend on.
//!
//! The engine never reaches into storage or the network on its own: every
//! lookup goes through one of these traits, injected at construction.

pub mod identity;

use async_trait::async_trait;
use room_access_entity::{MembershipState, StateEvent};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

pub use identity::HttpIdentityLookup;

/// Server admin lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminLookup: Send + Sync {
    async fn is_user_admin(&self, user_id: &str) -> Result<bool, ServiceError>;
}

/// Public room directory lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PublicRoomDirectory: Send + Sync {
    async fn room_is_in_public_room_list(&self, room_id: &str) -> Result<bool, ServiceError>;
}

/// Maps a third-party identifier to the homeserver it is bound to
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// `Ok(None)` when the identifier is not bound to any homeserver
    async fn homeserver_for(&self, medium: &str, address: &str) -> Result<Option<String>, ServiceError>;
}

/// Room storage used by the power level repair task
#[async_trait]
pub trait RoomMaintenanceStore: Send + Sync {
    /// Up to `limit` room IDs strictly greater than `after`, in ascending order
    async fn room_ids_after(&self, after: Option<String>, limit: usize) -> Result<Vec<String>, ServiceError>;

    /// Local users with a membership in the room, with that membership
    async fn local_users_related_to_room(
        &self,
        room_id: &str,
    ) -> Result<Vec<(String, MembershipState)>, ServiceError>;

    async fn current_state_event(
        &self,
        room_id: &str,
        event_type: &str,
        state_key: &str,
    ) -> Result<Option<StateEvent>, ServiceError>;

    /// State keys of every `m.room.member` entry in the room's current state
    async fn member_state_keys(&self, room_id: &str) -> Result<Vec<String>, ServiceError>;

    /// Create, sign and send a state event on behalf of a local user
    async fn send_state_event(&self, event: StateEvent) -> Result<(), ServiceError>;
}

/// Progress of a resumable background task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCheckpoint {
    /// Last room whose batch was fully processed
    pub last_room_id: Option<String>,
}

/// Lifecycle of a stored background task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued or interrupted, still to be run
    Pending,
    Complete,
}

/// Scheduler storage for resumable background tasks
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Status of the task stored for `action`, `None` if it was never scheduled
    async fn task_status(&self, action: &str) -> Result<Option<TaskStatus>, ServiceError>;

    async fn schedule_task(&self, action: &str) -> Result<(), ServiceError>;

    async fn load_checkpoint(&self, action: &str) -> Result<Option<TaskCheckpoint>, ServiceError>;

    async fn save_checkpoint(&self, action: &str, checkpoint: &TaskCheckpoint) -> Result<(), ServiceError>;

    async fn complete_task(&self, action: &str) -> Result<(), ServiceError>;
}
