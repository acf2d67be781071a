#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Once};

use room_access_entity::event_types;
use room_access_entity::{ACCESS_RULES_TYPE, MembershipState, RoomStateSnapshot, StateEvent};
use room_access_rules::tasks::FIX_POWER_LEVELS_ACTION;
use room_access_rules::{
    AccessRulesConfig, AccessRulesEngine, AdminLookup, IdentityLookup, PublicRoomDirectory, RoomMaintenanceStore,
    ServiceError, TaskCheckpoint, TaskStatus, TaskStore,
};

pub const ROOM: &str = "!room:example.com";
pub const CREATOR: &str = "@creator:example.com";
pub const BYPASS_USER: &str = "@bypass:example.com";
pub const SERVER_ADMIN: &str = "@admin:example.com";
pub const FORBIDDEN_DOMAIN: &str = "evil.com";

static TRACING: Once = Once::new();

/// Log to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn test_config() -> AccessRulesConfig {
    let mut config = AccessRulesConfig::new("vector.im");
    config.bypass_for_users = vec![BYPASS_USER.to_string()];
    config.domains_forbidden_when_restricted = vec![FORBIDDEN_DOMAIN.to_string()];
    config
}

pub struct FakeAdmins(pub Vec<String>);

#[async_trait]
impl AdminLookup for FakeAdmins {
    async fn is_user_admin(&self, user_id: &str) -> Result<bool, ServiceError> {
        Ok(self.0.iter().any(|admin| admin == user_id))
    }
}

pub struct FakeDirectory(pub Vec<String>);

#[async_trait]
impl PublicRoomDirectory for FakeDirectory {
    async fn room_is_in_public_room_list(&self, room_id: &str) -> Result<bool, ServiceError> {
        Ok(self.0.iter().any(|room| room == room_id))
    }
}

/// Identity server answering from a fixed address book
pub struct FakeIdentity(pub HashMap<String, String>);

#[async_trait]
impl IdentityLookup for FakeIdentity {
    async fn homeserver_for(&self, _medium: &str, address: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.0.get(address).cloned())
    }
}

/// Engine with one server admin, an empty directory and identity server
pub fn engine() -> AccessRulesEngine {
    engine_with_directory(Vec::new())
}

pub fn engine_with_directory(published_rooms: Vec<String>) -> AccessRulesEngine {
    init_tracing();
    AccessRulesEngine::new(
        test_config(),
        Arc::new(FakeAdmins(vec![SERVER_ADMIN.to_string()])),
        Arc::new(FakeDirectory(published_rooms)),
        Arc::new(FakeIdentity(HashMap::new())),
    )
}

pub fn rules(rule: &str) -> StateEvent {
    StateEvent::new_state(ROOM, CREATOR, ACCESS_RULES_TYPE, "", json!({ "rule": rule }))
}

pub fn member(sender: &str, target: &str, membership: &str) -> StateEvent {
    StateEvent::new_state(ROOM, sender, event_types::MEMBER, target, json!({ "membership": membership }))
}

pub fn third_party_invite(sender: &str, token: &str) -> StateEvent {
    StateEvent::new_state(
        ROOM,
        sender,
        event_types::THIRD_PARTY_INVITE,
        token,
        json!({
            "display_name": "b...@example.com",
            "key_validity_url": "https://vector.im/validity",
            "public_key": "key",
        }),
    )
}

pub fn revoked_third_party_invite(sender: &str, token: &str) -> StateEvent {
    StateEvent::new_state(ROOM, sender, event_types::THIRD_PARTY_INVITE, token, json!({}))
}

pub fn join_rules(rule: &str) -> StateEvent {
    StateEvent::new_state(ROOM, CREATOR, event_types::JOIN_RULES, "", json!({ "join_rule": rule }))
}

pub fn encryption() -> StateEvent {
    let content = json!({ "algorithm": event_types::MEGOLM_ALGORITHM });
    StateEvent::new_state(ROOM, CREATOR, event_types::ENCRYPTION, "", content)
}

/// Snapshot of a room created by `CREATOR` under `rule`
pub fn room_with_rule(rule: &str) -> RoomStateSnapshot {
    RoomStateSnapshot::new().with(rules(rule)).with(member(CREATOR, CREATOR, "join"))
}

#[derive(Default)]
pub struct RoomFixture {
    pub state: RoomStateSnapshot,
    pub local_users: Vec<(String, MembershipState)>,
}

/// Room storage kept in memory, recording every event sent
#[derive(Default)]
pub struct InMemoryRooms {
    pub rooms: BTreeMap<String, RoomFixture>,
    pub sent: Mutex<Vec<StateEvent>>,
    pub reject_sends: bool,
    pub cursors: Mutex<Vec<Option<String>>>,
}

impl InMemoryRooms {
    pub fn sent_events(&self) -> Vec<StateEvent> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RoomMaintenanceStore for InMemoryRooms {
    async fn room_ids_after(&self, after: Option<String>, limit: usize) -> Result<Vec<String>, ServiceError> {
        if let Ok(mut cursors) = self.cursors.lock() {
            cursors.push(after.clone());
        }
        Ok(self
            .rooms
            .keys()
            .filter(|room_id| after.as_ref().is_none_or(|after| *room_id > after))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn local_users_related_to_room(
        &self,
        room_id: &str,
    ) -> Result<Vec<(String, MembershipState)>, ServiceError> {
        Ok(self.rooms.get(room_id).map(|room| room.local_users.clone()).unwrap_or_default())
    }

    async fn current_state_event(
        &self,
        room_id: &str,
        event_type: &str,
        state_key: &str,
    ) -> Result<Option<StateEvent>, ServiceError> {
        Ok(self
            .rooms
            .get(room_id)
            .and_then(|room| room.state.get(event_type, state_key))
            .cloned())
    }

    async fn member_state_keys(&self, room_id: &str) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .rooms
            .get(room_id)
            .map(|room| room.state.of_type(event_types::MEMBER).map(|e| e.state_key().to_string()).collect())
            .unwrap_or_default())
    }

    async fn send_state_event(&self, event: StateEvent) -> Result<(), ServiceError> {
        if self.reject_sends {
            return Err(ServiceError::Storage("sender lacks permission".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| ServiceError::Storage("poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

/// Task scheduler storage kept in memory
#[derive(Default)]
pub struct InMemoryTasks {
    pub queued: Mutex<Vec<String>>,
    pub completed: Mutex<Vec<String>>,
    pub checkpoint: Mutex<Option<TaskCheckpoint>>,
    pub saved: Mutex<Vec<TaskCheckpoint>>,
}

impl InMemoryTasks {
    /// Store left behind by a process that stopped after finishing the batch ending at `room_id`
    pub fn resuming_after(room_id: &str) -> Self {
        let tasks = Self::default();
        if let Ok(mut queued) = tasks.queued.lock() {
            queued.push(FIX_POWER_LEVELS_ACTION.to_string());
        }
        if let Ok(mut checkpoint) = tasks.checkpoint.lock() {
            *checkpoint = Some(TaskCheckpoint { last_room_id: Some(room_id.to_string()) });
        }
        tasks
    }
}

fn poisoned<T>(_: T) -> ServiceError {
    ServiceError::Storage("poisoned".to_string())
}

#[async_trait]
impl TaskStore for InMemoryTasks {
    async fn task_status(&self, action: &str) -> Result<Option<TaskStatus>, ServiceError> {
        if self.completed.lock().map_err(poisoned)?.iter().any(|done| done == action) {
            return Ok(Some(TaskStatus::Complete));
        }
        let pending = self.queued.lock().map_err(poisoned)?.iter().any(|queued| queued == action);
        Ok(pending.then_some(TaskStatus::Pending))
    }

    async fn schedule_task(&self, action: &str) -> Result<(), ServiceError> {
        self.queued.lock().map_err(poisoned)?.push(action.to_string());
        Ok(())
    }

    async fn load_checkpoint(&self, _action: &str) -> Result<Option<TaskCheckpoint>, ServiceError> {
        Ok(self.checkpoint.lock().map_err(poisoned)?.clone())
    }

    async fn save_checkpoint(&self, _action: &str, checkpoint: &TaskCheckpoint) -> Result<(), ServiceError> {
        *self.checkpoint.lock().map_err(poisoned)? = Some(checkpoint.clone());
        self.saved.lock().map_err(poisoned)?.push(checkpoint.clone());
        Ok(())
    }

    async fn complete_task(&self, action: &str) -> Result<(), ServiceError> {
        self.queued.lock().map_err(poisoned)?.retain(|queued| queued != action);
        self.completed.lock().map_err(poisoned)?.push(action.to_string());
        Ok(())
    }
}
