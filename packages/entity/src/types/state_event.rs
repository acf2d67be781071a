use crate::types::MembershipState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event as seen by the access rules: the PDU fields the rules read, nothing more
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateEvent {
    /// Unique event identifier, absent for events that are still being built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    /// Room this event belongs to
    pub room_id: String,

    /// Event sender user ID
    pub sender: String,

    /// Event type
    #[serde(rename = "type")]
    pub event_type: String,

    /// State key for state events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,

    /// Event content
    #[serde(default)]
    pub content: Map<String, Value>,
}

impl StateEvent {
    /// Build a state event. Non-object content is stored as empty content.
    pub fn new_state(
        room_id: impl Into<String>,
        sender: impl Into<String>,
        event_type: impl Into<String>,
        state_key: impl Into<String>,
        content: Value,
    ) -> Self {
        Self {
            event_id: None,
            room_id: room_id.into(),
            sender: sender.into(),
            event_type: event_type.into(),
            state_key: Some(state_key.into()),
            content: into_object(content),
        }
    }

    /// Build a timeline (non-state) event
    pub fn new_message(
        room_id: impl Into<String>,
        sender: impl Into<String>,
        event_type: impl Into<String>,
        content: Value,
    ) -> Self {
        Self {
            event_id: None,
            room_id: room_id.into(),
            sender: sender.into(),
            event_type: event_type.into(),
            state_key: None,
            content: into_object(content),
        }
    }

    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// State key, or the empty string for non-state events
    pub fn state_key(&self) -> &str {
        self.state_key.as_deref().unwrap_or("")
    }

    /// Empty content marks a revoked third-party invite or a redacted state entry
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    /// Membership carried by an `m.room.member` event, `None` if missing or unknown
    pub fn membership(&self) -> Option<MembershipState> {
        self.content_str("membership").and_then(MembershipState::parse)
    }
}

fn into_object(content: Value) -> Map<String, Value> {
    match content {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
