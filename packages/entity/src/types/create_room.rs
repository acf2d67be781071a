use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `preset` values of a createRoom request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPreset {
    PrivateChat,
    TrustedPrivateChat,
    PublicChat,
    /// Presets this module has no opinion about
    #[serde(other)]
    Other,
}

/// Entry of a createRoom `initial_state` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialStateEvent {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub state_key: String,

    #[serde(default)]
    pub content: Map<String, Value>,
}

impl InitialStateEvent {
    pub fn new(event_type: impl Into<String>, state_key: impl Into<String>, content: Map<String, Value>) -> Self {
        Self { event_type: event_type.into(), state_key: state_key.into(), content }
    }

    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }
}

/// Body of a createRoom request, as far as the access rules are concerned.
///
/// Fields the rules never look at are kept in `other` so that a finalized
/// config serializes back to the request the host received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateRoomConfig {
    #[serde(default)]
    pub is_direct: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<RoomPreset>,

    #[serde(default)]
    pub initial_state: Vec<InitialStateEvent>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invite: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_level_content_override: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl CreateRoomConfig {
    /// Latest initial state entry for `(event_type, state_key)`, matching how the
    /// host folds the list into room state
    pub fn initial_state_event(&self, event_type: &str, state_key: &str) -> Option<&InitialStateEvent> {
        self.initial_state
            .iter()
            .rev()
            .find(|event| event.event_type == event_type && event.state_key == state_key)
    }

    pub fn initial_state_of_type<'a>(
        &'a self,
        event_type: &'a str,
    ) -> impl Iterator<Item = &'a InitialStateEvent> + 'a {
        self.initial_state.iter().filter(move |event| event.event_type == event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let body = json!({
            "is_direct": true,
            "preset": "trusted_private_chat",
            "invite": ["@bob:example.com"],
            "name": "Lunch",
            "creation_content": { "m.federate": false }
        });

        let config: CreateRoomConfig = serde_json::from_value(body.clone()).expect("createRoom body");
        assert_eq!(config.preset, Some(RoomPreset::TrustedPrivateChat));
        assert_eq!(config.other.get("name"), Some(&json!("Lunch")));

        let back = serde_json::to_value(&config).expect("serialize config");
        assert_eq!(back["creation_content"], body["creation_content"]);
        assert_eq!(back["invite"], body["invite"]);
    }

    #[test]
    fn unrecognised_preset_is_other() {
        let config: CreateRoomConfig =
            serde_json::from_value(json!({ "preset": "space_chat" })).expect("createRoom body");
        assert_eq!(config.preset, Some(RoomPreset::Other));
    }
}
