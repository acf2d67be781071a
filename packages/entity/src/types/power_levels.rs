use crate::types::event_types;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Power level given to room creators, and to both parties of a trusted private chat
pub const ADMIN_POWER_LEVEL: i64 = 100;

/// Power levels for a Matrix room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerLevels {
    /// Power levels for specific users
    #[serde(default)]
    pub users: BTreeMap<String, i64>,

    /// Default power level for users
    #[serde(default)]
    pub users_default: i64,

    /// Power levels for specific event types
    #[serde(default)]
    pub events: BTreeMap<String, i64>,

    /// Default power level for events
    #[serde(default)]
    pub events_default: i64,

    /// Power level required to send state events
    #[serde(default = "default_state_default")]
    pub state_default: i64,

    /// Power level required to ban users
    #[serde(default = "default_moderator")]
    pub ban: i64,

    /// Power level required to kick users
    #[serde(default = "default_moderator")]
    pub kick: i64,

    /// Power level required to redact events
    #[serde(default = "default_moderator")]
    pub redact: i64,

    /// Power level required to invite users
    #[serde(default = "default_moderator")]
    pub invite: i64,
}

fn default_state_default() -> i64 { 100 }
fn default_moderator() -> i64 { 50 }

impl PowerLevels {
    /// Power levels applied to rooms whose creator did not override them.
    ///
    /// These differ from the Matrix defaults: `state_default` and `invite` are
    /// raised so only moderators invite and only admins touch other state, while
    /// live location sharing stays open to everyone.
    pub fn access_rules_defaults(creator_user_id: &str) -> Self {
        let events = [
            (event_types::NAME, 50),
            (event_types::POWER_LEVELS, 100),
            (event_types::HISTORY_VISIBILITY, 100),
            (event_types::CANONICAL_ALIAS, 50),
            (event_types::AVATAR, 50),
            (event_types::TOMBSTONE, 100),
            (event_types::SERVER_ACL, 100),
            (event_types::ENCRYPTION, 100),
            (event_types::LOCATION_LIVE_SHARE, 0),
            (event_types::LOCATION_LIVE_SHARE_MSC, 0),
        ]
        .into_iter()
        .map(|(event_type, level)| (event_type.to_string(), level))
        .collect();

        let mut users = BTreeMap::new();
        users.insert(creator_user_id.to_string(), ADMIN_POWER_LEVEL);

        Self {
            users,
            users_default: 0,
            events,
            events_default: 0,
            state_default: default_state_default(),
            ban: default_moderator(),
            kick: default_moderator(),
            redact: default_moderator(),
            invite: default_moderator(),
        }
    }

    /// Give `user_id` the given level, replacing any previous value
    pub fn grant(&mut self, user_id: &str, level: i64) {
        self.users.insert(user_id.to_string(), level);
    }

    /// Render as `m.room.power_levels` event content
    pub fn to_content(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct of integers and string-keyed maps always serializes to an object
            _ => Map::new(),
        }
    }
}
