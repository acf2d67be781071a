use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use room_access_entity::{AccessRule, PowerLevels, server_name};

use crate::config::AccessRulesConfig;

/// Power level content validation for the access rules
///
/// Room creation is held to the baseline defaults: creators may raise the
/// `invite` and `state_default` thresholds but never lower them. Under rules
/// that restrict power levels, nobody gets a non-zero level by default and
/// users from forbidden domains get no power at all, whenever the content is
/// sent.
pub struct PowerLevelValidator {
    config: Arc<AccessRulesConfig>,
}

impl PowerLevelValidator {
    pub fn new(config: Arc<AccessRulesConfig>) -> Self {
        Self { config }
    }

    /// Baseline power levels of a room created by `creator`
    pub fn default_power_levels(creator: &str) -> PowerLevels {
        PowerLevels::access_rules_defaults(creator)
    }

    /// Check if the content of a `m.room.power_levels` event is permitted under `rule`
    ///
    /// # Arguments
    /// * `content` - The content of the power levels event
    /// * `rule` - The access rule in force in the room
    /// * `baseline` - Default power levels of the room being created, required for
    ///   the creation-time floors to apply
    /// * `on_room_creation` - Whether the content is part of a createRoom request
    pub fn is_content_allowed(
        &self,
        content: &Map<String, Value>,
        rule: AccessRule,
        baseline: Option<&PowerLevels>,
        on_room_creation: bool,
    ) -> bool {
        if on_room_creation && let Some(baseline) = baseline {
            // Absent keys comply: they are filled in from the baseline afterwards
            let floors = [("invite", baseline.invite), ("state_default", baseline.state_default)];
            for (key, floor) in floors {
                if let Some(value) = content.get(key) {
                    match value.as_i64() {
                        Some(level) if level >= floor => {},
                        Some(level) => {
                            debug!("Power levels content lowers {} to {} (minimum {})", key, level, floor);
                            return false;
                        },
                        None => {
                            debug!("Power levels content has a non-integer {}: {}", key, value);
                            return false;
                        },
                    }
                }
            }
        }

        if !rule.requires_power_level_restrictions() {
            return true;
        }

        match content.get("users_default") {
            None => {},
            Some(value) if value.as_i64() == Some(0) => {},
            Some(value) => {
                debug!("Power levels content sets users_default to {} under {} rule", value, rule);
                return false;
            },
        }

        let Some(users) = content.get("users").and_then(Value::as_object) else {
            return true;
        };

        for (user_id, level) in users {
            let Some(server) = server_name(user_id) else {
                debug!("Power levels content names an invalid user ID {:?}", user_id);
                return false;
            };
            if self.config.is_forbidden_domain(server) && level.as_i64() != Some(0) {
                debug!(
                    "Power levels content gives {} to {} from forbidden domain {}",
                    level, user_id, server
                );
                return false;
            }
        }

        true
    }
}
