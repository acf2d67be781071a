use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, info};

use room_access_entity::event_types::{self, join_rules};
use room_access_entity::{
    ACCESS_RULES_TYPE, ADMIN_POWER_LEVEL, AccessRule, CreateRoomConfig, InitialStateEvent, PowerLevels, RoomPreset,
};

use crate::config::AccessRulesConfig;
use crate::error::AccessRulesError;
use crate::room::power_levels::PowerLevelValidator;

/// Vets and completes createRoom requests
///
/// The access rule, power levels and encryption of a new room are settled
/// here, before the host builds the room's initial state.
pub struct RoomCreationPolicy {
    config: Arc<AccessRulesConfig>,
    power_levels: PowerLevelValidator,
}

impl RoomCreationPolicy {
    pub fn new(config: Arc<AccessRulesConfig>) -> Self {
        let power_levels = PowerLevelValidator::new(config.clone());
        Self { config, power_levels }
    }

    /// Validate a createRoom request and return the configuration the room should be created with
    ///
    /// # Arguments
    /// * `requester` - The user creating the room
    /// * `is_admin` - Whether the requester is a server admin
    /// * `request` - The createRoom request as sent by the client
    ///
    /// # Returns
    /// * `Ok(CreateRoomConfig)` - The completed request
    /// * `Err(AccessRulesError)` - The request carries an access rule or power levels it may not use
    pub fn apply(
        &self,
        requester: &str,
        is_admin: bool,
        request: &CreateRoomConfig,
    ) -> Result<CreateRoomConfig, AccessRulesError> {
        let mut config = request.clone();

        if is_admin || self.config.is_bypass_user(requester) {
            debug!("Room creation by {} bypasses access rules", requester);
            return Ok(config);
        }

        let (declared_rule, join_rule) = scan_initial_state(&config)?;

        let rule = match declared_rule {
            Some(rule) => rule,
            None => {
                let rule = if config.is_direct { AccessRule::Direct } else { AccessRule::Restricted };
                config.initial_state.push(InitialStateEvent::new(
                    ACCESS_RULES_TYPE,
                    "",
                    object(json!({ "rule": rule.as_str() })),
                ));
                rule
            },
        };

        let is_public =
            join_rule.as_deref() == Some(join_rules::PUBLIC) || config.preset == Some(RoomPreset::PublicChat);
        if rule == AccessRule::Direct && is_public {
            debug!("Rejected public direct room requested by {}", requester);
            return Err(AccessRulesError::InvalidAccessRule);
        }

        let mut baseline = PowerLevelValidator::default_power_levels(requester);
        if config.preset == Some(RoomPreset::TrustedPrivateChat) {
            for invitee in &config.invite {
                baseline.grant(invitee, ADMIN_POWER_LEVEL);
            }
        }

        self.apply_power_levels(&mut config, rule, &baseline)?;

        if wants_default_encryption(&config, is_public) {
            config.initial_state.push(InitialStateEvent::new(
                event_types::ENCRYPTION,
                "",
                object(json!({ "algorithm": event_types::MEGOLM_ALGORITHM })),
            ));
        }

        info!("Room creation by {} accepted with access rule {}", requester, rule);
        Ok(config)
    }

    /// Validate the requested power levels and fill their gaps from `baseline`
    ///
    /// A `m.room.power_levels` entry in the initial state wins over
    /// `power_level_content_override` and is completed in place.
    fn apply_power_levels(
        &self,
        config: &mut CreateRoomConfig,
        rule: AccessRule,
        baseline: &PowerLevels,
    ) -> Result<(), AccessRulesError> {
        let empty = Map::new();
        let requested = config.power_level_content_override.as_ref().unwrap_or(&empty);
        if !self.power_levels.is_content_allowed(requested, rule, Some(baseline), true) {
            return Err(AccessRulesError::InvalidPowerLevelsOverride);
        }

        let mut initial_entry = None;
        for (index, event) in config.initial_state.iter().enumerate() {
            if event.event_type != event_types::POWER_LEVELS {
                continue;
            }
            if !self.power_levels.is_content_allowed(&event.content, rule, Some(baseline), true) {
                return Err(AccessRulesError::InvalidPowerLevelsContent);
            }
            initial_entry = Some(index);
        }

        let defaults = baseline.to_content();
        let effective = match initial_entry {
            Some(index) => Some(&mut config.initial_state[index].content),
            None => config.power_level_content_override.as_mut(),
        };

        match effective {
            Some(content) if !content.is_empty() => {
                for (key, value) in &defaults {
                    content.entry(key.clone()).or_insert_with(|| value.clone());
                }
            },
            _ => {
                debug!("No power levels requested, using the access rules defaults");
                config.power_level_content_override = Some(defaults);
            },
        }

        Ok(())
    }
}

/// Access rule and join rule declared in the initial state, last entry winning
fn scan_initial_state(config: &CreateRoomConfig) -> Result<(Option<AccessRule>, Option<String>), AccessRulesError> {
    let mut access_rule = None;
    let mut join_rule = None;

    for event in &config.initial_state {
        if event.event_type == ACCESS_RULES_TYPE {
            let rule: AccessRule = event
                .content_str("rule")
                .ok_or(AccessRulesError::InvalidAccessRule)?
                .parse()
                .map_err(|_| AccessRulesError::InvalidAccessRule)?;

            if rule.is_direct() != config.is_direct {
                debug!("Access rule {} does not match is_direct={}", rule, config.is_direct);
                return Err(AccessRulesError::InvalidAccessRule);
            }
            access_rule = Some(rule);
        }

        if event.event_type == event_types::JOIN_RULES {
            join_rule = event.content_str("join_rule").map(str::to_string);
        }
    }

    Ok((access_rule, join_rule))
}

fn wants_default_encryption(config: &CreateRoomConfig, is_public: bool) -> bool {
    if is_public || config.initial_state_event(event_types::ENCRYPTION, "").is_some() {
        return false;
    }

    let opted_out = config
        .initial_state_event(ACCESS_RULES_TYPE, "")
        .is_some_and(|event| event.content.get("encrypted") == Some(&Value::Bool(false)));
    !opted_out
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
