use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use room_access_entity::event_types;
use room_access_entity::{
    ACCESS_RULES_TYPE, AccessRule, CreateRoomConfig, MembershipState, RoomStateSnapshot, RoomVisibility, StateEvent,
};

use crate::config::{AccessRulesConfig, ConfigError};
use crate::error::AccessRulesError;
use crate::room::creation::RoomCreationPolicy;
use crate::room::policies::{RoomPolicies, is_rule_transition_allowed};
use crate::room::state::{DerivedState, current_rule};
use crate::services::{AdminLookup, HttpIdentityLookup, IdentityLookup, PublicRoomDirectory};

/// State event types the access rules have an opinion on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    AccessRules,
    PowerLevels,
    Membership,
    JoinRules,
    RoomMetadata,
    Encryption,
    Other,
}

impl EventCategory {
    pub fn of(event_type: &str) -> Self {
        match event_type {
            ACCESS_RULES_TYPE => EventCategory::AccessRules,
            event_types::POWER_LEVELS => EventCategory::PowerLevels,
            event_types::MEMBER | event_types::THIRD_PARTY_INVITE => EventCategory::Membership,
            event_types::JOIN_RULES => EventCategory::JoinRules,
            event_types::AVATAR | event_types::NAME | event_types::TOPIC => EventCategory::RoomMetadata,
            event_types::ENCRYPTION => EventCategory::Encryption,
            _ => EventCategory::Other,
        }
    }
}

/// Entry points called by the homeserver
///
/// Holds the module configuration and the host services the decisions
/// depend on. Cheap to share behind an `Arc` across tasks.
pub struct AccessRulesEngine {
    config: Arc<AccessRulesConfig>,
    policies: RoomPolicies,
    creation: RoomCreationPolicy,
    admins: Arc<dyn AdminLookup>,
    directory: Arc<dyn PublicRoomDirectory>,
    identity: Arc<dyn IdentityLookup>,
}

impl AccessRulesEngine {
    pub fn new(
        config: AccessRulesConfig,
        admins: Arc<dyn AdminLookup>,
        directory: Arc<dyn PublicRoomDirectory>,
        identity: Arc<dyn IdentityLookup>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            policies: RoomPolicies::new(config.clone()),
            creation: RoomCreationPolicy::new(config.clone()),
            config,
            admins,
            directory,
            identity,
        }
    }

    /// Engine resolving third-party identifiers against the configured identity server
    pub fn with_identity_server(
        config: AccessRulesConfig,
        admins: Arc<dyn AdminLookup>,
        directory: Arc<dyn PublicRoomDirectory>,
    ) -> Result<Self, ConfigError> {
        let identity = Arc::new(HttpIdentityLookup::from_config(&config)?);
        Ok(Self::new(config, admins, directory, identity))
    }

    /// Decide whether `event` may be added to a room whose state before it is `snapshot`
    ///
    /// The second element is a replacement content, which this module never produces.
    pub async fn check_event_allowed(
        &self,
        event: &StateEvent,
        snapshot: &RoomStateSnapshot,
    ) -> (bool, Option<Map<String, Value>>) {
        (self.is_event_allowed(event, snapshot).await, None)
    }

    async fn is_event_allowed(&self, event: &StateEvent, snapshot: &RoomStateSnapshot) -> bool {
        if self.can_bypass_rules(&event.sender).await {
            return true;
        }

        if !event.is_state() {
            return true;
        }

        let state = DerivedState::from_snapshot(snapshot);
        let allowed = match EventCategory::of(&event.event_type) {
            EventCategory::AccessRules => self.on_rules_change(event, &state).await,
            EventCategory::PowerLevels => self.policies.on_power_levels_change(event, &state),
            EventCategory::Membership => {
                self.membership_bypass(event, snapshot).await || self.policies.on_membership_or_invite(event, &state)
            },
            EventCategory::JoinRules => self.policies.on_join_rule_change(event, &state),
            EventCategory::RoomMetadata => self.policies.on_room_metadata_change(&state),
            EventCategory::Encryption => self.policies.on_room_encryption_change(&state),
            EventCategory::Other => true,
        };

        if !allowed {
            warn!(
                "Denied {} event from {} in room {} under {} rule",
                event.event_type, event.sender, event.room_id, state.rule
            );
        }
        allowed
    }

    /// Complete a createRoom request, or reject it
    pub async fn on_create_room(
        &self,
        requester: &str,
        is_requester_admin: bool,
        config: &CreateRoomConfig,
    ) -> Result<CreateRoomConfig, AccessRulesError> {
        self.creation.apply(requester, is_requester_admin, config)
    }

    /// Whether a third-party identifier may be invited into a room with state `snapshot`
    pub async fn check_threepid_can_be_invited(
        &self,
        medium: &str,
        address: &str,
        snapshot: &RoomStateSnapshot,
    ) -> Result<bool, AccessRulesError> {
        if medium != event_types::medium::EMAIL {
            return Ok(true);
        }

        // Only "restricted" filters on the homeserver an address is bound to
        if current_rule(snapshot) != AccessRule::Restricted {
            return Ok(true);
        }

        if !is_canonical_email(address) {
            debug!("Refused third-party invite for non-canonical address {:?}", address);
            return Ok(false);
        }

        let homeserver = self.identity.homeserver_for(medium, address).await.map_err(|e| {
            error!("Identity server lookup failed: {}", e);
            AccessRulesError::IdentityLookup(e)
        })?;

        match homeserver {
            None => {
                debug!("Third-party address is not bound to any homeserver");
                Ok(false)
            },
            Some(server) if self.config.is_forbidden_domain(&server) => {
                warn!("Refused third-party invite for an address bound to forbidden server {}", server);
                Ok(false)
            },
            Some(_) => Ok(true),
        }
    }

    /// Whether a room may be published to, or removed from, the public room directory
    pub async fn check_visibility_can_be_modified(
        &self,
        room_id: &str,
        snapshot: &RoomStateSnapshot,
        new_visibility: RoomVisibility,
    ) -> bool {
        let rule = current_rule(snapshot);
        let allowed = self.policies.on_visibility_change(rule, new_visibility);
        if !allowed {
            debug!("Room {} with {} rule may not become {}", room_id, rule, new_visibility.as_str());
        }
        allowed
    }

    async fn on_rules_change(&self, event: &StateEvent, state: &DerivedState) -> bool {
        let Some(new_rule) = event.content_str("rule").and_then(|rule| rule.parse::<AccessRule>().ok()) else {
            debug!("Rejected unknown access rule {:?} in room {}", event.content.get("rule"), event.room_id);
            return false;
        };

        if new_rule == AccessRule::Direct && !self.policies.fits_direct_shape(state) {
            debug!(
                "Room {} has {} members and {} pending third-party invites, too many for direct",
                event.room_id,
                state.members.len(),
                state.invite_tokens.len()
            );
            return false;
        }

        if new_rule != AccessRule::Restricted {
            match self.directory.room_is_in_public_room_list(&event.room_id).await {
                Ok(false) => {},
                Ok(true) => {
                    debug!("Room {} is published, it must stay restricted", event.room_id);
                    return false;
                },
                Err(e) => {
                    error!("Public room list lookup for {} failed: {}", event.room_id, e);
                    return false;
                },
            }
        }

        is_rule_transition_allowed(state.rule_entry, new_rule)
    }

    /// Memberships vouched for by a bypass-eligible user skip the rules
    async fn membership_bypass(&self, event: &StateEvent, snapshot: &RoomStateSnapshot) -> bool {
        if event.event_type != event_types::MEMBER {
            return false;
        }

        match event.membership() {
            Some(MembershipState::Join) => {
                let Some(previous) = snapshot.get(event_types::MEMBER, event.state_key()) else {
                    return false;
                };
                previous.membership() == Some(MembershipState::Invite) && self.can_bypass_rules(&previous.sender).await
            },
            Some(MembershipState::Invite) => self.can_bypass_rules(event.state_key()).await,
            _ => false,
        }
    }

    async fn can_bypass_rules(&self, user_id: &str) -> bool {
        if self.config.is_bypass_user(user_id) {
            return true;
        }

        match self.admins.is_user_admin(user_id).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                error!("Admin lookup for {} failed: {}", user_id, e);
                false
            },
        }
    }
}

/// Whether `address` is a plain mailbox that parses back to itself
fn is_canonical_email(address: &str) -> bool {
    address
        .parse::<lettre::Address>()
        .is_ok_and(|parsed| parsed.to_string() == address)
}
