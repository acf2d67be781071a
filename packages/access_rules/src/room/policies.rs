use std::sync::Arc;

use tracing::{debug, warn};

use room_access_entity::event_types::{self, join_rules};
use room_access_entity::{AccessRule, MembershipState, RoomVisibility, StateEvent, server_name};

use crate::config::AccessRulesConfig;
use crate::room::power_levels::PowerLevelValidator;
use crate::room::state::{DerivedState, RuleEntry, invite_matches_third_party_token};

/// Per-event-type access rule policies
///
/// Every policy is a pure function of the candidate event and the facts
/// derived from the room state before that event. Bypass eligibility and
/// directory lookups are resolved by the caller before a policy runs.
pub struct RoomPolicies {
    config: Arc<AccessRulesConfig>,
    power_levels: PowerLevelValidator,
}

impl RoomPolicies {
    pub fn new(config: Arc<AccessRulesConfig>) -> Self {
        let power_levels = PowerLevelValidator::new(config.clone());
        Self { config, power_levels }
    }

    /// `m.room.power_levels` sent into an existing room
    pub fn on_power_levels_change(&self, event: &StateEvent, state: &DerivedState) -> bool {
        self.power_levels.is_content_allowed(&event.content, state.rule, None, false)
    }

    /// `m.room.member` and `m.room.third_party_invite` events, once bypasses are ruled out
    pub fn on_membership_or_invite(&self, event: &StateEvent, state: &DerivedState) -> bool {
        match state.rule {
            AccessRule::Restricted => self.on_membership_or_invite_restricted(event),
            AccessRule::Unrestricted => self.on_membership_or_invite_unrestricted(event, state),
            AccessRule::Direct => self.on_membership_or_invite_direct(event, state),
        }
    }

    /// "restricted": users from forbidden domains can neither join nor be invited.
    ///
    /// Third-party invites pass here because their addresses were already
    /// filtered against the identity server before the event was built. Only
    /// joins and invites are gated so that forbidden users who got in before
    /// the rule was enforced can still leave.
    pub fn on_membership_or_invite_restricted(&self, event: &StateEvent) -> bool {
        if event.event_type == event_types::THIRD_PARTY_INVITE {
            return true;
        }

        if !matches!(event.membership(), Some(MembershipState::Join | MembershipState::Invite)) {
            return true;
        }

        let target = event.state_key();
        match server_name(target) {
            Some(server) if self.config.is_forbidden_domain(server) => {
                warn!(
                    "Denied {:?} of {} in restricted room {}: forbidden domain",
                    event.membership(),
                    target,
                    event.room_id
                );
                false
            },
            Some(_) => true,
            None => {
                debug!("Denied membership for invalid user ID {:?} in room {}", target, event.room_id);
                false
            },
        }
    }

    /// "unrestricted": forbidden users need a pending invite to join
    pub fn on_membership_or_invite_unrestricted(&self, event: &StateEvent, state: &DerivedState) -> bool {
        if event.event_type != event_types::MEMBER || event.membership() != Some(MembershipState::Join) {
            return true;
        }

        let target = event.state_key();
        let Some(server) = server_name(target) else {
            debug!("Denied join for invalid user ID {:?} in room {}", target, event.room_id);
            return false;
        };

        if self.config.is_forbidden_domain(server) && !state.is_invited(target) {
            warn!("Denied uninvited join of {} from forbidden domain into room {}", target, event.room_id);
            return false;
        }

        true
    }

    /// "direct": nobody besides the creator and their first invitee.
    ///
    /// # Arguments
    /// * `event` - The membership or third-party invite event
    /// * `state` - Facts from the room state before the event
    pub fn on_membership_or_invite_direct(&self, event: &StateEvent, state: &DerivedState) -> bool {
        let is_third_party_invite = event.event_type == event_types::THIRD_PARTY_INVITE;
        let members = &state.members;
        let tokens = &state.invite_tokens;

        // At most one third-party invite may be in flight. A revocation reuses
        // the invite's token as state key, so it has to get through.
        if tokens.len() == 1 && is_third_party_invite {
            return state.has_invite_token(event.state_key());
        }

        if members.len() == 2 {
            // Someone who was one of the two parties would have been resolved to
            // their account and invited with m.room.member instead.
            if is_third_party_invite {
                debug!("Denied third-party invite into full direct room {}", event.room_id);
                return false;
            }
            return state.is_member(event.state_key());
        }

        // Alone in the room with one third-party invite pending: only the invitee
        // claiming that invite, or the sole member, may change membership.
        if members.len() == 1 && tokens.len() == 1 {
            let target = event.state_key();
            return invite_matches_third_party_token(event, &tokens[0]) || target == members[0];
        }

        true
    }

    /// `m.room.join_rules`
    pub fn on_join_rule_change(&self, event: &StateEvent, state: &DerivedState) -> bool {
        let new_join_rule = event.content_str("join_rule");

        if new_join_rule == Some(join_rules::PUBLIC) {
            return state.rule != AccessRule::Direct;
        }

        // Leaving "public" is only possible once the room is encrypted
        if state.is_public() && !state.encrypted {
            debug!("Denied join rule change away from public in unencrypted room {}", event.room_id);
            return false;
        }

        true
    }

    /// `m.room.name`, `m.room.topic` and `m.room.avatar` are frozen in direct chats
    pub fn on_room_metadata_change(&self, state: &DerivedState) -> bool {
        state.rule != AccessRule::Direct
    }

    /// `m.room.encryption` cannot be turned on in public rooms
    pub fn on_room_encryption_change(&self, state: &DerivedState) -> bool {
        !state.is_public()
    }

    /// Only a restricted room may be published to the public room directory
    pub fn on_visibility_change(&self, rule: AccessRule, new_visibility: RoomVisibility) -> bool {
        match new_visibility {
            RoomVisibility::Public => rule == AccessRule::Restricted,
            RoomVisibility::Private => true,
        }
    }

    /// Whether the room still fits the two-party shape of `direct`
    pub fn fits_direct_shape(&self, state: &DerivedState) -> bool {
        state.members.len() <= 2 && state.invite_tokens.len() <= 1
    }
}

/// One-way rule transitions: any valid rule may be set first, after which the
/// only move left is `restricted` to `unrestricted`.
pub fn is_rule_transition_allowed(previous: RuleEntry, new_rule: AccessRule) -> bool {
    match previous {
        RuleEntry::Unset => true,
        RuleEntry::Set(previous) => {
            previous == AccessRule::Restricted && new_rule == AccessRule::Unrestricted
        },
        RuleEntry::Invalid => false,
    }
}
