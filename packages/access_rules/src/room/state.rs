use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use room_access_entity::event_types;
use room_access_entity::{ACCESS_RULES_TYPE, AccessRule, MembershipState, RoomStateSnapshot, StateEvent};

/// What the room state says about the access rule entry itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEntry {
    /// No `im.vector.room.access_rules` state yet
    Unset,
    /// A valid rule is in force
    Set(AccessRule),
    /// An entry exists but its `rule` is missing or unknown
    Invalid,
}

impl RuleEntry {
    pub fn from_snapshot(snapshot: &RoomStateSnapshot) -> Self {
        let Some(event) = snapshot.get(ACCESS_RULES_TYPE, "") else {
            return RuleEntry::Unset;
        };
        match event.content_str("rule").map(str::parse::<AccessRule>) {
            Some(Ok(rule)) => RuleEntry::Set(rule),
            _ => RuleEntry::Invalid,
        }
    }
}

/// Rule in force for the room. Absent, empty or unknown rules resolve to `restricted`.
pub fn current_rule(snapshot: &RoomStateSnapshot) -> AccessRule {
    let Some(event) = snapshot.get(ACCESS_RULES_TYPE, "") else {
        return AccessRule::Restricted;
    };

    match event.content_str("rule") {
        None | Some("") => AccessRule::Restricted,
        Some(value) => value.parse().unwrap_or_else(|_| {
            debug!("Room {} carries unknown access rule {:?}, applying restricted", event.room_id, value);
            AccessRule::Restricted
        }),
    }
}

/// Join rule of the room, if one was ever set
pub fn join_rule(snapshot: &RoomStateSnapshot) -> Option<String> {
    snapshot
        .get(event_types::JOIN_RULES, "")
        .and_then(|event| event.content_str("join_rule"))
        .map(str::to_string)
}

/// Everyone who has a membership entry, whatever the membership, and the
/// tokens of third-party invites that have not been revoked.
///
/// Revoking a third-party invite replaces it with an empty-content entry, so
/// skipping empty content is all it takes to leave revoked tokens out.
pub fn members_and_invite_tokens(snapshot: &RoomStateSnapshot) -> (Vec<String>, Vec<String>) {
    let mut members = Vec::new();
    let mut tokens = Vec::new();

    for ((event_type, state_key), event) in snapshot.iter() {
        if !event.has_content() {
            continue;
        }
        if event_type == event_types::MEMBER {
            members.push(state_key.clone());
        } else if event_type == event_types::THIRD_PARTY_INVITE {
            tokens.push(state_key.clone());
        }
    }

    members.sort();
    tokens.sort();
    (members, tokens)
}

/// Whether `user_id` currently holds a pending invite
pub fn user_is_invited(user_id: &str, snapshot: &RoomStateSnapshot) -> bool {
    snapshot
        .get(event_types::MEMBER, user_id)
        .is_some_and(|event| event.membership() == Some(MembershipState::Invite))
}

/// Whether a membership event claims the third-party invite identified by `token`
pub fn invite_matches_third_party_token(membership_event: &StateEvent, token: &str) -> bool {
    membership_event
        .content
        .get("third_party_invite")
        .and_then(|invite| invite.get("signed"))
        .and_then(|signed| signed.get("token"))
        .and_then(Value::as_str)
        .is_some_and(|signed_token| signed_token == token)
}

/// Whether encryption has ever been enabled in the room
pub fn is_encrypted(snapshot: &RoomStateSnapshot) -> bool {
    snapshot.contains(event_types::ENCRYPTION, "")
}

/// Facts derived once from the pre-event state and shared by every policy
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedState {
    pub rule: AccessRule,
    pub rule_entry: RuleEntry,
    pub join_rule: Option<String>,
    pub members: Vec<String>,
    pub invite_tokens: Vec<String>,
    pub invited_users: BTreeSet<String>,
    pub encrypted: bool,
}

impl DerivedState {
    pub fn from_snapshot(snapshot: &RoomStateSnapshot) -> Self {
        let (members, invite_tokens) = members_and_invite_tokens(snapshot);
        let invited_users = snapshot
            .of_type(event_types::MEMBER)
            .filter(|event| event.membership() == Some(MembershipState::Invite))
            .map(|event| event.state_key().to_string())
            .collect();

        Self {
            rule: current_rule(snapshot),
            rule_entry: RuleEntry::from_snapshot(snapshot),
            join_rule: join_rule(snapshot),
            members,
            invite_tokens,
            invited_users,
            encrypted: is_encrypted(snapshot),
        }
    }

    pub fn is_public(&self) -> bool {
        self.join_rule.as_deref() == Some(event_types::join_rules::PUBLIC)
    }

    pub fn is_invited(&self, user_id: &str) -> bool {
        self.invited_users.contains(user_id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|member| member == user_id)
    }

    pub fn has_invite_token(&self, token: &str) -> bool {
        self.invite_tokens.iter().any(|t| t == token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ROOM: &str = "!room:example.com";

    fn state(event_type: &str, state_key: &str, content: Value) -> StateEvent {
        StateEvent::new_state(ROOM, "@creator:example.com", event_type, state_key, content)
    }

    fn member(user_id: &str, membership: &str) -> StateEvent {
        state(event_types::MEMBER, user_id, json!({ "membership": membership }))
    }

    mod rule_tests {
        use super::*;

        #[test]
        fn missing_rule_defaults_to_restricted() {
            assert_eq!(current_rule(&RoomStateSnapshot::new()), AccessRule::Restricted);
            assert_eq!(RuleEntry::from_snapshot(&RoomStateSnapshot::new()), RuleEntry::Unset);
        }

        #[test]
        fn stored_rule_is_returned() {
            let snapshot = RoomStateSnapshot::new()
                .with(state(ACCESS_RULES_TYPE, "", json!({ "rule": "direct" })));
            assert_eq!(current_rule(&snapshot), AccessRule::Direct);
            assert_eq!(RuleEntry::from_snapshot(&snapshot), RuleEntry::Set(AccessRule::Direct));
        }

        #[test]
        fn empty_or_unknown_rule_resolves_to_restricted() {
            for content in [json!({}), json!({ "rule": "" }), json!({ "rule": "everyone" }), json!({ "rule": 3 })] {
                let snapshot = RoomStateSnapshot::new().with(state(ACCESS_RULES_TYPE, "", content.clone()));
                assert_eq!(current_rule(&snapshot), AccessRule::Restricted, "{content}");
                assert_eq!(RuleEntry::from_snapshot(&snapshot), RuleEntry::Invalid, "{content}");
            }
        }

        #[test]
        fn rule_with_non_empty_state_key_is_ignored() {
            let snapshot = RoomStateSnapshot::new()
                .with(state(ACCESS_RULES_TYPE, "other", json!({ "rule": "direct" })));
            assert_eq!(current_rule(&snapshot), AccessRule::Restricted);
        }
    }

    mod roster_tests {
        use super::*;

        #[test]
        fn members_include_every_membership_and_skip_empty_content() {
            let snapshot: RoomStateSnapshot = [
                member("@a:x", "join"),
                member("@b:x", "leave"),
                member("@c:x", "ban"),
                state(event_types::MEMBER, "@redacted:x", json!({})),
            ]
            .into_iter()
            .collect();

            let (members, tokens) = members_and_invite_tokens(&snapshot);
            assert_eq!(members, vec!["@a:x", "@b:x", "@c:x"]);
            assert!(tokens.is_empty());
        }

        #[test]
        fn revoked_third_party_invites_are_not_tokens() {
            let snapshot: RoomStateSnapshot = [
                state(event_types::THIRD_PARTY_INVITE, "live", json!({ "display_name": "a...@e.com" })),
                state(event_types::THIRD_PARTY_INVITE, "revoked", json!({})),
            ]
            .into_iter()
            .collect();

            let (_, tokens) = members_and_invite_tokens(&snapshot);
            assert_eq!(tokens, vec!["live"]);
        }

        #[test]
        fn invited_users_only_count_pending_invites() {
            let snapshot: RoomStateSnapshot =
                [member("@a:x", "invite"), member("@b:x", "join")].into_iter().collect();

            assert!(user_is_invited("@a:x", &snapshot));
            assert!(!user_is_invited("@b:x", &snapshot));
            assert!(!user_is_invited("@c:x", &snapshot));

            let derived = DerivedState::from_snapshot(&snapshot);
            assert!(derived.is_invited("@a:x"));
            assert!(!derived.is_invited("@b:x"));
        }
    }

    mod misc_tests {
        use super::*;

        #[test]
        fn join_rule_and_encryption() {
            let snapshot: RoomStateSnapshot = [
                state(event_types::JOIN_RULES, "", json!({ "join_rule": "public" })),
                state(event_types::ENCRYPTION, "", json!({ "algorithm": "m.megolm.v1.aes-sha2" })),
            ]
            .into_iter()
            .collect();

            assert_eq!(join_rule(&snapshot).as_deref(), Some("public"));
            assert!(is_encrypted(&snapshot));

            let derived = DerivedState::from_snapshot(&snapshot);
            assert!(derived.is_public());
            assert!(derived.encrypted);
            assert_eq!(join_rule(&RoomStateSnapshot::new()), None);
        }

        #[test]
        fn third_party_token_correlation() {
            let accepted = StateEvent::new_state(
                ROOM,
                "@bob:x",
                event_types::MEMBER,
                "@bob:x",
                json!({
                    "membership": "invite",
                    "third_party_invite": { "signed": { "mxid": "@bob:x", "token": "abc" } }
                }),
            );
            assert!(invite_matches_third_party_token(&accepted, "abc"));
            assert!(!invite_matches_third_party_token(&accepted, "xyz"));
            assert!(!invite_matches_third_party_token(&member("@bob:x", "invite"), ""));
        }
    }
}
