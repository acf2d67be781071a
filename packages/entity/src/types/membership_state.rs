use serde::{Deserialize, Serialize};
use std::fmt;

/// Matrix room membership states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    /// User has been invited to the room
    Invite,
    /// User has joined the room
    Join,
    /// User has left the room
    Leave,
    /// User has been banned from the room
    Ban,
    /// User has knocked on the room (requesting to join)
    Knock,
}

impl MembershipState {
    /// Parse a `membership` content value, `None` for anything outside the five Matrix memberships
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "invite" => Some(MembershipState::Invite),
            "join" => Some(MembershipState::Join),
            "leave" => Some(MembershipState::Leave),
            "ban" => Some(MembershipState::Ban),
            "knock" => Some(MembershipState::Knock),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipState::Invite => "invite",
            MembershipState::Join => "join",
            MembershipState::Leave => "leave",
            MembershipState::Ban => "ban",
            MembershipState::Knock => "knock",
        }
    }
}

impl fmt::Display for MembershipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
