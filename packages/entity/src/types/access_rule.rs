use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// State event type carrying a room's access rule. Always sent with an empty state key.
pub const ACCESS_RULES_TYPE: &str = "im.vector.room.access_rules";

/// Access rule attached to a room through the `im.vector.room.access_rules` state event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRule {
    /// Two-party room: nobody beyond the creator and their first invitee
    Direct,
    /// Users from forbidden domains can neither join nor be invited
    #[default]
    Restricted,
    /// Anyone may be invited; forbidden domains need an invite to join
    Unrestricted,
}

/// Every rule a room may carry, in the order they are documented
pub const VALID_ACCESS_RULES: [AccessRule; 3] =
    [AccessRule::Direct, AccessRule::Restricted, AccessRule::Unrestricted];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown access rule: {0}")]
pub struct UnknownAccessRule(pub String);

impl AccessRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRule::Direct => "direct",
            AccessRule::Restricted => "restricted",
            AccessRule::Unrestricted => "unrestricted",
        }
    }

    /// Whether power levels content must be checked against the forbidden domains.
    ///
    /// `direct` rooms make both parties admins and `restricted` rooms keep
    /// forbidden users out at the membership level, so only `unrestricted`
    /// needs to police who gets power.
    pub fn requires_power_level_restrictions(&self) -> bool {
        matches!(self, AccessRule::Unrestricted)
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, AccessRule::Direct)
    }
}

impl fmt::Display for AccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessRule {
    type Err = UnknownAccessRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(AccessRule::Direct),
            "restricted" => Ok(AccessRule::Restricted),
            "unrestricted" => Ok(AccessRule::Unrestricted),
            other => Err(UnknownAccessRule(other.to_string())),
        }
    }
}
