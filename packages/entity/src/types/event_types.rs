//! Matrix event type, join rule and membership identifiers used by the access rules.

pub const MEMBER: &str = "m.room.member";
pub const THIRD_PARTY_INVITE: &str = "m.room.third_party_invite";
pub const JOIN_RULES: &str = "m.room.join_rules";
pub const POWER_LEVELS: &str = "m.room.power_levels";
pub const NAME: &str = "m.room.name";
pub const TOPIC: &str = "m.room.topic";
pub const AVATAR: &str = "m.room.avatar";
pub const CANONICAL_ALIAS: &str = "m.room.canonical_alias";
pub const HISTORY_VISIBILITY: &str = "m.room.history_visibility";
pub const TOMBSTONE: &str = "m.room.tombstone";
pub const SERVER_ACL: &str = "m.room.server_acl";
pub const ENCRYPTION: &str = "m.room.encryption";

/// Live location sharing, stable and MSC3672 unstable names
pub const LOCATION_LIVE_SHARE: &str = "m.beacon_info";
pub const LOCATION_LIVE_SHARE_MSC: &str = "org.matrix.msc3672.beacon_info";

/// Algorithm used when a room is created encrypted by default
pub const MEGOLM_ALGORITHM: &str = "m.megolm.v1.aes-sha2";

pub mod join_rules {
    pub const PUBLIC: &str = "public";
    pub const INVITE: &str = "invite";
}

/// Third-party identifier media understood by the invite checks
pub mod medium {
    pub const EMAIL: &str = "email";
}
