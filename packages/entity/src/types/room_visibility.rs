use serde::{Deserialize, Serialize};

/// Room visibility in the public room directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomVisibility {
    Public,
    Private,
}

impl RoomVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomVisibility::Public => "public",
            RoomVisibility::Private => "private",
        }
    }
}
