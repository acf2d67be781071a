#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Access rules for Matrix rooms.
//!
//! Every room carries one of three rules in its `im.vector.room.access_rules`
//! state: `direct` for two-party chats, `restricted` to keep users of
//! forbidden servers out, and `unrestricted` to let them in on invitation
//! only. [`AccessRulesEngine`] enforces them at room creation, on every
//! proposed state event, on third-party invites and on publication to the
//! room directory.

pub mod config;
pub mod engine;
pub mod error;
pub mod room;
pub mod services;
pub mod tasks;

pub use crate::config::{AccessRulesConfig, ConfigError};
pub use crate::engine::{AccessRulesEngine, EventCategory};
pub use crate::error::{AccessRulesError, ServiceError};
pub use crate::services::{
    AdminLookup, HttpIdentityLookup, IdentityLookup, PublicRoomDirectory, RoomMaintenanceStore, TaskCheckpoint,
    TaskStatus, TaskStore,
};
pub use crate::tasks::{PowerLevelsRepairTask, RepairSchedule};
