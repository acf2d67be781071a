#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Matrix entity types consumed by the room access rules engine.

pub mod types;
pub mod utils;

pub use types::*;
pub use utils::*;
