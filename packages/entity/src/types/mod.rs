pub mod access_rule;
pub mod create_room;
pub mod event_types;
pub mod membership_state;
pub mod power_levels;
pub mod room_state;
pub mod room_visibility;
pub mod state_event;

pub use access_rule::*;
pub use create_room::*;
pub use membership_state::*;
pub use power_levels::*;
pub use room_state::*;
pub use room_visibility::*;
pub use state_event::*;
