pub mod creation;
pub mod policies;
pub mod power_levels;
pub mod state;

pub use creation::RoomCreationPolicy;
pub use policies::{RoomPolicies, is_rule_transition_allowed};
pub use power_levels::PowerLevelValidator;
pub use state::{DerivedState, RuleEntry, current_rule};
