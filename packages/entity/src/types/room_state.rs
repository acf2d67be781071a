use crate::types::StateEvent;
use std::collections::HashMap;

/// Key of a room state entry: `(event type, state key)`
pub type StateKey = (String, String);

/// Room state as it stood before a candidate event, keyed by `(type, state_key)`.
///
/// Entry order carries no meaning. Inserting an event replaces any previous
/// entry with the same type and state key, so the snapshot always holds the
/// latest event per key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomStateSnapshot {
    events: HashMap<StateKey, StateEvent>,
}

impl RoomStateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a state event; timeline events (no state key) are ignored
    pub fn insert(&mut self, event: StateEvent) {
        if let Some(state_key) = event.state_key.clone() {
            self.events.insert((event.event_type.clone(), state_key), event);
        }
    }

    pub fn with(mut self, event: StateEvent) -> Self {
        self.insert(event);
        self
    }

    pub fn get(&self, event_type: &str, state_key: &str) -> Option<&StateEvent> {
        self.events.get(&(event_type.to_string(), state_key.to_string()))
    }

    pub fn contains(&self, event_type: &str, state_key: &str) -> bool {
        self.get(event_type, state_key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &StateEvent)> {
        self.events.iter()
    }

    /// All entries of one event type
    pub fn of_type<'a>(&'a self, event_type: &'a str) -> impl Iterator<Item = &'a StateEvent> + 'a {
        self.events
            .iter()
            .filter(move |((ty, _), _)| ty == event_type)
            .map(|(_, event)| event)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<StateEvent> for RoomStateSnapshot {
    fn from_iter<I: IntoIterator<Item = StateEvent>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for event in iter {
            snapshot.insert(event);
        }
        snapshot
    }
}
