//! Testing utilities for effect wiring.
//!
//! # Feature Flag
//!
//! Outside this crate's own tests, this module is only available with the
//! `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! effects = { version = "0.1", features = ["testing"] }
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use effects::testing::ActionRecorder;
//!
//! let recorder = ActionRecorder::attach(&bus);
//!
//! bus.dispatch(Action::new("ping"));
//!
//! assert_dispatched!(recorder, "ping", "pong");
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::action::Action;
use crate::bus::ActionBus;
use crate::stream::Subscription;

/// Bus subscriber that records every dispatched action for assertions.
///
/// Attach it before registering effects so feedback dispatches are captured
/// in delivery order.
pub struct ActionRecorder {
    actions: Arc<Mutex<Vec<Action>>>,
    subscription: Subscription,
}

impl ActionRecorder {
    /// Subscribe a recorder to the given bus.
    pub fn attach(bus: &ActionBus) -> Self {
        let actions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&actions);
        let subscription = bus.subscribe(move |action| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(action.clone());
        });
        Self {
            actions,
            subscription,
        }
    }

    fn lock_actions(&self) -> MutexGuard<'_, Vec<Action>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every recorded action, in dispatch order.
    pub fn actions(&self) -> Vec<Action> {
        self.lock_actions().clone()
    }

    /// The kinds of every recorded action, in dispatch order.
    pub fn kinds(&self) -> Vec<String> {
        self.lock_actions()
            .iter()
            .map(|action| action.kind().to_string())
            .collect()
    }

    /// Number of recorded actions.
    pub fn len(&self) -> usize {
        self.lock_actions().len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.lock_actions().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.lock_actions().clear();
    }

    /// Stop recording.
    pub fn detach(&self) {
        self.subscription.unsubscribe();
    }
}

impl std::fmt::Debug for ActionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRecorder")
            .field("recorded", &self.len())
            .finish()
    }
}

/// Asserts the exact sequence of action kinds a recorder has seen.
///
/// # Example
///
/// ```ignore
/// assert_dispatched!(recorder, "ping", "pong");
/// ```
///
/// # Panics
///
/// Panics if the recorded kinds differ from the expected sequence.
#[macro_export]
macro_rules! assert_dispatched {
    ($recorder:expr, $($kind:expr),+ $(,)?) => {{
        let recorded = $recorder.kinds();
        let expected: Vec<String> = vec![$($kind.to_string()),+];
        assert_eq!(recorded, expected, "dispatched action kinds did not match");
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_collects_in_order() {
        let bus = ActionBus::new();
        let recorder = ActionRecorder::attach(&bus);

        bus.dispatch(Action::new("a").with("n", 1));
        bus.dispatch(Action::new("b"));

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.kinds(), vec!["a", "b"]);
        assert_eq!(recorder.actions()[0].get("n"), Some(&serde_json::json!(1)));
        assert_dispatched!(recorder, "a", "b");
    }

    #[test]
    fn test_recorder_clear_and_detach() {
        let bus = ActionBus::new();
        let recorder = ActionRecorder::attach(&bus);

        bus.dispatch(Action::new("a"));
        recorder.clear();
        assert!(recorder.is_empty());

        recorder.detach();
        bus.dispatch(Action::new("b"));
        assert!(recorder.is_empty());
    }
}
