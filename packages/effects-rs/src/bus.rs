//! Multicast action bus with synchronous push delivery.
//!
//! # Guarantees
//!
//! - **Synchronous push**: `dispatch` returns only after every subscriber
//!   callback active at push time has run. Actions are pushed one at a time;
//!   each callback runs to completion before the next action is pushed.
//! - **Hot, in-memory, no replay**: subscribers receive only actions
//!   dispatched after they subscribed.
//! - **Per-subscriber isolation**: a panicking callback is logged and does
//!   not prevent delivery to the remaining subscribers of the same dispatch.
//! - **Re-entrancy**: `dispatch`, `subscribe`, and `unsubscribe` are all safe
//!   to call from within a subscriber callback. Nested dispatches run as
//!   ordinary synchronous calls on the stack.
//!
//! The bus performs no validation of action shape; that happens at
//! construction ([`Action`]) and at the effects manager's dispatch boundary.
//!
//! # Example
//!
//! ```ignore
//! let bus = ActionBus::new();
//!
//! let subscription = bus.subscribe(|action| {
//!     println!("saw {}", action.kind());
//! });
//!
//! bus.dispatch(Action::new("todo/add").with("id", 1));
//! subscription.unsubscribe();
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, trace};

use crate::action::Action;
use crate::stream::{ActionStream, Stream, Subscription};

#[cfg(debug_assertions)]
use crate::audit::{DispatchRecord, SharedDispatchLog};

/// Multicast synchronous channel of [`Action`] values.
///
/// Cloning is cheap and clones share the channel: a dispatch on any clone
/// reaches subscribers registered through any other.
#[derive(Clone, Default)]
pub struct ActionBus {
    state: Arc<BusState>,
}

#[derive(Default)]
struct BusState {
    subscribers: Mutex<Vec<Arc<SubscriberEntry>>>,
    #[cfg(debug_assertions)]
    audit: Mutex<Option<SharedDispatchLog>>,
}

struct SubscriberEntry {
    active: AtomicBool,
    callback: Box<dyn Fn(&Action) + Send + Sync>,
}

impl ActionBus {
    /// Create a new bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push each action, in order, to every currently active subscriber.
    pub fn dispatch_all(&self, actions: impl IntoIterator<Item = Action>) {
        for action in actions {
            self.fan_out(&action);
        }
    }

    /// Push a single action to every currently active subscriber.
    pub fn dispatch(&self, action: Action) {
        self.fan_out(&action);
    }

    /// Register a callback for all future dispatched actions.
    ///
    /// Returns a cancellable handle. No replay of past actions. Subscribers
    /// are fully independent of one another; a subscriber added from within a
    /// callback becomes active for subsequent dispatches, not the in-flight
    /// one.
    pub fn subscribe(&self, callback: impl Fn(&Action) + Send + Sync + 'static) -> Subscription {
        let entry = Arc::new(SubscriberEntry {
            active: AtomicBool::new(true),
            callback: Box::new(callback),
        });

        {
            let mut subscribers = self.lock_subscribers();
            subscribers.retain(|existing| existing.active.load(Ordering::SeqCst));
            subscribers.push(Arc::clone(&entry));
        }

        Subscription::new(move || entry.active.store(false, Ordering::SeqCst))
    }

    /// Expose the bus as a subscribable stream of actions.
    pub fn stream(&self) -> ActionStream {
        let bus = self.clone();
        Stream::from_subscribe(move |observer| {
            bus.subscribe(move |action| (*observer)(action.clone()))
        })
    }

    /// The number of currently active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers()
            .iter()
            .filter(|entry| entry.active.load(Ordering::SeqCst))
            .count()
    }

    /// Attach a dispatch log recording every fan-out (debug builds only).
    #[cfg(debug_assertions)]
    pub fn attach_audit(&self, log: SharedDispatchLog) {
        *self
            .state
            .audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(log);
    }

    fn fan_out(&self, action: &Action) {
        // Snapshot the subscribers active at push time; the lock is released
        // before any callback runs, so callbacks may subscribe, unsubscribe,
        // or dispatch again.
        let snapshot: Vec<Arc<SubscriberEntry>> = self.lock_subscribers().to_vec();

        trace!(kind = %action.kind(), subscribers = snapshot.len(), "dispatching action");

        let mut delivered = 0usize;
        for entry in snapshot {
            // A subscriber cancelled earlier in this same fan-out is skipped.
            if !entry.active.load(Ordering::SeqCst) {
                continue;
            }
            delivered += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| (entry.callback)(action)));
            if let Err(payload) = outcome {
                error!(
                    kind = %action.kind(),
                    panic = panic_message(payload.as_ref()),
                    "subscriber panicked during dispatch"
                );
            }
        }

        #[cfg(debug_assertions)]
        self.record_audit(action, delivered);
    }

    #[cfg(debug_assertions)]
    fn record_audit(&self, action: &Action, delivered: usize) {
        let log = self
            .state
            .audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(log) = log {
            log.record(DispatchRecord::new(action.kind(), delivered));
        }
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Arc<SubscriberEntry>>> {
        self.state
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ActionBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_bus() -> (ActionBus, Arc<Mutex<Vec<String>>>, Subscription) {
        let bus = ActionBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = bus.subscribe(move |action| {
            sink.lock().unwrap().push(action.kind().to_string());
        });
        (bus, seen, subscription)
    }

    #[test]
    fn test_dispatch_and_receive_in_order() {
        let (bus, seen, _subscription) = recording_bus();

        bus.dispatch_all([Action::new("a"), Action::new("b"), Action::new("c")]);

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_multiple_subscribers_each_receive_everything() {
        let bus = ActionBus::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&first);
        let _sub_a = bus.subscribe(move |action| sink.lock().unwrap().push(action.kind().to_string()));
        let sink = Arc::clone(&second);
        let _sub_b = bus.subscribe(move |action| sink.lock().unwrap().push(action.kind().to_string()));

        bus.dispatch(Action::new("ping"));
        bus.dispatch(Action::new("pong"));

        assert_eq!(*first.lock().unwrap(), vec!["ping", "pong"]);
        assert_eq!(*second.lock().unwrap(), vec!["ping", "pong"]);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_actions() {
        let bus = ActionBus::new();
        bus.dispatch(Action::new("early"));

        let (other_bus, seen, _subscription) = {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            let subscription = bus.subscribe(move |action| {
                sink.lock().unwrap().push(action.kind().to_string());
            });
            (bus.clone(), seen, subscription)
        };

        other_bus.dispatch(Action::new("late"));

        assert_eq!(*seen.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let (bus, seen, subscription) = recording_bus();

        bus.dispatch(Action::new("first"));
        subscription.unsubscribe();
        bus.dispatch(Action::new("second"));

        assert_eq!(*seen.lock().unwrap(), vec!["first"]);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let bus = ActionBus::new();
        let _panicker = bus.subscribe(|_| panic!("subscriber blew up"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _survivor = bus.subscribe(move |action| {
            sink.lock().unwrap().push(action.kind().to_string());
        });

        bus.dispatch(Action::new("still-delivered"));

        assert_eq!(*seen.lock().unwrap(), vec!["still-delivered"]);
    }

    #[test]
    fn test_reentrant_dispatch_from_callback() {
        let bus = ActionBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = bus.clone();
        let _forwarder = bus.subscribe(move |action| {
            if action.kind() == "ping" {
                inner_bus.dispatch(Action::new("pong"));
            }
        });

        let sink = Arc::clone(&seen);
        let _recorder = bus.subscribe(move |action| {
            sink.lock().unwrap().push(action.kind().to_string());
        });

        bus.dispatch(Action::new("ping"));

        // The nested dispatch completes inside the forwarder's callback, so
        // the recorder sees pong before its own ping delivery.
        assert_eq!(*seen.lock().unwrap(), vec!["pong", "ping"]);
    }

    #[test]
    fn test_subscribe_from_callback_takes_effect_next_dispatch() {
        let bus = ActionBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = bus.clone();
        let sink = Arc::clone(&seen);
        let _bootstrapper = bus.subscribe(move |action| {
            if action.kind() == "grow" {
                let sink = Arc::clone(&sink);
                // Leaked on purpose: the nested subscription lives for the
                // rest of the test.
                let _ = inner_bus.subscribe(move |action| {
                    sink.lock().unwrap().push(action.kind().to_string());
                });
            }
        });

        bus.dispatch(Action::new("grow"));
        assert!(seen.lock().unwrap().is_empty());

        bus.dispatch(Action::new("after"));
        assert_eq!(*seen.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn test_unsubscribe_during_fanout_is_instantaneous() {
        let bus = ActionBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        // First subscriber cancels the second mid-dispatch.
        let cancel_slot = Arc::clone(&slot);
        let _canceller = bus.subscribe(move |_| {
            if let Some(subscription) = cancel_slot.lock().unwrap().as_ref() {
                subscription.unsubscribe();
            }
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let victim = bus.subscribe(move |action| {
            sink.lock().unwrap().push(action.kind().to_string());
        });
        *slot.lock().unwrap() = Some(victim);

        bus.dispatch(Action::new("never-seen"));

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stream_subscription_receives_actions() {
        let bus = ActionBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = bus
            .stream()
            .of_type("ping")
            .subscribe(move |action| sink.lock().unwrap().push(action.kind().to_string()));

        bus.dispatch(Action::new("ping"));
        bus.dispatch(Action::new("other"));

        assert_eq!(*seen.lock().unwrap(), vec!["ping"]);
    }

    #[test]
    fn test_clone_shares_channel() {
        let (bus, seen, _subscription) = recording_bus();
        let clone = bus.clone();

        clone.dispatch(Action::new("via-clone"));

        assert_eq!(*seen.lock().unwrap(), vec!["via-clone"]);
    }

    #[test]
    fn test_dispatch_with_no_subscribers_is_a_noop() {
        let bus = ActionBus::new();
        bus.dispatch(Action::new("nobody-home"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_debug_impl() {
        let bus = ActionBus::new();
        let _subscription = bus.subscribe(|_| {});
        let debug = format!("{bus:?}");
        assert!(debug.contains("ActionBus"));
        assert!(debug.contains("subscriber_count"));
    }
}
