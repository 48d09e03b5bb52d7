//! Hot stream pipelines over the action bus.
//!
//! A [`Stream`] is a lazily-built, single-subscription pipeline: combinators
//! stack transformation steps, and nothing runs until [`Stream::subscribe`]
//! attaches an observer and wires the chain back to its source (the bus, or
//! an [`Emitter`]). Streams are hot: values emitted while nothing is
//! subscribed are dropped, and there is no replay.
//!
//! Effects are written as functions from the bus's action stream to a derived
//! stream of emissions:
//!
//! ```ignore
//! let effect = Effect::new(|actions| {
//!     actions
//!         .of_type("todo/add")
//!         .map(|action| Action::new("todo/added").with("id", action.get("id").cloned()))
//! })
//! .with_dispatch(true);
//! ```
//!
//! Delivery through a pipeline is synchronous: the source invokes the chain,
//! the chain invokes the observer, all on the caller's stack.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::action::Action;
use crate::signal::TeardownSignal;

/// Observer half of a subscribed pipeline.
type Observer<T> = Arc<dyn Fn(T) + Send + Sync>;

/// A stream of actions, as produced by [`ActionBus::stream`].
///
/// [`ActionBus::stream`]: crate::bus::ActionBus::stream
pub type ActionStream = Stream<Action>;

// =============================================================================
// Subscription
// =============================================================================

/// Cancellable handle to an active stream subscription.
///
/// Dropping the handle does not cancel the subscription; a hot source keeps
/// delivering until [`Subscription::unsubscribe`] is called (directly, or by
/// a [`TeardownSignal`] the subscription was constrained with).
///
/// Cancellation is instantaneous and idempotent: once `unsubscribe` returns,
/// the observer will not be invoked again, even for a value currently being
/// fanned out by the source.
#[derive(Clone)]
pub struct Subscription {
    state: Arc<SubscriptionState>,
}

struct SubscriptionState {
    active: AtomicBool,
    on_unsubscribe: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Create a live subscription whose cancellation runs the given hook.
    pub(crate) fn new(on_unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            state: Arc::new(SubscriptionState {
                active: AtomicBool::new(true),
                on_unsubscribe: Mutex::new(Some(Box::new(on_unsubscribe))),
            }),
        }
    }

    /// Whether the subscription is still delivering values.
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Cancel the subscription. Safe to call more than once, and safe to
    /// call from within an observer of the same subscription.
    pub fn unsubscribe(&self) {
        if !self.state.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let hook = self
            .state
            .on_unsubscribe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// =============================================================================
// Stream
// =============================================================================

/// A single-subscription pipeline of values of type `T`.
///
/// Built by [`ActionBus::stream`], [`Stream::source`], or a combinator on
/// another stream. Consumed by [`Stream::subscribe`].
///
/// [`ActionBus::stream`]: crate::bus::ActionBus::stream
pub struct Stream<T> {
    subscribe_fn: Box<dyn FnOnce(Observer<T>) -> Subscription + Send>,
}

impl<T: 'static> Stream<T> {
    pub(crate) fn from_subscribe(
        subscribe_fn: impl FnOnce(Observer<T>) -> Subscription + Send + 'static,
    ) -> Self {
        Self {
            subscribe_fn: Box::new(subscribe_fn),
        }
    }

    /// Attach an observer and activate the pipeline.
    pub fn subscribe(self, observer: impl Fn(T) + Send + Sync + 'static) -> Subscription {
        (self.subscribe_fn)(Arc::new(observer))
    }

    /// Transform every value.
    pub fn map<U: 'static>(self, f: impl Fn(T) -> U + Send + Sync + 'static) -> Stream<U> {
        Stream::from_subscribe(move |observer: Observer<U>| {
            self.subscribe(move |value| (*observer)(f(value)))
        })
    }

    /// Keep only values matching the predicate.
    pub fn filter(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Stream<T> {
        Stream::from_subscribe(move |observer: Observer<T>| {
            self.subscribe(move |value| {
                if predicate(&value) {
                    (*observer)(value);
                }
            })
        })
    }

    /// Transform and filter in one step.
    pub fn filter_map<U: 'static>(
        self,
        f: impl Fn(T) -> Option<U> + Send + Sync + 'static,
    ) -> Stream<U> {
        Stream::from_subscribe(move |observer: Observer<U>| {
            self.subscribe(move |value| {
                if let Some(mapped) = f(value) {
                    (*observer)(mapped);
                }
            })
        })
    }

    /// Observe values without transforming them. The side-effect seam for
    /// effects that only need to look at actions.
    pub fn tap(self, f: impl Fn(&T) + Send + Sync + 'static) -> Stream<T> {
        Stream::from_subscribe(move |observer: Observer<T>| {
            self.subscribe(move |value| {
                f(&value);
                (*observer)(value);
            })
        })
    }

    /// Constrain the subscription to a teardown signal: when the signal
    /// fires, the subscription is cancelled. Subscribing against a signal
    /// that already fired yields a subscription that is dead on arrival.
    pub fn take_until(self, signal: &TeardownSignal) -> Stream<T> {
        let signal = signal.clone();
        Stream::from_subscribe(move |observer: Observer<T>| {
            let subscription = (self.subscribe_fn)(observer);
            let handle = subscription.clone();
            signal.on_fire(move || handle.unsubscribe());
            subscription
        })
    }

    /// An externally-driven hot source.
    ///
    /// The [`Emitter`] half pushes values; the stream half delivers them to
    /// whatever observer is subscribed at that moment. Emissions while
    /// nothing is subscribed (or after cancellation) are dropped. This is the
    /// seam for transforms backed by delayed or out-of-band emissions: hold
    /// the emitter wherever the emission will eventually happen, and return
    /// the stream from the effect's source function.
    pub fn source() -> (Emitter<T>, Stream<T>) {
        let slot: TargetSlot<T> = Arc::new(Mutex::new(None));

        let stream_slot = Arc::clone(&slot);
        let stream = Stream::from_subscribe(move |observer: Observer<T>| {
            let hook_slot = Arc::clone(&stream_slot);
            let subscription = Subscription::new(move || {
                lock_slot(&hook_slot).take();
            });
            *lock_slot(&stream_slot) = Some(EmitterTarget {
                observer,
                subscription: subscription.clone(),
            });
            subscription
        });

        (Emitter { slot }, stream)
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

impl Stream<Action> {
    /// Keep only actions of the given kind.
    pub fn of_type(self, kind: impl Into<String>) -> Stream<Action> {
        let kind = kind.into();
        self.filter(move |action| action.kind() == kind)
    }

    /// Keep only actions whose kind is one of the given kinds.
    pub fn of_types<I, S>(self, kinds: I) -> Stream<Action>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kinds: Vec<String> = kinds.into_iter().map(Into::into).collect();
        self.filter(move |action| kinds.iter().any(|kind| kind == action.kind()))
    }
}

// =============================================================================
// Emitter
// =============================================================================

type TargetSlot<T> = Arc<Mutex<Option<EmitterTarget<T>>>>;

struct EmitterTarget<T> {
    observer: Observer<T>,
    subscription: Subscription,
}

impl<T> Clone for EmitterTarget<T> {
    fn clone(&self) -> Self {
        Self {
            observer: Arc::clone(&self.observer),
            subscription: self.subscription.clone(),
        }
    }
}

fn lock_slot<T>(slot: &TargetSlot<T>) -> MutexGuard<'_, Option<EmitterTarget<T>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Push half of a [`Stream::source`] pair.
pub struct Emitter<T> {
    slot: TargetSlot<T>,
}

impl<T> Emitter<T> {
    /// Push a value to the current observer, if one is subscribed and still
    /// active. The observer runs synchronously on the caller's stack; the
    /// internal lock is released first, so an observer may cancel its own
    /// subscription or emit again without deadlocking.
    pub fn emit(&self, value: T) {
        let target = lock_slot(&self.slot).clone();
        if let Some(target) = target {
            if target.subscription.is_active() {
                (*target.observer)(value);
            }
        }
    }

    /// Whether a live observer is currently attached.
    pub fn is_observed(&self) -> bool {
        lock_slot(&self.slot)
            .as_ref()
            .is_some_and(|target| target.subscription.is_active())
    }
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("observed", &self.is_observed())
            .finish()
    }
}
