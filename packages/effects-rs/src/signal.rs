//! Shared teardown signal for bulk subscription cancellation.
//!
//! A [`TeardownSignal`] is a one-shot cancellation latch. Every effect
//! subscription created by a manager is constrained with the manager's
//! current signal; firing the signal cancels all of them in one synchronous
//! sweep. `remove_all_effects` swaps in a fresh signal before firing the old
//! one, so effects registered afterwards are unaffected.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Hook = Box<dyn FnOnce() + Send>;

/// One-shot cancellation signal shared by a set of subscriptions.
///
/// Hooks registered after the signal has fired run immediately, so a
/// subscription created against a spent signal is dead on arrival.
#[derive(Clone, Default)]
pub struct TeardownSignal {
    state: Arc<SignalState>,
}

#[derive(Default)]
struct SignalState {
    fired: AtomicBool,
    hooks: Mutex<Vec<Hook>>,
}

impl TeardownSignal {
    /// Create a fresh, unfired signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the signal has already fired.
    pub fn has_fired(&self) -> bool {
        self.state.fired.load(Ordering::SeqCst)
    }

    /// Register a hook to run when the signal fires.
    ///
    /// Runs the hook immediately if the signal has already fired.
    pub fn on_fire(&self, hook: impl FnOnce() + Send + 'static) {
        if self.has_fired() {
            hook();
            return;
        }

        self.lock_hooks().push(Box::new(hook));

        // fire() may have drained between the check and the push; sweep up.
        if self.has_fired() {
            self.drain_and_run();
        }
    }

    /// Fire the signal, running every registered hook exactly once.
    ///
    /// Hooks run outside the internal lock, so they may register further
    /// subscriptions or cancel others without deadlocking. Firing twice is a
    /// no-op.
    pub fn fire(&self) {
        if self.state.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        self.drain_and_run();
    }

    fn drain_and_run(&self) {
        loop {
            let hooks: Vec<Hook> = {
                let mut pending = self.lock_hooks();
                pending.drain(..).collect()
            };
            if hooks.is_empty() {
                break;
            }
            for hook in hooks {
                hook();
            }
        }
    }

    fn lock_hooks(&self) -> MutexGuard<'_, Vec<Hook>> {
        self.state
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TeardownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeardownSignal")
            .field("fired", &self.has_fired())
            .field("pending_hooks", &self.lock_hooks().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_hooks_run_on_fire() {
        let signal = TeardownSignal::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            signal.on_fire(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(!signal.has_fired());
        signal.fire();
        assert!(signal.has_fired());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_hook_after_fire_runs_immediately() {
        let signal = TeardownSignal::new();
        signal.fire();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        signal.on_fire(move || flag.store(true, Ordering::SeqCst));

        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_fire_is_one_shot() {
        let signal = TeardownSignal::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        signal.on_fire(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        signal.fire();
        signal.fire();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let signal = TeardownSignal::new();
        let clone = signal.clone();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        clone.on_fire(move || flag.store(true, Ordering::SeqCst));

        signal.fire();
        assert!(clone.has_fired());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_hook_registered_during_fire_still_runs() {
        // A hook that registers another hook while the signal is draining.
        let signal = TeardownSignal::new();
        let inner_ran = Arc::new(AtomicBool::new(false));

        let signal_clone = signal.clone();
        let flag = Arc::clone(&inner_ran);
        signal.on_fire(move || {
            let flag = Arc::clone(&flag);
            signal_clone.on_fire(move || flag.store(true, Ordering::SeqCst));
        });

        signal.fire();
        assert!(inner_ran.load(Ordering::SeqCst));
    }
}
