//! The effects manager: registry, dispatch policy, and bulk teardown.
//!
//! # Overview
//!
//! The manager owns the set of active effect subscriptions, keyed by
//! [`EffectId`]. Registering an effect subscribes its source function to the
//! bus, constrained by the manager's shared teardown signal; every emission
//! is then routed through the dispatch policy:
//!
//! - policy = the effect's `dispatch` override if set, else the manager's
//!   `dispatch_by_default`, resolved at each emission;
//! - policy off: the emission is discarded (its side effects already ran
//!   inside the transform);
//! - policy on: the emission is coerced into a batch of actions, the whole
//!   batch is validated, and the batch is dispatched in emission order. An
//!   invalid entry fails the entire emission loudly and nothing from it
//!   reaches the bus.
//!
//! # Lifecycle
//!
//! Per registered effect: unregistered → active → unregistered (on removal)
//! or cancelled (on teardown). `remove_all_effects` swaps in a fresh teardown
//! signal and a fresh registry before firing the old signal, so re-registered
//! effects start clean against the new signal.
//!
//! All registry operations are safe to call from within a subscriber
//! callback of an in-flight dispatch; no internal lock is held while user
//! code runs.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tracing::{debug, error, trace};

use crate::action::Emitted;
use crate::bus::ActionBus;
use crate::effect::{Effect, EffectId};
use crate::signal::TeardownSignal;
use crate::stream::Subscription;

/// Configuration for an [`EffectsManager`].
///
/// # Example
///
/// ```ignore
/// let manager = EffectsManager::new(
///     EffectsConfig::new()
///         .with_dispatch_by_default(true)
///         .with_actions_stream(my_bus.clone()),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct EffectsConfig {
    /// Fallback dispatch policy for effects without an explicit override.
    pub dispatch_by_default: bool,
    /// Bus to bind effects to. Defaults to the process-wide bus.
    pub custom_actions_stream: Option<ActionBus>,
}

impl EffectsConfig {
    /// Default configuration: no dispatch by default, process-wide bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback dispatch policy.
    pub fn with_dispatch_by_default(mut self, dispatch_by_default: bool) -> Self {
        self.dispatch_by_default = dispatch_by_default;
        self
    }

    /// Bind effects to a specific bus instead of the process-wide one.
    pub fn with_actions_stream(mut self, bus: ActionBus) -> Self {
        self.custom_actions_stream = Some(bus);
        self
    }
}

/// Registry of active effect subscriptions over one action bus.
pub struct EffectsManager {
    bus: ActionBus,
    dispatch_by_default: bool,
    subscriptions: DashMap<EffectId, Subscription>,
    teardown: Mutex<TeardownSignal>,
}

impl EffectsManager {
    /// Create a manager from configuration. When no custom bus is given the
    /// manager binds to the process-wide bus.
    pub fn new(config: EffectsConfig) -> Self {
        let bus = config
            .custom_actions_stream
            .unwrap_or_else(|| crate::bootstrap::actions().clone());

        debug!(
            dispatch_by_default = config.dispatch_by_default,
            "effects manager created"
        );

        Self {
            bus,
            dispatch_by_default: config.dispatch_by_default,
            subscriptions: DashMap::new(),
            teardown: Mutex::new(TeardownSignal::new()),
        }
    }

    /// The bus this manager's effects are bound to.
    pub fn bus(&self) -> &ActionBus {
        &self.bus
    }

    /// The fallback dispatch policy.
    pub fn dispatch_by_default(&self) -> bool {
        self.dispatch_by_default
    }

    /// Subscribe each effect's source function to the bus.
    ///
    /// Registering an effect that is already active cancels the prior
    /// subscription first, then subscribes fresh, so at most one
    /// subscription per identity is ever active.
    pub fn register_effects<I>(&self, effects: I)
    where
        I: IntoIterator<Item = Effect>,
    {
        for effect in effects {
            self.subscribe_effect(effect);
        }
    }

    /// Cancel and forget each effect's subscription. Effects that are not
    /// registered are skipped silently.
    pub fn remove_effects<'a, I>(&self, effects: I)
    where
        I: IntoIterator<Item = &'a Effect>,
    {
        for effect in effects {
            self.unsubscribe_effect(effect);
        }
    }

    /// Tear down every active subscription in one synchronous sweep.
    ///
    /// Effects registered after this call bind to a fresh teardown signal
    /// and are unaffected.
    pub fn remove_all_effects(&self) {
        // Swap before firing so a re-entrant registration from inside a
        // teardown hook binds to the fresh signal, not the spent one.
        let previous = {
            let mut teardown = self.lock_teardown();
            std::mem::replace(&mut *teardown, TeardownSignal::new())
        };
        self.subscriptions.clear();

        debug!("tearing down all effect subscriptions");
        previous.fire();
    }

    /// Whether the given effect currently holds an active subscription.
    pub fn is_registered(&self, effect: &Effect) -> bool {
        self.subscriptions.contains_key(&effect.id())
    }

    /// Number of currently registered effects.
    pub fn active_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn subscribe_effect(&self, effect: Effect) {
        if let Some((_, previous)) = self.subscriptions.remove(&effect.id()) {
            debug!(effect = %effect.id(), "replacing existing subscription for effect");
            previous.unsubscribe();
        }

        let teardown = self.lock_teardown().clone();
        let source = effect.source(self.bus.stream());

        let bus = self.bus.clone();
        let dispatch_by_default = self.dispatch_by_default;
        let configured_dispatch = effect.config().dispatch;
        let effect_id = effect.id();

        let subscription = source.take_until(&teardown).subscribe(move |emitted: Emitted| {
            // Policy is resolved per emission: the effect's override if set,
            // the manager's fallback otherwise.
            let dispatch = configured_dispatch.unwrap_or(dispatch_by_default);
            if !dispatch {
                trace!(effect = %effect_id, "emission discarded (dispatch disabled)");
                return;
            }

            match emitted.into_actions() {
                Ok(actions) => bus.dispatch_all(actions),
                Err(err) => {
                    error!(
                        effect = %effect_id,
                        %err,
                        "effect emitted a non-action value while dispatch is enabled"
                    );
                    panic!("{err}");
                }
            }
        });

        debug!(effect = %effect_id, "effect registered");
        self.subscriptions.insert(effect_id, subscription);
    }

    fn unsubscribe_effect(&self, effect: &Effect) {
        match self.subscriptions.remove(&effect.id()) {
            Some((_, subscription)) => {
                subscription.unsubscribe();
                debug!(effect = %effect.id(), "effect removed");
            }
            None => {
                trace!(effect = %effect.id(), "remove requested for unregistered effect");
            }
        }
    }

    fn lock_teardown(&self) -> MutexGuard<'_, TeardownSignal> {
        self.teardown.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EffectsManager {
    fn default() -> Self {
        Self::new(EffectsConfig::default())
    }
}

impl fmt::Debug for EffectsManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectsManager")
            .field("active_count", &self.active_count())
            .field("dispatch_by_default", &self.dispatch_by_default)
            .finish()
    }
}
