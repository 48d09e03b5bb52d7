//! # Effects
//!
//! An in-process action/effects coordinator: actions flow through a
//! multicast bus, registered effects derive streams from them, and emitted
//! results optionally feed back into the same bus.
//!
//! ## Core Concepts
//!
//! - [`Action`] = a discriminated event value (a JSON object with a `type`)
//! - [`Effect`] = a transform from the action stream to a derived stream of
//!   emissions, plus a dispatch policy
//! - [`EffectsManager`] = the registry that subscribes effects, routes their
//!   emissions, and tears everything down with one shared signal
//!
//! The key principle: **effects never push to the bus themselves**. They emit
//! values, and the manager decides per emission whether those values re-enter
//! the stream as actions.
//!
//! ## Architecture
//!
//! ```text
//! dispatch(action)
//!     │
//!     ▼
//! ActionBus ◄────────────────────────────────┐
//!     │ synchronous fan-out                  │
//!     ├─► Effect A: of_type("ping")          │
//!     │       └─► map ─► emission ──┐        │
//!     │                             ▼        │
//!     │                     dispatch policy  │
//!     │                       │        │     │
//!     │            discard ◄──┘        └─────┘ coerce + check,
//!     │       (dispatch off)                   dispatch (dispatch on)
//!     │
//!     └─► Effect B: side-effect-only transform
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Synchronous push** - `dispatch` returns after every active
//!    subscriber's callback ran; nested dispatches run on the stack
//! 2. **Per-effect stream order** - each subscriber sees actions in push
//!    order; no drops, no replay
//! 3. **At most one subscription per effect** - duplicate registration
//!    cancels the prior subscription first
//! 4. **One teardown signal** - `remove_all_effects` cancels every active
//!    subscription in one sweep, then starts a fresh signal
//! 5. **Actions are validated at the dispatch boundary** - an effect whose
//!    policy is on must emit real actions, or the failure is loud
//!
//! ## Example
//!
//! ```ignore
//! use effects::{Action, ActionBus, Effect, EffectsConfig, EffectsManager};
//!
//! let bus = ActionBus::new();
//! let manager = EffectsManager::new(EffectsConfig::new().with_actions_stream(bus.clone()));
//!
//! // Answer every ping with a pong, fed back into the bus.
//! let ping_pong = Effect::new(|actions| {
//!     actions.of_type("ping").map(|_| Action::new("pong"))
//! })
//! .with_dispatch(true);
//!
//! // Observe pongs, side effects only.
//! let pong_log = Effect::new(|actions| {
//!     actions.of_type("pong").map(|action| {
//!         tracing::info!(kind = %action.kind(), "answered");
//!     })
//! });
//!
//! manager.register_effects([ping_pong, pong_log]);
//! bus.dispatch(Action::new("ping"));
//! ```
//!
//! Hosts that want one coordinator per process use [`init_effects`] and the
//! free functions instead of constructing managers directly.
//!
//! ## What This Is Not
//!
//! No persistence of action history, no replay, no cross-process transport,
//! no delivery-order guarantees across independently registered effects
//! beyond per-effect stream order, and no payload validation beyond the
//! `type` discriminator.

// Core modules
mod action;
mod bootstrap;
mod bus;
mod effect;
mod error;
mod manager;
mod signal;
mod stream;

// Debug auditing for dispatch visibility
#[cfg(debug_assertions)]
pub mod audit;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;


// Re-export action types
pub use crate::action::{Action, Emitted, KIND_FIELD};

// Re-export bus types
pub use crate::bus::ActionBus;

// Re-export effect types
pub use crate::effect::{create_effect, is_effect, Effect, EffectConfig, EffectId};

// Re-export error types
pub use crate::error::EffectsError;

// Re-export manager types
pub use crate::manager::{EffectsConfig, EffectsManager};

// Re-export stream types
pub use crate::stream::{ActionStream, Emitter, Stream, Subscription};

// Re-export the teardown signal
pub use crate::signal::TeardownSignal;

// Re-export the process-wide bootstrap surface
pub use crate::bootstrap::{
    actions, init_effects, register_effects, remove_all_effects, remove_effects,
};
